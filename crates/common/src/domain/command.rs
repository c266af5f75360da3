use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Corrective action a vehicle can be told to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    ReturnToBase,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::ReturnToBase => "RETURN_TO_BASE",
        }
    }
}

/// Instruction issued to one vehicle
///
/// Transient: produced by a rule, handed to a [`CommandDispatcher`] and then
/// dropped. Commands are never stored or retried.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Short vehicle id (trailing segment of the reading's vehicle id)
    pub target_vehicle_id: String,
    pub action: CommandAction,
    pub reason: String,
    pub issued_at: DateTime<Utc>,
}

/// Trait for delivering commands to vehicles over the message bus
///
/// Implementations publish at most once and do not wait for any
/// acknowledgment from the vehicle.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn dispatch(&self, command: &Command) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&CommandAction::ReturnToBase).unwrap();
        assert_eq!(json, r#""RETURN_TO_BASE""#);
        assert_eq!(CommandAction::ReturnToBase.as_str(), "RETURN_TO_BASE");
    }
}
