use crate::domain::{LowBatteryRule, LowBatteryRuleConfig, Rule};
use chrono::{DateTime, Utc};
use common::domain::{Command, Reading};
use tracing::debug;

/// Ordered set of rules evaluated against each reading
///
/// Rules are tried in registration order and the first command produced
/// wins, so a reading yields at most one command no matter how many rules
/// are registered.
#[derive(Default)]
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fleet's standard rule set
    pub fn standard(low_battery: &LowBatteryRuleConfig) -> Self {
        Self::new().with_rule(LowBatteryRule::new(low_battery))
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn evaluate(&self, reading: &Reading, now: DateTime<Utc>) -> Option<Command> {
        self.rules.iter().find_map(|rule| {
            let command = rule.evaluate(reading, now)?;
            debug!(
                rule = rule.name(),
                vehicle_id = %reading.vehicle_id(),
                action = command.action.as_str(),
                "rule fired"
            );
            Some(command)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{CommandAction, VehicleStatus};

    struct IdleRecall;

    impl Rule for IdleRecall {
        fn name(&self) -> &'static str {
            "idle_recall"
        }

        fn evaluate(&self, reading: &Reading, now: DateTime<Utc>) -> Option<Command> {
            (*reading.status() == VehicleStatus::Idle).then(|| Command {
                target_vehicle_id: reading.short_vehicle_id().to_string(),
                action: CommandAction::ReturnToBase,
                reason: "Idle".to_string(),
                issued_at: now,
            })
        }
    }

    fn reading(battery: i32, status: VehicleStatus) -> Reading {
        Reading::new("factory/agv/004", battery, status, Utc::now())
    }

    #[test]
    fn test_empty_engine_never_fires() {
        let engine = RuleEngine::new();
        assert!(engine.evaluate(&reading(1, VehicleStatus::Moving), Utc::now()).is_none());
    }

    #[test]
    fn test_standard_engine_fires_low_battery() {
        let engine = RuleEngine::standard(&LowBatteryRuleConfig::default());
        assert_eq!(engine.rule_names(), vec!["low_battery"]);

        let command = engine
            .evaluate(&reading(10, VehicleStatus::Moving), Utc::now())
            .unwrap();
        assert_eq!(command.reason, "Low Battery");
        assert_eq!(command.target_vehicle_id, "004");
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let engine = RuleEngine::standard(&LowBatteryRuleConfig::default()).with_rule(IdleRecall);

        let low_and_moving = engine
            .evaluate(&reading(10, VehicleStatus::Moving), Utc::now())
            .unwrap();
        assert_eq!(low_and_moving.reason, "Low Battery");

        let idle = engine
            .evaluate(&reading(90, VehicleStatus::Idle), Utc::now())
            .unwrap();
        assert_eq!(idle.reason, "Idle");

        assert!(engine.evaluate(&reading(90, VehicleStatus::Charging), Utc::now()).is_none());
    }
}
