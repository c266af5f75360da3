use chrono::{DateTime, Utc};
use common::domain::{Command, Reading};

/// A single safety rule: one reading in, zero or one command out
///
/// Rules are pure. They must not perform I/O or keep state between calls;
/// the evaluation time is passed in so results depend only on the inputs.
pub trait Rule: Send + Sync {
    /// Name used in logs when the rule fires
    fn name(&self) -> &'static str;

    fn evaluate(&self, reading: &Reading, now: DateTime<Utc>) -> Option<Command>;
}
