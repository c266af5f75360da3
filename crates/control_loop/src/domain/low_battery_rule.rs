use crate::domain::Rule;
use chrono::{DateTime, Utc};
use common::domain::{Command, CommandAction, Reading, VehicleStatus};
use serde::{Deserialize, Serialize};

pub const LOW_BATTERY_REASON: &str = "Low Battery";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowBatteryRuleConfig {
    /// Battery percentage strictly below which a moving vehicle is recalled
    pub threshold: i32,
}

impl Default for LowBatteryRuleConfig {
    fn default() -> Self {
        Self { threshold: 20 }
    }
}

/// Recall a vehicle to base when its battery runs low while it is moving
///
/// Only `MOVING` triggers the rule. A vehicle that is already `RETURNING` or
/// `CHARGING` is complying, so no further command is issued; `IDLE` and
/// unrecognised statuses are left alone as well.
#[derive(Debug, Clone)]
pub struct LowBatteryRule {
    threshold: i32,
}

impl LowBatteryRule {
    pub fn new(config: &LowBatteryRuleConfig) -> Self {
        Self {
            threshold: config.threshold,
        }
    }
}

impl Default for LowBatteryRule {
    fn default() -> Self {
        Self::new(&LowBatteryRuleConfig::default())
    }
}

impl Rule for LowBatteryRule {
    fn name(&self) -> &'static str {
        "low_battery"
    }

    fn evaluate(&self, reading: &Reading, now: DateTime<Utc>) -> Option<Command> {
        if reading.battery() >= self.threshold || *reading.status() != VehicleStatus::Moving {
            return None;
        }

        Some(Command {
            target_vehicle_id: reading.short_vehicle_id().to_string(),
            action: CommandAction::ReturnToBase,
            reason: LOW_BATTERY_REASON.to_string(),
            issued_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading(vehicle_id: &str, battery: i32, status: VehicleStatus) -> Reading {
        Reading::new(vehicle_id, battery, status, Utc::now())
    }

    fn any_status() -> impl Strategy<Value = VehicleStatus> {
        prop_oneof![
            Just(VehicleStatus::Moving),
            Just(VehicleStatus::Charging),
            Just(VehicleStatus::Returning),
            Just(VehicleStatus::Idle),
            "[A-Za-z_]{0,12}".prop_map(|raw| VehicleStatus::from(raw.as_str())),
        ]
    }

    #[test]
    fn test_moving_with_low_battery_returns_to_base() {
        let now = Utc::now();
        let command = LowBatteryRule::default()
            .evaluate(&reading("factory/agv/007", 15, VehicleStatus::Moving), now)
            .unwrap();

        assert_eq!(command.target_vehicle_id, "007");
        assert_eq!(command.action, CommandAction::ReturnToBase);
        assert_eq!(command.reason, "Low Battery");
        assert_eq!(command.issued_at, now);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let rule = LowBatteryRule::default();
        let now = Utc::now();

        assert!(rule.evaluate(&reading("agv/1", 19, VehicleStatus::Moving), now).is_some());
        assert!(rule.evaluate(&reading("agv/1", 20, VehicleStatus::Moving), now).is_none());
    }

    #[test]
    fn test_complying_vehicles_are_not_recalled_again() {
        let rule = LowBatteryRule::default();
        let now = Utc::now();

        for status in [
            VehicleStatus::Returning,
            VehicleStatus::Charging,
            VehicleStatus::Idle,
            VehicleStatus::Other("Unknown".to_string()),
        ] {
            assert!(rule.evaluate(&reading("factory/agv/007", 5, status), now).is_none());
        }
    }

    #[test]
    fn test_custom_threshold() {
        let rule = LowBatteryRule::new(&LowBatteryRuleConfig { threshold: 35 });
        let now = Utc::now();

        assert!(rule.evaluate(&reading("agv/9", 30, VehicleStatus::Moving), now).is_some());
        assert!(rule.evaluate(&reading("agv/9", 35, VehicleStatus::Moving), now).is_none());
    }

    #[test]
    fn test_missing_vehicle_id_targets_unknown() {
        let command = LowBatteryRule::default()
            .evaluate(&reading("Unknown", 0, VehicleStatus::Moving), Utc::now())
            .unwrap();

        assert_eq!(command.target_vehicle_id, "Unknown");
    }

    #[test]
    fn test_whole_number_float_battery_is_compared_by_value() {
        let rule = LowBatteryRule::default();
        let now = Utc::now();

        let charged = Reading::decode(
            br#"{"agv_id":"factory/agv/007","battery":80.0,"status":"MOVING"}"#,
            now,
        )
        .unwrap();
        assert!(rule.evaluate(&charged, now).is_none());

        let low = Reading::decode(
            br#"{"agv_id":"factory/agv/007","battery":15.0,"status":"MOVING"}"#,
            now,
        )
        .unwrap();
        let command = rule.evaluate(&low, now).unwrap();
        assert_eq!(command.target_vehicle_id, "007");
    }

    #[test]
    fn test_moving_spelled_as_other_still_fires() {
        let moving = VehicleStatus::Other("MOVING".to_string());
        let command = LowBatteryRule::default()
            .evaluate(&reading("factory/agv/007", 5, moving), Utc::now());

        assert!(command.is_some());
    }

    proptest! {
        /// Charged or non-moving vehicles never receive a command.
        #[test]
        fn no_command_unless_moving_and_low(
            battery in any::<i32>(),
            status in any_status(),
            vehicle in "[a-z]{1,8}(/[a-z0-9]{1,8}){0,3}",
        ) {
            prop_assume!(battery >= 20 || status != VehicleStatus::Moving);
            let result = LowBatteryRule::default()
                .evaluate(&reading(&vehicle, battery, status), Utc::now());
            prop_assert!(result.is_none());
        }

        /// Moving vehicles under the threshold get exactly one recall aimed at
        /// their short id.
        #[test]
        fn command_targets_last_path_segment(
            battery in i32::MIN..20,
            segments in proptest::collection::vec("[a-z0-9]{1,8}", 1..5),
        ) {
            let vehicle = segments.join("/");
            let command = LowBatteryRule::default()
                .evaluate(&reading(&vehicle, battery, VehicleStatus::Moving), Utc::now());

            prop_assert!(command.is_some());
            let command = command.unwrap();
            prop_assert_eq!(command.action, CommandAction::ReturnToBase);
            prop_assert_eq!(&command.target_vehicle_id, segments.last().unwrap());
        }
    }
}
