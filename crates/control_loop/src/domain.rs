mod ingestion_service;
mod low_battery_rule;
mod rule;
mod rule_engine;

pub use ingestion_service::*;
pub use low_battery_rule::*;
pub use rule::*;
pub use rule_engine::*;
