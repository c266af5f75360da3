pub mod domain;
pub mod ingestion_loop;
pub mod mqtt;
