pub mod alert_logs;
pub mod devices;
pub mod owners;
pub mod readings;
