pub mod app_config;
pub mod app_state;
pub mod request_id;
pub mod telemetry;
