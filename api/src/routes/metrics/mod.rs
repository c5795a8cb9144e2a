pub mod metrics_route;
pub mod trigger_config_route;
