pub mod collectors;
pub mod prometheus;

pub use collectors::ListenerCollector;
pub use prometheus::{init_metrics, init_metrics_without_server, MetricsHandle};
