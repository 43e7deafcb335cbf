use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global recorder and serves `/metrics` on `addr`. Must be
/// called from within a Tokio runtime.
pub fn init_metrics(
    addr: SocketAddr,
) -> Result<MetricsHandle, Box<dyn std::error::Error + Send + Sync>> {
    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
    let handle = recorder.handle();

    metrics::set_global_recorder(recorder).map_err(|_| "metrics recorder already installed")?;

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Prometheus exporter stopped");
        }
    });

    let upkeep = handle.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    info!(%addr, "Prometheus metrics server started");

    Ok(MetricsHandle { handle })
}

pub fn init_metrics_without_server(
) -> Result<MetricsHandle, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(MetricsHandle { handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ListenerCollector;
    use std::sync::OnceLock;

    static TEST_HANDLE: OnceLock<MetricsHandle> = OnceLock::new();

    fn get_test_handle() -> &'static MetricsHandle {
        TEST_HANDLE
            .get_or_init(|| init_metrics_without_server().expect("Failed to create metrics handle"))
    }

    #[test]
    fn test_rendered_output_contains_listener_metrics() {
        let handle = get_test_handle();

        let collector = ListenerCollector::new("render_test_channel");
        collector.record_event_received();
        collector.record_decision("invalidate");

        let output = handle.render();
        assert!(output.contains("revalidate_events_received_total"));
        assert!(output.contains("render_test_channel"));
    }
}
