use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use revalidate_core::{InvalidationTag, TagMapping, TagRule};
use revalidate_listener::{
    ChangeListener, EndpointConfig, HttpDispatcher, ListenerConfig, PgChangeSource, PolicyConfig,
    ReconnectConfig, SourceConfig, DEFAULT_CHANNEL, DEFAULT_ENDPOINT_PATH,
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "revalidated")]
#[command(about = "Invalidates cached pages when the database reports a burst of changes")]
struct Args {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, env = "REVALIDATE_CHANNEL", default_value = DEFAULT_CHANNEL)]
    channel: String,

    #[arg(long, env = "REVALIDATE_ENDPOINT_URL")]
    endpoint_url: String,

    #[arg(long, env = "REVALIDATE_ENDPOINT_PATH", default_value = DEFAULT_ENDPOINT_PATH)]
    endpoint_path: String,

    #[arg(long, default_value = "10")]
    dispatch_timeout_secs: u64,

    #[arg(long, env = "REVALIDATE_WINDOW_SECS", default_value = "3600")]
    window_secs: u64,

    #[arg(long, env = "REVALIDATE_COUNT_THRESHOLD", default_value = "60")]
    count_threshold: u32,

    #[arg(long, env = "REVALIDATE_DEFAULT_TAG", default_value = InvalidationTag::USER_DATA)]
    default_tag: InvalidationTag,

    /// Maps cache keys starting with PREFIX to TAG; the first matching rule wins.
    #[arg(long = "tag-rule", value_name = "PREFIX=TAG")]
    tag_rules: Vec<TagRule>,

    #[arg(long, default_value = "1000")]
    reconnect_backoff_ms: u64,

    #[arg(long, default_value = "30000")]
    max_reconnect_backoff_ms: u64,

    #[arg(long, default_value = "0.0.0.0:9090")]
    metrics_addr: SocketAddr,
}

impl Args {
    fn listener_config(&self) -> ListenerConfig {
        let source = SourceConfig::new(&self.database_url).with_channel(&self.channel);
        let endpoint = EndpointConfig::new(&self.endpoint_url)
            .with_path(&self.endpoint_path)
            .with_timeout(Duration::from_secs(self.dispatch_timeout_secs));

        ListenerConfig::new(source, endpoint)
            .with_policy(PolicyConfig::new(
                Duration::from_secs(self.window_secs),
                self.count_threshold,
            ))
            .with_reconnect(ReconnectConfig {
                initial_backoff: Duration::from_millis(self.reconnect_backoff_ms),
                max_backoff: Duration::from_millis(self.max_reconnect_backoff_ms),
                ..ReconnectConfig::default()
            })
            .with_tags(
                TagMapping::new(self.default_tag.clone()).with_rules(self.tag_rules.iter().cloned()),
            )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = args.listener_config();
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    let _metrics = revalidate_metrics::init_metrics(args.metrics_addr)
        .map_err(|e| anyhow::anyhow!("metrics init failed: {}", e))?;

    let endpoint_url = config.endpoint.url()?;
    tracing::info!(
        channel = %config.source.channel,
        endpoint = %endpoint_url,
        window_secs = args.window_secs,
        count_threshold = args.count_threshold,
        default_tag = %config.tags.default_tag(),
        tag_rules = config.tags.rules().len(),
        "Starting revalidation listener"
    );

    let source = PgChangeSource::new(config.source.clone())?;
    let dispatcher = HttpDispatcher::new(&config.endpoint)?;
    let mut listener = ChangeListener::from_config(source, dispatcher, &config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener_handle = tokio::spawn(async move {
        listener.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down revalidation listener");

    let _ = shutdown_tx.send(true);
    listener_handle.await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "revalidated",
            "--database-url",
            "postgres://app@localhost/app",
            "--endpoint-url",
            "https://web.example.com",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_tag_rules_are_repeatable() {
        let args = parse(&["--tag-rule", "orders:=order-list", "--tag-rule", "usuario:=user-data"]);
        let config = args.listener_config();

        assert_eq!(config.tags.rules().len(), 2);
        assert_eq!(config.tags.tag_for_key("orders:1").as_str(), "order-list");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_tag_rule_is_rejected() {
        let argv = [
            "revalidated",
            "--database-url",
            "postgres://app@localhost/app",
            "--endpoint-url",
            "https://web.example.com",
            "--tag-rule",
            "no-separator",
        ];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_zero_threshold_fails_validation() {
        let args = parse(&["--count-threshold", "0"]);
        assert!(args.listener_config().validate().is_err());
    }

    #[test]
    fn test_policy_and_timeout_flags() {
        let args = parse(&["--window-secs", "60", "--dispatch-timeout-secs", "3"]);
        let config = args.listener_config();
        assert_eq!(config.policy.window_duration, Duration::from_secs(60));
        assert_eq!(config.endpoint.timeout, Duration::from_secs(3));
        assert_eq!(
            config.endpoint.url().unwrap().as_str(),
            "https://web.example.com/api/invalidate"
        );
    }
}
