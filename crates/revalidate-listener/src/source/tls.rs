use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use tokio_postgres::config::SslMode;
use tokio_postgres_rustls::MakeRustlsConnect;

use crate::error::{ListenerError, Result};

/// `disable` and `prefer` (the default) connect in plain text; anything
/// stricter goes through rustls.
pub(crate) fn requires_tls(config: &tokio_postgres::Config) -> bool {
    !matches!(config.get_ssl_mode(), SslMode::Disable | SslMode::Prefer)
}

/// Verifies the server against the system trust store, falling back to the
/// bundled webpki roots when the system store is unusable.
pub(crate) fn rustls_connector() -> Result<MakeRustlsConnect> {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        tracing::warn!(error = %err, "Failed to load system certificate");
    }
    for cert in native.certs {
        if let Err(e) = roots.add(cert) {
            tracing::debug!(error = %e, "Skipping system certificate");
        }
    }
    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    tracing::debug!(roots = roots.len(), "Loaded TLS roots for postgres");

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| ListenerError::Config(format!("failed to configure TLS: {}", e)))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(url: &str) -> tokio_postgres::Config {
        url.parse().unwrap()
    }

    #[test]
    fn test_sslmode_selects_tls() {
        assert!(!requires_tls(&parse("postgres://app@localhost/app")));
        assert!(!requires_tls(&parse("postgres://app@localhost/app?sslmode=disable")));
        assert!(!requires_tls(&parse("postgres://app@localhost/app?sslmode=prefer")));
        assert!(requires_tls(&parse("postgres://app@db.example.com/app?sslmode=require")));
        assert!(requires_tls(&parse("host=db.example.com user=app sslmode=require")));
    }

    #[test]
    fn test_rustls_connector_builds() {
        assert!(rustls_connector().is_ok());
    }
}
