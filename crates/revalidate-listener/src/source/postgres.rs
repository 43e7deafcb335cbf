use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_postgres::{AsyncMessage, Client, Connection, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;

use super::tls::{requires_tls, rustls_connector};
use super::ChangeSource;
use crate::config::{validate_channel_name, SourceConfig};
use crate::error::{ListenerError, Result};

/// Applied when the connection string does not set `connect_timeout`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type NotificationResult = std::result::Result<String, tokio_postgres::Error>;

/// `LISTEN`s on a PostgreSQL channel; each `NOTIFY` payload is one cache key.
///
/// TLS follows the connection string's `sslmode`.
pub struct PgChangeSource {
    config: SourceConfig,
    pg_config: tokio_postgres::Config,
    tls: Option<MakeRustlsConnect>,
    client: Option<Client>,
    notifications: Option<mpsc::UnboundedReceiver<NotificationResult>>,
    connection_task: Option<JoinHandle<()>>,
}

impl PgChangeSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        validate_channel_name(&config.channel)?;

        let mut pg_config: tokio_postgres::Config = config
            .database_url
            .parse()
            .map_err(|e| ListenerError::Config(format!("invalid database url: {}", e)))?;
        if pg_config.get_connect_timeout().is_none() {
            pg_config.connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        }

        let tls = if requires_tls(&pg_config) {
            Some(rustls_connector()?)
        } else {
            None
        };

        Ok(Self {
            config,
            pg_config,
            tls,
            client: None,
            notifications: None,
            connection_task: None,
        })
    }

    pub fn is_subscribed(&self) -> bool {
        self.client.as_ref().map(|c| !c.is_closed()).unwrap_or(false)
    }

    pub fn uses_tls(&self) -> bool {
        self.tls.is_some()
    }

    fn close(&mut self) {
        self.client = None;
        self.notifications = None;
        if let Some(task) = self.connection_task.take() {
            task.abort();
        }
    }

    async fn connect(&mut self) -> Result<Client> {
        let channel = self.config.channel.clone();
        let (client, rx, task) = match &self.tls {
            Some(tls) => {
                let (client, connection) = self.pg_config.connect(tls.clone()).await?;
                let (rx, task) = forward_notifications(channel, connection);
                (client, rx, task)
            }
            None => {
                let (client, connection) = self.pg_config.connect(NoTls).await?;
                let (rx, task) = forward_notifications(channel, connection);
                (client, rx, task)
            }
        };
        self.connection_task = Some(task);
        self.notifications = Some(rx);
        Ok(client)
    }
}

/// Quoted so the channel keeps its case and reserved words stay valid.
/// `validate_channel_name` rules out embedded quotes.
fn listen_statement(channel: &str) -> String {
    format!("LISTEN \"{}\"", channel)
}

/// The connection only makes progress while polled, and notifications arrive
/// through it rather than through the client.
fn forward_notifications<S, T>(
    channel: String,
    mut connection: Connection<S, T>,
) -> (mpsc::UnboundedReceiver<NotificationResult>, JoinHandle<()>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut messages =
            std::pin::pin!(futures::stream::poll_fn(move |cx| connection.poll_message(cx)));
        while let Some(message) = messages.next().await {
            match message {
                Ok(AsyncMessage::Notification(notification)) => {
                    if tx.send(Ok(notification.payload().to_string())).is_err() {
                        break;
                    }
                }
                Ok(AsyncMessage::Notice(notice)) => {
                    tracing::debug!(channel = %channel, notice = %notice, "Postgres notice");
                }
                Ok(_) => {}
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    (rx, task)
}

#[async_trait]
impl ChangeSource for PgChangeSource {
    async fn subscribe(&mut self) -> Result<()> {
        self.close();

        let client = self.connect().await?;

        if let Err(e) = client
            .batch_execute(&listen_statement(&self.config.channel))
            .await
        {
            self.close();
            return Err(e.into());
        }

        self.client = Some(client);
        Ok(())
    }

    async fn next_payload(&mut self) -> Result<Option<String>> {
        let notifications = self
            .notifications
            .as_mut()
            .ok_or_else(|| ListenerError::Subscription("not subscribed".to_string()))?;

        match notifications.recv().await {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(e)) => {
                self.close();
                Err(e.into())
            }
            None => {
                self.close();
                Ok(None)
            }
        }
    }

    fn channel(&self) -> &str {
        &self.config.channel
    }

    fn describe(&self) -> String {
        format!("postgres channel {}", self.config.channel)
    }
}

impl Drop for PgChangeSource {
    fn drop(&mut self) {
        self.close();
    }
}
