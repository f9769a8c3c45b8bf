// Box API client: one transport shared by the event and file services

use crate::auth::resolve_token;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::EventService;
use crate::files::FileService;
use crate::stream::StreamConfig;
use crate::transport::Transport;

/// Entry point for the Box API
///
/// # Example
///
/// ```ignore
/// use boxwatch_client::{Client, ClientConfig};
///
/// let client = Client::new(&ClientConfig::new(token, "https://api.box.com/2.0"))?;
/// let mut events = client.events().channel(100, "2024-01-01T00:00:00Z");
/// while let Some(item) = events.recv().await {
///     match item {
///         Ok(event) => println!("{} {}", event.created_at, event.event_type),
///         Err(e) => eprintln!("stream error: {}", e),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    stream_config: StreamConfig,
}

impl Client {
    /// Create a client using the config's static token
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(config)?,
            stream_config: StreamConfig::default(),
        })
    }

    /// Create a client, exchanging a JWT assertion for a token if no static token is set
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let token = resolve_token(config).await?;
        Ok(Self {
            transport: Transport::with_token(config, token)?,
            stream_config: StreamConfig::default(),
        })
    }

    /// Use these settings for event streams
    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn events(&self) -> EventService {
        EventService::new(self.transport.clone(), self.stream_config.clone())
    }

    pub fn files(&self) -> FileService {
        FileService::new(self.transport.clone())
    }
}
