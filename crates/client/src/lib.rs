// Box API client
//
// Transport, retries, JWT auth, file lookups, and a continuous admin-log
// event stream built on the cursor-paged /events endpoint.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod files;
pub mod retry;
pub mod stream;
pub mod transport;
pub mod types;

pub use auth::{resolve_token, AccessToken, Authenticator};
pub use client::Client;
pub use config::{ClientConfig, Config, EventsConfig, JwtCustomClaims};
pub use error::{ClientError, Result};
pub use events::{Event, EventService, EventSource, EventsPage};
pub use files::{File, FileService};
pub use retry::RetryPolicy;
pub use stream::{EventStream, StreamConfig, StreamItem};
pub use transport::{ApiRequest, Transport};
pub use types::{ItemParent, StreamPosition, User};
