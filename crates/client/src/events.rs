// Admin-log events: records, seeding, and page fetching
//
// EventService::channel is the entry point most callers want; it hands back
// an EventStream fed by a background task (see stream.rs).

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::stream::{EventStream, StreamConfig};
use crate::transport::{ApiRequest, Transport};
use crate::types::{null_as_default, ItemParent, StreamPosition, User};

const EVENTS_PATH: &str = "/events";
const ADMIN_LOGS: &str = "admin_logs";

/// One admin-log action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    /// ISO-8601 creation time as sent by the API
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(default)]
    pub created_by: Option<User>,
    #[serde(default)]
    pub source: Option<EventSource>,
    /// String or number depending on the event type
    #[serde(default)]
    pub session_id: Option<serde_json::Value>,
    /// Service-specific payload
    #[serde(default)]
    pub additional_details: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ip_address: String,
}

/// Item an event acted on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub item_name: String,
    #[serde(default)]
    pub parent: Option<ItemParent>,
}

impl Event {
    /// `created_at` parsed as a UTC timestamp
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// A string field of `additional_details`, e.g. `service_id` or `ekm_id`
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.additional_details.as_ref()?.get(key)?.as_str()
    }

    pub fn service_id(&self) -> Option<&str> {
        self.detail("service_id")
    }

    pub fn service_name(&self) -> Option<&str> {
        self.detail("service_name")
    }

    pub fn ekm_id(&self) -> Option<&str> {
        self.detail("ekm_id")
    }

    pub fn version_id(&self) -> Option<&str> {
        self.detail("version_id")
    }
}

/// One page of the event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub chunk_size: u32,
    #[serde(default)]
    pub next_stream_position: StreamPosition,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: Vec<Event>,
}

/// Format a start time the way the events endpoint expects it
pub fn format_start_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Query for the single most recent event after `start_time`
pub(crate) fn seed_request(start_time: &str) -> ApiRequest {
    ApiRequest::get(EVENTS_PATH)
        .query("stream_type", ADMIN_LOGS)
        .query("limit", 1)
        .query("created_after", start_time)
}

/// Query for up to `limit` events from `position`
pub(crate) fn page_request(limit: u32, position: &StreamPosition) -> ApiRequest {
    ApiRequest::get(EVENTS_PATH)
        .query("stream_type", ADMIN_LOGS)
        .query("limit", limit)
        .query("stream_position", position.as_str())
}

/// Admin event log operations
#[derive(Debug, Clone)]
pub struct EventService {
    transport: Transport,
    config: StreamConfig,
}

impl EventService {
    pub fn new(transport: Transport, config: StreamConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Cursor just after the newest event created after `start_time`
    ///
    /// Fails rather than returning an empty cursor, which would read as an
    /// exhausted log.
    #[instrument(skip(self))]
    pub async fn seed_stream_position(&self, start_time: &str) -> Result<StreamPosition> {
        let page: EventsPage = self
            .transport
            .send_with_retries(&seed_request(start_time), &self.config.seed_retry)
            .await?;
        debug!(position = %page.next_stream_position, "Seeded stream position");
        Ok(page.next_stream_position)
    }

    /// Fetch up to `limit` events starting at `position`
    #[instrument(skip(self, position), fields(position = %position))]
    pub async fn fetch_page(&self, limit: u32, position: &StreamPosition) -> Result<EventsPage> {
        let page: EventsPage = self
            .transport
            .send_with_retries(&page_request(limit, position), &self.config.page_retry)
            .await?;
        debug!(
            entries = page.entries.len(),
            next = %page.next_stream_position,
            "Fetched events page"
        );
        Ok(page)
    }

    /// Start streaming events created after `start_time`, `limit` per page
    ///
    /// Returns immediately; seeding and fetching happen on a spawned task, so
    /// this must be called from within a Tokio runtime.
    pub fn channel(&self, limit: u32, start_time: impl Into<String>) -> EventStream {
        let config = self.config.clone().with_event_limit(limit);
        EventStream::spawn(self.clone(), config, start_time.into())
    }

    /// Like [`channel`](Self::channel) with the configured page size and a typed start time
    pub fn channel_since(&self, start: DateTime<Utc>) -> EventStream {
        self.channel(self.config.event_limit, format_start_time(start))
    }
}
