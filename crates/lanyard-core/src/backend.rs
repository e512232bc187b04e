//! Backend collaborator client.
//!
//! The backend owns event definitions, device registration and
//! identity-level deduplication; this crate only calls it and interprets
//! responses. [`EventBackend`] is the port the controllers consume, so tests
//! substitute an in-memory stub; [`HttpBackend`] is the production adapter.
//!
//! Every request carries the API key header and a bounded timeout, and any
//! non-2xx status is a failure regardless of the response body.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{LanyardError, Result};
use crate::types::{AttendanceRecord, BatchOutcome, EventAction, EventSummary};

/// Header carrying the scanner's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Timeout for the small read endpoints.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the batch checkin post, which can carry a large backlog.
const BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the pipeline needs from the backend.
///
/// Futures are `Send` so controllers built over any implementation can run
/// inside spawned tasks.
pub trait EventBackend: Send + Sync {
    /// Fetch the events currently open for attendance.
    fn active_events(&self) -> impl Future<Output = Result<Vec<EventSummary>>> + Send;

    /// Fetch the device identifiers registered for `event_id`.
    fn registered_devices(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<HashSet<String>>> + Send;

    /// Submit pending records in one batch and return the per-batch counts.
    fn batch_checkin(
        &self,
        records: &[AttendanceRecord],
    ) -> impl Future<Output = Result<BatchOutcome>> + Send;

    /// Activate or deactivate an event on the backend.
    fn event_control(
        &self,
        event_id: &str,
        action: EventAction,
    ) -> impl Future<Output = Result<EventSummary>> + Send;
}

#[derive(Debug, Deserialize)]
struct ActiveEventsEnvelope {
    #[serde(default)]
    events: Vec<EventSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredDevicesEnvelope {
    #[serde(default)]
    device_uuids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BatchCheckinBody<'a> {
    records: &'a [AttendanceRecord],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventControlBody<'a> {
    event_id: &'a str,
    action: EventAction,
}

#[derive(Debug, Deserialize)]
struct EventControlEnvelope {
    event: EventSummary,
}

/// Production [`EventBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    /// Build a client for the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`LanyardError::BackendUnreachable`] when the underlying TLS
    /// stack cannot be initialized.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(BATCH_TIMEOUT)
            .build()
            .map_err(|e| LanyardError::BackendUnreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .map_err(|e| LanyardError::BackendUnreachable(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| LanyardError::BackendUnreachable(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(LanyardError::BackendRejected {
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| LanyardError::BackendResponseMalformed(e.to_string()))
    }
}

impl EventBackend for HttpBackend {
    async fn active_events(&self) -> Result<Vec<EventSummary>> {
        let envelope: ActiveEventsEnvelope = self.get_json("active-events", &[]).await?;
        Ok(envelope.events)
    }

    async fn registered_devices(&self, event_id: &str) -> Result<HashSet<String>> {
        let envelope: RegisteredDevicesEnvelope = self
            .get_json("registered-devices", &[("eventId", event_id)])
            .await?;
        Ok(envelope.device_uuids.into_iter().collect())
    }

    async fn batch_checkin(&self, records: &[AttendanceRecord]) -> Result<BatchOutcome> {
        self.post_json("batch-checkin", &BatchCheckinBody { records }, BATCH_TIMEOUT)
            .await
    }

    async fn event_control(&self, event_id: &str, action: EventAction) -> Result<EventSummary> {
        let envelope: EventControlEnvelope = self
            .post_json(
                "event-control",
                &EventControlBody { event_id, action },
                READ_TIMEOUT,
            )
            .await?;
        Ok(envelope.event)
    }
}
