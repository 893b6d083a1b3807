use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use super::PartDirectory;
use crate::config::QsConfig;
use crate::errors::TrackerError;
use crate::models::{
    CurrentUser, OperatorId, OperatorMetrics, Part, PartState, PartSummary, ScannedPart,
    StateGroup, TrackingRecord,
};
use crate::session::Session;

const USER_AGENT: &str = concat!("qstrack/", env!("CARGO_PKG_VERSION"));

/// REST client for the part directory server.
///
/// One `reqwest::Client` is shared by all calls; its timeouts are the
/// explicit request-timeout contract of the client.
#[derive(Debug, Clone)]
pub struct HttpPartDirectory {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPartDirectory {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(TrackerError::Transport)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &QsConfig) -> Result<Self, TrackerError> {
        Self::new(
            config.base_url(),
            config.request_timeout(),
            config.connect_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Build an authenticated request. Fails locally, without I/O, when the
    /// session has no usable token.
    fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, TrackerError> {
        let bearer = session.bearer(Utc::now())?;
        Ok(self
            .client
            .request(method, self.url(path))
            .header(reqwest::header::AUTHORIZATION, bearer))
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response, TrackerError> {
        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::from_reqwest(e, self.timeout))?;
        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "part directory response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = status_error(status, &body);
        warn!(endpoint, status = status.as_u16(), error = %err, "part directory rejected request");
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, TrackerError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrackerError::from_reqwest(e, self.timeout))?;
        serde_json::from_slice(&bytes).map_err(|e| TrackerError::InvalidResponse {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<T, TrackerError> {
        let request = self.request(session, Method::GET, path)?;
        let response = self.send(request, path).await?;
        self.decode(response, path).await
    }

    async fn send_json<B, T>(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, TrackerError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.request(session, method, path)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(request, path).await?;
        self.decode(response, path).await
    }
}

/// Map a non-2xx response onto the error taxonomy, keeping the server text.
pub(crate) fn status_error(status: StatusCode, body: &str) -> TrackerError {
    let message = server_message(body);
    match status {
        StatusCode::NOT_FOUND => TrackerError::NotFound { message },
        StatusCode::CONFLICT => TrackerError::Conflict { message },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TrackerError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        _ => TrackerError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// Server error text: a JSON `message` or `error` field, a bare JSON string,
/// or the raw body.
pub(crate) fn server_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => ["message", "error"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(|v| v.as_str()))
            .find(|m| !m.trim().is_empty())
            .unwrap_or_default()
            .to_string(),
        Ok(serde_json::Value::String(text)) => text,
        _ => body.trim().to_string(),
    }
}

#[async_trait]
impl PartDirectory for HttpPartDirectory {
    async fn parts_by_state(&self, session: &Session) -> Result<Vec<StateGroup>, TrackerError> {
        self.get_json(session, "parts/by-state").await
    }

    async fn parts_in_state(
        &self,
        session: &Session,
        state: PartState,
    ) -> Result<Vec<PartSummary>, TrackerError> {
        self.get_json(session, &format!("part-tracking/by-state/{}", state.as_str()))
            .await
    }

    async fn take(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError> {
        let path = format!("part-tracking/take/{}/{}", part_id, operator_id);
        self.send_json::<(), _>(session, Method::POST, &path, None).await
    }

    async fn complete(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError> {
        let path = format!("part-tracking/complete/{}/{}", part_id, operator_id);
        self.send_json::<(), _>(session, Method::PUT, &path, None).await
    }

    async fn active_tasks(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError> {
        self.get_json(session, &format!("part-tracking/active/{}", operator_id))
            .await
    }

    async fn task_history(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError> {
        self.get_json(session, &format!("part-tracking/history/{}", operator_id))
            .await
    }

    async fn metrics(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<OperatorMetrics, TrackerError> {
        self.get_json(session, &format!("part-tracking/metrics/{}", operator_id))
            .await
    }

    async fn get_part(&self, session: &Session, part_id: Uuid) -> Result<Part, TrackerError> {
        self.get_json(session, &format!("part/{}", part_id)).await
    }

    async fn update_part(&self, session: &Session, part: &Part) -> Result<Part, TrackerError> {
        let path = format!("part/{}/update", part.id);
        self.send_json(session, Method::PUT, &path, Some(part)).await
    }

    async fn part_image(&self, session: &Session, path: &str) -> Result<Vec<u8>, TrackerError> {
        let path = format!("image-custom-part/{}", path.trim_start_matches('/'));
        let request = self.request(session, Method::GET, &path)?;
        let response = self.send(request, &path).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrackerError::from_reqwest(e, self.timeout))?;
        Ok(bytes.to_vec())
    }

    async fn log_scan(
        &self,
        session: &Session,
        entry: &ScannedPart,
    ) -> Result<ScannedPart, TrackerError> {
        self.send_json(session, Method::POST, "scanned-parts", Some(entry))
            .await
    }

    async fn scans_since(
        &self,
        session: &Session,
        since: NaiveDateTime,
    ) -> Result<Vec<ScannedPart>, TrackerError> {
        let since = since.format("%Y-%m-%dT%H:%M:%S").to_string();
        let request = self
            .request(session, Method::GET, "scanned-parts")?
            .query(&[("since", since.as_str())]);
        let response = self.send(request, "scanned-parts").await?;
        self.decode(response, "scanned-parts").await
    }

    async fn current_user(&self, session: &Session) -> Result<CurrentUser, TrackerError> {
        self.get_json(session, "auth/current-user").await
    }
}
