//! Part Directory Service seam.
//!
//! [`PartDirectory`] lists every REST call the tracking core makes. The
//! production implementation is [`HttpPartDirectory`]; tests use the
//! in-memory directory, which enforces the same server-side rules.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::errors::TrackerError;
use crate::models::{
    CurrentUser, OperatorId, OperatorMetrics, Part, PartState, PartSummary, ScannedPart,
    StateGroup, TrackingRecord,
};
use crate::session::Session;

pub mod http;
#[cfg(test)]
pub mod memory;

pub use http::HttpPartDirectory;

/// Remote source of truth for parts and tracking records.
///
/// Every call takes the caller's [`Session`] explicitly. Implementations must
/// fail with [`TrackerError::MissingToken`] / [`TrackerError::SessionExpired`]
/// before doing any I/O when the session cannot be used.
#[async_trait]
pub trait PartDirectory: Send + Sync {
    /// `GET /parts/by-state`
    async fn parts_by_state(&self, session: &Session) -> Result<Vec<StateGroup>, TrackerError>;

    /// `GET /part-tracking/by-state/{state}`
    async fn parts_in_state(
        &self,
        session: &Session,
        state: PartState,
    ) -> Result<Vec<PartSummary>, TrackerError>;

    /// `POST /part-tracking/take/{partId}/{operatorId}`
    async fn take(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError>;

    /// `PUT /part-tracking/complete/{partId}/{operatorId}`
    async fn complete(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError>;

    /// `GET /part-tracking/active/{operatorId}`
    async fn active_tasks(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError>;

    /// `GET /part-tracking/history/{operatorId}`
    async fn task_history(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError>;

    /// `GET /part-tracking/metrics/{operatorId}`
    async fn metrics(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<OperatorMetrics, TrackerError>;

    /// `GET /part/{partId}`
    async fn get_part(&self, session: &Session, part_id: Uuid) -> Result<Part, TrackerError>;

    /// `PUT /part/{partId}/update`
    async fn update_part(&self, session: &Session, part: &Part) -> Result<Part, TrackerError>;

    /// `GET /image-custom-part/{path}`
    async fn part_image(&self, session: &Session, path: &str) -> Result<Vec<u8>, TrackerError>;

    /// `POST /scanned-parts`
    async fn log_scan(
        &self,
        session: &Session,
        entry: &ScannedPart,
    ) -> Result<ScannedPart, TrackerError>;

    /// `GET /scanned-parts?since=...`
    async fn scans_since(
        &self,
        session: &Session,
        since: NaiveDateTime,
    ) -> Result<Vec<ScannedPart>, TrackerError>;

    /// `GET /auth/current-user`
    async fn current_user(&self, session: &Session) -> Result<CurrentUser, TrackerError>;
}
