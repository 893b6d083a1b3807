//! In-memory part directory for tests.
//!
//! Enforces the server-side rules (one active record per operator, a part
//! can only be held once, next state decided on completion) and counts the
//! calls that got past the session check, so tests can assert that a
//! command never reached the directory.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use reqwest::StatusCode;
use uuid::Uuid;

use super::PartDirectory;
use super::http::status_error;
use crate::errors::TrackerError;
use crate::models::{
    CurrentUser, CustomPartRef, OperatorId, OperatorMetrics, Part, PartState, PartSummary,
    ScannedPart, StateGroup, TrackingRecord,
};
use crate::session::Session;

/// Server-side pipeline successor; `None` leaves the state unchanged.
pub fn next_state(state: PartState) -> Option<PartState> {
    use PartState::*;
    match state {
        Development => Some(InProduction),
        InProduction => Some(FactoryQualityControl),
        FactoryQualityControl => Some(WeldingFlapping),
        WeldingFlapping => Some(PhosphatingSanding),
        PhosphatingSanding => Some(Painting),
        Painting => Some(Packing),
        Packing => Some(HomeInstallation),
        HomeInstallation => Some(InstalledSuccess),
        Repainting => Some(Painting),
        Repair => Some(FactoryQualityControl),
        InstalledSuccess | Missing | OutOfSpecReturn => None,
    }
}

#[derive(Default)]
struct Inner {
    parts: BTreeMap<Uuid, Part>,
    records: Vec<TrackingRecord>,
    scans: Vec<ScannedPart>,
    images: HashMap<String, Vec<u8>>,
    current_user: Option<CurrentUser>,
    next_tracking_id: i64,
    next_scan_id: i64,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, (u16, String)>,
}

#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<Inner>,
    delay: Option<Duration>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long (tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_part(&self, state: PartState, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_part(Part {
            id,
            project_id: Some(1),
            custom_part: Some(CustomPartRef {
                id: Some(1),
                custom_part_name: Some(name.to_string()),
                image_file_path: Some(format!("{}.png", name.to_lowercase())),
            }),
            part_material: None,
            totalweight_kg: None,
            sheet_thickness_mm: None,
            length_pieces_mm: None,
            height_mm: None,
            width_mm: None,
            observations: None,
            reception_state: Some(false),
            scan_date_time: None,
            quality_control_state: None,
            part_state: Some(state),
            qr_code_file_path: None,
            extra: Default::default(),
        });
        id
    }

    pub fn insert_part(&self, part: Part) {
        self.inner.lock().unwrap().parts.insert(part.id, part);
    }

    pub fn set_image(&self, path: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .images
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn set_current_user(&self, user: CurrentUser) {
        self.inner.lock().unwrap().current_user = Some(user);
    }

    /// Make every call to `endpoint` fail with the given status and text.
    pub fn fail(&self, endpoint: &'static str, status: u16, message: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert(endpoint, (status, message.to_string()));
    }

    pub fn clear_failures(&self) {
        self.inner.lock().unwrap().failures.clear();
    }

    /// Calls to `endpoint` that passed the session check.
    pub fn calls(&self, endpoint: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner.lock().unwrap().calls.values().sum()
    }

    pub fn part(&self, id: Uuid) -> Option<Part> {
        self.inner.lock().unwrap().parts.get(&id).cloned()
    }

    pub fn records(&self) -> Vec<TrackingRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn scans(&self) -> Vec<ScannedPart> {
        self.inner.lock().unwrap().scans.clone()
    }

    pub fn active_count(&self, operator_id: OperatorId) -> usize {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.operator_id == Some(operator_id) && !r.completed)
            .count()
    }

    async fn enter(&self, session: &Session, endpoint: &'static str) -> Result<(), TrackerError> {
        session.bearer(Utc::now())?;
        let failure = {
            let mut inner = self.inner.lock().unwrap();
            *inner.calls.entry(endpoint).or_insert(0) += 1;
            inner.failures.get(endpoint).cloned()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some((status, message)) => Err(status_error(
                StatusCode::from_u16(status).unwrap(),
                &message,
            )),
            None => Ok(()),
        }
    }
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn not_found(message: String) -> TrackerError {
    TrackerError::NotFound { message }
}

fn summarize(part: &Part, active: Option<&TrackingRecord>) -> PartSummary {
    PartSummary {
        part_id: part.id,
        project_id: part.project_id,
        part_name: Some(part.display_name().to_string()),
        part_state: part.part_state,
        scan_date_time: part.scan_date_time,
        tracking_id: active.map(|r| r.tracking_id),
        start_time: active.and_then(|r| r.start_time),
        taken: active.is_some(),
    }
}

impl Inner {
    fn active_for_part(&self, part_id: Uuid) -> Option<&TrackingRecord> {
        self.records
            .iter()
            .find(|r| r.part_id == part_id && !r.completed)
    }
}

#[async_trait]
impl PartDirectory for MemoryDirectory {
    async fn parts_by_state(&self, session: &Session) -> Result<Vec<StateGroup>, TrackerError> {
        self.enter(session, "parts_by_state").await?;
        let inner = self.inner.lock().unwrap();
        let mut groups: BTreeMap<PartState, Vec<PartSummary>> = BTreeMap::new();
        for part in inner.parts.values() {
            if let Some(state) = part.part_state {
                groups
                    .entry(state)
                    .or_default()
                    .push(summarize(part, inner.active_for_part(part.id)));
            }
        }
        Ok(groups
            .into_iter()
            .map(|(state, parts)| StateGroup { state, parts })
            .collect())
    }

    async fn parts_in_state(
        &self,
        session: &Session,
        state: PartState,
    ) -> Result<Vec<PartSummary>, TrackerError> {
        self.enter(session, "parts_in_state").await?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .parts
            .values()
            .filter(|p| p.part_state == Some(state))
            .map(|p| summarize(p, inner.active_for_part(p.id)))
            .collect())
    }

    async fn take(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError> {
        self.enter(session, "take").await?;
        let mut inner = self.inner.lock().unwrap();
        let part = inner
            .parts
            .get(&part_id)
            .cloned()
            .ok_or_else(|| not_found(format!("Pieza no encontrada: {}", part_id)))?;
        if inner.active_for_part(part_id).is_some() {
            return Err(TrackerError::Conflict {
                message: "La pieza ya está tomada por otro usuario.".to_string(),
            });
        }
        if let Some(held) = inner
            .records
            .iter()
            .find(|r| r.operator_id == Some(operator_id) && !r.completed)
        {
            return Err(TrackerError::Conflict {
                message: format!("El usuario ya tiene una pieza activa: {}", held.part_id),
            });
        }
        inner.next_tracking_id += 1;
        let record = TrackingRecord {
            tracking_id: inner.next_tracking_id,
            part_id,
            project_id: part.project_id,
            part_name: Some(part.display_name().to_string()),
            part_state: part.part_state,
            operator_id: Some(operator_id),
            scan_date_time: part.scan_date_time,
            start_time: Some(now()),
            end_time: None,
            task_duration: None,
            completed: false,
            taken: true,
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn complete(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError> {
        self.enter(session, "complete").await?;
        let mut inner = self.inner.lock().unwrap();
        let current = inner
            .parts
            .get(&part_id)
            .and_then(|p| p.part_state)
            .ok_or_else(|| not_found(format!("Pieza no encontrada: {}", part_id)))?;
        let next = next_state(current);
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.part_id == part_id && r.operator_id == Some(operator_id) && !r.completed)
            .ok_or_else(|| {
                not_found("No se encontró una tarea activa para esta pieza y usuario".to_string())
            })?;
        let end = now();
        record.end_time = Some(end);
        record.completed = true;
        record.taken = false;
        record.task_duration = record.start_time.map(|start| (end - start).num_minutes());
        if let Some(next) = next {
            record.part_state = Some(next);
        }
        // The server's reply omits the completion flag and duration.
        let record = TrackingRecord {
            completed: false,
            task_duration: None,
            ..record.clone()
        };
        if let (Some(next), Some(part)) = (next, inner.parts.get_mut(&part_id)) {
            part.part_state = Some(next);
        }
        Ok(record)
    }

    async fn active_tasks(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError> {
        self.enter(session, "active_tasks").await?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| r.operator_id == Some(operator_id) && !r.completed)
            .cloned()
            .collect())
    }

    async fn task_history(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError> {
        self.enter(session, "task_history").await?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| r.operator_id == Some(operator_id))
            .cloned()
            .collect())
    }

    async fn metrics(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<OperatorMetrics, TrackerError> {
        self.enter(session, "metrics").await?;
        let inner = self.inner.lock().unwrap();
        let done: Vec<&TrackingRecord> = inner
            .records
            .iter()
            .filter(|r| r.operator_id == Some(operator_id) && r.completed)
            .collect();
        let minutes = |r: &TrackingRecord| r.task_duration.unwrap_or(0) as f64;
        let mut metrics = OperatorMetrics {
            total_tasks: done.len() as u64,
            ..Default::default()
        };
        if !done.is_empty() {
            metrics.average_task_duration =
                done.iter().map(|r| minutes(*r)).sum::<f64>() / done.len() as f64;
        }
        let mut by_state: BTreeMap<PartState, Vec<f64>> = BTreeMap::new();
        for record in &done {
            if let Some(state) = record.part_state {
                by_state.entry(state).or_default().push(minutes(*record));
            }
        }
        metrics.avg_duration_by_category = by_state
            .into_iter()
            .map(|(state, values)| (state, values.iter().sum::<f64>() / values.len() as f64))
            .collect();
        for period in ["DAY", "MONTH", "YEAR"] {
            metrics
                .part_count_by_period
                .insert(period.to_string(), done.len() as u64);
        }
        Ok(metrics)
    }

    async fn get_part(&self, session: &Session, part_id: Uuid) -> Result<Part, TrackerError> {
        self.enter(session, "get_part").await?;
        self.part(part_id)
            .ok_or_else(|| not_found(format!("Pieza no encontrada con ID: {}", part_id)))
    }

    async fn update_part(&self, session: &Session, part: &Part) -> Result<Part, TrackerError> {
        self.enter(session, "update_part").await?;
        let mut inner = self.inner.lock().unwrap();
        match inner.parts.get_mut(&part.id) {
            Some(stored) => {
                *stored = part.clone();
                Ok(stored.clone())
            }
            None => Err(not_found(format!("Pieza no encontrada con ID: {}", part.id))),
        }
    }

    async fn part_image(&self, session: &Session, path: &str) -> Result<Vec<u8>, TrackerError> {
        self.enter(session, "part_image").await?;
        self.inner
            .lock()
            .unwrap()
            .images
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(format!("Imagen no encontrada: {}", path)))
    }

    async fn log_scan(
        &self,
        session: &Session,
        entry: &ScannedPart,
    ) -> Result<ScannedPart, TrackerError> {
        self.enter(session, "log_scan").await?;
        let mut inner = self.inner.lock().unwrap();
        inner.next_scan_id += 1;
        let mut stored = entry.clone();
        stored.id = Some(inner.next_scan_id);
        inner.scans.push(stored.clone());
        Ok(stored)
    }

    async fn scans_since(
        &self,
        session: &Session,
        since: NaiveDateTime,
    ) -> Result<Vec<ScannedPart>, TrackerError> {
        self.enter(session, "scans_since").await?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .scans
            .iter()
            .filter(|s| s.scan_date_time.is_some_and(|at| at >= since))
            .cloned()
            .collect())
    }

    async fn current_user(&self, session: &Session) -> Result<CurrentUser, TrackerError> {
        self.enter(session, "current_user").await?;
        self.inner
            .lock()
            .unwrap()
            .current_user
            .clone()
            .ok_or_else(|| TrackerError::Unauthorized {
                status: 401,
                message: String::new(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(operator: OperatorId) -> Session {
        Session::new("token", operator)
    }

    #[test]
    fn test_next_state_follows_pipeline() {
        assert_eq!(next_state(PartState::Painting), Some(PartState::Packing));
        assert_eq!(next_state(PartState::Repair), Some(PartState::FactoryQualityControl));
        assert_eq!(next_state(PartState::Repainting), Some(PartState::Painting));
        assert_eq!(next_state(PartState::InstalledSuccess), None);
        assert_eq!(next_state(PartState::Missing), None);
    }

    #[tokio::test]
    async fn test_server_rejects_second_active_take() {
        let dir = MemoryDirectory::new();
        let p1 = dir.add_part(PartState::Painting, "P1");
        let p2 = dir.add_part(PartState::Painting, "P2");
        dir.take(&session(1), p1, 1).await.unwrap();
        let err = dir.take(&session(1), p2, 1).await.unwrap_err();
        assert!(matches!(err, TrackerError::Conflict { .. }));
        assert_eq!(dir.active_count(1), 1);
    }

    #[tokio::test]
    async fn test_part_cannot_be_held_twice() {
        let dir = MemoryDirectory::new();
        let p1 = dir.add_part(PartState::Painting, "P1");
        dir.take(&session(1), p1, 1).await.unwrap();
        let err = dir.take(&session(2), p1, 2).await.unwrap_err();
        assert_eq!(err.user_message(), "La pieza ya está tomada por otro usuario.");
    }

    #[tokio::test]
    async fn test_complete_advances_state() {
        let dir = MemoryDirectory::new();
        let p1 = dir.add_part(PartState::WeldingFlapping, "P1");
        dir.take(&session(1), p1, 1).await.unwrap();
        let record = dir.complete(&session(1), p1, 1).await.unwrap();
        assert!(record.completed);
        assert_eq!(record.task_duration, Some(0));
        assert_eq!(
            dir.part(p1).unwrap().part_state,
            Some(PartState::PhosphatingSanding)
        );
    }

    #[tokio::test]
    async fn test_expired_session_is_not_counted() {
        let dir = MemoryDirectory::new();
        let expired = session(1).with_expiry(Utc::now() - chrono::Duration::seconds(5));
        assert!(dir.parts_by_state(&expired).await.is_err());
        assert_eq!(dir.total_calls(), 0);
    }
}
