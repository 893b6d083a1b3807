//! Task Tracking Engine.
//!
//! The only entry point for starting and finishing work on a part. Screens
//! and commands never call the take/complete endpoints directly.
//!
//! The one-active-task rule is checked locally before a take is issued, but
//! the server stays authoritative: a second device for the same operator can
//! still pass the local check, and the server then rejects the take.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::PartDirectory;
use crate::errors::TrackerError;
use crate::models::{OperatorId, OperatorMetrics, TrackingId, TrackingRecord, UserTasks};
use crate::session::Session;

pub const DEFAULT_COMPLETED_LIMIT: usize = 15;

#[derive(Clone)]
pub struct TaskTracker {
    directory: Arc<dyn PartDirectory>,
    completed_limit: usize,
    in_flight: Arc<Mutex<HashSet<OperatorId>>>,
}

/// Marks a take/complete as outstanding for one operator until dropped.
struct InFlight {
    operators: Arc<Mutex<HashSet<OperatorId>>>,
    operator_id: OperatorId,
}

impl InFlight {
    fn acquire(
        operators: &Arc<Mutex<HashSet<OperatorId>>>,
        operator_id: OperatorId,
    ) -> Result<Self, TrackerError> {
        let mut set = operators.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(operator_id) {
            return Err(TrackerError::CommandInFlight { operator_id });
        }
        Ok(Self {
            operators: operators.clone(),
            operator_id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.operators
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.operator_id);
    }
}

impl TaskTracker {
    pub fn new(directory: Arc<dyn PartDirectory>) -> Self {
        Self {
            directory,
            completed_limit: DEFAULT_COMPLETED_LIMIT,
            in_flight: Arc::default(),
        }
    }

    pub fn with_completed_limit(mut self, limit: usize) -> Self {
        self.completed_limit = limit;
        self
    }

    /// Start work on `part_id` for the session's operator.
    ///
    /// Fails locally with [`TrackerError::ActiveTaskHeld`], without issuing
    /// the take, when the operator already holds an incomplete record.
    pub async fn take_part(
        &self,
        session: &Session,
        part_id: Uuid,
    ) -> Result<TrackingRecord, TrackerError> {
        let operator_id = session.operator_id;
        let _guard = InFlight::acquire(&self.in_flight, operator_id)?;

        let active = self.directory.active_tasks(session, operator_id).await?;
        if let Some(held) = active.first() {
            info!(
                operator_id,
                part_id = %part_id,
                held_part_id = %held.part_id,
                "take refused: operator already holds an active task"
            );
            return Err(TrackerError::ActiveTaskHeld {
                tracking_id: held.tracking_id,
                part_id: held.part_id,
            });
        }

        match self.directory.take(session, part_id, operator_id).await {
            Ok(record) => {
                info!(
                    operator_id,
                    part_id = %part_id,
                    tracking_id = record.tracking_id,
                    "part taken"
                );
                Ok(record)
            }
            Err(err) => {
                warn!(operator_id, part_id = %part_id, error = %err, "take rejected");
                Err(err)
            }
        }
    }

    /// Finish the operator's active task identified by `tracking_id`.
    pub async fn complete_task(
        &self,
        session: &Session,
        tracking_id: TrackingId,
    ) -> Result<TrackingRecord, TrackerError> {
        let operator_id = session.operator_id;
        let _guard = InFlight::acquire(&self.in_flight, operator_id)?;

        let active = self.directory.active_tasks(session, operator_id).await?;
        let record = active
            .iter()
            .find(|r| r.tracking_id == tracking_id)
            .ok_or(TrackerError::NoActiveTask { tracking_id })?;

        self.complete_on_server(session, record.part_id, operator_id)
            .await
    }

    /// Finish the operator's task on `part_id`. A missing record is reported
    /// by the server.
    pub async fn complete_part(
        &self,
        session: &Session,
        part_id: Uuid,
    ) -> Result<TrackingRecord, TrackerError> {
        let operator_id = session.operator_id;
        let _guard = InFlight::acquire(&self.in_flight, operator_id)?;
        self.complete_on_server(session, part_id, operator_id).await
    }

    async fn complete_on_server(
        &self,
        session: &Session,
        part_id: Uuid,
        operator_id: OperatorId,
    ) -> Result<TrackingRecord, TrackerError> {
        match self.directory.complete(session, part_id, operator_id).await {
            Ok(mut record) => {
                // The complete endpoint echoes the record without its completion flags.
                record.completed = true;
                record.taken = false;
                if record.task_duration.is_none() {
                    record.task_duration = record.duration().map(|d| d.num_minutes());
                }
                info!(
                    operator_id,
                    part_id = %part_id,
                    tracking_id = record.tracking_id,
                    duration_min = record.task_duration,
                    state = ?record.part_state,
                    "task completed"
                );
                Ok(record)
            }
            Err(err) => {
                warn!(operator_id, part_id = %part_id, error = %err, "complete rejected");
                Err(err)
            }
        }
    }

    pub async fn get_active_tasks(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<Vec<TrackingRecord>, TrackerError> {
        self.directory.active_tasks(session, operator_id).await
    }

    /// The operator's single active task, if any.
    pub async fn current_task(
        &self,
        session: &Session,
    ) -> Result<Option<TrackingRecord>, TrackerError> {
        let active = self.get_active_tasks(session, session.operator_id).await?;
        Ok(active.into_iter().next())
    }

    /// Task history split into current and (capped) completed lists.
    pub async fn get_user_tasks(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<UserTasks, TrackerError> {
        let history = self.directory.task_history(session, operator_id).await?;
        Ok(UserTasks::partition(history, self.completed_limit))
    }

    pub async fn get_metrics(
        &self,
        session: &Session,
        operator_id: OperatorId,
    ) -> Result<OperatorMetrics, TrackerError> {
        self.directory.metrics(session, operator_id).await
    }
}
