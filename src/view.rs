//! View lifetime and operator notices.
//!
//! A [`ViewScope`] stands for one open screen. Work started for the screen
//! runs inside the scope and is dropped when the screen closes, so a late
//! response never lands on a view that is gone.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::TrackerError;
use crate::scanner::ScanOutcome;

#[derive(Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope that closes together with this one, or earlier on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn closed(&self) {
        self.token.cancelled().await
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run `fut` unless the scope closes first; `None` means it was dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_closed() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Spawn `fut` tied to this scope.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                out = fut => Some(out),
            }
        })
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Duplicate,
    Error,
}

/// One line of operator feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn from_error(err: &TrackerError) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: err.user_message(),
        }
    }

    /// Notice for a scan result; suppressed repeats produce none.
    pub fn from_scan(result: &Result<ScanOutcome, TrackerError>) -> Option<Self> {
        match result {
            Ok(ScanOutcome::Received(receipt)) => Some(Self::success(format!(
                "Received {} ({})",
                receipt.part.display_name(),
                receipt.part.id
            ))),
            Ok(ScanOutcome::AlreadyReceived { part_id, part_name }) => Some(Self {
                kind: NoticeKind::Duplicate,
                message: format!("{} ({}) was already received", part_name, part_id),
            }),
            Ok(ScanOutcome::Suppressed) => None,
            Err(err) => Some(Self::from_error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_completes_while_open() {
        let scope = ViewScope::new();
        assert_eq!(scope.run(async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drops_pending_work() {
        let scope = ViewScope::new();
        let child = scope.child();
        let handle = child.spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "late"
        });
        scope.close();
        assert!(child.is_closed());
        assert_eq!(handle.await.unwrap(), None);
        assert_eq!(scope.run(async { 1 }).await, None);
    }

    #[tokio::test]
    async fn test_drop_closes_scope() {
        let scope = ViewScope::new();
        let token = scope.token();
        drop(scope);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_notice_kinds() {
        let dup = Notice::from_scan(&Ok(ScanOutcome::AlreadyReceived {
            part_id: uuid::Uuid::nil(),
            part_name: "UMBRAL".into(),
        }))
        .unwrap();
        assert_eq!(dup.kind, NoticeKind::Duplicate);
        assert!(dup.message.contains("UMBRAL"));

        assert!(Notice::from_scan(&Ok(ScanOutcome::Suppressed)).is_none());

        let err = Notice::from_scan(&Err(TrackerError::Conflict {
            message: "La pieza ya está tomada por otro usuario.".into(),
        }))
        .unwrap();
        assert_eq!(err.kind, NoticeKind::Error);
        assert_eq!(err.message, "La pieza ya está tomada por otro usuario.");
    }
}
