//! QR Scan Resolver.
//!
//! Turns decoded QR text into a part lookup and drives reception:
//!
//! ```text
//! Idle -> Decoding -> Resolving -> Updating -> Idle
//! ```
//!
//! Every cycle ends back at `Idle`, whatever the outcome. A payload seen
//! again within the cooldown window is suppressed without touching the
//! server, since a live decoder re-emits the same code many times a second.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::directory::PartDirectory;
use crate::errors::TrackerError;
use crate::models::{Part, ScannedPart};
use crate::session::Session;
use crate::view::ViewScope;

pub mod camera;
pub mod payload;
pub mod recent;

pub use camera::{CameraInfo, DecoderProcess, MediaBackend, MediaStream, StreamGuard, discover_cameras};
pub use payload::{format_payload, parse_payload};
pub use recent::RecentScans;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(1000);
pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const DEFAULT_HISTORY_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Decoding,
    Resolving,
    Updating,
}

/// Operator feedback signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartImage {
    Loaded { path: String, bytes: Vec<u8> },
    Placeholder,
}

impl PartImage {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder)
    }
}

/// Result of a successful reception.
#[derive(Debug, Clone)]
pub struct ScanReceipt {
    pub part: Part,
    pub entry: ScannedPart,
    pub image: PartImage,
    /// False when the server scan log rejected the entry.
    pub logged: bool,
}

#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// Part was not yet received and is now.
    Received(Box<ScanReceipt>),
    /// Part had already been received; nothing was updated.
    AlreadyReceived { part_id: Uuid, part_name: String },
    /// Same payload inside the cooldown window; nothing was done.
    Suppressed,
}

impl ScanOutcome {
    pub fn cue(&self) -> Option<Cue> {
        match self {
            Self::Received(_) => Some(Cue::Success),
            Self::AlreadyReceived { .. } => Some(Cue::Warning),
            Self::Suppressed => None,
        }
    }
}

/// Cue for a whole scan result; errors always map to [`Cue::Error`].
pub fn cue_for(result: &Result<ScanOutcome, TrackerError>) -> Option<Cue> {
    match result {
        Ok(outcome) => outcome.cue(),
        Err(_) => Some(Cue::Error),
    }
}

#[derive(Debug, Clone)]
struct LastScan {
    payload: String,
    at: Instant,
}

/// Sets the phase on the way through a cycle and back to `Idle` on drop.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<ScanPhase>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a watch::Sender<ScanPhase>) -> Self {
        phase.send_replace(ScanPhase::Decoding);
        Self { phase }
    }

    fn set(&self, next: ScanPhase) {
        debug!(phase = ?next, "scan phase");
        self.phase.send_replace(next);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase.send_replace(ScanPhase::Idle);
    }
}

pub struct ScanResolver {
    directory: Arc<dyn PartDirectory>,
    cooldown: Duration,
    history_days: u32,
    recent: Mutex<RecentScans>,
    last: Mutex<Option<LastScan>>,
    cycle: tokio::sync::Mutex<()>,
    phase: watch::Sender<ScanPhase>,
}

impl ScanResolver {
    pub fn new(directory: Arc<dyn PartDirectory>) -> Self {
        let (phase, _) = watch::channel(ScanPhase::Idle);
        Self {
            directory,
            cooldown: DEFAULT_COOLDOWN,
            history_days: DEFAULT_HISTORY_DAYS,
            recent: Mutex::new(RecentScans::new(DEFAULT_RECENT_LIMIT)),
            last: Mutex::new(None),
            cycle: tokio::sync::Mutex::new(()),
            phase,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_recent_limit(self, limit: usize) -> Self {
        Self {
            recent: Mutex::new(RecentScans::new(limit)),
            ..self
        }
    }

    pub fn with_history_days(mut self, days: u32) -> Self {
        self.history_days = days;
        self
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<ScanPhase> {
        self.phase.subscribe()
    }

    /// Recently received parts, newest first.
    pub fn recent(&self) -> Vec<ScannedPart> {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .to_vec()
    }

    /// Seed the recent list from the server scan log.
    pub async fn seed_recent(&self, session: &Session) -> Result<usize, TrackerError> {
        let since = Local::now().naive_local() - chrono::Duration::days(i64::from(self.history_days));
        let history = self.directory.scans_since(session, since).await?;
        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.replace(history);
        debug!(count = recent.len(), "recent scans seeded");
        Ok(recent.len())
    }

    /// True when `payload` repeats the last one inside the cooldown window.
    /// Otherwise records it as the last payload.
    fn suppress(&self, payload: &str) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = last.as_ref()
            && prev.payload == payload
            && now.duration_since(prev.at) < self.cooldown
        {
            return true;
        }
        *last = Some(LastScan {
            payload: payload.to_string(),
            at: now,
        });
        false
    }

    /// Restart the cooldown window when a cycle finishes.
    fn stamp(&self, payload: &str) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prev) = last.as_mut()
            && prev.payload == payload
        {
            prev.at = Instant::now();
        }
    }

    /// Run one scan cycle for decoded `text`.
    pub async fn handle(&self, session: &Session, text: &str) -> Result<ScanOutcome, TrackerError> {
        let _cycle = self.cycle.lock().await;
        let payload = text.trim();
        if self.suppress(payload) {
            debug!("duplicate payload inside cooldown window");
            return Ok(ScanOutcome::Suppressed);
        }

        let result = {
            let phase = PhaseGuard::enter(&self.phase);
            self.run_cycle(session, payload, &phase).await
        };
        self.stamp(payload);

        match &result {
            Ok(ScanOutcome::Received(receipt)) => {
                info!(part_id = %receipt.part.id, logged = receipt.logged, "part received");
            }
            Ok(ScanOutcome::AlreadyReceived { part_id, .. }) => {
                info!(part_id = %part_id, "part already received");
            }
            Ok(ScanOutcome::Suppressed) => {}
            Err(err) => warn!(error = %err, "scan failed"),
        }
        result
    }

    async fn run_cycle(
        &self,
        session: &Session,
        payload: &str,
        phase: &PhaseGuard<'_>,
    ) -> Result<ScanOutcome, TrackerError> {
        let part_id = parse_payload(payload)?;

        phase.set(ScanPhase::Resolving);
        let part = self.directory.get_part(session, part_id).await?;
        if part.is_received() {
            return Ok(ScanOutcome::AlreadyReceived {
                part_id: part.id,
                part_name: part.display_name().to_string(),
            });
        }

        phase.set(ScanPhase::Updating);
        let scanned_at = Local::now().naive_local();
        let mut update = part.clone();
        update.reception_state = Some(true);
        update.scan_date_time = Some(scanned_at);
        let part = self.directory.update_part(session, &update).await?;

        let image = self.load_image(session, &part).await;
        let entry = scan_entry(&part, scanned_at);
        let logged = match self.directory.log_scan(session, &entry).await {
            Ok(_) => true,
            Err(err) => {
                warn!(part_id = %part.id, error = %err, "scan log entry not saved");
                false
            }
        };

        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());

        Ok(ScanOutcome::Received(Box::new(ScanReceipt {
            part,
            entry,
            image,
            logged,
        })))
    }

    async fn load_image(&self, session: &Session, part: &Part) -> PartImage {
        let Some(path) = part.image_path() else {
            return PartImage::Placeholder;
        };
        match self.directory.part_image(session, path).await {
            Ok(bytes) if !bytes.is_empty() => PartImage::Loaded {
                path: path.to_string(),
                bytes,
            },
            Ok(_) => PartImage::Placeholder,
            Err(err) => {
                debug!(path, error = %err, "part image unavailable, using placeholder");
                PartImage::Placeholder
            }
        }
    }
}

fn scan_entry(part: &Part, scanned_at: NaiveDateTime) -> ScannedPart {
    let project = part.project_id.map(|id| id.to_string());
    ScannedPart {
        id: None,
        project_id: project.clone(),
        project_number: project,
        part_id: part.id.to_string(),
        part_name: Some(part.display_name().to_string()),
        image_url: part.image_path().map(str::to_string),
        scan_date_time: Some(scanned_at),
    }
}

/// One processed payload from [`scan_loop`].
#[derive(Debug)]
pub struct ScanEvent {
    pub payload: String,
    pub result: Result<ScanOutcome, TrackerError>,
}

/// Feed decoded payloads into the resolver until the stream ends or the
/// scope closes. Blank lines are skipped. Returns the number of payloads
/// processed.
pub async fn scan_loop<S, F>(
    resolver: &ScanResolver,
    session: &Session,
    mut payloads: S,
    scope: &ViewScope,
    mut on_event: F,
) -> usize
where
    S: Stream<Item = String> + Unpin,
    F: FnMut(ScanEvent),
{
    let mut processed = 0;
    loop {
        let Some(Some(payload)) = scope.run(payloads.next()).await else {
            break;
        };
        if payload.trim().is_empty() {
            continue;
        }
        let Some(result) = scope.run(resolver.handle(session, &payload)).await else {
            debug!("scan loop abandoned in-flight scan");
            break;
        };
        processed += 1;
        on_event(ScanEvent { payload, result });
    }
    processed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;
    use crate::models::PartState;

    fn setup() -> (Arc<MemoryDirectory>, ScanResolver, Session) {
        let dir = Arc::new(MemoryDirectory::new());
        let resolver = ScanResolver::new(dir.clone());
        (dir, resolver, Session::new("token", 3))
    }

    #[tokio::test]
    async fn test_invalid_payload_never_reaches_lookup() {
        let (dir, resolver, session) = setup();
        let err = resolver.handle(&session, "hello world").await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidPayload { .. }));
        assert_eq!(dir.total_calls(), 0);
        assert_eq!(resolver.phase(), ScanPhase::Idle);
        assert_eq!(cue_for(&Err(err)), Some(Cue::Error));
    }

    #[tokio::test]
    async fn test_receives_unreceived_part() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        dir.set_image("umbral.png", b"\x89PNG");

        let outcome = resolver
            .handle(&session, &format_payload(id))
            .await
            .unwrap();
        assert_eq!(outcome.cue(), Some(Cue::Success));
        let ScanOutcome::Received(receipt) = outcome else {
            panic!("Expected Received");
        };
        assert!(receipt.logged);
        assert_eq!(receipt.image, PartImage::Loaded {
            path: "umbral.png".into(),
            bytes: b"\x89PNG".to_vec(),
        });

        let stored = dir.part(id).unwrap();
        assert!(stored.is_received());
        assert!(stored.scan_date_time.is_some());
        assert_eq!(dir.scans().len(), 1);

        let recent = resolver.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].part_id, id.to_string());
        assert_eq!(resolver.phase(), ScanPhase::Idle);
    }

    #[tokio::test]
    async fn test_already_received_is_warning_without_update() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        let mut part = dir.part(id).unwrap();
        part.reception_state = Some(true);
        dir.insert_part(part);

        let outcome = resolver
            .handle(&session, &format!("Part ID: {}", id))
            .await
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::AlreadyReceived { part_id, .. } if part_id == id));
        assert_eq!(outcome.cue(), Some(Cue::Warning));
        assert_eq!(dir.calls("update_part"), 0);
        assert!(resolver.recent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_part_is_not_found() {
        let (dir, resolver, session) = setup();
        let err = resolver
            .handle(&session, &format_payload(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { .. }));
        assert_eq!(dir.calls("update_part"), 0);
        assert_eq!(resolver.phase(), ScanPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_within_cooldown_mutates_once() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        let payload = format_payload(id);

        let first = resolver.handle(&session, &payload).await.unwrap();
        let second = resolver.handle(&session, &payload).await.unwrap();
        assert!(matches!(first, ScanOutcome::Received(_)));
        assert!(matches!(second, ScanOutcome::Suppressed));
        assert_eq!(second.cue(), None);
        assert_eq!(dir.calls("update_part"), 1);
        assert_eq!(dir.calls("get_part"), 1);

        tokio::time::advance(Duration::from_millis(1001)).await;
        let third = resolver.handle(&session, &payload).await.unwrap();
        assert!(matches!(third, ScanOutcome::AlreadyReceived { .. }));
        assert_eq!(dir.calls("update_part"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_payload_is_not_suppressed() {
        let (dir, resolver, session) = setup();
        let a = dir.add_part(PartState::Packing, "A");
        let b = dir.add_part(PartState::Packing, "B");
        resolver.handle(&session, &format_payload(a)).await.unwrap();
        let outcome = resolver.handle(&session, &format_payload(b)).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Received(_)));
        let recent = resolver.recent();
        assert_eq!(recent[0].part_id, b.to_string());
        assert_eq!(recent[1].part_id, a.to_string());
    }

    #[tokio::test]
    async fn test_recent_list_capped_at_limit() {
        let dir = Arc::new(MemoryDirectory::new());
        let resolver = ScanResolver::new(dir.clone()).with_recent_limit(10);
        let session = Session::new("token", 3);
        for n in 0..12 {
            let id = dir.add_part(PartState::Packing, &format!("P{}", n));
            resolver.handle(&session, &format_payload(id)).await.unwrap();
        }
        assert_eq!(resolver.recent().len(), 10);
    }

    #[tokio::test]
    async fn test_image_and_log_failures_are_not_fatal() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        dir.fail("part_image", 500, "disk error");
        dir.fail("log_scan", 500, "db down");

        let outcome = resolver.handle(&session, &format_payload(id)).await.unwrap();
        let ScanOutcome::Received(receipt) = outcome else {
            panic!("Expected Received");
        };
        assert!(receipt.image.is_placeholder());
        assert!(!receipt.logged);
        assert!(dir.part(id).unwrap().is_received());
        assert_eq!(resolver.recent().len(), 1);
    }

    #[tokio::test]
    async fn test_update_failure_reports_and_returns_idle() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        dir.fail("update_part", 500, "");
        let err = resolver.handle(&session, &format_payload(id)).await.unwrap_err();
        assert!(matches!(err, TrackerError::Server { status: 500, .. }));
        assert!(err.user_message().contains("try again"));
        assert_eq!(resolver.phase(), ScanPhase::Idle);
        assert!(resolver.recent().is_empty());
    }

    #[tokio::test]
    async fn test_seed_recent_from_server_log() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        resolver.handle(&session, &format_payload(id)).await.unwrap();

        let fresh = ScanResolver::new(dir.clone());
        assert_eq!(fresh.seed_recent(&session).await.unwrap(), 1);
        assert_eq!(fresh.recent()[0].part_id, id.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_scope_abandons_seeding() {
        let dir = Arc::new(MemoryDirectory::new().with_delay(Duration::from_secs(15)));
        let resolver = ScanResolver::new(dir.clone());
        let session = Session::new("token", 3);
        let scope = ViewScope::new();

        let closer = scope.token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            closer.cancel();
        });

        let started = Instant::now();
        assert!(scope.run(resolver.seed_recent(&session)).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(resolver.recent().is_empty());
    }

    #[tokio::test]
    async fn test_scan_loop_processes_stream_until_end() {
        let (dir, resolver, session) = setup();
        let id = dir.add_part(PartState::Packing, "UMBRAL");
        let payloads = futures::stream::iter(vec![
            format_payload(id),
            String::new(),
            "garbage".to_string(),
        ]);
        let scope = ViewScope::new();
        let mut cues = Vec::new();
        let processed = scan_loop(&resolver, &session, payloads, &scope, |event| {
            cues.push(cue_for(&event.result));
        })
        .await;
        assert_eq!(processed, 2);
        assert_eq!(cues, vec![Some(Cue::Success), Some(Cue::Error)]);
    }

    #[tokio::test]
    async fn test_scan_loop_stops_when_scope_closed() {
        let (_dir, resolver, session) = setup();
        let scope = ViewScope::new();
        scope.close();
        let processed = scan_loop(
            &resolver,
            &session,
            futures::stream::pending::<String>(),
            &scope,
            |_| panic!("no events expected"),
        )
        .await;
        assert_eq!(processed, 0);
    }
}
