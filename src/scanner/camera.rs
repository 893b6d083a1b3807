//! Camera / decoder resource handling.
//!
//! A [`MediaStream`] is an open capture resource. It is only ever held
//! through a [`StreamGuard`], which stops it on drop, so every exit path
//! (error, cancellation, normal return) releases the device.

use std::process::Stdio;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::errors::TrackerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: String,
    pub label: String,
}

/// An open capture stream.
pub trait MediaStream: Send {
    /// Release the device. Must be idempotent.
    fn stop(&mut self);

    fn is_active(&mut self) -> bool;

    /// Decoded QR payloads produced by the stream, if it decodes at all.
    /// Can be taken once.
    fn payloads(&mut self) -> Option<BoxStream<'static, String>> {
        None
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn open_stream(&self) -> Result<Box<dyn MediaStream>, TrackerError>;

    /// Video inputs; may require a stream to have been opened once.
    async fn enumerate_video_inputs(&self) -> Result<Vec<CameraInfo>, TrackerError>;
}

/// Owns a [`MediaStream`] and stops it when dropped.
pub struct StreamGuard {
    stream: Box<dyn MediaStream>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        Self { stream }
    }

    pub fn stream_mut(&mut self) -> &mut dyn MediaStream {
        self.stream.as_mut()
    }

    pub fn payloads(&mut self) -> Option<BoxStream<'static, String>> {
        self.stream.payloads()
    }

    /// Stop now rather than at end of scope.
    pub fn stop(self) {}
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stream.stop();
        debug!("media stream stopped");
    }
}

/// List the available cameras.
///
/// The stream is opened only to unlock enumeration and is stopped before
/// the device list is read, on every path.
pub async fn discover_cameras(backend: &dyn MediaBackend) -> Result<Vec<CameraInfo>, TrackerError> {
    let guard = StreamGuard::new(backend.open_stream().await?);
    guard.stop();

    let cameras = backend.enumerate_video_inputs().await?;
    if cameras.is_empty() {
        return Err(TrackerError::Media("no cameras available".to_string()));
    }
    debug!(count = cameras.len(), "cameras discovered");
    Ok(cameras)
}

/// Backend that runs an external QR decoder (for example `zbarcam --raw`)
/// and reads one payload per stdout line.
#[derive(Debug, Clone)]
pub struct DecoderProcess {
    program: String,
    args: Vec<String>,
    device_dir: std::path::PathBuf,
}

impl DecoderProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            device_dir: std::path::PathBuf::from("/dev"),
        }
    }

    /// Split a shell-like command line on whitespace.
    pub fn from_command_line(command: &str) -> Result<Self, TrackerError> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| TrackerError::Media("empty decoder command".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }

    pub fn with_device_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.device_dir = dir.into();
        self
    }
}

struct DecoderStream {
    child: Child,
    stopped: bool,
}

impl MediaStream for DecoderStream {
    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        if let Err(err) = self.child.start_kill() {
            // Already exited.
            debug!(error = %err, "decoder kill skipped");
        }
    }

    fn is_active(&mut self) -> bool {
        !self.stopped && matches!(self.child.try_wait(), Ok(None))
    }

    fn payloads(&mut self) -> Option<BoxStream<'static, String>> {
        let stdout = self.child.stdout.take()?;
        let lines = BufReader::new(stdout).lines();
        Some(Box::pin(stream::unfold(lines, |mut lines| async move {
            match lines.next_line().await {
                Ok(Some(line)) => Some((line, lines)),
                Ok(None) => None,
                Err(err) => {
                    warn!(error = %err, "decoder output unreadable");
                    None
                }
            }
        })))
    }
}

#[async_trait]
impl MediaBackend for DecoderProcess {
    async fn open_stream(&self) -> Result<Box<dyn MediaStream>, TrackerError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TrackerError::Media(format!("failed to start {}: {}", self.program, e)))?;
        debug!(program = %self.program, "decoder started");
        Ok(Box::new(DecoderStream {
            child,
            stopped: false,
        }))
    }

    async fn enumerate_video_inputs(&self) -> Result<Vec<CameraInfo>, TrackerError> {
        let mut entries = tokio::fs::read_dir(&self.device_dir)
            .await
            .map_err(|e| TrackerError::Media(format!("cannot list {}: {}", self.device_dir.display(), e)))?;
        let mut cameras = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TrackerError::Media(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("video") {
                cameras.push(CameraInfo {
                    id: entry.path().display().to_string(),
                    label: name,
                });
            }
        }
        cameras.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cameras)
    }
}
