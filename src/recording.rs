// THEORY:
// Recording is a two-state machine (idle / recording) owned exclusively by the
// ingest loop: no other thread ever touches the writer, so the writer itself
// needs no lock. What other threads do need is the current state, so that is
// mirrored into a shared atomic flag read by the status endpoint. Transitions
// arrive through a latest-wins desired-state cell; the loop polls it once per
// iteration, which bounds toggle latency by the sensor's sample cadence.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::avi::MjpegAviWriter;

/// Live recording bookkeeping; exists only while a writer is open.
struct RecordingSession {
    path: PathBuf,
    started_at: Instant,
    writer: MjpegAviWriter<BufWriter<File>>,
}

pub struct RecordingController {
    dir: PathBuf,
    width: u32,
    height: u32,
    fps: f64,
    /// What the operator asked for. Can be true with no session when the
    /// writer failed to open; a later stop is then a no-op close.
    requested: bool,
    session: Option<RecordingSession>,
    active: Arc<AtomicBool>,
}

impl RecordingController {
    pub fn new(dir: impl Into<PathBuf>, width: u32, height: u32, fps: f64) -> Self {
        Self {
            dir: dir.into(),
            width,
            height,
            fps,
            requested: false,
            session: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag mirroring the controller state, safe to read from any
    /// thread (the status endpoint polls it).
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub fn is_recording(&self) -> bool {
        self.requested
    }

    /// Path of the currently open recording, if any.
    pub fn current_path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// Drives the state machine toward `desired`. Applying the current state
    /// again is a no-op: toggling on twice opens one writer, toggling off
    /// while idle creates nothing. Returns the session length when a writer
    /// was actually closed.
    pub fn apply(&mut self, desired: bool) -> Option<Duration> {
        if desired == self.requested {
            return None;
        }
        self.requested = desired;
        self.active.store(desired, Ordering::Relaxed);
        if desired { self.start() } else { self.stop() }
    }

    /// Appends one rendered frame to the open writer. Skipped silently while
    /// idle or while recording was requested but the writer failed to open.
    pub fn write_frame(&mut self, jpeg: &[u8]) {
        if let Some(session) = &mut self.session {
            if let Err(e) = session.writer.write_frame(jpeg) {
                warn!(path = %session.path.display(), error = %e, "dropping frame from recording");
            }
        }
    }

    fn start(&mut self) -> Option<Duration> {
        let name = format!(
            "recording_{}.avi",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.dir.join(name);
        match self.open_writer(&path) {
            Ok(writer) => {
                info!(path = %path.display(), "recording started");
                self.session = Some(RecordingSession {
                    path,
                    started_at: Instant::now(),
                    writer,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open video writer");
            }
        }
        None
    }

    fn stop(&mut self) -> Option<Duration> {
        let session = self.session.take()?;
        let elapsed = session.started_at.elapsed();
        match session.writer.finalize() {
            Ok(_) => info!(
                path = %session.path.display(),
                seconds = elapsed.as_secs_f64(),
                "recording stopped"
            ),
            Err(e) => warn!(path = %session.path.display(), error = %e, "recording close failed"),
        }
        Some(elapsed)
    }

    fn open_writer(&self, path: &Path) -> std::io::Result<MjpegAviWriter<BufWriter<File>>> {
        let file = File::create(path)?;
        MjpegAviWriter::new(BufWriter::new(file), self.width, self.height, self.fps)
    }
}
