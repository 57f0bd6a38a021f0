//! Process-lifetime shared state. Everything the ingest loop and the HTTP
//! handlers share lives in one [`PipelineContext`] passed around as an `Arc`;
//! there are no ambient globals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::broadcast::FrameBus;
use crate::config::Config;
use crate::ingest::IngestReceiver;
use crate::overlay::OverlayRenderer;
use crate::recording::RecordingController;
use crate::snapshot::{CropRegion, SnapshotCapturer};
use crate::store::FrameStore;

pub struct PipelineContext {
    pub config: Config,
    pub store: Arc<FrameStore>,
    pub frames: FrameBus,
    pub snapshots: SnapshotCapturer,
    recording_desired: watch::Sender<bool>,
    recording_active: Arc<AtomicBool>,
}

impl PipelineContext {
    /// Wires up the whole pipeline: the shared context for request handlers
    /// and the ingest receiver that owns the loop-side resources (overlay
    /// renderer, recording controller, control-signal receiver).
    pub fn new(config: Config) -> (Arc<Self>, IngestReceiver) {
        let store = Arc::new(FrameStore::new());
        let frames = FrameBus::new();

        let crop = config.center_crop.then(|| CropRegion {
            x: config.center_offset(),
            y: 0,
            width: config.crop_size,
            height: config.crop_size.min(config.frame_height),
        });
        let snapshots = SnapshotCapturer::new(Arc::clone(&store), &config.dataset_dir, crop);

        let recorder = RecordingController::new(
            &config.recording_dir,
            config.frame_width,
            config.frame_height,
            config.recording_fps,
        );
        let recording_active = recorder.active_flag();
        let (recording_desired, toggle_rx) = watch::channel(false);

        let renderer = OverlayRenderer::new(&config);

        let ctx = Arc::new(Self {
            config,
            store,
            frames,
            snapshots,
            recording_desired,
            recording_active,
        });
        let ingest = IngestReceiver::new(Arc::clone(&ctx), renderer, recorder, toggle_rx);
        (ctx, ingest)
    }

    /// Flips the desired recording state and returns the new value. The
    /// ingest loop picks the change up on its next iteration, so the actual
    /// transition lags by at most one sample interval.
    pub fn toggle_recording(&self) -> bool {
        let desired = !*self.recording_desired.borrow();
        self.recording_desired.send_replace(desired);
        desired
    }

    /// Current controller state as mirrored by the ingest loop.
    pub fn is_recording(&self) -> bool {
        self.recording_active.load(Ordering::Relaxed)
    }
}
