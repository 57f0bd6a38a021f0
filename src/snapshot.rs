//! On-demand snapshot capture for dataset building. Photos are taken from the
//! raw frame store, never the annotated stream, so saved images stay clean of
//! overlays. File names come from a monotonic counter seeded from the number
//! of entries already in the dataset directory; counting (rather than parsing
//! the highest numeric name) can reuse a name after mid-session deletions,
//! which is a known and accepted limitation of the format.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use tracing::info;

use crate::error::SnapshotError;
use crate::store::FrameStore;

/// Fixed region cropped out of each photo when center-crop mode is on.
#[derive(Debug, Clone, Copy)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub struct SnapshotCapturer {
    store: Arc<FrameStore>,
    dir: PathBuf,
    crop: Option<CropRegion>,
    /// Held across name+write so concurrent captures get unique names and a
    /// failed capture never consumes a counter value.
    counter: Mutex<u64>,
}

impl SnapshotCapturer {
    /// `crop` of `None` saves the sensor's bytes verbatim; `Some` decodes,
    /// crops and re-encodes. The counter resumes from the number of files
    /// already present so restarts keep appending to the dataset.
    pub fn new(store: Arc<FrameStore>, dir: impl Into<PathBuf>, crop: Option<CropRegion>) -> Self {
        let dir = dir.into();
        let existing = std::fs::read_dir(&dir)
            .map(|entries| entries.count() as u64)
            .unwrap_or(0);
        Self {
            store,
            dir,
            crop,
            counter: Mutex::new(existing),
        }
    }

    /// Saves the current raw frame and returns the file name. Fails with
    /// [`SnapshotError::Unavailable`] before the first frame ever arrives;
    /// write failures are surfaced to the caller, never panicked on. The
    /// counter advances only when the write succeeded, so a failed capture
    /// leaves its name available for the next attempt.
    pub fn capture(&self) -> Result<String, SnapshotError> {
        let frame = self.store.get_raw().ok_or(SnapshotError::Unavailable)?;
        let mut counter = self.counter.lock().unwrap();
        let name = format!("{}.jpg", *counter);
        let path = self.dir.join(&name);

        match self.crop {
            Some(region) => {
                let image = image::load_from_memory(&frame.data)?;
                let cropped = image.crop_imm(region.x, region.y, region.width, region.height);
                cropped.save(&path)?;
            }
            None => std::fs::write(&path, &frame.data)?,
        }
        *counter += 1;

        info!(path = %path.display(), bytes = frame.data.len(), "photo saved");
        Ok(name)
    }
}
