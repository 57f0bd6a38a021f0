// THEORY:
// The frame bus is a single-slot, non-blocking hand-off between the ingest
// loop and the live viewers. `publish` replaces whatever undelivered frame is
// sitting in the slot; the producer never waits for anyone. Under slow
// consumption frames are simply dropped, which is the intended trade: the
// operator always sees the newest state of the world, never a backlog.
//
// Each viewer gets its own subscription onto the slot, so delivery is fan-out
// per viewer rather than viewers racing each other for one shared copy: a
// stalled browser tab skips frames without starving the others.

use bytes::Bytes;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct FrameBus {
    tx: watch::Sender<Option<Bytes>>,
}

impl Default for FrameBus {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBus {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Non-blocking: replaces any undelivered frame with this one.
    pub fn publish(&self, data: Bytes) {
        self.tx.send_replace(Some(data));
    }

    pub fn subscribe(&self) -> FrameTap {
        FrameTap {
            rx: self.tx.subscribe(),
        }
    }
}

/// One viewer's view onto the bus.
pub struct FrameTap {
    rx: watch::Receiver<Option<Bytes>>,
}

impl FrameTap {
    /// Waits for the next frame published after this call. Returns `None`
    /// once the producer side is gone.
    pub async fn next(&mut self) -> Option<Bytes> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(frame) = self.rx.borrow_and_update().clone() {
                return Some(frame);
            }
        }
    }
}
