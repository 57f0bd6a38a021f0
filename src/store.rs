//! Thread-safe holder of the most recent raw (undecorated) frame. The ingest
//! loop is the only writer; snapshot requests read concurrently. Handing out
//! `Bytes` means a reader always sees one complete buffer from one sample,
//! never a torn mix of two.

use std::sync::RwLock;
use std::time::Instant;

use bytes::Bytes;

/// The latest compressed frame exactly as the sensor sent it.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub captured_at: Instant,
}

#[derive(Debug, Default)]
pub struct FrameStore {
    slot: RwLock<Option<RawFrame>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the stored frame. Called once per successfully decoded
    /// sample, before any rendering happens.
    pub fn set_raw(&self, data: Bytes) {
        let frame = RawFrame {
            data,
            captured_at: Instant::now(),
        };
        *self.slot.write().unwrap() = Some(frame);
    }

    /// Returns the newest frame, or `None` if nothing was ever received.
    pub fn get_raw(&self) -> Option<RawFrame> {
        self.slot.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn empty_until_first_frame() {
        let store = FrameStore::new();
        assert!(store.get_raw().is_none());
    }

    #[test]
    fn returns_the_newest_frame() {
        let store = FrameStore::new();
        store.set_raw(Bytes::from_static(b"first"));
        store.set_raw(Bytes::from_static(b"second"));
        assert_eq!(&store.get_raw().unwrap().data[..], b"second");
    }

    #[test]
    fn concurrent_readers_never_observe_a_torn_buffer() {
        let store = Arc::new(FrameStore::new());
        let frame_a = Bytes::from(vec![0xAA; 4096]);
        let frame_b = Bytes::from(vec![0xBB; 4096]);
        store.set_raw(frame_a.clone());

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..2000 {
                    let frame = if i % 2 == 0 { &frame_b } else { &frame_a };
                    store.set_raw(frame.clone());
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2000 {
                        let frame = store.get_raw().unwrap();
                        let first = frame.data[0];
                        assert!(
                            frame.data.iter().all(|b| *b == first),
                            "read a torn buffer"
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
