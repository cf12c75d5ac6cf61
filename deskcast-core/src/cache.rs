//! Latest-frame cache: the one genuinely shared structure.
//!
//! Single writer (the reconstruction path), many readers (arbitrary
//! presentation requests). Each publish swaps in a new immutable
//! [`FrameSnapshot`] behind an `Arc`; a read either sees `None` (nothing
//! published yet) or one complete snapshot from some publish — never a
//! torn mix of two.

use std::sync::Arc;

use tokio::sync::watch;

// ── FrameSnapshot ────────────────────────────────────────────────

/// One complete, immutable copy of the reconstructed canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    width: u32,
    height: u32,
    sequence_id: u32,
    data: Vec<u8>,
}

impl FrameSnapshot {
    pub fn new(width: u32, height: u32, sequence_id: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            sequence_id,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sequence id of the delta that produced this snapshot.
    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

// ── LatestFrameCache ─────────────────────────────────────────────

/// Single-slot, overwrite-on-publish snapshot store.
///
/// Internally a `tokio::sync::watch` channel holding
/// `Option<Arc<FrameSnapshot>>`: `publish` is an atomic slot swap,
/// `read` clones the `Arc` out. Clones of the cache share the slot.
#[derive(Clone)]
pub struct LatestFrameCache {
    inner: Arc<Slot>,
}

struct Slot {
    tx: watch::Sender<Option<Arc<FrameSnapshot>>>,
    rx: watch::Receiver<Option<Arc<FrameSnapshot>>>,
}

impl LatestFrameCache {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            inner: Arc::new(Slot { tx, rx }),
        }
    }

    /// Replace the slot. The previous snapshot is dropped once its last
    /// reader releases it.
    pub fn publish(&self, snapshot: FrameSnapshot) {
        // send only fails with no receivers; the cache holds one.
        let _ = self.inner.tx.send(Some(Arc::new(snapshot)));
    }

    /// The latest published snapshot, if any delta has been applied.
    pub fn read(&self) -> Option<Arc<FrameSnapshot>> {
        self.inner.rx.borrow().clone()
    }

    /// A receiver that resolves whenever a new snapshot is published,
    /// for push-style consumers.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<FrameSnapshot>>> {
        self.inner.rx.clone()
    }
}

impl Default for LatestFrameCache {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_reads_none() {
        let cache = LatestFrameCache::new();
        assert!(cache.read().is_none());
    }

    #[test]
    fn publish_replaces_the_slot() {
        let cache = LatestFrameCache::new();
        cache.publish(FrameSnapshot::new(2, 2, 1, vec![1; 16]));
        cache.publish(FrameSnapshot::new(2, 2, 2, vec![2; 16]));

        let snap = cache.read().unwrap();
        assert_eq!(snap.sequence_id(), 2);
        assert!(snap.data().iter().all(|&b| b == 2));
    }

    #[test]
    fn clones_share_the_slot() {
        let cache = LatestFrameCache::new();
        let reader = cache.clone();
        cache.publish(FrameSnapshot::new(1, 1, 7, vec![9; 4]));
        assert_eq!(reader.read().unwrap().sequence_id(), 7);
    }

    #[test]
    fn concurrent_reads_never_observe_torn_snapshots() {
        let cache = LatestFrameCache::new();
        let writer = cache.clone();

        let publisher = std::thread::spawn(move || {
            for i in 0u32..500 {
                let fill = (i % 256) as u8;
                writer.publish(FrameSnapshot::new(16, 16, i, vec![fill; 16 * 16 * 4]));
            }
        });

        let mut readers = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            readers.push(std::thread::spawn(move || {
                for _ in 0..2000 {
                    if let Some(snap) = cache.read() {
                        let first = snap.data()[0];
                        assert!(
                            snap.data().iter().all(|&b| b == first),
                            "torn snapshot observed"
                        );
                        assert_eq!(first, (snap.sequence_id() % 256) as u8);
                    }
                }
            }));
        }

        publisher.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[tokio::test]
    async fn subscribe_wakes_on_publish() {
        let cache = LatestFrameCache::new();
        let mut rx = cache.subscribe();

        cache.publish(FrameSnapshot::new(1, 1, 3, vec![0; 4]));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().unwrap().sequence_id(), 3);
    }
}
