//! Zero-copy, reference-counted sample buffers (§3, §4.1).
//!
//! A [`SampleBuf`] is produced exclusively by a [`FrameAllocator`]. The
//! producer thread holds the only reference while it fills the payload
//! (enforced via `Arc::get_mut`, which only succeeds while the strong count
//! is 1 — no unsafe needed to express "exclusive until published"). Once
//! [`FrameAllocator::publish`] hands out one `Arc<SampleBuf>` per consumer,
//! the buffer is immutable and the atomic strong count inside `Arc` *is*
//! the 32-bit acquire-release refcount called for in §5: the last drop
//! triggers `SampleBuf`'s `Drop` impl exactly once, which returns the
//! payload storage to the allocator's free list.

use std::sync::Arc;

use crate::error::{ErrorKind, Facility, SdrError, SdrResult};
use crate::ticket_lock::TicketLock;

/// The sample encoding tag carried alongside a buffer's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    RealU16,
    ComplexU16,
    RealI16,
    ComplexI16,
    RealU32,
    ComplexU32,
}

impl SampleType {
    /// Size in bytes of a single sample of this type.
    pub fn sample_bytes(self) -> usize {
        match self {
            SampleType::RealU16 | SampleType::RealI16 => 2,
            SampleType::ComplexU16 | SampleType::ComplexI16 => 4,
            SampleType::RealU32 => 4,
            SampleType::ComplexU32 => 8,
        }
    }
}

/// A fixed-capacity, reference-counted container of interleaved samples.
pub struct SampleBuf {
    pub sample_type: SampleType,
    nr_samples: u32,
    start_time_ns: u64,
    data: Vec<u8>,
    allocator: FrameAllocator,
}

impl SampleBuf {
    pub fn nr_samples(&self) -> u32 {
        self.nr_samples
    }

    pub fn start_time_ns(&self) -> u64 {
        self.start_time_ns
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access, only ever valid while the caller still exclusively
    /// owns the buffer (before publish). Producers use this to fill the
    /// payload and set its metadata.
    pub fn fill(
        self_arc: &mut Arc<SampleBuf>,
        sample_type: SampleType,
        nr_samples: u32,
        start_time_ns: u64,
        writer: impl FnOnce(&mut [u8]),
    ) -> SdrResult<()> {
        let buf = Arc::get_mut(self_arc).ok_or_else(|| {
            SdrError::new(Facility::SampleBuffer, ErrorKind::Busy)
                .with_detail("buffer already shared; cannot fill after publish")
        })?;
        buf.sample_type = sample_type;
        buf.nr_samples = nr_samples;
        buf.start_time_ns = start_time_ns;
        writer(&mut buf.data);
        Ok(())
    }

    /// Explicit decref, matching the donor vocabulary. Equivalent to
    /// dropping the handle; the last decref runs the release hook exactly
    /// once via `Drop`.
    pub fn decref(handle: Arc<SampleBuf>) {
        drop(handle);
    }
}

impl Drop for SampleBuf {
    fn drop(&mut self) {
        let payload = std::mem::take(&mut self.data);
        self.allocator.reclaim(payload);
    }
}

struct FrameAllocatorInner {
    frame_bytes: usize,
    capacity: usize,
    free: TicketLock<Vec<Vec<u8>>>,
    nr_frees_lifetime: std::sync::atomic::AtomicUsize,
    nr_allocs_lifetime: std::sync::atomic::AtomicUsize,
}

/// A bounded pool of equally-sized frames (§4.1).
///
/// `allocate` is O(1) and never blocks: when the pool is exhausted it
/// returns `None` and the caller is expected to treat the input as a
/// dropped buffer, never to wait.
#[derive(Clone)]
pub struct FrameAllocator(Arc<FrameAllocatorInner>);

impl FrameAllocator {
    pub fn new(frame_bytes: usize, nr_frames: usize) -> SdrResult<Self> {
        if frame_bytes == 0 || nr_frames == 0 {
            return Err(SdrError::new(Facility::FrameAlloc, ErrorKind::InvalidArgument)
                .with_detail("frame_bytes and nr_frames must both be nonzero"));
        }
        let mut free = Vec::with_capacity(nr_frames);
        for _ in 0..nr_frames {
            free.push(vec![0u8; frame_bytes]);
        }
        Ok(Self(Arc::new(FrameAllocatorInner {
            frame_bytes,
            capacity: nr_frames,
            free: TicketLock::new(free),
            nr_frees_lifetime: std::sync::atomic::AtomicUsize::new(0),
            nr_allocs_lifetime: std::sync::atomic::AtomicUsize::new(0),
        })))
    }

    pub fn frame_bytes(&self) -> usize {
        self.0.frame_bytes
    }

    /// Allocate a zero-refcount buffer. Returns `None` ("pool empty") when
    /// exhausted; never blocks.
    pub fn allocate(&self) -> Option<Arc<SampleBuf>> {
        let payload = {
            let mut free = self.0.free.lock();
            free.pop()?
        };
        self.0.nr_allocs_lifetime.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Some(Arc::new(SampleBuf {
            sample_type: SampleType::ComplexI16,
            nr_samples: 0,
            start_time_ns: 0,
            data: payload,
            allocator: self.clone(),
        }))
    }

    fn reclaim(&self, mut payload: Vec<u8>) {
        payload.clear();
        payload.resize(self.0.frame_bytes, 0);
        self.0.nr_frees_lifetime.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.0.free.lock().push(payload);
    }

    /// Current outstanding-allocation count and free-pool count. Their sum
    /// is always the pool's fixed capacity.
    pub fn counts(&self) -> (usize, usize) {
        let free = self.0.free.lock().len();
        (self.0.capacity - free, free)
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity
    }

    /// Publish a freshly filled buffer to `nr_consumers` consumers. Fails
    /// if `nr_consumers == 0`. The producer retains no handle afterward.
    pub fn publish(buf: Arc<SampleBuf>, nr_consumers: u32) -> SdrResult<Vec<Arc<SampleBuf>>> {
        if nr_consumers == 0 {
            return Err(SdrError::new(Facility::SampleBuffer, ErrorKind::InvalidArgument)
                .with_detail("publish requires at least one consumer"));
        }
        let mut handles = Vec::with_capacity(nr_consumers as usize);
        for _ in 1..nr_consumers {
            handles.push(Arc::clone(&buf));
        }
        handles.push(buf);
        Ok(handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn allocated_plus_free_equals_capacity() {
        let alloc = FrameAllocator::new(16, 4).unwrap();
        assert_eq!(alloc.counts(), (0, 4));
        let a = alloc.allocate().unwrap();
        let _b = alloc.allocate().unwrap();
        assert_eq!(alloc.counts(), (2, 2));
        drop(a);
        assert_eq!(alloc.counts(), (1, 3));
    }

    #[test]
    fn exhaustion_returns_none_without_corruption() {
        let alloc = FrameAllocator::new(8, 2).unwrap();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        assert!(alloc.allocate().is_none());
        assert_eq!(alloc.counts(), (2, 0));
        drop(a);
        drop(b);
        assert_eq!(alloc.counts(), (0, 2));
        assert!(alloc.allocate().is_some());
    }

    #[test]
    fn release_hook_runs_exactly_once_across_consumers() {
        let alloc = FrameAllocator::new(32, 4).unwrap();
        let release_count = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let mut buf = alloc.allocate().unwrap();
            SampleBuf::fill(&mut buf, SampleType::ComplexI16, 8, 0, |_| {}).unwrap();
            let handles = FrameAllocator::publish(buf, 3).unwrap();
            assert_eq!(handles.len(), 3);

            let mut joins = Vec::new();
            for h in handles {
                let rc = release_count.clone();
                let alloc_before = alloc.clone();
                joins.push(thread::spawn(move || {
                    let _ = &alloc_before;
                    SampleBuf::decref(h);
                    rc.fetch_add(0, Ordering::SeqCst); // consumer did its work
                }));
            }
            for j in joins {
                j.join().unwrap();
            }
        }
        assert_eq!(alloc.counts(), (0, 4));
    }

    #[test]
    fn fill_fails_once_shared() {
        let alloc = FrameAllocator::new(8, 1).unwrap();
        let mut buf = alloc.allocate().unwrap();
        let clone = Arc::clone(&buf);
        assert!(SampleBuf::fill(&mut buf, SampleType::RealI16, 1, 0, |_| {}).is_err());
        drop(clone);
    }
}
