//! A fair, FIFO spinlock: the frame allocator's free-list primitive (§5).
//!
//! A plain `Mutex` does not guarantee waiters are woken in arrival order.
//! The donor implementation uses a ticket lock for exactly this reason —
//! fairness on the allocator's free-list under contention from multiple
//! channel workers — so it is reproduced here rather than substituted.

use std::cell::UnsafeCell;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

struct RawTicketLock {
    next_ticket: AtomicU32,
    now_serving: AtomicU32,
}

impl RawTicketLock {
    const fn new() -> Self {
        Self { next_ticket: AtomicU32::new(0), now_serving: AtomicU32::new(0) }
    }

    fn acquire(&self) {
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let mut spins = 0u32;
        while self.now_serving.load(Ordering::Acquire) != my_ticket {
            if spins < 32 {
                hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
            spins = spins.saturating_add(1);
        }
    }

    fn release(&self) {
        self.now_serving.fetch_add(1, Ordering::Release);
    }
}

/// A `Mutex`-alike guarded by a ticket lock instead of a futex/mutex,
/// giving FIFO ordering among contending acquirers.
pub struct TicketLock<T> {
    raw: RawTicketLock,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for TicketLock<T> {}
unsafe impl<T: Send> Sync for TicketLock<T> {}

impl<T> TicketLock<T> {
    pub const fn new(data: T) -> Self {
        Self { raw: RawTicketLock::new(), data: UnsafeCell::new(data) }
    }

    pub fn lock(&self) -> TicketLockGuard<'_, T> {
        self.raw.acquire();
        TicketLockGuard { lock: self }
    }
}

pub struct TicketLockGuard<'a, T> {
    lock: &'a TicketLock<T>,
}

impl<'a, T> Deref for TicketLockGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the ticket grants exclusive access until release().
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for TicketLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the ticket grants exclusive access until release().
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for TicketLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.raw.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutual_exclusion_holds_under_contention() {
        let lock = Arc::new(TicketLock::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = lock.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    let mut guard = lock.lock();
                    *guard += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }
}
