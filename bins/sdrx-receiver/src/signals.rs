//! SIGUSR2 multiplexing (§6, §9 "Global state to arena+context"): rather
//! than a module-level handler list installed at `libc` level, handlers are
//! registered on an explicit [`SignalMux`] owned by the application context
//! and drained cooperatively from the main thread. The signal handler itself
//! only sets one process-wide flag, which is the only part that must be
//! async-signal-safe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

static USR2_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigusr2(_sig: libc::c_int) {
    USR2_PENDING.store(true, Ordering::SeqCst);
}

/// Installs the process-wide SIGUSR2 handler. Safe to call at most once;
/// callers must hold off registering handlers on [`SignalMux`] until after
/// this returns.
pub fn install() {
    unsafe {
        libc::signal(libc::SIGUSR2, on_sigusr2 as libc::sighandler_t);
    }
}

/// Ordered list of SIGUSR2 handlers. Handlers run on the thread that calls
/// [`SignalMux::poll`], never inside the signal context.
#[derive(Default)]
pub struct SignalMux {
    handlers: Mutex<Vec<Box<dyn Fn() + Send>>>,
}

impl SignalMux {
    pub fn new() -> Self {
        Self { handlers: Mutex::new(Vec::new()) }
    }

    /// Registers a handler, appended after any already registered.
    pub fn register(&self, handler: impl Fn() + Send + 'static) {
        self.handlers.lock().unwrap().push(Box::new(handler));
    }

    /// Runs all registered handlers, in registration order, if SIGUSR2 has
    /// fired since the last poll. Cheap to call on every producer/worker
    /// loop iteration.
    pub fn poll(&self) {
        if USR2_PENDING.swap(false, Ordering::SeqCst) {
            for handler in self.handlers.lock().unwrap().iter() {
                handler();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn handlers_run_in_registration_order() {
        let mux = SignalMux::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            mux.register(move || order.lock().unwrap().push(i));
        }
        USR2_PENDING.store(true, Ordering::SeqCst);
        mux.poll();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn poll_without_a_pending_signal_is_a_no_op() {
        let mux = SignalMux::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        mux.register(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        mux.poll();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
