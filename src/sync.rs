use core::{future::poll_fn, task::Poll};

use atomic_waker::AtomicWaker;
use portable_atomic::{AtomicBool, Ordering};

/// A single-slot, coalescing wake-up signal.
///
/// [Self::put] is interrupt-safe: it raises the flag and wakes whoever is parked in
/// [Self::wait]. Any number of puts before the waiter resumes collapse into a single wake,
/// which is exactly what the receive path wants: one resumption services every frame the
/// device has buffered, however many interrupts announced them.
pub struct WakeSignal {
    waker: AtomicWaker,
    pending: AtomicBool,
}

impl WakeSignal {
    pub const fn new() -> Self {
        Self {
            waker: AtomicWaker::new(),
            pending: AtomicBool::new(false),
        }
    }

    /// Raise the signal.
    pub fn put(&self) {
        self.pending.store(true, Ordering::Release);
        self.waker.wake();
    }

    /// Wait for the signal, consuming it.
    pub async fn wait(&self) {
        poll_fn(|cx| {
            // Register before checking, so a put racing this poll lands on a live waker.
            self.waker.register(cx.waker());
            if self.pending.swap(false, Ordering::AcqRel) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}
