//! CPU-GPU synchronization.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Status of a fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// GPU work is still pending.
    Unsignaled,
    /// GPU work is complete.
    Signaled,
}

/// Signaled by a queue when a submission completes.
///
/// Clones share the same underlying flag, so a queue can hold on to a clone
/// while the frame executor that owns the fence waits on it.
#[derive(Debug, Clone)]
pub struct Fence {
    signaled: Arc<AtomicBool>,
}

impl Fence {
    pub fn new_unsignaled() -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn new_signaled() -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn status(&self) -> FenceStatus {
        if self.signaled.load(Ordering::Acquire) {
            FenceStatus::Signaled
        } else {
            FenceStatus::Unsignaled
        }
    }

    /// Non-blocking check.
    pub fn is_signaled(&self) -> bool {
        self.status() == FenceStatus::Signaled
    }

    /// Block until signaled.
    pub fn wait(&self) {
        while !self.signaled.load(Ordering::Acquire) {
            std::thread::yield_now();
        }
    }

    /// Block until signaled or `timeout` elapses.
    ///
    /// Returns `true` if the fence was signaled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.signaled.load(Ordering::Acquire) {
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }

    /// Return to the unsignaled state before reuse.
    ///
    /// Must only be called when no GPU work is pending on this fence.
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    /// Mark the fence complete. Called by queue implementations.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

impl Default for Fence {
    fn default() -> Self {
        Self::new_unsignaled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_initial_states() {
        assert_eq!(Fence::new_unsignaled().status(), FenceStatus::Unsignaled);
        assert_eq!(Fence::new_signaled().status(), FenceStatus::Signaled);
        assert!(!Fence::default().is_signaled());
    }

    #[test]
    fn test_signal_from_other_thread() {
        let fence = Fence::new_unsignaled();
        let remote = fence.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            remote.signal();
        });
        fence.wait();
        assert!(fence.is_signaled());
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let fence = Fence::new_unsignaled();
        assert!(!fence.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_reset_shared_between_clones() {
        let fence = Fence::new_signaled();
        let clone = fence.clone();
        clone.reset();
        assert!(!fence.is_signaled());
    }
}
