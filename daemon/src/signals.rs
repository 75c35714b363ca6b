/// Pause/stop flags shared between the controller and a run's worker.
///
/// The controller writes, the worker reads at its checkpoint. Nothing here
/// blocks; waiting is the runner's job.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cheaply cloneable handle; every clone observes the same pair of flags.
/// A fresh instance is created for every run.
#[derive(Debug, Clone, Default)]
pub struct ControlSignals {
    inner: Arc<Flags>,
}

#[derive(Debug, Default)]
struct Flags {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl ControlSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op once stopped. `is_paused` is the authority, not the raw flag:
    /// racing a stop, the flag can be set for a moment, and whichever of the
    /// two calls finishes last clears it.
    pub fn request_pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        if self.is_stopped() {
            self.inner.paused.store(false, Ordering::SeqCst);
        }
    }

    pub fn request_resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Idempotent. Also clears pause so a paused worker wakes up and exits.
    pub fn request_stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Stop always wins over pause, so this is the value the worker acts on.
    pub fn is_paused(&self) -> bool {
        !self.is_stopped() && self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_signals_are_clear() {
        let s = ControlSignals::new();
        assert!(!s.is_paused());
        assert!(!s.is_stopped());
    }

    #[test]
    fn pause_and_resume_toggle_freely() {
        let s = ControlSignals::new();
        s.request_pause();
        assert!(s.is_paused());
        s.request_resume();
        assert!(!s.is_paused());
        s.request_pause();
        assert!(s.is_paused());
    }

    #[test]
    fn stop_is_monotonic_and_idempotent() {
        let s = ControlSignals::new();
        s.request_stop();
        s.request_stop();
        s.request_resume();
        assert!(s.is_stopped());
    }

    #[test]
    fn pause_after_stop_is_ignored() {
        let s = ControlSignals::new();
        s.request_stop();
        s.request_pause();
        assert!(!s.is_paused());
        assert!(!s.inner.paused.load(Ordering::SeqCst));
    }

    #[test]
    fn stop_clears_pending_pause() {
        let s = ControlSignals::new();
        s.request_pause();
        s.request_stop();
        assert!(!s.is_paused());
        assert!(s.is_stopped());
    }

    #[test]
    fn racing_pause_never_survives_a_stop() {
        for _ in 0..200 {
            let s = ControlSignals::new();
            let pauser = s.clone();
            let stopper = s.clone();
            let a = std::thread::spawn(move || {
                for _ in 0..50 {
                    pauser.request_pause();
                }
            });
            let b = std::thread::spawn(move || stopper.request_stop());
            a.join().unwrap();
            b.join().unwrap();

            assert!(s.is_stopped());
            assert!(!s.is_paused());
            assert!(!s.inner.paused.load(Ordering::SeqCst), "raw pause flag left set after stop");
        }
    }

    #[test]
    fn clones_share_state_across_threads() {
        let s = ControlSignals::new();
        let worker = s.clone();
        std::thread::spawn(move || worker.request_stop()).join().unwrap();
        assert!(s.is_stopped());
    }
}
