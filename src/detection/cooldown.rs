// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Cooldown gate - at most one notification burst per window

use std::time::{Duration, Instant};
use parking_lot::Mutex;

/// Minimum-interval gate shared by every ingestion path
pub struct CooldownGate {
    last_sent: Mutex<Option<Instant>>,
    interval: Duration,
}

impl CooldownGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_sent: Mutex::new(None),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Claim the current window.
    ///
    /// Returns true and records `now` when at least `interval` has passed
    /// since the last successful claim. The window is consumed here, before
    /// any delivery is attempted, and is not given back if delivery fails.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last_sent = self.last_sent.lock();
        let open = match *last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if open {
            *last_sent = Some(now);
        }
        open
    }

    pub fn last_sent(&self) -> Option<Instant> {
        *self.last_sent.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_first_acquire_succeeds() {
        let gate = CooldownGate::new(Duration::from_secs(3));
        assert!(gate.try_acquire(Instant::now()));
    }

    #[test]
    fn test_blocks_inside_window() {
        let gate = CooldownGate::new(Duration::from_secs(3));
        let t0 = Instant::now();

        assert!(gate.try_acquire(t0));
        assert!(!gate.try_acquire(t0 + Duration::from_millis(500)));
        assert!(!gate.try_acquire(t0 + Duration::from_millis(2999)));
        assert!(gate.try_acquire(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_rejection_has_no_side_effect() {
        let gate = CooldownGate::new(Duration::from_secs(3));
        let t0 = Instant::now();

        gate.try_acquire(t0);
        gate.try_acquire(t0 + Duration::from_secs(2));
        assert_eq!(gate.last_sent(), Some(t0));
    }

    #[test]
    fn test_concurrent_callers_same_instant() {
        const CALLERS: usize = 32;

        let gate = Arc::new(CooldownGate::new(Duration::from_secs(3)));
        let barrier = Arc::new(Barrier::new(CALLERS));
        let granted = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let gate = gate.clone();
                let barrier = barrier.clone();
                let granted = granted.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if gate.try_acquire(now) {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_callers_spread_over_windows() {
        let gate = Arc::new(CooldownGate::new(Duration::from_secs(3)));
        let t0 = Instant::now();

        // 10 windows, 8 callers per window at slightly different offsets
        let handles: Vec<_> = (0..80u64)
            .map(|i| {
                let gate = gate.clone();
                let at = t0 + Duration::from_secs(3 * (i / 8)) + Duration::from_millis(i % 8);
                std::thread::spawn(move || (i / 8, gate.try_acquire(at)))
            })
            .collect();

        let mut per_window = [0usize; 10];
        for handle in handles {
            let (window, granted) = handle.join().unwrap();
            if granted {
                per_window[window as usize] += 1;
            }
        }

        assert!(per_window.iter().all(|&n| n <= 1));
    }
}
