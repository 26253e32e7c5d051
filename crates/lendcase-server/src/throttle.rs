//! Request throttling
//!
//! Two concerns live here. `OperatorLimiter` caps how fast one operator can
//! hit the HTTP surface, counting requests over a trailing window.
//! `EndpointPacer` spaces outbound collaborator calls evenly, so a burst of
//! enricher or LLM work waits inside the worker instead of hammering the
//! remote endpoint or re-entering the job queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

/// Sliding-window request limiter keyed by operator id.
///
/// A request is admitted while the operator's count in the trailing window
/// stays under the cap; the timestamp log trims itself as the window slides.
/// A cap of zero disables limiting.
pub struct OperatorLimiter {
    max_per_window: u32,
    window: Duration,
    log: DashMap<String, Mutex<VecDeque<Instant>>>,
}

impl OperatorLimiter {
    /// Limiter admitting `max_per_second` requests per operator
    pub fn per_second(max_per_second: u32) -> Self {
        Self {
            max_per_window: max_per_second,
            window: Duration::from_secs(1),
            log: DashMap::new(),
        }
    }

    /// Whether this request fits the operator's window
    pub fn admit(&self, operator_id: &str) -> bool {
        if self.max_per_window == 0 {
            return true;
        }
        let now = Instant::now();
        let entry = self
            .log
            .entry(operator_id.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut stamps = entry.lock();
        while stamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            stamps.pop_front();
        }
        if stamps.len() as u32 >= self.max_per_window {
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Drop an operator's window, e.g. when the identity is retired
    pub fn forget(&self, operator_id: &str) {
        self.log.remove(operator_id);
    }
}

/// Even-spacing pacer for outbound endpoints.
///
/// Each endpoint carries a "next free slot" instant; a caller takes the slot,
/// pushes it forward by the per-call gap, and sleeps until its turn. Callers
/// therefore queue in arrival order inside the worker with no busy polling.
#[derive(Clone)]
pub struct EndpointPacer {
    gap: Duration,
    slots: Arc<DashMap<&'static str, Mutex<tokio::time::Instant>>>,
}

impl EndpointPacer {
    /// Pacer allowing `calls_per_second` to each endpoint; zero disables
    /// pacing
    pub fn with_rate(calls_per_second: u32) -> Self {
        let gap = match calls_per_second {
            0 => Duration::ZERO,
            n => Duration::from_millis(1000 / n as u64),
        };
        Self {
            gap,
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Wait for the endpoint's next free slot. The surrounding request
    /// timeout still bounds the total wait.
    pub async fn acquire(&self, endpoint: &'static str) {
        if self.gap.is_zero() {
            return;
        }
        let slot_at = {
            let entry = self
                .slots
                .entry(endpoint)
                .or_insert_with(|| Mutex::new(tokio::time::Instant::now()));
            let mut next_free = entry.lock();
            let turn = (*next_free).max(tokio::time::Instant::now());
            *next_free = turn + self.gap;
            turn
        };
        tokio::time::sleep_until(slot_at).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_cap_within_window() {
        let limiter = OperatorLimiter::per_second(2);
        assert!(limiter.admit("op-1"));
        assert!(limiter.admit("op-1"));
        assert!(!limiter.admit("op-1"));
        // Another operator has its own window
        assert!(limiter.admit("op-2"));
    }

    #[test]
    fn test_zero_cap_is_unlimited() {
        let limiter = OperatorLimiter::per_second(0);
        for _ in 0..100 {
            assert!(limiter.admit("op-1"));
        }
    }

    #[test]
    fn test_forget_resets_window() {
        let limiter = OperatorLimiter::per_second(1);
        assert!(limiter.admit("op-1"));
        assert!(!limiter.admit("op-1"));
        limiter.forget("op-1");
        assert!(limiter.admit("op-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_spaces_calls() {
        let pacer = EndpointPacer::with_rate(5); // 200ms gap
        let started = tokio::time::Instant::now();
        pacer.acquire("gstin").await;
        pacer.acquire("gstin").await;
        pacer.acquire("gstin").await;
        // First call is immediate, the next two each wait one gap
        assert!(started.elapsed() >= Duration::from_millis(400));
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacer_endpoints_independent() {
        let pacer = EndpointPacer::with_rate(5);
        let started = tokio::time::Instant::now();
        pacer.acquire("gstin").await;
        pacer.acquire("llm").await;
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_pacer_disabled_never_waits() {
        let pacer = EndpointPacer::with_rate(0);
        pacer.acquire("gstin").await;
        pacer.acquire("gstin").await;
    }
}
