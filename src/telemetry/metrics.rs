//! Probe counters.
//!
//! Thread-safe counters describing what the DHCP exchange did, so a caller
//! can tell a silent network from a misbehaving server after the fact.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters shared by the transport and the coordinator.
#[derive(Debug, Default)]
pub struct ProbeMetrics {
    /// DISCOVER packets handed to the exchange.
    pub requests_sent: Counter,
    /// Attempts that saw no datagram within the receive window.
    pub timeouts: Counter,
    /// Responses that failed the cross-check against their request.
    pub responses_rejected: Counter,
    /// Responses that passed validation.
    pub responses_accepted: Counter,
    /// Routes handed to the routing collaborator, default route included.
    pub routes_installed: Counter,
}

impl ProbeMetrics {
    /// Creates a new set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports all counters as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        vec![
            ("requests_sent".into(), self.requests_sent.get()),
            ("timeouts".into(), self.timeouts.get()),
            ("responses_rejected".into(), self.responses_rejected.get()),
            ("responses_accepted".into(), self.responses_accepted.get()),
            ("routes_installed".into(), self.routes_installed.get()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_basic() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.add(10);
        assert_eq!(counter.get(), 11);
    }

    #[test]
    fn test_probe_metrics_export() {
        let metrics = ProbeMetrics::new();

        metrics.requests_sent.add(3);
        metrics.timeouts.add(2);
        metrics.responses_accepted.inc();
        metrics.routes_installed.add(4);

        let exported = metrics.export();
        assert!(exported.contains(&("requests_sent".into(), 3)));
        assert!(exported.contains(&("timeouts".into(), 2)));
        assert!(exported.contains(&("responses_rejected".into(), 0)));
        assert!(exported.contains(&("responses_accepted".into(), 1)));
        assert!(exported.contains(&("routes_installed".into(), 4)));
    }
}
