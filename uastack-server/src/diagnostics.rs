//! Server-wide diagnostics counters, mirrored into the diagnostics nodes.

use std::sync::atomic::{AtomicU32, Ordering};

/// The counter block behind Server_ServerDiagnostics. All counters are
/// monotonic except the `current_*` gauges.
#[derive(Debug, Default)]
pub struct ServerDiagnostics {
    /// Sessions alive right now.
    pub current_session_count: AtomicU32,
    /// Sessions ever created.
    pub cumulated_session_count: AtomicU32,
    /// Sessions that timed out.
    pub session_timeout_count: AtomicU32,
    /// Sessions rejected at admission.
    pub rejected_session_count: AtomicU32,
    /// Subscriptions alive right now.
    pub current_subscription_count: AtomicU32,
    /// Subscriptions ever created.
    pub cumulated_subscription_count: AtomicU32,
    /// Requests rejected for any reason.
    pub rejected_requests_count: AtomicU32,
    /// Requests rejected for security reasons.
    pub security_rejected_requests_count: AtomicU32,
    /// Publish requests completed because the queue overflowed.
    pub publishing_interval_count: AtomicU32,
    /// TransferSubscriptions invocations.
    pub transfer_request_count: AtomicU32,
    /// Subscriptions moved to a different client's session.
    pub transferred_to_alt_client_count: AtomicU32,
    /// Subscriptions moved to the same client's other session.
    pub transferred_to_same_client_count: AtomicU32,
}

impl ServerDiagnostics {
    /// Bump a counter by one.
    pub fn increment(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a gauge by one.
    pub fn decrement(counter: &AtomicU32) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }

    /// Read a counter.
    pub fn value(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::Relaxed)
    }

    /// Record a session creation.
    pub fn on_create_session(&self) {
        Self::increment(&self.current_session_count);
        Self::increment(&self.cumulated_session_count);
    }

    /// Record a session ending for any reason.
    pub fn on_destroy_session(&self) {
        Self::decrement(&self.current_session_count);
    }

    /// Record a subscription creation.
    pub fn on_create_subscription(&self) {
        Self::increment(&self.current_subscription_count);
        Self::increment(&self.cumulated_subscription_count);
    }

    /// Record a subscription ending for any reason.
    pub fn on_destroy_subscription(&self) {
        Self::decrement(&self.current_subscription_count);
    }
}

#[cfg(test)]
mod tests {
    use super::ServerDiagnostics;
    use std::sync::atomic::Ordering;

    #[test]
    fn session_counters() {
        let diagnostics = ServerDiagnostics::default();
        diagnostics.on_create_session();
        diagnostics.on_create_session();
        diagnostics.on_destroy_session();
        assert_eq!(diagnostics.current_session_count.load(Ordering::Relaxed), 1);
        assert_eq!(diagnostics.cumulated_session_count.load(Ordering::Relaxed), 2);
    }
}
