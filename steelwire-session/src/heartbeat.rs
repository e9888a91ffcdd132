/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Heartbeat monitoring.
//!
//! This module tracks keep-alive timing for a session:
//! - Sending a keep-alive probe when no traffic went out within the interval
//! - Matching probe responses by their echoed unique reference
//! - Counting consecutive missed responses; at the configured limit the
//!   session must degrade

use std::time::{Duration, Instant};
use steelwire_core::types::MsgRef;

/// Tracks keep-alive timing and missed responses for a session.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    /// Keep-alive interval.
    interval: Duration,
    /// Consecutive misses at which the session degrades.
    missed_limit: u32,
    /// Time of last message sent.
    last_sent: Instant,
    /// Time of last message received.
    last_received: Instant,
    /// Outstanding probe reference, if any.
    pending_probe: Option<MsgRef>,
    /// Time when the outstanding probe was sent.
    probe_sent_at: Option<Instant>,
    /// Consecutive missed responses.
    missed: u32,
}

impl HeartbeatMonitor {
    /// Creates a monitor.
    ///
    /// # Arguments
    /// * `interval` - The keep-alive interval
    /// * `missed_limit` - Consecutive misses before the session degrades
    #[must_use]
    pub fn new(interval: Duration, missed_limit: u32) -> Self {
        let now = Instant::now();
        Self {
            interval,
            missed_limit,
            last_sent: now,
            last_received: now,
            pending_probe: None,
            probe_sent_at: None,
            missed: 0,
        }
    }

    /// Records that a message was sent.
    #[inline]
    pub fn on_message_sent(&mut self) {
        self.last_sent = Instant::now();
    }

    /// Records that a message was received.
    ///
    /// Any inbound traffic proves the counterparty alive, clearing the
    /// missed counter. A probe response additionally clears the outstanding
    /// probe when its reference matches.
    ///
    /// # Arguments
    /// * `probe_response` - The echoed probe reference, if the message is a
    ///   keep-alive response
    pub fn on_message_received(&mut self, probe_response: Option<&MsgRef>) {
        self.last_received = Instant::now();
        self.missed = 0;

        if let (Some(pending), Some(received)) = (&self.pending_probe, probe_response)
            && pending == received
        {
            self.pending_probe = None;
            self.probe_sent_at = None;
        }
    }

    /// Checks if a keep-alive probe should be sent.
    ///
    /// A probe is due when nothing was sent within the interval and no probe
    /// is outstanding.
    #[must_use]
    pub fn should_send_probe(&self) -> bool {
        self.pending_probe.is_none() && self.last_sent.elapsed() >= self.interval
    }

    /// Checks if the outstanding probe went unanswered for a full interval.
    #[must_use]
    pub fn probe_overdue(&self) -> bool {
        self.probe_sent_at
            .is_some_and(|sent_at| sent_at.elapsed() >= self.interval)
    }

    /// Records that a probe was sent.
    ///
    /// # Arguments
    /// * `reference` - The probe reference that will be echoed back
    pub fn on_probe_sent(&mut self, reference: MsgRef) {
        self.pending_probe = Some(reference);
        self.probe_sent_at = Some(Instant::now());
        self.last_sent = Instant::now();
    }

    /// Counts an unanswered probe and clears it so the next tick can probe
    /// again.
    ///
    /// # Returns
    /// The new consecutive miss count.
    pub fn record_missed(&mut self) -> u32 {
        self.pending_probe = None;
        self.probe_sent_at = None;
        self.missed += 1;
        self.missed
    }

    /// Returns true once consecutive misses reached the limit.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.missed >= self.missed_limit
    }

    /// Returns the outstanding probe reference, if any.
    #[must_use]
    pub fn pending_probe(&self) -> Option<&MsgRef> {
        self.pending_probe.as_ref()
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Resets the monitor, e.g. after a fresh handshake.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last_sent = now;
        self.last_received = now;
        self.pending_probe = None;
        self.probe_sent_at = None;
        self.missed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_monitor_new() {
        let monitor = HeartbeatMonitor::new(Duration::from_secs(60), 3);
        assert_eq!(monitor.interval(), Duration::from_secs(60));
        assert!(monitor.pending_probe().is_none());
        assert!(!monitor.is_degraded());
    }

    #[test]
    fn test_should_send_probe_after_quiet_interval() {
        let monitor = HeartbeatMonitor::new(Duration::from_millis(10), 3);
        assert!(!monitor.should_send_probe());

        sleep(Duration::from_millis(15));
        assert!(monitor.should_send_probe());
    }

    #[test]
    fn test_traffic_defers_probe() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(10), 3);
        sleep(Duration::from_millis(15));
        assert!(monitor.should_send_probe());

        monitor.on_message_sent();
        assert!(!monitor.should_send_probe());
    }

    #[test]
    fn test_probe_response_matching() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(60), 3);
        let probe = MsgRef::new("PROBE-1").unwrap();

        monitor.on_probe_sent(probe.clone());
        assert_eq!(monitor.pending_probe(), Some(&probe));

        // A response with the wrong reference does not clear the probe.
        let other = MsgRef::new("PROBE-9").unwrap();
        monitor.on_message_received(Some(&other));
        assert!(monitor.pending_probe().is_some());

        monitor.on_message_received(Some(&probe));
        assert!(monitor.pending_probe().is_none());
    }

    #[test]
    fn test_three_misses_degrade() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(60), 3);

        for expected in 1..=3u32 {
            monitor.on_probe_sent(MsgRef::generate());
            assert_eq!(monitor.record_missed(), expected);
        }
        assert!(monitor.is_degraded());
    }

    #[test]
    fn test_inbound_traffic_clears_misses() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(60), 3);

        monitor.on_probe_sent(MsgRef::generate());
        monitor.record_missed();
        monitor.on_probe_sent(MsgRef::generate());
        monitor.record_missed();

        monitor.on_message_received(None);
        monitor.on_probe_sent(MsgRef::generate());
        assert_eq!(monitor.record_missed(), 1);
        assert!(!monitor.is_degraded());
    }

    #[test]
    fn test_probe_overdue() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_millis(10), 3);
        assert!(!monitor.probe_overdue());

        monitor.on_probe_sent(MsgRef::generate());
        sleep(Duration::from_millis(15));
        assert!(monitor.probe_overdue());
    }
}
