use std::time::Duration;

use tokio::time::Instant;

/// What the supervisor should do after a health check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAction {
    Healthy,
    /// Silence exceeded the threshold: warn and send a liveness ping
    SendPing { silent_for: Duration },
    /// The liveness ping went unanswered; tear the connection down
    Reconnect,
}

/// Tracks frame arrival and the outstanding liveness ping for one connection
///
/// Time is passed in by the caller so the monitor stays a pure state machine.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    silence_threshold: Duration,
    pong_timeout: Duration,
    last_frame: Instant,
    ping_sent_at: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(silence_threshold: Duration, pong_timeout: Duration, now: Instant) -> Self {
        Self {
            silence_threshold,
            pong_timeout,
            last_frame: now,
            ping_sent_at: None,
        }
    }

    /// Any inbound frame counts as a heartbeat and ends a silence episode
    pub fn record_frame(&mut self, now: Instant) {
        self.last_frame = now;
        self.ping_sent_at = None;
    }

    pub fn last_frame(&self) -> Instant {
        self.last_frame
    }

    pub fn awaiting_pong(&self) -> bool {
        self.ping_sent_at.is_some()
    }

    pub fn check(&mut self, now: Instant) -> HealthAction {
        if let Some(sent) = self.ping_sent_at {
            if now.saturating_duration_since(sent) >= self.pong_timeout {
                return HealthAction::Reconnect;
            }
            return HealthAction::Healthy;
        }

        let silent_for = now.saturating_duration_since(self.last_frame);
        if silent_for >= self.silence_threshold {
            // One ping (and one warning) per silence episode
            self.ping_sent_at = Some(now);
            return HealthAction::SendPing { silent_for };
        }

        HealthAction::Healthy
    }
}
