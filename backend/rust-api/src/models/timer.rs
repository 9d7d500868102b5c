use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-session countdown. The session engine owns one of these; a background
/// task calls `tick` once per second while the session is in progress. Expiry
/// fires exactly once, after which the timer stays stopped until restarted.
#[derive(Debug, Clone)]
pub struct QuizTimer {
    pub remaining_seconds: u32,
    pub total_seconds: u32,
    pub running: bool,
    expired_fired: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer not running; nothing changed.
    Idle,
    Ticking(u32),
    Expired,
}

impl QuizTimer {
    pub fn stopped() -> Self {
        Self {
            remaining_seconds: 0,
            total_seconds: 0,
            running: false,
            expired_fired: false,
        }
    }

    /// Seeds and starts the countdown. A non-positive duration is clamped to
    /// one minute so a quiz never starts already expired.
    pub fn start(&mut self, duration_minutes: u32) {
        let seconds = duration_minutes.max(1) * 60;
        self.remaining_seconds = seconds;
        self.total_seconds = seconds;
        self.running = true;
        self.expired_fired = false;
    }

    /// Re-seeds the countdown without changing `running`. Used when the
    /// active difficulty changes before the quiz has started.
    pub fn reset(&mut self, duration_minutes: u32) {
        let seconds = duration_minutes.max(1) * 60;
        self.remaining_seconds = seconds;
        self.total_seconds = seconds;
        self.expired_fired = false;
    }

    /// Paused while a submission is in flight so the clock cannot expire
    /// mid-submit.
    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        if !self.expired_fired {
            self.running = true;
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.running = false;
            self.expired_fired = true;
            return TickOutcome::Expired;
        }
        TickOutcome::Ticking(self.remaining_seconds)
    }

    pub fn expired(&self) -> bool {
        self.expired_fired
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimerTick {
    pub session_id: String,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeExpired {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl TimerEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::TimerTick(_) => "timer-tick",
            TimerEvent::TimeExpired(_) => "time-expired",
        }
    }
}
