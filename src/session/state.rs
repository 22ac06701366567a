use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const MIN_PHASE_SECS: u32 = 3;
pub const MAX_PHASE_SECS: u32 = 6;
pub const DEFAULT_PHASE_SECS: u32 = 4;

/// The four stages of one box-breathing cycle, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Inhale,
    Hold,
    Exhale,
    Wait,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Inhale => Phase::Hold,
            Phase::Hold => Phase::Exhale,
            Phase::Exhale => Phase::Wait,
            Phase::Wait => Phase::Inhale,
        }
    }

    /// Stable index 0..=3, also the square edge the indicator is tracing.
    pub fn index(self) -> usize {
        match self {
            Phase::Inhale => 0,
            Phase::Hold => 1,
            Phase::Exhale => 2,
            Phase::Wait => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Inhale => "Inhale",
            Phase::Hold => "Hold",
            Phase::Exhale => "Exhale",
            Phase::Wait => "Wait",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    Complete,
}

/// User-facing knobs. `time_limit_mins: None` means breathe until stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub phase_secs: u32,
    pub time_limit_mins: Option<u32>,
    pub sound_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            phase_secs: DEFAULT_PHASE_SECS,
            time_limit_mins: None,
            sound_enabled: false,
        }
    }
}

pub fn clamp_phase_secs(secs: u32) -> u32 {
    secs.clamp(MIN_PHASE_SECS, MAX_PHASE_SECS)
}

/// What a single tick produced, for the caller to act on (chime, notify).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEffects {
    /// Phase that was entered on this tick, if the countdown rolled over.
    pub phase_entered: Option<Phase>,
    /// Session finished on this tick (limit armed and Inhale re-entered).
    pub completed: bool,
}

/// Full session state. Clones of this serve as the snapshot handed to
/// subscribers and to the progress interpolator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub status: SessionStatus,
    pub phase: Phase,
    /// Seconds remaining in the current phase, 1..=phase_secs while running.
    pub countdown: u32,
    pub elapsed_secs: u64,
    /// Sticky once the time limit is crossed; cleared only by begin/reset.
    pub limit_reached: bool,
    pub phase_secs: u32,
    pub time_limit_mins: Option<u32>,
    pub sound_enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// Monotonic anchor of the most recent tick; combines with `countdown`
    /// to interpolate the indicator between ticks.
    #[serde(skip)]
    pub last_tick: Option<Instant>,
}

pub type SessionSnapshot = SessionState;

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            phase: Phase::Inhale,
            countdown: DEFAULT_PHASE_SECS,
            elapsed_secs: 0,
            limit_reached: false,
            phase_secs: DEFAULT_PHASE_SECS,
            time_limit_mins: None,
            sound_enabled: false,
            started_at: None,
            last_tick: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle state with a config already applied, for previewing settings
    /// before the first start.
    pub fn from_config(config: SessionConfig) -> Self {
        let phase_secs = clamp_phase_secs(config.phase_secs);
        Self {
            countdown: phase_secs,
            phase_secs,
            time_limit_mins: config.time_limit_mins,
            sound_enabled: config.sound_enabled,
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// Begin a fresh session. Progress from any earlier session is discarded;
    /// pausing and starting again restarts from zero.
    pub fn begin(&mut self, config: SessionConfig, started_at: DateTime<Utc>, now: Instant) {
        let phase_secs = clamp_phase_secs(config.phase_secs);
        *self = Self {
            status: SessionStatus::Running,
            phase: Phase::Inhale,
            countdown: phase_secs,
            elapsed_secs: 0,
            limit_reached: false,
            phase_secs,
            time_limit_mins: config.time_limit_mins,
            sound_enabled: config.sound_enabled,
            started_at: Some(started_at),
            last_tick: Some(now),
        };
    }

    /// Stop ticking but keep the current numbers on screen.
    pub fn halt(&mut self) {
        if self.status == SessionStatus::Running {
            self.status = SessionStatus::Idle;
        }
        self.last_tick = None;
    }

    /// Back to the initial idle snapshot. Phase length and sound preference
    /// survive; the time limit does not.
    pub fn reset(&mut self) {
        *self = Self {
            countdown: self.phase_secs,
            phase_secs: self.phase_secs,
            sound_enabled: self.sound_enabled,
            ..Self::default()
        };
    }

    /// Clamped to [3, 6]. While idle the countdown re-bases immediately as a
    /// live preview; while running the new length applies from the next
    /// phase entry, never mid-phase.
    pub fn set_phase_secs(&mut self, secs: u32) {
        self.phase_secs = clamp_phase_secs(secs);
        if !self.is_running() {
            self.countdown = self.phase_secs;
        }
    }

    /// Accepted any time; consulted at the next limit check.
    pub fn set_time_limit(&mut self, mins: Option<u32>) {
        self.time_limit_mins = mins;
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound_enabled = enabled;
    }

    fn time_limit_secs(&self) -> Option<u64> {
        self.time_limit_mins.map(|mins| u64::from(mins) * 60)
    }

    /// Advance the session by one second.
    ///
    /// Order matters and is fixed: elapsed time first, then the sticky limit
    /// check, then the phase advance or countdown decrement. The session
    /// completes only when the limit has been reached *and* the clock
    /// re-enters Inhale, so an armed limit always drains the cycle in
    /// progress rather than stopping mid-phase.
    pub fn apply_tick(&mut self, now: Instant) -> TickEffects {
        if !self.is_running() {
            return TickEffects::default();
        }

        self.elapsed_secs += 1;

        if let Some(limit_secs) = self.time_limit_secs() {
            if !self.limit_reached && self.elapsed_secs >= limit_secs {
                self.limit_reached = true;
            }
        }

        let mut effects = TickEffects::default();
        if self.countdown == 1 {
            self.phase = self.phase.next();
            self.countdown = self.phase_secs;
            effects.phase_entered = Some(self.phase);
            if self.phase == Phase::Inhale && self.limit_reached {
                self.status = SessionStatus::Complete;
                effects.completed = true;
            }
        } else {
            self.countdown -= 1;
        }

        self.last_tick = Some(now);
        effects
    }
}
