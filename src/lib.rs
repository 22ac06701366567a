pub mod audio;
pub mod session;
pub mod settings;
pub mod ui;
pub mod wake;

pub use audio::{ChimeEngine, Cue, NoopCue};
pub use session::{
    sample, Phase, ProgressSample, SessionClock, SessionConfig, SessionEvent, SessionSnapshot,
    SessionState, SessionStatus,
};
pub use settings::{Preferences, SettingsStore};
pub use wake::{NoopWakeLock, WakeLock};
