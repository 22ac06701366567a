pub mod clock;
pub mod progress;
pub mod state;

pub use clock::{SessionClock, SessionEvent};
pub use progress::{sample, ProgressSample};
pub use state::{Phase, SessionConfig, SessionSnapshot, SessionState, SessionStatus};
