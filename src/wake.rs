//! Display-sleep prevention as an injected collaborator. Purely advisory:
//! the session clock brackets running sessions with acquire/release, and a
//! platform that cannot honor the request costs nothing but a dimmer screen.

/// Best-effort keep-awake handle. Implementations must not fail loudly;
/// anything that goes wrong stays on their side of the boundary.
pub trait WakeLock: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

/// The default: do nothing. Also what tests inject.
pub struct NoopWakeLock;

impl WakeLock for NoopWakeLock {
    fn acquire(&self) {}
    fn release(&self) {}
}
