use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use chrono::Utc;
use log::info;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time,
};

use crate::{audio::Cue, wake::WakeLock};

use super::state::{Phase, SessionConfig, SessionSnapshot, SessionState};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications pushed to subscribers (the presentation layer, mainly).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The state changed; carries the full snapshot for rendering.
    Tick(SessionSnapshot),
    /// A phase was entered, including Inhale at t=0 when a session starts.
    PhaseChange(Phase),
    /// The session finished gracefully at a cycle boundary.
    Complete { total_secs: u64 },
}

/// Owns the session state and drives it with a once-per-second ticker task.
///
/// Control calls mutate state behind an async mutex; subscribers observe
/// fully-applied ticks only, never a half-updated one. The audio cue and
/// wake lock are injected so the clock runs identically with or without a
/// sound device or a cooperative platform, and so tests can count calls.
#[derive(Clone)]
pub struct SessionClock {
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    cue: Arc<dyn Cue>,
    wake: Arc<dyn WakeLock>,
}

impl SessionClock {
    pub fn new(cue: Arc<dyn Cue>, wake: Arc<dyn WakeLock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            cue,
            wake,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.clone()
    }

    /// Begin a fresh session. Fails if one is already running.
    ///
    /// The first phase cue fires immediately so the user hears and sees
    /// Inhale at t=0; the ticker's first tick lands one second later.
    pub async fn start(&self, config: SessionConfig) -> Result<SessionSnapshot> {
        let snapshot = {
            let mut state = self.state.lock().await;
            if state.is_running() {
                bail!("session already running");
            }
            state.begin(config, Utc::now(), Instant::now());
            state.clone()
        };

        info!(
            "session started: {}s phases, limit {:?} min",
            snapshot.phase_secs, snapshot.time_limit_mins
        );

        self.wake.acquire();
        if snapshot.sound_enabled {
            self.cue.play();
        }
        let _ = self.events.send(SessionEvent::PhaseChange(snapshot.phase));
        let _ = self.events.send(SessionEvent::Tick(snapshot.clone()));

        self.spawn_ticker().await;

        Ok(snapshot)
    }

    /// Stop ticking, keeping the numbers on screen. Idempotent: pausing an
    /// idle clock does nothing. Starting again begins a fresh session.
    pub async fn pause(&self) {
        {
            let mut state = self.state.lock().await;
            if state.is_running() {
                state.halt();
                let _ = self.events.send(SessionEvent::Tick(state.clone()));
                info!("session paused at {}s", state.elapsed_secs);
            }
        }
        self.cancel_ticker().await;
        self.wake.release();
    }

    /// Back to the initial idle snapshot; clears the time limit. Safe from
    /// any state, including Complete.
    pub async fn reset(&self) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.reset();
            state.clone()
        };
        self.cancel_ticker().await;
        self.wake.release();
        let _ = self.events.send(SessionEvent::Tick(snapshot));
    }

    pub async fn set_phase_secs(&self, secs: u32) {
        let mut state = self.state.lock().await;
        state.set_phase_secs(secs);
        let _ = self.events.send(SessionEvent::Tick(state.clone()));
    }

    pub async fn set_time_limit(&self, mins: Option<u32>) {
        let mut state = self.state.lock().await;
        state.set_time_limit(mins);
        let _ = self.events.send(SessionEvent::Tick(state.clone()));
    }

    pub async fn set_sound_enabled(&self, enabled: bool) {
        let mut state = self.state.lock().await;
        state.set_sound_enabled(enabled);
        let _ = self.events.send(SessionEvent::Tick(state.clone()));
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let events = self.events.clone();
        let cue = self.cue.clone();
        let wake = self.wake.clone();
        let period = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            loop {
                interval.tick().await;

                let (snapshot, effects) = {
                    let mut guard = state.lock().await;
                    if !guard.is_running() {
                        break;
                    }
                    let effects = guard.apply_tick(Instant::now());
                    (guard.clone(), effects)
                };

                if let Some(phase) = effects.phase_entered {
                    if snapshot.sound_enabled {
                        cue.play();
                    }
                    let _ = events.send(SessionEvent::PhaseChange(phase));
                }

                let _ = events.send(SessionEvent::Tick(snapshot.clone()));

                if effects.completed {
                    info!("session complete after {}s", snapshot.elapsed_secs);
                    wake.release();
                    let _ = events.send(SessionEvent::Complete {
                        total_secs: snapshot.elapsed_secs,
                    });
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NoopCue;
    use crate::session::state::SessionStatus;
    use crate::wake::NoopWakeLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCue(AtomicUsize);

    impl Cue for CountingCue {
        fn play(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingWake {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl CountingWake {
        fn new() -> Self {
            Self {
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }
        }
    }

    impl WakeLock for CountingWake {
        fn acquire(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }
        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn test_clock() -> SessionClock {
        SessionClock::new(Arc::new(NoopCue), Arc::new(NoopWakeLock))
    }

    async fn recv_until_complete(
        rx: &mut broadcast::Receiver<SessionEvent>,
    ) -> (Vec<Phase>, u64) {
        let mut phases = Vec::new();
        loop {
            match rx.recv().await.expect("event stream closed early") {
                SessionEvent::PhaseChange(phase) => phases.push(phase),
                SessionEvent::Complete { total_secs } => return (phases, total_secs),
                SessionEvent::Tick(_) => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_emits_inhale_then_snapshot() {
        let clock = test_clock();
        let mut rx = clock.subscribe();

        clock.start(SessionConfig::default()).await.unwrap();

        match rx.recv().await.unwrap() {
            SessionEvent::PhaseChange(phase) => assert_eq!(phase, Phase::Inhale),
            other => panic!("expected phase change first, got {:?}", other),
        }
        match rx.recv().await.unwrap() {
            SessionEvent::Tick(snapshot) => {
                assert_eq!(snapshot.status, SessionStatus::Running);
                assert_eq!(snapshot.elapsed_secs, 0);
                assert_eq!(snapshot.countdown, snapshot.phase_secs);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_rejected() {
        let clock = test_clock();
        clock.start(SessionConfig::default()).await.unwrap();
        assert!(clock.start(SessionConfig::default()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_session_runs_one_full_cycle_then_completes() {
        let clock = test_clock();
        let mut rx = clock.subscribe();

        clock
            .start(SessionConfig {
                phase_secs: 3,
                time_limit_mins: Some(0),
                sound_enabled: false,
            })
            .await
            .unwrap();

        let (phases, total_secs) = recv_until_complete(&mut rx).await;
        assert_eq!(
            phases,
            vec![
                Phase::Inhale,
                Phase::Hold,
                Phase::Exhale,
                Phase::Wait,
                Phase::Inhale
            ]
        );
        assert_eq!(total_secs, 12);

        // The ticker stopped itself: no further events ever arrive.
        let silence = time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(silence.is_err());

        assert_eq!(clock.snapshot().await.status, SessionStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_elapsed_once_per_second() {
        let clock = test_clock();
        let mut rx = clock.subscribe();
        clock.start(SessionConfig::default()).await.unwrap();

        // initial PhaseChange + Tick
        let _ = rx.recv().await.unwrap();
        let _ = rx.recv().await.unwrap();

        time::advance(Duration::from_secs(1)).await;
        match rx.recv().await.unwrap() {
            SessionEvent::Tick(snapshot) => {
                assert_eq!(snapshot.elapsed_secs, 1);
                assert_eq!(snapshot.countdown, snapshot.phase_secs - 1);
            }
            other => panic!("expected tick, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pause_is_idempotent_and_stops_events() {
        let clock = test_clock();
        clock.start(SessionConfig::default()).await.unwrap();

        clock.pause().await;
        let after_first = clock.snapshot().await;
        assert_eq!(after_first.status, SessionStatus::Idle);

        clock.pause().await;
        assert_eq!(clock.snapshot().await, after_first);

        let mut rx = clock.subscribe();
        let silence = time::timeout(Duration::from_secs(3), rx.recv()).await;
        assert!(silence.is_err(), "no ticks may fire after pause");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_limit_and_is_safe_when_idle() {
        let clock = test_clock();
        clock
            .start(SessionConfig {
                time_limit_mins: Some(5),
                ..SessionConfig::default()
            })
            .await
            .unwrap();
        time::advance(Duration::from_secs(3)).await;

        clock.reset().await;
        let snapshot = clock.snapshot().await;
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert_eq!(snapshot.elapsed_secs, 0);
        assert_eq!(snapshot.time_limit_mins, None);

        // reset with nothing running is fine too
        clock.reset().await;
    }

    #[tokio::test(start_paused = true)]
    async fn chime_fires_at_start_and_every_phase_entry_when_enabled() {
        let cue = Arc::new(CountingCue(AtomicUsize::new(0)));
        let clock = SessionClock::new(cue.clone(), Arc::new(NoopWakeLock));
        let mut rx = clock.subscribe();

        clock
            .start(SessionConfig {
                phase_secs: 3,
                time_limit_mins: Some(0),
                sound_enabled: true,
            })
            .await
            .unwrap();

        let (phases, _) = recv_until_complete(&mut rx).await;
        // one cue per phase entry, including the initial Inhale
        assert_eq!(cue.0.load(Ordering::SeqCst), phases.len());
    }

    #[tokio::test(start_paused = true)]
    async fn sound_disabled_never_touches_the_cue() {
        let cue = Arc::new(CountingCue(AtomicUsize::new(0)));
        let clock = SessionClock::new(cue.clone(), Arc::new(NoopWakeLock));
        let mut rx = clock.subscribe();

        clock
            .start(SessionConfig {
                phase_secs: 3,
                time_limit_mins: Some(0),
                sound_enabled: false,
            })
            .await
            .unwrap();

        recv_until_complete(&mut rx).await;
        assert_eq!(cue.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wake_lock_brackets_the_session() {
        let wake = Arc::new(CountingWake::new());
        let clock = SessionClock::new(Arc::new(NoopCue), wake.clone());

        clock.start(SessionConfig::default()).await.unwrap();
        assert_eq!(wake.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(wake.released.load(Ordering::SeqCst), 0);

        clock.pause().await;
        assert_eq!(wake.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wake_lock_released_on_completion() {
        let wake = Arc::new(CountingWake::new());
        let clock = SessionClock::new(Arc::new(NoopCue), wake.clone());
        let mut rx = clock.subscribe();

        clock
            .start(SessionConfig {
                phase_secs: 3,
                time_limit_mins: Some(0),
                sound_enabled: false,
            })
            .await
            .unwrap();
        recv_until_complete(&mut rx).await;

        assert_eq!(wake.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn setters_update_an_idle_clock_for_preview() {
        let clock = test_clock();
        clock.set_phase_secs(6).await;
        clock.set_time_limit(Some(2)).await;

        let snapshot = clock.snapshot().await;
        assert_eq!(snapshot.phase_secs, 6);
        assert_eq!(snapshot.countdown, 6);
        assert_eq!(snapshot.time_limit_mins, Some(2));
        assert_eq!(snapshot.status, SessionStatus::Idle);
    }
}
