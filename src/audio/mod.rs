pub mod tone;

use tone::Tone;

use log::warn;
use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

const CHIME_FREQ_HZ: f32 = 440.0;
const CHIME_DURATION: Duration = Duration::from_millis(150);

/// Audible cue collaborator. Fire-and-forget: implementations swallow device
/// failures, so the session clock can call this blindly from its tick loop.
pub trait Cue: Send + Sync {
    fn play(&self);
}

/// Silent cue for tests and `--no-sound`.
pub struct NoopCue;

impl Cue for NoopCue {
    fn play(&self) {}
}

enum CueCommand {
    Chime,
}

/// Plays the phase-change chime on a dedicated audio thread.
///
/// The rodio output stream and sink are not `Send`, so they live on a thread
/// spawned on first use and are driven over a channel. If no output device is
/// available the chime degrades to a logged warning and the session carries
/// on silently.
pub struct ChimeEngine {
    tx: Arc<Mutex<Option<Sender<CueCommand>>>>,
}

impl ChimeEngine {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<CueCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<CueCommand>();

        // Spawn dedicated audio thread holding non-Send audio objects
        thread::Builder::new()
            .name("chime-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        CueCommand::Chime => {
                            if let Err(e) = ensure_sink(&mut _stream, &mut sink) {
                                warn!("chime unavailable: {}", e);
                                continue;
                            }
                            if let Some(ref s) = sink {
                                s.append(Tone::new(CHIME_FREQ_HZ, CHIME_DURATION));
                                s.play();
                            }
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    fn chime(&self) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(CueCommand::Chime).map_err(|e| e.to_string())
    }
}

impl Default for ChimeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Cue for ChimeEngine {
    fn play(&self) {
        if let Err(e) = self.chime() {
            warn!("failed to queue chime: {}", e);
        }
    }
}
