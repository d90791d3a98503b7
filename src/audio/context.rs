// Audio context - The process-wide clock and output path
//
// Nothing touches the output device until the first `unlock()`; the device
// is then opened on a dedicated thread that keeps the stream alive until
// `close()` or drop.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::engine::{AudioOutput, OutputShared};
use crate::audio::mixer::Mixer;
use crate::audio::parameters::AtomicF32;
use crate::messaging::channels::{
    NotificationConsumer, NotificationProducer, create_notification_channel,
};
use crate::messaging::notification::Notification;
use crate::sequencer::transport::{DEFAULT_SAMPLE_RATE, TransportClock};
use crate::synth::oscillator::Waveform;
use crate::synth::trait_def::Voice;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoDevice,

    #[error("audio configuration error: {0}")]
    Config(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build audio stream: {0}")]
    BuildStream(String),

    #[error("failed to start audio stream: {0}")]
    PlayStream(String),

    #[error("audio output thread failed: {0}")]
    OutputThread(String),
}

/// What a sequencer needs from the audio subsystem
pub trait AudioBackend: Send + Sync {
    /// The shared transport clock
    fn clock(&self) -> Arc<TransportClock>;

    /// Make sure audio output is running. Idempotent.
    fn unlock(&self) -> Result<(), AudioError>;

    /// Allocate a new synthesis resource
    fn create_voice(&self, waveform: Waveform, amplitude: f32) -> Box<dyn Voice>;
}

struct OutputThread {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Real-time backend on the default output device
pub struct AudioContext {
    clock: Arc<TransportClock>,
    mixer: Arc<Mixer>,
    master_gain: AtomicF32,
    notification_tx: Arc<Mutex<NotificationProducer>>,
    notification_rx: Mutex<NotificationConsumer>,
    output: Mutex<Option<OutputThread>>,
}

impl AudioContext {
    pub fn new(master_gain: f32) -> Self {
        let (notification_tx, notification_rx) = create_notification_channel(64);
        Self {
            clock: Arc::new(TransportClock::new(DEFAULT_SAMPLE_RATE)),
            mixer: Mixer::new(DEFAULT_SAMPLE_RATE as f32),
            master_gain: AtomicF32::new(master_gain.clamp(0.0, 1.0)),
            notification_tx: Arc::new(Mutex::new(notification_tx)),
            notification_rx: Mutex::new(notification_rx),
            output: Mutex::new(None),
        }
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.master_gain.set(gain.clamp(0.0, 1.0));
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.get()
    }

    /// Notifications raised by the output stream since the last call
    pub fn drain_notifications(&self) -> Vec<Notification> {
        let mut rx = self.notification_rx.lock();
        std::iter::from_fn(|| ringbuf::traits::Consumer::try_pop(&mut *rx)).collect()
    }

    /// Stop the output thread and release the device
    pub fn close(&self) {
        let Some(output) = self.output.lock().take() else {
            return;
        };
        self.clock.stop();
        let _ = output.shutdown_tx.send(());
        if output.handle.join().is_err() {
            warn!("audio output thread panicked");
        }
        info!("audio output closed");
    }

    fn spawn_output(&self) -> Result<OutputThread, AudioError> {
        let shared = OutputShared {
            clock: Arc::clone(&self.clock),
            mixer: Arc::clone(&self.mixer),
            master_gain: self.master_gain.clone(),
            notification_tx: Arc::clone(&self.notification_tx),
        };
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let output = match AudioOutput::open(shared) {
                    Ok(output) => output,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Keep the stream alive until asked to stop (or the context is gone)
                let _ = shutdown_rx.recv();
                drop(output);
            })
            .map_err(|e| AudioError::OutputThread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(OutputThread {
                shutdown_tx,
                handle,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(AudioError::OutputThread(
                    "output thread exited before reporting".to_string(),
                ))
            }
        }
    }
}

impl AudioBackend for AudioContext {
    fn clock(&self) -> Arc<TransportClock> {
        Arc::clone(&self.clock)
    }

    fn unlock(&self) -> Result<(), AudioError> {
        let mut output = self.output.lock();
        if output.is_some() {
            return Ok(());
        }
        debug!("unlocking audio output");
        *output = Some(self.spawn_output()?);
        Ok(())
    }

    fn create_voice(&self, waveform: Waveform, amplitude: f32) -> Box<dyn Voice> {
        Box::new(self.mixer.create_voice(waveform, amplitude))
    }
}

impl Default for AudioContext {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
