// Audio output - CPAL real-time callback
//
// The callback drives the transport clock: each block is rendered in
// segments split at scheduled callback times, so sequencer triggers land on
// their exact sample. Synthesis runs in f32 mono; conversion to the device
// sample format (F32, I16, U16) and fan-out to every channel happen when the
// block is written.
//
// On macOS (CoreAudio) the Stream is not Send, so the output lives on the
// thread that opened it (see `AudioContext`).

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

use crate::audio::context::AudioError;
use crate::audio::dsp_utils::{OnePoleSmoother, flush_denormals_to_zero, soft_clip};
use crate::audio::mixer::Mixer;
use crate::audio::parameters::AtomicF32;
use crate::messaging::channels::NotificationProducer;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::transport::TransportClock;

/// Frames of mono mix rendered per chunk; preallocated once per stream
const SCRATCH_FRAMES: usize = 8192;

/// Everything the output callback needs
#[derive(Clone)]
pub struct OutputShared {
    pub clock: Arc<TransportClock>,
    pub mixer: Arc<Mixer>,
    pub master_gain: AtomicF32,
    pub notification_tx: Arc<Mutex<NotificationProducer>>,
}

pub struct AudioOutput {
    _stream: Stream,
}

impl AudioOutput {
    /// Open and start the default output device
    pub fn open(shared: OutputShared) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            channels,
            format = ?sample_format,
            "opening audio output"
        );

        // Voices created from now on run at the device rate
        shared.mixer.set_sample_rate(sample_rate);
        shared.clock.set_sample_rate(sample_rate as f64);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, channels, shared),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, channels, shared),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, channels, shared),
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))?;

        info!(sample_rate, channels, "audio output started");

        Ok(Self { _stream: stream })
    }

    /// Build an output stream for any device sample type
    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        channels: usize,
        shared: OutputShared,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let OutputShared {
            clock,
            mixer,
            master_gain,
            notification_tx,
        } = shared;
        let sample_rate = config.sample_rate.0 as f32;
        let mut renderer =
            OutputRenderer::new(clock, mixer, channels, master_gain.get(), sample_rate);

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    renderer.render(data, master_gain.get());
                },
                move |err| {
                    // Runs outside the real-time callback
                    error!(error = %err, "audio stream error");
                    if let Some(mut tx) = notification_tx.try_lock() {
                        let notif = Notification::error(
                            NotificationCategory::Audio,
                            format!("Audio stream error: {err}"),
                        );
                        let _ = ringbuf::traits::Producer::try_push(&mut *tx, notif);
                    }
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))
    }
}

/// State owned by the output callback
struct OutputRenderer {
    clock: Arc<TransportClock>,
    mixer: Arc<Mixer>,
    channels: usize,
    scratch: Vec<f32>,
    gain_smoother: OnePoleSmoother,
}

impl OutputRenderer {
    fn new(
        clock: Arc<TransportClock>,
        mixer: Arc<Mixer>,
        channels: usize,
        initial_gain: f32,
        sample_rate: f32,
    ) -> Self {
        Self {
            clock,
            mixer,
            channels: channels.max(1),
            scratch: vec![0.0f32; SCRATCH_FRAMES],
            gain_smoother: OnePoleSmoother::new(initial_gain, 10.0, sample_rate),
        }
    }

    /// Fill one interleaved device buffer. No I/O, no allocation, no blocking locks.
    fn render<T>(&mut self, data: &mut [T], target_gain: f32)
    where
        T: Sample + FromSample<f32>,
    {
        // Blocks larger than the scratch are rendered in scratch-sized chunks
        for block in data.chunks_mut(SCRATCH_FRAMES * self.channels) {
            let frames = block.len() / self.channels;
            let mix = &mut self.scratch[..frames];
            mix.fill(0.0);

            let mixer = &self.mixer;
            let mut offset = 0;
            self.clock.process_block(frames, |n| {
                mixer.render_add(&mut mix[offset..offset + n]);
                offset += n;
            });

            for (frame, sample) in block.chunks_mut(self.channels).zip(mix.iter()) {
                let gain = self.gain_smoother.process(target_gain);
                let out = soft_clip(flush_denormals_to_zero(*sample) * gain);
                for channel_sample in frame.iter_mut() {
                    *channel_sample = Sample::from_sample::<f32>(out);
                }
            }
        }
    }
}
