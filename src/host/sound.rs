use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;

const TONE_HZ: f32 = 440.0;
const VOLUME: f32 = 0.2;

#[derive(Debug, Error)]
pub enum SoundError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("unsupported sample format '{0}'")]
    UnsupportedFormat(cpal::SampleFormat),
    #[error(transparent)]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error(transparent)]
    Build(#[from] cpal::BuildStreamError),
    #[error(transparent)]
    Play(#[from] cpal::PlayStreamError),
}

/// A 440 Hz square-ish tone that plays while the gate is open.
///
/// The stream runs for the lifetime of the value and writes silence while
/// gated off, so toggling never blocks the caller.
pub struct Beeper {
    gate: Arc<AtomicBool>,
    _stream: cpal::Stream,
}

impl Beeper {
    pub fn new() -> Result<Self, SoundError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SoundError::NoDevice)?;
        let supported_config = device.default_output_config()?;
        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config.into();
        let gate = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            cpal::SampleFormat::I8 => run::<i8>(&device, &config, gate.clone()),
            cpal::SampleFormat::I16 => run::<i16>(&device, &config, gate.clone()),
            cpal::SampleFormat::I32 => run::<i32>(&device, &config, gate.clone()),
            cpal::SampleFormat::I64 => run::<i64>(&device, &config, gate.clone()),
            cpal::SampleFormat::U8 => run::<u8>(&device, &config, gate.clone()),
            cpal::SampleFormat::U16 => run::<u16>(&device, &config, gate.clone()),
            cpal::SampleFormat::U32 => run::<u32>(&device, &config, gate.clone()),
            cpal::SampleFormat::U64 => run::<u64>(&device, &config, gate.clone()),
            cpal::SampleFormat::F32 => run::<f32>(&device, &config, gate.clone()),
            cpal::SampleFormat::F64 => run::<f64>(&device, &config, gate.clone()),
            sample_format => return Err(SoundError::UnsupportedFormat(sample_format)),
        }?;
        stream.play()?;

        log::debug!(
            "audio: {} channel(s) at {} Hz, {sample_format}",
            config.channels,
            config.sample_rate.0
        );
        Ok(Self {
            gate,
            _stream: stream,
        })
    }

    pub fn set_active(&self, active: bool) {
        self.gate.store(active, Ordering::Relaxed);
    }
}

fn run<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    gate: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let sample_rate = config.sample_rate.0 as f32;
    let channels = config.channels as usize;

    let mut sample_clock = 0f32;
    let mut next_value = move || {
        sample_clock = (sample_clock + 1.0) % sample_rate;
        let phase = (sample_clock * TONE_HZ * 2.0 * std::f32::consts::PI / sample_rate).sin();
        phase.signum() * VOLUME
    };

    let err_fn = |err: cpal::StreamError| log::error!("an error occurred on stream: {err}");

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let active = gate.load(Ordering::Relaxed);
            write_data(data, channels, active, &mut next_value)
        },
        err_fn,
        None,
    )
}

fn write_data<T>(output: &mut [T], channels: usize, active: bool, next_sample: &mut dyn FnMut() -> f32)
where
    T: Sample + FromSample<f32>,
{
    for frame in output.chunks_mut(channels) {
        let level = if active { next_sample() } else { 0.0 };
        let value: T = T::from_sample(level);
        for sample in frame.iter_mut() {
            *sample = value;
        }
    }
}
