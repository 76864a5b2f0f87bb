//! Audio output through `cpal`, fed from a lock-free ring of stereo frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam::queue::ArrayQueue;
use minarch_core::audio::StereoFrame;

use crate::settings::SharedSettings;

/// Ring length in seconds of device audio.
const BUFFER_SECONDS: f64 = 0.1;

/// Counters shared with the device callback.
#[derive(Debug, Default)]
pub struct AudioStats {
    played: AtomicU64,
    underruns: AtomicU64,
}

impl AudioStats {
    /// Frames consumed by the device since the last call.
    pub fn take_played(&self) -> u64 {
        self.played.swap(0, Ordering::Relaxed)
    }

    pub fn take_underruns(&self) -> u64 {
        self.underruns.swap(0, Ordering::Relaxed)
    }
}

pub struct AudioOutput {
    queue: Arc<ArrayQueue<StereoFrame>>,
    stats: Arc<AudioStats>,
    sample_rate: u32,
    stream: Stream,
    paused: bool,
}

impl AudioOutput {
    pub fn open(settings: Arc<SharedSettings>) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().context("No audio output device available")?;
        let supported = device
            .default_output_config()
            .context("Failed to query the audio output config")?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;

        let capacity = ((sample_rate as f64 * BUFFER_SECONDS) as usize).max(512);
        let queue = Arc::new(ArrayQueue::new(capacity));
        let stats = Arc::new(AudioStats::default());

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, queue.clone(), stats.clone(), settings),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, queue.clone(), stats.clone(), settings),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, queue.clone(), stats.clone(), settings),
            other => anyhow::bail!("Unsupported audio sample format: {:?}", other),
        }?;
        stream.play().context("Failed to start the audio stream")?;

        log::info!(
            "Audio output: {} Hz, {} channels, {:?}, ring of {} frames",
            sample_rate,
            config.channels,
            sample_format,
            capacity
        );

        Ok(Self {
            queue,
            stats,
            sample_rate,
            stream,
            paused: false,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn stats(&self) -> &AudioStats {
        &self.stats
    }

    /// Queue one frame, dropped when the ring is full.
    #[inline]
    pub fn push(&self, frame: StereoFrame) -> bool {
        self.queue.push(frame).is_ok()
    }

    /// Fill level in percent, as reported to the core's buffer status callback.
    pub fn occupancy(&self) -> u32 {
        (self.queue.len() * 100 / self.queue.capacity()) as u32
    }

    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stop the device stream and drop whatever was still queued.
    pub fn pause(&mut self) -> anyhow::Result<()> {
        self.clear();
        if !self.paused {
            self.stream.pause().context("Failed to pause the audio stream")?;
            self.paused = true;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> anyhow::Result<()> {
        if self.paused {
            self.stream.play().context("Failed to resume the audio stream")?;
            self.paused = false;
            self.stats.take_played();
            self.stats.take_underruns();
        }
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: Arc<ArrayQueue<StereoFrame>>,
    stats: Arc<AudioStats>,
    settings: Arc<SharedSettings>,
) -> anyhow::Result<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let gain = settings.block().output_gain();
            let mut played = 0;
            let mut starved = false;

            for out in data.chunks_mut(channels) {
                let frame = match queue.pop() {
                    Some(frame) => {
                        played += 1;
                        frame
                    }
                    None => {
                        starved = true;
                        [0, 0]
                    }
                };

                for (channel, sample) in out.iter_mut().enumerate() {
                    let value = frame[channel.min(1)] as f32 * gain;
                    *sample = T::from_sample(value as i16);
                }
            }

            stats.played.fetch_add(played, Ordering::Relaxed);
            if starved {
                stats.underruns.fetch_add(1, Ordering::Relaxed);
            }
        },
        |err| log::error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
