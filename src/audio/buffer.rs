//! Planar f32 PCM buffer

use std::time::Duration;

use crate::error::{PublishError, Result};

/// Decoded audio, one `Vec<f32>` per channel, samples in [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from per-channel samples.
    ///
    /// Channels shorter than the longest one are padded with silence.
    pub fn from_planes(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for ch in &mut channels {
            ch.resize(frames, 0.0);
        }
        Self {
            sample_rate,
            channels,
        }
    }

    /// Silence of the given shape
    pub fn silent(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channels as usize],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    pub fn plane(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    pub fn planes(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Change the channel count.
    ///
    /// Mono is duplicated into every output channel, a downmix to mono
    /// averages all channels, any other conversion maps output channel `i`
    /// to input channel `i % n`.
    pub fn set_channels(self, channels: u16) -> Self {
        let target = channels as usize;
        let current = self.channels.len();
        if target == current || current == 0 || target == 0 {
            return self;
        }

        let planes = if target == 1 {
            let frames = self.frames();
            let scale = 1.0 / current as f32;
            let mut mono = vec![0.0f32; frames];
            for plane in &self.channels {
                for (out, s) in mono.iter_mut().zip(plane) {
                    *out += s * scale;
                }
            }
            vec![mono]
        } else {
            (0..target)
                .map(|i| self.channels[i % current].clone())
                .collect()
        };

        Self {
            sample_rate: self.sample_rate,
            channels: planes,
        }
    }

    /// Mix `other` on top of this buffer starting at time zero.
    ///
    /// Both buffers must share a sample rate; `other` is decoded at this
    /// buffer's rate by the codec. The result keeps this buffer's length and
    /// channel count: a shorter `other` leaves the tail untouched, a longer
    /// one is cut off. Sums are clamped to [-1.0, 1.0].
    pub fn overlay(&self, other: &AudioBuffer) -> Result<AudioBuffer> {
        if other.sample_rate != self.sample_rate {
            return Err(PublishError::InvariantViolation(format!(
                "cannot overlay {} Hz audio onto {} Hz audio",
                other.sample_rate, self.sample_rate
            )));
        }
        let other = other.clone().set_channels(self.channel_count());

        let channels = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, base)| {
                let mut mixed = base.clone();
                if let Some(top) = other.plane(i) {
                    for (out, s) in mixed.iter_mut().zip(top) {
                        *out = (*out + s).clamp(-1.0, 1.0);
                    }
                }
                mixed
            })
            .collect();

        Ok(AudioBuffer {
            sample_rate: self.sample_rate,
            channels,
        })
    }
}
