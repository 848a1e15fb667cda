//! Sample format conversion
//!
//! Decoded frames go to planar f32, optionally at another sample rate (the
//! effects bed is decoded at the rate of the track it is mixed into).
//! Planar f32 goes to whatever the target encoder accepts at the same rate.

use crate::error::{CodecError, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

/// Sample format of in-memory audio
pub const WORKING_SAMPLE_FORMAT: Sample = Sample::F32(Type::Planar);

/// Extra output room per frame for samples swresample held back earlier
const OUTPUT_HEADROOM: usize = 256;

/// `SwrContext` wrapper for a fixed channel layout
pub struct SampleConverter {
    context: resampling::Context,
    target: Sample,
    layout: ChannelLayout,
    input_rate: u32,
    output_rate: u32,
}

impl SampleConverter {
    fn build(
        from: Sample,
        to: Sample,
        layout: ChannelLayout,
        input_rate: u32,
        output_rate: u32,
    ) -> Result<Self> {
        let context = resampling::Context::get(from, layout, input_rate, to, layout, output_rate)
            .map_err(|e| {
                CodecError::ResamplerCreate(format!(
                    "{:?} at {} Hz -> {:?} at {} Hz: {}",
                    from, input_rate, to, output_rate, e
                ))
            })?;
        Ok(Self {
            context,
            target: to,
            layout,
            input_rate,
            output_rate,
        })
    }

    /// Converter from the shape of a decoded frame to planar f32 at
    /// `sample_rate`.
    pub fn to_working(frame: &ffmpeg::util::frame::Audio, sample_rate: u32) -> Result<Self> {
        let layout = crate::ffmpeg::helpers::frame_layout(frame);
        Self::build(frame.format(), WORKING_SAMPLE_FORMAT, layout, frame.rate(), sample_rate)
    }

    /// Converter from planar f32 to an encoder's sample format.
    pub fn from_working(target: Sample, layout: ChannelLayout, rate: u32) -> Result<Self> {
        Self::build(WORKING_SAMPLE_FORMAT, target, layout, rate, rate)
    }

    pub fn target(&self) -> Sample {
        self.target
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Output frame large enough for everything one input frame can yield.
    fn output_frame(&self, input_samples: usize) -> ffmpeg::util::frame::Audio {
        let scaled = input_samples as u64 * self.output_rate as u64 / self.input_rate.max(1) as u64;
        let mut out = ffmpeg::util::frame::Audio::new(
            self.target,
            scaled as usize + OUTPUT_HEADROOM,
            self.layout,
        );
        out.set_rate(self.output_rate);
        out
    }

    /// Convert one frame; `None` while swresample is still buffering.
    pub fn convert(
        &mut self,
        frame: &ffmpeg::util::frame::Audio,
    ) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let mut out = self.output_frame(frame.samples());
        self.context
            .run(frame, &mut out)
            .map_err(|e| CodecError::ReadFrame(format!("sample conversion: {}", e)))?;
        Ok(Some(out).filter(|f| f.samples() > 0))
    }

    /// Samples still held by swresample, if any.
    pub fn drain(&mut self) -> Option<ffmpeg::util::frame::Audio> {
        let mut out = ffmpeg::util::frame::Audio::empty();
        match self.context.flush(&mut out) {
            Ok(_) if out.samples() > 0 => Some(out),
            Ok(_) => None,
            // Nothing buffered; swresample reports that as an error.
            Err(e) => {
                tracing::trace!("swresample flush: {}", e);
                None
            }
        }
    }
}
