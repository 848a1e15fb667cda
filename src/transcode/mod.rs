//! FFmpeg-backed audio codec
//!
//! Loading: `TrackReader` → `SampleConverter` (to planar f32, optionally
//! at another rate) →
//! [`AudioBuffer`]. Exporting: [`AudioBuffer`] → planar f32 frames →
//! optional `SampleConverter` (to the encoder's sample format) →
//! `TrackEncoder` → file muxer.

pub mod decoder;
pub mod encoder;
pub mod resampler;

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;

use crate::audio::{AudioBuffer, AudioCodec, ExportFormat};
use crate::error::{CodecError, Result};
use crate::ffmpeg::helpers::{f32_plane, f32_plane_mut, layout_for_channels};

use decoder::TrackReader;
use encoder::TrackEncoder;
use resampler::{SampleConverter, WORKING_SAMPLE_FORMAT};

/// Sample rate assumed when the decoder does not report one
const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Production codec using the linked FFmpeg libraries
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegCodec;

impl FfmpegCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode the best audio stream of `path` to planar f32, resampled to
    /// `sample_rate` when one is given.
    fn decode(&self, path: &Path, sample_rate: Option<u32>) -> Result<AudioBuffer> {
        let mut reader = TrackReader::open(path)?;
        let source_rate = match reader.sample_rate() {
            0 => FALLBACK_SAMPLE_RATE,
            rate => rate,
        };
        let sample_rate = sample_rate.unwrap_or(source_rate);
        let mut planes: Vec<Vec<f32>> = Vec::new();
        let mut converter: Option<SampleConverter> = None;

        while let Some(frame) = reader.next_frame()? {
            append_decoded(&mut planes, &mut converter, &frame, sample_rate)?;
        }
        if let Some(tail) = converter.as_mut().and_then(|c| c.drain()) {
            append_planes(&mut planes, &tail)?;
        }

        let audio = AudioBuffer::from_planes(sample_rate, planes);
        tracing::debug!(
            path = %path.display(),
            channels = audio.channel_count(),
            sample_rate = audio.sample_rate(),
            duration_secs = audio.duration().as_secs_f64(),
            source_rate,
            "Decoded audio"
        );
        Ok(audio)
    }
}

impl AudioCodec for FfmpegCodec {
    fn load(&self, path: &Path) -> Result<AudioBuffer> {
        self.decode(path, None)
    }

    fn load_at(&self, path: &Path, sample_rate: u32) -> Result<AudioBuffer> {
        self.decode(path, Some(sample_rate))
    }

    fn export(
        &self,
        audio: &AudioBuffer,
        path: &Path,
        format: ExportFormat,
        bitrate: u64,
    ) -> Result<()> {
        if audio.channel_count() == 0 {
            return Err(CodecError::EncoderConfigure(format!(
                "Refusing to export {} without audio channels",
                path.display()
            ))
            .into());
        }

        let mut layout = layout_for_channels(audio.channel_count());
        let downmixed;
        let audio = if layout.bits().count_ones() as u16 != audio.channel_count() {
            tracing::warn!(
                channels = audio.channel_count(),
                "No standard layout for channel count, exporting as stereo"
            );
            layout = ChannelLayout::STEREO;
            downmixed = audio.clone().set_channels(2);
            &downmixed
        } else {
            audio
        };

        let rate = audio.sample_rate();
        let mut encoder = TrackEncoder::open(format, rate, layout, bitrate)?;

        let mut output = ffmpeg::format::output_as(path, format.muxer_name()).map_err(|e| {
            CodecError::MuxerCreate(format!(
                "Failed to create {} output {}: {}",
                format.muxer_name(),
                path.display(),
                e
            ))
        })?;
        {
            let mut stream = output
                .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
                .map_err(|e| CodecError::MuxerCreate(format!("Failed to add stream: {}", e)))?;
            stream.set_parameters(encoder.codec_parameters());
            stream.set_time_base(encoder.time_base());
        }
        output
            .write_header()
            .map_err(|e| CodecError::WriteError(format!("Failed to write header: {}", e)))?;
        let stream_tb = output
            .stream(0)
            .map(|s| s.time_base())
            .unwrap_or_else(|| encoder.time_base());

        let mut converter = if encoder.sample_format() != WORKING_SAMPLE_FORMAT {
            Some(SampleConverter::from_working(encoder.sample_format(), layout, rate)?)
        } else {
            None
        };

        let total = audio.frames();
        let chunk = encoder.frame_size();
        let mut offset = 0;
        while offset < total {
            let n = chunk.min(total - offset);
            let frame = working_frame(audio, offset, n, layout)?;
            offset += n;

            let mut frame = match converter.as_mut() {
                Some(conv) => match conv.convert(&frame)? {
                    Some(converted) => converted,
                    None => continue,
                },
                None => frame,
            };
            encoder.send_frame(&mut frame)?;
            write_ready_packets(&mut encoder, &mut output, stream_tb)?;
        }

        if let Some(mut tail) = converter.as_mut().and_then(|c| c.drain()) {
            encoder.send_frame(&mut tail)?;
            write_ready_packets(&mut encoder, &mut output, stream_tb)?;
        }
        for packet in encoder.flush()? {
            write_packet(packet, &encoder, &mut output, stream_tb)?;
        }

        output
            .write_trailer()
            .map_err(|e| CodecError::WriteError(format!("Failed to write trailer: {}", e)))?;

        tracing::debug!(
            path = %path.display(),
            format = format.muxer_name(),
            bitrate,
            frames = total,
            "Exported audio"
        );
        Ok(())
    }
}

/// Convert a decoded frame to planar f32 at `sample_rate` and append it.
fn append_decoded(
    planes: &mut Vec<Vec<f32>>,
    converter: &mut Option<SampleConverter>,
    frame: &ffmpeg::util::frame::Audio,
    sample_rate: u32,
) -> Result<()> {
    if converter.is_none()
        && frame.format() == WORKING_SAMPLE_FORMAT
        && frame.rate() == sample_rate
    {
        return append_planes(planes, frame);
    }
    let conv = match converter {
        Some(c) => c,
        None => converter.insert(SampleConverter::to_working(frame, sample_rate)?),
    };
    if let Some(converted) = conv.convert(frame)? {
        append_planes(planes, &converted)?;
    }
    Ok(())
}

/// Append the samples of a planar f32 frame.
fn append_planes(planes: &mut Vec<Vec<f32>>, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
    let n = frame.samples();
    let channels = frame.channels() as usize;
    if planes.is_empty() {
        planes.resize(channels, Vec::new());
    }
    for (ch, plane) in planes.iter_mut().enumerate().take(channels) {
        let samples = f32_plane(frame, ch).ok_or_else(|| {
            CodecError::ReadFrame(format!("channel {} of a {}-sample frame is unreadable", ch, n))
        })?;
        plane.extend_from_slice(samples);
    }
    Ok(())
}

/// Build a planar f32 frame from `n` samples of `audio` starting at `offset`.
fn working_frame(
    audio: &AudioBuffer,
    offset: usize,
    n: usize,
    layout: ChannelLayout,
) -> Result<ffmpeg::util::frame::Audio> {
    let mut frame = ffmpeg::util::frame::Audio::new(WORKING_SAMPLE_FORMAT, n, layout);
    frame.set_rate(audio.sample_rate());
    for (ch, plane) in audio.planes().iter().enumerate() {
        let out = f32_plane_mut(&mut frame, ch).ok_or_else(|| {
            CodecError::EncodeFrame(format!("channel {} of the output frame is unwritable", ch))
        })?;
        out.copy_from_slice(&plane[offset..offset + n]);
    }
    Ok(frame)
}

fn write_ready_packets(
    encoder: &mut TrackEncoder,
    output: &mut ffmpeg::format::context::Output,
    stream_tb: ffmpeg::Rational,
) -> Result<()> {
    while let Some(packet) = encoder.receive_packet()? {
        write_packet(packet, encoder, output, stream_tb)?;
    }
    Ok(())
}

fn write_packet(
    mut packet: ffmpeg::codec::packet::Packet,
    encoder: &TrackEncoder,
    output: &mut ffmpeg::format::context::Output,
    stream_tb: ffmpeg::Rational,
) -> Result<()> {
    packet.set_stream(0);
    packet.rescale_ts(encoder.time_base(), stream_tb);
    packet
        .write_interleaved(output)
        .map_err(|e| CodecError::WriteError(format!("Failed to write packet: {}", e)).into())
}
