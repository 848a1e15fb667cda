//! Track encoder
//!
//! Wraps an FFmpeg `AVCodecContext` to encode PCM frames into the codec
//! matching an [`ExportFormat`]: MP3 (libmp3lame), AAC for ADTS, or 16-bit
//! PCM for WAV.

use crate::audio::ExportFormat;
use crate::error::{CodecError, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

/// Samples per frame when the codec accepts any frame size (PCM)
pub const DEFAULT_FRAME_SIZE: usize = 1024;

/// Codec id for an export container
pub fn codec_id_for(format: ExportFormat) -> codec::Id {
    match format {
        ExportFormat::Mp3 => codec::Id::MP3,
        ExportFormat::Wav => codec::Id::PCM_S16LE,
        ExportFormat::Adts => codec::Id::AAC,
    }
}

/// Sample format the encoder for `format` is opened with
pub fn sample_format_for(format: ExportFormat) -> Sample {
    match format {
        ExportFormat::Mp3 | ExportFormat::Adts => Sample::F32(Type::Planar),
        ExportFormat::Wav => Sample::I16(Type::Packed),
    }
}

/// Audio encoder for one exported track
pub struct TrackEncoder {
    encoder: ffmpeg::encoder::Audio,
    format: ExportFormat,
    sample_format: Sample,
    frame_size: usize,
    time_base: ffmpeg::Rational,
    pts: i64,
}

impl TrackEncoder {
    /// Open an encoder for `format` at the given parameters.
    ///
    /// `bitrate` is ignored by the PCM encoder.
    pub fn open(
        format: ExportFormat,
        sample_rate: u32,
        layout: ChannelLayout,
        bitrate: u64,
    ) -> Result<Self> {
        let id = codec_id_for(format);
        let codec = codec::encoder::find(id).ok_or_else(|| {
            CodecError::EncoderNotFound(format!("{:?} encoder not found in this FFmpeg build", id))
        })?;
        let sample_format = sample_format_for(format);

        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, sample_rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            CodecError::EncoderConfigure(format!("Cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(sample_rate as i32);
        audio_enc.set_format(sample_format);
        audio_enc.set_channel_layout(layout);
        if format != ExportFormat::Wav {
            audio_enc.set_bit_rate(bitrate as usize);
        }

        let encoder = audio_enc.open_as(codec).map_err(|e| {
            CodecError::EncoderConfigure(format!("Failed to open {:?} encoder: {}", id, e))
        })?;

        let frame_size = match encoder.frame_size() as usize {
            0 => DEFAULT_FRAME_SIZE,
            n => n,
        };

        tracing::debug!(
            codec = ?id,
            sample_rate,
            bitrate,
            frame_size,
            "Opened track encoder"
        );

        Ok(Self {
            encoder,
            format,
            sample_format,
            frame_size,
            time_base: ffmpeg::Rational::new(1, sample_rate as i32),
            pts: 0,
        })
    }

    /// Send one PCM frame to the encoder, stamping its pts.
    pub fn send_frame(&mut self, frame: &mut ffmpeg::util::frame::Audio) -> Result<()> {
        frame.set_pts(Some(self.pts));
        self.pts += frame.samples() as i64;
        self.encoder
            .send_frame(frame)
            .map_err(|e| CodecError::EncodeFrame(format!("send_frame error: {}", e)).into())
    }

    /// Send EOF to flush the encoder's buffered output.
    pub fn send_eof(&mut self) -> Result<()> {
        self.encoder
            .send_eof()
            .map_err(|e| CodecError::EncodeFrame(format!("send_eof error: {}", e)).into())
    }

    /// Receive one encoded packet, or `None` if the encoder needs more input.
    pub fn receive_packet(&mut self) -> Result<Option<ffmpeg::codec::packet::Packet>> {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match self.encoder.receive_packet(&mut packet) {
            Ok(()) => Ok(Some(packet)),
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(CodecError::EncodeFrame(format!("receive_packet error: {}", e)).into()),
        }
    }

    /// Flush any remaining buffered packets after sending EOF.
    pub fn flush(&mut self) -> Result<Vec<ffmpeg::codec::packet::Packet>> {
        self.send_eof()?;
        let mut packets = Vec::new();
        while let Some(p) = self.receive_packet()? {
            packets.push(p);
        }
        Ok(packets)
    }

    /// Samples per channel the encoder expects per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Sample format frames must be converted to before `send_frame`.
    pub fn sample_format(&self) -> Sample {
        self.sample_format
    }

    pub fn export_format(&self) -> ExportFormat {
        self.format
    }

    /// The encoder timebase (1 / sample_rate).
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// Codec parameters for the muxer stream.
    pub fn codec_parameters(&self) -> ffmpeg::codec::Parameters {
        crate::ffmpeg::helpers::encoder_codec_parameters(&self.encoder)
    }
}

/// Check whether the FFmpeg build includes an encoder for `format`.
pub fn is_encoder_available(format: ExportFormat) -> bool {
    codec::encoder::find(codec_id_for(format)).is_some()
}
