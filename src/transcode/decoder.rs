//! Track reader
//!
//! Opens an audio file, picks its best audio stream and yields decoded PCM
//! frames one at a time, reading packets from the demuxer as needed.

use std::path::Path;

use crate::error::{CodecError, Result};
use ffmpeg_next as ffmpeg;

pub struct TrackReader {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
    /// The demuxer hit end of file and the decoder was told so
    draining: bool,
}

impl TrackReader {
    pub fn open(path: &Path) -> Result<Self> {
        let input = ffmpeg::format::input(path).map_err(|e| {
            CodecError::OpenInput(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let (stream_index, decoder) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Audio)
                .ok_or_else(|| CodecError::NoAudioStream(path.display().to_string()))?;
            let context = ffmpeg::codec::Context::from_parameters(stream.parameters())
                .map_err(|e| {
                    CodecError::DecoderNotFound(format!("{}: {}", path.display(), e))
                })?;
            let decoder = context.decoder().audio().map_err(|e| {
                CodecError::DecoderNotFound(format!("{}: {}", path.display(), e))
            })?;
            (stream.index(), decoder)
        };

        tracing::debug!(
            path = %path.display(),
            stream_index,
            codec = ?decoder.id(),
            "Opened track"
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            draining: false,
        })
    }

    /// Sample rate reported by the decoder, 0 when unknown
    pub fn sample_rate(&self) -> u32 {
        self.decoder.rate()
    }

    /// Next decoded frame, `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        loop {
            let mut frame = ffmpeg::util::frame::Audio::empty();
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => return Ok(Some(frame)),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    if self.draining {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    return Err(CodecError::ReadFrame(format!("receive_frame: {}", e)).into())
                }
            }
            self.feed()?;
        }
    }

    /// Send the next packet of our stream to the decoder, or EOF.
    fn feed(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() == self.stream_index => break,
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => {
                    self.draining = true;
                    return self.decoder.send_eof().map_err(|e| {
                        CodecError::DecodePacket(format!("send_eof: {}", e)).into()
                    });
                }
                Err(e) => {
                    return Err(CodecError::DecodePacket(format!("read packet: {}", e)).into())
                }
            }
        }

        match self.decoder.send_packet(&packet) {
            Ok(()) => Ok(()),
            // A damaged frame in an MP3 or AAC stream is skipped.
            Err(ffmpeg::Error::InvalidData) => {
                tracing::debug!(stream_index = self.stream_index, "Skipping invalid packet");
                Ok(())
            }
            Err(e) => Err(CodecError::DecodePacket(format!("send_packet: {}", e)).into()),
        }
    }
}
