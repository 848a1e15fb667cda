//! Test doubles: a WAV-only codec and a muxer that records its plans.
//!
//! `WavCodec` reads and writes 16-bit PCM WAV whatever the file extension
//! or requested container, so pipeline tests run without FFmpeg.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::audio::{AudioBuffer, AudioCodec, ExportFormat};
use crate::error::{CodecError, LanguageError, PublishError, Result};
use crate::language::Language;
use crate::mux::{MuxPlan, VideoMuxer};
use crate::pipeline::Interaction;
use crate::tracks::Track;

pub const TEST_SAMPLE_RATE: u32 = 8000;

#[derive(Debug, Clone, PartialEq)]
pub struct ExportCall {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub bitrate: u64,
}

#[derive(Debug, Default)]
pub struct WavCodec {
    exports: RefCell<Vec<ExportCall>>,
}

impl WavCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exports(&self) -> Vec<ExportCall> {
        self.exports.borrow().clone()
    }
}

impl AudioCodec for WavCodec {
    fn load(&self, path: &Path) -> Result<AudioBuffer> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| CodecError::OpenInput(format!("{}: {}", path.display(), e)))?;
        let spec = reader.spec();
        let channels = spec.channels as usize;
        let mut planes = vec![Vec::new(); channels];
        for (i, sample) in reader.samples::<i16>().enumerate() {
            let sample = sample.map_err(|e| CodecError::ReadFrame(e.to_string()))?;
            planes[i % channels].push(sample as f32 / i16::MAX as f32);
        }
        Ok(AudioBuffer::from_planes(spec.sample_rate, planes))
    }

    /// No resampling here: asking for another rate is an error.
    fn load_at(&self, path: &Path, sample_rate: u32) -> Result<AudioBuffer> {
        let audio = self.load(path)?;
        if audio.sample_rate() != sample_rate {
            return Err(CodecError::ResamplerCreate(format!(
                "{} is {} Hz, {} Hz requested",
                path.display(),
                audio.sample_rate(),
                sample_rate
            ))
            .into());
        }
        Ok(audio)
    }

    fn export(
        &self,
        audio: &AudioBuffer,
        path: &Path,
        format: ExportFormat,
        bitrate: u64,
    ) -> Result<()> {
        self.exports.borrow_mut().push(ExportCall {
            path: path.to_path_buf(),
            format,
            bitrate,
        });
        write_buffer(path, audio);
        Ok(())
    }
}

/// Write `audio` as a 16-bit WAV file
pub fn write_buffer(path: &Path, audio: &AudioBuffer) {
    let spec = hound::WavSpec {
        channels: audio.channel_count(),
        sample_rate: audio.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..audio.frames() {
        for plane in audio.planes() {
            writer
                .write_sample((plane[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
    }
    writer.finalize().unwrap();
}

/// Write a quiet constant tone with `channels` channels lasting `secs`
pub fn write_tone(path: &Path, channels: u16, secs: f64) {
    write_tone_at(path, TEST_SAMPLE_RATE, channels, secs);
}

pub fn write_tone_at(path: &Path, sample_rate: u32, channels: u16, secs: f64) {
    let frames = (sample_rate as f64 * secs) as usize;
    let audio =
        AudioBuffer::from_planes(sample_rate, vec![vec![0.1f32; frames]; channels as usize]);
    write_buffer(path, &audio);
}

pub fn english(path: &Path) -> Track {
    track("eng", "English", "en", path)
}

pub fn french(path: &Path) -> Track {
    track("fra", "French", "fr", path)
}

fn track(code: &str, name: &str, token: &str, path: &Path) -> Track {
    let language = Language {
        code: code.to_string(),
        display_name: name.to_string(),
    };
    Track::new(language, token, path.to_path_buf())
}

/// Muxer that records plans instead of running ffmpeg
#[derive(Debug, Default)]
pub struct RecordingMuxer {
    plans: RefCell<Vec<MuxPlan>>,
    missing_inputs: RefCell<usize>,
    fail: bool,
}

impl RecordingMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn plans(&self) -> Vec<MuxPlan> {
        self.plans.borrow().clone()
    }

    /// Track files that did not exist when `mux` was called
    pub fn missing_inputs(&self) -> usize {
        *self.missing_inputs.borrow()
    }
}

impl VideoMuxer for RecordingMuxer {
    fn mux(&self, plan: &MuxPlan) -> Result<()> {
        let missing = plan.tracks.tracks.iter().filter(|t| !t.path.exists()).count();
        *self.missing_inputs.borrow_mut() += missing;
        self.plans.borrow_mut().push(plan.clone());
        if self.fail {
            return Err(PublishError::Mux("ffmpeg exited with status 1".to_string()));
        }
        Ok(())
    }
}

/// Aborts on the first invalid file and counts the questions
#[derive(Debug, Default)]
pub struct AlwaysAbort {
    pub asked: usize,
}

impl Interaction for AlwaysAbort {
    fn skip_invalid_language(&mut self, _: &Path, _: &str, _: &LanguageError) -> bool {
        self.asked += 1;
        false
    }
}
