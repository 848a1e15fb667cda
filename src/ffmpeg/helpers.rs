//! Small FFmpeg helpers that need raw pointer access.
//!
//! Everything `unsafe` the codec needs lives here.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::{Sample, Type};

/// Channel layout for a channel count when the stream does not carry one.
pub fn layout_for_channels(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        3 => ChannelLayout::_2POINT1,
        4 => ChannelLayout::QUAD,
        5 => ChannelLayout::_5POINT0,
        6 => ChannelLayout::_5POINT1,
        8 => ChannelLayout::_7POINT1,
        _ => ChannelLayout::STEREO,
    }
}

/// The frame's channel layout, or the default layout for its channel
/// count when the decoder left it unset.
pub fn frame_layout(frame: &ffmpeg::util::frame::Audio) -> ChannelLayout {
    let layout = frame.channel_layout();
    if layout.bits() == 0 {
        layout_for_channels(frame.channels() as u16)
    } else {
        layout
    }
}

/// Codec parameters of an opened encoder, for the output stream.
pub fn encoder_codec_parameters(
    encoder: &ffmpeg::codec::encoder::Audio,
) -> ffmpeg::codec::Parameters {
    use std::ops::Deref;
    use std::rc::Rc;
    let ctx: &ffmpeg::codec::Context = encoder.deref();
    // SAFETY: `ctx` is a live, opened encoder context. The freshly allocated
    // parameters are owned by the returned wrapper.
    unsafe {
        let params = ffmpeg::ffi::avcodec_parameters_alloc();
        ffmpeg::ffi::avcodec_parameters_from_context(params, ctx.as_ptr());
        ffmpeg::codec::Parameters::wrap(params, None::<Rc<dyn std::any::Any>>)
    }
}

const F32_PLANAR: Sample = Sample::F32(Type::Planar);

/// Pointer to the first sample of `channel` in a planar f32 frame.
///
/// `Audio::plane` cannot be used here: it counts planes through
/// `linesize[i]`, and FFmpeg only fills `linesize[0]` for planar audio.
fn f32_plane_ptr(frame: &ffmpeg::util::frame::Audio, channel: usize) -> Option<*mut f32> {
    if frame.format() != F32_PLANAR || channel >= frame.channels() as usize {
        return None;
    }
    // SAFETY: `extended_data` holds one pointer per channel for planar
    // audio; the channel index was checked against the channel count.
    let plane = unsafe {
        let data = (*frame.as_ptr()).extended_data;
        if data.is_null() {
            return None;
        }
        *data.add(channel) as *mut f32
    };
    if plane.is_null() || plane.align_offset(std::mem::align_of::<f32>()) != 0 {
        return None;
    }
    Some(plane)
}

/// Samples of one channel of a planar f32 frame
pub fn f32_plane(frame: &ffmpeg::util::frame::Audio, channel: usize) -> Option<&[f32]> {
    let plane = f32_plane_ptr(frame, channel)?;
    // SAFETY: every plane of an allocated frame holds at least `samples()`
    // values, and the slice lives no longer than the borrow of `frame`.
    Some(unsafe { std::slice::from_raw_parts(plane, frame.samples()) })
}

/// Mutable samples of one channel of a planar f32 frame
pub fn f32_plane_mut(frame: &mut ffmpeg::util::frame::Audio, channel: usize) -> Option<&mut [f32]> {
    let plane = f32_plane_ptr(frame, channel)?;
    // SAFETY: as above; the exclusive borrow of `frame` rules out aliasing.
    Some(unsafe { std::slice::from_raw_parts_mut(plane, frame.samples()) })
}
