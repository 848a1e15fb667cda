//! ffmpeg command options builder.
//!
//! Builds the argument list that maps the input video plus one input per
//! prepared track into the output file. The video's own audio becomes
//! audio stream 0 tagged with the default language; prepared track `N`
//! becomes audio stream `N`. Video is stream-copied.

use super::MuxPlan;

/// Builder for ffmpeg command-line arguments.
pub struct FfmpegArgsBuilder<'a> {
    plan: &'a MuxPlan,
}

impl<'a> FfmpegArgsBuilder<'a> {
    pub fn new(plan: &'a MuxPlan) -> Self {
        Self { plan }
    }

    /// Build the complete argument list, without the program name.
    pub fn build(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        self.add_inputs(&mut args);
        self.add_maps(&mut args);
        self.add_metadata(&mut args);

        args.push("-c:v".to_string());
        args.push("copy".to_string());
        args.push(self.plan.output_video.to_string_lossy().to_string());
        args
    }

    fn add_inputs(&self, args: &mut Vec<String>) {
        args.push("-i".to_string());
        args.push(self.plan.input_video.to_string_lossy().to_string());
        for track in &self.plan.tracks.tracks {
            args.push("-i".to_string());
            args.push(track.path.to_string_lossy().to_string());
        }
    }

    fn add_maps(&self, args: &mut Vec<String>) {
        args.push("-map".to_string());
        args.push("0".to_string());
        for index in 1..=self.plan.tracks.len() {
            args.push("-map".to_string());
            args.push(index.to_string());
        }
    }

    fn add_metadata(&self, args: &mut Vec<String>) {
        let default = &self.plan.tracks.default_language;
        push_metadata(args, 0, "language", default);
        push_metadata(args, 0, "title", default);
        push_metadata(args, 0, "handler_name", default);

        for (i, track) in self.plan.tracks.tracks.iter().enumerate() {
            let stream = i + 1;
            push_metadata(args, stream, "language", &track.code);
            push_metadata(args, stream, "handler_name", &track.display_name);
            push_metadata(args, stream, "title", &track.display_name);
        }
    }
}

fn push_metadata(args: &mut Vec<String>, stream: usize, key: &str, value: &str) {
    args.push(format!("-metadata:s:a:{}", stream));
    args.push(format!("{}={}", key, value));
}
