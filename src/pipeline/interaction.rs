//! User decisions the pipeline cannot make on its own

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::error::LanguageError;

/// Asked when a track file name has no recognizable language
pub trait Interaction {
    /// `true` skips the file and continues, `false` aborts the run
    fn skip_invalid_language(&mut self, file: &Path, token: &str, reason: &LanguageError) -> bool;
}

/// Asks on the terminal
pub struct StdinPrompt;

impl Interaction for StdinPrompt {
    fn skip_invalid_language(&mut self, file: &Path, token: &str, reason: &LanguageError) -> bool {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let _ = writeln!(
            out,
            "\nWARNING: Language code '{}' is not valid for file: {} ({})",
            token,
            file.display(),
            reason
        );
        let _ = write!(out, "Continue anyway and skip this file? (y/n): ");
        let _ = out.flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("y")
    }
}

/// Skips every invalid file without asking
pub struct AutoSkip;

impl Interaction for AutoSkip {
    fn skip_invalid_language(&mut self, file: &Path, token: &str, reason: &LanguageError) -> bool {
        tracing::warn!(
            "Skipping {}: language code '{}' is not valid ({})",
            file.display(),
            token,
            reason
        );
        true
    }
}
