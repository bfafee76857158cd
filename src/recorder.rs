//! Turning the local manifest into a playable file.
//!
//! Recording is delegated to an external player behind the [`Recorder`]
//! trait. [`VlcRecorder`] drives VLC headless with a file sout chain; a run
//! only counts as successful when the process exits with status 0 and the
//! output file exists and is not empty.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::SlidegrabError;

/// Records the media described by a manifest into a single file.
pub trait Recorder {
    /// Record `manifest` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::ExternalProcess`] when the recording could
    /// not be produced.
    fn record(&self, manifest: &Path, output: &Path) -> Result<(), SlidegrabError>;
}

/// Headless VLC.
#[derive(Debug, Clone)]
pub struct VlcRecorder {
    program: PathBuf,
}

impl Default for VlcRecorder {
    fn default() -> Self {
        Self::new("vlc")
    }
}

impl VlcRecorder {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The VLC invocation for `manifest` and `output`, run from the
    /// manifest's directory with both paths relative to it when possible.
    #[must_use]
    pub fn build_command(&self, manifest: &Path, output: &Path) -> Command {
        let working_dir = manifest
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let relative = |path: &Path| -> PathBuf {
            path.strip_prefix(working_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.to_path_buf())
        };

        let mut sout = String::from("#file{dst=");
        sout.push_str(&relative(output).to_string_lossy());
        sout.push('}');

        let mut command = Command::new(&self.program);
        command
            .current_dir(working_dir)
            .args(["--intf", "dummy", "--no-video", "--no-audio"])
            .arg(relative(manifest))
            .arg("--sout")
            .arg(sout)
            .arg("vlc://quit");
        command
    }
}

impl Recorder for VlcRecorder {
    fn record(&self, manifest: &Path, output: &Path) -> Result<(), SlidegrabError> {
        let program = self.program.display().to_string();
        let failure = |reason: String| SlidegrabError::ExternalProcess {
            program: program.clone(),
            reason,
        };

        let result = self
            .build_command(manifest, output)
            .output()
            .map_err(|error| failure(format!("cannot start: {error}")))?;

        let stdout = String::from_utf8_lossy(&result.stdout);
        let stderr = String::from_utf8_lossy(&result.stderr);
        if !stdout.trim().is_empty() {
            log::debug!("{program} stdout: {}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            log::debug!("{program} stderr: {}", stderr.trim());
        }

        if !result.status.success() {
            let last_line = stderr.lines().last().unwrap_or_default().trim();
            return Err(failure(format!("{} {last_line}", result.status)));
        }

        let size = fs::metadata(output).map(|metadata| metadata.len()).unwrap_or(0);
        if size == 0 {
            return Err(failure(format!(
                "exited successfully but {} is missing or empty",
                output.display()
            )));
        }

        log::debug!("Recorded {} ({size} bytes)", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_runs_in_the_label_directory() {
        let recorder = VlcRecorder::default();
        let command = recorder.build_command(
            Path::new("data/cs101/GenerateVideoSource_adjust.mpd"),
            Path::new("data/cs101/cs101.mp4"),
        );

        assert_eq!(command.get_program(), "vlc");
        assert_eq!(command.get_current_dir(), Some(Path::new("data/cs101")));
        let args: Vec<_> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "--intf",
                "dummy",
                "--no-video",
                "--no-audio",
                "GenerateVideoSource_adjust.mpd",
                "--sout",
                "#file{dst=cs101.mp4}",
                "vlc://quit",
            ]
        );
    }

    #[test]
    fn bare_file_names_run_in_current_directory() {
        let command = VlcRecorder::new("/opt/vlc/vlc").build_command(
            Path::new("GenerateVideoSource_adjust.mpd"),
            Path::new("/srv/out/cs101.mp4"),
        );
        assert_eq!(command.get_current_dir(), Some(Path::new(".")));
        assert!(
            command
                .get_args()
                .any(|arg| arg == "#file{dst=/srv/out/cs101.mp4}")
        );
    }
}
