use std::process::{Command, Stdio};

use thiserror::Error;

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::encoded_image::EncodedImage;

#[derive(Error, Debug, PartialEq)]
pub enum FrameSourceError {
    #[error("capture command is empty")]
    EmptyCommand,
}

/// Grabs a frame by running an external capture program and reading the
/// encoded image from its stdout, e.g. `fswebcam --no-banner -`.
pub struct CommandFrameSource {
    program: String,
    args: Vec<String>,
}

impl CommandFrameSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Result<Self, FrameSourceError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(FrameSourceError::EmptyCommand);
        }
        Ok(Self { program, args })
    }

    /// Splits a command line on whitespace. No shell quoting is applied.
    pub fn parse(command_line: &str) -> Result<Self, FrameSourceError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(FrameSourceError::EmptyCommand)?;
        Self::new(program, parts.collect())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl FrameSource for CommandFrameSource {
    fn capture_frame(&mut self) -> Option<EncodedImage> {
        let output = match Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Failed to run capture command {}: {e}", self.program);
                return None;
            }
        };

        if !output.status.success() {
            log::warn!(
                "Capture command {} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return None;
        }

        match EncodedImage::from_bytes(output.stdout) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("Capture command {} produced no usable frame: {e}", self.program);
                None
            }
        }
    }
}
