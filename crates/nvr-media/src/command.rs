//! FFmpeg command builder for capture and recording pipes.

use std::path::PathBuf;

use crate::error::{MediaError, MediaResult};

/// Builder for FFmpeg commands.
///
/// Inputs and outputs are plain strings so the same builder covers device
/// paths, stream URLs and `pipe:` endpoints.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input (device, URL or `pipe:0`)
    input: String,
    /// Output (file path or `pipe:1`)
    output: String,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Set the demuxer/device format of the input.
    pub fn input_format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Declare a raw RGB24 input of the given geometry (for `pipe:0` inputs).
    pub fn raw_rgb_input(self, width: u32, height: u32, fps: u32) -> Self {
        self.input_format("rawvideo")
            .input_arg("-pix_fmt")
            .input_arg("rgb24")
            .input_arg("-video_size")
            .input_arg(format!("{}x{}", width, height))
            .input_arg("-framerate")
            .input_arg(fps.to_string())
    }

    /// Emit raw RGB24 frames scaled to the given geometry.
    pub fn raw_rgb_output(self, width: u32, height: u32) -> Self {
        self.output_arg("-an")
            .output_arg("-vf")
            .output_arg(format!("scale={}:{}", width, height))
            .output_arg("-f")
            .output_arg("rawvideo")
            .output_arg("-pix_fmt")
            .output_arg("rgb24")
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.clone());

        args.extend(self.output_args.clone());

        args.push(self.output.clone());

        args
    }

    /// Same as [`build_args`](Self::build_args) but keeps stdin open for
    /// `pipe:0` inputs.
    pub fn build_args_with_stdin(&self) -> Vec<String> {
        self.build_args()
            .into_iter()
            .filter(|arg| arg != "-nostdin")
            .collect()
    }
}

/// Locate the ffmpeg binary.
pub fn find_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
