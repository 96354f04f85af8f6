//! The codec seam between the in-memory `AudioBuffer` and files on disk.
//!
//! `FfmpegCodec` is the production implementation: it decodes through
//! `rodio` and hands compression to an external `ffmpeg` process, staging
//! PCM as WAV in between. Tests substitute their own `AudioCodec`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use rodio::{Decoder, Source};
use thiserror::Error;

use super::buffer::AudioBuffer;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("{path} decoded to zero-length audio")]
    EmptyDecode { path: PathBuf },

    #[error("wav staging failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("could not run ffmpeg ({reason}); is it installed?")]
    TranscoderMissing { reason: String },

    #[error("ffmpeg failed on {path}: {stderr}")]
    Transcoder { path: PathBuf, stderr: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decode/encode seam. The composer and extractor only ever talk to this
/// trait, so tests can run without ffmpeg or real media files.
pub trait AudioCodec {
    fn decode(&self, path: &Path) -> Result<AudioBuffer, AudioError>;

    /// Write `buffer` to `path` in the format implied by its extension,
    /// at `bitrate_kbps` for lossy targets. Must not leave a partial file
    /// behind on failure.
    fn encode(&self, buffer: &AudioBuffer, path: &Path, bitrate_kbps: u32)
    -> Result<(), AudioError>;

    /// Best-effort in-place repair of a file that fails to decode.
    fn repair(&self, path: &Path) -> Result<(), AudioError> {
        Err(AudioError::Transcoder {
            path: path.to_path_buf(),
            stderr: "repair not supported by this codec".to_string(),
        })
    }
}

/// Production codec: `rodio` decode, `ffmpeg` encode/repair.
#[derive(Debug, Default)]
pub struct FfmpegCodec;

impl AudioCodec for FfmpegCodec {
    fn decode(&self, path: &Path) -> Result<AudioBuffer, AudioError> {
        let file = File::open(path).map_err(|source| AudioError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.collect();
        if samples.is_empty() {
            return Err(AudioError::EmptyDecode {
                path: path.to_path_buf(),
            });
        }
        Ok(AudioBuffer::new(samples, channels, sample_rate))
    }

    fn encode(
        &self,
        buffer: &AudioBuffer,
        path: &Path,
        bitrate_kbps: u32,
    ) -> Result<(), AudioError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        if ext == "wav" {
            let tmp = sibling(path, "part");
            if let Err(e) = write_wav(buffer, &tmp) {
                let _ = std::fs::remove_file(&tmp);
                return Err(e);
            }
            return std::fs::rename(&tmp, path).map_err(|source| AudioError::Io {
                path: path.to_path_buf(),
                source,
            });
        }

        // Lossy target: stage as WAV, compress with ffmpeg, then move the
        // finished file into place so a failed run leaves nothing behind.
        let staging = sibling(path, "staging.wav");
        let tmp = sibling(path, "part");
        let result = (|| {
            write_wav(buffer, &staging)?;
            run_ffmpeg(
                path,
                &[
                    "-y",
                    "-v",
                    "error",
                    "-i",
                    &staging.to_string_lossy(),
                    "-b:a",
                    &format!("{bitrate_kbps}k"),
                    &tmp.to_string_lossy(),
                ],
            )?;
            std::fs::rename(&tmp, path).map_err(|source| AudioError::Io {
                path: path.to_path_buf(),
                source,
            })
        })();
        let _ = std::fs::remove_file(&staging);
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }

    fn repair(&self, path: &Path) -> Result<(), AudioError> {
        let tmp = sibling(path, "repair");
        let result = run_ffmpeg(
            path,
            &[
                "-y",
                "-v",
                "error",
                "-i",
                &path.to_string_lossy(),
                "-vn",
                &tmp.to_string_lossy(),
            ],
        )
        .and_then(|()| {
            std::fs::rename(&tmp, path).map_err(|source| AudioError::Io {
                path: path.to_path_buf(),
                source,
            })
        });
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }
}

/// `out.mp3` -> `out.<marker>.mp3`, next to the target file.
fn sibling(path: &Path, marker: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("tmp");
    path.with_file_name(format!("{stem}.{marker}.{ext}"))
}

fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in buffer.samples() {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn run_ffmpeg(subject: &Path, args: &[&str]) -> Result<(), AudioError> {
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .map_err(|e| AudioError::TranscoderMissing {
            reason: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(AudioError::Transcoder {
            path: subject.to_path_buf(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
