// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Proteus-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Proteus and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! External rasterizer capability.
//!
//! EPS input has no in-process encoder or reliable decoder, so the primary conversion
//! path shells out to Ghostscript. The capability is a trait so the pipeline can be
//! exercised in tests without the binary installed; the real implementation probes
//! availability via `gs --version` and bounds every invocation with a wall-clock
//! timeout so a hung tool cannot starve the worker pool.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;

pub const DEFAULT_BINARY: &str = "gs";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterTarget {
    Png,
    Jpeg,
}

impl RasterTarget {
    fn device(self) -> &'static str {
        match self {
            Self::Png => "png16m",
            Self::Jpeg => "jpeg",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

#[derive(Debug)]
pub enum ExternalToolError {
    Unavailable {
        binary: String,
        source: io::Error,
    },
    Failed {
        binary: String,
        status: Option<i32>,
        stderr: String,
    },
    NoOutput {
        path: PathBuf,
    },
    TimedOut {
        binary: String,
        timeout: Duration,
    },
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

impl fmt::Display for ExternalToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { binary, source } => {
                write!(f, "rasterizer {binary:?} is unavailable: {source}")
            }
            Self::Failed {
                binary,
                status,
                stderr,
            } => match status {
                Some(code) => write!(f, "{binary} exited with status {code}: {stderr}"),
                None => write!(f, "{binary} was terminated by a signal: {stderr}"),
            },
            Self::NoOutput { path } => {
                write!(f, "rasterizer did not produce an output file at {path:?}")
            }
            Self::TimedOut { binary, timeout } => {
                write!(f, "{binary} did not finish within {timeout:?}")
            }
            Self::Io { path, source } => write!(f, "io error at {path:?}: {source}"),
        }
    }
}

impl std::error::Error for ExternalToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Failed { .. } | Self::NoOutput { .. } | Self::TimedOut { .. } => None,
        }
    }
}

pub trait Rasterizer: Send + Sync {
    /// Availability probe; returns the tool's version string.
    fn probe(&self) -> Result<String, ExternalToolError>;

    /// Rasterizes EPS bytes into the intermediate target at the given DPI.
    fn rasterize(
        &self,
        input: &[u8],
        target: RasterTarget,
        dpi: u32,
    ) -> Result<Vec<u8>, ExternalToolError>;
}

#[derive(Debug, Clone)]
pub struct Ghostscript {
    binary: String,
    timeout: Duration,
}

impl Ghostscript {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Binary name from `GS_BINARY`, falling back to `gs` on the PATH.
    pub fn from_env() -> Self {
        let binary = env::var("GS_BINARY").unwrap_or_else(|_| DEFAULT_BINARY.to_owned());
        Self::new(binary, DEFAULT_TIMEOUT)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<ExitStatus, ExternalToolError> {
        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if start.elapsed() >= self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(ExternalToolError::TimedOut {
                            binary: self.binary.clone(),
                            timeout: self.timeout,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(source) => {
                    return Err(ExternalToolError::Io {
                        path: PathBuf::from(&self.binary),
                        source,
                    });
                }
            }
        }
    }
}

impl Rasterizer for Ghostscript {
    fn probe(&self) -> Result<String, ExternalToolError> {
        let mut child = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExternalToolError::Unavailable {
                binary: self.binary.clone(),
                source,
            })?;

        let status = self.wait_with_timeout(&mut child)?;

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            let _ = pipe.read_to_string(&mut stdout);
        }
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }

        if !status.success() {
            return Err(ExternalToolError::Failed {
                binary: self.binary.clone(),
                status: status.code(),
                stderr: stderr.trim().to_owned(),
            });
        }

        let version = stdout.trim().to_owned();
        if version.is_empty() {
            return Err(ExternalToolError::Failed {
                binary: self.binary.clone(),
                status: status.code(),
                stderr: "no version reported".to_owned(),
            });
        }
        match parse_version(&version) {
            Some((major, minor)) => debug!(%version, major, minor, "rasterizer available"),
            None => debug!(%version, "rasterizer reported an unparseable version"),
        }
        Ok(version)
    }

    fn rasterize(
        &self,
        input: &[u8],
        target: RasterTarget,
        dpi: u32,
    ) -> Result<Vec<u8>, ExternalToolError> {
        let scratch = ScratchDir::create().map_err(|source| ExternalToolError::Io {
            path: env::temp_dir(),
            source,
        })?;
        let input_path = scratch.path().join("input.eps");
        fs::write(&input_path, input).map_err(|source| ExternalToolError::Io {
            path: input_path.clone(),
            source,
        })?;
        let output_path = scratch
            .path()
            .join(format!("raster.{}", target.extension()));

        let mut command = Command::new(&self.binary);
        command.args(raster_args(target, dpi, &output_path, &input_path));
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExternalToolError::Unavailable {
                binary: self.binary.clone(),
                source,
            })?;

        let status = self.wait_with_timeout(&mut child)?;

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }

        if !status.success() {
            return Err(ExternalToolError::Failed {
                binary: self.binary.clone(),
                status: status.code(),
                stderr: stderr.trim().to_owned(),
            });
        }

        match fs::read(&output_path) {
            Ok(bytes) => Ok(bytes),
            Err(_) => Err(ExternalToolError::NoOutput { path: output_path }),
        }
    }
}

/// Argument list for one rasterization run. `-dSAFER` confines file access; the JPEG
/// device gets an explicit high-quality setting.
fn raster_args(target: RasterTarget, dpi: u32, output_path: &Path, input_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-q".to_owned(),
        "-dNOPAUSE".to_owned(),
        "-dBATCH".to_owned(),
        "-dSAFER".to_owned(),
        format!("-sDEVICE={}", target.device()),
        format!("-r{dpi}"),
    ];
    if target == RasterTarget::Jpeg {
        args.push("-dJPEGQ=95".to_owned());
    }
    args.push(format!("-sOutputFile={}", output_path.display()));
    args.push(input_path.display().to_string());
    args
}

fn parse_version(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next().and_then(|part| part.trim().parse().ok()).unwrap_or(0);
    Some((major, minor))
}

struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    fn create() -> io::Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = env::temp_dir().join(format!("proteus-gs-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
