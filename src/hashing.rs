//! Content digests for local files.
//!
//! Files at or below [`HashConfig::full_hash_ceiling`] are streamed through
//! the digest in full. Larger files are sampled: a leading region, a run of
//! evenly spaced body samples, then a trailing region. Every read feeds one
//! digest context in ascending offset order, so the result depends only on
//! the file bytes, the file size and the [`HashConfig`].
//!
//! Bytes that fall between samples of an oversized file do not contribute
//! to its digest.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::error::ErrorCategory;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Errors raised while hashing a file.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file could not be opened, sized or read
    #[error("Unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The sampling parameters cannot produce non-overlapping regions
    #[error("Invalid hash configuration: {0}")]
    InvalidConfig(String),
}

impl HashError {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            HashError::Io { .. } => ErrorCategory::Io,
            HashError::InvalidConfig(_) => ErrorCategory::Configuration,
        }
    }
}

/// Digest algorithm used for file registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum HashAlgorithm {
    /// 128-bit MD5, the service's default
    #[default]
    Md5,
    /// SHA-256
    Sha256,
}

impl HashAlgorithm {
    pub fn id(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

/// Sampling thresholds. All sizes are in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct HashConfig {
    /// Read size for every region
    pub block_size: u64,
    /// Largest file that is hashed in full
    pub full_hash_ceiling: u64,
    /// Length of the leading and trailing regions of a sampled file
    pub end_sample_size: u64,
    /// Length of each body sample
    pub body_sample_size: u64,
    /// Share of the body covered by samples, clamped to `(0, 1]`
    pub body_sample_fraction: f64,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * KIB,
            full_hash_ceiling: 10 * GIB,
            end_sample_size: 2 * GIB,
            body_sample_size: 500 * MIB,
            body_sample_fraction: 0.2,
        }
    }
}

impl HashConfig {
    /// Check that every oversized file leaves room for the head, tail and
    /// a body sample without overlap.
    pub fn validate(&self) -> Result<(), HashError> {
        if self.block_size == 0 || self.end_sample_size == 0 || self.body_sample_size == 0 {
            return Err(HashError::InvalidConfig(
                "block and sample sizes must be non-zero".to_string(),
            ));
        }

        let reserved = self
            .end_sample_size
            .checked_add(self.body_sample_size)
            .and_then(|n| n.checked_mul(2))
            .ok_or_else(|| HashError::InvalidConfig("sample sizes overflow".to_string()))?;
        if self.full_hash_ceiling < reserved {
            return Err(HashError::InvalidConfig(format!(
                "full hash ceiling {} is below the {} bytes reserved for sampling",
                self.full_hash_ceiling, reserved
            )));
        }

        if !self.body_sample_fraction.is_finite() {
            return Err(HashError::InvalidConfig(
                "body sample fraction must be a finite number".to_string(),
            ));
        }

        Ok(())
    }

    fn fraction(&self) -> f64 {
        if self.body_sample_fraction <= 0.0 {
            f64::MIN_POSITIVE
        } else {
            self.body_sample_fraction.min(1.0)
        }
    }

    /// Byte ranges `(offset, len)` read for a file of `size` bytes, in the
    /// order they are fed to the digest.
    pub fn regions(&self, size: u64) -> Vec<(u64, u64)> {
        if size <= self.full_hash_ceiling {
            return vec![(0, size)];
        }

        let end = self.end_sample_size;
        let sample = self.body_sample_size;
        let body = size.saturating_sub(2 * end + 2 * sample);

        let wanted = (body as f64 * self.fraction() / sample as f64).floor() as u64;
        let samples = wanted.max(1);
        let stride = (body / samples).max(sample);

        let mut regions = Vec::with_capacity(samples as usize + 2);
        regions.push((0, end));
        for i in 0..samples {
            regions.push((end + sample + i * stride, sample));
        }
        regions.push((size - end, end));
        regions
    }
}

/// Outcome of hashing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashResult {
    /// Lowercase hex digest
    pub digest_hex: String,
    pub algorithm_id: String,
    /// Bytes actually fed to the digest
    pub bytes_sampled: u64,
}

impl HashResult {
    /// Sentinel used when the caller deliberately skipped hashing.
    pub fn skipped() -> Self {
        Self {
            digest_hex: "0".to_string(),
            algorithm_id: String::new(),
            bytes_sampled: 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.digest_hex == "0" && self.bytes_sampled == 0
    }
}

enum Context {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl Context {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Context::Md5(md5::Context::new()),
            HashAlgorithm::Sha256 => Context::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Context::Md5(ctx) => ctx.consume(data),
            Context::Sha256(ctx) => ctx.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Context::Md5(ctx) => format!("{:x}", ctx.compute()),
            Context::Sha256(ctx) => hex::encode(ctx.finalize()),
        }
    }
}

/// Hash `path` with `algorithm` under the thresholds in `config`.
pub fn hash_file(
    path: &Path,
    algorithm: HashAlgorithm,
    config: &HashConfig,
) -> Result<HashResult, HashError> {
    config.validate()?;

    let io_err = |source: io::Error| HashError::Io {
        path: path.to_path_buf(),
        source,
    };

    let started = Instant::now();
    let mut file = File::open(path).map_err(io_err)?;
    let size = file.metadata().map_err(io_err)?.len();
    let regions = config.regions(size);

    let mut ctx = Context::new(algorithm);
    let mut buf = vec![0u8; config.block_size as usize];
    let mut bytes_sampled = 0;

    for (offset, len) in &regions {
        file.seek(SeekFrom::Start(*offset)).map_err(io_err)?;
        bytes_sampled += feed(&mut file, &mut ctx, *len, &mut buf).map_err(io_err)?;
    }

    let result = HashResult {
        digest_hex: ctx.finish(),
        algorithm_id: algorithm.id().to_string(),
        bytes_sampled,
    };

    tracing::debug!(
        path = %path.display(),
        size,
        regions = regions.len(),
        bytes_sampled,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "hashed file"
    );

    Ok(result)
}

/// Read `len` bytes from the current position into the digest, one block
/// at a time. Stops early at end of file.
fn feed<R: Read>(reader: &mut R, ctx: &mut Context, len: u64, buf: &mut [u8]) -> io::Result<u64> {
    let mut remaining = len;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = reader.read(&mut buf[..want])?;
        if read == 0 {
            break;
        }
        ctx.update(&buf[..read]);
        remaining -= read as u64;
    }
    Ok(len - remaining)
}
