//! Native binary storage format for regression forest predictors.
//!
//! The format is a 28-byte header followed by the payload.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     Signature ("RFORESTR")
//! 8       4     Written version (u32 LE)
//! 12      4     Minimum readable version (u32 LE)
//! 16      4     Minimum back-compatible version (u32 LE)
//! 20      4     Payload size in bytes (u32 LE)
//! 24      4     CRC32 checksum of payload (u32 LE)
//! ```
//!
//! The payload holds the Postcard-encoded [`ForestPayload`], one flag byte
//! (always `1`) and the quantile sample count as an `i32` LE.
//!
//! # Example
//!
//! ```
//! use rforest::data::{RoleMappedData, RoleMapping};
//! use rforest::inference::ForestRegressionPredictor;
//! use rforest::model::{ForestRegressionConfig, ForestRegressionTrainer};
//!
//! let data = rforest::testing::synthetic_regression_dataset(100, 2, 3, 0.1);
//! let config = ForestRegressionConfig::builder().n_trees(3).build().unwrap();
//! let predictor =
//!     ForestRegressionTrainer::fit(config, &RoleMappedData::new(&data, &RoleMapping::default())).unwrap();
//!
//! let bytes = predictor.to_bytes().unwrap();
//! let loaded = ForestRegressionPredictor::from_bytes(&bytes).unwrap();
//! assert_eq!(loaded, predictor);
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::inference::ForestRegressionPredictor;
use crate::model::ConfigError;

use super::payload::ForestPayload;

// ============================================================================
// Constants
// ============================================================================

/// Signature identifying a regression forest model.
pub const SIGNATURE: &[u8; 8] = b"RFORESTR";

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 28;

/// First released format.
pub const VER_INITIAL: u32 = 0x0001_0001;

/// Leaf samples carry optional per-label weights.
pub const VER_LEAF_WEIGHTS: u32 = 0x0001_0002;

/// Flag byte written between the ensemble and the sample count.
const QUANTILE_FLAG: u8 = 1;

// ============================================================================
// Versioning
// ============================================================================

/// Version triple stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version of the writer.
    pub written: u32,
    /// Oldest reader able to load the file.
    pub min_readable: u32,
    /// Oldest file version this writer's readers still accept.
    pub min_back_compat: u32,
}

impl VersionInfo {
    /// Version of this build.
    pub const CURRENT: Self = Self {
        written: VER_LEAF_WEIGHTS,
        min_readable: VER_LEAF_WEIGHTS,
        min_back_compat: VER_LEAF_WEIGHTS,
    };

    /// Check that a file written with `self` can be loaded by `reader`.
    pub fn check_readable_by(&self, reader: &VersionInfo) -> Result<(), DeserializeError> {
        if self.min_readable > reader.written {
            return Err(DeserializeError::VersionTooNew {
                min_readable: self.min_readable,
                reader: reader.written,
            });
        }
        if self.written < reader.min_back_compat {
            return Err(DeserializeError::VersionTooOld {
                written: self.written,
                min_back_compat: reader.min_back_compat,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Format Header
// ============================================================================

/// 28-byte header for the native storage format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version: VersionInfo,
    /// Size of the payload in bytes.
    pub payload_size: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
}

impl FormatHeader {
    /// Create a header with the current version.
    pub fn new() -> Self {
        Self {
            version: VersionInfo::CURRENT,
            payload_size: 0,
            checksum: 0,
        }
    }

    /// Serialize header to 28 bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(SIGNATURE);
        buf[8..12].copy_from_slice(&self.version.written.to_le_bytes());
        buf[12..16].copy_from_slice(&self.version.min_readable.to_le_bytes());
        buf[16..20].copy_from_slice(&self.version.min_back_compat.to_le_bytes());
        buf[20..24].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[24..28].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse header from 28 bytes.
    ///
    /// Only the signature is checked here; version gating is left to the
    /// reader so it can compare against its own [`VersionInfo`].
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..8] != SIGNATURE {
            return Err(DeserializeError::NotAModel);
        }

        let word = |offset: usize| u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
        Ok(Self {
            version: VersionInfo {
                written: word(8),
                min_readable: word(12),
                min_back_compat: word(16),
            },
            payload_size: word(20),
            checksum: word(24),
        })
    }
}

impl Default for FormatHeader {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during serialization.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Postcard encoding error.
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    /// Payload does not fit the 32-bit size field.
    #[error("payload of {0} bytes exceeds the format limit")]
    PayloadTooLarge(usize),

    /// Feature dimension does not fit the 32-bit payload field.
    #[error("feature count {0} exceeds the format limit")]
    FeatureCountTooLarge(usize),
}

/// Errors that can occur during deserialization.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Wrong signature.
    #[error("not a regression forest model file")]
    NotAModel,

    /// The file needs a newer reader.
    #[error("model requires reader version {min_readable:#010x}, this reader is {reader:#010x}")]
    VersionTooNew { min_readable: u32, reader: u32 },

    /// The file predates the oldest supported format.
    #[error("model version {written:#010x} is older than the minimum supported {min_back_compat:#010x}")]
    VersionTooOld { written: u32, min_back_compat: u32 },

    /// Payload checksum doesn't match.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// File was truncated or incomplete.
    #[error("file truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Payload decoded but is structurally invalid.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("invalid quantile flag {0}, expected 1")]
    InvalidQuantileFlag(u8),

    #[error("quantile sample count must be positive, got {0}")]
    InvalidSampleCount(i32),

    /// The restored parts do not form a valid predictor.
    #[error("invalid model: {0}")]
    InvalidModel(#[from] ConfigError),

    /// I/O error during reading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Postcard decoding error.
    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),
}

// ============================================================================
// CRC32 Helper
// ============================================================================

/// Compute CRC32 checksum of data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// Framing
// ============================================================================

/// Write header and payload, filling in size and checksum.
pub fn write_frame<W: Write>(writer: &mut W, header: &mut FormatHeader, payload: &[u8]) -> Result<(), SerializeError> {
    header.payload_size = u32::try_from(payload.len()).map_err(|_| SerializeError::PayloadTooLarge(payload.len()))?;
    header.checksum = compute_checksum(payload);

    writer.write_all(&header.to_bytes())?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read header and payload, checking signature, version and checksum.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            DeserializeError::Truncated {
                expected: HEADER_SIZE,
                actual: 0,
            }
        } else {
            DeserializeError::Io(e)
        }
    })?;

    let header = FormatHeader::from_bytes(&header_buf)?;
    header.version.check_readable_by(&VersionInfo::CURRENT)?;

    let expected = header.payload_size as usize;
    let mut payload = Vec::with_capacity(expected.min(1 << 20));
    reader.by_ref().take(expected as u64).read_to_end(&mut payload)?;
    if payload.len() < expected {
        return Err(DeserializeError::Truncated {
            expected,
            actual: payload.len(),
        });
    }

    let actual_checksum = compute_checksum(&payload);
    if actual_checksum != header.checksum {
        return Err(DeserializeError::ChecksumMismatch {
            expected: header.checksum,
            actual: actual_checksum,
        });
    }

    Ok((header, payload))
}

// ============================================================================
// Predictor Codec
// ============================================================================

fn encode_payload(predictor: &ForestRegressionPredictor) -> Result<Vec<u8>, SerializeError> {
    let ensemble = ForestPayload::new(predictor.forest(), predictor.n_features(), predictor.inner_args())?;
    // Leaves never hold more labels than i32::MAX, so clamping keeps behavior.
    let sample_count = i32::try_from(predictor.quantile_sample_count()).unwrap_or(i32::MAX);

    let mut bytes = postcard::to_allocvec(&ensemble)?;
    bytes.push(QUANTILE_FLAG);
    bytes.extend_from_slice(&sample_count.to_le_bytes());
    Ok(bytes)
}

fn decode_payload(bytes: &[u8]) -> Result<ForestRegressionPredictor, DeserializeError> {
    let (ensemble, rest): (ForestPayload, &[u8]) = postcard::take_from_bytes(bytes)?;
    let trailer_start = bytes.len() - rest.len();
    let truncated = || DeserializeError::Truncated {
        expected: trailer_start + 5,
        actual: bytes.len(),
    };

    let (&flag, rest) = rest.split_first().ok_or_else(truncated)?;
    if flag != QUANTILE_FLAG {
        return Err(DeserializeError::InvalidQuantileFlag(flag));
    }

    let count_bytes: [u8; 4] = rest.get(..4).and_then(|b| b.try_into().ok()).ok_or_else(truncated)?;
    if rest.len() > 4 {
        return Err(DeserializeError::CorruptPayload(format!(
            "{} trailing bytes after sample count",
            rest.len() - 4
        )));
    }
    let sample_count = i32::from_le_bytes(count_bytes);
    if sample_count <= 0 {
        return Err(DeserializeError::InvalidSampleCount(sample_count));
    }

    let forest = ensemble.to_forest().map_err(DeserializeError::CorruptPayload)?;
    let predictor = ForestRegressionPredictor::new(
        forest,
        ensemble.n_features.map(|n| n as usize),
        ensemble.inner_args,
        sample_count as usize,
    )?;
    Ok(predictor)
}

impl ForestRegressionPredictor {
    /// Serialize into the native format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        let payload = encode_payload(self)?;
        let mut output = Vec::with_capacity(HEADER_SIZE + payload.len());
        write_frame(&mut output, &mut FormatHeader::new(), &payload)?;
        Ok(output)
    }

    /// Deserialize from the native format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        Self::read_from(&mut &bytes[..])
    }

    /// Write the native format to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), SerializeError> {
        let payload = encode_payload(self)?;
        write_frame(writer, &mut FormatHeader::new(), &payload)
    }

    /// Read the native format from `reader`.
    ///
    /// Nothing is returned unless the whole file checks out.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, DeserializeError> {
        let (_, payload) = read_frame(reader)?;
        decode_payload(&payload)
    }

    /// Save to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializeError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Load from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeserializeError> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

// ============================================================================
// Tests
// ============================================================================
