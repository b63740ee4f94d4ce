//! Model serialization and deserialization.
//!
//! [`ForestRegressionPredictor`](crate::inference::ForestRegressionPredictor)
//! is stored in a versioned, checksummed native binary format; see [`native`].

pub mod native;
pub mod payload;

pub use native::{
    compute_checksum, read_frame, write_frame, DeserializeError, FormatHeader, SerializeError, VersionInfo,
    HEADER_SIZE, SIGNATURE, VER_INITIAL, VER_LEAF_WEIGHTS,
};
pub use payload::{ForestPayload, TreePayload};
