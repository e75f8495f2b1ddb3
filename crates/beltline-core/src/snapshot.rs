//! Binary save files for factory layouts.
//!
//! A snapshot is a bitcode-encoded [`FactoryGraph`] behind a small versioned
//! header, so a save can be rejected with a clear error instead of a decode
//! failure when the format moves on.

use crate::graph::FactoryGraph;
use serde::{Deserialize, Serialize};

/// Magic number identifying a beltline save.
pub const SNAPSHOT_MAGIC: u32 = 0xBE17_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

/// Errors that can occur while encoding a save.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur while decoding a save.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

/// Header carried inside every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
}

impl SnapshotHeader {
    fn current() -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    fn validate(&self) -> Result<(), LoadError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(LoadError::InvalidMagic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    header: SnapshotHeader,
    graph: FactoryGraph,
}

/// Encode a graph, computed state included, into a versioned byte buffer.
pub fn save(graph: &FactoryGraph) -> Result<Vec<u8>, SaveError> {
    let snapshot = Snapshot {
        header: SnapshotHeader::current(),
        graph: graph.clone(),
    };
    bitcode::serialize(&snapshot).map_err(|e| SaveError::Encode(e.to_string()))
}

/// Decode a byte buffer produced by [`save`], checking the header first.
pub fn load(data: &[u8]) -> Result<FactoryGraph, LoadError> {
    let snapshot: Snapshot =
        bitcode::deserialize(data).map_err(|e| LoadError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot.graph)
}
