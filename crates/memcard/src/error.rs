use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The image does not carry this console's signature or size.
    #[error("not a {format} image: {reason}")]
    FormatMismatch {
        format: &'static str,
        reason: String,
    },
    /// Every copy of a required structure failed verification.
    #[error("{structure} failed verification in every copy")]
    VolumeCorrupted { structure: &'static str },
    #[error("corrupted block chain starting at block {start}: {fault}")]
    CorruptedChain { start: u16, fault: ChainFault },
    #[error("{what}: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{what}: {needed} needed but only {available} available")]
    CapacityExceeded {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("{field} holds unsupported value {value:#x}")]
    UnsupportedField { field: &'static str, value: u64 },
    /// Compression or decompression of a wrapped image failed.
    #[error("compressed stream: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failures that concern a single save file rather than the whole volume.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Error::CorruptedChain { .. } | Error::SizeMismatch { .. } | Error::UnsupportedField { .. }
        )
    }

    pub(crate) fn mismatch(format: &'static str, reason: impl Into<String>) -> Self {
        Error::FormatMismatch {
            format,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainFault {
    #[error("block {block} is marked unallocated")]
    Unallocated { block: u16 },
    #[error("block {block} is marked damaged")]
    Damaged { block: u16 },
    #[error("block {block} lies outside the data area")]
    OutOfRange { block: u16 },
    #[error("block {block} is visited twice")]
    Cycle { block: u16 },
    #[error("no end of chain within {steps} steps")]
    Runaway { steps: usize },
    #[error("block {block} does not carry the data block tag")]
    NotData { block: u16 },
    #[error("chain holds {actual} blocks but the entry declares {declared}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// Integrity findings that do not stop a parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub structure: String,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    ChecksumMismatch,
    /// A checksum that is wrong in a way some writers are known to produce.
    KnownWriterQuirk,
    BackupInUse,
}

impl Warning {
    pub fn new(structure: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            structure: structure.into(),
            kind,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let what = match self.kind {
            WarningKind::ChecksumMismatch => "checksum does not match",
            WarningKind::KnownWriterQuirk => "checksum carries a known writer quirk",
            WarningKind::BackupInUse => "primary copy rejected, using backup",
        };
        write!(f, "{}: {what}", self.structure)
    }
}
