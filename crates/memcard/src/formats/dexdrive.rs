//! DexDrive images: a header with one comment per save, followed by a raw PS1 or N64 card image.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAGIC: &[u8] = b"123-456-STD";
const FIRST_COMMENT_AT: usize = 64;
const COMMENT_LEN: usize = 256;
const N64_IMAGE_LEN: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DexDriveConsole {
    Ps1,
    N64,
}

impl DexDriveConsole {
    pub fn header_len(self) -> usize {
        match self {
            DexDriveConsole::Ps1 => 3904,
            DexDriveConsole::N64 => 4160,
        }
    }

    /// Comment slots: one per PS1 save block, one per N64 note.
    pub fn comment_count(self) -> usize {
        match self {
            DexDriveConsole::Ps1 => 15,
            DexDriveConsole::N64 => 16,
        }
    }
}

/// A card image taken out of its DexDrive header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexDriveImage {
    pub image: Vec<u8>,
    /// Indexed by directory slot. Empty where the header holds no comment.
    pub comments: Vec<String>,
}

pub fn looks_like(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

fn comment_range(index: usize) -> std::ops::Range<usize> {
    let start = FIRST_COMMENT_AT + index * COMMENT_LEN;
    start..start + COMMENT_LEN
}

fn decode_comment(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

/// Splits a DexDrive file into its comments and card image.
///
/// N64 files without the magic are still accepted when they hold a bare card image, or a header
/// of the right length followed by one.
pub fn unwrap(console: DexDriveConsole, bytes: &[u8]) -> Result<DexDriveImage> {
    let header_len = console.header_len();
    if !looks_like(bytes) {
        let n64 = console == DexDriveConsole::N64;
        if n64 && bytes.len() == N64_IMAGE_LEN {
            debug!("dexdrive: bare controller pak image without a header");
            return Ok(DexDriveImage {
                image: bytes.to_vec(),
                comments: vec![String::new(); console.comment_count()],
            });
        }
        if !(n64 && bytes.len() == header_len + N64_IMAGE_LEN) {
            return Err(Error::mismatch("dexdrive", "missing 123-456-STD magic"));
        }
        debug!("dexdrive: header without magic");
    }
    if bytes.len() <= header_len {
        return Err(Error::SizeMismatch {
            what: "dexdrive image",
            expected: header_len + 1,
            actual: bytes.len(),
        });
    }
    let (header, image) = bytes.split_at(header_len);
    let comments = (0..console.comment_count())
        .map(|i| decode_comment(&header[comment_range(i)]))
        .collect();
    Ok(DexDriveImage {
        image: image.to_vec(),
        comments,
    })
}

/// Puts a card image behind a DexDrive header. Comments past the last slot are an error and
/// longer comments are cut at 256 bytes.
pub fn wrap(console: DexDriveConsole, image: &[u8], comments: &[String]) -> Result<Vec<u8>> {
    if comments.len() > console.comment_count() {
        return Err(Error::CapacityExceeded {
            what: "dexdrive comments",
            needed: comments.len(),
            available: console.comment_count(),
        });
    }
    let mut out = vec![0u8; console.header_len()];
    out[..MAGIC.len()].copy_from_slice(MAGIC);
    for (i, comment) in comments.iter().enumerate() {
        let bytes = comment.as_bytes();
        let take = bytes.len().min(COMMENT_LEN);
        out[comment_range(i)][..take].copy_from_slice(&bytes[..take]);
    }
    out.extend_from_slice(image);
    Ok(out)
}
