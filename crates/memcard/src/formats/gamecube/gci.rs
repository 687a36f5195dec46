//! Single-save containers: plain GCI, GameShark and MaxDrive.
//!
//! All three carry a 64-byte directory entry followed by the payload. The GameShark and MaxDrive
//! variants prepend their own header with free-text comments.

use serde::Serialize;

use super::{decode_entry_fields, encode_entry_fields, GameCubeMeta, BLOCK_SIZE, ENTRY_LEN};
use crate::assembler::blocks_needed;
use crate::dir_entry::Placement;
use crate::error::{Error, Result};
use crate::layout::EmptyRule;
use crate::text::{self, DecodedText};
use crate::volume::SaveFile;

const GAMESHARK_MAGIC: &[u8] = b"GCSAVE";
const GAMESHARK_HEADER_LEN: usize = 0x110;
const GAMESHARK_COMMENT_AT: usize = 0x10;

const MAXDRIVE_MAGIC: &[u8] = b"DATELGC_SAVE";
const MAXDRIVE_HEADER_LEN: usize = 0x80;
const MAXDRIVE_COMMENTS_AT: [usize; 2] = [0x10, 0x48];
const MAXDRIVE_COMMENT_LEN: usize = 0x38;
/// Entry fields MaxDrive stores little-endian.
const MAXDRIVE_SWAPPED: [usize; 11] = [
    0x06, 0x2C, 0x2E, 0x30, 0x32, 0x34, 0x36, 0x38, 0x3A, 0x3C, 0x3E,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Container {
    Gci,
    GameShark,
    MaxDrive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndividualSave {
    pub container: Container,
    pub file: SaveFile<GameCubeMeta>,
    /// Comments from the container's own header.
    pub container_comments: Vec<DecodedText>,
}

fn read_entry(gci: &[u8], check_size: bool) -> Result<SaveFile<GameCubeMeta>> {
    if gci.len() < ENTRY_LEN {
        return Err(Error::SizeMismatch {
            what: "GCI entry",
            expected: ENTRY_LEN,
            actual: gci.len(),
        });
    }
    let (raw, payload) = gci.split_at(ENTRY_LEN);
    if (EmptyRule::Prefix { len: 4, value: 0xFF }).matches(raw) {
        return Err(Error::mismatch("gci", "directory entry is empty"));
    }
    let entry = decode_entry_fields(0, raw);
    if check_size {
        let declared = entry.size_in_blocks.unwrap_or_default() as usize * BLOCK_SIZE;
        if declared != payload.len() {
            return Err(Error::SizeMismatch {
                what: "GCI payload",
                expected: declared,
                actual: payload.len(),
            });
        }
    }
    Ok(SaveFile::new(entry.meta, payload.to_vec()))
}

/// Reads any of the three containers, recognised by their magic.
pub fn read_individual_save(bytes: &[u8]) -> Result<IndividualSave> {
    if bytes.starts_with(GAMESHARK_MAGIC) && bytes.len() >= GAMESHARK_HEADER_LEN {
        // GameShark writers often get the block count wrong, so it is not checked.
        let file = read_entry(&bytes[GAMESHARK_HEADER_LEN..], false)?;
        let comment = text::decode_with_heuristic(&bytes[GAMESHARK_COMMENT_AT..GAMESHARK_HEADER_LEN]);
        return Ok(IndividualSave {
            container: Container::GameShark,
            file,
            container_comments: vec![comment],
        });
    }
    if bytes.starts_with(MAXDRIVE_MAGIC) && bytes.len() >= MAXDRIVE_HEADER_LEN {
        let mut gci = bytes[MAXDRIVE_HEADER_LEN..].to_vec();
        if gci.len() >= ENTRY_LEN {
            for at in MAXDRIVE_SWAPPED {
                gci.swap(at, at + 1);
            }
        }
        let file = read_entry(&gci, true)?;
        let comments = MAXDRIVE_COMMENTS_AT
            .iter()
            .map(|&at| text::decode_with_heuristic(&bytes[at..at + MAXDRIVE_COMMENT_LEN]))
            .collect();
        return Ok(IndividualSave {
            container: Container::MaxDrive,
            file,
            container_comments: comments,
        });
    }
    Ok(IndividualSave {
        container: Container::Gci,
        file: read_entry(bytes, true)?,
        container_comments: Vec::new(),
    })
}

/// Writes a save as a plain GCI. The payload must fill whole blocks.
pub fn write_gci(file: &SaveFile<GameCubeMeta>) -> Result<Vec<u8>> {
    let blocks = blocks_needed(file.payload.len(), BLOCK_SIZE);
    if file.payload.is_empty() || file.payload.len() % BLOCK_SIZE != 0 {
        return Err(Error::SizeMismatch {
            what: "GCI payload",
            expected: blocks.max(1) * BLOCK_SIZE,
            actual: file.payload.len(),
        });
    }
    let mut out = vec![0xFFu8; ENTRY_LEN];
    let placement = Placement {
        first_block: 0,
        size_in_blocks: blocks as u16,
        byte_len: file.payload.len() as u32,
    };
    encode_entry_fields(&file.meta, &placement, &mut out)?;
    out.extend_from_slice(&file.payload);
    Ok(out)
}
