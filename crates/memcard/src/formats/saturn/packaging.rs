//! How emulators store Saturn backup RAM on disk.
//!
//! Yabause and Yaba Sanshiro keep each byte in the low half of a 16-bit word, padded with `0xFF`.
//! Mednafen gzips its cartridge images.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use serde::{Deserialize, Serialize};

use super::MAGIC;
use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const PADDING: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packaging {
    Raw,
    ByteExpanded,
    Gzip,
}

impl std::str::FromStr for Packaging {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Packaging::Raw),
            "byte_expanded" | "yabause" => Ok(Packaging::ByteExpanded),
            "gzip" | "mednafen" => Ok(Packaging::Gzip),
            other => Err(format!(
                "unknown saturn packaging `{other}`, expected raw, byte_expanded or gzip"
            )),
        }
    }
}

/// Every pair is either a repeated byte or a byte behind a `0x00`/`0xFF` pad.
pub fn is_byte_expanded(bytes: &[u8]) -> bool {
    bytes.len() % 2 == 0
        && bytes
            .chunks_exact(2)
            .all(|pair| pair[0] == pair[1] || pair[0] == 0x00 || pair[0] == 0xFF)
}

pub fn byte_collapse(bytes: &[u8]) -> Vec<u8> {
    bytes.chunks_exact(2).map(|pair| pair[1]).collect()
}

pub fn byte_expand(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|&b| [PADDING, b]).collect()
}

/// Returns the raw image inside `bytes` and how it was packaged.
pub fn unwrap_image(bytes: &[u8]) -> Result<(Vec<u8>, Packaging)> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut image = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut image)?;
        debug!("saturn: gunzipped {} bytes into {}", bytes.len(), image.len());
        return Ok((image, Packaging::Gzip));
    }
    if bytes.starts_with(MAGIC) {
        return Ok((bytes.to_vec(), Packaging::Raw));
    }
    if bytes.len() >= MAGIC.len() * 2 && is_byte_expanded(bytes) {
        let image = byte_collapse(bytes);
        if image.starts_with(MAGIC) {
            return Ok((image, Packaging::ByteExpanded));
        }
    }
    Err(Error::mismatch("saturn", "no backup RAM signature in any packaging"))
}

pub fn wrap_image(image: &[u8], packaging: Packaging) -> Result<Vec<u8>> {
    match packaging {
        Packaging::Raw => Ok(image.to_vec()),
        Packaging::ByteExpanded => Ok(byte_expand(image)),
        Packaging::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(image)?;
            Ok(encoder.finish()?)
        }
    }
}
