//! Sega Saturn backup RAM: the console's internal memory and the backup cartridge.
//!
//! Block 0 repeats the signature, block 1 is zero. Every other block is either the record of a
//! save, tagged `0x8000_0000`, or data belonging to one, tagged zero. There is no directory: the
//! record blocks are found by scanning, and each record lists the data blocks of its save.
//! Everything is big-endian.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::block::BlockStore;
use crate::dir_entry::{DirectoryEntry, Placement};
use crate::error::{Error, Result, Warning};
use crate::formats::Format;
use crate::layout::{
    AllocationPolicy, BlockListLayout, ChainStorage, CorruptFilePolicy, DirectoryLayout, EmptyRule,
    Endian, HeaderLayout, Layout, Region, SlotAssignment,
};
use crate::text;
use crate::timestamp;

pub mod bup;
pub mod packaging;

pub const MAGIC: &[u8; 16] = b"BackUpRam Format";
const RESERVED_BLOCKS: u16 = 2;
const RECORD_TAG: u32 = 0x8000_0000;
const NAME: std::ops::Range<usize> = 0x04..0x0F;
const LANGUAGE_AT: usize = 0x0F;
const COMMENT: std::ops::Range<usize> = 0x10..0x1A;
const DATE_AT: usize = 0x1A;
const SIZE_AT: usize = 0x1E;
const LIST_AT: usize = 0x22;

pub const BLOCK_LIST: BlockListLayout = BlockListLayout {
    list_at: LIST_AT,
    data_at: 4,
    terminator: 0x0000,
    data_tag: 0x00,
};

/// Which backup memory an image holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturnMedia {
    /// 32 KiB of console memory in 64-byte blocks.
    Internal,
    /// 512 KiB backup cartridge in 512-byte blocks.
    Cartridge,
}

impl SaturnMedia {
    pub fn block_size(self) -> usize {
        match self {
            SaturnMedia::Internal => 0x40,
            SaturnMedia::Cartridge => 0x200,
        }
    }

    pub fn image_len(self) -> usize {
        match self {
            SaturnMedia::Internal => 0x8000,
            SaturnMedia::Cartridge => 0x80000,
        }
    }
}

impl fmt::Display for SaturnMedia {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SaturnMedia::Internal => "internal",
            SaturnMedia::Cartridge => "cartridge",
        })
    }
}

impl FromStr for SaturnMedia {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(SaturnMedia::Internal),
            "cartridge" | "cart" => Ok(SaturnMedia::Cartridge),
            other => Err(format!(
                "unknown saturn media `{other}`, expected internal or cartridge"
            )),
        }
    }
}

fn saturn_layout(block_size: usize, total_blocks: u16) -> Layout {
    let data_area = Region::forward(RESERVED_BLOCKS, total_blocks - RESERVED_BLOCKS);
    Layout {
        name: "saturn",
        block_size,
        total_blocks,
        endian: Endian::Big,
        min_image_len: block_size * total_blocks as usize,
        header: HeaderLayout {
            region: Region::forward(0, RESERVED_BLOCKS),
            checksum: None,
        },
        // Every data block is a potential record, so the directory spans the whole data area.
        directory: DirectoryLayout {
            primary: data_area,
            backup: None,
            entries_at: 0,
            entry_len: block_size,
            max_entries: data_area.count as usize,
            empty: EmptyRule::StatusNot {
                offset: 0,
                value: 0x80,
            },
            empty_fill: 0,
            region_fill: None,
            checksum: None,
            entry_checksum: None,
            update_counter: None,
            slots: SlotAssignment::ByFirstBlock {
                base: RESERVED_BLOCKS,
            },
            stores_byte_len: true,
        },
        chains: ChainStorage::BlockList(BLOCK_LIST),
        data_area,
        allocation_policy: AllocationPolicy::Ascending,
        corrupt_file_policy: CorruptFilePolicy::Strict,
        fill: 0,
    }
}

/// Leading signature repetitions of an image, in bytes.
fn signature_len(image: &[u8]) -> usize {
    image
        .chunks_exact(MAGIC.len())
        .take_while(|chunk| *chunk == MAGIC)
        .count()
        * MAGIC.len()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saturn {
    layout: Layout,
}

impl Default for Saturn {
    fn default() -> Self {
        Self::internal()
    }
}

impl Saturn {
    pub fn new(media: SaturnMedia) -> Self {
        let blocks = media.image_len() / media.block_size();
        Self {
            layout: saturn_layout(media.block_size(), blocks as u16),
        }
    }

    pub fn internal() -> Self {
        Self::new(SaturnMedia::Internal)
    }

    pub fn cartridge() -> Self {
        Self::new(SaturnMedia::Cartridge)
    }

    /// Any geometry the signature can describe: the block size is the length of the repeated
    /// signature, so it must be an even multiple of 16 bytes.
    pub fn with_geometry(block_size: usize, image_len: usize) -> Result<Self> {
        let repeats = block_size / MAGIC.len();
        if repeats == 0 || block_size % MAGIC.len() != 0 || repeats % 2 != 0 {
            return Err(Error::mismatch(
                "saturn",
                format!("{repeats} signature repetitions do not make a block"),
            ));
        }
        if image_len % block_size != 0 || image_len < block_size * (RESERVED_BLOCKS as usize + 1) {
            return Err(Error::SizeMismatch {
                what: "saturn image length",
                expected: image_len.div_ceil(block_size).max(3) * block_size,
                actual: image_len,
            });
        }
        let total = image_len / block_size;
        let total = u16::try_from(total).map_err(|_| Error::UnsupportedField {
            field: "saturn block count",
            value: total as u64,
        })?;
        Ok(Self {
            layout: saturn_layout(block_size, total),
        })
    }

    /// Reads the geometry from the signature of a raw image.
    pub fn for_image(image: &[u8]) -> Result<Self> {
        let block_size = signature_len(image);
        if block_size == 0 {
            return Err(Error::mismatch("saturn", "no backup RAM signature"));
        }
        let saturn = Self::with_geometry(block_size, image.len())?;
        if image[block_size..block_size * 2].iter().any(|&b| b != 0) {
            return Err(Error::mismatch("saturn", "second block is not zero"));
        }
        Ok(saturn)
    }

    /// The media an image of this geometry corresponds to, if it is a standard one.
    pub fn media(&self) -> Option<SaturnMedia> {
        [SaturnMedia::Internal, SaturnMedia::Cartridge]
            .into_iter()
            .find(|media| {
                media.block_size() == self.layout.block_size
                    && media.image_len() == self.layout.image_len()
            })
    }
}

pub fn looks_like(image: &[u8]) -> bool {
    Saturn::for_image(image).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaturnLanguage {
    Japanese,
    English,
    French,
    German,
    Spanish,
    Italian,
}

impl SaturnLanguage {
    const ALL: [SaturnLanguage; 6] = [
        SaturnLanguage::Japanese,
        SaturnLanguage::English,
        SaturnLanguage::French,
        SaturnLanguage::German,
        SaturnLanguage::Spanish,
        SaturnLanguage::Italian,
    ];

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(Error::UnsupportedField {
                field: "saturn language",
                value: code as u64,
            })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SaturnLanguage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            SaturnLanguage::Japanese => "Japanese",
            SaturnLanguage::English => "English",
            SaturnLanguage::French => "French",
            SaturnLanguage::German => "German",
            SaturnLanguage::Spanish => "Spanish",
            SaturnLanguage::Italian => "Italian",
        })
    }
}

/// The reserved blocks carry nothing but the signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaturnHeader {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaturnMeta {
    pub name: String,
    pub language: SaturnLanguage,
    #[serde(default)]
    pub comment: String,
    #[serde(with = "crate::date_format")]
    pub saved: NaiveDateTime,
}

/// Record fields shared by the card and the BUP container.
pub(crate) fn decode_meta(name: &[u8], language: u8, comment: &[u8], date: u32) -> Result<SaturnMeta> {
    Ok(SaturnMeta {
        name: text::decode_latin1(name),
        language: SaturnLanguage::from_code(language)?,
        comment: text::decode_shift_jis(comment),
        saved: timestamp::from_minutes_since_1980(date),
    })
}

impl Format for Saturn {
    type Header = SaturnHeader;
    type Meta = SaturnMeta;

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn check_signature(&self, store: &BlockStore) -> Result<()> {
        let block = store.block(0);
        if block.chunks_exact(MAGIC.len()).any(|chunk| chunk != MAGIC) {
            return Err(Error::mismatch("saturn", "first block is not the backup RAM signature"));
        }
        if store.block(1).iter().any(|&b| b != 0) {
            return Err(Error::mismatch("saturn", "second block is not zero"));
        }
        Ok(())
    }

    fn decode_header(&self, _store: &BlockStore, _warnings: &mut Vec<Warning>) -> Result<SaturnHeader> {
        Ok(SaturnHeader {})
    }

    fn encode_header(&self, _header: &SaturnHeader, store: &mut BlockStore) -> Result<()> {
        for chunk in store.block_mut(0).chunks_exact_mut(MAGIC.len()) {
            chunk.copy_from_slice(MAGIC);
        }
        store.block_mut(1).fill(0);
        Ok(())
    }

    fn entry_is_empty(&self, raw: &[u8]) -> bool {
        self.layout.endian.read_u32(raw) != RECORD_TAG
    }

    fn decode_entry(&self, slot: usize, raw: &[u8]) -> Result<DirectoryEntry<SaturnMeta>> {
        let be = self.layout.endian;
        Ok(DirectoryEntry {
            slot,
            first_block: slot as u16 + RESERVED_BLOCKS,
            size_in_blocks: None,
            byte_len: Some(be.read_u32(&raw[SIZE_AT..])),
            meta: decode_meta(
                &raw[NAME],
                raw[LANGUAGE_AT],
                &raw[COMMENT],
                be.read_u32(&raw[DATE_AT..]),
            )?,
        })
    }

    /// Writes the record fields only. The block list and the start of the data follow at
    /// [`BLOCK_LIST`]`.list_at` and are written with the payload.
    fn encode_entry(&self, meta: &SaturnMeta, placement: &Placement, out: &mut [u8]) -> Result<()> {
        let be = self.layout.endian;
        out.fill(0);
        be.write_u32(out, RECORD_TAG);
        text::encode_latin1(&meta.name, &mut out[NAME], "saturn save name")?;
        out[LANGUAGE_AT] = meta.language.code();
        text::encode_shift_jis(&meta.comment, &mut out[COMMENT], "saturn comment")?;
        be.write_u32(&mut out[DATE_AT..], timestamp::to_minutes_since_1980(&meta.saved)?);
        be.write_u32(&mut out[SIZE_AT..], placement.byte_len);
        Ok(())
    }

    fn display_name(&self, meta: &SaturnMeta) -> String {
        meta.name.clone()
    }
}
