//! Dreamcast VMU flash.
//!
//! 256 blocks of 512 bytes: user data in 0..200, the directory in 241..=253 read from the top down,
//! the allocation table in 254 and the system block in 255. Files grow downward from block 199.

use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::bcd::{self, DayOfWeekPolarity};
use crate::block::BlockStore;
use crate::dir_entry::{DirectoryEntry, Placement};
use crate::error::{Error, Result, Warning, WarningKind};
use crate::formats::Format;
use crate::layout::{
    AllocationLayout, AllocationPolicy, ChainStorage, CorruptFilePolicy, DirectoryLayout,
    EmptyRule, Endian, HeaderLayout, Layout, Region, Sentinels, SlotAssignment,
};
use crate::text;
use crate::timestamp;

pub mod individual;

pub const BLOCK_SIZE: usize = 512;
pub const TOTAL_BLOCKS: u16 = 256;
const SYSTEM_BLOCK: u16 = 255;
const FAT_BLOCK: u16 = 254;
const DIRECTORY: Region = Region::reversed(241, 13);
const USER_BLOCKS: u16 = 200;
const MAGIC: [u8; 16] = [0x55; 16];
const POLARITY: DayOfWeekPolarity = DayOfWeekPolarity::MondayZero;

const TYPE_DATA: u8 = 0x33;
const TYPE_GAME: u8 = 0xCC;
pub const ENTRY_LEN: usize = 32;

static RESERVED_CHAINS: [Region; 3] = [
    Region::forward(SYSTEM_BLOCK, 1),
    Region::forward(FAT_BLOCK, 1),
    DIRECTORY,
];

fn vmu_layout() -> Layout {
    Layout {
        name: "dreamcast",
        block_size: BLOCK_SIZE,
        total_blocks: TOTAL_BLOCKS,
        endian: Endian::Little,
        min_image_len: BLOCK_SIZE * TOTAL_BLOCKS as usize,
        header: HeaderLayout {
            region: Region::forward(SYSTEM_BLOCK, 1),
            checksum: None,
        },
        directory: DirectoryLayout {
            primary: DIRECTORY,
            backup: None,
            entries_at: 0,
            entry_len: ENTRY_LEN,
            max_entries: 200,
            empty: EmptyRule::AllBytes(0),
            empty_fill: 0,
            region_fill: Some(0),
            checksum: None,
            entry_checksum: None,
            update_counter: None,
            slots: SlotAssignment::Sequential,
            stores_byte_len: false,
        },
        chains: ChainStorage::Table(AllocationLayout {
            primary: Region::forward(FAT_BLOCK, 1),
            backup: None,
            table_at: 0,
            stride: 2,
            link_at: 0,
            first_block: 0,
            slots: TOTAL_BLOCKS,
            value_base: 0,
            sentinels: Sentinels {
                free: 0xFFFC,
                end: 0xFFFA,
                damaged: Some(0xFFFF),
            },
            status: None,
            checksum: None,
            update_counter: None,
            free_count_at: None,
            last_allocated_at: None,
            reserved_chains: &RESERVED_CHAINS,
            region_fill: Some(0),
            consistency_check: false,
        }),
        data_area: Region::forward(0, USER_BLOCKS),
        allocation_policy: AllocationPolicy::Descending,
        corrupt_file_policy: CorruptFilePolicy::SkipCorruptFile,
        fill: 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dreamcast {
    layout: Layout,
}

impl Default for Dreamcast {
    fn default() -> Self {
        Self {
            layout: vmu_layout(),
        }
    }
}

pub fn looks_like(image: &[u8]) -> bool {
    let at = SYSTEM_BLOCK as usize * BLOCK_SIZE;
    image.len() == BLOCK_SIZE * TOTAL_BLOCKS as usize && image[at..at + MAGIC.len()] == MAGIC
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmuColor {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub alpha: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamcastHeader {
    #[serde(default)]
    pub custom_color: bool,
    #[serde(default)]
    pub color: VmuColor,
    #[serde(with = "crate::date_format")]
    pub formatted: NaiveDateTime,
    #[serde(default)]
    pub icon_shape: u16,
}

impl Default for DreamcastHeader {
    fn default() -> Self {
        Self {
            custom_color: false,
            color: VmuColor::default(),
            formatted: timestamp::epoch_2000(),
            icon_shape: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VmuFileType {
    Data,
    Game,
    /// Any other type byte, kept as found.
    Unknown(u8),
}

impl VmuFileType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            TYPE_DATA => VmuFileType::Data,
            TYPE_GAME => VmuFileType::Game,
            other => VmuFileType::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            VmuFileType::Data => TYPE_DATA,
            VmuFileType::Game => TYPE_GAME,
            VmuFileType::Unknown(byte) => byte,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamcastMeta {
    pub file_type: VmuFileType,
    #[serde(default)]
    pub copy_protected: bool,
    pub file_name: String,
    #[serde(with = "crate::date_format")]
    pub created: NaiveDateTime,
    /// Offset of the VMS file header from the start of the file, in blocks.
    #[serde(default)]
    pub header_offset: u16,
}

/// Fixed system block fields as (offset, value).
const SYSTEM_FIELDS: [(usize, u16); 9] = [
    (0x40, TOTAL_BLOCKS - 1),
    (0x42, 0),
    (0x44, SYSTEM_BLOCK),
    (0x46, FAT_BLOCK),
    (0x48, 1),
    (0x4A, 253),
    (0x4C, 13),
    (0x50, USER_BLOCKS),
    (0x52, 31),
];

/// Fields the geometry depends on. The others vary between writers and are not checked.
const CHECKED_FIELDS: [usize; 4] = [0x46, 0x4A, 0x4C, 0x50];

impl Format for Dreamcast {
    type Header = DreamcastHeader;
    type Meta = DreamcastMeta;

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn check_signature(&self, store: &BlockStore) -> Result<()> {
        if store.block(SYSTEM_BLOCK)[..MAGIC.len()] != MAGIC {
            return Err(Error::mismatch("dreamcast", "system block is not formatted"));
        }
        Ok(())
    }

    fn decode_header(&self, store: &BlockStore, warnings: &mut Vec<Warning>) -> Result<DreamcastHeader> {
        let block = store.block(SYSTEM_BLOCK);
        let le = Endian::Little;
        for (at, expected) in SYSTEM_FIELDS {
            let value = le.read_u16(&block[at..]);
            if CHECKED_FIELDS.contains(&at) && value != expected {
                return Err(Error::UnsupportedField {
                    field: "system block geometry",
                    value: value as u64,
                });
            }
        }
        let stamp = &block[0x30..0x38];
        if !bcd::weekday_consistent(stamp) {
            let warning = Warning::new("dreamcast system block timestamp", WarningKind::KnownWriterQuirk);
            warn!("{warning}");
            warnings.push(warning);
        }
        Ok(DreamcastHeader {
            custom_color: block[0x10] != 0,
            color: VmuColor {
                blue: block[0x11],
                green: block[0x12],
                red: block[0x13],
                alpha: block[0x14],
            },
            formatted: bcd::decode_timestamp(stamp)?,
            icon_shape: le.read_u16(&block[0x4E..]),
        })
    }

    fn encode_header(&self, header: &DreamcastHeader, store: &mut BlockStore) -> Result<()> {
        let block = store.block_mut(SYSTEM_BLOCK);
        let le = Endian::Little;
        block.fill(0);
        block[..MAGIC.len()].copy_from_slice(&MAGIC);
        block[0x10] = header.custom_color as u8;
        block[0x11] = header.color.blue;
        block[0x12] = header.color.green;
        block[0x13] = header.color.red;
        block[0x14] = header.color.alpha;
        block[0x30..0x38].copy_from_slice(&bcd::encode_timestamp(&header.formatted, POLARITY));
        for (at, value) in SYSTEM_FIELDS {
            le.write_u16(&mut block[at..], value);
        }
        le.write_u16(&mut block[0x4E..], header.icon_shape);
        le.write_u32(&mut block[0x54..], 0x80_0000);
        Ok(())
    }

    fn decode_entry(&self, slot: usize, raw: &[u8]) -> Result<DirectoryEntry<DreamcastMeta>> {
        let le = Endian::Little;
        let file_type = VmuFileType::from_byte(raw[0x00]);
        if let VmuFileType::Unknown(byte) = file_type {
            debug!("dreamcast: slot {slot} has unknown file type {byte:#04x}");
        }
        Ok(DirectoryEntry {
            slot,
            first_block: le.read_u16(&raw[0x02..]),
            size_in_blocks: Some(le.read_u16(&raw[0x18..])),
            byte_len: None,
            meta: DreamcastMeta {
                file_type,
                copy_protected: raw[0x01] != 0x00,
                file_name: text::decode_latin1(&raw[0x04..0x10]),
                created: bcd::decode_timestamp(&raw[0x10..0x18])?,
                header_offset: le.read_u16(&raw[0x1A..]),
            },
        })
    }

    fn encode_entry(&self, meta: &DreamcastMeta, placement: &Placement, out: &mut [u8]) -> Result<()> {
        let le = Endian::Little;
        out.fill(0);
        out[0x00] = meta.file_type.to_byte();
        out[0x01] = if meta.copy_protected { 0xFF } else { 0x00 };
        le.write_u16(&mut out[0x02..], placement.first_block);
        text::encode_latin1(&meta.file_name, &mut out[0x04..0x10], "VMU file name")?;
        out[0x10..0x18].copy_from_slice(&bcd::encode_timestamp(&meta.created, POLARITY));
        le.write_u16(&mut out[0x18..], placement.size_in_blocks);
        le.write_u16(&mut out[0x1A..], meta.header_offset);
        Ok(())
    }

    fn display_name(&self, meta: &DreamcastMeta) -> String {
        meta.file_name.clone()
    }
}
