//! PlayStation memory card.
//!
//! 16 blocks of 8 KiB. Block 0 holds 64 frames of 128 bytes: frame 0 carries the magic, frames
//! 1 to 15 describe data blocks 1 to 15 and double as directory entries for the first block of
//! each save, and the rest are unused.

use serde::{Deserialize, Serialize};

use crate::block::BlockStore;
use crate::checksum::{self, ChecksumKind};
use crate::dir_entry::{DirectoryEntry, Placement};
use crate::error::{Error, Result, Warning};
use crate::formats::Format;
use crate::layout::{
    AllocationLayout, AllocationPolicy, ChainStorage, ChecksumSpec, CorruptFilePolicy,
    DirectoryLayout, EmptyRule, Endian, HeaderLayout, Layout, Region, Sentinels, SlotAssignment,
    StatusByte,
};
use crate::text::{self, DecodedText, TextEncoding};
use crate::volume::SaveFile;

pub mod sony;

pub const BLOCK_SIZE: usize = 0x2000;
pub const TOTAL_BLOCKS: u16 = 16;
const FRAME_LEN: usize = 0x80;
const FRAMES: usize = BLOCK_SIZE / FRAME_LEN;
const MAGIC: &[u8] = b"MC";

const STATUS_FREE: u8 = 0xA0;
const STATUS_FIRST: u8 = 0x51;
const STATUS_MIDDLE: u8 = 0x52;
const STATUS_LAST: u8 = 0x53;
const STATUS_UNUSABLE: u8 = 0xFF;
const NO_LINK: u16 = 0xFFFF;

const NAME_AT: usize = 0x0A;
const NAME_LEN: usize = 20;
const SIZE_AT: usize = 0x04;
const LINK_AT: usize = 0x08;

const FRAME_CHECKSUM: ChecksumSpec = ChecksumSpec {
    kind: ChecksumKind::Xor8,
    start: 0,
    len: FRAME_LEN - 1,
    stored_at: FRAME_LEN - 1,
    critical: false,
};

/// Every save's first block starts with this magic, followed by the title.
const TITLE_MAGIC: &[u8] = b"SC";
const TITLE_AT: usize = 0x04;
const TITLE_LEN: usize = 64;

fn card_layout() -> Layout {
    let data_blocks = TOTAL_BLOCKS - 1;
    Layout {
        name: "ps1",
        block_size: BLOCK_SIZE,
        total_blocks: TOTAL_BLOCKS,
        endian: Endian::Little,
        min_image_len: BLOCK_SIZE * TOTAL_BLOCKS as usize,
        header: HeaderLayout {
            region: Region::forward(0, 1),
            checksum: None,
        },
        directory: DirectoryLayout {
            primary: Region::forward(0, 1),
            backup: None,
            entries_at: FRAME_LEN,
            entry_len: FRAME_LEN,
            max_entries: data_blocks as usize,
            empty: EmptyRule::StatusNot {
                offset: 0,
                value: STATUS_FIRST,
            },
            empty_fill: 0,
            region_fill: None,
            checksum: None,
            entry_checksum: Some(FRAME_CHECKSUM),
            update_counter: None,
            slots: SlotAssignment::ByFirstBlock { base: 1 },
            stores_byte_len: true,
        },
        chains: ChainStorage::Table(AllocationLayout {
            primary: Region::forward(0, 1),
            backup: None,
            table_at: FRAME_LEN,
            stride: FRAME_LEN,
            link_at: LINK_AT,
            first_block: 1,
            slots: data_blocks,
            value_base: 1,
            sentinels: Sentinels {
                free: NO_LINK,
                end: NO_LINK,
                damaged: None,
            },
            status: Some(StatusByte {
                offset: 0,
                free_mask: 0xF0,
                free: STATUS_FREE,
                unusable: STATUS_UNUSABLE,
                first: STATUS_FIRST,
                middle: STATUS_MIDDLE,
                last: STATUS_LAST,
            }),
            checksum: None,
            update_counter: None,
            free_count_at: None,
            last_allocated_at: None,
            reserved_chains: &[],
            region_fill: None,
            consistency_check: false,
        }),
        data_area: Region::forward(1, data_blocks),
        allocation_policy: AllocationPolicy::Ascending,
        corrupt_file_policy: CorruptFilePolicy::Strict,
        fill: 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ps1 {
    layout: Layout,
}

impl Default for Ps1 {
    fn default() -> Self {
        Self {
            layout: card_layout(),
        }
    }
}

pub fn looks_like(image: &[u8]) -> bool {
    image.len() == BLOCK_SIZE * TOTAL_BLOCKS as usize && image.starts_with(MAGIC)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ps1Header {
    /// Some cards keep a copy of frame 0 in the last frame for the BIOS write test.
    #[serde(default)]
    pub write_test_frame: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ps1Meta {
    /// Region code, product code and a game-chosen suffix, e.g. `BASLUS-00000SAVE`.
    pub file_name: String,
}

impl Ps1Meta {
    pub fn region(&self) -> &'static str {
        match self.file_name.as_bytes() {
            [b'B', b'I', ..] => "Japan",
            [b'B', b'A', ..] => "North America",
            [b'B', b'E', ..] => "Europe",
            _ => "Unknown region",
        }
    }
}

impl SaveFile<Ps1Meta> {
    /// The title the game stored in its first block, Shift-JIS with full-width forms narrowed.
    pub fn description(&self) -> Option<DecodedText> {
        if !self.payload.starts_with(TITLE_MAGIC) || self.payload.len() < TITLE_AT + TITLE_LEN {
            return None;
        }
        let raw = &self.payload[TITLE_AT..TITLE_AT + TITLE_LEN];
        let mut title = text::decode_declared(raw, TextEncoding::ShiftJis);
        title.text = text::to_half_width(&title.text);
        Some(title)
    }
}

fn unused_frame(frame: &mut [u8]) {
    frame.fill(0);
    frame[..4].fill(STATUS_UNUSABLE);
    Endian::Little.write_u16(&mut frame[LINK_AT..], NO_LINK);
}

impl Format for Ps1 {
    type Header = Ps1Header;
    type Meta = Ps1Meta;

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn check_signature(&self, store: &BlockStore) -> Result<()> {
        if !store.block(0).starts_with(MAGIC) {
            return Err(Error::mismatch("ps1", "header frame does not start with MC"));
        }
        Ok(())
    }

    fn decode_header(&self, store: &BlockStore, _warnings: &mut Vec<Warning>) -> Result<Ps1Header> {
        let block = store.block(0);
        let last = &block[(FRAMES - 1) * FRAME_LEN..];
        Ok(Ps1Header {
            write_test_frame: last == &block[..FRAME_LEN],
        })
    }

    fn encode_header(&self, header: &Ps1Header, store: &mut BlockStore) -> Result<()> {
        let block = store.block_mut(0);
        let magic = &mut block[..FRAME_LEN];
        magic.fill(0);
        magic[..MAGIC.len()].copy_from_slice(MAGIC);
        checksum::store(&FRAME_CHECKSUM, magic, Endian::Little);

        for frame in block[TOTAL_BLOCKS as usize * FRAME_LEN..].chunks_exact_mut(FRAME_LEN) {
            unused_frame(frame);
        }
        if header.write_test_frame {
            block.copy_within(..FRAME_LEN, (FRAMES - 1) * FRAME_LEN);
        }
        Ok(())
    }

    fn decode_entry(&self, slot: usize, raw: &[u8]) -> Result<DirectoryEntry<Ps1Meta>> {
        Ok(DirectoryEntry {
            slot,
            first_block: slot as u16 + 1,
            size_in_blocks: None,
            byte_len: Some(Endian::Little.read_u32(&raw[SIZE_AT..])),
            meta: Ps1Meta {
                file_name: text::decode_latin1(&raw[NAME_AT..NAME_AT + NAME_LEN]),
            },
        })
    }

    fn check_payload(&self, _meta: &Ps1Meta, payload: &[u8]) -> Result<()> {
        if !payload.starts_with(TITLE_MAGIC) {
            let found = payload.get(..2).map_or(0, |magic| Endian::Big.read_u16(magic));
            return Err(Error::UnsupportedField {
                field: "PS1 save block magic",
                value: found as u64,
            });
        }
        Ok(())
    }

    fn encode_entry(&self, meta: &Ps1Meta, placement: &Placement, out: &mut [u8]) -> Result<()> {
        // The status byte and link belong to the allocation table and are written with it.
        Endian::Little.write_u32(&mut out[SIZE_AT..], placement.byte_len);
        text::encode_latin1(&meta.file_name, &mut out[NAME_AT..NAME_AT + NAME_LEN], "PS1 file name")
    }

    fn display_name(&self, meta: &Ps1Meta) -> String {
        meta.file_name.clone()
    }
}
