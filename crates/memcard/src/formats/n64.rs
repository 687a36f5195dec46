//! N64 Controller Pak.
//!
//! 128 pages of 256 bytes: the ID area in page 0, the index table in page 1 with its backup in
//! page 2, the note table in pages 3 and 4, and save data in pages 5 to 127.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::block::BlockStore;
use crate::checksum::{self, ChecksumKind, ChecksumValue};
use crate::dir_entry::{DirectoryEntry, Placement};
use crate::error::{Error, Result, Warning, WarningKind};
use crate::formats::Format;
use crate::layout::{
    AllocationLayout, AllocationPolicy, ChainStorage, ChecksumSpec, CorruptFilePolicy,
    DirectoryLayout, EmptyRule, Endian, HeaderLayout, Layout, Region, Sentinels, SlotAssignment,
};
use crate::text;

pub const PAGE_SIZE: usize = 256;
pub const TOTAL_PAGES: u16 = 128;
const FIRST_DATA_PAGE: u16 = 5;
const ID_BLOCK_LEN: usize = 32;
const ID_COPIES: [usize; 4] = [0x20, 0x60, 0x80, 0xC0];
const ID_SUM_LEN: usize = 28;
const ID_CHECKSUM: ChecksumKind = ChecksumKind::AdditiveComplement16 { base: 0xFFF2 };
/// Some writers store the second ID sum with these bits flipped.
const ID_QUIRK_MASK: u16 = 0x0C;
const NOTE_OCCUPIED: u8 = 0x02;
const INDEX_PAGE: u16 = 1;
const INDEX_STOP: u16 = 0x0001;

fn pak_layout() -> Layout {
    Layout {
        name: "n64",
        block_size: PAGE_SIZE,
        total_blocks: TOTAL_PAGES,
        endian: Endian::Big,
        min_image_len: PAGE_SIZE * TOTAL_PAGES as usize,
        header: HeaderLayout {
            region: Region::forward(0, 1),
            checksum: None,
        },
        directory: DirectoryLayout {
            primary: Region::forward(3, 2),
            backup: None,
            entries_at: 0,
            entry_len: 32,
            max_entries: 16,
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
            primary: Region::forward(1, 1),
            backup: Some(Region::forward(2, 1)),
            table_at: FIRST_DATA_PAGE as usize * 2,
            stride: 2,
            link_at: 0,
            first_block: FIRST_DATA_PAGE,
            slots: TOTAL_PAGES - FIRST_DATA_PAGE,
            value_base: 0,
            sentinels: Sentinels {
                free: 0x0003,
                end: 0x0001,
                damaged: None,
            },
            status: None,
            checksum: Some(ChecksumSpec {
                kind: ChecksumKind::Sum8,
                start: FIRST_DATA_PAGE as usize * 2,
                len: PAGE_SIZE - FIRST_DATA_PAGE as usize * 2,
                stored_at: 1,
                critical: false,
            }),
            update_counter: None,
            free_count_at: None,
            last_allocated_at: None,
            reserved_chains: &[],
            region_fill: Some(0),
            consistency_check: true,
        }),
        data_area: Region::forward(FIRST_DATA_PAGE, TOTAL_PAGES - FIRST_DATA_PAGE),
        allocation_policy: AllocationPolicy::Ascending,
        corrupt_file_policy: CorruptFilePolicy::Strict,
        fill: 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct N64 {
    layout: Layout,
}

impl Default for N64 {
    fn default() -> Self {
        Self {
            layout: pak_layout(),
        }
    }
}

pub fn looks_like(image: &[u8]) -> bool {
    image.len() == PAGE_SIZE * TOTAL_PAGES as usize
}

/// The first page: a 32-byte label and the ID block repeated four times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct N64Header {
    #[serde(default)]
    pub label: [u8; 32],
    /// The checksummed part of the ID block.
    pub id: [u8; ID_SUM_LEN],
}

impl Default for N64Header {
    fn default() -> Self {
        let mut id = [0u8; ID_SUM_LEN];
        // Device type: controller pak. Bank size: one bank.
        id[25] = 0x01;
        id[26] = 0x01;
        Self {
            label: [0u8; 32],
            id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdCopy {
    Valid,
    Quirk,
    Invalid,
}

fn check_id_copy(block: &[u8]) -> IdCopy {
    let ChecksumValue::Pair(sum_a, sum_b) =
        checksum::compute(ID_CHECKSUM, &block[..ID_SUM_LEN], Endian::Big)
    else {
        return IdCopy::Invalid;
    };
    let stored_a = Endian::Big.read_u16(&block[ID_SUM_LEN..]);
    let stored_b = Endian::Big.read_u16(&block[ID_SUM_LEN + 2..]);
    if stored_a != sum_a {
        IdCopy::Invalid
    } else if stored_b == sum_b {
        IdCopy::Valid
    } else if stored_b ^ ID_QUIRK_MASK == sum_b {
        IdCopy::Quirk
    } else {
        IdCopy::Invalid
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct N64Meta {
    pub game_code: String,
    pub publisher: String,
    pub name: String,
    #[serde(default)]
    pub extension: String,
}

impl N64Meta {
    /// Game and publisher codes the way code databases key them: an all-zero code gets its low
    /// bit set and NULs read as `-`. Wave Race 64's publisher code is the one that needs it.
    pub fn lookup_codes(&self) -> (String, String) {
        (lookup_code(&self.game_code), lookup_code(&self.publisher))
    }

    /// Region named by the fourth character of the game code.
    pub fn region(&self) -> &'static str {
        match self.game_code.chars().nth(3) {
            Some('A') => "All regions",
            Some('B') => "Brazil",
            Some('C') => "China",
            Some('D') => "Germany",
            Some('E') => "North America",
            Some('F') => "France",
            Some('G') => "Gateway 64 (NTSC)",
            Some('H') => "Netherlands",
            Some('I') => "Italy",
            Some('J') => "Japan",
            Some('K') => "South Korea",
            Some('L') => "Gateway 64 (PAL)",
            Some('P' | 'X' | 'Y' | 'Z') => "Europe",
            Some('R') => "Russia",
            Some('S') => "Spain",
            Some('U') => "Australia",
            Some('W') => "Taiwan",
            _ => "Unknown region",
        }
    }
}

fn lookup_code(code: &str) -> String {
    let mut bytes: Vec<u8> = code.chars().map(|c| c as u32 as u8).collect();
    if bytes.iter().all(|&b| b == 0) {
        if let Some(last) = bytes.last_mut() {
            *last |= 1;
        }
    }
    bytes
        .into_iter()
        .map(|b| if b == 0 { '-' } else { b as char })
        .collect()
}

impl Format for N64 {
    type Header = N64Header;
    type Meta = N64Meta;

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn decode_header(&self, store: &BlockStore, warnings: &mut Vec<Warning>) -> Result<N64Header> {
        let page = store.block(0);
        let mut chosen = None;
        for at in ID_COPIES {
            let block = &page[at..at + ID_BLOCK_LEN];
            match check_id_copy(block) {
                IdCopy::Valid => {
                    chosen = Some(block);
                    break;
                }
                IdCopy::Quirk => {
                    let warning = Warning::new(
                        format!("n64 id area copy at {at:#x}"),
                        WarningKind::KnownWriterQuirk,
                    );
                    warn!("{warning}");
                    warnings.push(warning);
                    chosen = Some(block);
                    break;
                }
                IdCopy::Invalid => continue,
            }
        }
        let block = chosen.ok_or(Error::VolumeCorrupted { structure: "id area" })?;
        let mut header = N64Header::default();
        header.label.copy_from_slice(&page[..32]);
        header.id.copy_from_slice(&block[..ID_SUM_LEN]);
        Ok(header)
    }

    fn encode_header(&self, header: &N64Header, store: &mut BlockStore) -> Result<()> {
        let mut block = [0u8; ID_BLOCK_LEN];
        block[..ID_SUM_LEN].copy_from_slice(&header.id);
        checksum::write_value(
            checksum::compute(ID_CHECKSUM, &header.id, Endian::Big),
            &mut block[ID_SUM_LEN..],
            Endian::Big,
        );
        let page = store.block_mut(0);
        page.fill(0);
        page[..32].copy_from_slice(&header.label);
        for at in ID_COPIES {
            page[at..at + ID_BLOCK_LEN].copy_from_slice(&block);
        }
        Ok(())
    }

    fn entry_is_empty(&self, raw: &[u8]) -> bool {
        let start = Endian::Big.read_u16(&raw[6..]);
        let reserved = Endian::Big.read_u16(&raw[10..]);
        !(FIRST_DATA_PAGE..TOTAL_PAGES).contains(&start) || reserved != 0
    }

    /// A note also needs its first page to link to a data page or end the note in the index table.
    fn slot_in_use(&self, raw: &[u8], store: &BlockStore) -> bool {
        let start = Endian::Big.read_u16(&raw[6..]) as usize;
        let next = Endian::Big.read_u16(&store.block(INDEX_PAGE)[start * 2..]);
        next == INDEX_STOP || (FIRST_DATA_PAGE..TOTAL_PAGES).contains(&next)
    }

    fn decode_entry(&self, slot: usize, raw: &[u8]) -> Result<DirectoryEntry<N64Meta>> {
        Ok(DirectoryEntry {
            slot,
            first_block: Endian::Big.read_u16(&raw[6..]),
            size_in_blocks: None,
            byte_len: None,
            meta: N64Meta {
                game_code: text::decode_latin1_fixed(&raw[0..4]),
                publisher: text::decode_latin1_fixed(&raw[4..6]),
                name: text::decode_n64(&raw[16..32]),
                extension: text::decode_n64(&raw[12..16]),
            },
        })
    }

    fn encode_entry(&self, meta: &N64Meta, placement: &Placement, out: &mut [u8]) -> Result<()> {
        out.fill(0);
        text::encode_latin1(&meta.game_code, &mut out[0..4], "game code")?;
        text::encode_latin1(&meta.publisher, &mut out[4..6], "publisher code")?;
        Endian::Big.write_u16(&mut out[6..], placement.first_block);
        out[8] = NOTE_OCCUPIED;
        text::encode_n64(&meta.extension, &mut out[12..16], "note extension")?;
        text::encode_n64(&meta.name, &mut out[16..32], "note name")?;
        Ok(())
    }

    fn display_name(&self, meta: &N64Meta) -> String {
        if meta.extension.is_empty() {
            meta.name.clone()
        } else {
            format!("{}.{}", meta.name, meta.extension)
        }
    }
}
