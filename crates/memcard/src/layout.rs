//! Layout descriptors: the immutable parameter sets that drive the generic codec.
//!
//! A [`Layout`] is plain data. Every format module exposes a constructor that returns one, and the
//! engine modules ([`crate::block`], [`crate::fat`], [`crate::dir_entry`], [`crate::volume`]) read
//! nothing else to decide where structures live or how they are encoded.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    pub fn read_i16(self, buf: &[u8]) -> i16 {
        match self {
            Endian::Little => LittleEndian::read_i16(buf),
            Endian::Big => BigEndian::read_i16(buf),
        }
    }

    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(buf),
            Endian::Big => BigEndian::read_u64(buf),
        }
    }

    pub fn write_u16(self, buf: &mut [u8], value: u16) {
        match self {
            Endian::Little => LittleEndian::write_u16(buf, value),
            Endian::Big => BigEndian::write_u16(buf, value),
        }
    }

    pub fn write_i16(self, buf: &mut [u8], value: i16) {
        match self {
            Endian::Little => LittleEndian::write_i16(buf, value),
            Endian::Big => BigEndian::write_i16(buf, value),
        }
    }

    pub fn write_u32(self, buf: &mut [u8], value: u32) {
        match self {
            Endian::Little => LittleEndian::write_u32(buf, value),
            Endian::Big => BigEndian::write_u32(buf, value),
        }
    }

    pub fn write_u64(self, buf: &mut [u8], value: u64) {
        match self {
            Endian::Little => LittleEndian::write_u64(buf, value),
            Endian::Big => BigEndian::write_u64(buf, value),
        }
    }
}

/// Physical placement of a region's logical blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOrder {
    Forward,
    /// Logical block 0 sits at the highest physical index of the region.
    Reversed,
}

/// A run of consecutive physical blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub first: u16,
    pub count: u16,
    pub order: BlockOrder,
}

impl Region {
    pub const fn forward(first: u16, count: u16) -> Self {
        Self {
            first,
            count,
            order: BlockOrder::Forward,
        }
    }

    pub const fn reversed(first: u16, count: u16) -> Self {
        Self {
            first,
            count,
            order: BlockOrder::Reversed,
        }
    }

    /// One past the highest physical block.
    pub fn end(&self) -> u16 {
        self.first + self.count
    }

    pub fn contains(&self, block: u16) -> bool {
        block >= self.first && block < self.end()
    }

    /// Physical block holding logical block `logical` of this region.
    pub fn physical(&self, logical: u16) -> u16 {
        match self.order {
            BlockOrder::Forward => self.first + logical,
            BlockOrder::Reversed => self.end() - 1 - logical,
        }
    }

    /// Physical block numbers in logical order.
    pub fn blocks(&self) -> impl Iterator<Item = u16> + '_ {
        (0..self.count).map(move |logical| self.physical(logical))
    }
}

/// Which end of the free area new files are taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPolicy {
    /// Lowest free block first, each block linking to the next higher one.
    Ascending,
    /// Highest free block first, each block linking to the next lower one.
    Descending,
}

/// What a parse does with a save file whose chain or size is broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptFilePolicy {
    /// Abort the whole parse.
    Strict,
    /// Drop the file, keep the rest and record the drop on the volume.
    #[serde(alias = "skip")]
    SkipCorruptFile,
}

impl std::str::FromStr for CorruptFilePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(CorruptFilePolicy::Strict),
            "skip" | "skip_corrupt_file" => Ok(CorruptFilePolicy::SkipCorruptFile),
            other => Err(format!("unknown corrupt file policy `{other}`, expected strict or skip")),
        }
    }
}

/// Reserved link values of an allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinels {
    pub free: u16,
    pub end: u16,
    pub damaged: Option<u16>,
}

/// A per-slot status byte that overrides the link value (frame-style tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusByte {
    pub offset: usize,
    pub free_mask: u8,
    pub free: u8,
    pub unusable: u8,
    pub first: u8,
    pub middle: u8,
    pub last: u8,
}

/// Checksum stored inside a structure, with offsets relative to the structure's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumSpec {
    pub kind: ChecksumKind,
    pub start: usize,
    pub len: usize,
    pub stored_at: usize,
    /// A mismatch on a critical checksum invalidates the structure, otherwise it is only reported.
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub region: Region,
    pub checksum: Option<ChecksumSpec>,
}

/// How a directory slot is recognised as unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyRule {
    /// Every byte of the entry equals the value.
    AllBytes(u8),
    /// The first `len` bytes all equal `value`.
    Prefix { len: usize, value: u8 },
    /// The byte at `offset` differs from `value`.
    StatusNot { offset: usize, value: u8 },
}

impl EmptyRule {
    pub fn matches(&self, raw: &[u8]) -> bool {
        match *self {
            EmptyRule::AllBytes(value) => raw.iter().all(|&b| b == value),
            EmptyRule::Prefix { len, value } => raw.iter().take(len).all(|&b| b == value),
            EmptyRule::StatusNot { offset, value } => raw.get(offset) != Some(&value),
        }
    }
}

/// Where a file's directory record goes when building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotAssignment {
    /// Files fill slots 0, 1, 2, ... in order.
    Sequential,
    /// The slot index is the file's first block minus `base`.
    ByFirstBlock { base: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub primary: Region,
    pub backup: Option<Region>,
    pub entries_at: usize,
    pub entry_len: usize,
    pub max_entries: usize,
    pub empty: EmptyRule,
    pub empty_fill: u8,
    /// Fill applied to the whole region before entries are written.
    pub region_fill: Option<u8>,
    pub checksum: Option<ChecksumSpec>,
    /// Checksum carried by every slot, relative to the slot.
    pub entry_checksum: Option<ChecksumSpec>,
    pub update_counter: Option<usize>,
    pub slots: SlotAssignment,
    /// Entries record the payload length in bytes, so payloads need not fill their last block.
    pub stores_byte_len: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationLayout {
    pub primary: Region,
    pub backup: Option<Region>,
    pub table_at: usize,
    pub stride: usize,
    /// Offset of the 16-bit link value inside a slot.
    pub link_at: usize,
    /// Block described by slot 0.
    pub first_block: u16,
    pub slots: u16,
    /// Added to a stored link to obtain a block number.
    pub value_base: u16,
    pub sentinels: Sentinels,
    pub status: Option<StatusByte>,
    pub checksum: Option<ChecksumSpec>,
    pub update_counter: Option<usize>,
    pub free_count_at: Option<usize>,
    pub last_allocated_at: Option<usize>,
    /// Reserved regions whose blocks are chained in the table in logical order.
    pub reserved_chains: &'static [Region],
    pub region_fill: Option<u8>,
    /// Validate the table against the directory's chains when choosing between copies.
    pub consistency_check: bool,
}

/// Chains kept as explicit block numbers at the head of each file's data stream.
///
/// The stream starts at `list_at` inside the file's first block and continues at `data_at` inside
/// every listed block. The list itself is the first part of the stream, 16-bit block numbers
/// closed by `terminator`, and may spill into the blocks it lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockListLayout {
    pub list_at: usize,
    pub data_at: usize,
    pub terminator: u16,
    /// Tag a listed block must start with, compared over `data_at` bytes.
    pub data_tag: u8,
}

/// How a card links the blocks of one file together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStorage {
    /// A table with one link per block.
    Table(AllocationLayout),
    /// Each file lists its own blocks.
    BlockList(BlockListLayout),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub name: &'static str,
    pub block_size: usize,
    pub total_blocks: u16,
    pub endian: Endian,
    pub min_image_len: usize,
    pub header: HeaderLayout,
    pub directory: DirectoryLayout,
    pub chains: ChainStorage,
    pub data_area: Region,
    pub allocation_policy: AllocationPolicy,
    pub corrupt_file_policy: CorruptFilePolicy,
    /// Fill byte of a freshly built image.
    pub fill: u8,
}

impl Layout {
    pub fn image_len(&self) -> usize {
        self.block_size * self.total_blocks as usize
    }

    /// Blocks that can never hold file data.
    pub fn overhead_blocks(&self) -> u16 {
        self.total_blocks - self.data_area.count
    }

    pub fn region_len(&self, region: &Region) -> usize {
        self.block_size * region.count as usize
    }

    /// The allocation table, for cards that keep one.
    pub fn allocation(&self) -> Option<&AllocationLayout> {
        match &self.chains {
            ChainStorage::Table(alloc) => Some(alloc),
            ChainStorage::BlockList(_) => None,
        }
    }
}
