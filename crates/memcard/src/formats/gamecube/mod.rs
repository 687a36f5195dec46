//! GameCube memory cards.
//!
//! Block 0 is the header, blocks 1/2 the directory pair, 3/4 the allocation pair, and save data
//! starts at block 5. Everything on the card is big-endian.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::block::BlockStore;
use crate::checksum::{self, ChecksumKind};
use crate::dir_entry::{DirectoryEntry, Placement};
use crate::error::{Error, Result, Warning};
use crate::formats::Format;
use crate::layout::{
    AllocationLayout, AllocationPolicy, ChainStorage, ChecksumSpec, CorruptFilePolicy,
    DirectoryLayout, EmptyRule, Endian, HeaderLayout, Layout, Region, Sentinels, SlotAssignment,
};
use crate::text::{self, DecodedText, TextEncoding};
use crate::timestamp;
use crate::volume::SaveFile;

pub mod gci;

pub const BLOCK_SIZE: usize = 0x2000;
pub const ENTRY_LEN: usize = 0x40;
pub const SIZES_MEGABITS: [u16; 6] = [4, 8, 16, 32, 64, 128];
const BLOCKS_PER_MEGABIT: u16 = 16;
const COMMENT_LEN: usize = 32;

const HEADER_CHECKSUM: ChecksumSpec = ChecksumSpec {
    kind: ChecksumKind::AdditiveInverse16,
    start: 0,
    len: 0x1FC,
    stored_at: 0x1FC,
    critical: true,
};

fn layout_for(megabits: u16) -> Layout {
    let total_blocks = megabits * BLOCKS_PER_MEGABIT;
    Layout {
        name: "gamecube",
        block_size: BLOCK_SIZE,
        total_blocks,
        endian: Endian::Big,
        min_image_len: BLOCK_SIZE * total_blocks as usize,
        header: HeaderLayout {
            region: Region::forward(0, 1),
            checksum: Some(HEADER_CHECKSUM),
        },
        directory: DirectoryLayout {
            primary: Region::forward(1, 1),
            backup: Some(Region::forward(2, 1)),
            entries_at: 0,
            entry_len: ENTRY_LEN,
            max_entries: 127,
            empty: EmptyRule::Prefix { len: 4, value: 0xFF },
            empty_fill: 0xFF,
            region_fill: Some(0xFF),
            checksum: Some(ChecksumSpec {
                kind: ChecksumKind::AdditiveInverse16,
                start: 0,
                len: 0x1FFC,
                stored_at: 0x1FFC,
                critical: true,
            }),
            entry_checksum: None,
            update_counter: Some(0x1FFA),
            slots: SlotAssignment::Sequential,
            stores_byte_len: false,
        },
        chains: ChainStorage::Table(AllocationLayout {
            primary: Region::forward(3, 1),
            backup: Some(Region::forward(4, 1)),
            table_at: 0x0A,
            stride: 2,
            link_at: 0,
            first_block: 5,
            slots: 0xFFB,
            value_base: 0,
            sentinels: Sentinels {
                free: 0x0000,
                end: 0xFFFF,
                damaged: None,
            },
            status: None,
            checksum: Some(ChecksumSpec {
                kind: ChecksumKind::AdditiveInverse16,
                start: 0x04,
                len: 0x1FFC,
                stored_at: 0x00,
                critical: true,
            }),
            update_counter: Some(0x04),
            free_count_at: Some(0x06),
            last_allocated_at: Some(0x08),
            reserved_chains: &[],
            region_fill: Some(0x00),
            consistency_check: false,
        }),
        data_area: Region::forward(5, total_blocks - 5),
        allocation_policy: AllocationPolicy::Ascending,
        corrupt_file_policy: CorruptFilePolicy::Strict,
        fill: 0xFF,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCube {
    megabits: u16,
    layout: Layout,
}

impl Default for GameCube {
    fn default() -> Self {
        Self {
            megabits: 16,
            layout: layout_for(16),
        }
    }
}

impl GameCube {
    pub fn new(megabits: u16) -> Result<Self> {
        if !SIZES_MEGABITS.contains(&megabits) {
            return Err(Error::UnsupportedField {
                field: "card size in megabits",
                value: megabits as u64,
            });
        }
        Ok(Self {
            megabits,
            layout: layout_for(megabits),
        })
    }

    /// Picks the card size from an image's length.
    pub fn for_image(image: &[u8]) -> Result<Self> {
        SIZES_MEGABITS
            .into_iter()
            .find(|&mb| image.len() == mb as usize * BLOCKS_PER_MEGABIT as usize * BLOCK_SIZE)
            .map(|mb| Self {
                megabits: mb,
                layout: layout_for(mb),
            })
            .ok_or_else(|| {
                Error::mismatch("gamecube", format!("{} bytes is not a card size", image.len()))
            })
    }

    pub fn megabits(&self) -> u16 {
        self.megabits
    }
}

/// Whether an image has a card size and a header that agrees with it.
pub fn looks_like(image: &[u8]) -> bool {
    let Ok(card) = GameCube::for_image(image) else {
        return false;
    };
    Endian::Big.read_u16(&image[0x22..]) == card.megabits
        && checksum::verify(&HEADER_CHECKSUM, &image[..BLOCK_SIZE], Endian::Big)
}

fn lcg(rand: u64) -> u64 {
    rand.wrapping_mul(0x41C6_4E6D).wrapping_add(0x3039) >> 16
}

/// The card serial written at format time: the flash ID mixed with a generator seeded by the
/// format time.
pub fn serial_from_flash_id(flash_id: &[u8; 12], format_time: u64) -> [u8; 12] {
    let mut serial = [0u8; 12];
    let mut rand = format_time;
    for (out, &id) in serial.iter_mut().zip(flash_id) {
        rand = lcg(rand);
        *out = id.wrapping_add(rand as u8);
        rand = lcg(rand) & 0x7FFF;
    }
    serial
}

pub fn flash_id_from_serial(serial: &[u8; 12], format_time: u64) -> [u8; 12] {
    let mut flash_id = [0u8; 12];
    let mut rand = format_time;
    for (out, &byte) in flash_id.iter_mut().zip(serial) {
        rand = lcg(rand);
        *out = byte.wrapping_sub(rand as u8);
        rand = lcg(rand) & 0x7FFF;
    }
    flash_id
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCubeHeader {
    #[serde(default)]
    pub serial: [u8; 12],
    /// Format time in timer ticks since 2000-01-01.
    #[serde(default)]
    pub format_time: u64,
    #[serde(default)]
    pub rtc_bias: u32,
    #[serde(default)]
    pub language: u32,
    #[serde(default)]
    pub vi_dtv_status: u32,
    #[serde(default)]
    pub slot: u16,
    /// 0 for ASCII, 1 for Shift-JIS.
    #[serde(default)]
    pub encoding: u16,
}

impl GameCubeHeader {
    pub fn flash_id(&self) -> [u8; 12] {
        flash_id_from_serial(&self.serial, self.format_time)
    }

    pub fn set_flash_id(&mut self, flash_id: &[u8; 12]) {
        self.serial = serial_from_flash_id(flash_id, self.format_time);
    }

    /// The encoding the card declares for comments, `None` for codes other than 0 and 1.
    pub fn text_encoding(&self) -> Option<TextEncoding> {
        match self.encoding {
            0 => Some(TextEncoding::Ascii),
            1 => Some(TextEncoding::ShiftJis),
            _ => None,
        }
    }

    pub fn formatted(&self) -> NaiveDateTime {
        timestamp::from_os_ticks(self.format_time)
    }

    fn leading_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[..12].copy_from_slice(&self.serial);
        Endian::Big.write_u64(&mut bytes[0x0C..], self.format_time);
        Endian::Big.write_u32(&mut bytes[0x14..], self.rtc_bias);
        Endian::Big.write_u32(&mut bytes[0x18..], self.language);
        Endian::Big.write_u32(&mut bytes[0x1C..], self.vi_dtv_status);
        bytes
    }

    /// The two words some games bind their saves to, folded from the first 32 header bytes.
    pub fn card_serials(&self) -> (u32, u32) {
        let bytes = self.leading_bytes();
        bytes.chunks_exact(8).fold((0, 0), |(a, b), chunk| {
            (
                a ^ Endian::Big.read_u32(chunk),
                b ^ Endian::Big.read_u32(&chunk[4..]),
            )
        })
    }
}

fn region_name(code: char) -> &'static str {
    match code {
        'J' => "Japan",
        'E' => "North America",
        'P' => "Europe",
        'D' => "Germany",
        'F' => "France",
        'H' => "Netherlands",
        'I' => "Italy",
        'S' => "Spain",
        'K' | 'U' => "Korea",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCubeMeta {
    pub game_code: String,
    pub publisher: String,
    #[serde(default)]
    pub banner_flags: u8,
    pub file_name: String,
    #[serde(with = "crate::date_format")]
    pub modified: NaiveDateTime,
    #[serde(default)]
    pub icon_offset: u32,
    #[serde(default)]
    pub icon_format: u16,
    #[serde(default)]
    pub icon_speed: u16,
    #[serde(default)]
    pub permissions: u8,
    #[serde(default)]
    pub copy_counter: u8,
    #[serde(default)]
    pub comment_offset: u32,
}

impl GameCubeMeta {
    pub fn region(&self) -> &'static str {
        self.game_code.chars().nth(3).map_or("Unknown", region_name)
    }
}

impl SaveFile<GameCubeMeta> {
    /// The two 32-byte comments stored inside the payload at the entry's comment offset.
    ///
    /// They are decoded in the card's declared encoding. Without one, as for a save outside any
    /// card, the encoding is guessed from the bytes.
    pub fn comments(&self, encoding: Option<TextEncoding>) -> Vec<DecodedText> {
        let start = self.meta.comment_offset as usize;
        (0..2)
            .filter_map(|i| {
                let at = start + i * COMMENT_LEN;
                self.payload.get(at..at + COMMENT_LEN)
            })
            .map(|raw| match encoding {
                Some(encoding) => text::decode_declared(raw, encoding),
                None => text::decode_with_heuristic(raw),
            })
            .collect()
    }
}

pub(crate) fn decode_entry_fields(slot: usize, raw: &[u8]) -> DirectoryEntry<GameCubeMeta> {
    let be = Endian::Big;
    DirectoryEntry {
        slot,
        first_block: be.read_u16(&raw[0x36..]),
        size_in_blocks: Some(be.read_u16(&raw[0x38..])),
        byte_len: None,
        meta: GameCubeMeta {
            game_code: text::decode_latin1(&raw[0x00..0x04]),
            publisher: text::decode_latin1(&raw[0x04..0x06]),
            banner_flags: raw[0x07],
            file_name: text::decode_latin1(&raw[0x08..0x28]),
            modified: timestamp::from_seconds_since_2000(be.read_u32(&raw[0x28..])),
            icon_offset: be.read_u32(&raw[0x2C..]),
            icon_format: be.read_u16(&raw[0x30..]),
            icon_speed: be.read_u16(&raw[0x32..]),
            permissions: raw[0x34],
            copy_counter: raw[0x35],
            comment_offset: be.read_u32(&raw[0x3C..]),
        },
    }
}

pub(crate) fn encode_entry_fields(
    meta: &GameCubeMeta,
    placement: &Placement,
    out: &mut [u8],
) -> Result<()> {
    let be = Endian::Big;
    text::encode_latin1(&meta.game_code, &mut out[0x00..0x04], "game code")?;
    text::encode_latin1(&meta.publisher, &mut out[0x04..0x06], "publisher code")?;
    out[0x06] = 0xFF;
    out[0x07] = meta.banner_flags;
    text::encode_latin1(&meta.file_name, &mut out[0x08..0x28], "file name")?;
    be.write_u32(&mut out[0x28..], timestamp::to_seconds_since_2000(&meta.modified)?);
    be.write_u32(&mut out[0x2C..], meta.icon_offset);
    be.write_u16(&mut out[0x30..], meta.icon_format);
    be.write_u16(&mut out[0x32..], meta.icon_speed);
    out[0x34] = meta.permissions;
    out[0x35] = meta.copy_counter;
    be.write_u16(&mut out[0x36..], placement.first_block);
    be.write_u16(&mut out[0x38..], placement.size_in_blocks);
    be.write_u16(&mut out[0x3A..], 0xFFFF);
    be.write_u32(&mut out[0x3C..], meta.comment_offset);
    Ok(())
}

impl Format for GameCube {
    type Header = GameCubeHeader;
    type Meta = GameCubeMeta;

    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn layout_mut(&mut self) -> &mut Layout {
        &mut self.layout
    }

    fn check_signature(&self, store: &BlockStore) -> Result<()> {
        let size = Endian::Big.read_u16(&store.block(0)[0x22..]);
        if size != self.megabits {
            return Err(Error::mismatch(
                "gamecube",
                format!("header says {size} Mbit, image holds {} Mbit", self.megabits),
            ));
        }
        Ok(())
    }

    fn decode_header(&self, store: &BlockStore, _warnings: &mut Vec<Warning>) -> Result<GameCubeHeader> {
        let block = store.block(0);
        let be = Endian::Big;
        let mut serial = [0u8; 12];
        serial.copy_from_slice(&block[..12]);
        Ok(GameCubeHeader {
            serial,
            format_time: be.read_u64(&block[0x0C..]),
            rtc_bias: be.read_u32(&block[0x14..]),
            language: be.read_u32(&block[0x18..]),
            vi_dtv_status: be.read_u32(&block[0x1C..]),
            slot: be.read_u16(&block[0x20..]),
            encoding: be.read_u16(&block[0x24..]),
        })
    }

    fn encode_header(&self, header: &GameCubeHeader, store: &mut BlockStore) -> Result<()> {
        let block = store.block_mut(0);
        let be = Endian::Big;
        block.fill(0xFF);
        block[..0x20].copy_from_slice(&header.leading_bytes());
        be.write_u16(&mut block[0x20..], header.slot);
        be.write_u16(&mut block[0x22..], self.megabits);
        be.write_u16(&mut block[0x24..], header.encoding);
        Ok(())
    }

    fn decode_entry(&self, slot: usize, raw: &[u8]) -> Result<DirectoryEntry<GameCubeMeta>> {
        Ok(decode_entry_fields(slot, raw))
    }

    fn encode_entry(&self, meta: &GameCubeMeta, placement: &Placement, out: &mut [u8]) -> Result<()> {
        encode_entry_fields(meta, placement, out)
    }

    fn display_name(&self, meta: &GameCubeMeta) -> String {
        format!("{}{}-{}", meta.game_code, meta.publisher, meta.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_id_survives_serial_round_trip() {
        let flash_id = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x10, 0x32, 0x54, 0x76];
        let mut header = GameCubeHeader {
            format_time: 0x0000_0F3C_4B2A_1C00,
            ..Default::default()
        };
        header.set_flash_id(&flash_id);
        assert_ne!(header.serial, flash_id);
        assert_eq!(header.flash_id(), flash_id);
    }

    #[test]
    fn card_serials_fold_leading_words() {
        let header = GameCubeHeader {
            serial: [0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 4],
            ..Default::default()
        };
        assert_eq!(header.card_serials(), (1 ^ 4, 2), "serial words land at 0x00, 0x04, 0x08");
        let header = GameCubeHeader {
            language: 0x10,
            rtc_bias: 0x20,
            ..header
        };
        assert_eq!(
            header.card_serials(),
            (1 ^ 4 ^ 0x10, 2 ^ 0x20),
            "language is at 0x18 and RTC bias at 0x14"
        );
    }

    fn smash_meta() -> GameCubeMeta {
        GameCubeMeta {
            game_code: "GALP".into(),
            publisher: "01".into(),
            banner_flags: 0,
            file_name: "SuperSmashBros".into(),
            modified: timestamp::epoch_2000(),
            icon_offset: 0,
            icon_format: 0,
            icon_speed: 0,
            permissions: 0,
            copy_counter: 0,
            comment_offset: 0,
        }
    }

    #[test]
    fn region_follows_fourth_game_code_character() {
        assert_eq!(smash_meta().region(), "Europe");
    }

    #[test]
    fn comments_use_the_declared_encoding() {
        let mut payload = vec![0u8; BLOCK_SIZE];
        payload[..2].copy_from_slice(&[0x82, 0x60]);
        payload[32..37].copy_from_slice(b"Melee");
        let file = SaveFile::new(smash_meta(), payload);

        let header = GameCubeHeader {
            encoding: 1,
            ..GameCubeHeader::default()
        };
        let comments = file.comments(header.text_encoding());
        assert_eq!(comments[0].text, "\u{FF21}", "full-width A in Shift-JIS");
        assert_eq!(comments[0].encoding, TextEncoding::ShiftJis);
        assert_eq!(comments[1].text, "Melee");

        let ascii = file.comments(Some(TextEncoding::Ascii));
        assert_eq!(ascii[0].text, "\u{82}`", "bytes kept as declared");
        assert_eq!(ascii[0].encoding, TextEncoding::Ascii);
        assert_eq!(
            GameCubeHeader {
                encoding: 7,
                ..GameCubeHeader::default()
            }
            .text_encoding(),
            None
        );
    }

    #[test]
    fn only_listed_sizes_are_accepted() {
        assert!(GameCube::new(12).is_err());
        let card = GameCube::new(128).expect("valid size");
        assert_eq!(card.layout().total_blocks, 2048);
        assert_eq!(GameCube::default().layout().total_blocks, 256);
    }
}
