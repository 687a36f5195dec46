//! Single-save containers: the `.VMI`/`.VMS` pair and `.DCI`.
//!
//! A `.VMS` file is the bare payload and the `.VMI` next to it carries the directory fields. A
//! `.DCI` is the 32-byte directory entry followed by the payload.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::{Dreamcast, DreamcastMeta, VmuFileType, BLOCK_SIZE, ENTRY_LEN};
use crate::assembler::blocks_needed;
use crate::bcd::DayOfWeekPolarity;
use crate::dir_entry::Placement;
use crate::error::{Error, Result};
use crate::formats::Format;
use crate::layout::Endian;
use crate::text;
use crate::volume::SaveFile;

pub const VMI_LEN: usize = 0x6C;
const DESCRIPTION: std::ops::Range<usize> = 0x04..0x24;
const COPYRIGHT: std::ops::Range<usize> = 0x24..0x44;
const TIMESTAMP_AT: usize = 0x44;
const VERSION_AT: usize = 0x4C;
const FILE_NUMBER_AT: usize = 0x4E;
const RESOURCE_NAME: std::ops::Range<usize> = 0x50..0x58;
const FILE_NAME: std::ops::Range<usize> = 0x58..0x64;
const MODE_AT: usize = 0x64;
const SIZE_AT: usize = 0x68;
const CHECKSUM_MASK: &[u8; 4] = b"SEGA";

const MODE_COPY_PROTECTED: u16 = 0x01;
const MODE_GAME: u16 = 0x02;

/// The VMS header of a save sits in its first block, a mini-game's in its second.
const GAME_HEADER_OFFSET: u16 = 1;
/// Short comment at the start of the VMS header.
const VMS_COMMENT_LEN: usize = 16;

/// `.VMI` fields with no counterpart in the card's directory entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmiInfo {
    pub description: String,
    pub copyright: String,
    /// Name of the `.VMS` file without its extension.
    pub resource_name: String,
}

impl VmiInfo {
    /// Fields for a save leaving a card: the VMS header's short comment as the description and
    /// the first eight characters of the file name as the resource name.
    pub fn for_file(file: &SaveFile<DreamcastMeta>) -> Self {
        let at = file.meta.header_offset as usize * BLOCK_SIZE;
        let description = file
            .payload
            .get(at..at + VMS_COMMENT_LEN)
            .map(text::decode_shift_jis)
            .unwrap_or_default();
        Self {
            description: description.trim_end().to_string(),
            copyright: String::new(),
            resource_name: file.meta.file_name.chars().take(RESOURCE_NAME.len()).collect(),
        }
    }
}

/// Resource name bytes masked with `SEGA`, read left to right.
fn vmi_checksum(resource_name: &str) -> u32 {
    let name = resource_name.as_bytes();
    CHECKSUM_MASK
        .iter()
        .enumerate()
        .fold(0u32, |sum, (i, mask)| (sum << 8) | (name.get(i).copied().unwrap_or(0) & mask) as u32)
}

fn encode_vmi_timestamp(date: &NaiveDateTime, out: &mut [u8]) -> Result<()> {
    let year = u16::try_from(date.year()).map_err(|_| Error::UnsupportedField {
        field: "VMI year",
        value: date.year() as u64,
    })?;
    Endian::Little.write_u16(out, year);
    out[2] = date.month() as u8;
    out[3] = date.day() as u8;
    out[4] = date.hour() as u8;
    out[5] = date.minute() as u8;
    out[6] = date.second() as u8;
    out[7] = DayOfWeekPolarity::SundayZero.weekday_byte(date);
    Ok(())
}

/// Writers disagree on the weekday, so either Sunday or Monday may be day zero.
fn decode_vmi_timestamp(raw: &[u8]) -> Result<NaiveDateTime> {
    let year = Endian::Little.read_u16(raw) as i32;
    let date = NaiveDate::from_ymd_opt(year, raw[2] as u32, raw[3] as u32)
        .and_then(|d| d.and_hms_opt(raw[4] as u32, raw[5] as u32, raw[6] as u32))
        .ok_or(Error::UnsupportedField {
            field: "VMI timestamp",
            value: Endian::Little.read_u64(raw),
        })?;
    let consistent = [DayOfWeekPolarity::SundayZero, DayOfWeekPolarity::MondayZero]
        .iter()
        .any(|polarity| polarity.weekday_byte(&date) == raw[7]);
    if !consistent {
        return Err(Error::UnsupportedField {
            field: "VMI day of week",
            value: raw[7] as u64,
        });
    }
    Ok(date)
}

/// Builds the `.VMI` for a save. The `.VMS` is the payload as is.
pub fn write_vmi(file: &SaveFile<DreamcastMeta>, info: &VmiInfo) -> Result<Vec<u8>> {
    let le = Endian::Little;
    let mut vmi = vec![0u8; VMI_LEN];
    Endian::Big.write_u32(&mut vmi, vmi_checksum(&info.resource_name));
    text::encode_shift_jis(&info.description, &mut vmi[DESCRIPTION], "VMI description")?;
    text::encode_shift_jis(&info.copyright, &mut vmi[COPYRIGHT], "VMI copyright")?;
    encode_vmi_timestamp(&file.meta.created, &mut vmi[TIMESTAMP_AT..TIMESTAMP_AT + 8])?;
    le.write_u16(&mut vmi[VERSION_AT..], 0);
    le.write_u16(&mut vmi[FILE_NUMBER_AT..], 1);
    text::encode_shift_jis(&info.resource_name, &mut vmi[RESOURCE_NAME], "VMI resource name")?;
    text::encode_latin1(&file.meta.file_name, &mut vmi[FILE_NAME], "VMU file name")?;

    let mut mode = 0;
    if file.meta.copy_protected {
        mode |= MODE_COPY_PROTECTED;
    }
    if file.meta.file_type == VmuFileType::Game {
        mode |= MODE_GAME;
    }
    le.write_u16(&mut vmi[MODE_AT..], mode);
    let size = u32::try_from(file.payload.len()).map_err(|_| Error::UnsupportedField {
        field: "VMS size",
        value: file.payload.len() as u64,
    })?;
    le.write_u32(&mut vmi[SIZE_AT..], size);
    Ok(vmi)
}

pub fn read_vmi_vms(vmi: &[u8], vms: &[u8]) -> Result<(SaveFile<DreamcastMeta>, VmiInfo)> {
    if vmi.len() != VMI_LEN {
        return Err(Error::SizeMismatch {
            what: "VMI header",
            expected: VMI_LEN,
            actual: vmi.len(),
        });
    }
    let le = Endian::Little;
    let size = le.read_u32(&vmi[SIZE_AT..]) as usize;
    if size != vms.len() {
        return Err(Error::SizeMismatch {
            what: "VMS file",
            expected: size,
            actual: vms.len(),
        });
    }
    let mode = le.read_u16(&vmi[MODE_AT..]);
    let game = mode & MODE_GAME != 0;
    let meta = DreamcastMeta {
        file_type: if game { VmuFileType::Game } else { VmuFileType::Data },
        copy_protected: mode & MODE_COPY_PROTECTED != 0,
        file_name: text::decode_latin1(&vmi[FILE_NAME]),
        created: decode_vmi_timestamp(&vmi[TIMESTAMP_AT..TIMESTAMP_AT + 8])?,
        header_offset: if game { GAME_HEADER_OFFSET } else { 0 },
    };
    let info = VmiInfo {
        description: text::decode_shift_jis(&vmi[DESCRIPTION]),
        copyright: text::decode_shift_jis(&vmi[COPYRIGHT]),
        resource_name: text::decode_shift_jis(&vmi[RESOURCE_NAME]),
    };
    Ok((SaveFile::new(meta, vms.to_vec()), info))
}

/// The directory entry records first block 0, since the save sits on no card.
pub fn write_dci(file: &SaveFile<DreamcastMeta>) -> Result<Vec<u8>> {
    let blocks = blocks_needed(file.payload.len(), BLOCK_SIZE);
    if file.payload.is_empty() || file.payload.len() % BLOCK_SIZE != 0 {
        return Err(Error::SizeMismatch {
            what: "DCI payload",
            expected: blocks.max(1) * BLOCK_SIZE,
            actual: file.payload.len(),
        });
    }
    let mut out = vec![0u8; ENTRY_LEN];
    let placement = Placement {
        first_block: 0,
        size_in_blocks: blocks as u16,
        byte_len: file.payload.len() as u32,
    };
    Dreamcast::default().encode_entry(&file.meta, &placement, &mut out)?;
    out.extend_from_slice(&file.payload);
    Ok(out)
}

pub fn read_dci(bytes: &[u8]) -> Result<SaveFile<DreamcastMeta>> {
    if bytes.len() < ENTRY_LEN {
        return Err(Error::SizeMismatch {
            what: "DCI entry",
            expected: ENTRY_LEN,
            actual: bytes.len(),
        });
    }
    let (raw, payload) = bytes.split_at(ENTRY_LEN);
    let entry = Dreamcast::default().decode_entry(0, raw)?;
    let declared = entry.size_in_blocks.unwrap_or_default() as usize * BLOCK_SIZE;
    if declared != payload.len() {
        return Err(Error::SizeMismatch {
            what: "DCI payload",
            expected: declared,
            actual: payload.len(),
        });
    }
    Ok(SaveFile::new(entry.meta, payload.to_vec()))
}
