//! The `.BUP` single-save container.
//!
//! A 64-byte header repeats the fields of the save's record, followed by the raw save data.

use super::{decode_meta, SaturnMeta};
use crate::error::{Error, Result};
use crate::layout::Endian;
use crate::text;
use crate::timestamp;
use crate::volume::SaveFile;

const MAGIC: &[u8; 4] = b"Vmem";
pub const HEADER_LEN: usize = 0x40;
const SAVE_ID_AT: usize = 0x04;
const NAME: std::ops::Range<usize> = 0x10..0x1B;
const COMMENT: std::ops::Range<usize> = 0x1C..0x26;
const LANGUAGE_AT: usize = 0x27;
const DATE_AT: usize = 0x28;
const SIZE_AT: usize = 0x2C;
const DATE_REPEATED_AT: usize = 0x34;

pub fn read_bup(bytes: &[u8]) -> Result<SaveFile<SaturnMeta>> {
    if bytes.len() < HEADER_LEN || !bytes.starts_with(MAGIC) {
        return Err(Error::mismatch("bup", "missing Vmem header"));
    }
    let be = Endian::Big;
    let (header, data) = bytes.split_at(HEADER_LEN);
    let size = be.read_u32(&header[SIZE_AT..]) as usize;
    if size != data.len() {
        return Err(Error::SizeMismatch {
            what: "BUP save data",
            expected: size,
            actual: data.len(),
        });
    }
    let date = be.read_u32(&header[DATE_AT..]);
    let repeated = be.read_u32(&header[DATE_REPEATED_AT..]);
    if date != repeated {
        return Err(Error::UnsupportedField {
            field: "BUP repeated date",
            value: repeated as u64,
        });
    }
    let meta = decode_meta(&header[NAME], header[LANGUAGE_AT], &header[COMMENT], date)?;
    Ok(SaveFile::new(meta, data.to_vec()))
}

/// `save_id` tells saves exported together apart.
pub fn write_bup(file: &SaveFile<SaturnMeta>, save_id: u32) -> Result<Vec<u8>> {
    let be = Endian::Big;
    let size = u32::try_from(file.payload.len()).map_err(|_| Error::UnsupportedField {
        field: "BUP save size",
        value: file.payload.len() as u64,
    })?;
    let date = timestamp::to_minutes_since_1980(&file.meta.saved)?;
    let mut out = vec![0u8; HEADER_LEN];
    out[..MAGIC.len()].copy_from_slice(MAGIC);
    be.write_u32(&mut out[SAVE_ID_AT..], save_id);
    text::encode_latin1(&file.meta.name, &mut out[NAME], "BUP save name")?;
    text::encode_shift_jis(&file.meta.comment, &mut out[COMMENT], "BUP comment")?;
    out[LANGUAGE_AT] = file.meta.language.code();
    be.write_u32(&mut out[DATE_AT..], date);
    be.write_u32(&mut out[SIZE_AT..], size);
    be.write_u32(&mut out[DATE_REPEATED_AT..], date);
    out.extend_from_slice(&file.payload);
    Ok(out)
}
