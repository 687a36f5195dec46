//! Fixed-width text fields.

use std::collections::HashMap;

use encoding_rs::SHIFT_JIS;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Ascii,
    ShiftJis,
}

/// Text decoded by guessing its encoding. The raw bytes are kept so callers can decode again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
    pub raw: Vec<u8>,
}

fn until_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Reads a NUL-terminated Latin-1 field.
pub fn decode_latin1(field: &[u8]) -> String {
    until_nul(field).iter().map(|&b| b as char).collect()
}

/// Reads every byte of a Latin-1 field, NULs included, for identifiers that are binary codes.
pub fn decode_latin1_fixed(field: &[u8]) -> String {
    field.iter().map(|&b| b as char).collect()
}

/// Writes `text` as Latin-1 into `field`, NUL padded.
pub fn encode_latin1(text: &str, field: &mut [u8], what: &'static str) -> Result<()> {
    let mut bytes = Vec::with_capacity(field.len());
    for c in text.chars() {
        let code = c as u32;
        if code > 0xFF {
            return Err(Error::UnsupportedField {
                field: what,
                value: code as u64,
            });
        }
        bytes.push(code as u8);
    }
    if bytes.len() > field.len() {
        return Err(Error::SizeMismatch {
            what,
            expected: field.len(),
            actual: bytes.len(),
        });
    }
    field.fill(0);
    field[..bytes.len()].copy_from_slice(&bytes);
    Ok(())
}

pub fn decode_shift_jis(field: &[u8]) -> String {
    let (text, _, _) = SHIFT_JIS.decode(until_nul(field));
    text.into_owned()
}

/// Writes `text` as Shift-JIS into `field`, NUL padded.
pub fn encode_shift_jis(text: &str, field: &mut [u8], what: &'static str) -> Result<()> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(text);
    if had_errors {
        let bad = text.chars().find(|c| {
            let mut buf = [0u8; 4];
            SHIFT_JIS.encode(c.encode_utf8(&mut buf)).2
        });
        return Err(Error::UnsupportedField {
            field: what,
            value: bad.map_or(0, |c| c as u64),
        });
    }
    if bytes.len() > field.len() {
        return Err(Error::SizeMismatch {
            what,
            expected: field.len(),
            actual: bytes.len(),
        });
    }
    field.fill(0);
    field[..bytes.len()].copy_from_slice(&bytes);
    Ok(())
}

/// Decodes a field in the encoding the card declares for it.
pub fn decode_declared(field: &[u8], encoding: TextEncoding) -> DecodedText {
    let content = until_nul(field);
    let text = match encoding {
        TextEncoding::Ascii => content.iter().map(|&b| b as char).collect(),
        TextEncoding::ShiftJis => decode_shift_jis(content),
    };
    DecodedText {
        text,
        encoding,
        raw: field.to_vec(),
    }
}

/// Maps full-width ASCII forms and the ideographic space to their half-width counterparts.
pub fn to_half_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// Best-effort choice between ASCII and Shift-JIS for a field with no encoding tag.
///
/// Any byte outside 7-bit ASCII before the terminator means the field is not plain ASCII, and
/// Shift-JIS is the only other encoding these fields are written in.
pub fn decode_with_heuristic(field: &[u8]) -> DecodedText {
    let content = until_nul(field);
    if content.iter().any(|&b| b >= 0x80) {
        DecodedText {
            text: decode_shift_jis(content),
            encoding: TextEncoding::ShiftJis,
            raw: field.to_vec(),
        }
    } else {
        DecodedText {
            text: content.iter().map(|&b| b as char).collect(),
            encoding: TextEncoding::Ascii,
            raw: field.to_vec(),
        }
    }
}

/// Controller Pak character set as (code, character). Unlisted codes decode to nothing.
const N64_CHARSET: [(u8, char); 134] = [
    (15, ' '), (16, '0'), (17, '1'), (18, '2'), (19, '3'), (20, '4'), (21, '5'), (22, '6'),
    (23, '7'), (24, '8'), (25, '9'), (26, 'A'), (27, 'B'), (28, 'C'), (29, 'D'), (30, 'E'),
    (31, 'F'), (32, 'G'), (33, 'H'), (34, 'I'), (35, 'J'), (36, 'K'), (37, 'L'), (38, 'M'),
    (39, 'N'), (40, 'O'), (41, 'P'), (42, 'Q'), (43, 'R'), (44, 'S'), (45, 'T'), (46, 'U'),
    (47, 'V'), (48, 'W'), (49, 'X'), (50, 'Y'), (51, 'Z'), (52, '!'), (53, '"'), (54, '#'),
    (55, '\''), (56, '*'), (57, '+'), (58, ','), (59, '-'), (60, '.'), (61, '/'), (62, ':'),
    (63, '='), (64, '?'), (65, '@'), (66, '。'), (67, '゛'), (68, '゜'), (69, 'ァ'), (70, 'ィ'),
    (71, 'ゥ'), (72, 'ェ'), (73, 'ォ'), (74, 'ッ'), (75, 'ャ'), (76, 'ュ'), (77, 'ョ'), (78, 'ヲ'),
    (79, 'ン'), (80, 'ア'), (81, 'イ'), (82, 'ウ'), (83, 'エ'), (84, 'オ'), (85, 'カ'), (86, 'キ'),
    (87, 'ク'), (88, 'ケ'), (89, 'コ'), (90, 'サ'), (91, 'シ'), (92, 'ス'), (93, 'セ'), (94, 'ソ'),
    (95, 'タ'), (96, 'チ'), (97, 'ツ'), (98, 'テ'), (99, 'ト'), (100, 'ナ'), (101, 'ニ'),
    (102, 'ヌ'), (103, 'ネ'), (104, 'ノ'), (105, 'ハ'), (106, 'ヒ'), (107, 'フ'), (108, 'ヘ'),
    (109, 'ホ'), (110, 'マ'), (111, 'ミ'), (112, 'ム'), (113, 'メ'), (114, 'モ'), (115, 'ヤ'),
    (116, 'ユ'), (117, 'ヨ'), (118, 'ラ'), (119, 'リ'), (120, 'ル'), (121, 'レ'), (122, 'ロ'),
    (123, 'ワ'), (124, 'ガ'), (125, 'ギ'), (126, 'グ'), (127, 'ゲ'), (128, 'ゴ'), (129, 'ザ'),
    (130, 'ジ'), (131, 'ズ'), (132, 'ゼ'), (133, 'ゾ'), (134, 'ダ'), (135, 'ヂ'), (136, 'ヅ'),
    (137, 'デ'), (138, 'ド'), (139, 'バ'), (140, 'ビ'), (141, 'ブ'), (142, 'ベ'), (143, 'ボ'),
    (144, 'パ'), (145, 'ピ'), (146, 'プ'), (147, 'ペ'), (148, 'ポ'),
];

static N64_DECODE: Lazy<HashMap<u8, char>> = Lazy::new(|| N64_CHARSET.iter().copied().collect());

static N64_ENCODE: Lazy<HashMap<char, u8>> =
    Lazy::new(|| N64_CHARSET.iter().map(|&(code, c)| (c, code)).collect());

pub fn decode_n64(field: &[u8]) -> String {
    field
        .iter()
        .filter_map(|code| N64_DECODE.get(code))
        .collect()
}

pub fn encode_n64(text: &str, field: &mut [u8], what: &'static str) -> Result<()> {
    let count = text.chars().count();
    if count > field.len() {
        return Err(Error::SizeMismatch {
            what,
            expected: field.len(),
            actual: count,
        });
    }
    field.fill(0);
    for (slot, c) in field.iter_mut().zip(text.chars()) {
        *slot = *N64_ENCODE.get(&c).ok_or(Error::UnsupportedField {
            field: what,
            value: c as u64,
        })?;
    }
    Ok(())
}
