#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use memcard::formats::dreamcast::{DreamcastMeta, VmuFileType};
use memcard::formats::gamecube::GameCubeMeta;
use memcard::formats::n64::N64Meta;
use memcard::formats::ps1::Ps1Meta;
use memcard::formats::saturn::{SaturnLanguage, SaturnMeta};
use memcard::SaveFile;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .expect("valid date")
        .and_hms_opt(12, 34, 56)
        .expect("valid time")
}

/// A payload whose bytes differ per block so misplaced blocks are noticed.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| seed.wrapping_add((i / 97) as u8).wrapping_mul(3) ^ (i as u8))
        .collect()
}

pub fn gamecube_file(name: &str, blocks: usize, seed: u8) -> SaveFile<GameCubeMeta> {
    SaveFile::new(
        GameCubeMeta {
            game_code: "GALE".into(),
            publisher: "01".into(),
            banner_flags: 2,
            file_name: name.into(),
            modified: date(2003, 5, 17),
            icon_offset: 0x40,
            icon_format: 1,
            icon_speed: 3,
            permissions: 4,
            copy_counter: 0,
            comment_offset: 0,
        },
        payload(blocks * 0x2000, seed),
    )
}

pub fn dreamcast_file(name: &str, blocks: usize, seed: u8) -> SaveFile<DreamcastMeta> {
    SaveFile::new(
        DreamcastMeta {
            file_type: VmuFileType::Data,
            copy_protected: false,
            file_name: name.into(),
            created: date(2001, 2, 3),
            header_offset: 0,
        },
        payload(blocks * 512, seed),
    )
}

pub fn n64_file(name: &str, pages: usize, seed: u8) -> SaveFile<N64Meta> {
    SaveFile::new(
        N64Meta {
            game_code: "NZSE".into(),
            publisher: "01".into(),
            name: name.into(),
            extension: String::new(),
        },
        payload(pages * 256, seed),
    )
}

/// The payload starts with the save magic every PS1 save carries.
pub fn ps1_file(name: &str, len: usize, seed: u8) -> SaveFile<Ps1Meta> {
    let mut payload = payload(len, seed);
    if payload.len() >= 2 {
        payload[..2].copy_from_slice(b"SC");
    }
    SaveFile::new(
        Ps1Meta {
            file_name: name.into(),
        },
        payload,
    )
}

/// Saturn dates are whole minutes.
pub fn saturn_file(name: &str, len: usize, seed: u8) -> SaveFile<SaturnMeta> {
    SaveFile::new(
        SaturnMeta {
            name: name.into(),
            language: SaturnLanguage::Japanese,
            comment: "\u{30bb}\u{30fc}\u{30d6}".into(),
            saved: NaiveDate::from_ymd_opt(1995, 7, 8)
                .expect("valid date")
                .and_hms_opt(9, 15, 0)
                .expect("valid time"),
        },
        payload(len, seed),
    )
}
