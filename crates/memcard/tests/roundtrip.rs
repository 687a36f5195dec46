mod common;

use common::{dreamcast_file, gamecube_file, init_logging, n64_file, ps1_file};
use memcard::formats::dreamcast::{Dreamcast, DreamcastHeader, VmuColor};
use memcard::formats::gamecube::{GameCube, GameCubeHeader};
use memcard::formats::n64::{N64Header, N64};
use memcard::formats::ps1::{Ps1, Ps1Header};
use memcard::{Format, Volume};

fn assert_round_trip<F>(format: F, header: F::Header, files: Vec<memcard::SaveFile<F::Meta>>)
where
    F: Format + Clone,
{
    let built = Volume::build(format.clone(), header.clone(), files.clone()).expect("build image");
    assert_eq!(built.total_size(), format.layout().image_len());

    let parsed = Volume::parse(format, built.image()).expect("parse built image");
    assert_eq!(parsed.header(), &header, "header survives");
    assert_eq!(parsed.files(), files.as_slice(), "files survive in order");
    assert!(parsed.skipped().is_empty());
    assert!(parsed.warnings().is_empty(), "{:?}", parsed.warnings());
    assert_eq!(parsed.used_blocks(), built.used_blocks());
    assert_eq!(parsed.free_blocks(), built.free_blocks());
}

#[test]
fn gamecube_round_trip() {
    init_logging();
    let mut header = GameCubeHeader {
        format_time: 0x0123_4567_89AB,
        rtc_bias: 7,
        language: 1,
        ..Default::default()
    };
    header.set_flash_id(&[9; 12]);
    assert_round_trip(
        GameCube::new(4).expect("valid size"),
        header,
        vec![
            gamecube_file("zelda-save", 3, 1),
            gamecube_file("options", 1, 2),
        ],
    );
}

#[test]
fn dreamcast_round_trip() {
    init_logging();
    let header = DreamcastHeader {
        custom_color: true,
        color: VmuColor {
            blue: 0x10,
            green: 0x20,
            red: 0x30,
            alpha: 0xFF,
        },
        formatted: common::date(2000, 9, 9),
        icon_shape: 12,
    };
    assert_round_trip(
        Dreamcast::default(),
        header,
        vec![
            dreamcast_file("SONICADV_INT", 10, 3),
            dreamcast_file("SONICADV_SYS", 1, 4),
        ],
    );
}

#[test]
fn n64_round_trip() {
    init_logging();
    let mut header = N64Header::default();
    header.label[..4].copy_from_slice(b"PAK1");
    header.id[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    let mut files = vec![n64_file("ZELDA", 16, 5), n64_file("MARIO-KART", 2, 6)];
    files[1].meta.extension = "A".into();
    assert_round_trip(N64::default(), header, files);
}

#[test]
fn ps1_round_trip_keeps_exact_byte_length() {
    init_logging();
    assert_round_trip(
        Ps1::default(),
        Ps1Header {
            write_test_frame: true,
        },
        vec![
            ps1_file("BASLUS-00001SAVE0", 0x2000 * 2 + 100, 7),
            ps1_file("BISLPS-00002DATA", 0x2000, 8),
        ],
    );
}

#[test]
fn ps1_blocks_are_placed_after_previous_file() {
    let built = Volume::build(
        Ps1::default(),
        Ps1Header::default(),
        vec![
            ps1_file("BASLUS-00001A", 0x2000 * 3, 1),
            ps1_file("BASLUS-00001B", 10, 2),
        ],
    )
    .expect("build image");
    let image = built.image();
    assert_eq!(image[4 * 0x80], 0x51, "second file starts in frame 4");
    let second = ps1_file("BASLUS-00001B", 10, 2);
    assert_eq!(&image[4 * 0x2000..4 * 0x2000 + 10], second.payload.as_slice());
}

#[test]
fn dreamcast_unknown_file_type_round_trip() {
    let mut odd = dreamcast_file("ODDTYPE", 2, 9);
    odd.meta.file_type = memcard::formats::dreamcast::VmuFileType::Unknown(0x11);
    let built = Volume::build(Dreamcast::default(), DreamcastHeader::default(), vec![odd.clone()])
        .expect("build image");
    let parsed = Volume::parse(Dreamcast::default(), built.image()).expect("parse built image");
    assert!(parsed.skipped().is_empty(), "unknown types are not corrupt files");
    assert_eq!(parsed.files(), &[odd]);
}

#[test]
fn slots_are_reported_for_built_and_parsed_volumes() {
    let files = vec![ps1_file("BASLUS-00001A", 0x2000 * 2, 1), ps1_file("BASLUS-00002B", 100, 2)];
    let built = Volume::build(Ps1::default(), Ps1Header::default(), files).expect("build image");
    assert_eq!(built.slots(), [0, 2], "a PS1 record sits in the frame of its first block");

    let parsed = Volume::parse(Ps1::default(), built.image()).expect("parse built image");
    assert_eq!(parsed.slots(), built.slots());

    let notes = vec![n64_file("MARIOKART", 1, 1), n64_file("WAVERACE", 2, 2)];
    let pak = Volume::build(N64::default(), N64Header::default(), notes).expect("build pak");
    assert_eq!(pak.slots(), [0, 1], "notes fill the table in order");
}
