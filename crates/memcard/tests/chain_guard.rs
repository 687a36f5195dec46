mod common;

use common::{dreamcast_file, gamecube_file, init_logging, ps1_file};
use memcard::checksum;
use memcard::formats::dreamcast::Dreamcast;
use memcard::formats::gamecube::{GameCube, GameCubeHeader, BLOCK_SIZE};
use memcard::formats::ps1::{Ps1, Ps1Header};
use memcard::layout::Endian;
use memcard::{ChainFault, CorruptFilePolicy, Error, Format, Volume};

#[test]
fn gamecube_cycle_is_fatal_under_strict_policy() {
    init_logging();
    let card = GameCube::default();
    let mut image = Volume::build(
        card.clone(),
        GameCubeHeader::default(),
        vec![gamecube_file("looping", 2, 1)],
    )
    .expect("build image")
    .into_image();

    let spec = card
        .layout()
        .allocation()
        .and_then(|alloc| alloc.checksum)
        .expect("allocation table carries a checksum");
    for block in [3, 4] {
        let table = &mut image[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE];
        // Block 6 points back at block 5.
        Endian::Big.write_u16(&mut table[0x0C..], 5);
        checksum::store(&spec, table, Endian::Big);
    }

    match Volume::parse(card, &image) {
        Err(Error::CorruptedChain { start, fault }) => {
            assert_eq!(start, 5);
            assert_eq!(fault, ChainFault::Cycle { block: 5 });
        }
        other => panic!("expected a corrupted chain, got {other:?}"),
    }
}

#[test]
fn dreamcast_cycle_skips_only_that_file() {
    init_logging();
    let vmu = Dreamcast::default();
    let mut image = Volume::build(
        vmu.clone(),
        Default::default(),
        vec![dreamcast_file("LOOPING", 3, 1), dreamcast_file("INTACT", 2, 2)],
    )
    .expect("build image")
    .into_image();

    // Block 197 ends the first chain; point it back at 199.
    let fat = 254 * 512;
    Endian::Little.write_u16(&mut image[fat + 197 * 2..], 199);

    let parsed = Volume::parse(vmu, &image).expect("skip policy keeps the volume");
    assert_eq!(parsed.files().len(), 1);
    assert_eq!(parsed.files()[0].meta.file_name, "INTACT");
    assert_eq!(parsed.skipped().len(), 1);
    assert!(matches!(
        parsed.skipped()[0].error,
        Error::CorruptedChain {
            start: 199,
            fault: ChainFault::Cycle { block: 199 }
        }
    ));
}

#[test]
fn ps1_self_link_is_caught() {
    let card = Ps1::default().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile);
    let mut image = Volume::build(
        card.clone(),
        Ps1Header::default(),
        vec![ps1_file("BASLUS-00001LOOP", 0x2000 * 2, 1)],
    )
    .expect("build image")
    .into_image();

    // Frame 2 describes block 2; its link is stored as a data block index.
    Endian::Little.write_u16(&mut image[2 * 0x80 + 8..], 1);

    let parsed = Volume::parse(card, &image).expect("skip policy keeps the volume");
    assert!(parsed.files().is_empty());
    assert!(matches!(
        parsed.skipped()[0].error,
        Error::CorruptedChain {
            fault: ChainFault::Cycle { block: 2 },
            ..
        }
    ));
}

#[test]
fn chain_into_reserved_area_is_rejected() {
    let card = GameCube::default();
    let mut image = Volume::build(
        card.clone(),
        GameCubeHeader::default(),
        vec![gamecube_file("escape", 2, 1)],
    )
    .expect("build image")
    .into_image();
    let spec = card
        .layout()
        .allocation()
        .and_then(|alloc| alloc.checksum)
        .expect("checksum");
    for block in [3, 4] {
        let table = &mut image[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE];
        Endian::Big.write_u16(&mut table[0x0A..], 2);
        checksum::store(&spec, table, Endian::Big);
    }
    assert!(
        Volume::parse(card, &image).is_err(),
        "a link into the directory is never followed"
    );
}
