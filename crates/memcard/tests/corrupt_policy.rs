mod common;

use common::{gamecube_file, init_logging, ps1_file};
use memcard::checksum;
use memcard::formats::gamecube::{GameCube, BLOCK_SIZE};
use memcard::formats::ps1::Ps1;
use memcard::layout::Endian;
use memcard::{ChainFault, CorruptFilePolicy, Error, Format, Volume};

fn ps1_image_with_broken_first_file() -> Vec<u8> {
    let mut image = Volume::build(
        Ps1::default(),
        Default::default(),
        vec![
            ps1_file("BASLUS-00001BROKEN", 0x2000 * 2, 1),
            ps1_file("BASLUS-00001FINE", 0x2000, 2),
        ],
    )
    .expect("build image")
    .into_image();
    // Frame 2 claims its block is free while frame 1 still links to it.
    image[2 * 0x80] = 0xA0;
    image
}

#[test]
fn skip_policy_drops_only_the_broken_file() {
    init_logging();
    let image = ps1_image_with_broken_first_file();
    let card = Ps1::default().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile);
    let parsed = Volume::parse(card, &image).expect("skip keeps the volume");
    assert_eq!(parsed.files().len(), 1);
    assert_eq!(parsed.files()[0].meta.file_name, "BASLUS-00001FINE");
    let skipped = &parsed.skipped()[0];
    assert_eq!(skipped.slot, 0);
    assert!(matches!(
        skipped.error,
        Error::CorruptedChain {
            start: 1,
            fault: ChainFault::Unallocated { block: 2 }
        }
    ));
}

#[test]
fn strict_policy_fails_the_whole_parse() {
    let image = ps1_image_with_broken_first_file();
    assert_eq!(
        Ps1::default().layout().corrupt_file_policy,
        CorruptFilePolicy::Strict,
        "PS1 cards are strict unless told otherwise"
    );
    assert!(matches!(
        Volume::parse(Ps1::default(), &image),
        Err(Error::CorruptedChain { .. })
    ));
}

#[test]
fn ps1_save_without_magic_fails_under_the_default_policy() {
    init_logging();
    let mut image = Volume::build(
        Ps1::default(),
        Default::default(),
        vec![
            ps1_file("BASLUS-00001GOOD", 0x2000, 1),
            ps1_file("BASLUS-00001WIPED", 0x2000, 2),
        ],
    )
    .expect("build image")
    .into_image();
    // Block 2 is the first block of the second save.
    image[2 * 0x2000..2 * 0x2000 + 2].copy_from_slice(b"\0\0");

    assert!(matches!(
        Volume::parse(Ps1::default(), &image),
        Err(Error::UnsupportedField {
            field: "PS1 save block magic",
            value: 0
        })
    ));

    let lenient = Ps1::default().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile);
    let parsed = Volume::parse(lenient, &image).expect("skip keeps the intact save");
    assert_eq!(parsed.files().len(), 1);
    assert_eq!(parsed.files()[0].meta.file_name, "BASLUS-00001GOOD");
    assert_eq!(parsed.skipped()[0].slot, 1);
}

#[test]
fn ps1_payload_without_magic_is_not_built() {
    let mut file = ps1_file("BASLUS-00001PLAIN", 0x2000, 1);
    file.payload[..2].copy_from_slice(b"XX");
    assert!(matches!(
        Volume::build(Ps1::default(), Default::default(), vec![file]),
        Err(Error::UnsupportedField { .. })
    ));
}

#[test]
fn byte_length_beyond_chain_is_a_size_mismatch() {
    let mut image = Volume::build(
        Ps1::default(),
        Default::default(),
        vec![ps1_file("BASLUS-00001SHORT", 100, 1)],
    )
    .expect("build image")
    .into_image();
    Endian::Little.write_u32(&mut image[0x80 + 4..], 0x2001);

    let card = Ps1::default().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile);
    let parsed = Volume::parse(card, &image).expect("skip policy");
    assert!(parsed.files().is_empty());
    assert!(matches!(
        parsed.skipped()[0].error,
        Error::SizeMismatch {
            expected: 0x2001,
            actual: 0x2000,
            ..
        }
    ));
}

#[test]
fn declared_block_count_must_match_chain() {
    let card = GameCube::default().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile);
    let mut image = Volume::build(
        card.clone(),
        Default::default(),
        vec![gamecube_file("wrong-size", 2, 1), gamecube_file("right", 1, 2)],
    )
    .expect("build image")
    .into_image();

    let spec = card.layout().directory.checksum.expect("checksum");
    for block in [1, 2] {
        let directory = &mut image[block * BLOCK_SIZE..(block + 1) * BLOCK_SIZE];
        Endian::Big.write_u16(&mut directory[0x38..], 3);
        checksum::store(&spec, directory, Endian::Big);
    }

    let parsed = Volume::parse(card.clone(), &image).expect("skip policy");
    assert_eq!(parsed.files().len(), 1);
    assert!(matches!(
        parsed.skipped()[0].error,
        Error::CorruptedChain {
            fault: ChainFault::LengthMismatch {
                declared: 3,
                actual: 2
            },
            ..
        }
    ));

    let strict = card.with_corrupt_file_policy(CorruptFilePolicy::Strict);
    assert!(Volume::parse(strict, &image).is_err());
}
