mod common;

use common::{init_logging, saturn_file};
use memcard::formats::saturn::packaging::{self, Packaging};
use memcard::formats::saturn::{Saturn, SaturnHeader, BLOCK_LIST};
use memcard::layout::Endian;
use memcard::{ChainFault, CorruptFilePolicy, Error, Format, Volume};

const BLOCK: usize = 0x40;

fn two_saves() -> Vec<memcard::SaveFile<memcard::formats::saturn::SaturnMeta>> {
    // 2000 bytes take 35 blocks, and their 34 links overflow the first block.
    vec![saturn_file("NIGHTS_01", 2000, 1), saturn_file("SEGARALLY", 20, 2)]
}

#[test]
fn internal_memory_round_trip() {
    init_logging();
    let files = two_saves();
    let built = Volume::build(Saturn::internal(), SaturnHeader::default(), files.clone())
        .expect("build image");
    assert_eq!(built.total_size(), 0x8000);
    assert_eq!(built.free_blocks(), 510 - 36);

    let image = built.image();
    assert_eq!(&image[..16], b"BackUpRam Format");
    assert!(image[BLOCK..2 * BLOCK].iter().all(|&b| b == 0), "second block is zero");
    assert_eq!(&image[2 * BLOCK..2 * BLOCK + 4], &[0x80, 0, 0, 0]);
    assert_eq!(
        Endian::Big.read_u16(&image[2 * BLOCK + BLOCK_LIST.list_at..]),
        3,
        "the first save lists its second block first"
    );
    assert_eq!(&image[37 * BLOCK..37 * BLOCK + 4], &[0x80, 0, 0, 0], "second record");

    let parsed = Volume::parse(Saturn::internal(), image).expect("parse built image");
    assert_eq!(parsed.files(), files.as_slice(), "files survive in order");
    assert!(parsed.skipped().is_empty());
    assert_eq!(parsed.free_blocks(), built.free_blocks());
    assert_eq!(parsed.used_blocks(), 512 - (510 - 36));
}

#[test]
fn mednafen_cartridge_round_trip() {
    init_logging();
    let files = vec![saturn_file("GRANDIA_001", 30_000, 7)];
    let built = Volume::build(Saturn::cartridge(), SaturnHeader::default(), files.clone())
        .expect("build image");
    let packed = packaging::wrap_image(built.image(), Packaging::Gzip).expect("compress");

    let (raw, found) = packaging::unwrap_image(&packed).expect("unwrap");
    assert_eq!(found, Packaging::Gzip);
    let card = Saturn::for_image(&raw).expect("cartridge geometry");
    assert_eq!(card.layout().block_size, 0x200);
    let parsed = Volume::parse(card, &raw).expect("parse cartridge");
    assert_eq!(parsed.files(), files.as_slice());
}

#[test]
fn listed_record_block_breaks_the_chain() {
    init_logging();
    let mut image = Volume::build(Saturn::internal(), SaturnHeader::default(), two_saves())
        .expect("build image")
        .into_image();
    // Point the first save's list at the second save's record.
    Endian::Big.write_u16(&mut image[2 * BLOCK + BLOCK_LIST.list_at..], 37);

    assert!(matches!(
        Volume::parse(Saturn::internal(), &image),
        Err(Error::CorruptedChain {
            start: 2,
            fault: ChainFault::NotData { block: 37 }
        })
    ));

    let lenient = Saturn::internal().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile);
    let parsed = Volume::parse(lenient, &image).expect("skip keeps the rest");
    assert_eq!(parsed.files().len(), 1);
    assert_eq!(parsed.files()[0].meta.name, "SEGARALLY");
    assert_eq!(parsed.skipped()[0].slot, 0);
}

#[test]
fn list_leaving_the_card_is_out_of_range() {
    let mut image = Volume::build(Saturn::internal(), SaturnHeader::default(), two_saves())
        .expect("build image")
        .into_image();
    Endian::Big.write_u16(&mut image[2 * BLOCK + BLOCK_LIST.list_at..], 1);
    assert!(matches!(
        Volume::parse(Saturn::internal(), &image),
        Err(Error::CorruptedChain {
            fault: ChainFault::OutOfRange { block: 1 },
            ..
        })
    ));
}

#[test]
fn full_memory_and_one_byte_more() {
    // 28 bytes in the record block and 58 in each of the other 509.
    let fits = 28 + 58 * 509;
    let full = Volume::build(
        Saturn::internal(),
        SaturnHeader::default(),
        vec![saturn_file("BIG", fits, 3)],
    )
    .expect("exactly full");
    assert_eq!(full.free_blocks(), 0);

    assert!(matches!(
        Volume::build(
            Saturn::internal(),
            SaturnHeader::default(),
            vec![saturn_file("BIG", fits + 1, 3)],
        ),
        Err(Error::CapacityExceeded { .. })
    ));
}

#[test]
fn zero_byte_record_is_a_size_mismatch() {
    let mut image = Volume::build(Saturn::internal(), SaturnHeader::default(), two_saves())
        .expect("build image")
        .into_image();
    image[37 * BLOCK + 0x1E..37 * BLOCK + 0x22].fill(0);
    let parsed = Volume::parse(
        Saturn::internal().with_corrupt_file_policy(CorruptFilePolicy::SkipCorruptFile),
        &image,
    )
    .expect("skip keeps the first save");
    assert_eq!(parsed.files().len(), 1);
    assert!(matches!(parsed.skipped()[0].error, Error::SizeMismatch { .. }));
}
