use std::fs;
use std::path::Path;

use memcard::formats::dreamcast::individual::{write_vmi, VmiInfo};
use memcard::formats::dreamcast::{DreamcastMeta, VmuFileType};
use memcard::formats::ps1::sony;
use memcard::formats::saturn::packaging;
use memcard::formats::saturn::SaturnMedia;
use memcard::{FormatKind, SaveFile};
use memcard_packer::{
    list_card, pack_card, unpack_card, Error, ImageContainer, OpenOptions, CONFIG_FILE_NAME,
};
use tempfile::tempdir;

fn ps1_payload(fill: u8) -> Vec<u8> {
    let mut payload = vec![fill; 0x2000];
    payload[..2].copy_from_slice(b"SC");
    payload
}

fn write_ps1_folder(folder: &Path, container: &str) {
    fs::write(
        folder.join(CONFIG_FILE_NAME),
        format!(
            r#"
[card]
format = "ps1"
container = "{container}"

[[file]]
path = "ff7.bin"
dexdrive_comment = "Before the Northern Crater"
file_name = "BASCUS-94163FF7-S01"

[[file]]
path = "mgs.bin"
file_name = "BASLUS-00594MGS"
"#
        ),
    )
    .expect("write card.toml");
    fs::write(folder.join("ff7.bin"), ps1_payload(0x11)).expect("write payload");
    fs::write(folder.join("mgs.bin"), ps1_payload(0x22)).expect("write payload");
}

#[test]
fn dexdrive_comments_survive_unpack_and_pack() {
    let tempdir = tempdir().expect("temp dir");
    let source = tempdir.path().join("source");
    fs::create_dir(&source).expect("create source folder");
    write_ps1_folder(&source, "dexdrive");

    let first = tempdir.path().join("first.gme");
    pack_card(&source, &first).expect("pack dexdrive card");
    let bytes = fs::read(&first).expect("read image");
    assert!(bytes.starts_with(b"123-456-STD"));
    assert_eq!(bytes.len(), 3904 + 128 * 1024);

    let unpacked = tempdir.path().join("unpacked");
    let config = unpack_card(&first, &unpacked, OpenOptions::default(), false).expect("unpack");
    assert_eq!(config.format, FormatKind::Ps1, "card inside the header is detected");
    assert_eq!(config.container, Some(ImageContainer::Dexdrive));
    assert_eq!(
        config.files[0].dexdrive_comment.as_deref(),
        Some("Before the Northern Crater")
    );
    assert_eq!(config.files[1].dexdrive_comment, None, "no comment for the second save");

    let listing = list_card(&first, OpenOptions::default()).expect("list");
    assert_eq!(listing.container, ImageContainer::Dexdrive);
    assert!(listing.files[0]
        .details
        .contains(&"comment: Before the Northern Crater".to_owned()));

    let second = tempdir.path().join("second.gme");
    pack_card(&unpacked, &second).expect("pack unpacked folder");
    assert_eq!(
        bytes,
        fs::read(&second).expect("read second image"),
        "comments land in the same header slots"
    );
}

#[test]
fn tampered_vmp_is_refused() {
    let tempdir = tempdir().expect("temp dir");
    write_ps1_folder(tempdir.path(), "vmp");
    let output = tempdir.path().join("SCEVMC0.VMP");
    pack_card(tempdir.path(), &output).expect("pack vmp");

    let listing = list_card(&output, OpenOptions::default()).expect("list signed image");
    assert_eq!(listing.format, FormatKind::Ps1);
    assert_eq!(listing.container, ImageContainer::Vmp);
    assert_eq!(listing.files.len(), 2);

    let mut bytes = fs::read(&output).expect("read image");
    bytes[0x80 + 0x2000 + 10] ^= 0xFF;
    fs::write(&output, bytes).expect("write tampered image");
    assert!(matches!(
        list_card(&output, OpenOptions::default()),
        Err(Error::CardError(memcard::Error::VolumeCorrupted { .. }))
    ));
}

#[test]
fn gzipped_saturn_cartridge_round_trips_through_bup_files() {
    let tempdir = tempdir().expect("temp dir");
    let source = tempdir.path().join("source");
    fs::create_dir(&source).expect("create source folder");
    fs::write(
        source.join(CONFIG_FILE_NAME),
        r#"
[card]
format = "saturn"
saturn_media = "cartridge"
container = "gzip"

[[file]]
path = "rally.bin"
name = "SEGARALLY_0"
language = "english"
comment = "Best Times"
saved = "1995-12-01 20:00:00"
"#,
    )
    .expect("write card.toml");
    fs::write(source.join("rally.bin"), vec![0x5A; 1500]).expect("write payload");

    let first = tempdir.path().join("first.bkr.gz");
    pack_card(&source, &first).expect("pack saturn cartridge");
    let (image, packaging) =
        packaging::unwrap_image(&fs::read(&first).expect("read image")).expect("gzip image");
    assert_eq!(packaging, packaging::Packaging::Gzip);
    assert_eq!(image.len(), SaturnMedia::Cartridge.image_len());

    let unpacked = tempdir.path().join("unpacked");
    let config = unpack_card(&first, &unpacked, OpenOptions::default(), true).expect("unpack");
    assert_eq!(config.format, FormatKind::Saturn);
    assert_eq!(config.saturn_media, Some(SaturnMedia::Cartridge));
    assert_eq!(config.container, Some(ImageContainer::Gzip));
    assert_eq!(config.files[0].path, "SEGARALLY_0.bup");
    assert!(config.files[0].meta.is_empty(), "metadata travels inside the BUP");

    let second = tempdir.path().join("second.bkr.gz");
    pack_card(&unpacked, &second).expect("pack from BUP");
    let (repacked, _) =
        packaging::unwrap_image(&fs::read(&second).expect("read image")).expect("gzip image");
    assert_eq!(image, repacked, "BUP import reproduces the card");

    let listing = list_card(&second, OpenOptions::default()).expect("list");
    assert_eq!(listing.files[0].details, ["English", "Best Times"]);
}

#[test]
fn vmi_and_vms_pair_is_imported() {
    let tempdir = tempdir().expect("temp dir");
    let folder = tempdir.path();
    let created = chrono::NaiveDate::from_ymd_opt(2000, 6, 1)
        .and_then(|date| date.and_hms_opt(12, 0, 0))
        .expect("valid date");
    let save = SaveFile::new(
        DreamcastMeta {
            file_type: VmuFileType::Data,
            copy_protected: false,
            file_name: "CHUCHU_ROCK".to_owned(),
            created,
            header_offset: 0,
        },
        vec![0x3C; 512 * 2],
    );
    let vmi = write_vmi(&save, &VmiInfo::for_file(&save)).expect("write vmi");
    fs::write(folder.join("CHUCHU.VMI"), vmi).expect("write vmi");
    fs::write(folder.join("CHUCHU.vms"), &save.payload).expect("write vms");
    fs::write(
        folder.join(CONFIG_FILE_NAME),
        "[card]\nformat = \"dreamcast\"\n\n[[file]]\npath = \"CHUCHU.VMI\"\n",
    )
    .expect("write card.toml");

    let output = folder.join("card.vmu");
    pack_card(folder, &output).expect("pack with imported save");
    let listing = list_card(&output, OpenOptions::default()).expect("list");
    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].name, "CHUCHU_ROCK");
    assert_eq!(listing.files[0].bytes, 1024);
}

#[test]
fn psv_save_is_imported_onto_a_ps1_card() {
    let tempdir = tempdir().expect("temp dir");
    let folder = tempdir.path();
    let mut psv = vec![0u8; 0x84];
    psv[..8].copy_from_slice(b"\0VSP\0\0\0\0");
    psv[0x64..0x74].copy_from_slice(b"BESLES-01370TR\0\0");
    psv.extend_from_slice(&ps1_payload(0x44));
    let seed = [0u8; sony::SEED_LEN];
    let signature = sony::signature(&psv, &seed, 0x1C);
    psv[0x1C..0x1C + sony::SIGNATURE_LEN].copy_from_slice(&signature);
    fs::write(folder.join("tomb.psv"), psv).expect("write psv");
    fs::write(
        folder.join(CONFIG_FILE_NAME),
        "[card]\nformat = \"ps1\"\n\n[[file]]\npath = \"tomb.psv\"\n",
    )
    .expect("write card.toml");

    let output = folder.join("card.mcr");
    pack_card(folder, &output).expect("pack with psv");
    let listing = list_card(&output, OpenOptions::default()).expect("list");
    assert_eq!(listing.files[0].name, "BESLES-01370TR");
    assert_eq!(listing.files[0].details[0], "Europe");
}

#[test]
fn container_must_suit_the_format() {
    let tempdir = tempdir().expect("temp dir");
    fs::write(
        tempdir.path().join(CONFIG_FILE_NAME),
        "[card]\nformat = \"gamecube\"\ncontainer = \"vmp\"\n",
    )
    .expect("write card.toml");
    let result = pack_card(tempdir.path(), &tempdir.path().join("out.raw"));
    assert!(
        matches!(result, Err(Error::ConfigError(ref message)) if message.contains("vmp")),
        "a PSP container cannot hold a GameCube card"
    );
}
