use std::fs;
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use memcard::formats::gamecube::GameCube;
use memcard::{FormatKind, Volume};
use memcard_packer::{
    pack_with_config, pack_with_config_and_metadata_reader, Config, Error, FileConfig, FileTimes,
    MetadataReader,
};
use tempfile::tempdir;

struct FixedTimes;

impl MetadataReader for FixedTimes {
    fn file_times(&self, _path: &Path) -> std::io::Result<FileTimes> {
        // 2010-01-01 00:00:00 UTC.
        Ok(FileTimes {
            created: None,
            modified: UNIX_EPOCH + Duration::from_secs(1_262_304_000),
        })
    }
}

fn gamecube_config(path: &str, meta: &str) -> Config {
    let mut config = Config::new(FormatKind::GameCube);
    config.files.push(FileConfig::new(
        path,
        toml::from_str(meta).expect("meta table"),
    ));
    config
}

#[test]
fn missing_timestamp_comes_from_file_times() {
    let tempdir = tempdir().expect("temp dir");
    let folder = tempdir.path();
    fs::write(folder.join("DATA.BIN"), vec![1u8; 0x2000]).expect("write payload");
    let config = gamecube_config(
        "DATA.BIN",
        "game_code = \"GALE\"\npublisher = \"01\"\nfile_name = \"data\"",
    );

    let output = folder.join("card.raw");
    pack_with_config_and_metadata_reader(folder, &output, config, &FixedTimes)
        .expect("pack with file times");

    let image = fs::read(&output).expect("read image");
    let volume = Volume::parse(GameCube::default(), &image).expect("parse");
    let modified = volume.files()[0].meta.modified;
    assert_eq!(
        modified.and_utc().timestamp().abs_diff(1_262_304_000) % 900,
        0,
        "modified time comes from the reader, shifted only by the local offset"
    );
}

#[test]
fn payload_outside_folder_is_a_name_error() {
    let tempdir = tempdir().expect("temp dir");
    let config = gamecube_config("../escape.bin", "");
    let result = pack_with_config(tempdir.path(), &tempdir.path().join("out.raw"), config);
    assert!(
        matches!(result, Err(Error::NameError(name)) if name == "../escape.bin"),
        "subfolder paths are refused"
    );
}

#[test]
fn bad_metadata_is_a_config_error() {
    let tempdir = tempdir().expect("temp dir");
    fs::write(tempdir.path().join("DATA.BIN"), vec![1u8; 0x2000]).expect("write payload");
    let config = gamecube_config("DATA.BIN", "game_code = 12");
    let result = pack_with_config(tempdir.path(), &tempdir.path().join("out.raw"), config);
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn overfull_card_is_a_card_error() {
    let tempdir = tempdir().expect("temp dir");
    let mut config = Config::new(FormatKind::Ps1);
    for i in 0..16 {
        let name = format!("SAVE{i}.BIN");
        fs::write(tempdir.path().join(&name), vec![0u8; 0x2000]).expect("write payload");
        let meta = toml::from_str(&format!("file_name = \"BASLUS-0000{i}\"")).expect("meta");
        config.files.push(FileConfig::new(name, meta));
    }
    let result = pack_with_config(tempdir.path(), &tempdir.path().join("out.mcr"), config);
    assert!(matches!(
        result,
        Err(Error::CardError(memcard::Error::CapacityExceeded { .. }))
    ));
}
