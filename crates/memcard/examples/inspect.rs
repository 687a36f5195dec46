use std::env;
use std::fs;
use std::process;

use memcard::formats::dreamcast::Dreamcast;
use memcard::formats::gamecube::GameCube;
use memcard::formats::n64::N64;
use memcard::formats::ps1::Ps1;
use memcard::formats::saturn::{packaging, Saturn};
use memcard::{Format, FormatKind, Volume};

fn print_volume<F: Format>(format: F, data: &[u8]) -> memcard::Result<()> {
    let volume = Volume::parse(format, data)?;
    eprintln!("{:#?}", volume.header());
    for file in volume.files() {
        eprintln!(
            "{:<32} {:>6} bytes",
            volume.format().display_name(&file.meta),
            file.payload.len()
        );
    }
    for skipped in volume.skipped() {
        eprintln!("slot {}: {}", skipped.slot, skipped.error);
    }
    for warning in volume.warnings() {
        eprintln!("{warning}");
    }
    eprintln!(
        "{} used, {} free of {} blocks",
        volume.used_blocks(),
        volume.free_blocks(),
        volume.total_blocks()
    );
    Ok(())
}

fn main() -> std::io::Result<()> {
    let path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example inspect -- <path-to-card-image>");
        process::exit(1);
    });

    let mut data = fs::read(&path)?;
    if FormatKind::detect(&data).is_none() {
        if let Ok((raw, packaging)) = packaging::unwrap_image(&data) {
            eprintln!("Unwrapped {packaging:?} Saturn image.");
            data = raw;
        }
    }

    let result = match FormatKind::detect(&data) {
        Some(FormatKind::GameCube) => match GameCube::for_image(&data) {
            Ok(card) => print_volume(card, &data),
            Err(err) => Err(err),
        },
        Some(FormatKind::Dreamcast) => print_volume(Dreamcast::default(), &data),
        Some(FormatKind::N64) => print_volume(N64::default(), &data),
        Some(FormatKind::Ps1) => print_volume(Ps1::default(), &data),
        Some(FormatKind::Saturn) => match Saturn::for_image(&data) {
            Ok(card) => print_volume(card, &data),
            Err(err) => Err(err),
        },
        None => {
            eprintln!("Unrecognised card image.");
            process::exit(1);
        }
    };
    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }

    Ok(())
}
