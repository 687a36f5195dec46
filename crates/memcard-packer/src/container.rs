use std::fmt;
use std::str::FromStr;

use memcard::formats::dexdrive::{self, DexDriveConsole};
use memcard::formats::n64;
use memcard::formats::ps1::{self, sony};
use memcard::formats::saturn::packaging::{self, Packaging};
use memcard::FormatKind;
use serde::{Deserialize, Serialize};

use crate::Error;

const N64_IMAGE_LEN: usize = n64::PAGE_SIZE * n64::TOTAL_PAGES as usize;

/// How a card image is stored on disk around the raw card bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageContainer {
    #[default]
    Raw,
    /// DexDrive header with per-save comments, for PS1 and N64.
    Dexdrive,
    /// Signed PSP virtual memory card, for PS1.
    Vmp,
    /// Yabause style Saturn image, one byte per 16-bit word.
    ByteExpanded,
    /// Mednafen style gzipped Saturn image.
    Gzip,
}

impl ImageContainer {
    pub fn supports(self, kind: FormatKind) -> bool {
        match self {
            ImageContainer::Raw => true,
            ImageContainer::Dexdrive => matches!(kind, FormatKind::Ps1 | FormatKind::N64),
            ImageContainer::Vmp => kind == FormatKind::Ps1,
            ImageContainer::ByteExpanded | ImageContainer::Gzip => kind == FormatKind::Saturn,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ImageContainer::Raw => "raw",
            ImageContainer::Dexdrive => "dexdrive",
            ImageContainer::Vmp => "vmp",
            ImageContainer::ByteExpanded => "byte_expanded",
            ImageContainer::Gzip => "gzip",
        }
    }
}

impl fmt::Display for ImageContainer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageContainer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(ImageContainer::Raw),
            "dexdrive" => Ok(ImageContainer::Dexdrive),
            "vmp" | "psp" => Ok(ImageContainer::Vmp),
            "byte_expanded" | "yabause" => Ok(ImageContainer::ByteExpanded),
            "gzip" | "mednafen" => Ok(ImageContainer::Gzip),
            other => Err(format!(
                "unknown container `{other}`, expected raw, dexdrive, vmp, byte_expanded or gzip"
            )),
        }
    }
}

/// A card image taken out of whatever it was stored in.
#[derive(Debug)]
pub struct OpenedImage {
    pub kind: FormatKind,
    pub container: ImageContainer,
    pub image: Vec<u8>,
    /// DexDrive comments by directory slot. Empty for other containers.
    pub comments: Vec<String>,
}

impl OpenedImage {
    fn raw(kind: FormatKind, image: &[u8]) -> Self {
        Self {
            kind,
            container: ImageContainer::Raw,
            image: image.to_vec(),
            comments: Vec::new(),
        }
    }
}

fn dexdrive_console(kind: FormatKind) -> Result<DexDriveConsole, Error> {
    match kind {
        FormatKind::Ps1 => Ok(DexDriveConsole::Ps1),
        FormatKind::N64 => Ok(DexDriveConsole::N64),
        other => Err(Error::ConfigError(format!(
            "a dexdrive image cannot hold a {other} card"
        ))),
    }
}

fn open_dexdrive(kind: FormatKind, bytes: &[u8]) -> Result<OpenedImage, Error> {
    let unwrapped = dexdrive::unwrap(dexdrive_console(kind)?, bytes)?;
    Ok(OpenedImage {
        kind,
        container: ImageContainer::Dexdrive,
        image: unwrapped.image,
        comments: unwrapped.comments,
    })
}

/// Finds the card inside `bytes`. `format` skips detection of the card itself, not of the
/// container around it.
pub fn open_image(bytes: &[u8], format: Option<FormatKind>) -> Result<OpenedImage, Error> {
    if dexdrive::looks_like(bytes) {
        let kind = match format {
            Some(kind) => kind,
            None => {
                let ps1_header = DexDriveConsole::Ps1.header_len();
                let inner = bytes.get(ps1_header..).unwrap_or_default();
                if ps1::looks_like(inner) {
                    FormatKind::Ps1
                } else {
                    FormatKind::N64
                }
            }
        };
        return open_dexdrive(kind, bytes);
    }
    if sony::looks_like_vmp(bytes) {
        return Ok(OpenedImage {
            kind: FormatKind::Ps1,
            container: ImageContainer::Vmp,
            image: sony::unwrap_vmp(bytes)?,
            comments: Vec::new(),
        });
    }
    match format.or_else(|| FormatKind::detect(bytes)) {
        Some(FormatKind::Saturn) | None => {}
        Some(FormatKind::N64)
            if bytes.len() == DexDriveConsole::N64.header_len() + N64_IMAGE_LEN =>
        {
            return open_dexdrive(FormatKind::N64, bytes);
        }
        Some(kind) => return Ok(OpenedImage::raw(kind, bytes)),
    }
    match packaging::unwrap_image(bytes) {
        Ok((image, packaging)) => Ok(OpenedImage {
            kind: FormatKind::Saturn,
            container: match packaging {
                Packaging::Raw => ImageContainer::Raw,
                Packaging::ByteExpanded => ImageContainer::ByteExpanded,
                Packaging::Gzip => ImageContainer::Gzip,
            },
            image,
            comments: Vec::new(),
        }),
        Err(_) if format.is_none() => Err(Error::ConfigError(
            "could not recognise the card format".to_owned(),
        )),
        Err(err) => Err(err.into()),
    }
}

/// Stores a raw card image in `container`. `comments` are DexDrive comments by directory slot.
pub fn seal_image(
    kind: FormatKind,
    container: ImageContainer,
    image: Vec<u8>,
    comments: &[String],
) -> Result<Vec<u8>, Error> {
    if !container.supports(kind) {
        return Err(Error::ConfigError(format!(
            "a {container} container cannot hold a {kind} card"
        )));
    }
    let sealed = match container {
        ImageContainer::Raw => image,
        ImageContainer::Dexdrive => dexdrive::wrap(dexdrive_console(kind)?, &image, comments)?,
        ImageContainer::Vmp => sony::wrap_vmp(&image),
        ImageContainer::ByteExpanded => packaging::wrap_image(&image, Packaging::ByteExpanded)?,
        ImageContainer::Gzip => packaging::wrap_image(&image, Packaging::Gzip)?,
    };
    Ok(sealed)
}
