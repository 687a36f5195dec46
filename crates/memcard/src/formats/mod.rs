//! Per-console field mappings on top of the generic engine.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::block::BlockStore;
use crate::dir_entry::{DirectoryEntry, Placement};
use crate::error::{Result, Warning};
use crate::layout::{CorruptFilePolicy, Layout};

pub mod dexdrive;
pub mod dreamcast;
pub mod gamecube;
pub mod n64;
pub mod ps1;
pub mod saturn;

/// One console's card format: a [`Layout`] plus the mapping of header and directory fields.
pub trait Format {
    /// Volume-wide metadata kept in the header region.
    type Header: Clone + fmt::Debug + PartialEq + Default + Serialize + DeserializeOwned;
    /// Per-file metadata kept in a directory entry.
    type Meta: Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned;

    fn layout(&self) -> &Layout;

    fn layout_mut(&mut self) -> &mut Layout;

    fn with_corrupt_file_policy(mut self, policy: CorruptFilePolicy) -> Self
    where
        Self: Sized,
    {
        self.layout_mut().corrupt_file_policy = policy;
        self
    }

    /// Rejects images that are not of this format. Runs before anything else is decoded.
    fn check_signature(&self, _store: &BlockStore) -> Result<()> {
        Ok(())
    }

    fn decode_header(&self, store: &BlockStore, warnings: &mut Vec<Warning>) -> Result<Self::Header>;

    /// Writes the header region. Runs on a blank image before the directory and allocation table.
    fn encode_header(&self, header: &Self::Header, store: &mut BlockStore) -> Result<()>;

    fn entry_is_empty(&self, raw: &[u8]) -> bool {
        self.layout().directory.empty.matches(raw)
    }

    /// Second check on a slot that does not look empty, with the rest of the image at hand.
    fn slot_in_use(&self, _raw: &[u8], _store: &BlockStore) -> bool {
        true
    }

    fn decode_entry(&self, slot: usize, raw: &[u8]) -> Result<DirectoryEntry<Self::Meta>>;

    /// Checks what the console expects at the start of an assembled payload. Runs on every file
    /// read from an image and on every file before it is built into one.
    fn check_payload(&self, _meta: &Self::Meta, _payload: &[u8]) -> Result<()> {
        Ok(())
    }

    fn encode_entry(&self, meta: &Self::Meta, placement: &Placement, out: &mut [u8]) -> Result<()>;

    /// Short name used in listings and as the payload file name when unpacking.
    fn display_name(&self, meta: &Self::Meta) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    GameCube,
    Dreamcast,
    N64,
    Ps1,
    Saturn,
}

impl FormatKind {
    pub const ALL: [FormatKind; 5] = [
        FormatKind::GameCube,
        FormatKind::Dreamcast,
        FormatKind::N64,
        FormatKind::Ps1,
        FormatKind::Saturn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FormatKind::GameCube => "gamecube",
            FormatKind::Dreamcast => "dreamcast",
            FormatKind::N64 => "n64",
            FormatKind::Ps1 => "ps1",
            FormatKind::Saturn => "saturn",
        }
    }

    /// Guesses the format of an image from its size and signature bytes.
    pub fn detect(image: &[u8]) -> Option<FormatKind> {
        if saturn::looks_like(image) {
            Some(FormatKind::Saturn)
        } else if ps1::looks_like(image) {
            Some(FormatKind::Ps1)
        } else if dreamcast::looks_like(image) {
            Some(FormatKind::Dreamcast)
        } else if gamecube::looks_like(image) {
            Some(FormatKind::GameCube)
        } else if n64::looks_like(image) {
            Some(FormatKind::N64)
        } else {
            None
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FormatKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown card format `{s}`, expected gamecube, dreamcast, n64, ps1 or saturn")
            })
    }
}
