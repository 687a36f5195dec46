//! Memory-card filesystem codec for retro console save images.
//!
//! One engine reads and writes every supported card. A [`Layout`] describes where a card keeps
//! its header, directory and allocation table, and a [`Format`] maps the console's field layout
//! on top of it. [`Volume::parse`] turns an image into save files, [`Volume::build`] turns save
//! files back into an image.

pub mod assembler;
pub mod backup;
pub mod bcd;
pub mod block;
pub mod block_list;
pub mod checksum;
pub mod date_format;
pub mod dir_entry;
pub mod error;
pub mod fat;
pub mod formats;
pub mod layout;
pub mod text;
pub mod timestamp;
pub mod volume;

pub use error::{ChainFault, Error, Result, Warning, WarningKind};
pub use formats::{Format, FormatKind};
pub use layout::{CorruptFilePolicy, Layout};
pub use volume::{SaveFile, SkippedFile, Volume};
