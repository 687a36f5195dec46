//! Fixed-width directory records.
//!
//! The engine owns slot iteration, emptiness and slot placement. Field mapping inside a record is
//! delegated to the [`Format`].

use log::warn;

use crate::block::BlockStore;
use crate::checksum;
use crate::error::{Error, Result, Warning, WarningKind};
use crate::formats::Format;
use crate::layout::{DirectoryLayout, Layout, SlotAssignment};

/// A decoded directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry<M> {
    pub slot: usize,
    pub first_block: u16,
    /// Block count recorded in the entry, when the format records one.
    pub size_in_blocks: Option<u16>,
    /// Exact payload length, when the format records one.
    pub byte_len: Option<u32>,
    pub meta: M,
}

/// Where the engine put a file, handed to the format when it writes the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub first_block: u16,
    pub size_in_blocks: u16,
    pub byte_len: u32,
}

fn slot_range(layout: &DirectoryLayout, slot: usize) -> std::ops::Range<usize> {
    let start = layout.entries_at + slot * layout.entry_len;
    start..start + layout.entry_len
}

/// Raw bytes of every slot, in slot order.
pub fn raw_slots<'a>(layout: &DirectoryLayout, region: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
    let layout = *layout;
    (0..layout.max_entries).map(move |slot| &region[slot_range(&layout, slot)])
}

/// Decodes every occupied slot. Failures stay attached to their slot so the caller can apply its
/// corrupt file policy.
pub fn decode_directory<F: Format>(
    format: &F,
    region: &[u8],
    store: &BlockStore,
) -> Vec<(usize, Result<DirectoryEntry<F::Meta>>)> {
    raw_slots(&format.layout().directory, region)
        .enumerate()
        .filter(|(_, raw)| !format.entry_is_empty(raw) && format.slot_in_use(raw, store))
        .map(|(slot, raw)| (slot, format.decode_entry(slot, raw)))
        .collect()
}

/// Writes `entries` into the directory region and fills every other slot with the empty pattern.
/// Returns the slot each entry went to.
pub fn encode_directory<F: Format>(
    format: &F,
    entries: &[(&F::Meta, Placement)],
    region: &mut [u8],
) -> Result<Vec<usize>> {
    let dir = &format.layout().directory;
    if let Some(fill) = dir.region_fill {
        region.fill(fill);
    }
    for slot in 0..dir.max_entries {
        region[slot_range(dir, slot)].fill(dir.empty_fill);
    }

    let mut slots = Vec::with_capacity(entries.len());
    for (index, (meta, placement)) in entries.iter().enumerate() {
        let slot = match dir.slots {
            SlotAssignment::Sequential => index,
            SlotAssignment::ByFirstBlock { base } => {
                placement.first_block.saturating_sub(base) as usize
            }
        };
        if slot >= dir.max_entries {
            return Err(Error::CapacityExceeded {
                what: "directory entries",
                needed: slot + 1,
                available: dir.max_entries,
            });
        }
        format.encode_entry(meta, placement, &mut region[slot_range(dir, slot)])?;
        slots.push(slot);
    }
    Ok(slots)
}

/// Stores the per-entry checksum of every slot.
pub fn store_entry_checksums(layout: &Layout, region: &mut [u8]) {
    let dir = &layout.directory;
    let Some(spec) = dir.entry_checksum else {
        return;
    };
    for slot in 0..dir.max_entries {
        checksum::store(&spec, &mut region[slot_range(dir, slot)], layout.endian);
    }
}

/// Reports per-entry checksum mismatches on occupied slots.
pub fn verify_entry_checksums<F: Format>(format: &F, region: &[u8], warnings: &mut Vec<Warning>) {
    let layout = format.layout();
    let Some(spec) = layout.directory.entry_checksum else {
        return;
    };
    for (slot, raw) in raw_slots(&layout.directory, region).enumerate() {
        if format.entry_is_empty(raw) || checksum::verify(&spec, raw, layout.endian) {
            continue;
        }
        let warning = Warning::new(
            format!("{} directory entry {slot}", layout.name),
            WarningKind::ChecksumMismatch,
        );
        warn!("{warning}");
        warnings.push(warning);
    }
}
