//! Parsing images into volumes and building images from volumes.

use log::{debug, warn};
use serde::Serialize;

use crate::assembler::{self, blocks_needed};
use crate::backup::{self, Candidate, Selected, Source};
use crate::block::BlockStore;
use crate::block_list;
use crate::checksum;
use crate::dir_entry::{self, DirectoryEntry, Placement};
use crate::error::{Error, Result, Warning, WarningKind};
use crate::fat::{self, AllocationTable};
use crate::formats::Format;
use crate::layout::{
    AllocationLayout, BlockListLayout, ChainStorage, ChecksumSpec, CorruptFilePolicy, Layout, Region,
};

/// A save file: directory metadata and the payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveFile<M> {
    pub meta: M,
    #[serde(skip)]
    pub payload: Vec<u8>,
}

impl<M> SaveFile<M> {
    pub fn new(meta: M, payload: Vec<u8>) -> Self {
        Self { meta, payload }
    }
}

/// A file dropped by a parse under [`CorruptFilePolicy::SkipCorruptFile`].
#[derive(Debug)]
pub struct SkippedFile {
    pub slot: usize,
    pub error: Error,
}

/// A parsed or built card image.
#[derive(Debug)]
pub struct Volume<F: Format> {
    format: F,
    header: F::Header,
    files: Vec<SaveFile<F::Meta>>,
    slots: Vec<usize>,
    skipped: Vec<SkippedFile>,
    warnings: Vec<Warning>,
    used_blocks: u16,
    free_blocks: u16,
    image: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Redundant {
    Directory,
    AllocationTable(AllocationLayout),
}

impl Redundant {
    fn name(self) -> &'static str {
        match self {
            Redundant::Directory => "directory",
            Redundant::AllocationTable(_) => "allocation table",
        }
    }
}

/// How the files of a parsed image are linked.
enum Chains {
    Table(AllocationTable),
    Listed(BlockListLayout),
}

/// Reads the primary and backup copy of a redundant structure.
fn read_pair(
    store: &BlockStore,
    layout: &Layout,
    structure: Redundant,
    warnings: &mut Vec<Warning>,
) -> (Option<Candidate>, Option<Candidate>) {
    let (primary, backup, spec, counter_at) = match structure {
        Redundant::Directory => {
            let dir = &layout.directory;
            (dir.primary, dir.backup, dir.checksum, dir.update_counter)
        }
        Redundant::AllocationTable(alloc) => {
            (alloc.primary, alloc.backup, alloc.checksum, alloc.update_counter)
        }
    };
    let mut read = |region: &Region, copy: &str| {
        backup::read_copy(
            store,
            region,
            spec,
            counter_at,
            layout.endian,
            format!("{} {} ({copy})", layout.name, structure.name()),
            warnings,
        )
    };
    let first = read(&primary, "primary");
    let second = backup.and_then(|region| read(&region, "backup"));
    (first, second)
}

fn note_backup_in_use<T>(
    selected: &Selected<T>,
    primary_valid: bool,
    structure: String,
    warnings: &mut Vec<Warning>,
) {
    if selected.source == Source::Backup && !primary_valid {
        let warning = Warning::new(structure, WarningKind::BackupInUse);
        warn!("{warning}");
        warnings.push(warning);
    }
}

impl<F: Format> Volume<F> {
    /// Decodes a card image.
    pub fn parse(format: F, image: &[u8]) -> Result<Self> {
        let layout = format.layout().clone();
        let store = BlockStore::split(image, &layout)?;
        format.check_signature(&store)?;
        let mut warnings = Vec::new();

        if let Some(spec) = layout.header.checksum {
            let bytes = store.read_region(&layout.header.region);
            if !checksum::verify(&spec, &bytes, layout.endian) {
                if spec.critical {
                    return Err(Error::VolumeCorrupted { structure: "header" });
                }
                warnings.push(Warning::new(
                    format!("{} header", layout.name),
                    WarningKind::ChecksumMismatch,
                ));
            }
        }
        let header = format.decode_header(&store, &mut warnings)?;

        let (primary, backup_copy) = read_pair(&store, &layout, Redundant::Directory, &mut warnings);
        let primary_valid = primary.is_some();
        let directory = backup::select(primary, backup_copy, "directory")?;
        note_backup_in_use(
            &directory,
            primary_valid,
            format!("{} directory", layout.name),
            &mut warnings,
        );
        let directory = directory.value.bytes;
        dir_entry::verify_entry_checksums(&format, &directory, &mut warnings);
        let entries = dir_entry::decode_directory(&format, &directory, &store);

        let chains = match layout.chains {
            ChainStorage::Table(alloc) => Chains::Table(Self::select_table(
                &layout,
                &alloc,
                &store,
                &entries,
                &mut warnings,
            )?),
            ChainStorage::BlockList(list) => Chains::Listed(list),
        };

        let mut files = Vec::new();
        let mut slots = Vec::new();
        let mut skipped = Vec::new();
        let mut listed_blocks = 0usize;
        for (slot, entry) in entries {
            let file = entry.and_then(|entry| {
                let payload = match &chains {
                    Chains::Table(table) => assembler::assemble(&entry, table, &store)?,
                    Chains::Listed(list) => {
                        let (payload, blocks) =
                            assembler::assemble_listed(&entry, &layout, list, &store)?;
                        listed_blocks += blocks;
                        payload
                    }
                };
                format.check_payload(&entry.meta, &payload)?;
                Ok(SaveFile::new(entry.meta, payload))
            });
            match file {
                Ok(file) => {
                    files.push(file);
                    slots.push(slot);
                }
                Err(error)
                    if error.is_per_file()
                        && layout.corrupt_file_policy == CorruptFilePolicy::SkipCorruptFile =>
                {
                    warn!("{}: skipping file in slot {slot}: {error}", layout.name);
                    skipped.push(SkippedFile { slot, error });
                }
                Err(error) => return Err(error),
            }
        }

        let free_blocks = match &chains {
            Chains::Table(table) => table.free_blocks(),
            // A skipped file still holds the block its record lives in.
            Chains::Listed(_) => {
                let used = (listed_blocks + skipped.len()).min(layout.data_area.count as usize);
                layout.data_area.count - used as u16
            }
        };
        debug!(
            "{}: {} files, {} free blocks",
            layout.name,
            files.len(),
            free_blocks
        );
        Ok(Self {
            format,
            header,
            files,
            slots,
            skipped,
            warnings,
            used_blocks: layout.total_blocks - free_blocks,
            free_blocks,
            image: store.into_image(),
        })
    }

    fn select_table(
        layout: &Layout,
        alloc: &AllocationLayout,
        store: &BlockStore,
        entries: &[(usize, Result<DirectoryEntry<F::Meta>>)],
        warnings: &mut Vec<Warning>,
    ) -> Result<AllocationTable> {
        let structure = Redundant::AllocationTable(*alloc);
        let (primary, backup_copy) = read_pair(store, layout, structure, warnings);

        if !alloc.consistency_check {
            let primary_valid = primary.is_some();
            let selected = backup::select(primary, backup_copy, "allocation table")?;
            note_backup_in_use(
                &selected,
                primary_valid,
                format!("{} allocation table", layout.name),
                warnings,
            );
            return AllocationTable::decode(&selected.value.bytes, layout, alloc);
        }

        let starts: Vec<u16> = entries
            .iter()
            .filter_map(|(_, entry)| entry.as_ref().ok().map(|entry| entry.first_block))
            .collect();
        let consistent = |candidate: Option<Candidate>| {
            candidate
                .and_then(|candidate| AllocationTable::decode(&candidate.bytes, layout, alloc).ok())
                .filter(|table| table.is_consistent_with(&starts))
        };
        let primary = consistent(primary);
        let primary_valid = primary.is_some();
        let selected = backup::select(
            primary.map(Unversioned),
            consistent(backup_copy).map(Unversioned),
            "allocation table",
        )?;
        note_backup_in_use(
            &selected,
            primary_valid,
            format!("{} allocation table", layout.name),
            warnings,
        );
        Ok(selected.value.0)
    }

    /// Encodes `files` and `header` into a fresh image.
    ///
    /// Nothing is produced when the files do not fit.
    pub fn build(format: F, header: F::Header, files: Vec<SaveFile<F::Meta>>) -> Result<Self> {
        let layout = format.layout().clone();
        let dir = &layout.directory;

        if files.len() > dir.max_entries {
            return Err(Error::CapacityExceeded {
                what: "directory entries",
                needed: files.len(),
                available: dir.max_entries,
            });
        }
        let mut sizes = Vec::with_capacity(files.len());
        for file in &files {
            let blocks = blocks_needed(file.payload.len(), layout.block_size);
            if file.payload.is_empty()
                || (!dir.stores_byte_len && file.payload.len() % layout.block_size != 0)
            {
                return Err(Error::SizeMismatch {
                    what: "payload length",
                    expected: blocks.max(1) * layout.block_size,
                    actual: file.payload.len(),
                });
            }
            format.check_payload(&file.meta, &file.payload)?;
            sizes.push(match &layout.chains {
                ChainStorage::Table(_) => blocks,
                ChainStorage::BlockList(list) => {
                    block_list::blocks_needed(file.payload.len(), &layout, list)
                }
            });
        }
        let (table, chains) = match &layout.chains {
            ChainStorage::Table(alloc) => {
                let (table, chains) = AllocationTable::allocate(&layout, alloc, &sizes)?;
                (Some(table), chains)
            }
            ChainStorage::BlockList(_) => (None, fat::place_chains(&layout, &sizes)?),
        };

        let mut store = BlockStore::blank(&layout);
        if table.is_some() {
            for (file, chain) in files.iter().zip(&chains) {
                for (data, &block) in assembler::partition(&file.payload, layout.block_size)
                    .iter()
                    .zip(chain)
                {
                    store.block_mut(block).copy_from_slice(data);
                }
            }
        }

        format.encode_header(&header, &mut store)?;

        let placed: Vec<(&F::Meta, Placement)> = files
            .iter()
            .zip(&chains)
            .map(|(file, chain)| {
                (
                    &file.meta,
                    Placement {
                        first_block: chain[0],
                        size_in_blocks: chain.len() as u16,
                        byte_len: file.payload.len() as u32,
                    },
                )
            })
            .collect();
        let mut directory = store.read_region(&dir.primary);
        let slots = dir_entry::encode_directory(&format, &placed, &mut directory)?;
        store.write_region(&dir.primary, &directory);

        // Listed files share their first block with their record, so they go in after it.
        if let ChainStorage::BlockList(list) = &layout.chains {
            for (file, chain) in files.iter().zip(&chains) {
                block_list::write(&mut store, &layout, list, chain, &file.payload);
            }
        }

        if let (Some(table), Some(alloc)) = (&table, layout.allocation()) {
            let mut allocation = store.read_region(&alloc.primary);
            table.encode(&layout, alloc, &mut allocation);
            store.write_region(&alloc.primary, &allocation);
        }

        let mut directory = store.read_region(&dir.primary);
        dir_entry::store_entry_checksums(&layout, &mut directory);
        finish_structure(&layout, &mut directory, dir.update_counter, dir.checksum.as_ref());
        store.write_region(&dir.primary, &directory);
        if let Some(backup_region) = &dir.backup {
            store.write_region(backup_region, &directory);
        }

        if let Some(alloc) = layout.allocation() {
            let mut allocation = store.read_region(&alloc.primary);
            finish_structure(&layout, &mut allocation, alloc.update_counter, alloc.checksum.as_ref());
            store.write_region(&alloc.primary, &allocation);
            if let Some(backup_region) = &alloc.backup {
                store.write_region(backup_region, &allocation);
            }
        }

        if let Some(spec) = &layout.header.checksum {
            let mut header_bytes = store.read_region(&layout.header.region);
            checksum::store(spec, &mut header_bytes, layout.endian);
            store.write_region(&layout.header.region, &header_bytes);
        }

        let free_blocks = match &table {
            Some(table) => table.free_blocks(),
            None => layout.data_area.count - sizes.iter().sum::<usize>() as u16,
        };
        debug!(
            "{}: built {} files, {} free blocks",
            layout.name,
            files.len(),
            free_blocks
        );
        Ok(Self {
            format,
            header,
            files,
            slots,
            skipped: Vec::new(),
            warnings: Vec::new(),
            used_blocks: layout.total_blocks - free_blocks,
            free_blocks,
            image: store.into_image(),
        })
    }

    pub fn format(&self) -> &F {
        &self.format
    }

    pub fn layout(&self) -> &Layout {
        self.format.layout()
    }

    pub fn header(&self) -> &F::Header {
        &self.header
    }

    pub fn files(&self) -> &[SaveFile<F::Meta>] {
        &self.files
    }

    /// Directory slot of each file, in the order of [`Volume::files`].
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    pub fn into_files(self) -> Vec<SaveFile<F::Meta>> {
        self.files
    }

    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn block_size(&self) -> usize {
        self.layout().block_size
    }

    pub fn total_blocks(&self) -> u16 {
        self.layout().total_blocks
    }

    pub fn total_size(&self) -> usize {
        self.image.len()
    }

    pub fn used_blocks(&self) -> u16 {
        self.used_blocks
    }

    pub fn free_blocks(&self) -> u16 {
        self.free_blocks
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn into_image(self) -> Vec<u8> {
        self.image
    }
}

/// A decoded table stands in for a copy whose recency is not recorded.
struct Unversioned(AllocationTable);

impl backup::Versioned for Unversioned {
    fn update_counter(&self) -> Option<i16> {
        None
    }
}

/// Resets the update counter of a freshly built structure and stores its checksum.
fn finish_structure(
    layout: &Layout,
    bytes: &mut [u8],
    counter_at: Option<usize>,
    spec: Option<&ChecksumSpec>,
) {
    if let Some(at) = counter_at {
        layout.endian.write_i16(&mut bytes[at..], 0);
    }
    if let Some(spec) = spec {
        checksum::store(spec, bytes, layout.endian);
    }
}
