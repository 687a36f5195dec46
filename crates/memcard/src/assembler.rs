//! Payload reconstruction from block chains, and the reverse split.

use crate::block::BlockStore;
use crate::block_list;
use crate::dir_entry::DirectoryEntry;
use crate::error::{Error, Result};
use crate::fat::AllocationTable;
use crate::layout::{BlockListLayout, Layout};

pub fn blocks_needed(payload_len: usize, block_size: usize) -> usize {
    payload_len.div_ceil(block_size)
}

/// Concatenates the blocks of an entry's chain, trimmed to the entry's byte length if it has one.
pub fn assemble<M>(
    entry: &DirectoryEntry<M>,
    table: &AllocationTable,
    store: &BlockStore,
) -> Result<Vec<u8>> {
    let chain = table.resolve_chain(entry.first_block, entry.size_in_blocks.map(usize::from))?;
    let mut payload = Vec::with_capacity(chain.len() * store.block_size());
    for block in chain {
        payload.extend_from_slice(store.block(block));
    }
    trim(payload, entry.byte_len)
}

/// Reads an entry whose blocks are listed in its own data stream. Returns the payload and the
/// number of blocks the file occupies.
pub fn assemble_listed<M>(
    entry: &DirectoryEntry<M>,
    layout: &Layout,
    list: &BlockListLayout,
    store: &BlockStore,
) -> Result<(Vec<u8>, usize)> {
    let chain = block_list::resolve(store, layout, list, entry.first_block)?;
    let blocks = chain.blocks.len();
    Ok((trim(chain.data, entry.byte_len)?, blocks))
}

fn trim(mut payload: Vec<u8>, byte_len: Option<u32>) -> Result<Vec<u8>> {
    if let Some(byte_len) = byte_len {
        let byte_len = byte_len as usize;
        if byte_len > payload.len() || byte_len == 0 {
            return Err(Error::SizeMismatch {
                what: "entry byte length",
                expected: byte_len,
                actual: payload.len(),
            });
        }
        payload.truncate(byte_len);
    }
    Ok(payload)
}

/// Splits a payload into block-sized pieces, zero padding the last.
pub fn partition(payload: &[u8], block_size: usize) -> Vec<Vec<u8>> {
    payload
        .chunks(block_size)
        .map(|chunk| {
            let mut block = chunk.to_vec();
            block.resize(block_size, 0);
            block
        })
        .collect()
}
