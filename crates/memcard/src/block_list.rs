//! Chains kept as block lists at the head of each file's data stream.
//!
//! A file's stream starts inside its first block and continues inside every block the list names,
//! after that block's tag. The list is read from the stream itself, so a long list spills into the
//! blocks it names.

use crate::block::BlockStore;
use crate::error::{ChainFault, Error, Result};
use crate::layout::{BlockListLayout, Layout};

const LINK_LEN: usize = 2;

/// A resolved file: its blocks in stream order and the stream left after the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedChain {
    pub blocks: Vec<u16>,
    pub data: Vec<u8>,
}

/// Follows the list that starts in block `start`.
///
/// Every listed block must lie in the data area, carry the data tag and appear once.
pub fn resolve(
    store: &BlockStore,
    layout: &Layout,
    list: &BlockListLayout,
    start: u16,
) -> Result<ListedChain> {
    let fault = |fault| Error::CorruptedChain { start, fault };
    let area = layout.data_area;
    if !area.contains(start) {
        return Err(fault(ChainFault::OutOfRange { block: start }));
    }

    let mut visited = vec![false; layout.total_blocks as usize];
    visited[start as usize] = true;
    let mut blocks = vec![start];
    let mut stream = store.block(start)[list.list_at..].to_vec();
    let mut at = 0;

    loop {
        let Some(raw) = stream.get(at..at + LINK_LEN) else {
            return Err(fault(ChainFault::Runaway {
                steps: blocks.len(),
            }));
        };
        let link = layout.endian.read_u16(raw);
        at += LINK_LEN;
        if link == list.terminator {
            break;
        }
        if !area.contains(link) {
            return Err(fault(ChainFault::OutOfRange { block: link }));
        }
        if visited[link as usize] {
            return Err(fault(ChainFault::Cycle { block: link }));
        }
        let block = store.block(link);
        if block[..list.data_at].iter().any(|&b| b != list.data_tag) {
            return Err(fault(ChainFault::NotData { block: link }));
        }
        visited[link as usize] = true;
        blocks.push(link);
        stream.extend_from_slice(&block[list.data_at..]);
    }

    stream.drain(..at);
    Ok(ListedChain {
        blocks,
        data: stream,
    })
}

/// Blocks a payload of `payload_len` bytes occupies, its list and terminator included.
pub fn blocks_needed(payload_len: usize, layout: &Layout, list: &BlockListLayout) -> usize {
    // The first block also carries the terminator, every further block one list entry.
    let first = layout.block_size - list.list_at - LINK_LEN;
    let further = layout.block_size - list.data_at - LINK_LEN;
    1 + payload_len.saturating_sub(first).div_ceil(further)
}

/// Writes the list and the payload into the blocks of `chain`. The first block's bytes before
/// the list are left alone.
pub fn write(
    store: &mut BlockStore,
    layout: &Layout,
    list: &BlockListLayout,
    chain: &[u16],
    payload: &[u8],
) {
    let mut stream = Vec::with_capacity((chain.len() + 1) * LINK_LEN + payload.len());
    for &block in chain.iter().skip(1) {
        let mut link = [0u8; LINK_LEN];
        layout.endian.write_u16(&mut link, block);
        stream.extend_from_slice(&link);
    }
    let mut end = [0u8; LINK_LEN];
    layout.endian.write_u16(&mut end, list.terminator);
    stream.extend_from_slice(&end);
    stream.extend_from_slice(payload);

    let mut rest = stream.as_slice();
    for (index, &block) in chain.iter().enumerate() {
        let out = store.block_mut(block);
        let body = if index == 0 {
            &mut out[list.list_at..]
        } else {
            out[..list.data_at].fill(list.data_tag);
            &mut out[list.data_at..]
        };
        let take = rest.len().min(body.len());
        body[..take].copy_from_slice(&rest[..take]);
        body[take..].fill(0);
        rest = &rest[take..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::saturn::Saturn;
    use crate::formats::Format;

    fn list(layout: &Layout) -> BlockListLayout {
        match layout.chains {
            crate::layout::ChainStorage::BlockList(list) => list,
            crate::layout::ChainStorage::Table(_) => panic!("saturn lists its blocks"),
        }
    }

    #[test]
    fn long_list_spills_into_listed_blocks() {
        let layout = Saturn::internal().layout().clone();
        let list = list(&layout);
        // 64-byte blocks: 28 bytes after the terminator in the first block, 58 in each other.
        assert_eq!(blocks_needed(28, &layout, &list), 1);
        assert_eq!(blocks_needed(29, &layout, &list), 2);
        assert_eq!(blocks_needed(28 + 58 * 20, &layout, &list), 21);

        let mut store = BlockStore::blank(&layout);
        let payload: Vec<u8> = (0..28 + 58 * 20).map(|i| (i % 251) as u8).collect();
        let chain: Vec<u16> = (2..23).collect();
        write(&mut store, &layout, &list, &chain, &payload);

        let resolved = resolve(&store, &layout, &list, 2).expect("intact list");
        assert_eq!(resolved.blocks, chain);
        assert_eq!(&resolved.data[..payload.len()], payload.as_slice());
    }

    #[test]
    fn listed_block_must_be_tagged_as_data() {
        let layout = Saturn::internal().layout().clone();
        let list = list(&layout);
        let mut store = BlockStore::blank(&layout);
        write(&mut store, &layout, &list, &[2, 3, 4], &[0x5A; 100]);
        store.block_mut(4)[0] = 0x80;
        assert!(matches!(
            resolve(&store, &layout, &list, 2),
            Err(Error::CorruptedChain {
                start: 2,
                fault: ChainFault::NotData { block: 4 }
            })
        ));
    }

    #[test]
    fn list_naming_its_own_first_block_is_a_cycle() {
        let layout = Saturn::internal().layout().clone();
        let list = list(&layout);
        let mut store = BlockStore::blank(&layout);
        write(&mut store, &layout, &list, &[2, 3], &[1; 40]);
        layout
            .endian
            .write_u16(&mut store.block_mut(2)[list.list_at..], 2);
        assert!(matches!(
            resolve(&store, &layout, &list, 2),
            Err(Error::CorruptedChain {
                fault: ChainFault::Cycle { block: 2 },
                ..
            })
        ));
    }
}
