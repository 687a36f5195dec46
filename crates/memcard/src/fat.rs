//! Block allocation table: one link per block, chained into a singly linked list per file.

use std::collections::HashSet;

use log::debug;

use crate::error::{ChainFault, Error, Result};
use crate::layout::{AllocationLayout, AllocationPolicy, Layout, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Free,
    End,
    Damaged,
    Next(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTable {
    first_block: u16,
    total_blocks: u16,
    data_area: Region,
    links: Vec<Link>,
}

impl AllocationTable {
    fn empty(layout: &Layout, alloc: &AllocationLayout) -> Self {
        let described = alloc
            .slots
            .min(layout.total_blocks.saturating_sub(alloc.first_block));
        Self {
            first_block: alloc.first_block,
            total_blocks: layout.total_blocks,
            data_area: layout.data_area,
            links: vec![Link::Free; described as usize],
        }
    }

    /// Decodes the table from the bytes of its region, in logical order.
    pub fn decode(region: &[u8], layout: &Layout, alloc: &AllocationLayout) -> Result<Self> {
        let sentinels = alloc.sentinels;
        let mut table = Self::empty(layout, alloc);

        for (slot, link) in table.links.iter_mut().enumerate() {
            let block = alloc.first_block + slot as u16;
            let offset = alloc.table_at + slot * alloc.stride;

            if let Some(status) = alloc.status {
                let byte = region[offset + status.offset];
                if byte & status.free_mask == status.free {
                    *link = Link::Free;
                    continue;
                }
                if byte == status.unusable {
                    *link = Link::Damaged;
                    continue;
                }
                if ![status.first, status.middle, status.last].contains(&byte) {
                    return Err(Error::UnsupportedField {
                        field: "allocation status",
                        value: byte as u64,
                    });
                }
            }

            let raw = layout.endian.read_u16(&region[offset + alloc.link_at..]);
            *link = if raw == sentinels.end {
                Link::End
            } else if raw == sentinels.free {
                Link::Free
            } else if sentinels.damaged == Some(raw) {
                Link::Damaged
            } else {
                let target = raw as u32 + alloc.value_base as u32;
                let in_range = target < layout.total_blocks as u32
                    && (!layout.data_area.contains(block)
                        || layout.data_area.contains(target as u16));
                if !in_range {
                    return Err(Error::UnsupportedField {
                        field: "allocation link",
                        value: raw as u64,
                    });
                }
                Link::Next(target as u16)
            };
        }
        Ok(table)
    }

    /// The link stored for `block`, or `None` when the table does not describe it.
    pub fn link(&self, block: u16) -> Option<Link> {
        block
            .checked_sub(self.first_block)
            .and_then(|slot| self.links.get(slot as usize))
            .copied()
    }

    fn set(&mut self, block: u16, link: Link) {
        if let Some(slot) = block.checked_sub(self.first_block) {
            if let Some(entry) = self.links.get_mut(slot as usize) {
                *entry = link;
            }
        }
    }

    /// Follows a file's chain from `start`.
    ///
    /// Never takes more than `total_blocks` steps, whatever the table holds.
    pub fn resolve_chain(&self, start: u16, declared: Option<usize>) -> Result<Vec<u16>> {
        let fault = |fault| Error::CorruptedChain { start, fault };
        let mut visited = vec![false; self.total_blocks as usize];
        let mut chain = Vec::new();
        let mut current = start;

        for _ in 0..self.total_blocks {
            if !self.data_area.contains(current) {
                return Err(fault(ChainFault::OutOfRange { block: current }));
            }
            if visited[current as usize] {
                return Err(fault(ChainFault::Cycle { block: current }));
            }
            visited[current as usize] = true;
            chain.push(current);

            match self.link(current) {
                None => return Err(fault(ChainFault::OutOfRange { block: current })),
                Some(Link::Free) => return Err(fault(ChainFault::Unallocated { block: current })),
                Some(Link::Damaged) => return Err(fault(ChainFault::Damaged { block: current })),
                Some(Link::Next(next)) => current = next,
                Some(Link::End) => {
                    return match declared {
                        Some(declared) if declared != chain.len() => {
                            Err(fault(ChainFault::LengthMismatch {
                                declared,
                                actual: chain.len(),
                            }))
                        }
                        _ => Ok(chain),
                    };
                }
            }
        }
        Err(fault(ChainFault::Runaway {
            steps: self.total_blocks as usize,
        }))
    }

    /// Lays out one chain per requested size and chains the layout's reserved regions.
    pub fn allocate(
        layout: &Layout,
        alloc: &AllocationLayout,
        sizes: &[usize],
    ) -> Result<(Self, Vec<Vec<u16>>)> {
        let chains = place_chains(layout, sizes)?;
        let mut table = Self::empty(layout, alloc);
        for chain in &chains {
            table.link_chain(chain);
        }
        for region in alloc.reserved_chains {
            let chain: Vec<u16> = region.blocks().collect();
            table.link_chain(&chain);
        }
        Ok((table, chains))
    }

    fn link_chain(&mut self, chain: &[u16]) {
        for pair in chain.windows(2) {
            self.set(pair[0], Link::Next(pair[1]));
        }
        if let Some(&last) = chain.last() {
            self.set(last, Link::End);
        }
    }

    /// Writes the table into its region buffer, which is in logical order.
    pub fn encode(&self, layout: &Layout, alloc: &AllocationLayout, region: &mut [u8]) {
        let sentinels = alloc.sentinels;
        if let Some(fill) = alloc.region_fill {
            region.fill(fill);
        }

        let has_predecessor: HashSet<u16> = self
            .links
            .iter()
            .filter_map(|link| match link {
                Link::Next(next) => Some(*next),
                _ => None,
            })
            .collect();

        for (slot, link) in self.links.iter().enumerate() {
            let block = self.first_block + slot as u16;
            let offset = alloc.table_at + slot * alloc.stride;

            if let Some(status) = alloc.status {
                region[offset + status.offset] = match link {
                    Link::Free => status.free,
                    Link::Damaged => status.unusable,
                    Link::Next(_) if has_predecessor.contains(&block) => status.middle,
                    Link::End if has_predecessor.contains(&block) => status.last,
                    Link::Next(_) | Link::End => status.first,
                };
            }

            let raw = match link {
                Link::Free => sentinels.free,
                Link::End => sentinels.end,
                Link::Damaged => sentinels.damaged.unwrap_or(sentinels.free),
                Link::Next(next) => next - alloc.value_base,
            };
            layout
                .endian
                .write_u16(&mut region[offset + alloc.link_at..], raw);
        }

        if let Some(at) = alloc.free_count_at {
            layout.endian.write_u16(&mut region[at..], self.free_blocks());
        }
        if let Some(at) = alloc.last_allocated_at {
            let last = self
                .data_area
                .blocks()
                .filter(|&block| !matches!(self.link(block), Some(Link::Free) | None))
                .max()
                .unwrap_or(self.first_block.saturating_sub(1));
            layout.endian.write_u16(&mut region[at..], last);
        }
    }

    /// Unallocated blocks inside the data area.
    pub fn free_blocks(&self) -> u16 {
        self.data_area
            .blocks()
            .filter(|&block| self.link(block) == Some(Link::Free))
            .count() as u16
    }

    /// Whether every chain resolves and the allocated data blocks are exactly the union of the
    /// chains starting at `starts`.
    pub fn is_consistent_with(&self, starts: &[u16]) -> bool {
        let mut claimed = HashSet::new();
        for &start in starts {
            let Ok(chain) = self.resolve_chain(start, None) else {
                return false;
            };
            for block in chain {
                if !claimed.insert(block) {
                    return false;
                }
            }
        }
        let allocated = self
            .data_area
            .blocks()
            .filter(|&block| self.link(block) != Some(Link::Free))
            .count();
        allocated == claimed.len()
    }
}

/// Picks the blocks of one chain per requested size, packed from the end of the data area the
/// allocation policy names.
pub fn place_chains(layout: &Layout, sizes: &[usize]) -> Result<Vec<Vec<u16>>> {
    let needed: usize = sizes.iter().sum();
    let available = layout.data_area.count as usize;
    if needed > available {
        return Err(Error::CapacityExceeded {
            what: "data blocks",
            needed,
            available,
        });
    }
    if sizes.contains(&0) {
        return Err(Error::UnsupportedField {
            field: "file size in blocks",
            value: 0,
        });
    }

    let area = layout.data_area;
    let mut chains = Vec::with_capacity(sizes.len());
    let mut used = 0u16;
    for &size in sizes {
        let size = size as u16;
        let chain: Vec<u16> = match layout.allocation_policy {
            AllocationPolicy::Ascending => (area.first + used..area.first + used + size).collect(),
            AllocationPolicy::Descending => {
                let top = area.end() - 1 - used;
                (0..size).map(|i| top - i).collect()
            }
        };
        used += size;
        chains.push(chain);
    }

    debug!(
        "{}: allocated {} blocks for {} files",
        layout.name,
        used,
        sizes.len()
    );
    Ok(chains)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::dreamcast::Dreamcast;
    use crate::formats::gamecube::GameCube;
    use crate::formats::ps1::Ps1;
    use crate::formats::Format;

    fn alloc(layout: &Layout) -> AllocationLayout {
        *layout.allocation().expect("card keeps an allocation table")
    }

    fn encoded(layout: &Layout, table: &AllocationTable) -> Vec<u8> {
        let alloc = alloc(layout);
        let mut region = vec![0u8; layout.region_len(&alloc.primary)];
        table.encode(layout, &alloc, &mut region);
        region
    }

    #[test]
    fn descending_allocation_links_downward() {
        let layout = Dreamcast::default().layout().clone();
        let (table, chains) = AllocationTable::allocate(&layout, &alloc(&layout), &[3, 2]).expect("fits");
        assert_eq!(chains[0], vec![199, 198, 197]);
        assert_eq!(chains[1], vec![196, 195]);
        assert_eq!(table.link(199), Some(Link::Next(198)));
        assert_eq!(table.link(197), Some(Link::End), "lowest block ends the chain");
        assert_eq!(table.link(253), Some(Link::Next(252)), "directory blocks are chained");
        assert_eq!(table.link(241), Some(Link::End));
        assert_eq!(table.free_blocks(), 195);
    }

    #[test]
    fn decode_reads_back_encoded_chains() {
        let layout = GameCube::default().layout().clone();
        let (table, chains) = AllocationTable::allocate(&layout, &alloc(&layout), &[2, 1]).expect("fits");
        let region = encoded(&layout, &table);
        let decoded = AllocationTable::decode(&region, &layout, &alloc(&layout)).expect("valid table");
        assert_eq!(decoded, table);
        assert_eq!(
            decoded.resolve_chain(chains[0][0], Some(2)).expect("chain"),
            vec![5, 6]
        );
        assert_eq!(layout.endian.read_u16(&region[8..]), 7, "last allocated block");
    }

    #[test]
    fn status_bytes_mark_first_middle_last() {
        let layout = Ps1::default().layout().clone();
        let (table, _) = AllocationTable::allocate(&layout, &alloc(&layout), &[3, 1]).expect("fits");
        let region = encoded(&layout, &table);
        let frame = |block: usize| &region[block * 0x80..(block + 1) * 0x80];
        assert_eq!(frame(1)[0], 0x51);
        assert_eq!(frame(2)[0], 0x52);
        assert_eq!(frame(3)[0], 0x53);
        assert_eq!(frame(4)[0], 0x51, "single block file is a first block");
        assert_eq!(layout.endian.read_u16(&frame(4)[8..]), 0xFFFF);
        assert_eq!(layout.endian.read_u16(&frame(1)[8..]), 1, "links are data block indices");
        assert_eq!(frame(5)[0], 0xA0);
    }

    #[test]
    fn chain_with_length_disagreement_is_corrupted() {
        let layout = GameCube::default().layout().clone();
        let (table, _) = AllocationTable::allocate(&layout, &alloc(&layout), &[2]).expect("fits");
        assert!(matches!(
            table.resolve_chain(5, Some(3)),
            Err(Error::CorruptedChain {
                fault: ChainFault::LengthMismatch { declared: 3, actual: 2 },
                ..
            })
        ));
        assert!(matches!(
            table.resolve_chain(9, None),
            Err(Error::CorruptedChain {
                fault: ChainFault::Unallocated { block: 9 },
                ..
            })
        ));
    }

    #[test]
    fn consistency_rejects_orphan_blocks() {
        let layout = GameCube::default().layout().clone();
        let (table, chains) = AllocationTable::allocate(&layout, &alloc(&layout), &[2, 2]).expect("fits");
        assert!(table.is_consistent_with(&[chains[0][0], chains[1][0]]));
        assert!(
            !table.is_consistent_with(&[chains[0][0]]),
            "second chain's blocks are allocated but unclaimed"
        );
    }
}
