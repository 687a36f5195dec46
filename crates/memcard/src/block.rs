//! Fixed-size block access over an in-memory image.

use log::debug;

use crate::error::{Error, Result};
use crate::layout::{Layout, Region};

/// One addressable block of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub index: u16,
    pub data: Vec<u8>,
}

/// A whole image viewed as `total_blocks` blocks of `block_size` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStore {
    block_size: usize,
    total_blocks: u16,
    bytes: Vec<u8>,
}

impl BlockStore {
    /// Takes ownership of an image after checking it against the layout's geometry.
    ///
    /// Images longer than the layout are accepted and cut to size: several dump tools append
    /// trailing padding or metadata after the card contents.
    pub fn split(image: &[u8], layout: &Layout) -> Result<Self> {
        if image.len() % layout.block_size != 0 || image.len() < layout.min_image_len {
            return Err(Error::SizeMismatch {
                what: "image length",
                expected: layout.image_len(),
                actual: image.len(),
            });
        }
        let wanted = layout.image_len();
        if image.len() > wanted {
            debug!(
                "{}: ignoring {} trailing bytes",
                layout.name,
                image.len() - wanted
            );
        }
        Ok(Self {
            block_size: layout.block_size,
            total_blocks: layout.total_blocks,
            bytes: image[..wanted].to_vec(),
        })
    }

    /// An image of the layout's size with every byte set to its fill value.
    pub fn blank(layout: &Layout) -> Self {
        Self {
            block_size: layout.block_size,
            total_blocks: layout.total_blocks,
            bytes: vec![layout.fill; layout.image_len()],
        }
    }

    /// Rebuilds an image from blocks given in physical order.
    pub fn assemble<I>(blocks: I, layout: &Layout) -> Result<Self>
    where
        I: IntoIterator<Item = Block>,
    {
        let mut bytes = Vec::with_capacity(layout.image_len());
        let mut expected_index = 0u16;
        for block in blocks {
            if block.data.len() != layout.block_size {
                return Err(Error::SizeMismatch {
                    what: "block length",
                    expected: layout.block_size,
                    actual: block.data.len(),
                });
            }
            if block.index != expected_index {
                return Err(Error::UnsupportedField {
                    field: "block index out of order",
                    value: block.index as u64,
                });
            }
            bytes.extend_from_slice(&block.data);
            expected_index += 1;
        }
        if expected_index != layout.total_blocks {
            return Err(Error::SizeMismatch {
                what: "block count",
                expected: layout.total_blocks as usize,
                actual: expected_index as usize,
            });
        }
        Ok(Self {
            block_size: layout.block_size,
            total_blocks: layout.total_blocks,
            bytes,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn total_blocks(&self) -> u16 {
        self.total_blocks
    }

    pub fn block(&self, index: u16) -> &[u8] {
        let start = index as usize * self.block_size;
        &self.bytes[start..start + self.block_size]
    }

    pub fn block_mut(&mut self, index: u16) -> &mut [u8] {
        let start = index as usize * self.block_size;
        &mut self.bytes[start..start + self.block_size]
    }

    /// Every block in physical order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.bytes
            .chunks_exact(self.block_size)
            .enumerate()
            .map(|(index, data)| Block {
                index: index as u16,
                data: data.to_vec(),
            })
    }

    /// Copies a region out with its blocks in logical order.
    pub fn read_region(&self, region: &Region) -> Vec<u8> {
        let mut out = Vec::with_capacity(region.count as usize * self.block_size);
        for physical in region.blocks() {
            out.extend_from_slice(self.block(physical));
        }
        out
    }

    /// Writes logically ordered bytes back into a region. Short input leaves the tail untouched.
    pub fn write_region(&mut self, region: &Region, data: &[u8]) {
        let block_size = self.block_size;
        for (chunk, physical) in data.chunks(block_size).zip(region.blocks()) {
            self.block_mut(physical)[..chunk.len()].copy_from_slice(chunk);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_image(self) -> Vec<u8> {
        self.bytes
    }
}
