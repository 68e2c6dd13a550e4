use std::fmt::Write as _;

use super::Shape;
use crate::error::{Error, Result};

/// Source symbols held by an encoder, set as a whole block or one by one.
#[derive(Debug, Clone)]
pub struct SourceBlock {
    shape: Shape,
    data: Vec<u8>,
    present: Vec<bool>,
    rank: usize,
}

impl SourceBlock {
    pub(crate) fn new(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0; shape.block_size()],
            present: vec![false; shape.symbols],
            rank: 0,
        }
    }

    pub(crate) fn shape(&self) -> Shape {
        self.shape
    }

    pub(crate) fn rank(&self) -> usize {
        self.rank
    }

    pub(crate) fn is_present(&self, index: usize) -> bool {
        self.present.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn present(&self) -> impl Iterator<Item = usize> + '_ {
        self.present
            .iter()
            .enumerate()
            .filter_map(|(i, &p)| p.then_some(i))
    }

    pub(crate) fn symbol(&self, index: usize) -> &[u8] {
        let size = self.shape.symbol_size;
        &self.data[index * size..(index + 1) * size]
    }

    pub(crate) fn set_symbols(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.shape.block_size() {
            return Err(Error::InvalidParameter(format!(
                "set_symbols expects {} bytes, got {}",
                self.shape.block_size(),
                data.len()
            )));
        }
        self.data.copy_from_slice(data);
        self.present.iter_mut().for_each(|p| *p = true);
        self.rank = self.shape.symbols;
        Ok(())
    }

    pub(crate) fn set_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        if index >= self.shape.symbols {
            return Err(Error::InvalidParameter(format!(
                "symbol index {} out of range ({} symbols)",
                index, self.shape.symbols
            )));
        }
        if data.len() != self.shape.symbol_size {
            return Err(Error::InvalidParameter(format!(
                "set_symbol expects {} bytes, got {}",
                self.shape.symbol_size,
                data.len()
            )));
        }
        let size = self.shape.symbol_size;
        self.data[index * size..(index + 1) * size].copy_from_slice(data);
        if !self.present[index] {
            self.present[index] = true;
            self.rank += 1;
        }
        Ok(())
    }

    /// `symbol_storage` trace zone.
    pub(crate) fn describe(&self) -> String {
        let mut out = String::new();
        for i in 0..self.shape.symbols {
            if self.present[i] {
                let _ = writeln!(out, "{} I: {}", i, hex_line(self.symbol(i)));
            } else {
                let _ = writeln!(out, "{} ?:", i);
            }
        }
        out
    }
}

pub(crate) fn hex_line(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}
