use std::fmt::Write as _;

use log::trace;
use rand::Rng;

use super::block::hex_line;
use super::Shape;
use crate::error::{Error, Result};
use crate::field::Field;

/// Incremental Gaussian elimination over `F`.
///
/// Rows are kept in reduced echelon form: row `i` exists only when symbol
/// `i` is a pivot, has a one in column `i` and zeros in every other pivot
/// column. A row equal to the unit vector marks an uncoded (decoded) symbol.
#[derive(Debug, Clone)]
pub struct DecodingMatrix<F: Field> {
    shape: Shape,
    data: Vec<u8>,
    rows: Vec<Option<Vec<F::Elem>>>,
    uncoded: Vec<bool>,
    rank: usize,
}

impl<F: Field> DecodingMatrix<F> {
    pub(crate) fn new(shape: Shape) -> Self {
        Self {
            shape,
            data: vec![0; shape.block_size()],
            rows: vec![None; shape.symbols],
            uncoded: vec![false; shape.symbols],
            rank: 0,
        }
    }

    pub(crate) fn shape(&self) -> Shape {
        self.shape
    }

    pub(crate) fn rank(&self) -> usize {
        self.rank
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.rank == self.shape.symbols
    }

    pub(crate) fn is_pivot(&self, index: usize) -> bool {
        self.rows.get(index).map_or(false, Option::is_some)
    }

    pub(crate) fn is_uncoded(&self, index: usize) -> bool {
        self.uncoded.get(index).copied().unwrap_or(false)
    }

    pub(crate) fn symbols_uncoded(&self) -> usize {
        self.uncoded.iter().filter(|&&u| u).count()
    }

    pub(crate) fn symbol(&self, index: usize) -> &[u8] {
        let size = self.shape.symbol_size;
        &self.data[index * size..(index + 1) * size]
    }

    pub(crate) fn block(&self) -> &[u8] {
        &self.data
    }

    fn symbol_mut(&mut self, index: usize) -> &mut [u8] {
        let size = self.shape.symbol_size;
        &mut self.data[index * size..(index + 1) * size]
    }

    fn check_symbol(&self, symbol: &[u8]) -> Result<()> {
        if symbol.len() != self.shape.symbol_size {
            return Err(Error::InvalidParameter(format!(
                "symbol holds {} bytes, expected {}",
                symbol.len(),
                self.shape.symbol_size
            )));
        }
        Ok(())
    }

    /// Consumes a systematic symbol. Returns whether the rank grew.
    pub(crate) fn read_uncoded(&mut self, index: usize, symbol: &[u8]) -> Result<bool> {
        if index >= self.shape.symbols {
            return Err(Error::InvalidPayload(format!(
                "symbol index {} out of range ({} symbols)",
                index, self.shape.symbols
            )));
        }
        self.check_symbol(symbol)?;
        if self.uncoded[index] {
            return Ok(false);
        }
        // A coded pivot row already sits at `index`: keep what it carries
        // beyond the unit vector and feed that back in as a new equation.
        let leftover = self.rows[index].take().map(|mut row| {
            let mut data = self.symbol(index).to_vec();
            row[index] = F::zero();
            F::multiply_add(&mut data, symbol, F::one());
            (row, data)
        });
        let grew = leftover.is_none();

        self.symbol_mut(index).copy_from_slice(symbol);
        let mut unit = vec![F::zero(); self.shape.symbols];
        unit[index] = F::one();
        self.eliminate_column(index, &unit);
        self.rows[index] = Some(unit);
        self.uncoded[index] = true;
        if grew {
            self.rank += 1;
        }

        if let Some((row, data)) = leftover {
            return Ok(self.read_coded(row, data)? || grew);
        }
        Ok(grew)
    }

    /// Consumes a coded symbol. Returns whether it was innovative.
    pub(crate) fn read_coded(&mut self, mut coefficients: Vec<F::Elem>, mut symbol: Vec<u8>) -> Result<bool> {
        if coefficients.len() != self.shape.symbols {
            return Err(Error::InvalidPayload(format!(
                "coefficient vector has {} entries, expected {}",
                coefficients.len(),
                self.shape.symbols
            )));
        }
        self.check_symbol(&symbol)?;

        // Forward substitution against every existing pivot.
        for j in 0..self.shape.symbols {
            let c = coefficients[j];
            if F::is_zero(c) {
                continue;
            }
            if let Some(row) = &self.rows[j] {
                for (dst, &src) in coefficients.iter_mut().zip(row.iter()) {
                    *dst = F::sub(*dst, F::mul(c, src));
                }
                F::multiply_add(&mut symbol, self.symbol(j), c);
            }
        }

        let pivot = match coefficients.iter().position(|&c| !F::is_zero(c)) {
            Some(p) => p,
            None => {
                trace!("non-innovative symbol dropped at rank {}", self.rank);
                return Ok(false);
            }
        };

        let scale = F::inv(coefficients[pivot]);
        for c in coefficients.iter_mut() {
            *c = F::mul(scale, *c);
        }
        F::multiply(&mut symbol, scale);

        self.symbol_mut(pivot).copy_from_slice(&symbol);
        self.eliminate_column(pivot, &coefficients);
        self.uncoded[pivot] = is_unit::<F>(&coefficients, pivot);
        self.rows[pivot] = Some(coefficients);
        self.rank += 1;
        Ok(true)
    }

    /// Backward substitution: clears column `pivot` from every other row
    /// using the (normalized) row `source` stored at `pivot`.
    fn eliminate_column(&mut self, pivot: usize, source: &[F::Elem]) {
        let size = self.shape.symbol_size;
        let source_data = self.symbol(pivot).to_vec();
        for i in 0..self.shape.symbols {
            if i == pivot {
                continue;
            }
            let factor = match &self.rows[i] {
                Some(row) if !F::is_zero(row[pivot]) => row[pivot],
                _ => continue,
            };
            if let Some(row) = self.rows[i].as_mut() {
                for (dst, &src) in row.iter_mut().zip(source.iter()) {
                    *dst = F::sub(*dst, F::mul(factor, src));
                }
            }
            F::multiply_add(&mut self.data[i * size..(i + 1) * size], &source_data, factor);
            if let Some(row) = &self.rows[i] {
                self.uncoded[i] = is_unit::<F>(row, i);
            }
        }
    }

    /// Random nonzero combination of the stored rows. `None` when nothing
    /// has been received yet.
    pub(crate) fn recode<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(Vec<F::Elem>, Vec<u8>)> {
        if self.rank == 0 {
            return None;
        }
        loop {
            let mut coefficients = vec![F::zero(); self.shape.symbols];
            let mut symbol = vec![0u8; self.shape.symbol_size];
            for (i, row) in self.rows.iter().enumerate() {
                let row = match row {
                    Some(row) => row,
                    None => continue,
                };
                let c = F::random(rng);
                if F::is_zero(c) {
                    continue;
                }
                for (dst, &src) in coefficients.iter_mut().zip(row.iter()) {
                    *dst = F::add(*dst, F::mul(c, src));
                }
                F::multiply_add(&mut symbol, self.symbol(i), c);
            }
            if coefficients.iter().any(|&c| !F::is_zero(c)) {
                return Some((coefficients, symbol));
            }
        }
    }

    /// `decoder_state` trace zone: one line per symbol, `U` uncoded,
    /// `C` coded, `?` missing, followed by the coefficient row.
    pub(crate) fn describe_state(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let tag = match row {
                Some(_) if self.uncoded[i] => 'U',
                Some(_) => 'C',
                None => '?',
            };
            let _ = write!(out, "{} {}:", i, tag);
            for j in 0..self.shape.symbols {
                match row {
                    Some(row) => {
                        let _ = write!(out, " {:x}", row[j]);
                    }
                    None => out.push_str(" 0"),
                }
            }
            out.push('\n');
        }
        out
    }

    /// `symbol_storage` trace zone.
    pub(crate) fn describe_storage(&self) -> String {
        let mut out = String::new();
        for i in 0..self.shape.symbols {
            if self.is_pivot(i) {
                let _ = writeln!(out, "{} {}: {}", i, if self.uncoded[i] { 'U' } else { 'C' }, hex_line(self.symbol(i)));
            } else {
                let _ = writeln!(out, "{} ?:", i);
            }
        }
        out
    }
}

fn is_unit<F: Field>(row: &[F::Elem], index: usize) -> bool {
    row.iter().enumerate().all(|(j, &c)| {
        if j == index {
            c == F::one()
        } else {
            F::is_zero(c)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Binary, Binary8};

    fn shape(symbols: usize, symbol_size: usize) -> Shape {
        Shape { symbols, symbol_size }
    }

    #[test]
    fn binary_system_from_known_vectors() {
        // s1 = 3a, s0 ^ s1 = 8d, s0 ^ s2 = d6
        let mut m = DecodingMatrix::<Binary>::new(shape(3, 1));
        assert!(m.read_coded(vec![0, 1, 0], vec![0x3a]).unwrap());
        assert!(m.read_coded(vec![1, 1, 0], vec![0x8d]).unwrap());
        assert!(!m.is_complete());
        assert!(m.read_coded(vec![1, 0, 1], vec![0xd6]).unwrap());
        assert!(m.is_complete());
        assert_eq!(m.block(), &[0xb7, 0x3a, 0x61]);
        assert_eq!(m.symbols_uncoded(), 3);
    }

    #[test]
    fn dependent_rows_do_not_raise_rank() {
        let mut m = DecodingMatrix::<Binary8>::new(shape(2, 2));
        assert!(m.read_coded(vec![1, 2], vec![1, 1]).unwrap());
        assert!(!m.read_coded(vec![2, 4], vec![2, 2]).unwrap());
        assert_eq!(m.rank(), 1);
        assert!(m.is_pivot(0));
        assert!(!m.is_uncoded(0));
    }

    #[test]
    fn uncoded_symbol_replaces_coded_pivot() {
        let mut m = DecodingMatrix::<Binary8>::new(shape(2, 1));
        // 1*s0 + 1*s1 = 5 with s0 = 3, s1 = 6
        m.read_coded(vec![1, 1], vec![5]).unwrap();
        assert_eq!(m.rank(), 1);
        assert!(m.read_uncoded(0, &[3]).unwrap());
        assert!(m.is_complete());
        assert_eq!(m.block(), &[3, 6]);
        assert!(m.is_uncoded(0) && m.is_uncoded(1));
    }

    #[test]
    fn state_dump_marks_missing_rows() {
        let mut m = DecodingMatrix::<Binary8>::new(shape(2, 1));
        m.read_uncoded(1, &[9]).unwrap();
        assert_eq!(m.describe_state(), "0 ?: 0 0\n1 U: 0 1\n");
    }
}
