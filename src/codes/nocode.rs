//! Uncoded carousel: the encoder cycles through its symbols, the decoder
//! simply stores what arrives.

use super::block::SourceBlock;
use super::matrix::DecodingMatrix;
use super::payload::{self, Unit};
use super::{render_trace, Build, Coder, Decoder, Encoder, Rank, Shape, SymbolPivot, Trace};
use crate::error::{Error, Result};
use crate::field::Binary8;

pub struct CarouselEncoder<const TRACE: bool> {
    block: SourceBlock,
    next: usize,
}

capabilities!(impl[const TRACE: bool] CarouselEncoder<TRACE>, trace = TRACE, [encoder, rank]);

impl<const TRACE: bool> CarouselEncoder<TRACE> {
    pub fn new(shape: Shape) -> Self {
        Self {
            block: SourceBlock::new(shape),
            next: 0,
        }
    }
}

impl<const TRACE: bool> Coder for CarouselEncoder<TRACE> {
    fn symbols(&self) -> usize {
        self.block.shape().symbols
    }

    fn symbol_size(&self) -> usize {
        self.block.shape().symbol_size
    }

    fn payload_size(&self) -> usize {
        payload::header_size(0) + self.symbol_size()
    }
}

impl<const TRACE: bool> Encoder for CarouselEncoder<TRACE> {
    fn write_payload(&mut self, out: &mut [u8]) -> Result<usize> {
        let symbols = self.symbols();
        let index = (0..symbols)
            .map(|step| (self.next + step) % symbols)
            .find(|&i| self.block.is_present(i))
            .ok_or_else(|| Error::InvalidParameter("no source symbols set".into()))?;
        self.next = (index + 1) % symbols;
        payload::write_systematic(out, index, self.block.symbol(index))
    }

    fn set_symbols(&mut self, data: &[u8]) -> Result<()> {
        self.block.set_symbols(data)
    }

    fn set_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        self.block.set_symbol(index, data)
    }
}

impl<const TRACE: bool> Rank for CarouselEncoder<TRACE> {
    fn rank(&self) -> usize {
        self.block.rank()
    }
}

impl<const TRACE: bool> Trace for CarouselEncoder<TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        let state = format!("rank {} next {}\n", self.block.rank(), self.next);
        render_trace(
            vec![("encoder_state", state), ("symbol_storage", self.block.describe())],
            zone,
        )
    }
}

impl<const TRACE: bool> Build for CarouselEncoder<TRACE> {
    type Options = ();

    fn build(shape: Shape, _options: &()) -> Result<Self> {
        Ok(Self::new(shape))
    }

    fn max_payload_size(max: Shape, _options: &()) -> usize {
        payload::header_size(0) + max.symbol_size
    }
}

/// Stores systematic symbols; every stored symbol is a pivot and decoded.
pub struct CarouselDecoder<const TRACE: bool> {
    // Only unit rows are ever inserted, so no field arithmetic happens.
    store: DecodingMatrix<Binary8>,
}

capabilities!(impl[const TRACE: bool] CarouselDecoder<TRACE>, trace = TRACE,
    [decoder, rank, symbol_pivot]);

impl<const TRACE: bool> CarouselDecoder<TRACE> {
    pub fn new(shape: Shape) -> Self {
        Self {
            store: DecodingMatrix::new(shape),
        }
    }
}

impl<const TRACE: bool> Coder for CarouselDecoder<TRACE> {
    fn symbols(&self) -> usize {
        self.store.shape().symbols
    }

    fn symbol_size(&self) -> usize {
        self.store.shape().symbol_size
    }

    fn payload_size(&self) -> usize {
        payload::header_size(0) + self.symbol_size()
    }
}

impl<const TRACE: bool> Decoder for CarouselDecoder<TRACE> {
    fn read_payload(&mut self, data: &[u8]) -> Result<()> {
        match payload::read(data, 0, self.symbol_size())? {
            Unit::Systematic { index, symbol } => self.store.read_uncoded(index, symbol).map(|_| ()),
            Unit::Coded { .. } => Err(Error::InvalidPayload(
                "carousel decoder accepts systematic units only".into(),
            )),
        }
    }

    fn is_complete(&self) -> bool {
        self.store.is_complete()
    }

    fn copy_from_symbols(&self, out: &mut [u8]) -> usize {
        let block = self.store.block();
        let len = out.len().min(block.len());
        out[..len].copy_from_slice(&block[..len]);
        len
    }

    fn copy_from_symbol(&self, index: usize, out: &mut [u8]) -> Result<usize> {
        if index >= self.symbols() {
            return Err(Error::InvalidParameter(format!("symbol index {} out of range", index)));
        }
        let symbol = self.store.symbol(index);
        let len = out.len().min(symbol.len());
        out[..len].copy_from_slice(&symbol[..len]);
        Ok(len)
    }

    fn read_uncoded_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        self.store.read_uncoded(index, data).map(|_| ())
    }

    fn symbols_uncoded(&self) -> usize {
        self.store.rank()
    }

    fn symbols_missing(&self) -> usize {
        self.symbols() - self.store.rank()
    }

    fn symbols_partially_decoded(&self) -> usize {
        0
    }

    fn is_symbol_uncoded(&self, index: usize) -> bool {
        self.store.is_uncoded(index)
    }

    fn is_symbol_missing(&self, index: usize) -> bool {
        index < self.symbols() && !self.store.is_pivot(index)
    }

    fn is_symbol_partially_decoded(&self, _index: usize) -> bool {
        false
    }
}

impl<const TRACE: bool> Rank for CarouselDecoder<TRACE> {
    fn rank(&self) -> usize {
        self.store.rank()
    }
}

impl<const TRACE: bool> SymbolPivot for CarouselDecoder<TRACE> {
    fn is_symbol_pivot(&self, index: usize) -> bool {
        self.store.is_pivot(index)
    }
}

impl<const TRACE: bool> Trace for CarouselDecoder<TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        render_trace(vec![("symbol_storage", self.store.describe_storage())], zone)
    }
}

impl<const TRACE: bool> Build for CarouselDecoder<TRACE> {
    type Options = ();

    fn build(shape: Shape, _options: &()) -> Result<Self> {
        Ok(Self::new(shape))
    }

    fn max_payload_size(max: Shape, _options: &()) -> usize {
        payload::header_size(0) + max.symbol_size
    }
}
