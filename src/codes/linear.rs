//! Shared random linear encoder and decoder.
//!
//! Families differ only in how coefficients are drawn (a [`Generator`]) and
//! how coded headers map onto source coefficients (a [`DecoderKind`]).

use std::fmt::Write as _;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::block::SourceBlock;
use super::matrix::DecodingMatrix;
use super::payload::{self, Unit};
use super::{
    render_trace, Build, Capable, Coder, Decoder, Encoder, FactoryOptions, Probed, Rank,
    ReadSymbol, Shape, SymbolPivot, Systematic, Trace,
};
use crate::error::{Error, Result};
use crate::field::Field;

/// Draws the coefficient vector of one coded symbol.
pub trait Generator<F: Field>: Send + 'static {
    fn new(shape: Shape) -> Self;

    /// Fills `coefficients` (all zero on entry) for a symbol combining
    /// source symbols of `block`.
    fn generate(&mut self, rng: &mut StdRng, block: &SourceBlock, coefficients: &mut [F::Elem]);

    /// Symbols the receiver already holds; skipped by every phase.
    fn acknowledged(&self, _index: usize) -> bool {
        false
    }
}

/// Uniformly random coefficients over every present symbol.
#[derive(Debug, Default)]
pub struct Uniform;

impl<F: Field> Generator<F> for Uniform {
    fn new(_shape: Shape) -> Self {
        Uniform
    }

    fn generate(&mut self, rng: &mut StdRng, block: &SourceBlock, coefficients: &mut [F::Elem]) {
        let present: Vec<usize> = block.present().collect();
        for &i in &present {
            coefficients[i] = F::random(rng);
        }
        ensure_nonzero::<F>(rng, coefficients, &present);
    }
}

/// Guarantees at least one nonzero coefficient among `candidates`.
pub(crate) fn ensure_nonzero<F: Field>(rng: &mut StdRng, coefficients: &mut [F::Elem], candidates: &[usize]) {
    if candidates.is_empty() || coefficients.iter().any(|&c| !F::is_zero(c)) {
        return;
    }
    let pick = candidates[rng.gen_range(0..candidates.len())];
    coefficients[pick] = F::random_nonzero(rng);
}

/// Systematic-capable encoder over a [`SourceBlock`].
pub struct LinearEncoder<F: Field, G: Generator<F>, const TRACE: bool> {
    block: SourceBlock,
    generator: G,
    systematic: bool,
    next_systematic: usize,
    written: usize,
    rng: StdRng,
    _field: std::marker::PhantomData<F>,
}

impl<F: Field, G: Generator<F>, const TRACE: bool> LinearEncoder<F, G, TRACE> {
    pub fn new(shape: Shape) -> Self {
        Self {
            block: SourceBlock::new(shape),
            generator: G::new(shape),
            systematic: true,
            next_systematic: 0,
            written: 0,
            rng: StdRng::from_entropy(),
            _field: std::marker::PhantomData,
        }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub(crate) fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    pub(crate) fn block(&self) -> &SourceBlock {
        &self.block
    }

    fn coefficient_size(&self) -> usize {
        F::vector_size(self.block.shape().symbols)
    }

    fn next_uncoded(&mut self) -> Option<usize> {
        let symbols = self.block.shape().symbols;
        let next = (self.next_systematic..symbols)
            .find(|&i| self.block.is_present(i) && !self.generator.acknowledged(i))?;
        self.next_systematic = next + 1;
        Some(next)
    }
}

impl<F: Field, G: Generator<F>, const TRACE: bool> Coder for LinearEncoder<F, G, TRACE>
where
    Self: Capable,
{
    fn symbols(&self) -> usize {
        self.block.shape().symbols
    }

    fn symbol_size(&self) -> usize {
        self.block.shape().symbol_size
    }

    fn payload_size(&self) -> usize {
        payload::header_size(self.coefficient_size()) + self.symbol_size()
    }
}

impl<F: Field, G: Generator<F>, const TRACE: bool> Encoder for LinearEncoder<F, G, TRACE> {
    fn write_payload(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.block.rank() == 0 {
            return Err(Error::InvalidParameter("no source symbols set".into()));
        }
        self.written += 1;
        if self.systematic {
            if let Some(index) = self.next_uncoded() {
                return payload::write_systematic(out, index, self.block.symbol(index));
            }
        }
        let shape = self.block.shape();
        let mut coefficients = vec![F::zero(); shape.symbols];
        self.generator
            .generate(&mut self.rng, &self.block, &mut coefficients);
        let mut symbol = vec![0u8; shape.symbol_size];
        for (i, &c) in coefficients.iter().enumerate() {
            if !F::is_zero(c) {
                F::multiply_add(&mut symbol, self.block.symbol(i), c);
            }
        }
        let mut packed = vec![0u8; self.coefficient_size()];
        F::pack(&coefficients, &mut packed);
        payload::write_coded(out, &packed, &symbol)
    }

    fn set_symbols(&mut self, data: &[u8]) -> Result<()> {
        self.block.set_symbols(data)
    }

    fn set_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        self.block.set_symbol(index, data)
    }
}

impl<F: Field, G: Generator<F>, const TRACE: bool> Rank for LinearEncoder<F, G, TRACE> {
    fn rank(&self) -> usize {
        self.block.rank()
    }
}

impl<F: Field, G: Generator<F>, const TRACE: bool> Systematic for LinearEncoder<F, G, TRACE> {
    fn is_systematic_on(&self) -> bool {
        self.systematic
    }

    fn set_systematic_on(&mut self) {
        self.systematic = true;
    }

    fn set_systematic_off(&mut self) {
        self.systematic = false;
    }
}

impl<F: Field, G: Generator<F>, const TRACE: bool> Trace for LinearEncoder<F, G, TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        let state = format!(
            "rank {} systematic {} next {} written {}\n",
            self.block.rank(),
            self.systematic,
            self.next_systematic,
            self.written
        );
        render_trace(
            vec![("encoder_state", state), ("symbol_storage", self.block.describe())],
            zone,
        )
    }
}

impl<F: Field, G: Generator<F>, const TRACE: bool> Build for LinearEncoder<F, G, TRACE>
where
    Self: Probed + Capable,
{
    type Options = ();

    fn build(shape: Shape, _options: &()) -> Result<Self> {
        Ok(Self::new(shape))
    }

    fn max_payload_size(max: Shape, _options: &()) -> usize {
        payload::header_size(F::vector_size(max.symbols)) + max.symbol_size
    }

    fn symbol_size_ok(symbol_size: usize) -> bool {
        F::symbol_size_ok(symbol_size)
    }
}

/// How a decoder family reads the coded header of a payload.
pub trait DecoderKind<F: Field>: Send + Sized + 'static {
    type Options: FactoryOptions;

    fn new(shape: Shape, options: &Self::Options) -> Result<Self>;

    /// Largest coded header for this decoder.
    fn coded_header_size(&self, shape: Shape) -> usize;

    fn max_coded_header_size(max: Shape, options: &Self::Options) -> usize;

    /// Splits a coded header off `rest`, returning the coefficients over
    /// the source symbols and the header length.
    fn unpack(&self, rest: &[u8], shape: Shape) -> Result<(Vec<F::Elem>, usize)>;
}

/// Kinds whose coded header is a packed vector over the source symbols.
pub trait DenseKind {}

pub(crate) fn unpack_dense<F: Field>(rest: &[u8], symbols: usize) -> Result<(Vec<F::Elem>, usize)> {
    let size = F::vector_size(symbols);
    if rest.len() < size {
        return Err(Error::InvalidPayload("truncated coefficient vector".into()));
    }
    Ok((F::unpack(&rest[..size], symbols), size))
}

/// Gaussian-elimination decoder parameterised by its family kind.
pub struct LinearDecoder<F: Field, K: DecoderKind<F>, const TRACE: bool> {
    pub(crate) matrix: DecodingMatrix<F>,
    pub(crate) kind: K,
    pub(crate) rng: StdRng,
    received: usize,
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> LinearDecoder<F, K, TRACE> {
    pub fn new(shape: Shape, kind: K) -> Self {
        Self {
            matrix: DecodingMatrix::new(shape),
            kind,
            rng: StdRng::from_entropy(),
            received: 0,
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    fn note_progress(&self, was_complete: bool) {
        if !was_complete && self.matrix.is_complete() {
            debug!(
                "decoder complete: {} symbols after {} payloads",
                self.matrix.shape().symbols,
                self.received
            );
        }
    }

    pub(crate) fn read_coded(&mut self, coefficients: Vec<F::Elem>, symbol: &[u8]) -> Result<bool> {
        let was_complete = self.matrix.is_complete();
        let innovative = self.matrix.read_coded(coefficients, symbol.to_vec())?;
        self.note_progress(was_complete);
        Ok(innovative)
    }

    /// Writes a recoded unit from the rows received so far.
    pub(crate) fn write_recoded(&mut self, out: &mut [u8]) -> Result<usize> {
        let (coefficients, symbol) = self
            .matrix
            .recode(&mut self.rng)
            .ok_or_else(|| Error::InvalidParameter("nothing received to recode".into()))?;
        let mut packed = vec![0u8; F::vector_size(coefficients.len())];
        F::pack(&coefficients, &mut packed);
        payload::write_coded(out, &packed, &symbol)
    }

    /// Every symbol seen so far is fully decoded.
    pub(crate) fn partially_complete(&self) -> bool {
        let rank = self.matrix.rank();
        rank > 0 && self.matrix.symbols_uncoded() == rank
    }

    pub(crate) fn describe_counters(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "rank {} uncoded {} received {}",
            self.matrix.rank(),
            self.matrix.symbols_uncoded(),
            self.received
        );
        out
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> Coder for LinearDecoder<F, K, TRACE>
where
    Self: Capable,
{
    fn symbols(&self) -> usize {
        self.matrix.shape().symbols
    }

    fn symbol_size(&self) -> usize {
        self.matrix.shape().symbol_size
    }

    fn payload_size(&self) -> usize {
        let shape = self.matrix.shape();
        payload::header_size(self.kind.coded_header_size(shape)) + shape.symbol_size
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> Decoder for LinearDecoder<F, K, TRACE> {
    fn read_payload(&mut self, data: &[u8]) -> Result<()> {
        let shape = self.matrix.shape();
        self.received += 1;
        let (&kind, rest) = data
            .split_first()
            .ok_or_else(|| Error::InvalidPayload("empty payload".into()))?;
        let was_complete = self.matrix.is_complete();
        match kind {
            payload::SYSTEMATIC => {
                if let Unit::Systematic { index, symbol } = payload::read(data, 0, shape.symbol_size)? {
                    self.matrix.read_uncoded(index, symbol)?;
                }
            }
            payload::CODED => {
                let (coefficients, header) = self.kind.unpack(rest, shape)?;
                let symbol = rest
                    .get(header..header + shape.symbol_size)
                    .ok_or_else(|| Error::InvalidPayload("truncated symbol data".into()))?;
                self.matrix.read_coded(coefficients, symbol.to_vec())?;
            }
            other => {
                return Err(Error::InvalidPayload(format!("unknown kind 0x{:02x}", other)));
            }
        }
        trace!("payload {} consumed, rank {}", self.received, self.matrix.rank());
        self.note_progress(was_complete);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.matrix.is_complete()
    }

    fn copy_from_symbols(&self, out: &mut [u8]) -> usize {
        let block = self.matrix.block();
        let len = out.len().min(block.len());
        out[..len].copy_from_slice(&block[..len]);
        len
    }

    fn copy_from_symbol(&self, index: usize, out: &mut [u8]) -> Result<usize> {
        if index >= self.matrix.shape().symbols {
            return Err(Error::InvalidParameter(format!("symbol index {} out of range", index)));
        }
        let symbol = self.matrix.symbol(index);
        let len = out.len().min(symbol.len());
        out[..len].copy_from_slice(&symbol[..len]);
        Ok(len)
    }

    fn read_uncoded_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let was_complete = self.matrix.is_complete();
        self.matrix.read_uncoded(index, data)?;
        self.note_progress(was_complete);
        Ok(())
    }

    fn symbols_uncoded(&self) -> usize {
        self.matrix.symbols_uncoded()
    }

    fn symbols_missing(&self) -> usize {
        self.matrix.shape().symbols - self.matrix.rank()
    }

    fn symbols_partially_decoded(&self) -> usize {
        self.matrix.rank() - self.matrix.symbols_uncoded()
    }

    fn is_symbol_uncoded(&self, index: usize) -> bool {
        self.matrix.is_uncoded(index)
    }

    fn is_symbol_missing(&self, index: usize) -> bool {
        index < self.matrix.shape().symbols && !self.matrix.is_pivot(index)
    }

    fn is_symbol_partially_decoded(&self, index: usize) -> bool {
        self.matrix.is_pivot(index) && !self.matrix.is_uncoded(index)
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> ReadSymbol for LinearDecoder<F, K, TRACE> {
    fn coefficient_vector_size(&self) -> usize {
        F::vector_size(self.matrix.shape().symbols)
    }

    fn read_symbol(&mut self, data: &[u8], coefficients: &[u8]) -> Result<()> {
        let symbols = self.matrix.shape().symbols;
        let (coefficients, _) = unpack_dense::<F>(coefficients, symbols)?;
        self.read_coded(coefficients, data).map(|_| ())
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> Rank for LinearDecoder<F, K, TRACE> {
    fn rank(&self) -> usize {
        self.matrix.rank()
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> SymbolPivot for LinearDecoder<F, K, TRACE> {
    fn is_symbol_pivot(&self, index: usize) -> bool {
        self.matrix.is_pivot(index)
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> Trace for LinearDecoder<F, K, TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        render_trace(
            vec![
                ("decoder_state", self.matrix.describe_state()),
                ("symbol_storage", self.matrix.describe_storage()),
                ("decoder_counters", self.describe_counters()),
            ],
            zone,
        )
    }
}

impl<F: Field, K: DecoderKind<F>, const TRACE: bool> Build for LinearDecoder<F, K, TRACE>
where
    Self: Probed + Capable,
{
    type Options = K::Options;

    fn build(shape: Shape, options: &K::Options) -> Result<Self> {
        Ok(Self::new(shape, K::new(shape, options)?))
    }

    fn max_payload_size(max: Shape, options: &K::Options) -> usize {
        payload::header_size(K::max_coded_header_size(max, options)) + max.symbol_size
    }

    fn symbol_size_ok(symbol_size: usize) -> bool {
        F::symbol_size_ok(symbol_size)
    }
}

/// Declares a dense decoder kind without options.
macro_rules! dense_kind {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Default)]
        pub struct $name;

        impl<F: $crate::field::Field> $crate::codes::linear::DecoderKind<F> for $name {
            type Options = ();

            fn new(_shape: $crate::codes::Shape, _options: &()) -> $crate::error::Result<Self> {
                Ok($name)
            }

            fn coded_header_size(&self, shape: $crate::codes::Shape) -> usize {
                F::vector_size(shape.symbols)
            }

            fn max_coded_header_size(max: $crate::codes::Shape, _options: &()) -> usize {
                F::vector_size(max.symbols)
            }

            fn unpack(
                &self,
                rest: &[u8],
                shape: $crate::codes::Shape,
            ) -> $crate::error::Result<(Vec<F::Elem>, usize)> {
                $crate::codes::linear::unpack_dense::<F>(rest, shape.symbols)
            }
        }

        impl $crate::codes::linear::DenseKind for $name {}
    };
}

impl<F: Field, K: DecoderKind<F> + DenseKind, const TRACE: bool> super::Recode for LinearDecoder<F, K, TRACE> {
    fn recode_payload(&mut self, out: &mut [u8]) -> Result<usize> {
        self.write_recoded(out)
    }
}
