//! Fulcrum codes.
//!
//! An outer code over `F` appends `expansion` symbols to the block; the
//! inner code combines the resulting `symbols + expansion` inner symbols
//! with binary coefficients only. The combined decoder maps each inner
//! equation back onto the source symbols and eliminates over `F`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::block::SourceBlock;
use super::linear::{DecoderKind, LinearDecoder};
use super::payload;
use super::{
    render_trace, Build, Coder, Encoder, Expansion, ExpansionControl, FactoryOptions, Rank, Shape,
    Systematic, Trace,
};
use crate::error::{Error, Result};
use crate::field::{Binary, Field};

pub const DEFAULT_MAX_EXPANSION: usize = 10;
pub const DEFAULT_EXPANSION: usize = 4;

const OUTER_SEED: u64 = 0x6675_6c63_7275_6d00;

/// Factory-side expansion settings shared by encoder and decoder factories.
#[derive(Debug, Clone)]
pub struct FulcrumOptions {
    max_symbols: usize,
    max_expansion: usize,
    expansion: usize,
}

impl FactoryOptions for FulcrumOptions {
    const EXPANSION: bool = true;

    fn new(max_symbols: usize) -> Self {
        FulcrumOptions {
            max_symbols,
            max_expansion: DEFAULT_MAX_EXPANSION,
            expansion: DEFAULT_EXPANSION,
        }
    }

    fn as_expansion(&mut self) -> Option<&mut dyn ExpansionControl> {
        Some(self)
    }
}

impl ExpansionControl for FulcrumOptions {
    fn max_expansion(&self) -> usize {
        self.max_expansion
    }

    fn expansion(&self) -> usize {
        self.expansion
    }

    fn set_expansion(&mut self, expansion: usize) -> Result<()> {
        if expansion > self.max_expansion {
            return Err(Error::InvalidParameter(format!(
                "expansion {} exceeds max expansion {}",
                expansion, self.max_expansion
            )));
        }
        self.expansion = expansion;
        Ok(())
    }

    fn max_inner_symbols(&self) -> usize {
        self.max_symbols + self.max_expansion
    }
}

/// Outer code matrix: row `j` holds the coefficients of expansion symbol
/// `j` over the source symbols. Both ends derive it from the block shape.
fn outer_coefficients<F: Field>(symbols: usize, expansion: usize) -> Vec<Vec<F::Elem>> {
    let mut rng = StdRng::seed_from_u64(OUTER_SEED ^ ((symbols as u64) << 16) ^ expansion as u64);
    (0..expansion)
        .map(|_| {
            let mut row: Vec<F::Elem> = (0..symbols).map(|_| F::random(&mut rng)).collect();
            if row.iter().all(|&c| F::is_zero(c)) {
                let pick = rng.gen_range(0..symbols);
                row[pick] = F::random_nonzero(&mut rng);
            }
            row
        })
        .collect()
}

fn inner_header_size(inner_symbols: usize) -> usize {
    Binary::vector_size(inner_symbols)
}

pub struct FulcrumEncoder<F: Field, const TRACE: bool> {
    block: SourceBlock,
    max_expansion: usize,
    expansion: usize,
    outer: Vec<Vec<F::Elem>>,
    expanded: Option<Vec<u8>>,
    systematic: bool,
    next_systematic: usize,
    rng: StdRng,
}

capabilities!(impl[F: Field, const TRACE: bool] FulcrumEncoder<F, TRACE>, trace = TRACE,
    [encoder, rank, systematic, expansion]);

impl<F: Field, const TRACE: bool> FulcrumEncoder<F, TRACE> {
    pub fn new(shape: Shape, max_expansion: usize, expansion: usize) -> Self {
        Self {
            block: SourceBlock::new(shape),
            max_expansion,
            expansion,
            outer: outer_coefficients::<F>(shape.symbols, expansion),
            expanded: None,
            systematic: true,
            next_systematic: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Expansion symbols, computed once per block.
    fn expansion_symbols(&mut self) -> &[u8] {
        let size = self.block.shape().symbol_size;
        let (block, outer) = (&self.block, &self.outer);
        self.expanded.get_or_insert_with(|| {
            let mut out = vec![0u8; outer.len() * size];
            for (j, row) in outer.iter().enumerate() {
                let dst = &mut out[j * size..(j + 1) * size];
                for (i, &c) in row.iter().enumerate() {
                    F::multiply_add(dst, block.symbol(i), c);
                }
            }
            out
        })
    }
}

impl<F: Field, const TRACE: bool> Coder for FulcrumEncoder<F, TRACE> {
    fn symbols(&self) -> usize {
        self.block.shape().symbols
    }

    fn symbol_size(&self) -> usize {
        self.block.shape().symbol_size
    }

    fn payload_size(&self) -> usize {
        payload::header_size(inner_header_size(self.inner_symbols())) + self.symbol_size()
    }
}

impl<F: Field, const TRACE: bool> Encoder for FulcrumEncoder<F, TRACE> {
    fn write_payload(&mut self, out: &mut [u8]) -> Result<usize> {
        let shape = self.block.shape();
        if self.block.rank() < shape.symbols {
            return Err(Error::InvalidParameter("fulcrum encoder needs the whole block".into()));
        }
        if self.systematic && self.next_systematic < shape.symbols {
            let index = self.next_systematic;
            self.next_systematic += 1;
            return payload::write_systematic(out, index, self.block.symbol(index));
        }

        let inner = self.inner_symbols();
        let mut bits: Vec<u8> = (0..inner).map(|_| Binary::random(&mut self.rng)).collect();
        if bits.iter().all(|&b| b == 0) {
            let pick = self.rng.gen_range(0..inner);
            bits[pick] = 1;
        }
        let size = shape.symbol_size;
        let mut symbol = vec![0u8; size];
        for i in (0..shape.symbols).filter(|&i| bits[i] != 0) {
            Binary::multiply_add(&mut symbol, self.block.symbol(i), 1);
        }
        let selected: Vec<usize> = (0..self.expansion).filter(|&j| bits[shape.symbols + j] != 0).collect();
        if !selected.is_empty() {
            let expanded = self.expansion_symbols().to_vec();
            for j in selected {
                Binary::multiply_add(&mut symbol, &expanded[j * size..(j + 1) * size], 1);
            }
        }
        let mut packed = vec![0u8; inner_header_size(inner)];
        Binary::pack(&bits, &mut packed);
        payload::write_coded(out, &packed, &symbol)
    }

    fn set_symbols(&mut self, data: &[u8]) -> Result<()> {
        self.expanded = None;
        self.block.set_symbols(data)
    }

    fn set_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        self.expanded = None;
        self.block.set_symbol(index, data)
    }
}

impl<F: Field, const TRACE: bool> Rank for FulcrumEncoder<F, TRACE> {
    fn rank(&self) -> usize {
        self.block.rank()
    }
}

impl<F: Field, const TRACE: bool> Systematic for FulcrumEncoder<F, TRACE> {
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

impl<F: Field, const TRACE: bool> Expansion for FulcrumEncoder<F, TRACE> {
    fn max_expansion(&self) -> usize {
        self.max_expansion
    }

    fn expansion(&self) -> usize {
        self.expansion
    }

    fn inner_symbols(&self) -> usize {
        self.symbols() + self.expansion
    }
}

impl<F: Field, const TRACE: bool> Trace for FulcrumEncoder<F, TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        let state = format!(
            "rank {} expansion {} inner {} systematic {}\n",
            self.block.rank(),
            self.expansion,
            self.inner_symbols(),
            self.systematic
        );
        render_trace(
            vec![("encoder_state", state), ("symbol_storage", self.block.describe())],
            zone,
        )
    }
}

impl<F: Field, const TRACE: bool> Build for FulcrumEncoder<F, TRACE> {
    type Options = FulcrumOptions;

    fn build(shape: Shape, options: &FulcrumOptions) -> Result<Self> {
        Ok(Self::new(shape, options.max_expansion, options.expansion))
    }

    fn max_payload_size(max: Shape, options: &FulcrumOptions) -> usize {
        payload::header_size(inner_header_size(max.symbols + options.max_expansion)) + max.symbol_size
    }

    fn symbol_size_ok(symbol_size: usize) -> bool {
        F::symbol_size_ok(symbol_size)
    }
}

/// Combined decoder kind: inner binary equations lifted to `F`.
#[derive(Debug)]
pub struct Fulcrum<F: Field> {
    max_expansion: usize,
    expansion: usize,
    outer: Vec<Vec<F::Elem>>,
}

pub type FulcrumDecoder<F, const TRACE: bool> = LinearDecoder<F, Fulcrum<F>, TRACE>;

capabilities!(impl[F: Field, const TRACE: bool] FulcrumDecoder<F, TRACE>, trace = TRACE,
    [decoder, rank, symbol_pivot, read_symbol, expansion]);

impl<F: Field> DecoderKind<F> for Fulcrum<F> {
    type Options = FulcrumOptions;

    fn new(shape: Shape, options: &FulcrumOptions) -> Result<Self> {
        Ok(Fulcrum {
            max_expansion: options.max_expansion,
            expansion: options.expansion,
            outer: outer_coefficients::<F>(shape.symbols, options.expansion),
        })
    }

    fn coded_header_size(&self, shape: Shape) -> usize {
        inner_header_size(shape.symbols + self.expansion)
    }

    fn max_coded_header_size(max: Shape, options: &FulcrumOptions) -> usize {
        inner_header_size(max.symbols + options.max_expansion)
    }

    fn unpack(&self, rest: &[u8], shape: Shape) -> Result<(Vec<F::Elem>, usize)> {
        let inner = shape.symbols + self.expansion;
        let size = inner_header_size(inner);
        let packed = rest
            .get(..size)
            .ok_or_else(|| Error::InvalidPayload("truncated inner coefficients".into()))?;
        let bits = Binary::unpack(packed, inner);
        let mut coefficients: Vec<F::Elem> = bits[..shape.symbols]
            .iter()
            .map(|&b| if b != 0 { F::one() } else { F::zero() })
            .collect();
        for (j, row) in self.outer.iter().enumerate() {
            if bits[shape.symbols + j] == 0 {
                continue;
            }
            for (dst, &c) in coefficients.iter_mut().zip(row) {
                *dst = F::add(*dst, c);
            }
        }
        Ok((coefficients, size))
    }
}

impl<F: Field, const TRACE: bool> Expansion for FulcrumDecoder<F, TRACE> {
    fn max_expansion(&self) -> usize {
        self.kind().max_expansion
    }

    fn expansion(&self) -> usize {
        self.kind().expansion
    }

    fn inner_symbols(&self) -> usize {
        self.symbols() + self.kind().expansion
    }
}
