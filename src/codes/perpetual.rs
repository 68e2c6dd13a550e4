//! Perpetual codes: each coded symbol has a pivot with coefficient one
//! followed by `width` random coefficients, wrapping around the block.
//!
//! Coded header: `u32` pivot, `u16` width, then the packed `width`
//! coefficients following the pivot.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::block::SourceBlock;
use super::linear::{DecoderKind, LinearDecoder};
use super::payload::{self, INDEX_SIZE};
use super::{render_trace, Build, Coder, Encoder, Rank, Shape, Trace, Width};
use crate::error::{Error, Result};
use crate::field::Field;

const WIDTH_SIZE: usize = 2;
const DEFAULT_WIDTH_RATIO: f64 = 0.1;

/// Widths travel as a `u16`, so very large blocks get a capped width.
fn max_width(symbols: usize) -> usize {
    symbols.saturating_sub(1).min(u16::MAX as usize)
}

fn width_from_ratio(symbols: usize, ratio: f64) -> usize {
    let width = (symbols as f64 * ratio).ceil() as usize;
    width.clamp(max_width(symbols).min(1), max_width(symbols))
}

fn coded_header_size<F: Field>(symbols: usize) -> usize {
    INDEX_SIZE + WIDTH_SIZE + F::vector_size(max_width(symbols))
}

pub struct PerpetualEncoder<F: Field, const TRACE: bool> {
    block: SourceBlock,
    width: usize,
    width_ratio: f64,
    pseudo_systematic: bool,
    pre_charging: bool,
    generated: usize,
    rng: StdRng,
    _field: std::marker::PhantomData<F>,
}

capabilities!(impl[F: Field, const TRACE: bool] PerpetualEncoder<F, TRACE>, trace = TRACE,
    [encoder, rank, width]);

impl<F: Field, const TRACE: bool> PerpetualEncoder<F, TRACE> {
    pub fn new(shape: Shape) -> Self {
        Self {
            block: SourceBlock::new(shape),
            width: width_from_ratio(shape.symbols, DEFAULT_WIDTH_RATIO),
            width_ratio: DEFAULT_WIDTH_RATIO,
            pseudo_systematic: false,
            pre_charging: false,
            generated: 0,
            rng: StdRng::from_entropy(),
            _field: std::marker::PhantomData,
        }
    }

    /// Pivot of the next coded symbol. Pre-charging repeats pivot zero
    /// `width` times before walking the pivots in order; pseudo-systematic
    /// walks them in order straight away; afterwards pivots are random.
    fn next_pivot(&mut self) -> usize {
        let symbols = self.block.shape().symbols;
        let n = self.generated;
        self.generated += 1;
        if self.pre_charging {
            if n < self.width {
                return 0;
            }
            let sequential = n - self.width + 1;
            if sequential < symbols {
                return sequential;
            }
        } else if self.pseudo_systematic && n < symbols {
            return n;
        }
        self.rng.gen_range(0..symbols)
    }

    fn mode(&self) -> &'static str {
        if self.pre_charging {
            "pre-charging"
        } else if self.pseudo_systematic {
            "pseudo-systematic"
        } else {
            "random"
        }
    }
}

impl<F: Field, const TRACE: bool> Coder for PerpetualEncoder<F, TRACE> {
    fn symbols(&self) -> usize {
        self.block.shape().symbols
    }

    fn symbol_size(&self) -> usize {
        self.block.shape().symbol_size
    }

    fn payload_size(&self) -> usize {
        payload::header_size(coded_header_size::<F>(self.symbols())) + self.symbol_size()
    }
}

impl<F: Field, const TRACE: bool> Encoder for PerpetualEncoder<F, TRACE> {
    fn write_payload(&mut self, out: &mut [u8]) -> Result<usize> {
        let shape = self.block.shape();
        if self.block.rank() < shape.symbols {
            return Err(Error::InvalidParameter(
                "perpetual encoder needs the whole block".into(),
            ));
        }
        let pivot = self.next_pivot();
        let width = self.width;
        let mut following = vec![F::zero(); width];
        let mut symbol = self.block.symbol(pivot).to_vec();
        for (j, c) in following.iter_mut().enumerate() {
            *c = F::random(&mut self.rng);
            let index = (pivot + 1 + j) % shape.symbols;
            F::multiply_add(&mut symbol, self.block.symbol(index), *c);
        }

        let coefficient_size = F::vector_size(width);
        let len = 1 + INDEX_SIZE + WIDTH_SIZE + coefficient_size + shape.symbol_size;
        if out.len() < len {
            return Err(Error::InvalidParameter(format!(
                "payload buffer holds {} bytes, {} needed",
                out.len(),
                len
            )));
        }
        let pivot_bytes = payload::index_bytes(pivot)?;
        let width_bytes = u16::try_from(width)
            .map_err(|_| Error::InvalidParameter(format!("width {} does not fit in u16", width)))?
            .to_be_bytes();
        out[0] = payload::CODED;
        out[1..1 + INDEX_SIZE].copy_from_slice(&pivot_bytes);
        out[1 + INDEX_SIZE..1 + INDEX_SIZE + WIDTH_SIZE].copy_from_slice(&width_bytes);
        let header_end = 1 + INDEX_SIZE + WIDTH_SIZE + coefficient_size;
        F::pack(&following, &mut out[1 + INDEX_SIZE + WIDTH_SIZE..header_end]);
        out[header_end..len].copy_from_slice(&symbol);
        Ok(len)
    }

    fn set_symbols(&mut self, data: &[u8]) -> Result<()> {
        self.block.set_symbols(data)
    }

    fn set_symbol(&mut self, index: usize, data: &[u8]) -> Result<()> {
        self.block.set_symbol(index, data)
    }
}

impl<F: Field, const TRACE: bool> Rank for PerpetualEncoder<F, TRACE> {
    fn rank(&self) -> usize {
        self.block.rank()
    }
}

impl<F: Field, const TRACE: bool> Width for PerpetualEncoder<F, TRACE> {
    fn pseudo_systematic(&self) -> bool {
        self.pseudo_systematic
    }

    fn set_pseudo_systematic(&mut self, on: bool) {
        self.pseudo_systematic = on;
    }

    fn pre_charging(&self) -> bool {
        self.pre_charging
    }

    fn set_pre_charging(&mut self, on: bool) {
        self.pre_charging = on;
    }

    fn width(&self) -> usize {
        self.width
    }

    fn set_width(&mut self, width: usize) -> Result<()> {
        let symbols = self.symbols();
        if width > max_width(symbols) {
            return Err(Error::InvalidParameter(format!(
                "width {} exceeds {}",
                width,
                max_width(symbols)
            )));
        }
        self.width = width;
        self.width_ratio = width as f64 / symbols as f64;
        Ok(())
    }

    fn width_ratio(&self) -> f64 {
        self.width_ratio
    }

    fn set_width_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "width ratio {} outside (0, 1]",
                ratio
            )));
        }
        self.width_ratio = ratio;
        self.width = width_from_ratio(self.symbols(), ratio);
        debug!("perpetual width set to {} (ratio {})", self.width, ratio);
        Ok(())
    }
}

impl<F: Field, const TRACE: bool> Trace for PerpetualEncoder<F, TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        let state = format!(
            "mode {} width {} ratio {:.3} generated {}\n",
            self.mode(),
            self.width,
            self.width_ratio,
            self.generated
        );
        render_trace(
            vec![("encoder_state", state), ("symbol_storage", self.block.describe())],
            zone,
        )
    }
}

impl<F: Field, const TRACE: bool> Build for PerpetualEncoder<F, TRACE> {
    type Options = ();

    fn build(shape: Shape, _options: &()) -> Result<Self> {
        Ok(Self::new(shape))
    }

    fn max_payload_size(max: Shape, _options: &()) -> usize {
        payload::header_size(coded_header_size::<F>(max.symbols)) + max.symbol_size
    }

    fn symbol_size_ok(symbol_size: usize) -> bool {
        F::symbol_size_ok(symbol_size)
    }
}

/// Decoder kind expanding pivot + width headers.
#[derive(Debug, Default)]
pub struct Perpetual;

pub type PerpetualDecoder<F, const TRACE: bool> = LinearDecoder<F, Perpetual, TRACE>;

capabilities!(impl[F: Field, const TRACE: bool] PerpetualDecoder<F, TRACE>, trace = TRACE,
    [decoder, rank, symbol_pivot, read_symbol]);

impl<F: Field> DecoderKind<F> for Perpetual {
    type Options = ();

    fn new(_shape: Shape, _options: &()) -> Result<Self> {
        Ok(Perpetual)
    }

    fn coded_header_size(&self, shape: Shape) -> usize {
        coded_header_size::<F>(shape.symbols)
    }

    fn max_coded_header_size(max: Shape, _options: &()) -> usize {
        coded_header_size::<F>(max.symbols)
    }

    fn unpack(&self, rest: &[u8], shape: Shape) -> Result<(Vec<F::Elem>, usize)> {
        let pivot = payload::read_index(rest)?;
        let width_bytes = rest
            .get(INDEX_SIZE..INDEX_SIZE + WIDTH_SIZE)
            .ok_or_else(|| Error::InvalidPayload("truncated width".into()))?;
        let width = u16::from_be_bytes([width_bytes[0], width_bytes[1]]) as usize;
        if pivot >= shape.symbols || width > max_width(shape.symbols) {
            return Err(Error::InvalidPayload(format!(
                "pivot {} / width {} invalid for {} symbols",
                pivot, width, shape.symbols
            )));
        }
        let start = INDEX_SIZE + WIDTH_SIZE;
        let end = start + F::vector_size(width);
        let packed = rest
            .get(start..end)
            .ok_or_else(|| Error::InvalidPayload("truncated coefficients".into()))?;
        let mut coefficients = vec![F::zero(); shape.symbols];
        coefficients[pivot] = F::one();
        for (j, c) in F::unpack(packed, width).into_iter().enumerate() {
            coefficients[(pivot + 1 + j) % shape.symbols] = c;
        }
        Ok((coefficients, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Decoder;
    use crate::field::Binary8;

    fn shape() -> Shape {
        Shape {
            symbols: 24,
            symbol_size: 16,
        }
    }

    #[test]
    fn default_width_is_a_tenth() {
        let mut enc = PerpetualEncoder::<Binary8, false>::new(shape());
        assert_eq!(enc.width(), 3);
        enc.set_width(6).unwrap();
        assert!((enc.width_ratio() - 0.25).abs() < 1e-9);
        enc.set_width_ratio(0.2).unwrap();
        assert_eq!(enc.width(), 5);
        assert!(enc.set_width(24).is_err());
    }

    #[test]
    fn pre_charging_wins_over_pseudo_systematic() {
        let mut enc = PerpetualEncoder::<Binary8, false>::new(shape());
        enc.set_width(2).unwrap();
        enc.set_pseudo_systematic(true);
        enc.set_pre_charging(true);
        let pivots: Vec<usize> = (0..5).map(|_| enc.next_pivot()).collect();
        assert_eq!(pivots, vec![0, 0, 1, 2, 3]);
    }

    #[test]
    fn pseudo_systematic_round_trip() {
        let data: Vec<u8> = (0..24 * 16).map(|i| (i * 7 + 3) as u8).collect();
        let mut enc = PerpetualEncoder::<Binary8, false>::new(shape());
        let mut dec = PerpetualDecoder::<Binary8, false>::new(shape(), Perpetual);
        enc.set_symbols(&data).unwrap();
        enc.set_pseudo_systematic(true);
        let mut buf = vec![0u8; enc.payload_size()];
        let mut sent = 0;
        while !dec.is_complete() {
            let len = enc.write_payload(&mut buf).unwrap();
            dec.read_payload(&buf[..len]).unwrap();
            sent += 1;
            assert!(sent < 200);
        }
        let mut out = vec![0u8; data.len()];
        dec.copy_from_symbols(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn width_is_capped_by_its_header_field() {
        let big = Shape {
            symbols: 70_000,
            symbol_size: 1,
        };
        let mut enc = PerpetualEncoder::<Binary8, false>::new(big);
        assert!(enc.set_width(u16::MAX as usize + 1).is_err());
        enc.set_width(u16::MAX as usize).unwrap();
        enc.set_width_ratio(1.0).unwrap();
        assert_eq!(enc.width(), u16::MAX as usize);

        enc.set_symbols(&vec![0x5a; big.symbols]).unwrap();
        let mut buf = vec![0u8; enc.payload_size()];
        let len = enc.write_payload(&mut buf).unwrap();
        assert!(len <= enc.payload_size());
        assert_eq!(buf[0], payload::CODED);
        let width = u16::from_be_bytes([buf[1 + INDEX_SIZE], buf[2 + INDEX_SIZE]]) as usize;
        assert_eq!(width, enc.width());

        let mut dec = PerpetualDecoder::<Binary8, false>::new(big, Perpetual);
        dec.read_payload(&buf[..len]).unwrap();
    }

    #[test]
    fn encoder_needs_whole_block() {
        let mut enc = PerpetualEncoder::<Binary8, false>::new(shape());
        enc.set_symbol(0, &[0u8; 16]).unwrap();
        let mut buf = vec![0u8; enc.payload_size()];
        assert!(enc.write_payload(&mut buf).is_err());
    }
}
