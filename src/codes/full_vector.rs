//! Full vector RLNC: every coded symbol carries the complete coefficient
//! vector over the block.

use rand::rngs::StdRng;
use rand::Rng;

use super::block::SourceBlock;
use super::linear::{ensure_nonzero, Generator, LinearDecoder, LinearEncoder, Uniform};
use super::{payload, render_trace, Build, Coder, Decoder, Density, Rank, Recoder, Shape, SymbolPivot, Trace};
use crate::error::{Error, Result};
use crate::field::Field;

dense_kind!(
    /// Decoder kind of the full vector family.
    FullVector
);

pub type FullVectorEncoder<F, const TRACE: bool> = LinearEncoder<F, Uniform, TRACE>;
pub type FullVectorDecoder<F, const TRACE: bool> = LinearDecoder<F, FullVector, TRACE>;
pub type SparseFullVectorEncoder<F, const TRACE: bool> = LinearEncoder<F, Sparse, TRACE>;

capabilities!(impl[F: Field, const TRACE: bool] FullVectorEncoder<F, TRACE>, trace = TRACE,
    [encoder, rank, systematic]);

capabilities!(impl[F: Field, const TRACE: bool] FullVectorDecoder<F, TRACE>, trace = TRACE,
    [decoder, rank, symbol_pivot, recode, read_symbol]);

capabilities!(impl[F: Field, const TRACE: bool] SparseFullVectorEncoder<F, TRACE>, trace = TRACE,
    [encoder, rank, systematic, density]);

capabilities!(impl[F: Field, const TRACE: bool] FullVectorRecoder<F, TRACE>, trace = TRACE,
    [recoder, rank, symbol_pivot]);

const DEFAULT_DENSITY: f64 = 0.5;

/// Each coefficient is nonzero with probability `density`.
#[derive(Debug)]
pub struct Sparse {
    density: f64,
    symbols: usize,
}

impl<F: Field> Generator<F> for Sparse {
    fn new(shape: Shape) -> Self {
        Sparse {
            density: DEFAULT_DENSITY,
            symbols: shape.symbols,
        }
    }

    fn generate(&mut self, rng: &mut StdRng, block: &SourceBlock, coefficients: &mut [F::Elem]) {
        let present: Vec<usize> = block.present().collect();
        for &i in &present {
            if rng.gen_bool(self.density) {
                coefficients[i] = F::random_nonzero(rng);
            }
        }
        ensure_nonzero::<F>(rng, coefficients, &present);
    }
}

impl<F: Field, const TRACE: bool> Density for SparseFullVectorEncoder<F, TRACE> {
    fn density(&self) -> f64 {
        self.generator().density
    }

    fn set_density(&mut self, density: f64) -> Result<()> {
        if !(density > 0.0 && density <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "density {} outside (0, 1]",
                density
            )));
        }
        self.generator_mut().density = density;
        Ok(())
    }

    fn set_average_nonzero_symbols(&mut self, symbols: f64) -> Result<()> {
        let total = self.generator().symbols as f64;
        if !(symbols > 0.0 && symbols <= total) {
            return Err(Error::InvalidParameter(format!(
                "average nonzero symbols {} outside (0, {}]",
                symbols, total
            )));
        }
        self.set_density(symbols / total)
    }
}

/// Recodes received symbols without handing decoded data back out.
pub struct FullVectorRecoder<F: Field, const TRACE: bool> {
    inner: FullVectorDecoder<F, TRACE>,
}

impl<F: Field, const TRACE: bool> Coder for FullVectorRecoder<F, TRACE> {
    fn symbols(&self) -> usize {
        self.inner.symbols()
    }

    fn symbol_size(&self) -> usize {
        self.inner.symbol_size()
    }

    fn payload_size(&self) -> usize {
        self.inner.payload_size()
    }
}

impl<F: Field, const TRACE: bool> Recoder for FullVectorRecoder<F, TRACE> {
    fn read_payload(&mut self, payload: &[u8]) -> Result<()> {
        Decoder::read_payload(&mut self.inner, payload)
    }

    fn write_payload(&mut self, payload: &mut [u8]) -> Result<usize> {
        self.inner.write_recoded(payload)
    }
}

impl<F: Field, const TRACE: bool> Rank for FullVectorRecoder<F, TRACE> {
    fn rank(&self) -> usize {
        self.inner.rank()
    }
}

impl<F: Field, const TRACE: bool> SymbolPivot for FullVectorRecoder<F, TRACE> {
    fn is_symbol_pivot(&self, index: usize) -> bool {
        self.inner.is_symbol_pivot(index)
    }
}

impl<F: Field, const TRACE: bool> Trace for FullVectorRecoder<F, TRACE> {
    fn trace(&self, zone: Option<&str>) -> String {
        render_trace(
            vec![
                ("recoder_state", self.inner.matrix.describe_state()),
                ("symbol_storage", self.inner.matrix.describe_storage()),
            ],
            zone,
        )
    }
}

impl<F: Field, const TRACE: bool> Build for FullVectorRecoder<F, TRACE> {
    type Options = ();

    fn build(shape: Shape, _options: &()) -> Result<Self> {
        Ok(Self {
            inner: FullVectorDecoder::new(shape, FullVector),
        })
    }

    fn max_payload_size(max: Shape, _options: &()) -> usize {
        payload::header_size(F::vector_size(max.symbols)) + max.symbol_size
    }

    fn symbol_size_ok(symbol_size: usize) -> bool {
        F::symbol_size_ok(symbol_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{Encoder, Recode, Systematic};
    use crate::field::{Binary, Binary8};

    fn shape(symbols: usize, symbol_size: usize) -> Shape {
        Shape { symbols, symbol_size }
    }

    fn block(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn systematic_then_coded() {
        let mut enc = FullVectorEncoder::<Binary8, false>::new(shape(3, 4));
        enc.set_symbols(&block(12)).unwrap();
        let mut buf = vec![0u8; enc.payload_size()];
        for i in 0..3 {
            let len = enc.write_payload(&mut buf).unwrap();
            assert_eq!(len, 1 + 4 + 4);
            assert_eq!(buf[0], payload::SYSTEMATIC);
            assert_eq!(buf[4] as usize, i);
        }
        let len = enc.write_payload(&mut buf).unwrap();
        assert_eq!(len, 1 + 3 + 4);
        assert_eq!(buf[0], payload::CODED);
    }

    #[test]
    fn non_systematic_round_trip_binary() {
        let data = block(8 * 16);
        let mut enc = FullVectorEncoder::<Binary, false>::new(shape(8, 16));
        let mut dec = FullVectorDecoder::<Binary, false>::new(shape(8, 16), FullVector);
        enc.set_symbols(&data).unwrap();
        enc.set_systematic_off();
        let mut buf = vec![0u8; enc.payload_size()];
        let mut sent = 0;
        while !dec.is_complete() {
            let len = enc.write_payload(&mut buf).unwrap();
            dec.read_payload(&buf[..len]).unwrap();
            sent += 1;
            assert!(sent < 200, "binary decoder did not converge");
        }
        let mut out = vec![0u8; data.len()];
        assert_eq!(dec.copy_from_symbols(&mut out), data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn decoder_recodes_for_a_relay() {
        let data = block(4 * 8);
        let mut enc = FullVectorEncoder::<Binary8, false>::new(shape(4, 8));
        let mut relay = FullVectorDecoder::<Binary8, false>::new(shape(4, 8), FullVector);
        let mut sink = FullVectorDecoder::<Binary8, false>::new(shape(4, 8), FullVector);
        enc.set_symbols(&data).unwrap();
        let mut buf = vec![0u8; enc.payload_size()];
        let mut rounds = 0;
        while !sink.is_complete() {
            let len = enc.write_payload(&mut buf).unwrap();
            relay.read_payload(&buf[..len]).unwrap();
            let len = relay.recode_payload(&mut buf).unwrap();
            sink.read_payload(&buf[..len]).unwrap();
            rounds += 1;
            assert!(rounds < 50);
        }
        let mut out = vec![0u8; data.len()];
        sink.copy_from_symbols(&mut out);
        assert_eq!(out, data);
    }

    #[test]
    fn density_bounds() {
        let mut enc = SparseFullVectorEncoder::<Binary8, false>::new(shape(10, 4));
        assert_eq!(enc.density(), DEFAULT_DENSITY);
        enc.set_average_nonzero_symbols(2.0).unwrap();
        assert!((enc.density() - 0.2).abs() < 1e-9);
        assert!(enc.set_density(0.0).is_err());
        assert!(enc.set_average_nonzero_symbols(11.0).is_err());
    }

    #[test]
    fn empty_recoder_refuses_to_write() {
        let mut recoder = FullVectorRecoder::<Binary8, false>::build(shape(2, 2), &()).unwrap();
        let mut buf = [0u8; 16];
        assert!(Recoder::write_payload(&mut recoder, &mut buf).is_err());
    }
}
