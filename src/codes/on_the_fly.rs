//! On-the-fly RLNC: symbols may be handed to the encoder one at a time and
//! coding starts before the block is complete. The decoder tracks which
//! received symbols are already usable.

use super::linear::LinearDecoder;
use super::PartialDecoding;
use crate::field::Field;

dense_kind!(
    /// Decoder kind of the on-the-fly family.
    OnTheFly
);

/// The full vector encoder already codes over whatever prefix is present.
pub type OnTheFlyEncoder<F, const TRACE: bool> = super::full_vector::FullVectorEncoder<F, TRACE>;
pub type OnTheFlyDecoder<F, const TRACE: bool> = LinearDecoder<F, OnTheFly, TRACE>;

capabilities!(impl[F: Field, const TRACE: bool] OnTheFlyDecoder<F, TRACE>, trace = TRACE,
    [decoder, rank, symbol_pivot, recode, read_symbol, partial_decoding]);

impl<F: Field, const TRACE: bool> PartialDecoding for OnTheFlyDecoder<F, TRACE> {
    fn is_partial_complete(&self) -> bool {
        self.partially_complete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{Coder, Decoder, Encoder, Rank, Shape};
    use crate::field::Binary8;

    #[test]
    fn decodes_while_symbols_arrive() {
        let shape = Shape {
            symbols: 5,
            symbol_size: 8,
        };
        let data: Vec<u8> = (0..40).map(|i| (i * 13) as u8).collect();
        let mut enc = OnTheFlyEncoder::<Binary8, false>::new(shape);
        let mut dec = OnTheFlyDecoder::<Binary8, false>::new(shape, OnTheFly);
        let mut buf = vec![0u8; enc.payload_size()];
        assert!(!dec.is_partial_complete());

        let mut step = 0;
        while !dec.is_complete() {
            if enc.rank() < shape.symbols {
                let i = enc.rank();
                enc.set_symbol(i, &data[i * 8..(i + 1) * 8]).unwrap();
            }
            let len = enc.write_payload(&mut buf).unwrap();
            // Drop every third payload.
            if step % 3 != 2 {
                dec.read_payload(&buf[..len]).unwrap();
                if dec.rank() == dec.symbols_uncoded() {
                    assert!(dec.is_partial_complete());
                }
            }
            step += 1;
            assert!(step < 100);
        }
        let mut out = vec![0u8; 40];
        dec.copy_from_symbols(&mut out);
        assert_eq!(out, data);
    }
}
