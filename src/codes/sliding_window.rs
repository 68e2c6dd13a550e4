//! Sliding window RLNC. The decoder reports which symbols it has decoded
//! and the encoder leaves those out of later combinations.

use rand::rngs::StdRng;

use super::block::SourceBlock;
use super::linear::{ensure_nonzero, Generator, LinearDecoder, LinearEncoder};
use super::{Coder, Decoder, FeedbackSize, PartialDecoding, ReadFeedback, Shape, WriteFeedback};
use crate::error::{Error, Result};
use crate::field::Field;

dense_kind!(
    /// Decoder kind of the sliding window family.
    SlidingWindow
);

pub type SlidingWindowEncoder<F, const TRACE: bool> = LinearEncoder<F, Window, TRACE>;
pub type SlidingWindowDecoder<F, const TRACE: bool> = LinearDecoder<F, SlidingWindow, TRACE>;

capabilities!(impl[F: Field, const TRACE: bool] SlidingWindowEncoder<F, TRACE>, trace = TRACE,
    [encoder, rank, systematic, feedback_size, read_feedback]);

capabilities!(impl[F: Field, const TRACE: bool] SlidingWindowDecoder<F, TRACE>, trace = TRACE,
    [decoder, rank, symbol_pivot, recode, read_symbol, partial_decoding, feedback_size, write_feedback]);

fn bitmap_size(symbols: usize) -> usize {
    (symbols + 7) / 8
}

/// Uniform coefficients restricted to symbols the receiver still lacks.
#[derive(Debug)]
pub struct Window {
    acknowledged: Vec<bool>,
}

impl Window {
    pub fn acknowledged_count(&self) -> usize {
        self.acknowledged.iter().filter(|&&a| a).count()
    }
}

impl<F: Field> Generator<F> for Window {
    fn new(shape: Shape) -> Self {
        Window {
            acknowledged: vec![false; shape.symbols],
        }
    }

    fn generate(&mut self, rng: &mut StdRng, block: &SourceBlock, coefficients: &mut [F::Elem]) {
        let mut window: Vec<usize> = block.present().filter(|&i| !self.acknowledged[i]).collect();
        if window.is_empty() {
            window = block.present().collect();
        }
        for &i in &window {
            coefficients[i] = F::random(rng);
        }
        ensure_nonzero::<F>(rng, coefficients, &window);
    }

    fn acknowledged(&self, index: usize) -> bool {
        self.acknowledged.get(index).copied().unwrap_or(false)
    }
}

impl<F: Field, const TRACE: bool> FeedbackSize for SlidingWindowEncoder<F, TRACE> {
    fn feedback_size(&self) -> usize {
        bitmap_size(self.symbols())
    }
}

impl<F: Field, const TRACE: bool> ReadFeedback for SlidingWindowEncoder<F, TRACE> {
    fn read_feedback(&mut self, feedback: &[u8]) -> Result<()> {
        let symbols = self.symbols();
        if feedback.len() < bitmap_size(symbols) {
            return Err(Error::InvalidPayload(format!(
                "feedback holds {} bytes, expected {}",
                feedback.len(),
                bitmap_size(symbols)
            )));
        }
        let window = self.generator_mut();
        for (i, ack) in window.acknowledged.iter_mut().enumerate() {
            *ack = feedback[i / 8] & (1 << (i % 8)) != 0;
        }
        Ok(())
    }
}

impl<F: Field, const TRACE: bool> FeedbackSize for SlidingWindowDecoder<F, TRACE> {
    fn feedback_size(&self) -> usize {
        bitmap_size(self.symbols())
    }
}

impl<F: Field, const TRACE: bool> WriteFeedback for SlidingWindowDecoder<F, TRACE> {
    fn write_feedback(&self, feedback: &mut [u8]) -> usize {
        let len = bitmap_size(self.symbols()).min(feedback.len());
        feedback[..len].iter_mut().for_each(|b| *b = 0);
        for i in (0..self.symbols()).filter(|&i| i / 8 < len) {
            if self.is_symbol_uncoded(i) {
                feedback[i / 8] |= 1 << (i % 8);
            }
        }
        len
    }
}

impl<F: Field, const TRACE: bool> PartialDecoding for SlidingWindowDecoder<F, TRACE> {
    fn is_partial_complete(&self) -> bool {
        self.partially_complete()
    }
}
