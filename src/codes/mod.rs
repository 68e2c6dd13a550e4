// Copyright (c) 2024, The QuicFuscate Project Authors.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following disclaimer
//       in the documentation and/or other materials provided with the
//       distribution.
//
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived from
//       this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! # Coder Engines
//!
//! Random linear network coding engines over the fields in [`crate::field`]:
//! full vector, sparse full vector, on the fly, sliding window, fulcrum,
//! perpetual and the uncoded carousel. Each engine is a plain struct with a
//! `const TRACE: bool` parameter; its optional operations are ordinary
//! traits declared once per type through `capabilities!`.

use std::marker::PhantomData;

use crate::error::{Error, Result};

pub mod capability;
pub use capability::*;

/// Writes the `Capable` accessor for one capability name.
macro_rules! capability_accessor {
    (encoder) => {
        fn as_encoder(&mut self) -> Option<&mut dyn $crate::codes::Encoder> {
            Some(self)
        }
    };
    (decoder) => {
        fn as_decoder(&mut self) -> Option<&mut dyn $crate::codes::Decoder> {
            Some(self)
        }
    };
    (recoder) => {
        fn as_recoder(&mut self) -> Option<&mut dyn $crate::codes::Recoder> {
            Some(self)
        }
    };
    (rank) => {
        fn as_rank(&mut self) -> Option<&mut dyn $crate::codes::Rank> {
            Some(self)
        }
    };
    (symbol_pivot) => {
        fn as_symbol_pivot(&mut self) -> Option<&mut dyn $crate::codes::SymbolPivot> {
            Some(self)
        }
    };
    (systematic) => {
        fn as_systematic(&mut self) -> Option<&mut dyn $crate::codes::Systematic> {
            Some(self)
        }
    };
    (partial_decoding) => {
        fn as_partial_decoding(&mut self) -> Option<&mut dyn $crate::codes::PartialDecoding> {
            Some(self)
        }
    };
    (recode) => {
        fn as_recode(&mut self) -> Option<&mut dyn $crate::codes::Recode> {
            Some(self)
        }
    };
    (read_symbol) => {
        fn as_read_symbol(&mut self) -> Option<&mut dyn $crate::codes::ReadSymbol> {
            Some(self)
        }
    };
    (feedback_size) => {
        fn as_feedback_size(&mut self) -> Option<&mut dyn $crate::codes::FeedbackSize> {
            Some(self)
        }
    };
    (read_feedback) => {
        fn as_read_feedback(&mut self) -> Option<&mut dyn $crate::codes::ReadFeedback> {
            Some(self)
        }
    };
    (write_feedback) => {
        fn as_write_feedback(&mut self) -> Option<&mut dyn $crate::codes::WriteFeedback> {
            Some(self)
        }
    };
    (density) => {
        fn as_density(&mut self) -> Option<&mut dyn $crate::codes::Density> {
            Some(self)
        }
    };
    (expansion) => {
        fn as_expansion(&mut self) -> Option<&mut dyn $crate::codes::Expansion> {
            Some(self)
        }
    };
    (width) => {
        fn as_width(&mut self) -> Option<&mut dyn $crate::codes::Width> {
            Some(self)
        }
    };
}

macro_rules! capability_flag {
    (encoder) => { $crate::codes::CapabilitySet::ENCODER };
    (decoder) => { $crate::codes::CapabilitySet::DECODER };
    (recoder) => { $crate::codes::CapabilitySet::RECODER };
    (rank) => { $crate::codes::CapabilitySet::RANK };
    (symbol_pivot) => { $crate::codes::CapabilitySet::SYMBOL_PIVOT };
    (systematic) => { $crate::codes::CapabilitySet::SYSTEMATIC };
    (partial_decoding) => { $crate::codes::CapabilitySet::PARTIAL_DECODING };
    (recode) => { $crate::codes::CapabilitySet::RECODE };
    (read_symbol) => { $crate::codes::CapabilitySet::READ_SYMBOL };
    (feedback_size) => { $crate::codes::CapabilitySet::FEEDBACK_SIZE };
    (read_feedback) => { $crate::codes::CapabilitySet::READ_FEEDBACK };
    (write_feedback) => { $crate::codes::CapabilitySet::WRITE_FEEDBACK };
    (density) => { $crate::codes::CapabilitySet::DENSITY };
    (expansion) => { $crate::codes::CapabilitySet::EXPANSION };
    (width) => { $crate::codes::CapabilitySet::WIDTH };
}

/// Declares the capabilities of an engine type.
///
/// `trace = EXPR` gates the `Trace` accessor on a const generic, the list
/// names every other capability. The type must implement each listed trait,
/// otherwise the generated `Some(self)` does not compile.
macro_rules! capabilities {
    (impl[$($gen:tt)*] $ty:ty, trace = $trace:expr, [$($cap:ident),* $(,)?]) => {
        impl<$($gen)*> $crate::codes::Capable for $ty {
            $( capability_accessor!($cap); )*

            fn as_trace(&mut self) -> Option<&mut dyn $crate::codes::Trace> {
                if $trace {
                    Some(self)
                } else {
                    None
                }
            }
        }

        impl<$($gen)*> $crate::codes::Probed for $ty {
            const CAPABILITIES: $crate::codes::CapabilitySet = {
                let set = $crate::codes::CapabilitySet::empty()
                    $(.union(capability_flag!($cap)))*;
                if $trace {
                    set.union($crate::codes::CapabilitySet::TRACE)
                } else {
                    set
                }
            };
        }
    };
}

pub(crate) mod block;
pub(crate) mod matrix;
pub(crate) mod payload;
#[macro_use]
pub mod linear;

pub mod fulcrum;
pub mod full_vector;
pub mod nocode;
pub mod on_the_fly;
pub mod perpetual;
pub mod sliding_window;

/// Symbol count and symbol size of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub symbols: usize,
    pub symbol_size: usize,
}

impl Shape {
    pub fn block_size(&self) -> usize {
        self.symbols * self.symbol_size
    }

    /// Block size, or `None` when the block could never be allocated.
    pub fn checked_block_size(&self) -> Option<usize> {
        self.symbols
            .checked_mul(self.symbol_size)
            .filter(|&size| size <= isize::MAX as usize)
    }

    fn bounded(self) -> Result<Self> {
        match self.checked_block_size() {
            Some(_) => Ok(self),
            None => Err(Error::InvalidParameter(format!(
                "{} symbols of {} bytes overflow the block size",
                self.symbols, self.symbol_size
            ))),
        }
    }
}

/// Base contract every engine satisfies.
pub trait Coder: Capable + Send + 'static {
    fn symbols(&self) -> usize;
    fn symbol_size(&self) -> usize;
    /// Largest number of bytes one `write_payload` may produce.
    fn payload_size(&self) -> usize;

    fn block_size(&self) -> usize {
        self.symbols() * self.symbol_size()
    }
}

/// Engine types a [`Factory`] can construct.
pub trait Build: Coder + Probed + Sized {
    type Options: FactoryOptions;

    fn build(shape: Shape, options: &Self::Options) -> Result<Self>;
    fn max_payload_size(max: Shape, options: &Self::Options) -> usize;

    fn symbol_size_ok(symbol_size: usize) -> bool {
        symbol_size > 0
    }
}

/// Extra factory state some families carry (fulcrum expansion).
pub trait FactoryOptions: Send + 'static {
    const EXPANSION: bool = false;

    fn new(max_symbols: usize) -> Self;

    fn as_expansion(&mut self) -> Option<&mut dyn ExpansionControl> {
        None
    }
}

impl FactoryOptions for () {
    fn new(_max_symbols: usize) -> Self {}
}

pub trait ExpansionControl {
    fn max_expansion(&self) -> usize;
    fn expansion(&self) -> usize;
    fn set_expansion(&mut self, expansion: usize) -> Result<()>;
    fn max_inner_symbols(&self) -> usize;
}

/// Object-safe factory contract.
pub trait CoderFactory: Send + 'static {
    fn max_symbols(&self) -> usize;
    fn max_symbol_size(&self) -> usize;
    fn max_payload_size(&self) -> usize;
    fn symbols(&self) -> usize;
    fn symbol_size(&self) -> usize;
    fn set_symbols(&mut self, symbols: usize) -> Result<()>;
    fn set_symbol_size(&mut self, symbol_size: usize) -> Result<()>;
    fn build(&self) -> Result<Box<dyn Coder>>;

    fn max_block_size(&self) -> usize {
        self.max_symbols() * self.max_symbol_size()
    }

    fn as_expansion(&mut self) -> Option<&mut dyn ExpansionControl> {
        None
    }
}

/// Builds coders of type `C` bounded by the limits fixed at construction.
pub struct Factory<C: Build> {
    max: Shape,
    current: Shape,
    options: C::Options,
    _coder: PhantomData<fn() -> C>,
}

impl<C: Build> Factory<C> {
    pub fn new(max_symbols: usize, max_symbol_size: usize) -> Result<Self> {
        if max_symbols == 0 {
            return Err(Error::InvalidParameter("max_symbols must be positive".into()));
        }
        if !C::symbol_size_ok(max_symbol_size) {
            return Err(Error::InvalidParameter(format!(
                "max_symbol_size {} is not a whole number of field elements",
                max_symbol_size
            )));
        }
        let max = Shape {
            symbols: max_symbols,
            symbol_size: max_symbol_size,
        }
        .bounded()?;
        Ok(Self {
            max,
            current: max,
            options: C::Options::new(max_symbols),
            _coder: PhantomData,
        })
    }

    pub fn build_typed(&self) -> Result<C> {
        C::build(self.current, &self.options)
    }

    pub fn options(&self) -> &C::Options {
        &self.options
    }
}

impl<C: Build> CoderFactory for Factory<C> {
    fn max_symbols(&self) -> usize {
        self.max.symbols
    }

    fn max_symbol_size(&self) -> usize {
        self.max.symbol_size
    }

    fn max_payload_size(&self) -> usize {
        C::max_payload_size(self.max, &self.options)
    }

    fn symbols(&self) -> usize {
        self.current.symbols
    }

    fn symbol_size(&self) -> usize {
        self.current.symbol_size
    }

    fn set_symbols(&mut self, symbols: usize) -> Result<()> {
        if symbols == 0 || symbols > self.max.symbols {
            return Err(Error::InvalidParameter(format!(
                "symbols {} outside 1..={}",
                symbols, self.max.symbols
            )));
        }
        self.current = Shape {
            symbols,
            ..self.current
        }
        .bounded()?;
        Ok(())
    }

    fn set_symbol_size(&mut self, symbol_size: usize) -> Result<()> {
        if symbol_size > self.max.symbol_size || !C::symbol_size_ok(symbol_size) {
            return Err(Error::InvalidParameter(format!(
                "symbol_size {} invalid (max {})",
                symbol_size, self.max.symbol_size
            )));
        }
        self.current = Shape {
            symbol_size,
            ..self.current
        }
        .bounded()?;
        Ok(())
    }

    fn build(&self) -> Result<Box<dyn Coder>> {
        Ok(Box::new(self.build_typed()?))
    }

    fn as_expansion(&mut self) -> Option<&mut dyn ExpansionControl> {
        self.options.as_expansion()
    }
}

/// Joins per-zone trace sections, keeping only `filter` when given.
pub(crate) fn render_trace(zones: Vec<(&'static str, String)>, filter: Option<&str>) -> String {
    let mut out = String::new();
    for (zone, body) in zones {
        if filter.map_or(true, |f| f == zone) {
            out.push_str(zone);
            out.push_str(":\n");
            out.push_str(&body);
        }
    }
    out
}
