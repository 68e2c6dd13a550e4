use bitflags::bitflags;

use crate::error::Result;

bitflags! {
    /// Structural capabilities of one coder engine type.
    ///
    /// The role flags (`ENCODER`, `DECODER`, `RECODER`) mark the mandatory
    /// surfaces a type can back; every other flag is an optional operation
    /// group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CapabilitySet: u32 {
        /// `write_payload`, `set_symbols`, `set_symbol`.
        const ENCODER          = 1 << 0;
        /// `read_payload`, completeness query and copy-out operations.
        const DECODER          = 1 << 1;
        /// Pure recoder: `read_payload` plus `write_payload`.
        const RECODER          = 1 << 2;
        const TRACE            = 1 << 3;
        const RANK             = 1 << 4;
        const SYMBOL_PIVOT     = 1 << 5;
        const SYSTEMATIC       = 1 << 6;
        const PARTIAL_DECODING = 1 << 7;
        /// Decoder that can emit recoded payloads.
        const RECODE           = 1 << 8;
        /// Decoder accepting a raw symbol plus its coefficient vector.
        const READ_SYMBOL      = 1 << 9;
        const FEEDBACK_SIZE    = 1 << 10;
        const READ_FEEDBACK    = 1 << 11;
        const WRITE_FEEDBACK   = 1 << 12;
        const DENSITY          = 1 << 13;
        const EXPANSION        = 1 << 14;
        const WIDTH            = 1 << 15;
    }
}

impl CapabilitySet {
    /// Human readable flag names, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

/// Compile-time capability declaration of an engine type.
///
/// Implemented through `capabilities!` only, which also writes the
/// matching accessors on [`Capable`], so the constant and the accessors
/// cannot drift apart.
pub trait Probed {
    const CAPABILITIES: CapabilitySet;
}

pub trait Encoder {
    /// Writes one encoded unit and returns the number of bytes used.
    fn write_payload(&mut self, payload: &mut [u8]) -> Result<usize>;
    fn set_symbols(&mut self, data: &[u8]) -> Result<()>;
    fn set_symbol(&mut self, index: usize, data: &[u8]) -> Result<()>;
}

pub trait Decoder {
    fn read_payload(&mut self, payload: &[u8]) -> Result<()>;
    fn is_complete(&self) -> bool;
    /// Copies the decoded block into `out`, returning the bytes copied.
    fn copy_from_symbols(&self, out: &mut [u8]) -> usize;
    fn copy_from_symbol(&self, index: usize, out: &mut [u8]) -> Result<usize>;
    fn read_uncoded_symbol(&mut self, index: usize, data: &[u8]) -> Result<()>;
    fn symbols_uncoded(&self) -> usize;
    fn symbols_missing(&self) -> usize;
    fn symbols_partially_decoded(&self) -> usize;
    fn is_symbol_uncoded(&self, index: usize) -> bool;
    fn is_symbol_missing(&self, index: usize) -> bool;
    fn is_symbol_partially_decoded(&self, index: usize) -> bool;
}

pub trait Recoder {
    fn read_payload(&mut self, payload: &[u8]) -> Result<()>;
    fn write_payload(&mut self, payload: &mut [u8]) -> Result<usize>;
}

pub trait ReadSymbol {
    fn coefficient_vector_size(&self) -> usize;
    fn read_symbol(&mut self, data: &[u8], coefficients: &[u8]) -> Result<()>;
}

pub trait Recode {
    fn recode_payload(&mut self, payload: &mut [u8]) -> Result<usize>;
}

pub trait Rank {
    fn rank(&self) -> usize;
}

pub trait SymbolPivot {
    fn is_symbol_pivot(&self, index: usize) -> bool;
}

pub trait Systematic {
    fn is_systematic_on(&self) -> bool;
    fn set_systematic_on(&mut self);
    fn set_systematic_off(&mut self);
}

pub trait PartialDecoding {
    /// True once every symbol seen so far is fully decoded.
    fn is_partial_complete(&self) -> bool;
}

pub trait Trace {
    /// Renders the current coder state, optionally restricted to one zone.
    fn trace(&self, zone: Option<&str>) -> String;
}

pub trait FeedbackSize {
    fn feedback_size(&self) -> usize;
}

pub trait ReadFeedback {
    fn read_feedback(&mut self, feedback: &[u8]) -> Result<()>;
}

pub trait WriteFeedback {
    fn write_feedback(&self, feedback: &mut [u8]) -> usize;
}

pub trait Density {
    fn density(&self) -> f64;
    fn set_density(&mut self, density: f64) -> Result<()>;
    fn set_average_nonzero_symbols(&mut self, symbols: f64) -> Result<()>;
}

pub trait Expansion {
    fn max_expansion(&self) -> usize;
    fn expansion(&self) -> usize;
    fn inner_symbols(&self) -> usize;
}

pub trait Width {
    fn pseudo_systematic(&self) -> bool;
    fn set_pseudo_systematic(&mut self, on: bool);
    fn pre_charging(&self) -> bool;
    fn set_pre_charging(&mut self, on: bool);
    fn width(&self) -> usize;
    fn set_width(&mut self, width: usize) -> Result<()>;
    fn width_ratio(&self) -> f64;
    fn set_width_ratio(&mut self, ratio: f64) -> Result<()>;
}

/// Object-safe access to the optional traits of an engine.
///
/// Every accessor defaults to `None`; `capabilities!` overrides exactly the
/// ones listed for a type.
pub trait Capable {
    fn as_encoder(&mut self) -> Option<&mut dyn Encoder> {
        None
    }
    fn as_decoder(&mut self) -> Option<&mut dyn Decoder> {
        None
    }
    fn as_recoder(&mut self) -> Option<&mut dyn Recoder> {
        None
    }
    fn as_trace(&mut self) -> Option<&mut dyn Trace> {
        None
    }
    fn as_rank(&mut self) -> Option<&mut dyn Rank> {
        None
    }
    fn as_symbol_pivot(&mut self) -> Option<&mut dyn SymbolPivot> {
        None
    }
    fn as_systematic(&mut self) -> Option<&mut dyn Systematic> {
        None
    }
    fn as_partial_decoding(&mut self) -> Option<&mut dyn PartialDecoding> {
        None
    }
    fn as_recode(&mut self) -> Option<&mut dyn Recode> {
        None
    }
    fn as_read_symbol(&mut self) -> Option<&mut dyn ReadSymbol> {
        None
    }
    fn as_feedback_size(&mut self) -> Option<&mut dyn FeedbackSize> {
        None
    }
    fn as_read_feedback(&mut self) -> Option<&mut dyn ReadFeedback> {
        None
    }
    fn as_write_feedback(&mut self) -> Option<&mut dyn WriteFeedback> {
        None
    }
    fn as_density(&mut self) -> Option<&mut dyn Density> {
        None
    }
    fn as_expansion(&mut self) -> Option<&mut dyn Expansion> {
        None
    }
    fn as_width(&mut self) -> Option<&mut dyn Width> {
        None
    }
}
