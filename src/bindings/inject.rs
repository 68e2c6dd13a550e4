//! Method injectors.
//!
//! Each [`Injector`] owns one optional capability and binds its operations
//! when the surface's capability set carries the flag; otherwise it does
//! nothing. Injectors bind disjoint operation names, so applying them in
//! any order yields the same surface.
//!
//! The `bind_*` functions further down are the family extensions. Unlike
//! injectors they are applied on request and fail when the engine lacks the
//! capability they expose.

use super::surface::{scratch, CoderSurface, Expect, FactorySurface, Value};
use crate::codes::CapabilitySet;
use crate::error::{Error, Result};

/// Binds the operations of one optional capability.
#[derive(Clone, Copy)]
pub struct Injector {
    pub capability: CapabilitySet,
    bind: fn(&mut CoderSurface) -> Result<()>,
}

impl Injector {
    pub fn apply(&self, surface: &mut CoderSurface) -> Result<()> {
        if !surface.capabilities().contains(self.capability) {
            return Ok(());
        }
        (self.bind)(surface)
    }
}

impl std::fmt::Debug for Injector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injector")
            .field("capability", &self.capability.names())
            .finish()
    }
}

pub const INJECTORS: [Injector; 7] = [
    Injector {
        capability: CapabilitySet::TRACE,
        bind: trace,
    },
    Injector {
        capability: CapabilitySet::RANK,
        bind: rank,
    },
    Injector {
        capability: CapabilitySet::SYMBOL_PIVOT,
        bind: symbol_pivot,
    },
    Injector {
        capability: CapabilitySet::SYSTEMATIC,
        bind: systematic,
    },
    Injector {
        capability: CapabilitySet::PARTIAL_DECODING,
        bind: partial_decoding,
    },
    Injector {
        capability: CapabilitySet::RECODE,
        bind: recode,
    },
    Injector {
        capability: CapabilitySet::READ_SYMBOL,
        bind: read_symbol,
    },
];

pub fn apply_all(surface: &mut CoderSurface, injectors: &[Injector]) -> Result<()> {
    for injector in injectors {
        injector.apply(surface)?;
    }
    Ok(())
}

fn trace(s: &mut CoderSurface) -> Result<()> {
    s.bind("trace", |c, a| {
        a.at_most(0)?;
        let t = a.require(c.as_trace(), "TRACE")?;
        Ok(Value::Str(t.trace(None)))
    })?;
    s.bind("filtered_trace", |c, a| {
        let zone = a.str(0)?;
        let t = a.require(c.as_trace(), "TRACE")?;
        Ok(Value::Str(t.trace(Some(zone))))
    })
}

fn rank(s: &mut CoderSurface) -> Result<()> {
    s.bind("rank", |c, a| {
        a.at_most(0)?;
        Ok(a.require(c.as_rank(), "RANK")?.rank().into())
    })
}

fn symbol_pivot(s: &mut CoderSurface) -> Result<()> {
    s.bind("is_symbol_pivot", |c, a| {
        let index = a.index(0)?;
        Ok(a.require(c.as_symbol_pivot(), "SYMBOL_PIVOT")?
            .is_symbol_pivot(index)
            .into())
    })
}

fn systematic(s: &mut CoderSurface) -> Result<()> {
    s.bind("is_systematic_on", |c, a| {
        Ok(a.require(c.as_systematic(), "SYSTEMATIC")?.is_systematic_on().into())
    })?;
    s.bind("set_systematic_on", |c, a| {
        a.require(c.as_systematic(), "SYSTEMATIC")?.set_systematic_on();
        Ok(Value::Unit)
    })?;
    s.bind("set_systematic_off", |c, a| {
        a.require(c.as_systematic(), "SYSTEMATIC")?.set_systematic_off();
        Ok(Value::Unit)
    })
}

fn partial_decoding(s: &mut CoderSurface) -> Result<()> {
    s.bind("is_partial_complete", |c, a| {
        Ok(a.require(c.as_partial_decoding(), "PARTIAL_DECODING")?
            .is_partial_complete()
            .into())
    })
}

fn recode(s: &mut CoderSurface) -> Result<()> {
    s.bind("write_payload", |c, a| {
        let size = c.payload_size();
        let r = a.require(c.as_recode(), "RECODE")?;
        scratch(size, |buf| r.recode_payload(buf))
    })
}

fn read_symbol(s: &mut CoderSurface) -> Result<()> {
    s.bind("read_symbol", |c, a| {
        let size = c.symbol_size();
        let r = a.require(c.as_read_symbol(), "READ_SYMBOL")?;
        let symbol = a.input(0, Expect::Exact(size))?;
        let coefficients = a.input(1, Expect::Exact(r.coefficient_vector_size()))?;
        r.read_symbol(&symbol, &coefficients)?;
        Ok(Value::Unit)
    })
}

fn require(surface: &CoderSurface, capability: CapabilitySet, name: &str) -> Result<()> {
    if surface.capabilities().contains(capability) {
        return Ok(());
    }
    Err(Error::MissingCapability {
        surface: surface.name().to_string(),
        capability: name.to_string(),
    })
}

/// Sliding window feedback: `feedback_size` plus whichever of
/// `read_feedback` (encoders) and `write_feedback` (decoders) exists.
pub(crate) fn bind_feedback(s: &mut CoderSurface) -> Result<()> {
    require(s, CapabilitySet::FEEDBACK_SIZE, "FEEDBACK_SIZE")?;
    let caps = s.capabilities();
    if !caps.intersects(CapabilitySet::READ_FEEDBACK | CapabilitySet::WRITE_FEEDBACK) {
        return Err(Error::MissingCapability {
            surface: s.name().to_string(),
            capability: "READ_FEEDBACK or WRITE_FEEDBACK".into(),
        });
    }
    s.bind("feedback_size", |c, a| {
        Ok(a.require(c.as_feedback_size(), "FEEDBACK_SIZE")?.feedback_size().into())
    })?;
    if caps.contains(CapabilitySet::READ_FEEDBACK) {
        s.bind("read_feedback", |c, a| {
            let size = a.require(c.as_feedback_size(), "FEEDBACK_SIZE")?.feedback_size();
            let feedback = a.input(0, Expect::Exact(size))?;
            a.require(c.as_read_feedback(), "READ_FEEDBACK")?
                .read_feedback(&feedback)?;
            Ok(Value::Unit)
        })?;
    }
    if caps.contains(CapabilitySet::WRITE_FEEDBACK) {
        s.bind("write_feedback", |c, a| {
            let size = a.require(c.as_feedback_size(), "FEEDBACK_SIZE")?.feedback_size();
            let w = a.require(c.as_write_feedback(), "WRITE_FEEDBACK")?;
            scratch(size, |buf| Ok(w.write_feedback(buf)))
        })?;
    }
    Ok(())
}

pub(crate) fn bind_density(s: &mut CoderSurface) -> Result<()> {
    require(s, CapabilitySet::DENSITY, "DENSITY")?;
    s.bind("density", |c, a| {
        Ok(a.require(c.as_density(), "DENSITY")?.density().into())
    })?;
    s.bind("set_density", |c, a| {
        let density = a.float(0)?;
        a.require(c.as_density(), "DENSITY")?.set_density(density)?;
        Ok(Value::Unit)
    })?;
    s.bind("set_average_nonzero_symbols", |c, a| {
        let symbols = a.float(0)?;
        a.require(c.as_density(), "DENSITY")?
            .set_average_nonzero_symbols(symbols)?;
        Ok(Value::Unit)
    })
}

pub(crate) fn bind_expansion(s: &mut CoderSurface) -> Result<()> {
    require(s, CapabilitySet::EXPANSION, "EXPANSION")?;
    s.bind("max_expansion", |c, a| {
        Ok(a.require(c.as_expansion(), "EXPANSION")?.max_expansion().into())
    })?;
    s.bind("expansion", |c, a| {
        Ok(a.require(c.as_expansion(), "EXPANSION")?.expansion().into())
    })?;
    s.bind("inner_symbols", |c, a| {
        Ok(a.require(c.as_expansion(), "EXPANSION")?.inner_symbols().into())
    })
}

pub(crate) fn bind_factory_expansion(s: &mut FactorySurface) -> Result<()> {
    if !s.has_expansion() {
        return Err(Error::MissingCapability {
            surface: s.name().to_string(),
            capability: "EXPANSION".into(),
        });
    }
    let ops = s.ops_mut();
    ops.bind("max_expansion", |f, a| {
        Ok(a.require(f.as_expansion(), "EXPANSION")?.max_expansion().into())
    })?;
    ops.bind("expansion", |f, a| {
        Ok(a.require(f.as_expansion(), "EXPANSION")?.expansion().into())
    })?;
    ops.bind("set_expansion", |f, a| {
        let expansion = a.index(0)?;
        a.require(f.as_expansion(), "EXPANSION")?
            .set_expansion(expansion)?;
        Ok(Value::Unit)
    })?;
    ops.bind("max_inner_symbols", |f, a| {
        Ok(a.require(f.as_expansion(), "EXPANSION")?.max_inner_symbols().into())
    })
}

/// Perpetual width controls, encoders only.
pub(crate) fn bind_width(s: &mut CoderSurface) -> Result<()> {
    require(s, CapabilitySet::WIDTH, "WIDTH")?;
    s.bind("pseudo_systematic", |c, a| {
        Ok(a.require(c.as_width(), "WIDTH")?.pseudo_systematic().into())
    })?;
    s.bind("set_pseudo_systematic", |c, a| {
        let on = a.bool(0)?;
        a.require(c.as_width(), "WIDTH")?.set_pseudo_systematic(on);
        Ok(Value::Unit)
    })?;
    s.bind("pre_charging", |c, a| {
        Ok(a.require(c.as_width(), "WIDTH")?.pre_charging().into())
    })?;
    s.bind("set_pre_charging", |c, a| {
        let on = a.bool(0)?;
        a.require(c.as_width(), "WIDTH")?.set_pre_charging(on);
        Ok(Value::Unit)
    })?;
    s.bind("width", |c, a| {
        Ok(a.require(c.as_width(), "WIDTH")?.width().into())
    })?;
    s.bind("set_width", |c, a| {
        let width = a.index(0)?;
        a.require(c.as_width(), "WIDTH")?.set_width(width)?;
        Ok(Value::Unit)
    })?;
    s.bind("width_ratio", |c, a| {
        Ok(a.require(c.as_width(), "WIDTH")?.width_ratio().into())
    })?;
    s.bind("set_width_ratio", |c, a| {
        let ratio = a.float(0)?;
        a.require(c.as_width(), "WIDTH")?.set_width_ratio(ratio)?;
        Ok(Value::Unit)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::naming::Role;
    use crate::bindings::surface::BufferPolicy;

    fn surface(caps: CapabilitySet) -> CoderSurface {
        CoderSurface::new("Scratch".into(), Role::Decoder, caps, BufferPolicy::Strict)
    }

    #[test]
    fn absent_capability_binds_nothing() {
        let mut s = surface(CapabilitySet::DECODER);
        apply_all(&mut s, &INJECTORS).unwrap();
        assert!(s.operations().is_empty());
    }

    #[test]
    fn injection_order_does_not_matter() {
        let caps = CapabilitySet::all();
        let mut forward = surface(caps);
        apply_all(&mut forward, &INJECTORS).unwrap();
        let mut reversed = surface(caps);
        let mut injectors = INJECTORS;
        injectors.reverse();
        apply_all(&mut reversed, &injectors).unwrap();
        assert_eq!(forward.operations(), reversed.operations());
    }

    #[test]
    fn extension_requires_its_capability() {
        let mut s = surface(CapabilitySet::DECODER | CapabilitySet::FEEDBACK_SIZE);
        assert!(matches!(
            bind_feedback(&mut s),
            Err(Error::MissingCapability { .. })
        ));
        let mut s = surface(CapabilitySet::ENCODER);
        assert!(bind_width(&mut s).is_err());
        assert!(s.operations().is_empty());
    }
}
