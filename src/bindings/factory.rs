//! Factory registrar.

use std::sync::Arc;

use super::family::{self, FamilyId};
use super::naming::Role;
use super::probe::probe;
use super::surface::{BufferPolicy, CoderHandle, CoderSurface, FactorySurface, Surface, Value};
use crate::codes::{Build, CoderFactory, Factory, FactoryOptions};
use crate::error::{Error, Result};

/// Builds the factory surface for engine type `C`, whose instances are
/// exposed through `coder`.
///
/// The role is derived from the engine: a completeness query makes it a
/// decoder factory.
pub fn register<C: Build>(
    name: String,
    coder: Arc<CoderSurface>,
    family: FamilyId,
    policy: BufferPolicy,
) -> Result<FactorySurface> {
    let capabilities = probe::<C>();
    let role = Role::of(capabilities)
        .map(|r| r.factory())
        .ok_or_else(|| Error::UnsupportedRole {
            surface: name.clone(),
            role: "factory".into(),
        })?;
    let mut ops: Surface<dyn CoderFactory> = Surface::new(name, role, capabilities, policy);

    let built = Arc::clone(&coder);
    ops.bind("build", move |f, a| {
        a.at_most(0)?;
        Ok(Value::Coder(CoderHandle::new(Arc::clone(&built), f.build()?)))
    })?;
    ops.bind("set_symbols", |f, a| {
        f.set_symbols(a.index(0)?)?;
        Ok(Value::Unit)
    })?;
    ops.bind("set_symbol_size", |f, a| {
        f.set_symbol_size(a.index(0)?)?;
        Ok(Value::Unit)
    })?;
    ops.bind("symbols", |f, _| Ok(f.symbols().into()))?;
    ops.bind("symbol_size", |f, _| Ok(f.symbol_size().into()))?;
    ops.bind("max_symbols", |f, _| Ok(f.max_symbols().into()))?;
    ops.bind("max_symbol_size", |f, _| Ok(f.max_symbol_size().into()))?;
    ops.bind("max_block_size", |f, _| Ok(f.max_block_size().into()))?;
    ops.bind("max_payload_size", |f, _| Ok(f.max_payload_size().into()))?;

    let expansion = <C::Options as FactoryOptions>::EXPANSION;
    let mut surface = FactorySurface::new(ops, coder, expansion, |max_symbols, max_symbol_size| {
        let factory = Factory::<C>::new(max_symbols, max_symbol_size)?;
        Ok(Box::new(factory) as Box<dyn CoderFactory>)
    });
    family::extend_factory(family, &mut surface)?;
    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::coder;
    use crate::codes::fulcrum::FulcrumDecoder;
    use crate::codes::full_vector::FullVectorDecoder;
    use crate::field::Binary8;

    fn decoder_surface<C: Build>(family: FamilyId) -> Arc<CoderSurface> {
        Arc::new(coder::register::<C>("Dec".into(), Role::Decoder, family, BufferPolicy::Strict).unwrap())
    }

    #[test]
    fn block_size_is_product_of_bounds() {
        let coder = decoder_surface::<FullVectorDecoder<Binary8, false>>(FamilyId::FullVector);
        let surface = Arc::new(
            register::<FullVectorDecoder<Binary8, false>>(
                "DecFactory".into(),
                coder,
                FamilyId::FullVector,
                BufferPolicy::Strict,
            )
            .unwrap(),
        );
        assert_eq!(surface.role(), Role::DecoderFactory);
        let factory = surface.construct(4, 160).unwrap();
        let block = factory.call("max_block_size", &[]).unwrap();
        assert_eq!(block.as_uint(), Some(640));
        let decoder = factory.build().unwrap();
        assert_eq!(decoder.call("block_size", &[]).unwrap().as_uint(), Some(640));
        assert!(surface.construct(0, 160).is_err());
    }

    #[test]
    fn fulcrum_factory_exposes_expansion() {
        let coder = decoder_surface::<FulcrumDecoder<Binary8, false>>(FamilyId::Fulcrum);
        let surface = Arc::new(
            register::<FulcrumDecoder<Binary8, false>>(
                "FulcrumDecFactory".into(),
                coder,
                FamilyId::Fulcrum,
                BufferPolicy::Strict,
            )
            .unwrap(),
        );
        for op in ["max_expansion", "expansion", "set_expansion", "max_inner_symbols"] {
            assert!(surface.has(op), "missing {}", op);
        }
        let factory = surface.construct(10, 32).unwrap();
        factory.call("set_expansion", &[Value::from(2usize)]).unwrap();
        let decoder = factory.build().unwrap();
        assert_eq!(decoder.call("inner_symbols", &[]).unwrap().as_uint(), Some(12));
        assert!(factory.call("set_expansion", &[Value::from(99usize)]).is_err());
    }

    #[test]
    fn expansion_extension_needs_fulcrum_options() {
        let coder = decoder_surface::<FullVectorDecoder<Binary8, false>>(FamilyId::FullVector);
        let err = register::<FullVectorDecoder<Binary8, false>>(
            "Broken".into(),
            coder,
            FamilyId::Fulcrum,
            BufferPolicy::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingCapability { .. }));
    }
}
