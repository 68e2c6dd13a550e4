//! Coder registrar: base operations, role operations, injectors, family
//! extension, in that order.

use super::family::{self, FamilyId};
use super::inject::{self, INJECTORS};
use super::naming::Role;
use super::probe::probe;
use super::surface::{scratch, BufferPolicy, CoderSurface, Expect, Value};
use crate::codes::Build;
use crate::error::{Error, Result};

/// Builds the surface of engine type `C` registered as `role`.
///
/// Fails when the engine cannot back `role`; a surface is never emitted
/// with an operation its engine lacks.
pub fn register<C: Build>(name: String, role: Role, family: FamilyId, policy: BufferPolicy) -> Result<CoderSurface> {
    let capabilities = probe::<C>();
    if Role::of(capabilities) != Some(role) {
        return Err(Error::UnsupportedRole {
            surface: name,
            role: role.to_string(),
        });
    }
    let mut surface = CoderSurface::new(name, role, capabilities, policy);
    bind_base(&mut surface)?;
    match role {
        Role::Encoder => bind_encoder(&mut surface)?,
        Role::Decoder => bind_decoder(&mut surface)?,
        Role::Recoder => bind_recoder(&mut surface)?,
        factory => {
            return Err(Error::UnsupportedRole {
                surface: surface.name().to_string(),
                role: factory.to_string(),
            })
        }
    }
    inject::apply_all(&mut surface, &INJECTORS)?;
    family::extend_coder(family, &mut surface)?;
    Ok(surface)
}

fn bind_base(s: &mut CoderSurface) -> Result<()> {
    s.bind("payload_size", |c, _| Ok(c.payload_size().into()))?;
    s.bind("block_size", |c, _| Ok(c.block_size().into()))?;
    s.bind("symbol_size", |c, _| Ok(c.symbol_size().into()))?;
    s.bind("symbols", |c, _| Ok(c.symbols().into()))
}

fn bind_encoder(s: &mut CoderSurface) -> Result<()> {
    s.bind("write_payload", |c, a| {
        a.at_most(0)?;
        let size = c.payload_size();
        let e = a.require(c.as_encoder(), "ENCODER")?;
        scratch(size, |buf| e.write_payload(buf))
    })?;
    s.bind("set_symbols", |c, a| {
        let data = a.input(0, Expect::Exact(c.block_size()))?;
        a.require(c.as_encoder(), "ENCODER")?.set_symbols(&data)?;
        Ok(Value::Unit)
    })?;
    s.bind("set_symbol", |c, a| {
        let index = a.index(0)?;
        let data = a.input(1, Expect::Exact(c.symbol_size()))?;
        a.require(c.as_encoder(), "ENCODER")?.set_symbol(index, &data)?;
        Ok(Value::Unit)
    })
}

fn bind_decoder(s: &mut CoderSurface) -> Result<()> {
    s.bind("read_payload", |c, a| {
        let payload = a.input(0, Expect::UpTo(c.payload_size()))?;
        a.require(c.as_decoder(), "DECODER")?.read_payload(&payload)?;
        Ok(Value::Unit)
    })?;
    s.bind("is_complete", |c, a| {
        Ok(a.require(c.as_decoder(), "DECODER")?.is_complete().into())
    })?;
    s.bind("copy_from_symbols", |c, a| {
        let size = c.block_size();
        let d = a.require(c.as_decoder(), "DECODER")?;
        scratch(size, |buf| Ok(d.copy_from_symbols(buf)))
    })?;
    s.bind("copy_from_symbol", |c, a| {
        let index = a.index(0)?;
        let size = c.symbol_size();
        let d = a.require(c.as_decoder(), "DECODER")?;
        scratch(size, |buf| d.copy_from_symbol(index, buf))
    })?;
    s.bind("read_uncoded_symbol", |c, a| {
        let data = a.input(0, Expect::Exact(c.symbol_size()))?;
        let index = a.index(1)?;
        a.require(c.as_decoder(), "DECODER")?
            .read_uncoded_symbol(index, &data)?;
        Ok(Value::Unit)
    })?;
    s.bind("symbols_uncoded", |c, a| {
        Ok(a.require(c.as_decoder(), "DECODER")?.symbols_uncoded().into())
    })?;
    s.bind("symbols_missing", |c, a| {
        Ok(a.require(c.as_decoder(), "DECODER")?.symbols_missing().into())
    })?;
    s.bind("symbols_partially_decoded", |c, a| {
        Ok(a.require(c.as_decoder(), "DECODER")?
            .symbols_partially_decoded()
            .into())
    })?;
    s.bind("is_symbol_uncoded", |c, a| {
        let index = a.index(0)?;
        Ok(a.require(c.as_decoder(), "DECODER")?.is_symbol_uncoded(index).into())
    })?;
    s.bind("is_symbol_missing", |c, a| {
        let index = a.index(0)?;
        Ok(a.require(c.as_decoder(), "DECODER")?.is_symbol_missing(index).into())
    })?;
    s.bind("is_symbol_partially_decoded", |c, a| {
        let index = a.index(0)?;
        Ok(a.require(c.as_decoder(), "DECODER")?
            .is_symbol_partially_decoded(index)
            .into())
    })
}

fn bind_recoder(s: &mut CoderSurface) -> Result<()> {
    s.bind("read_payload", |c, a| {
        let payload = a.input(0, Expect::UpTo(c.payload_size()))?;
        a.require(c.as_recoder(), "RECODER")?.read_payload(&payload)?;
        Ok(Value::Unit)
    })?;
    s.bind("write_payload", |c, a| {
        let size = c.payload_size();
        let r = a.require(c.as_recoder(), "RECODER")?;
        scratch(size, |buf| r.write_payload(buf))
    })
}

/// Operation names every surface of `role` carries before injection.
pub fn base_operations(role: Role) -> &'static [&'static str] {
    match role {
        Role::Encoder => &[
            "block_size",
            "payload_size",
            "set_symbol",
            "set_symbols",
            "symbol_size",
            "symbols",
            "write_payload",
        ],
        Role::Decoder => &[
            "block_size",
            "copy_from_symbol",
            "copy_from_symbols",
            "is_complete",
            "is_symbol_missing",
            "is_symbol_partially_decoded",
            "is_symbol_uncoded",
            "payload_size",
            "read_payload",
            "read_uncoded_symbol",
            "symbol_size",
            "symbols",
            "symbols_missing",
            "symbols_partially_decoded",
            "symbols_uncoded",
        ],
        Role::Recoder => &[
            "block_size",
            "payload_size",
            "read_payload",
            "symbol_size",
            "symbols",
            "write_payload",
        ],
        Role::EncoderFactory | Role::DecoderFactory | Role::RecoderFactory => &[
            "build",
            "max_block_size",
            "max_payload_size",
            "max_symbol_size",
            "max_symbols",
            "set_symbol_size",
            "set_symbols",
            "symbol_size",
            "symbols",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::full_vector::{FullVectorDecoder, FullVectorEncoder};
    use crate::field::Binary8;

    #[test]
    fn encoder_surface_is_base_plus_capabilities() {
        let s = register::<FullVectorEncoder<Binary8, false>>(
            "FullVectorEncoderBinary8".into(),
            Role::Encoder,
            FamilyId::FullVector,
            BufferPolicy::Strict,
        )
        .unwrap();
        let mut expected: Vec<&str> = base_operations(Role::Encoder).to_vec();
        expected.extend(["rank", "is_systematic_on", "set_systematic_on", "set_systematic_off"]);
        expected.sort_unstable();
        assert_eq!(s.operations(), expected);
    }

    #[test]
    fn wrong_role_is_rejected() {
        let err = register::<FullVectorDecoder<Binary8, false>>(
            "Broken".into(),
            Role::Encoder,
            FamilyId::FullVector,
            BufferPolicy::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedRole { .. }));
    }

    #[test]
    fn extension_on_incapable_engine_fails() {
        let err = register::<FullVectorEncoder<Binary8, false>>(
            "Broken".into(),
            Role::Encoder,
            FamilyId::SparseFullVector,
            BufferPolicy::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingCapability { .. }));
    }
}
