//! Stack assembler: walks family × field × trace × role and publishes the
//! resulting surfaces into a [`Module`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::{debug, info};

use super::family::FamilyId;
use super::naming::{self, Role};
use super::surface::{BufferPolicy, CoderSurface, FactoryHandle, FactorySurface};
use super::{coder, factory, BindingsConfig};
use crate::codes::fulcrum::{FulcrumDecoder, FulcrumEncoder};
use crate::codes::full_vector::{
    FullVectorDecoder, FullVectorEncoder, FullVectorRecoder, SparseFullVectorEncoder,
};
use crate::codes::nocode::{CarouselDecoder, CarouselEncoder};
use crate::codes::on_the_fly::{OnTheFlyDecoder, OnTheFlyEncoder};
use crate::codes::perpetual::{PerpetualDecoder, PerpetualEncoder};
use crate::codes::sliding_window::{SlidingWindowDecoder, SlidingWindowEncoder};
use crate::codes::Build;
use crate::error::{Error, Result};
use crate::field::{Binary, Binary16, Binary4, Binary8, Field, FieldTag};

/// One published surface.
#[derive(Debug, Clone)]
pub enum Registered {
    Coder(Arc<CoderSurface>),
    Factory(Arc<FactorySurface>),
}

impl Registered {
    pub fn name(&self) -> &str {
        match self {
            Registered::Coder(s) => s.name(),
            Registered::Factory(s) => s.name(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Registered::Coder(s) => s.role(),
            Registered::Factory(s) => s.role(),
        }
    }

    pub fn operations(&self) -> Vec<&'static str> {
        match self {
            Registered::Coder(s) => s.operations(),
            Registered::Factory(s) => s.operations(),
        }
    }
}

/// Surfaces produced by one assembly pass, not yet published.
struct Pass {
    policy: BufferPolicy,
    pending: Vec<Registered>,
}

impl Pass {
    /// Registers coder type `C` as `role` plus its factory.
    fn stack<C: Build>(&mut self, family: FamilyId, role: Role, field: FieldTag, trace: bool) -> Result<()> {
        let stack = family.stack_name();
        let coder_name = naming::resolve(stack, role, field, trace);
        let factory_name = naming::resolve(stack, role.factory(), field, trace);

        let coder = Arc::new(coder::register::<C>(coder_name, role, family, self.policy)?);
        let factory = factory::register::<C>(factory_name, Arc::clone(&coder), family, self.policy)?;
        debug!(
            "registered {} ({} ops) and {} ({} ops)",
            coder.name(),
            coder.operations().len(),
            factory.name(),
            factory.operations().len()
        );
        self.pending.push(Registered::Coder(coder));
        self.pending.push(Registered::Factory(Arc::new(factory)));
        Ok(())
    }
}

/// Role table of the coded families for one field and trace setting.
fn coded<F: Field, const TRACE: bool>(pass: &mut Pass, family: FamilyId) -> Result<()> {
    let field = F::TAG;
    match family {
        FamilyId::FullVector => {
            pass.stack::<FullVectorEncoder<F, TRACE>>(family, Role::Encoder, field, TRACE)?;
            pass.stack::<FullVectorDecoder<F, TRACE>>(family, Role::Decoder, field, TRACE)?;
            pass.stack::<FullVectorRecoder<F, TRACE>>(family, Role::Recoder, field, TRACE)
        }
        FamilyId::SparseFullVector => {
            pass.stack::<SparseFullVectorEncoder<F, TRACE>>(family, Role::Encoder, field, TRACE)
        }
        FamilyId::OnTheFly => {
            pass.stack::<OnTheFlyEncoder<F, TRACE>>(family, Role::Encoder, field, TRACE)?;
            pass.stack::<OnTheFlyDecoder<F, TRACE>>(family, Role::Decoder, field, TRACE)
        }
        FamilyId::SlidingWindow => {
            pass.stack::<SlidingWindowEncoder<F, TRACE>>(family, Role::Encoder, field, TRACE)?;
            pass.stack::<SlidingWindowDecoder<F, TRACE>>(family, Role::Decoder, field, TRACE)
        }
        FamilyId::Fulcrum => {
            pass.stack::<FulcrumEncoder<F, TRACE>>(family, Role::Encoder, field, TRACE)?;
            pass.stack::<FulcrumDecoder<F, TRACE>>(family, Role::Decoder, field, TRACE)
        }
        FamilyId::Perpetual => {
            pass.stack::<PerpetualEncoder<F, TRACE>>(family, Role::Encoder, field, TRACE)?;
            pass.stack::<PerpetualDecoder<F, TRACE>>(family, Role::Decoder, field, TRACE)
        }
        FamilyId::NoCode => Err(Error::UnknownField(format!(
            "{} for family {}",
            field, family
        ))),
    }
}

fn nocode<const TRACE: bool>(pass: &mut Pass) -> Result<()> {
    let family = FamilyId::NoCode;
    pass.stack::<CarouselEncoder<TRACE>>(family, Role::Encoder, FieldTag::NoField, TRACE)?;
    pass.stack::<CarouselDecoder<TRACE>>(family, Role::Decoder, FieldTag::NoField, TRACE)
}

fn dispatch(pass: &mut Pass, family: FamilyId, field: FieldTag, trace: bool) -> Result<()> {
    match (field, trace) {
        (FieldTag::Binary, false) => coded::<Binary, false>(pass, family),
        (FieldTag::Binary, true) => coded::<Binary, true>(pass, family),
        (FieldTag::Binary4, false) => coded::<Binary4, false>(pass, family),
        (FieldTag::Binary4, true) => coded::<Binary4, true>(pass, family),
        (FieldTag::Binary8, false) => coded::<Binary8, false>(pass, family),
        (FieldTag::Binary8, true) => coded::<Binary8, true>(pass, family),
        (FieldTag::Binary16, false) => coded::<Binary16, false>(pass, family),
        (FieldTag::Binary16, true) => coded::<Binary16, true>(pass, family),
        (FieldTag::NoField, false) if family == FamilyId::NoCode => nocode::<false>(pass),
        (FieldTag::NoField, true) if family == FamilyId::NoCode => nocode::<true>(pass),
        (other, _) => Err(Error::UnknownField(format!(
            "{} for family {}",
            other, family
        ))),
    }
}

/// The registry of published surfaces.
#[derive(Debug, Default)]
pub struct Module {
    surfaces: BTreeMap<String, Registered>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one assembly pass and publishes its surfaces.
    ///
    /// The pass is all-or-nothing: on any error, including a name already
    /// present in the module, nothing is published. Returns the number of
    /// surfaces added.
    pub fn assemble(&mut self, config: &BindingsConfig) -> Result<usize> {
        config.validate().map_err(Error::Config)?;
        let mut pass = Pass {
            policy: config.buffer_policy,
            pending: Vec::new(),
        };
        let traces: &[bool] = if config.trace { &[false, true] } else { &[false] };

        for &family in &config.families {
            let before = pass.pending.len();
            let fields: Vec<FieldTag> = if family.is_coded() {
                family
                    .fields()
                    .iter()
                    .copied()
                    .filter(|f| config.fields.contains(f))
                    .collect()
            } else {
                family.fields().to_vec()
            };
            for &field in &fields {
                for &trace in traces {
                    dispatch(&mut pass, family, field, trace)?;
                }
            }
            info!(
                "{}: {} surfaces over {} field(s)",
                family,
                pass.pending.len() - before,
                fields.len()
            );
        }

        let mut seen = HashSet::new();
        for entry in &pass.pending {
            let name = entry.name();
            if self.surfaces.contains_key(name) || !seen.insert(name.to_string()) {
                return Err(Error::DuplicateName(name.to_string()));
            }
        }
        let added = pass.pending.len();
        for entry in pass.pending {
            self.surfaces.insert(entry.name().to_string(), entry);
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.surfaces.keys().map(String::as_str).collect()
    }

    pub fn surface(&self, name: &str) -> Option<&Registered> {
        self.surfaces.get(name)
    }

    pub fn coder(&self, name: &str) -> Option<&Arc<CoderSurface>> {
        match self.surfaces.get(name) {
            Some(Registered::Coder(s)) => Some(s),
            _ => None,
        }
    }

    pub fn factory(&self, name: &str) -> Option<&Arc<FactorySurface>> {
        match self.surfaces.get(name) {
            Some(Registered::Factory(s)) => Some(s),
            _ => None,
        }
    }

    /// Constructs the factory registered as `name`.
    pub fn construct(&self, name: &str, max_symbols: usize, max_symbol_size: usize) -> Result<FactoryHandle> {
        let surface = self
            .factory(name)
            .ok_or_else(|| Error::NoSuchOperation {
                surface: "module".into(),
                operation: name.to_string(),
            })?;
        surface.construct(max_symbols, max_symbol_size)
    }

    pub fn version(&self) -> &'static str {
        crate::version()
    }
}

/// Assembles a fresh module from `config`.
pub fn assemble(config: &BindingsConfig) -> Result<Module> {
    crate::field::init_gf_tables();
    let mut module = Module::new();
    let added = module.assemble(config)?;
    info!("assembled {} surfaces", added);
    Ok(module)
}
