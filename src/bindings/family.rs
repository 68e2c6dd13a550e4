//! Algorithm families and their extension registry.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::Serialize;

use super::inject;
use super::naming::Role;
use super::surface::{CoderSurface, FactorySurface};
use crate::error::{Error, Result};
use crate::field::FieldTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FamilyId {
    FullVector,
    SparseFullVector,
    OnTheFly,
    SlidingWindow,
    Fulcrum,
    Perpetual,
    NoCode,
}

impl FamilyId {
    pub const ALL: [FamilyId; 7] = [
        FamilyId::FullVector,
        FamilyId::SparseFullVector,
        FamilyId::OnTheFly,
        FamilyId::SlidingWindow,
        FamilyId::Fulcrum,
        FamilyId::Perpetual,
        FamilyId::NoCode,
    ];

    /// Stack name, the first component of every registered name.
    pub fn stack_name(&self) -> &'static str {
        match self {
            FamilyId::FullVector => "FullVector",
            FamilyId::SparseFullVector => "SparseFullVector",
            FamilyId::OnTheFly => "OnTheFly",
            FamilyId::SlidingWindow => "SlidingWindow",
            FamilyId::Fulcrum => "Fulcrum",
            FamilyId::Perpetual => "Perpetual",
            FamilyId::NoCode => "NoCode",
        }
    }

    /// Fields enumerated for the family.
    pub fn fields(&self) -> &'static [FieldTag] {
        match self {
            FamilyId::NoCode => &[FieldTag::NoField],
            _ => &FieldTag::CODED,
        }
    }

    pub fn is_coded(&self) -> bool {
        !matches!(self, FamilyId::NoCode)
    }
}

impl fmt::Display for FamilyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stack_name())
    }
}

impl FromStr for FamilyId {
    type Err = Error;

    /// Accepts the stack name in any case, with or without `_`/`-`
    /// separators (`full_vector`, `FullVector`, `sliding-window`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        FamilyId::ALL
            .iter()
            .copied()
            .find(|family| family.stack_name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| Error::UnknownFamily(s.to_string()))
    }
}

/// Family-specific bindings layered on top of the injected surface.
#[derive(Clone, Copy)]
pub struct Extension {
    pub coder: fn(&mut CoderSurface) -> Result<()>,
    pub factory: fn(&mut FactorySurface) -> Result<()>,
}

fn no_factory_extension(_surface: &mut FactorySurface) -> Result<()> {
    Ok(())
}

fn perpetual_coder(surface: &mut CoderSurface) -> Result<()> {
    match surface.role() {
        Role::Encoder => inject::bind_width(surface),
        _ => Ok(()),
    }
}

lazy_static! {
    static ref EXTENSIONS: HashMap<FamilyId, Extension> = {
        let mut m = HashMap::new();
        m.insert(
            FamilyId::SlidingWindow,
            Extension {
                coder: inject::bind_feedback,
                factory: no_factory_extension,
            },
        );
        m.insert(
            FamilyId::SparseFullVector,
            Extension {
                coder: inject::bind_density,
                factory: no_factory_extension,
            },
        );
        m.insert(
            FamilyId::Fulcrum,
            Extension {
                coder: inject::bind_expansion,
                factory: inject::bind_factory_expansion,
            },
        );
        m.insert(
            FamilyId::Perpetual,
            Extension {
                coder: perpetual_coder,
                factory: no_factory_extension,
            },
        );
        m
    };
}

/// Registered extension of a family, `None` for families without one.
pub fn extension(family: FamilyId) -> Option<Extension> {
    EXTENSIONS.get(&family).copied()
}

pub(crate) fn extend_coder(family: FamilyId, surface: &mut CoderSurface) -> Result<()> {
    match extension(family) {
        Some(ext) => (ext.coder)(surface),
        None => Ok(()),
    }
}

pub(crate) fn extend_factory(family: FamilyId, surface: &mut FactorySurface) -> Result<()> {
    match extension(family) {
        Some(ext) => (ext.factory)(surface),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_names_parse_loosely() {
        assert_eq!("full_vector".parse::<FamilyId>().unwrap(), FamilyId::FullVector);
        assert_eq!("SlidingWindow".parse::<FamilyId>().unwrap(), FamilyId::SlidingWindow);
        assert_eq!("no-code".parse::<FamilyId>().unwrap(), FamilyId::NoCode);
        assert!(matches!(
            "raptor".parse::<FamilyId>(),
            Err(Error::UnknownFamily(_))
        ));
    }

    #[test]
    fn only_specialised_families_have_extensions() {
        assert!(extension(FamilyId::FullVector).is_none());
        assert!(extension(FamilyId::OnTheFly).is_none());
        assert!(extension(FamilyId::NoCode).is_none());
        assert!(extension(FamilyId::Fulcrum).is_some());
    }

    #[test]
    fn nocode_has_no_field() {
        assert_eq!(FamilyId::NoCode.fields(), &[FieldTag::NoField]);
        assert_eq!(FamilyId::Perpetual.fields().len(), 4);
    }
}
