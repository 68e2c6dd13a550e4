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

//! # Binding Generator
//!
//! Turns the coder engines of [`crate::codes`] into named, callable
//! surfaces. For every family the [`stack`] assembler walks the field set
//! and the trace axis; per variant the [`coder`] registrar binds the base
//! and role operations, applies the capability [`inject`]ors and the
//! family extension, and the [`factory`] registrar binds the factory that
//! builds it. Names come from [`naming`], capability sets from [`probe`].
//!
//! ```no_run
//! use kodo_bindings::bindings::{self, BindingsConfig, Value};
//!
//! let module = bindings::assemble(&BindingsConfig::default()).unwrap();
//! let factory = module.construct("FullVectorEncoderFactoryBinary8", 4, 160).unwrap();
//! let encoder = factory.build().unwrap();
//! encoder.call("set_symbols", &[Value::from(vec![0u8; 640])]).unwrap();
//! let payload = encoder.call("write_payload", &[]).unwrap();
//! ```

use serde::Deserialize;

pub mod coder;
pub mod factory;
pub mod family;
pub mod inject;
pub mod naming;
pub mod probe;
pub mod stack;
pub mod surface;

pub use family::FamilyId;
pub use naming::Role;
pub use stack::{assemble, Module, Registered};
pub use surface::{BufferPolicy, CoderHandle, CoderSurface, FactoryHandle, FactorySurface, Value};

use crate::error::Result;
use crate::field::FieldTag;

/// Which part of the cross-product gets registered.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingsConfig {
    pub families: Vec<FamilyId>,
    /// Fields for the coded families; the no-code family always uses
    /// [`FieldTag::NoField`].
    pub fields: Vec<FieldTag>,
    /// Also register the trace-enabled variants.
    pub trace: bool,
    pub buffer_policy: BufferPolicy,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            families: FamilyId::ALL.to_vec(),
            fields: FieldTag::CODED.to_vec(),
            trace: true,
            buffer_policy: BufferPolicy::Strict,
        }
    }
}

impl BindingsConfig {
    /// Parses the `[bindings]` table; missing keys keep their defaults.
    pub fn from_toml(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Root {
            bindings: Option<Section>,
        }

        #[derive(Deserialize)]
        struct Section {
            families: Option<Vec<String>>,
            fields: Option<Vec<String>>,
            trace: Option<bool>,
            buffer_policy: Option<String>,
        }

        let raw: Root = toml::from_str(s)?;
        let mut cfg = BindingsConfig::default();
        let section = match raw.bindings {
            Some(section) => section,
            None => return Ok(cfg),
        };
        if let Some(families) = section.families {
            cfg.families = families
                .iter()
                .map(|f| f.parse())
                .collect::<Result<Vec<FamilyId>>>()?;
        }
        if let Some(fields) = section.fields {
            cfg.fields = fields
                .iter()
                .map(|f| f.parse())
                .collect::<Result<Vec<FieldTag>>>()?;
        }
        if let Some(trace) = section.trace {
            cfg.trace = trace;
        }
        if let Some(policy) = section.buffer_policy {
            cfg.buffer_policy = policy.parse()?;
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.families.is_empty() {
            return Err("bindings.families must name at least one family".into());
        }
        let coded = self.families.iter().any(FamilyId::is_coded);
        if coded && self.fields.is_empty() {
            return Err("bindings.fields must name at least one field".into());
        }
        if let Some(field) = self.fields.iter().find(|f| !FieldTag::CODED.contains(*f)) {
            return Err(format!("field {} has no arithmetic to register", field));
        }
        let mut families = self.families.clone();
        families.sort();
        families.dedup();
        if families.len() != self.families.len() {
            return Err("bindings.families lists a family twice".into());
        }
        Ok(())
    }
}
