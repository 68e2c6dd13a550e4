//! External names: `<Stack><Role><Field>` with `Trace` appended for
//! trace-enabled variants.

use std::fmt;

use serde::Serialize;

use crate::codes::CapabilitySet;
use crate::field::FieldTag;

pub const TRACE_SUFFIX: &str = "Trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Role {
    Encoder,
    Decoder,
    Recoder,
    EncoderFactory,
    DecoderFactory,
    RecoderFactory,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Encoder,
        Role::Decoder,
        Role::Recoder,
        Role::EncoderFactory,
        Role::DecoderFactory,
        Role::RecoderFactory,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Role::Encoder => "Encoder",
            Role::Decoder => "Decoder",
            Role::Recoder => "Recoder",
            Role::EncoderFactory => "EncoderFactory",
            Role::DecoderFactory => "DecoderFactory",
            Role::RecoderFactory => "RecoderFactory",
        }
    }

    /// Coder role backed by a capability set. A decoder is recognised by
    /// its completeness query, so `DECODER` wins over `ENCODER`.
    pub fn of(capabilities: CapabilitySet) -> Option<Role> {
        if capabilities.contains(CapabilitySet::DECODER) {
            Some(Role::Decoder)
        } else if capabilities.contains(CapabilitySet::RECODER) {
            Some(Role::Recoder)
        } else if capabilities.contains(CapabilitySet::ENCODER) {
            Some(Role::Encoder)
        } else {
            None
        }
    }

    /// Factory role building coders of this role.
    pub fn factory(&self) -> Role {
        match self {
            Role::Encoder | Role::EncoderFactory => Role::EncoderFactory,
            Role::Decoder | Role::DecoderFactory => Role::DecoderFactory,
            Role::Recoder | Role::RecoderFactory => Role::RecoderFactory,
        }
    }

    pub fn is_factory(&self) -> bool {
        matches!(
            self,
            Role::EncoderFactory | Role::DecoderFactory | Role::RecoderFactory
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

pub fn resolve(stack: &str, role: Role, field: FieldTag, trace: bool) -> String {
    let mut name = String::with_capacity(stack.len() + 32);
    name.push_str(stack);
    name.push_str(role.suffix());
    name.push_str(field.name());
    if trace {
        name.push_str(TRACE_SUFFIX);
    }
    name
}
