//! Capability probe with a process-wide memo keyed by engine type.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::trace;

use crate::codes::{CapabilitySet, Probed};

lazy_static! {
    static ref PROBED: Mutex<HashMap<TypeId, CapabilitySet>> = Mutex::new(HashMap::new());
}

/// Capability set of engine type `C`, computed once per type.
pub fn probe<C: Probed + 'static>() -> CapabilitySet {
    let mut memo = PROBED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *memo.entry(TypeId::of::<C>()).or_insert_with(|| {
        trace!("probed {}: {:?}", type_name::<C>(), C::CAPABILITIES.names());
        C::CAPABILITIES
    })
}

/// Number of engine types probed so far.
pub fn probed_types() -> usize {
    PROBED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .len()
}
