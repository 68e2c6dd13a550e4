use std::collections::{BTreeMap, HashSet};

use kodo_bindings::bindings::coder::base_operations;
use kodo_bindings::bindings::family;
use kodo_bindings::bindings::{self, BindingsConfig, FamilyId, Module, Registered, Role, Value};
use kodo_bindings::codes::CapabilitySet;
use kodo_bindings::error::Error;
use once_cell::sync::Lazy;

static MODULE: Lazy<Module> =
    Lazy::new(|| bindings::assemble(&BindingsConfig::default()).expect("default module assembles"));

#[test]
fn every_name_is_registered_once() {
    let names = MODULE.names();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    // full vector 48, sparse 16, four two-role families 32 each, nocode 8
    assert_eq!(MODULE.len(), 48 + 16 + 4 * 32 + 8);
}

#[test]
fn names_follow_stack_role_field_trace() {
    for name in [
        "FullVectorEncoderBinary8",
        "FullVectorDecoderFactoryBinary16Trace",
        "SparseFullVectorEncoderBinary4",
        "OnTheFlyDecoderBinary",
        "SlidingWindowEncoderFactoryBinary8Trace",
        "FulcrumDecoderBinary",
        "PerpetualEncoderBinary16",
        "NoCodeEncoder",
        "NoCodeDecoderFactoryTrace",
    ] {
        assert!(MODULE.surface(name).is_some(), "{} not registered", name);
    }
    assert!(MODULE.surface("SparseFullVectorDecoderBinary8").is_none());
    assert!(MODULE.surface("NoCodeEncoderBinary8").is_none());
}

#[test]
fn factories_build_their_own_coder() {
    for name in MODULE.names() {
        if let Some(Registered::Factory(factory)) = MODULE.surface(name) {
            let coder = factory.coder_surface();
            assert_eq!(coder.role().factory(), factory.role(), "{}", name);
            assert_eq!(coder.name().len() + "Factory".len(), name.len(), "{}", name);
        }
    }
}

#[test]
fn coder_surfaces_start_from_their_role_base() {
    for name in MODULE.names() {
        if let Some(Registered::Coder(surface)) = MODULE.surface(name) {
            let ops = surface.operations();
            for op in base_operations(surface.role()) {
                assert!(ops.contains(op), "{} lacks {}", name, op);
            }
            assert_eq!(ops.contains(&"trace"), name.ends_with("Trace"), "{}", name);
        }
    }
}

#[test]
fn capability_operations_follow_the_engine() {
    let encoder = MODULE.coder("FullVectorEncoderBinary8").unwrap();
    let mut expected: Vec<&str> = base_operations(Role::Encoder).to_vec();
    expected.extend(["rank", "is_systematic_on", "set_systematic_off", "set_systematic_on"]);
    expected.sort_unstable();
    assert_eq!(encoder.operations(), expected);

    let decoder = MODULE.coder("FullVectorDecoderBinary8").unwrap();
    for op in ["rank", "is_symbol_pivot", "read_symbol", "write_payload"] {
        assert!(decoder.has(op), "decoder lacks {}", op);
    }
    let otf = MODULE.coder("OnTheFlyDecoderBinary8").unwrap();
    assert!(otf.has("is_partial_complete"));
    assert!(!MODULE.coder("NoCodeDecoder").unwrap().has("read_symbol"));
}

/// Family whose stack name prefixes `name`, preferring the longest match.
fn family_of(name: &str) -> FamilyId {
    FamilyId::ALL
        .iter()
        .copied()
        .filter(|f| name.starts_with(f.stack_name()))
        .max_by_key(|f| f.stack_name().len())
        .unwrap()
}

fn capability_operations(caps: CapabilitySet) -> Vec<&'static str> {
    let table: [(CapabilitySet, &[&str]); 7] = [
        (CapabilitySet::TRACE, &["trace", "filtered_trace"]),
        (CapabilitySet::RANK, &["rank"]),
        (CapabilitySet::SYMBOL_PIVOT, &["is_symbol_pivot"]),
        (
            CapabilitySet::SYSTEMATIC,
            &["is_systematic_on", "set_systematic_on", "set_systematic_off"],
        ),
        (CapabilitySet::PARTIAL_DECODING, &["is_partial_complete"]),
        (CapabilitySet::RECODE, &["write_payload"]),
        (CapabilitySet::READ_SYMBOL, &["read_symbol"]),
    ];
    table
        .iter()
        .filter(|(flag, _)| caps.contains(*flag))
        .flat_map(|(_, ops)| ops.iter().copied())
        .collect()
}

fn extension_operations(family: FamilyId, role: Role, caps: CapabilitySet) -> Vec<&'static str> {
    match (family, role) {
        (FamilyId::SlidingWindow, _) => {
            let mut ops = vec!["feedback_size"];
            if caps.contains(CapabilitySet::READ_FEEDBACK) {
                ops.push("read_feedback");
            }
            if caps.contains(CapabilitySet::WRITE_FEEDBACK) {
                ops.push("write_feedback");
            }
            ops
        }
        (FamilyId::SparseFullVector, _) => {
            vec!["density", "set_density", "set_average_nonzero_symbols"]
        }
        (FamilyId::Fulcrum, _) => vec!["max_expansion", "expansion", "inner_symbols"],
        (FamilyId::Perpetual, Role::Encoder) => vec![
            "pseudo_systematic",
            "set_pseudo_systematic",
            "pre_charging",
            "set_pre_charging",
            "width",
            "set_width",
            "width_ratio",
            "set_width_ratio",
        ],
        _ => Vec::new(),
    }
}

fn sorted(mut ops: Vec<&'static str>) -> Vec<&'static str> {
    ops.sort_unstable();
    ops.dedup();
    ops
}

#[test]
fn every_surface_is_exactly_base_capabilities_and_extension() {
    let mut checked = 0;
    for name in MODULE.names() {
        let family = family_of(name);
        match MODULE.surface(name).unwrap() {
            Registered::Coder(surface) => {
                let caps = surface.capabilities();
                let mut expected = base_operations(surface.role()).to_vec();
                expected.extend(capability_operations(caps));
                expected.extend(extension_operations(family, surface.role(), caps));
                assert_eq!(surface.operations(), sorted(expected), "{}", name);
            }
            Registered::Factory(factory) => {
                let mut expected = base_operations(factory.role()).to_vec();
                if family == FamilyId::Fulcrum {
                    expected.extend(["max_expansion", "expansion", "set_expansion", "max_inner_symbols"]);
                }
                assert_eq!(factory.operations(), sorted(expected), "{}", name);
            }
        }
        checked += 1;
    }
    assert_eq!(checked, 200);
}

#[test]
fn identical_capabilities_give_identical_operations() {
    let mut groups: BTreeMap<(u32, Option<FamilyId>), Vec<&'static str>> = BTreeMap::new();
    for name in MODULE.names() {
        let surface = match MODULE.surface(name).unwrap() {
            Registered::Coder(surface) => surface,
            Registered::Factory(_) => continue,
        };
        let family = family_of(name);
        let extended = family::extension(family).map(|_| family);
        let ops = surface.operations();
        let seen = groups
            .entry((surface.capabilities().bits(), extended))
            .or_insert_with(|| ops.clone());
        assert_eq!(*seen, ops, "{}", name);
    }
    // plain full vector and on-the-fly encoders share one engine shape
    let plain = MODULE.coder("FullVectorEncoderBinary8").unwrap();
    let otf = MODULE.coder("OnTheFlyEncoderBinary16").unwrap();
    assert_eq!(plain.capabilities(), otf.capabilities());
    assert_eq!(plain.operations(), otf.operations());
}

#[test]
fn extensions_stay_within_their_family() {
    let sw_enc = MODULE.coder("SlidingWindowEncoderBinary8").unwrap();
    let sw_dec = MODULE.coder("SlidingWindowDecoderBinary8").unwrap();
    assert!(sw_enc.has("read_feedback") && sw_enc.has("feedback_size"));
    assert!(sw_dec.has("write_feedback") && !sw_dec.has("read_feedback"));
    assert!(!MODULE.coder("FullVectorDecoderBinary8").unwrap().has("write_feedback"));

    assert!(MODULE.coder("SparseFullVectorEncoderBinary8").unwrap().has("set_density"));
    assert!(!MODULE.coder("FullVectorEncoderBinary8").unwrap().has("set_density"));

    assert!(MODULE.coder("FulcrumDecoderBinary8").unwrap().has("inner_symbols"));
    assert!(MODULE.factory("FulcrumEncoderFactoryBinary8").unwrap().has("set_expansion"));
    assert!(!MODULE.factory("FullVectorEncoderFactoryBinary8").unwrap().has("set_expansion"));

    assert!(MODULE.coder("PerpetualEncoderBinary8").unwrap().has("set_width_ratio"));
    assert!(!MODULE.coder("PerpetualDecoderBinary8").unwrap().has("set_width_ratio"));
}

#[test]
fn rerunning_the_assembler_is_rejected() {
    let mut module = Module::new();
    let cfg = BindingsConfig {
        families: vec![FamilyId::OnTheFly],
        ..BindingsConfig::default()
    };
    assert_eq!(module.assemble(&cfg).unwrap(), 32);
    let err = module.assemble(&cfg).unwrap_err();
    assert!(matches!(err, Error::DuplicateName(_)));
    assert_eq!(module.len(), 32);
}

#[test]
fn trace_axis_can_be_disabled() {
    let module = bindings::assemble(&BindingsConfig {
        families: vec![FamilyId::Perpetual],
        trace: false,
        ..BindingsConfig::default()
    })
    .unwrap();
    assert_eq!(module.len(), 16);
    assert!(module.names().iter().all(|n| !n.ends_with("Trace")));
}

#[test]
fn trace_surfaces_render_named_zones() {
    let factory = MODULE.construct("FullVectorDecoderFactoryBinary8Trace", 4, 8).unwrap();
    let decoder = factory.build().unwrap();
    let all = decoder.call("trace", &[]).unwrap();
    let all = all.as_str().unwrap();
    assert!(all.contains("decoder_state") && all.contains("symbol_storage"));
    let one = decoder
        .call("filtered_trace", &[Value::from("symbol_storage")])
        .unwrap();
    let one = one.as_str().unwrap();
    assert!(one.contains("symbol_storage"));
    assert!(!one.contains("decoder_state"));
}

#[test]
fn unknown_operation_is_an_error() {
    let factory = MODULE.construct("NoCodeEncoderFactory", 2, 2).unwrap();
    let encoder = factory.build().unwrap();
    let err = encoder.call("rank_of_everything", &[]).unwrap_err();
    assert!(matches!(err, Error::NoSuchOperation { .. }));
}
