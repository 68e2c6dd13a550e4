use kodo_bindings::bindings::{self, BindingsConfig, BufferPolicy, CoderHandle, FamilyId, Module, Value};
use kodo_bindings::error::Error;
use kodo_bindings::field::FieldTag;
use once_cell::sync::Lazy;

static MODULE: Lazy<Module> = Lazy::new(|| {
    bindings::assemble(&BindingsConfig {
        trace: false,
        ..BindingsConfig::default()
    })
    .expect("module assembles")
});

fn build(module: &Module, factory: &str, symbols: usize, symbol_size: usize) -> CoderHandle {
    module
        .construct(factory, symbols, symbol_size)
        .unwrap()
        .build()
        .unwrap()
}

fn uint(handle: &CoderHandle, op: &str) -> u64 {
    handle.call(op, &[]).unwrap().as_uint().unwrap()
}

fn flag(handle: &CoderHandle, op: &str) -> bool {
    handle.call(op, &[]).unwrap().as_bool().unwrap()
}

#[test]
fn decode_simple_binary_system() {
    let decoder = build(&MODULE, "FullVectorDecoderFactoryBinary", 3, 1);
    // coefficient bits are packed least significant first
    let rows = [("3a", "02"), ("8d", "03"), ("d6", "05")];
    for (symbol, coefficients) in rows {
        decoder
            .call(
                "read_symbol",
                &[
                    Value::from(hex::decode(symbol).unwrap()),
                    Value::from(hex::decode(coefficients).unwrap()),
                ],
            )
            .unwrap();
    }
    assert!(flag(&decoder, "is_complete"));
    let block = decoder.call("copy_from_symbols", &[]).unwrap();
    assert_eq!(hex::encode(block.as_bytes().unwrap()), "b73a61");
}

#[test]
fn full_vector_round_trip_through_surfaces() {
    let encoder = build(&MODULE, "FullVectorEncoderFactoryBinary8", 4, 160);
    let decoder = build(&MODULE, "FullVectorDecoderFactoryBinary8", 4, 160);
    assert_eq!(uint(&encoder, "block_size"), 640);

    let data: Vec<u8> = (0..640u32).map(|i| (i * 7 + 3) as u8).collect();
    encoder.call("set_symbols", &[Value::from(data.clone())]).unwrap();
    encoder.call("set_systematic_off", &[]).unwrap();
    assert!(!flag(&encoder, "is_systematic_on"));

    let mut sent = 0;
    while !flag(&decoder, "is_complete") {
        let payload = encoder.call("write_payload", &[]).unwrap();
        assert!(payload.as_bytes().unwrap().len() <= uint(&encoder, "payload_size") as usize);
        decoder.call("read_payload", &[payload]).unwrap();
        sent += 1;
        assert!(sent < 40, "decoder did not converge");
    }
    assert_eq!(uint(&decoder, "rank"), 4);
    let decoded = decoder.call("copy_from_symbols", &[]).unwrap();
    assert_eq!(decoded.as_bytes().unwrap(), &data[..]);
    let second = decoder.call("copy_from_symbol", &[Value::from(1usize)]).unwrap();
    assert_eq!(second.as_bytes().unwrap(), &data[160..320]);
}

#[test]
fn recoder_relays_between_encoder_and_decoder() {
    let encoder = build(&MODULE, "FullVectorEncoderFactoryBinary8", 3, 16);
    let recoder = build(&MODULE, "FullVectorRecoderFactoryBinary8", 3, 16);
    let decoder = build(&MODULE, "FullVectorDecoderFactoryBinary8", 3, 16);
    let data: Vec<u8> = (0..48u8).collect();
    encoder.call("set_symbols", &[Value::from(data.clone())]).unwrap();

    for _ in 0..3 {
        let payload = encoder.call("write_payload", &[]).unwrap();
        recoder.call("read_payload", &[payload]).unwrap();
    }
    let mut relayed = 0;
    while !flag(&decoder, "is_complete") {
        let payload = recoder.call("write_payload", &[]).unwrap();
        decoder.call("read_payload", &[payload]).unwrap();
        relayed += 1;
        assert!(relayed < 40, "recoded stream did not converge");
    }
    let decoded = decoder.call("copy_from_symbols", &[]).unwrap();
    assert_eq!(decoded.as_bytes().unwrap(), &data[..]);
}

#[test]
fn uncoded_symbols_are_tracked_per_index() {
    let decoder = build(&MODULE, "OnTheFlyDecoderFactoryBinary8", 4, 4);
    decoder
        .call("read_uncoded_symbol", &[Value::from(vec![9u8; 4]), Value::from(2usize)])
        .unwrap();
    assert_eq!(uint(&decoder, "symbols_uncoded"), 1);
    assert_eq!(uint(&decoder, "symbols_missing"), 3);
    let uncoded = decoder.call("is_symbol_uncoded", &[Value::from(2usize)]).unwrap();
    assert_eq!(uncoded.as_bool(), Some(true));
    let missing = decoder.call("is_symbol_missing", &[Value::from(0usize)]).unwrap();
    assert_eq!(missing.as_bool(), Some(true));
    let pivot = decoder.call("is_symbol_pivot", &[Value::from(2usize)]).unwrap();
    assert_eq!(pivot.as_bool(), Some(true));
}

#[test]
fn strict_policy_rejects_short_symbols() {
    let encoder = build(&MODULE, "FullVectorEncoderFactoryBinary8", 2, 8);
    let err = encoder
        .call("set_symbol", &[Value::from(0usize), Value::from(vec![1u8; 5])])
        .unwrap_err();
    assert!(matches!(err, Error::BufferLength { expected: 8, actual: 5, .. }));
}

#[test]
fn truncate_policy_zero_fills_short_symbols() {
    let module = bindings::assemble(&BindingsConfig {
        families: vec![FamilyId::FullVector],
        fields: vec![FieldTag::Binary8],
        trace: false,
        buffer_policy: BufferPolicy::Truncate,
    })
    .unwrap();
    let encoder = build(&module, "FullVectorEncoderFactoryBinary8", 2, 8);
    let decoder = build(&module, "FullVectorDecoderFactoryBinary8", 2, 8);
    encoder.call("set_symbols", &[Value::from(vec![5u8; 11])]).unwrap();
    while !flag(&decoder, "is_complete") {
        let payload = encoder.call("write_payload", &[]).unwrap();
        decoder.call("read_payload", &[payload]).unwrap();
    }
    let decoded = decoder.call("copy_from_symbols", &[]).unwrap();
    let mut expected = vec![5u8; 11];
    expected.resize(16, 0);
    assert_eq!(decoded.as_bytes().unwrap(), &expected[..]);
}

#[test]
fn handles_share_one_instance() {
    let encoder = build(&MODULE, "NoCodeEncoderFactory", 2, 2);
    assert_eq!(encoder.references(), 1);
    let alias = encoder.clone();
    assert_eq!(encoder.references(), 2);
    alias.call("set_symbol", &[Value::from(1usize), Value::from(vec![4u8, 5])]).unwrap();
    assert_eq!(uint(&encoder, "rank"), 1);
    drop(alias);
    assert_eq!(encoder.references(), 1);
}

#[test]
fn factory_shape_carries_into_built_coders() {
    let factory = MODULE.construct("SlidingWindowDecoderFactoryBinary16", 8, 32).unwrap();
    factory.call("set_symbols", &[Value::from(5usize)]).unwrap();
    factory.call("set_symbol_size", &[Value::from(10usize)]).unwrap();
    assert!(factory.call("set_symbols", &[Value::from(9usize)]).is_err());
    let decoder = factory.build().unwrap();
    assert_eq!(uint(&decoder, "symbols"), 5);
    assert_eq!(uint(&decoder, "block_size"), 50);
    assert!(uint(&decoder, "payload_size") <= uint_factory(&factory));
}

fn uint_factory(factory: &kodo_bindings::bindings::FactoryHandle) -> u64 {
    factory.call("max_payload_size", &[]).unwrap().as_uint().unwrap()
}

#[test]
fn sparse_density_is_adjustable() {
    let encoder = build(&MODULE, "SparseFullVectorEncoderFactoryBinary8", 10, 4);
    encoder.call("set_density", &[Value::from(0.25)]).unwrap();
    let density = encoder.call("density", &[]).unwrap().as_float().unwrap();
    assert!((density - 0.25).abs() < 1e-9);
    encoder
        .call("set_average_nonzero_symbols", &[Value::from(5.0)])
        .unwrap();
    let density = encoder.call("density", &[]).unwrap().as_float().unwrap();
    assert!((density - 0.5).abs() < 1e-9);
    assert!(encoder.call("set_density", &[Value::from(0.0)]).is_err());
}

#[test]
fn perpetual_width_controls() {
    let encoder = build(&MODULE, "PerpetualEncoderFactoryBinary8", 20, 4);
    encoder.call("set_width", &[Value::from(6usize)]).unwrap();
    assert_eq!(uint(&encoder, "width"), 6);
    encoder.call("set_pseudo_systematic", &[Value::from(false)]).unwrap();
    assert!(!flag(&encoder, "pseudo_systematic"));
    assert!(encoder.call("set_width_ratio", &[Value::from(1.5)]).is_err());
}

#[test]
fn overflowing_factory_shapes_are_rejected() {
    let err = MODULE
        .construct("FullVectorEncoderFactoryBinary8", usize::MAX / 2, 4)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
    assert!(MODULE.construct("NoCodeDecoderFactory", 3, usize::MAX).is_err());

    let factory = MODULE.construct("FulcrumEncoderFactoryBinary", 1 << 20, 1 << 20).unwrap();
    assert_eq!(
        factory.call("max_block_size", &[]).unwrap().as_uint(),
        Some(1 << 40)
    );
    assert!(uint_factory(&factory) > 1 << 20);
}

#[test]
fn perpetual_width_saturates_its_header_field() {
    let symbols = 70_000;
    let encoder = build(&MODULE, "PerpetualEncoderFactoryBinary8", symbols, 1);
    assert!(encoder.call("set_width", &[Value::from(65_536usize)]).is_err());
    encoder.call("set_width_ratio", &[Value::from(1.0)]).unwrap();
    assert_eq!(uint(&encoder, "width"), u16::MAX as u64);

    encoder.call("set_symbols", &[Value::from(vec![7u8; symbols])]).unwrap();
    let payload = encoder.call("write_payload", &[]).unwrap().into_bytes().unwrap();
    assert!(payload.len() as u64 <= uint(&encoder, "payload_size"));
    assert_eq!(u16::from_be_bytes([payload[5], payload[6]]), u16::MAX);

    let decoder = build(&MODULE, "PerpetualDecoderFactoryBinary8", symbols, 1);
    decoder.call("read_payload", &[Value::from(payload)]).unwrap();
    assert_eq!(uint(&decoder, "rank"), 1);
}

#[test]
fn first_payload_fits_the_advertised_size() {
    const SYMBOLS: usize = 12;
    const SYMBOL_SIZE: usize = 16;
    let data: Vec<u8> = (0..SYMBOLS * SYMBOL_SIZE).map(|i| (i * 31 + 5) as u8).collect();
    for family in FamilyId::ALL {
        let field = if family.is_coded() { FieldTag::Binary8.name() } else { "" };
        let encoder = build(
            &MODULE,
            &format!("{}EncoderFactory{}", family.stack_name(), field),
            SYMBOLS,
            SYMBOL_SIZE,
        );
        let decoder_stack = match family {
            FamilyId::SparseFullVector => FamilyId::FullVector.stack_name(),
            other => other.stack_name(),
        };
        let decoder = build(
            &MODULE,
            &format!("{}DecoderFactory{}", decoder_stack, field),
            SYMBOLS,
            SYMBOL_SIZE,
        );
        let advertised = uint(&encoder, "payload_size");
        // kind byte plus at least a symbol index
        assert!(advertised >= (SYMBOL_SIZE + 5) as u64, "{}", family);
        assert!(uint(&decoder, "payload_size") >= advertised, "{}", family);

        encoder.call("set_symbols", &[Value::from(data.clone())]).unwrap();
        let mut payloads = vec![encoder.call("write_payload", &[]).unwrap()];
        if encoder.surface().has("set_systematic_off") {
            encoder.call("set_systematic_off", &[]).unwrap();
            payloads.push(encoder.call("write_payload", &[]).unwrap());
        }
        for payload in payloads {
            let len = payload.as_bytes().unwrap().len() as u64;
            assert!(len <= advertised, "{}: {} > {}", family, len, advertised);
            decoder.call("read_payload", &[payload]).unwrap();
        }
    }
}
