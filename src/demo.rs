//! Encoder to decoder transfer over a lossy channel, driven entirely
//! through registered surfaces.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bindings::naming::{self, Role};
use crate::bindings::{CoderHandle, FamilyId, Module, Value};
use crate::error::{Error, Result};
use crate::field::FieldTag;

#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub symbols: usize,
    pub symbol_size: usize,
    /// Probability that a payload is dropped.
    pub loss: f64,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            symbols: 16,
            symbol_size: 160,
            loss: 0.1,
            seed: 42,
        }
    }
}

impl DemoConfig {
    /// Parses the `[demo]` table; missing keys keep their defaults.
    pub fn from_toml(s: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Root {
            demo: Option<Section>,
        }

        #[derive(Deserialize)]
        struct Section {
            symbols: Option<usize>,
            symbol_size: Option<usize>,
            loss: Option<f64>,
            seed: Option<u64>,
        }

        let raw: Root = toml::from_str(s)?;
        let defaults = DemoConfig::default();
        Ok(match raw.demo {
            Some(d) => DemoConfig {
                symbols: d.symbols.unwrap_or(defaults.symbols),
                symbol_size: d.symbol_size.unwrap_or(defaults.symbol_size),
                loss: d.loss.unwrap_or(defaults.loss),
                seed: d.seed.unwrap_or(defaults.seed),
            },
            None => defaults,
        })
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.symbols == 0 {
            return Err("demo.symbols must be positive".into());
        }
        if self.symbol_size == 0 {
            return Err("demo.symbol_size must be positive".into());
        }
        if !(0.0..1.0).contains(&self.loss) {
            return Err(format!("demo.loss {} outside [0, 1)", self.loss));
        }
        Ok(())
    }
}

/// Outcome of one transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub encoder: String,
    pub decoder: String,
    pub sent: usize,
    pub lost: usize,
    pub feedback: usize,
    pub rank: u64,
    pub complete: bool,
    /// Decoded block equals the source block.
    pub verified: bool,
}

fn uint(value: Value, op: &str) -> Result<u64> {
    value
        .as_uint()
        .ok_or_else(|| Error::InvalidParameter(format!("{} returned no integer", op)))
}

fn bytes(value: Value, op: &str) -> Result<Vec<u8>> {
    value
        .into_bytes()
        .ok_or_else(|| Error::InvalidParameter(format!("{} returned no bytes", op)))
}

fn is_complete(decoder: &CoderHandle) -> Result<bool> {
    decoder
        .call("is_complete", &[])?
        .as_bool()
        .ok_or_else(|| Error::InvalidParameter("is_complete returned no bool".into()))
}

/// Runs one transfer through the non-trace surfaces of `family`.
///
/// Sliding window pairs exchange feedback every few payloads. Gives up
/// after a bounded number of payloads and reports `complete == false`.
pub fn transfer(module: &Module, family: FamilyId, field: FieldTag, cfg: &DemoConfig) -> Result<TransferReport> {
    cfg.validate().map_err(Error::Config)?;
    let field = if family.is_coded() { field } else { FieldTag::NoField };
    let stack = family.stack_name();
    // Sparse encoders pair with the plain full vector decoder.
    let decoding_stack = match family {
        FamilyId::SparseFullVector => FamilyId::FullVector.stack_name(),
        _ => stack,
    };
    let encoder_factory = naming::resolve(stack, Role::EncoderFactory, field, false);
    let decoder_factory = naming::resolve(decoding_stack, Role::DecoderFactory, field, false);

    let encoder = module
        .construct(&encoder_factory, cfg.symbols, cfg.symbol_size)?
        .build()?;
    let decoder = module
        .construct(&decoder_factory, cfg.symbols, cfg.symbol_size)?
        .build()?;

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let block_size = uint(encoder.call("block_size", &[])?, "block_size")? as usize;
    let data: Vec<u8> = (0..block_size).map(|_| rng.gen()).collect();
    encoder.call("set_symbols", &[Value::from(data.clone())])?;

    let feedback = encoder.surface().has("read_feedback") && decoder.surface().has("write_feedback");
    let feedback_every = (cfg.symbols / 4).max(1);
    let limit = cfg.symbols * 20 + 100;
    let mut report = TransferReport {
        encoder: encoder.name().to_string(),
        decoder: decoder.name().to_string(),
        sent: 0,
        lost: 0,
        feedback: 0,
        rank: 0,
        complete: false,
        verified: false,
    };

    while report.sent < limit && !is_complete(&decoder)? {
        let payload = encoder.call("write_payload", &[])?;
        report.sent += 1;
        if rng.gen_bool(cfg.loss) {
            report.lost += 1;
        } else {
            decoder.call("read_payload", &[payload])?;
        }
        if feedback && report.sent % feedback_every == 0 {
            let state = decoder.call("write_feedback", &[])?;
            encoder.call("read_feedback", &[state])?;
            report.feedback += 1;
        }
    }

    report.complete = is_complete(&decoder)?;
    if decoder.surface().has("rank") {
        report.rank = uint(decoder.call("rank", &[])?, "rank")?;
    }
    if report.complete {
        let decoded = bytes(decoder.call("copy_from_symbols", &[])?, "copy_from_symbols")?;
        report.verified = decoded == data;
    }
    debug!(
        "{} -> {}: sent {} lost {} feedback {}",
        report.encoder, report.decoder, report.sent, report.lost, report.feedback
    );
    if !report.complete {
        info!("{} gave up after {} payloads", report.decoder, report.sent);
    }
    Ok(report)
}
