//! Wire framing of one encoded unit.
//!
//! ```text
//! +------+------------------------------+-------------+
//! | kind | u32 index | coefficients     | symbol data |
//! +------+------------------------------+-------------+
//! ```
//! `kind` is [`SYSTEMATIC`] (big-endian index follows) or [`CODED`]
//! (packed coefficient vector follows).

use crate::error::{Error, Result};

pub(crate) const CODED: u8 = 0x00;
pub(crate) const SYSTEMATIC: u8 = 0x01;
pub(crate) const INDEX_SIZE: usize = 4;

/// Largest header for a coefficient vector of `coefficient_size` bytes.
pub(crate) fn header_size(coefficient_size: usize) -> usize {
    1 + coefficient_size.max(INDEX_SIZE)
}

pub(crate) enum Unit<'a> {
    Systematic { index: usize, symbol: &'a [u8] },
    Coded { coefficients: &'a [u8], symbol: &'a [u8] },
}

fn ensure_room(out: &[u8], needed: usize) -> Result<()> {
    if out.len() < needed {
        return Err(Error::InvalidParameter(format!(
            "payload buffer holds {} bytes, {} needed",
            out.len(),
            needed
        )));
    }
    Ok(())
}

/// Big-endian wire form of a symbol index.
pub(crate) fn index_bytes(index: usize) -> Result<[u8; INDEX_SIZE]> {
    u32::try_from(index)
        .map(u32::to_be_bytes)
        .map_err(|_| Error::InvalidParameter(format!("symbol index {} does not fit in u32", index)))
}

pub(crate) fn write_systematic(out: &mut [u8], index: usize, symbol: &[u8]) -> Result<usize> {
    let len = 1 + INDEX_SIZE + symbol.len();
    ensure_room(out, len)?;
    let index = index_bytes(index)?;
    out[0] = SYSTEMATIC;
    out[1..1 + INDEX_SIZE].copy_from_slice(&index);
    out[1 + INDEX_SIZE..len].copy_from_slice(symbol);
    Ok(len)
}

pub(crate) fn write_coded(out: &mut [u8], coefficients: &[u8], symbol: &[u8]) -> Result<usize> {
    let len = 1 + coefficients.len() + symbol.len();
    ensure_room(out, len)?;
    out[0] = CODED;
    out[1..1 + coefficients.len()].copy_from_slice(coefficients);
    out[1 + coefficients.len()..len].copy_from_slice(symbol);
    Ok(len)
}

pub(crate) fn read_index(buf: &[u8]) -> Result<usize> {
    if buf.len() < INDEX_SIZE {
        return Err(Error::InvalidPayload("truncated symbol index".into()));
    }
    let mut raw = [0u8; INDEX_SIZE];
    raw.copy_from_slice(&buf[..INDEX_SIZE]);
    Ok(u32::from_be_bytes(raw) as usize)
}

/// Parses a unit whose coded header is a packed vector of
/// `coefficient_size` bytes.
pub(crate) fn read(payload: &[u8], coefficient_size: usize, symbol_size: usize) -> Result<Unit<'_>> {
    let (&kind, rest) = payload
        .split_first()
        .ok_or_else(|| Error::InvalidPayload("empty payload".into()))?;
    let header = match kind {
        SYSTEMATIC => INDEX_SIZE,
        CODED => coefficient_size,
        other => return Err(Error::InvalidPayload(format!("unknown kind 0x{:02x}", other))),
    };
    if rest.len() < header + symbol_size {
        return Err(Error::InvalidPayload(format!(
            "payload holds {} bytes, {} needed",
            payload.len(),
            1 + header + symbol_size
        )));
    }
    let symbol = &rest[header..header + symbol_size];
    Ok(match kind {
        SYSTEMATIC => Unit::Systematic {
            index: read_index(rest)?,
            symbol,
        },
        _ => Unit::Coded {
            coefficients: &rest[..header],
            symbol,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn systematic_unit_reports_written_length() {
        let mut buf = [0u8; 32];
        let len = write_systematic(&mut buf, 7, &[0xaa, 0xbb]).unwrap();
        assert_eq!(len, 7);
        match read(&buf[..len], 3, 2).unwrap() {
            Unit::Systematic { index, symbol } => {
                assert_eq!(index, 7);
                assert_eq!(symbol, &[0xaa, 0xbb]);
            }
            Unit::Coded { .. } => panic!("expected systematic unit"),
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn index_beyond_u32_is_rejected() {
        let mut buf = [0xeeu8; 8];
        let index = u32::MAX as usize + 1;
        assert!(matches!(
            write_systematic(&mut buf, index, &[1]),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(buf, [0xee; 8]);
        assert_eq!(index_bytes(u32::MAX as usize).unwrap(), [0xff; 4]);
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut buf = [0u8; 16];
        let len = write_coded(&mut buf, &[1, 2, 3], &[9, 9]).unwrap();
        assert!(read(&buf[..len - 1], 3, 2).is_err());
        assert!(read(&[0x7f, 0, 0, 0, 0, 0], 3, 2).is_err());
    }
}
