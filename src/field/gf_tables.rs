use lazy_static::lazy_static;

// --- GF(2^4) Arithmetic ---

const GF4_ORDER: usize = 16;
const GF4_POLY: u8 = 0x13; // x^4 + x + 1

// --- GF(2^8) Arithmetic ---

const GF8_ORDER: usize = 256;
const GF8_POLY: u16 = 0x11D; // x^8 + x^4 + x^3 + x^2 + 1

// --- GF(2^16) Arithmetic ---

const GF16_POLY: u32 = 0x1100b;

pub(crate) struct Gf8Tables {
    log: [u8; GF8_ORDER],
    exp: [u8; GF8_ORDER * 2],
}

lazy_static! {
    static ref GF8: Gf8Tables = build_gf8_tables();
    static ref GF4_MUL: [[u8; GF4_ORDER]; GF4_ORDER] = build_gf4_table();
}

fn build_gf8_tables() -> Gf8Tables {
    let mut tables = Gf8Tables {
        log: [0; GF8_ORDER],
        exp: [0; GF8_ORDER * 2],
    };
    let mut x: u16 = 1;
    for i in 0..255 {
        tables.exp[i] = x as u8;
        tables.exp[i + 255] = x as u8; // wrap-around
        tables.log[x as usize] = i as u8;
        x <<= 1;
        if x >= 256 {
            x ^= GF8_POLY;
        }
    }
    tables
}

fn gf4_mul_shift(mut a: u8, mut b: u8) -> u8 {
    let mut res = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            res ^= a;
        }
        b >>= 1;
        a <<= 1;
        if a & 0x10 != 0 {
            a ^= GF4_POLY;
        }
    }
    res & 0x0f
}

fn build_gf4_table() -> [[u8; GF4_ORDER]; GF4_ORDER] {
    let mut table = [[0u8; GF4_ORDER]; GF4_ORDER];
    for (a, row) in table.iter_mut().enumerate() {
        for (b, cell) in row.iter_mut().enumerate() {
            *cell = gf4_mul_shift(a as u8, b as u8);
        }
    }
    table
}

/// Forces the lazily built tables so the first coding call does not pay for
/// them.
pub fn init_gf_tables() {
    lazy_static::initialize(&GF8);
    lazy_static::initialize(&GF4_MUL);
}

#[inline(always)]
pub(crate) fn gf4_mul(a: u8, b: u8) -> u8 {
    GF4_MUL[(a & 0x0f) as usize][(b & 0x0f) as usize]
}

pub(crate) fn gf4_inv(a: u8) -> u8 {
    debug_assert!(a & 0x0f != 0, "inverse of 0 in GF(2^4)");
    (1..GF4_ORDER as u8)
        .find(|&b| gf4_mul(a, b) == 1)
        .unwrap_or(0)
}

#[inline(always)]
pub(crate) fn gf8_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let log_a = GF8.log[a as usize] as usize;
    let log_b = GF8.log[b as usize] as usize;
    GF8.exp[log_a + log_b]
}

/// Multiplicative inverse in GF(2^8). Zero maps to zero; callers never
/// invert a zero pivot.
#[inline(always)]
pub(crate) fn gf8_inv(a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    GF8.exp[255 - GF8.log[a as usize] as usize]
}

/// `dst[i] ^= c * src[i]` over a whole symbol.
pub(crate) fn gf8_mul_add_slice(dst: &mut [u8], src: &[u8], c: u8) {
    match c {
        0 => {}
        1 => dst.iter_mut().zip(src).for_each(|(d, s)| *d ^= *s),
        _ => {
            let log_c = GF8.log[c as usize] as usize;
            for (d, &s) in dst.iter_mut().zip(src) {
                if s != 0 {
                    *d ^= GF8.exp[log_c + GF8.log[s as usize] as usize];
                }
            }
        }
    }
}

pub(crate) fn gf8_mul_slice(dst: &mut [u8], c: u8) {
    match c {
        1 => {}
        0 => dst.iter_mut().for_each(|d| *d = 0),
        _ => {
            let log_c = GF8.log[c as usize] as usize;
            for d in dst.iter_mut().filter(|d| **d != 0) {
                *d = GF8.exp[log_c + GF8.log[*d as usize] as usize];
            }
        }
    }
}

#[inline(always)]
pub(crate) fn gf16_mul(a: u16, mut b: u16) -> u16 {
    let mut res: u16 = 0;
    // Widen so the reduction bit is observable after the shift.
    let mut a = a as u32;
    while b != 0 {
        if (b & 1) != 0 {
            res ^= a as u16;
        }
        b >>= 1;
        a <<= 1;
        if (a & 0x10000) != 0 {
            a ^= GF16_POLY;
        }
    }
    res
}

pub(crate) fn gf16_pow(mut x: u16, mut power: u32) -> u16 {
    let mut result: u16 = 1;
    while power > 0 {
        if power & 1 != 0 {
            result = gf16_mul(result, x);
        }
        x = gf16_mul(x, x);
        power >>= 1;
    }
    result
}

pub(crate) fn gf16_inv(x: u16) -> u16 {
    if x == 0 {
        return 0;
    }
    gf16_pow(x, 0x1_0000 - 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gf8_inverse_round_trip() {
        for a in 1..=255u8 {
            assert_eq!(gf8_mul(a, gf8_inv(a)), 1, "a = {a}");
        }
    }

    #[test]
    fn gf4_inverse_round_trip() {
        for a in 1..16u8 {
            assert_eq!(gf4_mul(a, gf4_inv(a)), 1);
        }
    }

    #[test]
    fn gf16_inverse_samples() {
        for a in [1u16, 2, 3, 0x00ff, 0x1234, 0xfffe, 0xffff] {
            assert_eq!(gf16_mul(a, gf16_inv(a)), 1);
        }
    }

    #[test]
    fn gf8_slice_matches_scalar() {
        let src: Vec<u8> = (0..=255).collect();
        let mut dst = vec![0x5au8; 256];
        let expected: Vec<u8> = src.iter().map(|&s| 0x5a ^ gf8_mul(0x1d, s)).collect();
        gf8_mul_add_slice(&mut dst, &src, 0x1d);
        assert_eq!(dst, expected);
    }
}
