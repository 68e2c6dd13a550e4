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

//! # Finite Field Resolver and Arithmetic
//!
//! Every coder engine is generic over a [`Field`]. The field decides how
//! coefficient vectors are packed on the wire and how symbol bytes are
//! combined. [`FieldTag`] is the closed set of arithmetic markers known to
//! the binding generator, each with exactly one display name.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gf_tables;
pub use gf_tables::init_gf_tables;
use gf_tables::{gf16_inv, gf16_mul, gf4_inv, gf4_mul, gf8_inv, gf8_mul, gf8_mul_add_slice, gf8_mul_slice};

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTag {
    Binary,
    Binary4,
    Binary8,
    Binary16,
    Prime2325,
    /// Passthrough coders that never combine symbols.
    NoField,
}

impl FieldTag {
    /// The coded fields enumerated for every coding family.
    pub const CODED: [FieldTag; 4] = [
        FieldTag::Binary,
        FieldTag::Binary4,
        FieldTag::Binary8,
        FieldTag::Binary16,
    ];

    /// Display name used in registration names.
    pub fn name(self) -> &'static str {
        match self {
            FieldTag::Binary => "Binary",
            FieldTag::Binary4 => "Binary4",
            FieldTag::Binary8 => "Binary8",
            FieldTag::Binary16 => "Binary16",
            FieldTag::Prime2325 => "Prime2325",
            FieldTag::NoField => "",
        }
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldTag::NoField => f.write_str("nofield"),
            other => f.write_str(&other.name().to_lowercase()),
        }
    }
}

impl std::str::FromStr for FieldTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binary" | "gf2" => Ok(FieldTag::Binary),
            "binary4" | "gf16" => Ok(FieldTag::Binary4),
            "binary8" | "gf256" => Ok(FieldTag::Binary8),
            "binary16" | "gf65536" => Ok(FieldTag::Binary16),
            "prime2325" => Ok(FieldTag::Prime2325),
            "" | "nofield" | "no_field" => Ok(FieldTag::NoField),
            _ => Err(Error::UnknownField(s.to_string())),
        }
    }
}

/// Finite field arithmetic plus the byte layout of its elements.
///
/// Elements are packed little-end first inside a byte for sub-byte fields
/// and big-endian for `Binary16`. Symbol data uses the same layout, so a
/// symbol of `n` bytes holds `n * 8 / BITS` elements.
pub trait Field: Send + Sync + 'static {
    type Elem: Copy + Eq + Default + fmt::Debug + fmt::LowerHex + Send + Sync + 'static;

    const TAG: FieldTag;
    const BITS: usize;

    fn one() -> Self::Elem;
    fn add(a: Self::Elem, b: Self::Elem) -> Self::Elem;
    fn mul(a: Self::Elem, b: Self::Elem) -> Self::Elem;
    fn inv(a: Self::Elem) -> Self::Elem;
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self::Elem;

    fn zero() -> Self::Elem {
        Self::Elem::default()
    }

    fn is_zero(a: Self::Elem) -> bool {
        a == Self::zero()
    }

    /// Characteristic two: subtraction is addition.
    fn sub(a: Self::Elem, b: Self::Elem) -> Self::Elem {
        Self::add(a, b)
    }

    fn random_nonzero<R: Rng + ?Sized>(rng: &mut R) -> Self::Elem {
        loop {
            let v = Self::random(rng);
            if !Self::is_zero(v) {
                return v;
            }
        }
    }

    /// Bytes needed to pack `elements` values.
    fn vector_size(elements: usize) -> usize {
        elements / 8 * Self::BITS + (elements % 8 * Self::BITS + 7) / 8
    }

    /// Whether a symbol of `bytes` bytes is a whole number of elements.
    fn symbol_size_ok(bytes: usize) -> bool {
        bytes > 0 && bytes % ((Self::BITS + 7) / 8) == 0
    }

    fn get(buf: &[u8], index: usize) -> Self::Elem;
    fn set(buf: &mut [u8], index: usize, value: Self::Elem);

    /// `dst += c * src`, element-wise over whole symbols.
    fn multiply_add(dst: &mut [u8], src: &[u8], c: Self::Elem) {
        if Self::is_zero(c) {
            return;
        }
        let elements = dst.len().min(src.len()) * 8 / Self::BITS;
        for i in 0..elements {
            let v = Self::add(Self::get(dst, i), Self::mul(c, Self::get(src, i)));
            Self::set(dst, i, v);
        }
    }

    /// `dst *= c`, element-wise.
    fn multiply(dst: &mut [u8], c: Self::Elem) {
        if c == Self::one() {
            return;
        }
        let elements = dst.len() * 8 / Self::BITS;
        for i in 0..elements {
            let v = Self::mul(c, Self::get(dst, i));
            Self::set(dst, i, v);
        }
    }

    /// Unpacks a wire coefficient vector of `symbols` entries.
    fn unpack(buf: &[u8], symbols: usize) -> Vec<Self::Elem> {
        (0..symbols).map(|i| Self::get(buf, i)).collect()
    }

    fn pack(coefficients: &[Self::Elem], out: &mut [u8]) {
        let size = Self::vector_size(coefficients.len());
        out[..size].iter_mut().for_each(|b| *b = 0);
        for (i, &c) in coefficients.iter().enumerate() {
            Self::set(out, i, c);
        }
    }
}

/// GF(2).
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary;

/// GF(2^4).
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary4;

/// GF(2^8).
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary8;

/// GF(2^16).
#[derive(Debug, Clone, Copy, Default)]
pub struct Binary16;

impl Field for Binary {
    type Elem = u8;
    const TAG: FieldTag = FieldTag::Binary;
    const BITS: usize = 1;

    fn one() -> u8 {
        1
    }
    fn add(a: u8, b: u8) -> u8 {
        (a ^ b) & 1
    }
    fn mul(a: u8, b: u8) -> u8 {
        a & b & 1
    }
    fn inv(a: u8) -> u8 {
        a & 1
    }
    fn random<R: Rng + ?Sized>(rng: &mut R) -> u8 {
        rng.gen::<bool>() as u8
    }
    fn get(buf: &[u8], index: usize) -> u8 {
        (buf[index / 8] >> (index % 8)) & 1
    }
    fn set(buf: &mut [u8], index: usize, value: u8) {
        let mask = 1 << (index % 8);
        if value & 1 != 0 {
            buf[index / 8] |= mask;
        } else {
            buf[index / 8] &= !mask;
        }
    }
    fn multiply_add(dst: &mut [u8], src: &[u8], c: u8) {
        if c & 1 != 0 {
            dst.iter_mut().zip(src).for_each(|(d, s)| *d ^= *s);
        }
    }
    fn multiply(dst: &mut [u8], c: u8) {
        if c & 1 == 0 {
            dst.iter_mut().for_each(|d| *d = 0);
        }
    }
}

impl Field for Binary4 {
    type Elem = u8;
    const TAG: FieldTag = FieldTag::Binary4;
    const BITS: usize = 4;

    fn one() -> u8 {
        1
    }
    fn add(a: u8, b: u8) -> u8 {
        (a ^ b) & 0x0f
    }
    fn mul(a: u8, b: u8) -> u8 {
        gf4_mul(a, b)
    }
    fn inv(a: u8) -> u8 {
        gf4_inv(a)
    }
    fn random<R: Rng + ?Sized>(rng: &mut R) -> u8 {
        rng.gen::<u8>() & 0x0f
    }
    fn get(buf: &[u8], index: usize) -> u8 {
        let byte = buf[index / 2];
        if index % 2 == 0 {
            byte & 0x0f
        } else {
            byte >> 4
        }
    }
    fn set(buf: &mut [u8], index: usize, value: u8) {
        let byte = &mut buf[index / 2];
        if index % 2 == 0 {
            *byte = (*byte & 0xf0) | (value & 0x0f);
        } else {
            *byte = (*byte & 0x0f) | (value << 4);
        }
    }
    fn multiply_add(dst: &mut [u8], src: &[u8], c: u8) {
        let c = c & 0x0f;
        if c == 0 {
            return;
        }
        for (d, &s) in dst.iter_mut().zip(src) {
            let lo = gf4_mul(c, s & 0x0f);
            let hi = gf4_mul(c, s >> 4);
            *d ^= lo | (hi << 4);
        }
    }
}

impl Field for Binary8 {
    type Elem = u8;
    const TAG: FieldTag = FieldTag::Binary8;
    const BITS: usize = 8;

    fn one() -> u8 {
        1
    }
    fn add(a: u8, b: u8) -> u8 {
        a ^ b
    }
    fn mul(a: u8, b: u8) -> u8 {
        gf8_mul(a, b)
    }
    fn inv(a: u8) -> u8 {
        gf8_inv(a)
    }
    fn random<R: Rng + ?Sized>(rng: &mut R) -> u8 {
        rng.gen()
    }
    fn get(buf: &[u8], index: usize) -> u8 {
        buf[index]
    }
    fn set(buf: &mut [u8], index: usize, value: u8) {
        buf[index] = value;
    }
    fn multiply_add(dst: &mut [u8], src: &[u8], c: u8) {
        gf8_mul_add_slice(dst, src, c);
    }
    fn multiply(dst: &mut [u8], c: u8) {
        gf8_mul_slice(dst, c);
    }
}

impl Field for Binary16 {
    type Elem = u16;
    const TAG: FieldTag = FieldTag::Binary16;
    const BITS: usize = 16;

    fn one() -> u16 {
        1
    }
    fn add(a: u16, b: u16) -> u16 {
        a ^ b
    }
    fn mul(a: u16, b: u16) -> u16 {
        gf16_mul(a, b)
    }
    fn inv(a: u16) -> u16 {
        gf16_inv(a)
    }
    fn random<R: Rng + ?Sized>(rng: &mut R) -> u16 {
        rng.gen()
    }
    fn get(buf: &[u8], index: usize) -> u16 {
        u16::from_be_bytes([buf[2 * index], buf[2 * index + 1]])
    }
    fn set(buf: &mut [u8], index: usize, value: u16) {
        buf[2 * index..2 * index + 2].copy_from_slice(&value.to_be_bytes());
    }
}
