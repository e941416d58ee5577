//! EIP-2537 Point Encoding
//!
//! Byte layout expected by the BLS12-381 precompiles. Every base field
//! element takes 64 bytes: 16 zero bytes followed by the 48-byte
//! big-endian value.
//!
//! - G1: `x || y` (128 bytes)
//! - G2: `x.c0 || x.c1 || y.c0 || y.c1` (256 bytes)
//!
//! The point at infinity is encoded as all zeros. Note that blst serializes
//! Fp2 elements as `c1 || c0`, so G2 coordinates are swapped on the way in
//! and out.

use aggsig_core::{
    EIP2537_FIELD_PADDING, EIP2537_FIELD_SIZE, EIP2537_G1_SIZE, EIP2537_G2_SIZE,
};

use crate::bls::{G1Point, G2Point, G1_UNCOMPRESSED_SIZE, G2_UNCOMPRESSED_SIZE};
use crate::error::{SignerError, SignerResult};

/// Size of a base field element
const FP_SIZE: usize = 48;

/// Encode a G1 point (128 bytes)
pub fn encode_g1(point: &G1Point) -> [u8; EIP2537_G1_SIZE] {
    let mut out = [0u8; EIP2537_G1_SIZE];
    if point.is_infinity() {
        return out;
    }
    let raw = point.serialize();
    write_field(&mut out, 0, &raw[0..FP_SIZE]);
    write_field(&mut out, 1, &raw[FP_SIZE..2 * FP_SIZE]);
    out
}

/// Encode a G2 point (256 bytes)
pub fn encode_g2(point: &G2Point) -> [u8; EIP2537_G2_SIZE] {
    let mut out = [0u8; EIP2537_G2_SIZE];
    if point.is_infinity() {
        return out;
    }
    let raw = point.serialize();
    // raw: x.c1 || x.c0 || y.c1 || y.c0
    write_field(&mut out, 0, &raw[FP_SIZE..2 * FP_SIZE]);
    write_field(&mut out, 1, &raw[0..FP_SIZE]);
    write_field(&mut out, 2, &raw[3 * FP_SIZE..4 * FP_SIZE]);
    write_field(&mut out, 3, &raw[2 * FP_SIZE..3 * FP_SIZE]);
    out
}

/// Decode a G1 point, checking padding, curve membership and subgroup
pub fn decode_g1(bytes: &[u8]) -> SignerResult<G1Point> {
    if bytes.len() != EIP2537_G1_SIZE {
        return Err(SignerError::Decode(format!(
            "Invalid EIP-2537 G1 length: expected {}, got {}",
            EIP2537_G1_SIZE,
            bytes.len()
        )));
    }
    if bytes.iter().all(|b| *b == 0) {
        return Ok(G1Point::identity());
    }

    let mut raw = [0u8; G1_UNCOMPRESSED_SIZE];
    raw[0..FP_SIZE].copy_from_slice(read_field(bytes, 0)?);
    raw[FP_SIZE..2 * FP_SIZE].copy_from_slice(read_field(bytes, 1)?);
    check_flag_bits(&raw)?;
    G1Point::deserialize(&raw)
}

/// Decode a G2 point, checking padding, curve membership and subgroup
pub fn decode_g2(bytes: &[u8]) -> SignerResult<G2Point> {
    if bytes.len() != EIP2537_G2_SIZE {
        return Err(SignerError::Decode(format!(
            "Invalid EIP-2537 G2 length: expected {}, got {}",
            EIP2537_G2_SIZE,
            bytes.len()
        )));
    }
    if bytes.iter().all(|b| *b == 0) {
        return Ok(G2Point::identity());
    }

    let mut raw = [0u8; G2_UNCOMPRESSED_SIZE];
    raw[0..FP_SIZE].copy_from_slice(read_field(bytes, 1)?);
    raw[FP_SIZE..2 * FP_SIZE].copy_from_slice(read_field(bytes, 0)?);
    raw[2 * FP_SIZE..3 * FP_SIZE].copy_from_slice(read_field(bytes, 3)?);
    raw[3 * FP_SIZE..4 * FP_SIZE].copy_from_slice(read_field(bytes, 2)?);
    check_flag_bits(&raw)?;
    G2Point::deserialize(&raw)
}

/// Encode a G1 point as `0x`-prefixed hex
pub fn encode_g1_hex(point: &G1Point) -> String {
    to_hex(&encode_g1(point))
}

/// Encode a G2 point as `0x`-prefixed hex
pub fn encode_g2_hex(point: &G2Point) -> String {
    to_hex(&encode_g2(point))
}

/// Decode a hex G1 point (with or without `0x`)
pub fn decode_g1_hex(hex_str: &str) -> SignerResult<G1Point> {
    decode_g1(&decode_hex(hex_str)?)
}

/// Decode a hex G2 point (with or without `0x`)
pub fn decode_g2_hex(hex_str: &str) -> SignerResult<G2Point> {
    decode_g2(&decode_hex(hex_str)?)
}

/// Lowercase hex with `0x` prefix
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse hex with or without `0x` prefix
pub fn decode_hex(hex_str: &str) -> SignerResult<Vec<u8>> {
    let trimmed = hex_str.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(stripped).map_err(|e| SignerError::Decode(format!("Invalid hex: {}", e)))
}

fn write_field(out: &mut [u8], index: usize, value: &[u8]) {
    let start = index * EIP2537_FIELD_SIZE + EIP2537_FIELD_PADDING;
    out[start..start + FP_SIZE].copy_from_slice(value);
}

fn read_field(bytes: &[u8], index: usize) -> SignerResult<&[u8]> {
    let start = index * EIP2537_FIELD_SIZE;
    let padding = &bytes[start..start + EIP2537_FIELD_PADDING];
    if padding.iter().any(|b| *b != 0) {
        return Err(SignerError::Decode(format!(
            "Non-zero padding in field element {}",
            index
        )));
    }
    Ok(&bytes[start + EIP2537_FIELD_PADDING..start + EIP2537_FIELD_SIZE])
}

// Field elements are < p < 2^381, so the top three bits of the first byte
// must be clear. blst would otherwise read them as compression flags.
fn check_flag_bits(raw: &[u8]) -> SignerResult<()> {
    if raw[0] & 0xe0 != 0 {
        return Err(SignerError::Decode(
            "Field element exceeds the base field modulus".to_string(),
        ));
    }
    Ok(())
}

impl G1Point {
    pub fn to_eip2537(&self) -> [u8; EIP2537_G1_SIZE] {
        encode_g1(self)
    }

    pub fn from_eip2537(bytes: &[u8]) -> SignerResult<Self> {
        decode_g1(bytes)
    }
}

impl G2Point {
    pub fn to_eip2537(&self) -> [u8; EIP2537_G2_SIZE] {
        encode_g2(self)
    }

    pub fn from_eip2537(bytes: &[u8]) -> SignerResult<Self> {
        decode_g2(bytes)
    }
}
