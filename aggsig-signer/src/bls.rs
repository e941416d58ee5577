//! BLS12-381 Aggregate Signatures
//!
//! Minimal-pubkey-size BLS over BLS12-381 via the blst library:
//! public keys live in G1, messages and signatures in G2.
//!
//! Features:
//! - Key generation and public key derivation
//! - Hash-to-curve (G2) with a configurable domain separation tag
//! - Signing of an already hashed message point
//! - Order-independent signature and public key aggregation
//! - Pairing check `e(sig, G1) == e(H(m), pk)`
//!
//! The point wrappers expose the uncompressed serialization needed for the
//! EIP-2537 layout (see [`crate::eip2537`]).

use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::{blst_fp12, blst_p1_affine, blst_p2, blst_p2_affine, blst_scalar, BLST_ERROR};
use once_cell::sync::Lazy;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

use crate::eip2537::decode_hex;
use crate::error::{SignerError, SignerResult};

/// Uncompressed G1 size (x || y)
pub const G1_UNCOMPRESSED_SIZE: usize = 96;
/// Uncompressed G2 size (x.c1 || x.c0 || y.c1 || y.c0)
pub const G2_UNCOMPRESSED_SIZE: usize = 192;
/// Compressed G1 size
pub const G1_COMPRESSED_SIZE: usize = 48;
/// Compressed G2 size
pub const G2_COMPRESSED_SIZE: usize = 96;

/// The G1 generator, derived as the public key of scalar one
static G1_GENERATOR: Lazy<PublicKey> = Lazy::new(|| {
    let mut one = [0u8; 32];
    one[31] = 1;
    SecretKey::from_bytes(&one)
        .expect("Scalar one is a valid secret key")
        .sk_to_pk()
});

/// BLS secret key wrapper
#[derive(Clone)]
pub struct BlsSecretKey {
    inner: SecretKey,
}

impl BlsSecretKey {
    /// Generate a new random BLS secret key
    pub fn generate() -> Self {
        let mut ikm = [0u8; 32];
        OsRng.fill_bytes(&mut ikm);
        let sk = SecretKey::key_gen(&ikm, &[]).expect("Key generation failed");
        ikm.zeroize();
        Self { inner: sk }
    }

    /// Derive a key from input keying material (at least 32 bytes)
    pub fn from_ikm(ikm: &[u8]) -> SignerResult<Self> {
        let sk = SecretKey::key_gen(ikm, &[])
            .map_err(|e| SignerError::InvalidSecretKey(format!("KeyGen failed: {:?}", e)))?;
        Ok(Self { inner: sk })
    }

    /// Create from raw big-endian scalar bytes (32 bytes)
    pub fn from_bytes(bytes: &[u8; 32]) -> SignerResult<Self> {
        let sk = SecretKey::from_bytes(bytes)
            .map_err(|e| SignerError::InvalidSecretKey(format!("{:?}", e)))?;
        Ok(Self { inner: sk })
    }

    /// Create from hex string (with or without `0x`)
    pub fn from_hex(hex_str: &str) -> SignerResult<Self> {
        let mut bytes = decode_hex(hex_str)?;
        let array: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SignerError::Decode(format!(
                "Invalid secret key length: expected 32, got {}",
                bytes.len()
            ))
        })?;
        bytes.zeroize();
        let key = Self::from_bytes(&array);
        let mut array = array;
        array.zeroize();
        key
    }

    /// Export to bytes
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> G1Point {
        G1Point(self.inner.sk_to_pk())
    }

    /// Sign an already hashed message point
    pub fn sign(&self, message: &G2Point) -> G2Point {
        let hashed = AggregateSignature::from_signature(&message.0);
        let scalar: &blst_scalar = (&self.inner).into();
        G2Point::from_projective(raw::sign_pk_in_g1((&hashed).into(), scalar))
    }

    /// Hash a message with `dst` and sign it
    pub fn sign_message(&self, message: &[u8], dst: &str) -> G2Point {
        self.sign(&hash_to_curve(message, dst))
    }
}

impl std::fmt::Debug for BlsSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlsSecretKey(<redacted>)")
    }
}

/// A point on G1 (public keys)
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct G1Point(pub(crate) PublicKey);

impl G1Point {
    /// The fixed generator of G1
    pub fn generator() -> Self {
        Self(*G1_GENERATOR)
    }

    /// The point at infinity
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self.0.validate(), Err(BLST_ERROR::BLST_PK_IS_INFINITY))
    }

    /// On-curve points produced by blst still need the subgroup check
    pub fn in_subgroup(&self) -> bool {
        !matches!(self.0.validate(), Err(BLST_ERROR::BLST_POINT_NOT_IN_GROUP))
    }

    /// Uncompressed big-endian serialization (x || y)
    pub fn serialize(&self) -> [u8; G1_UNCOMPRESSED_SIZE] {
        self.0.serialize()
    }

    /// Parse an uncompressed serialization, checking curve and subgroup
    pub fn deserialize(bytes: &[u8]) -> SignerResult<Self> {
        if bytes.len() != G1_UNCOMPRESSED_SIZE {
            return Err(SignerError::Decode(format!(
                "Invalid G1 length: expected {}, got {}",
                G1_UNCOMPRESSED_SIZE,
                bytes.len()
            )));
        }
        Self::checked(PublicKey::deserialize(bytes))
    }

    /// Compressed serialization (48 bytes)
    pub fn to_compressed(&self) -> [u8; G1_COMPRESSED_SIZE] {
        self.0.compress()
    }

    /// Parse a compressed point (48 bytes)
    pub fn from_compressed(bytes: &[u8]) -> SignerResult<Self> {
        if bytes.len() != G1_COMPRESSED_SIZE {
            return Err(SignerError::Decode(format!(
                "Invalid compressed G1 length: expected {}, got {}",
                G1_COMPRESSED_SIZE,
                bytes.len()
            )));
        }
        Self::checked(PublicKey::uncompress(bytes))
    }

    fn checked(parsed: Result<PublicKey, BLST_ERROR>) -> SignerResult<Self> {
        let point = Self(parsed.map_err(|e| map_blst_error(e, "G1"))?);
        if !point.is_infinity() && !point.in_subgroup() {
            return Err(SignerError::InvalidPoint("G1 point not in subgroup".to_string()));
        }
        Ok(point)
    }

    fn affine(&self) -> &blst_p1_affine {
        (&self.0).into()
    }
}

impl std::fmt::Debug for G1Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "G1Point({})", hex::encode(self.to_compressed()))
    }
}

/// A point on G2 (hashed messages and signatures)
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct G2Point(pub(crate) Signature);

impl G2Point {
    /// The point at infinity
    pub fn identity() -> Self {
        Self(Signature::from(blst_p2_affine::default()))
    }

    fn from_projective(point: blst_p2) -> Self {
        Self(AggregateSignature::from(point).to_signature())
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self.0.validate(true), Err(BLST_ERROR::BLST_PK_IS_INFINITY))
    }

    pub fn in_subgroup(&self) -> bool {
        self.0.subgroup_check()
    }

    /// Uncompressed big-endian serialization (x.c1 || x.c0 || y.c1 || y.c0)
    pub fn serialize(&self) -> [u8; G2_UNCOMPRESSED_SIZE] {
        self.0.serialize()
    }

    /// Parse an uncompressed serialization, checking curve and subgroup
    pub fn deserialize(bytes: &[u8]) -> SignerResult<Self> {
        if bytes.len() != G2_UNCOMPRESSED_SIZE {
            return Err(SignerError::Decode(format!(
                "Invalid G2 length: expected {}, got {}",
                G2_UNCOMPRESSED_SIZE,
                bytes.len()
            )));
        }
        Self::checked(Signature::deserialize(bytes))
    }

    /// Compressed serialization (96 bytes)
    pub fn to_compressed(&self) -> [u8; G2_COMPRESSED_SIZE] {
        self.0.compress()
    }

    /// Parse a compressed point (96 bytes)
    pub fn from_compressed(bytes: &[u8]) -> SignerResult<Self> {
        if bytes.len() != G2_COMPRESSED_SIZE {
            return Err(SignerError::Decode(format!(
                "Invalid compressed G2 length: expected {}, got {}",
                G2_COMPRESSED_SIZE,
                bytes.len()
            )));
        }
        Self::checked(Signature::uncompress(bytes))
    }

    fn checked(parsed: Result<Signature, BLST_ERROR>) -> SignerResult<Self> {
        let point = Self(parsed.map_err(|e| map_blst_error(e, "G2"))?);
        if !point.is_infinity() && !point.in_subgroup() {
            return Err(SignerError::InvalidPoint("G2 point not in subgroup".to_string()));
        }
        Ok(point)
    }

    fn affine(&self) -> &blst_p2_affine {
        (&self.0).into()
    }
}

impl Default for G2Point {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Debug for G2Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "G2Point({})", hex::encode(self.to_compressed()))
    }
}

fn map_blst_error(error: BLST_ERROR, group: &str) -> SignerError {
    match error {
        BLST_ERROR::BLST_POINT_NOT_ON_CURVE => {
            SignerError::InvalidPoint(format!("{} point not on curve", group))
        }
        BLST_ERROR::BLST_POINT_NOT_IN_GROUP => {
            SignerError::InvalidPoint(format!("{} point not in subgroup", group))
        }
        other => SignerError::Decode(format!("Malformed {} encoding: {:?}", group, other)),
    }
}

/// The two operations the safe `min_pk` API does not expose: hashing to a
/// raw G2 point and signing a point that is already hashed.
mod raw {
    use blst::{blst_hash_to_g2, blst_p2, blst_scalar, blst_sign_pk_in_g1};

    pub(super) fn hash_to_g2(message: &[u8], dst: &[u8]) -> blst_p2 {
        let mut out = blst_p2::default();
        // SAFETY: slices are valid for their lengths, no augmentation.
        unsafe {
            blst_hash_to_g2(
                &mut out,
                message.as_ptr(),
                message.len(),
                dst.as_ptr(),
                dst.len(),
                std::ptr::null(),
                0,
            );
        }
        out
    }

    pub(super) fn sign_pk_in_g1(point: &blst_p2, scalar: &blst_scalar) -> blst_p2 {
        let mut out = blst_p2::default();
        // SAFETY: all pointers reference live values.
        unsafe { blst_sign_pk_in_g1(&mut out, point, scalar) };
        out
    }
}

/// Derive the public key for a raw 32-byte secret key
pub fn get_public_key(private_key: &[u8; 32]) -> SignerResult<G1Point> {
    Ok(BlsSecretKey::from_bytes(private_key)?.public_key())
}

/// Hash a message to G2 (hash_to_curve, XMD:SHA-256, SSWU, random oracle)
pub fn hash_to_curve(message: &[u8], dst: &str) -> G2Point {
    G2Point::from_projective(raw::hash_to_g2(message, dst.as_bytes()))
}

/// Sign a hashed message point
pub fn sign(message: &G2Point, secret_key: &BlsSecretKey) -> G2Point {
    secret_key.sign(message)
}

/// Aggregate signatures by point addition
pub fn aggregate_signatures(signatures: &[G2Point]) -> SignerResult<G2Point> {
    if signatures.is_empty() {
        return Err(SignerError::InsufficientInput(
            "at least one signature is required".to_string(),
        ));
    }
    let refs: Vec<&Signature> = signatures.iter().map(|s| &s.0).collect();
    let aggregate = AggregateSignature::aggregate(&refs, false)
        .map_err(|e| SignerError::InsufficientInput(format!("{:?}", e)))?;
    Ok(G2Point(aggregate.to_signature()))
}

/// Aggregate public keys by point addition
pub fn aggregate_public_keys(public_keys: &[G1Point]) -> SignerResult<G1Point> {
    if public_keys.is_empty() {
        return Err(SignerError::InsufficientInput(
            "at least one public key is required".to_string(),
        ));
    }
    let refs: Vec<&PublicKey> = public_keys.iter().map(|pk| &pk.0).collect();
    let aggregate = AggregatePublicKey::aggregate(&refs, false)
        .map_err(|e| SignerError::InsufficientInput(format!("{:?}", e)))?;
    Ok(G1Point(aggregate.to_public_key()))
}

/// Pairing check `e(signature, G1) == e(message, public_key)`.
///
/// Identity points never verify.
pub fn verify(signature: &G2Point, message: &G2Point, public_key: &G1Point) -> bool {
    if signature.is_infinity() || message.is_infinity() || public_key.is_infinity() {
        return false;
    }
    if !signature.in_subgroup() || !message.in_subgroup() || !public_key.in_subgroup() {
        return false;
    }

    let generator = G1Point::generator();
    let lhs = blst_fp12::miller_loop(signature.affine(), generator.affine());
    let rhs = blst_fp12::miller_loop(message.affine(), public_key.affine());
    blst_fp12::finalverify(&lhs, &rhs)
}
