//! Cryptographic primitives used by the protocol
//!
//! Everything here is pure except [`CryptoProvider`], which owns the random
//! number generator used for challenges and ephemeral keys.

use std::fmt;

use cipher::{
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
    block_padding::{NoPadding, Pkcs7},
};
use k256::{
    PublicKey, SecretKey,
    ecdsa::{
        Signature, SigningKey, VerifyingKey,
        signature::{Signer, Verifier},
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use pbkdf2::pbkdf2_hmac;
use rand_v8::{RngCore, SeedableRng, rngs::StdRng};
use sha2::{Digest, Sha256};
use tracing::warn;
use zeroize::Zeroizing;

use crate::constants::{CHALLENGE_LEN, PBKDF2_ITERATIONS};
use crate::{Error, Result};

type Encryptor = cbc::Encryptor<aes::Aes256>;
type Decryptor = cbc::Decryptor<aes::Aes256>;

/// Fixed-size signature: `r ‖ s`, 32 bytes each
pub type FixedSignature = [u8; 64];

/// Host challenge sent with VerifyCard, CheckWallet, VerifyCode and OpenSession
pub type Challenge = [u8; CHALLENGE_LEN];

/// Source of randomness for challenges and ephemeral keys
///
/// Passed to the engine explicitly; tests seed it for reproducible runs.
pub struct CryptoProvider {
    rng: StdRng,
}

impl fmt::Debug for CryptoProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoProvider").finish_non_exhaustive()
    }
}

impl Default for CryptoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider {
    /// Provider seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic provider
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fill a fresh challenge
    pub fn challenge(&mut self) -> Challenge {
        let mut challenge = [0u8; CHALLENGE_LEN];
        self.rng.fill_bytes(&mut challenge);
        challenge
    }

    /// Random bytes of the given length
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.fill_bytes(&mut bytes);
        bytes
    }

    /// Ephemeral secp256k1 secret key
    pub fn ephemeral_key(&mut self) -> SecretKey {
        SecretKey::random(&mut self.rng)
    }
}

/// SHA-256 of `data`
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 over the concatenation of `parts`
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Hash of a PIN as sent in the Pin/Pin2/NewPin TLVs
pub fn pin_hash(pin: &str) -> [u8; 32] {
    sha256(pin.as_bytes())
}

/// Derive the protocol key from PIN1 and the physical token id
///
/// PBKDF2-HMAC-SHA256 over SHA-256(PIN) with the token id as salt.
pub fn protocol_key(pin: &str, token_id: &[u8]) -> Zeroizing<[u8; 32]> {
    let hashed = Zeroizing::new(pin_hash(pin));
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2_hmac::<Sha256>(&hashed[..], token_id, PBKDF2_ITERATIONS, &mut key[..]);
    key
}

/// Encrypt with AES-256-CBC, zero IV, PKCS#7 padding
pub fn encrypt(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>> {
    let encryptor = Encryptor::new_from_slices(key, &[0u8; 16])
        .map_err(|_| Error::Cipher("invalid key length"))?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(data))
}

/// Decrypt with AES-256-CBC, zero IV
///
/// Tries PKCS#7 first and falls back to unpadded decryption.
pub fn decrypt(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>> {
    let decryptor = || {
        Decryptor::new_from_slices(key, &[0u8; 16]).map_err(|_| Error::Cipher("invalid key length"))
    };
    match decryptor()?.decrypt_padded_vec_mut::<Pkcs7>(data) {
        Ok(plain) => Ok(plain),
        Err(_) => {
            warn!(len = data.len(), "PKCS#7 unpad failed, decrypting without padding");
            decryptor()?
                .decrypt_padded_vec_mut::<NoPadding>(data)
                .map_err(|_| Error::Cipher("ciphertext is not block aligned"))
        }
    }
}

/// Normalize one DER integer to a 32-byte big-endian component
fn der_component(bytes: &[u8]) -> Result<[u8; 32]> {
    let digits = match bytes.len() {
        1..=32 => bytes,
        33 if bytes[0] == 0x00 => &bytes[1..],
        _ => return Err(Error::InvalidData("signature component length")),
    };
    let mut out = [0u8; 32];
    out[32 - digits.len()..].copy_from_slice(digits);
    Ok(out)
}

/// Convert a DER-encoded ECDSA signature into `r ‖ s`
pub fn der_to_fixed(der: &[u8]) -> Result<FixedSignature> {
    const MALFORMED: Error = Error::InvalidData("malformed DER signature");

    let body = match der {
        [0x30, len, body @ ..] if *len as usize == body.len() => body,
        _ => return Err(MALFORMED),
    };

    let (r, rest) = match body {
        [0x02, len, rest @ ..] if rest.len() >= *len as usize => rest.split_at(*len as usize),
        _ => return Err(MALFORMED),
    };
    let s = match rest {
        [0x02, len, s @ ..] if s.len() == *len as usize => s,
        _ => return Err(MALFORMED),
    };

    let mut fixed = [0u8; 64];
    fixed[..32].copy_from_slice(&der_component(r)?);
    fixed[32..].copy_from_slice(&der_component(s)?);
    Ok(fixed)
}

fn der_integer(out: &mut Vec<u8>, component: &[u8]) {
    let first = component
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(component.len() - 1);
    let digits = &component[first..];
    let pad = digits[0] & 0x80 != 0;
    out.push(0x02);
    out.push((digits.len() + usize::from(pad)) as u8);
    if pad {
        out.push(0x00);
    }
    out.extend_from_slice(digits);
}

/// Convert `r ‖ s` into a DER-encoded ECDSA signature
pub fn fixed_to_der(fixed: &FixedSignature) -> Vec<u8> {
    let mut body = Vec::with_capacity(70);
    der_integer(&mut body, &fixed[..32]);
    der_integer(&mut body, &fixed[32..]);

    let mut der = Vec::with_capacity(body.len() + 2);
    der.push(0x30);
    der.push(body.len() as u8);
    der.extend_from_slice(&body);
    der
}

/// Sign `message` (hashed with SHA-256) and self-verify the result
///
/// A signature that fails verification is never returned.
pub fn sign(key: &SigningKey, message: &[u8]) -> Result<FixedSignature> {
    let signature: Signature = key.sign(message);
    let fixed = der_to_fixed(signature.to_der().as_bytes())?;

    let public = key.verifying_key().to_encoded_point(false);
    if !verify(public.as_bytes(), message, &fixed) {
        return Err(Error::SelfVerification);
    }
    Ok(fixed)
}

/// Verify a fixed-size signature over `message` with a SEC1 public key
///
/// Any malformed input yields `false`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    // Cards do not normalize S
    let signature = signature.normalize_s().unwrap_or(signature);
    key.verify(message, &signature).is_ok()
}

/// Wallet public key in both SEC1 encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletKey {
    /// Uncompressed point, `04 ‖ x ‖ y`
    pub uncompressed: [u8; 65],
    /// Compressed point, `02|03 ‖ x`
    pub compressed: [u8; 33],
}

impl WalletKey {
    /// Reconstruct a secp256k1 point from either SEC1 encoding
    pub fn from_sec1(bytes: &[u8]) -> Result<Self> {
        let key = PublicKey::from_sec1_bytes(bytes)?;
        Ok(Self::from(&key))
    }

    /// The key as a k256 public key
    pub fn public_key(&self) -> Result<PublicKey> {
        Ok(PublicKey::from_sec1_bytes(&self.uncompressed)?)
    }
}

impl From<&PublicKey> for WalletKey {
    fn from(key: &PublicKey) -> Self {
        let mut uncompressed = [0u8; 65];
        uncompressed.copy_from_slice(key.to_encoded_point(false).as_bytes());
        let mut compressed = [0u8; 33];
        compressed.copy_from_slice(key.to_encoded_point(true).as_bytes());
        Self {
            uncompressed,
            compressed,
        }
    }
}

/// ECDH over secp256k1, returning the x coordinate of the shared point
pub fn ecdh(secret: &SecretKey, public: &PublicKey) -> Zeroizing<[u8; 32]> {
    let shared = k256::elliptic_curve::ecdh::diffie_hellman(
        secret.to_nonzero_scalar(),
        public.as_affine(),
    );
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(shared.raw_secret_bytes());
    out
}
