//! BIP-39 mnemonic codec
//!
//! Entropy → checksummed English word sequence → 64-byte seed.
//!
//! The checksum is the first `ENT / 32` bits of `SHA256(entropy)`, appended
//! to the entropy and split into 11-bit word indices. The seed is
//! `PBKDF2-HMAC-SHA512(mnemonic, "mnemonic" || passphrase, 2048)`.

use bip39::{Language, Mnemonic};
use rand::{CryptoRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::ErrorKind;

/// Entropy lengths (in bytes) accepted by BIP-39.
pub const VALID_ENTROPY_LENGTHS: [usize; 5] = [16, 20, 24, 28, 32];

/// Entropy length used for a fresh session (12 words).
pub const DEFAULT_ENTROPY_BYTES: usize = 16;

/// Length of a BIP-39 seed in bytes.
pub const SEED_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    #[error("Invalid entropy length: {0} bytes (expected 16, 20, 24, 28 or 32)")]
    InvalidEntropyLength(usize),
    #[error("Invalid word count: {0} (expected 12, 15, 18, 21 or 24)")]
    InvalidWordCount(usize),
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Mnemonic checksum mismatch")]
    InvalidChecksum,
}

impl SeedError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Encode entropy as a mnemonic.
pub fn mnemonic_from_entropy(entropy: &[u8]) -> Result<Mnemonic, SeedError> {
    if !VALID_ENTROPY_LENGTHS.contains(&entropy.len()) {
        return Err(SeedError::InvalidEntropyLength(entropy.len()));
    }
    Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}

/// Recover the entropy a mnemonic was built from.
pub fn mnemonic_to_entropy(mnemonic: &Mnemonic) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(mnemonic.to_entropy())
}

/// Generate a new mnemonic with `word_count` words from the given CSPRNG.
pub fn generate_mnemonic<R>(rng: &mut R, word_count: usize) -> Result<Mnemonic, SeedError>
where
    R: RngCore + CryptoRng,
{
    if !matches!(word_count, 12 | 15 | 18 | 21 | 24) {
        return Err(SeedError::InvalidWordCount(word_count));
    }
    let mut entropy = Zeroizing::new(vec![0u8; word_count * 4 / 3]);
    rng.fill_bytes(&mut entropy);
    mnemonic_from_entropy(&entropy)
}

/// Parse and checksum-validate an English mnemonic sentence.
pub fn parse_mnemonic(words: &str) -> Result<Mnemonic, SeedError> {
    Mnemonic::parse_in(Language::English, words).map_err(|e| match e {
        bip39::Error::InvalidChecksum => SeedError::InvalidChecksum,
        other => SeedError::InvalidMnemonic(other.to_string()),
    })
}

/// Check that a sentence is a valid mnemonic without keeping it.
pub fn validate_mnemonic(words: &str) -> Result<(), SeedError> {
    parse_mnemonic(words).map(|_| ())
}

/// Derive seed bytes from mnemonic (with optional passphrase)
pub fn mnemonic_to_seed(mnemonic: &Mnemonic, passphrase: &str) -> Zeroizing<[u8; SEED_LEN]> {
    Zeroizing::new(mnemonic.to_seed(passphrase))
}

/// The words of a mnemonic, in order.
pub fn mnemonic_words(mnemonic: &Mnemonic) -> Vec<&'static str> {
    mnemonic.words().collect()
}
