//! addrdeck core
//!
//! Seed-to-address pipeline for a receive-address browser.
//!
//! # Pipeline
//!
//! entropy → BIP-39 mnemonic → seed → BIP-32 master → account xpubs at
//! - native segwit: m/84'/0'/0'
//! - nested segwit: m/49'/0'/0'
//! - taproot:       m/86'/0'/0'
//!
//! → receive leaf `account/0/i` → address.
//!
//! Nothing is persisted; a [`Session`] lives in memory only.

pub mod address;
pub mod keys;
pub mod seed;
pub mod session;

pub use address::{decode_address, AddressError, DecodedAddress, ScriptType};
pub use keys::{ExtendedKey, KeyError};
pub use seed::SeedError;
pub use session::{ReceiveAddress, Session, SessionError};

/// Broad failure classes shared by every error type in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong entropy length, malformed path or address, unknown profile.
    InvalidInput,
    /// A derived scalar fell outside `[1, n-1]`.
    InvalidKey,
    /// Hardened step requested on a public-only key.
    InvalidPath,
    /// An address could not be built from a valid key.
    EncodingFailure,
}
