//! Hierarchical deterministic key tree (BIP-32)
//!
//! A seed is stretched into a master [`ExtendedKey`]; every other node is
//! reached by folding [`ExtendedKey::derive_child`] over a derivation path.
//!
//! Child derivation:
//!
//! ```text
//! hardened:  I = HMAC-SHA512(c_par, 0x00 || k_par || ser32(i))
//! normal:    I = HMAC-SHA512(c_par, serP(K_par) || ser32(i))
//! child key  = I_L + k_par (mod n)    or    K_par + I_L·G
//! child code = I_R
//! ```
//!
//! If `I_L >= n` or the child key is zero / the point at infinity, the index
//! is skipped and derivation continues with `i + 1`.

use std::fmt;

use bitcoin::bip32::{ChainCode, ChildNumber, DerivationPath, Fingerprint, Xpriv, Xpub};
use bitcoin::hashes::{hash160, sha512, Hash, HashEngine, Hmac, HmacEngine};
use bitcoin::NetworkKind;
use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey, Signing, Verification};
use thiserror::Error;

use crate::ErrorKind;

/// BIP-84 account path (native segwit, mainnet, account 0)
pub const BIP84_ACCOUNT_PATH: &str = "m/84'/0'/0'";

/// BIP-49 account path (nested segwit, mainnet, account 0)
pub const BIP49_ACCOUNT_PATH: &str = "m/49'/0'/0'";

/// BIP-86 account path (taproot, mainnet, account 0)
pub const BIP86_ACCOUNT_PATH: &str = "m/86'/0'/0'";

/// HMAC key for master key generation.
const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";

/// First hardened index (2^31).
pub const HARDENED_OFFSET: u32 = 1 << 31;

/// Largest index that can be derived from a public-only key.
pub const MAX_NORMAL_INDEX: u32 = HARDENED_OFFSET - 1;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl KeyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyError::InvalidInput(_) => ErrorKind::InvalidInput,
            KeyError::InvalidKey(_) => ErrorKind::InvalidKey,
            KeyError::InvalidPath(_) => ErrorKind::InvalidPath,
        }
    }
}

/// Key material held by a node: a key pair, or a public key alone.
#[derive(Clone, Copy, PartialEq, Eq)]
enum KeyMaterial {
    Private(SecretKey),
    Public(PublicKey),
}

/// One node of the key tree.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedKey {
    depth: u8,
    parent_fingerprint: Fingerprint,
    child_number: ChildNumber,
    chain_code: [u8; 32],
    key: KeyMaterial,
    public_key: PublicKey,
}

// Never print the private scalar.
impl fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("depth", &self.depth)
            .field("parent_fingerprint", &self.parent_fingerprint)
            .field("child_number", &self.child_number)
            .field("public_key", &self.public_key)
            .field("private", &self.is_private())
            .finish_non_exhaustive()
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> [u8; 64] {
    let mut engine = HmacEngine::<sha512::Hash>::new(key);
    for part in parts {
        engine.input(part);
    }
    Hmac::<sha512::Hash>::from_engine(engine).to_byte_array()
}

/// The index tried after `current` yields no valid key, staying on the same
/// side of the hardened boundary. `None` once that side is exhausted.
fn next_candidate(current: u32, hardened: bool) -> Option<u32> {
    current
        .checked_add(1)
        .filter(|next| (*next >= HARDENED_OFFSET) == hardened)
}

fn split_hmac(output: &[u8; 64]) -> ([u8; 32], [u8; 32]) {
    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    (left, right)
}

impl ExtendedKey {
    /// Derive the master key from seed bytes.
    ///
    /// Fails with [`KeyError::InvalidKey`] when `I_L` is zero or not below the
    /// curve order; the caller must start over with a different seed.
    pub fn master_from_seed<C: Signing>(
        secp: &Secp256k1<C>,
        seed: &[u8],
    ) -> Result<Self, KeyError> {
        if !(16..=64).contains(&seed.len()) {
            return Err(KeyError::InvalidInput(format!(
                "seed must be 16 to 64 bytes, got {}",
                seed.len()
            )));
        }

        let output = hmac_sha512(MASTER_HMAC_KEY, &[seed]);
        let (left, chain_code) = split_hmac(&output);
        let secret = SecretKey::from_slice(&left)
            .map_err(|e| KeyError::InvalidKey(format!("master key out of range: {}", e)))?;

        Ok(Self {
            depth: 0,
            parent_fingerprint: Fingerprint::default(),
            child_number: ChildNumber::from(0),
            chain_code,
            key: KeyMaterial::Private(secret),
            public_key: PublicKey::from_secret_key(secp, &secret),
        })
    }

    /// Derive the child at `index`, skipping forward past invalid indices.
    ///
    /// Hardened indices (`>= 2^31`) need the private key; asking a public-only
    /// node for one fails with [`KeyError::InvalidPath`]. The returned key's
    /// [`child_number`](Self::child_number) is the index actually used.
    pub fn derive_child<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Result<Self, KeyError> {
        if self.depth == u8::MAX {
            return Err(KeyError::InvalidInput("maximum tree depth reached".into()));
        }
        let hardened = index >= HARDENED_OFFSET;
        if hardened && !self.is_private() {
            return Err(KeyError::InvalidPath(format!(
                "hardened step {} requested on a public-only key",
                ChildNumber::from(index)
            )));
        }

        let mut current = index;
        loop {
            if let Some(child) = self.try_derive_child(secp, current) {
                if current != index {
                    log::warn!("child index {} invalid, derived {} instead", index, current);
                }
                return Ok(child);
            }

            current = next_candidate(current, hardened).ok_or_else(|| {
                KeyError::InvalidKey(format!(
                    "no valid child at or after index {}",
                    ChildNumber::from(index)
                ))
            })?;
        }
    }

    /// One CKD attempt. `None` means the index yields no valid key.
    fn try_derive_child<C: Signing + Verification>(
        &self,
        secp: &Secp256k1<C>,
        index: u32,
    ) -> Option<Self> {
        let index_bytes = index.to_be_bytes();
        let output = match (&self.key, index >= HARDENED_OFFSET) {
            (KeyMaterial::Private(secret), true) => hmac_sha512(
                &self.chain_code,
                &[&[0u8][..], &secret.secret_bytes()[..], &index_bytes[..]],
            ),
            _ => hmac_sha512(
                &self.chain_code,
                &[&self.public_key.serialize()[..], &index_bytes[..]],
            ),
        };
        let (left, chain_code) = split_hmac(&output);
        let tweak = Scalar::from_be_bytes(left).ok()?;

        let (key, public_key) = match self.key {
            KeyMaterial::Private(secret) => {
                let child = secret.add_tweak(&tweak).ok()?;
                (KeyMaterial::Private(child), PublicKey::from_secret_key(secp, &child))
            }
            KeyMaterial::Public(public) => {
                let child = public.add_exp_tweak(secp, &tweak).ok()?;
                (KeyMaterial::Public(child), child)
            }
        };

        Some(Self {
            depth: self.depth + 1,
            parent_fingerprint: self.fingerprint(),
            child_number: ChildNumber::from(index),
            chain_code,
            key,
            public_key,
        })
    }

    /// Fold [`derive_child`](Self::derive_child) over every step of `path`.
    pub fn derive_path<C, P>(&self, secp: &Secp256k1<C>, path: &P) -> Result<Self, KeyError>
    where
        C: Signing + Verification,
        P: AsRef<[ChildNumber]>,
    {
        path.as_ref()
            .iter()
            .try_fold(self.clone(), |node, step| node.derive_child(secp, u32::from(*step)))
    }

    /// Drop the private scalar, keeping the public point and chain code.
    pub fn to_public(&self) -> Self {
        Self {
            key: KeyMaterial::Public(self.public_key),
            ..self.clone()
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self.key, KeyMaterial::Private(_))
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }

    pub fn parent_fingerprint(&self) -> Fingerprint {
        self.parent_fingerprint
    }

    pub fn chain_code(&self) -> ChainCode {
        ChainCode::from(self.chain_code)
    }

    /// First four bytes of `HASH160(serP(K))`.
    pub fn fingerprint(&self) -> Fingerprint {
        let id = hash160::Hash::hash(&self.public_key.serialize());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&id.as_byte_array()[..4]);
        Fingerprint::from(bytes)
    }

    /// Standard `xpub`/`tpub` form of this node.
    pub fn to_xpub(&self, network: impl Into<NetworkKind>) -> Xpub {
        Xpub {
            network: network.into(),
            depth: self.depth,
            parent_fingerprint: self.parent_fingerprint,
            child_number: self.child_number,
            public_key: self.public_key,
            chain_code: self.chain_code(),
        }
    }

    /// Standard `xprv`/`tprv` form; `None` for public-only nodes.
    pub fn to_xpriv(&self, network: impl Into<NetworkKind>) -> Option<Xpriv> {
        match self.key {
            KeyMaterial::Private(private_key) => Some(Xpriv {
                network: network.into(),
                depth: self.depth,
                parent_fingerprint: self.parent_fingerprint,
                child_number: self.child_number,
                private_key,
                chain_code: self.chain_code(),
            }),
            KeyMaterial::Public(_) => None,
        }
    }
}

impl From<Xpub> for ExtendedKey {
    fn from(xpub: Xpub) -> Self {
        // version(4) depth(1) fingerprint(4) child(4) chain code(32) key(33)
        let encoded = xpub.encode();
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&encoded[13..45]);
        Self {
            depth: xpub.depth,
            parent_fingerprint: xpub.parent_fingerprint,
            child_number: xpub.child_number,
            chain_code,
            key: KeyMaterial::Public(xpub.public_key),
            public_key: xpub.public_key,
        }
    }
}

/// Parse `m/84'/0'/0'`-style text (`h` also marks a hardened step).
pub fn parse_path(text: &str) -> Result<DerivationPath, KeyError> {
    text.trim()
        .parse::<DerivationPath>()
        .map_err(|e| KeyError::InvalidInput(format!("malformed path {:?}: {}", text, e)))
}

/// Render a path as `m/84'/0'/0'/0/5`.
pub fn format_path<P: AsRef<[ChildNumber]>>(path: &P) -> String {
    let mut out = String::from("m");
    for step in path.as_ref() {
        match *step {
            ChildNumber::Normal { index } => out.push_str(&format!("/{}", index)),
            ChildNumber::Hardened { index } => out.push_str(&format!("/{}'", index)),
        }
    }
    out
}

/// Derive the public-only account node at `account_path` below `master`.
pub fn derive_account_xpub<C: Signing + Verification>(
    secp: &Secp256k1<C>,
    master: &ExtendedKey,
    account_path: &DerivationPath,
) -> Result<ExtendedKey, KeyError> {
    Ok(master.derive_path(secp, account_path)?.to_public())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn secp() -> Secp256k1<secp256k1::All> {
        Secp256k1::new()
    }

    fn vector1_master() -> ExtendedKey {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        ExtendedKey::master_from_seed(&secp(), &seed).unwrap()
    }

    /// BIP-32 test vector 1, chain m
    #[test]
    fn test_vector1_master() {
        let master = vector1_master();
        assert_eq!(
            master.to_xpub(NetworkKind::Main).to_string(),
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8"
        );
        assert_eq!(
            master.to_xpriv(NetworkKind::Main).unwrap().to_string(),
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi"
        );
        assert_eq!(master.depth(), 0);
    }

    /// BIP-32 test vector 1, chain m/0H
    #[test]
    fn test_vector1_hardened_child() {
        let secp = secp();
        let child = vector1_master().derive_child(&secp, HARDENED_OFFSET).unwrap();
        assert_eq!(
            child.to_xpub(NetworkKind::Main).to_string(),
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw"
        );
        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent_fingerprint(), vector1_master().fingerprint());
    }

    /// Public and private derivation agree on normal steps.
    #[test]
    fn test_public_derivation_matches_private() {
        let secp = secp();
        let account = vector1_master()
            .derive_path(&secp, &parse_path("m/0'/1").unwrap())
            .unwrap();

        let from_private = account.derive_path(&secp, &parse_path("m/2/7").unwrap()).unwrap();
        let from_public = account
            .to_public()
            .derive_path(&secp, &parse_path("m/2/7").unwrap())
            .unwrap();

        assert!(from_private.is_private());
        assert!(!from_public.is_private());
        assert_eq!(from_private.public_key(), from_public.public_key());
        assert_eq!(from_private.chain_code(), from_public.chain_code());
        assert_eq!(from_private.to_public(), from_public);
    }

    #[test]
    fn test_hardened_step_on_public_key_fails() {
        let secp = secp();
        let public = vector1_master().to_public();
        let err = public
            .derive_path(&secp, &parse_path("m/0/1'").unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);

        let err = public.derive_child(&secp, HARDENED_OFFSET + 5).unwrap_err();
        assert!(matches!(err, KeyError::InvalidPath(_)));
    }

    #[test]
    fn test_to_public_is_irreversible() {
        let public = vector1_master().to_public();
        assert!(public.to_xpriv(NetworkKind::Main).is_none());
        assert_eq!(public.to_public(), public);
    }

    #[test]
    fn test_matches_rust_bitcoin_bip32() {
        let secp = secp();
        let seed = [0x42u8; 64];
        let path = parse_path("m/86'/0'/0'/1/9").unwrap();

        let ours = ExtendedKey::master_from_seed(&secp, &seed)
            .unwrap()
            .derive_path(&secp, &path)
            .unwrap();
        let theirs = Xpriv::new_master(NetworkKind::Main, &seed)
            .unwrap()
            .derive_priv(&secp, &path)
            .unwrap();

        assert_eq!(ours.to_xpriv(NetworkKind::Main).unwrap(), theirs);
        assert_eq!(ours.to_xpub(NetworkKind::Main), Xpub::from_priv(&secp, &theirs));
    }

    #[test]
    fn test_from_xpub_continues_derivation() {
        let secp = secp();
        let xpub = Xpub::from_str(
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw",
        )
        .unwrap();
        let ours = ExtendedKey::from(xpub).derive_child(&secp, 1).unwrap();
        let theirs = xpub.ckd_pub(&secp, ChildNumber::from(1)).unwrap();
        assert_eq!(ours.to_xpub(NetworkKind::Main), theirs);
    }

    #[test]
    fn test_next_candidate_steps_by_one() {
        assert_eq!(next_candidate(0, false), Some(1));
        assert_eq!(next_candidate(41, false), Some(42));
        assert_eq!(next_candidate(HARDENED_OFFSET, true), Some(HARDENED_OFFSET + 1));
    }

    #[test]
    fn test_next_candidate_never_crosses_hardened_boundary() {
        assert_eq!(next_candidate(MAX_NORMAL_INDEX, false), None);
        assert_eq!(next_candidate(u32::MAX, true), None);
        assert_eq!(next_candidate(MAX_NORMAL_INDEX - 1, false), Some(MAX_NORMAL_INDEX));
        assert_eq!(next_candidate(u32::MAX - 1, true), Some(u32::MAX));
    }

    /// The last index on each side of the boundary derives without spilling
    /// into the other side.
    #[test]
    fn test_boundary_indices_derive() {
        let secp = secp();
        let master = vector1_master();

        let normal = master.derive_child(&secp, MAX_NORMAL_INDEX).unwrap();
        assert_eq!(normal.child_number(), ChildNumber::from(MAX_NORMAL_INDEX));
        let public = master.to_public().derive_child(&secp, MAX_NORMAL_INDEX).unwrap();
        assert_eq!(public.public_key(), normal.public_key());

        let hardened = master.derive_child(&secp, u32::MAX).unwrap();
        assert_eq!(hardened.child_number(), ChildNumber::from(u32::MAX));
    }

    #[test]
    fn test_account_xpub_is_public_only() {
        let secp = secp();
        let master = vector1_master();
        let path = parse_path(BIP84_ACCOUNT_PATH).unwrap();
        let account = derive_account_xpub(&secp, &master, &path).unwrap();
        assert!(!account.is_private());
        assert_eq!(account.depth(), 3);
        assert_eq!(account, master.derive_path(&secp, &path).unwrap().to_public());
    }

    #[test]
    fn test_seed_length_checked() {
        let err = ExtendedKey::master_from_seed(&secp(), &[1u8; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_parse_and_format_path() {
        let path = parse_path("m/84h/0h/0h/0/5").unwrap();
        assert_eq!(format_path(&path), "m/84'/0'/0'/0/5");
        assert_eq!(format_path(&parse_path(BIP86_ACCOUNT_PATH).unwrap()), BIP86_ACCOUNT_PATH);

        assert!(matches!(parse_path("m/84'/x"), Err(KeyError::InvalidInput(_))));
        assert!(matches!(parse_path("m/4294967296"), Err(KeyError::InvalidInput(_))));
    }

    #[test]
    fn test_debug_hides_private_key() {
        let master = vector1_master();
        let secret_hex = hex::encode(
            master.to_xpriv(NetworkKind::Main).unwrap().private_key.secret_bytes(),
        );
        let debug = format!("{:?}", master);
        assert!(!debug.contains(&secret_hex));
        assert!(debug.contains("private: true"));
    }
}
