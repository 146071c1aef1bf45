//! Address-browsing session
//!
//! One session owns one mnemonic, the three memoized account public keys
//! derived from it and the current (profile, address index) selection.
//! The seed and every private key are dropped once the account keys exist;
//! receive addresses are derived from the public-only account nodes.

use std::fmt;
use std::time::Instant;

use bip39::Mnemonic;
use bitcoin::bip32::{ChildNumber, DerivationPath};
use bitcoin::{Address, Network};
use rand::{CryptoRng, RngCore};
use secp256k1::{All, Secp256k1};
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::address::{shorten, AddressError, ScriptType};
use crate::keys::{derive_account_xpub, format_path, ExtendedKey, KeyError, MAX_NORMAL_INDEX};
use crate::seed::{mnemonic_from_entropy, mnemonic_to_seed, mnemonic_words, SeedError};
use crate::ErrorKind;

/// Receive chain below an account node.
const RECEIVE_CHAIN: u32 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error("Profile index {0} out of range")]
    ProfileOutOfRange(usize),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Seed(e) => e.kind(),
            SessionError::Key(e) => e.kind(),
            SessionError::Address(e) => e.kind(),
            SessionError::ProfileOutOfRange(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Account path `m/purpose'/coin'/0'`; coin type 1 off mainnet.
pub fn account_path(script_type: ScriptType, network: Network) -> DerivationPath {
    let coin_type = if network == Network::Bitcoin { 0 } else { 1 };
    DerivationPath::from(vec![
        ChildNumber::Hardened {
            index: script_type.purpose(),
        },
        ChildNumber::Hardened { index: coin_type },
        ChildNumber::Hardened { index: 0 },
    ])
}

/// A memoized account node for one script type.
#[derive(Debug, Clone)]
struct AccountProfile {
    script_type: ScriptType,
    path: DerivationPath,
    xpub: ExtendedKey,
}

/// A derived receive address and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiveAddress {
    pub script_type: ScriptType,
    pub profile_index: usize,
    pub address_index: u32,
    pub path: String,
    pub address: Address,
}

impl ReceiveAddress {
    /// e.g. `Nested segwit: #3`
    pub fn label(&self) -> String {
        format!("{}: #{}", self.script_type.label(), self.address_index)
    }

    pub fn short(&self, keep: usize) -> String {
        shorten(&self.address.to_string(), keep)
    }
}

pub struct Session {
    secp: Secp256k1<All>,
    network: Network,
    mnemonic: Mnemonic,
    profiles: Vec<AccountProfile>,
    profile_index: usize,
    address_index: u32,
}

// The mnemonic is left out on purpose.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("network", &self.network)
            .field("profile_index", &self.profile_index)
            .field("address_index", &self.address_index)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session from caller-supplied entropy.
    pub fn from_entropy(entropy: &[u8], network: Network) -> Result<Self, SessionError> {
        let mnemonic = mnemonic_from_entropy(entropy)?;
        Self::from_mnemonic(mnemonic, network)
    }

    /// Build a session from fresh entropy drawn from `rng`.
    ///
    /// Entropy whose seed yields an out-of-range master key is discarded and
    /// redrawn.
    pub fn generate<R>(rng: &mut R, network: Network, entropy_bytes: usize) -> Result<Self, SessionError>
    where
        R: RngCore + CryptoRng,
    {
        loop {
            let mut entropy = Zeroizing::new(vec![0u8; entropy_bytes]);
            rng.fill_bytes(&mut entropy);
            match Self::from_entropy(&entropy, network) {
                Err(e) if e.kind() == ErrorKind::InvalidKey => {
                    log::warn!("Discarding entropy: {}", e);
                }
                result => return result,
            }
        }
    }

    /// Derive and memoize the account public key of every profile.
    pub fn from_mnemonic(mnemonic: Mnemonic, network: Network) -> Result<Self, SessionError> {
        let mut secp = Secp256k1::new();
        secp.randomize(&mut rand::thread_rng());

        let start = Instant::now();
        let master = {
            let seed = mnemonic_to_seed(&mnemonic, "");
            ExtendedKey::master_from_seed(&secp, &seed[..])?
        };
        let profiles = ScriptType::ALL
            .iter()
            .map(|&script_type| {
                let path = account_path(script_type, network);
                let xpub = derive_account_xpub(&secp, &master, &path)?;
                Ok(AccountProfile {
                    script_type,
                    path,
                    xpub,
                })
            })
            .collect::<Result<Vec<_>, KeyError>>()?;
        log::debug!(
            "Derived {} account keys in {}ms",
            profiles.len(),
            start.elapsed().as_millis()
        );

        Ok(Self {
            secp,
            network,
            mnemonic,
            profiles,
            profile_index: 0,
            address_index: 0,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The mnemonic words in order, for backup display.
    pub fn get_mnemonic_words(&self) -> Vec<&'static str> {
        mnemonic_words(&self.mnemonic)
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn script_type(&self, profile_index: usize) -> Option<ScriptType> {
        self.profiles.get(profile_index).map(|p| p.script_type)
    }

    /// Index of the first profile with the given script type.
    pub fn profile_of(&self, script_type: ScriptType) -> Option<usize> {
        self.profiles
            .iter()
            .position(|p| p.script_type == script_type)
    }

    pub fn profile_index(&self) -> usize {
        self.profile_index
    }

    pub fn address_index(&self) -> u32 {
        self.address_index
    }

    /// Derive the receive address `account / 0 / address_index` of a profile.
    pub fn get_receive_address(
        &self,
        profile_index: usize,
        address_index: u32,
    ) -> Result<ReceiveAddress, SessionError> {
        let profile = self
            .profiles
            .get(profile_index)
            .ok_or(SessionError::ProfileOutOfRange(profile_index))?;

        let leaf = profile
            .xpub
            .derive_child(&self.secp, RECEIVE_CHAIN)?
            .derive_child(&self.secp, address_index)?;
        let address = profile
            .script_type
            .encode(&self.secp, &leaf.public_key(), self.network)?;

        let mut steps: Vec<ChildNumber> = profile.path.clone().into();
        steps.push(ChildNumber::from(RECEIVE_CHAIN));
        steps.push(leaf.child_number());
        let path = format_path(&steps);
        log::trace!("{} -> {}", path, address);

        Ok(ReceiveAddress {
            script_type: profile.script_type,
            profile_index,
            address_index,
            path,
            address,
        })
    }

    /// The address for the current selection.
    pub fn current(&self) -> Result<ReceiveAddress, SessionError> {
        self.get_receive_address(self.profile_index, self.address_index)
    }

    /// Move to (`profile_index`, `address_index`). The selection only
    /// changes if the address derives successfully.
    pub fn select(
        &mut self,
        profile_index: usize,
        address_index: u32,
    ) -> Result<ReceiveAddress, SessionError> {
        let address = self.get_receive_address(profile_index, address_index)?;
        self.profile_index = profile_index;
        self.address_index = address_index;
        Ok(address)
    }

    pub fn next_profile(&mut self) -> Result<ReceiveAddress, SessionError> {
        let next = (self.profile_index + 1) % self.profiles.len();
        self.select(next, self.address_index)
    }

    pub fn prev_profile(&mut self) -> Result<ReceiveAddress, SessionError> {
        let count = self.profiles.len();
        let prev = (self.profile_index + count - 1) % count;
        self.select(prev, self.address_index)
    }

    /// Saturates at the largest non-hardened index.
    pub fn next_address(&mut self) -> Result<ReceiveAddress, SessionError> {
        let next = self.address_index.saturating_add(1).min(MAX_NORMAL_INDEX);
        self.select(self.profile_index, next)
    }

    /// Stops at index 0.
    pub fn prev_address(&mut self) -> Result<ReceiveAddress, SessionError> {
        let prev = self.address_index.saturating_sub(1);
        self.select(self.profile_index, prev)
    }
}
