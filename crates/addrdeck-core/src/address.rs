//! Receive-address encoding
//!
//! Turns a leaf public key into one of three standard output addresses:
//!
//! - native segwit (BIP-84): `OP_0 <HASH160(pk)>`, bech32
//! - nested segwit (BIP-49): P2SH of the P2WPKH script, base58check
//! - taproot (BIP-86): `OP_1 <tweaked x-only key>`, bech32m, key-path only

use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::{hash160, Hash};
use bitcoin::key::{TapTweak, TweakedPublicKey};
use bitcoin::{Address, CompressedPublicKey, Network, ScriptBuf};
use secp256k1::{PublicKey, Secp256k1, Verification};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::{BIP49_ACCOUNT_PATH, BIP84_ACCOUNT_PATH, BIP86_ACCOUNT_PATH};
use crate::ErrorKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address: {0}")]
    InvalidInput(String),
    #[error("Address encoding failed: {0}")]
    EncodingFailure(String),
}

impl AddressError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AddressError::InvalidInput(_) => ErrorKind::InvalidInput,
            AddressError::EncodingFailure(_) => ErrorKind::EncodingFailure,
        }
    }
}

/// Output script family of an account profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptType {
    NativeSegwit,
    NestedSegwit,
    Taproot,
}

impl ScriptType {
    /// Profile order used by a session.
    pub const ALL: [ScriptType; 3] = [
        ScriptType::NativeSegwit,
        ScriptType::NestedSegwit,
        ScriptType::Taproot,
    ];

    /// BIP-43 purpose field.
    pub fn purpose(self) -> u32 {
        match self {
            ScriptType::NativeSegwit => 84,
            ScriptType::NestedSegwit => 49,
            ScriptType::Taproot => 86,
        }
    }

    /// Account-level path (coin type 0, account 0).
    pub fn account_path(self) -> &'static str {
        match self {
            ScriptType::NativeSegwit => BIP84_ACCOUNT_PATH,
            ScriptType::NestedSegwit => BIP49_ACCOUNT_PATH,
            ScriptType::Taproot => BIP86_ACCOUNT_PATH,
        }
    }

    /// Caption shown next to an address.
    pub fn label(self) -> &'static str {
        match self {
            ScriptType::NativeSegwit => "Segwit",
            ScriptType::NestedSegwit => "Nested segwit",
            ScriptType::Taproot => "Taproot",
        }
    }

    /// Encode `pubkey` as an address of this type.
    pub fn encode<C: Verification>(
        self,
        secp: &Secp256k1<C>,
        pubkey: &PublicKey,
        network: Network,
    ) -> Result<Address, AddressError> {
        match self {
            ScriptType::NativeSegwit => Ok(p2wpkh_address(pubkey, network)),
            ScriptType::NestedSegwit => p2sh_p2wpkh_address(pubkey, network),
            ScriptType::Taproot => Ok(p2tr_address(secp, pubkey, network)),
        }
    }

    /// The bytes a decoder recovers from this type's address for `pubkey`.
    pub fn program<C: Verification>(self, secp: &Secp256k1<C>, pubkey: &PublicKey) -> Vec<u8> {
        match self {
            ScriptType::NativeSegwit => hash160::Hash::hash(&pubkey.serialize())
                .to_byte_array()
                .to_vec(),
            ScriptType::NestedSegwit => hash160::Hash::hash(p2wpkh_redeem_script(pubkey).as_bytes())
                .to_byte_array()
                .to_vec(),
            ScriptType::Taproot => taproot_output_key(secp, pubkey)
                .to_x_only_public_key()
                .serialize()
                .to_vec(),
        }
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScriptType::NativeSegwit => "native-segwit",
            ScriptType::NestedSegwit => "nested-segwit",
            ScriptType::Taproot => "taproot",
        })
    }
}

impl FromStr for ScriptType {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native-segwit" | "segwit" | "p2wpkh" | "bip84" => Ok(ScriptType::NativeSegwit),
            "nested-segwit" | "p2sh-p2wpkh" | "bip49" => Ok(ScriptType::NestedSegwit),
            "taproot" | "p2tr" | "bip86" => Ok(ScriptType::Taproot),
            other => Err(AddressError::InvalidInput(format!(
                "unknown script type: {}",
                other
            ))),
        }
    }
}

/// Native segwit v0 address: witness program is `HASH160(compressed pk)`.
pub fn p2wpkh_address(pubkey: &PublicKey, network: Network) -> Address {
    Address::p2wpkh(&CompressedPublicKey(*pubkey), network)
}

/// `OP_0 <20-byte key hash>`: the P2WPKH script, used as P2SH redeem script.
pub fn p2wpkh_redeem_script(pubkey: &PublicKey) -> ScriptBuf {
    ScriptBuf::new_p2wpkh(&CompressedPublicKey(*pubkey).wpubkey_hash())
}

/// P2SH-wrapped P2WPKH address.
pub fn p2sh_p2wpkh_address(pubkey: &PublicKey, network: Network) -> Result<Address, AddressError> {
    let redeem_script = p2wpkh_redeem_script(pubkey);
    Address::p2sh(&redeem_script, network)
        .map_err(|e| AddressError::EncodingFailure(e.to_string()))
}

/// BIP-341 output key for a key-path-only spend (no script tree).
pub fn taproot_output_key<C: Verification>(
    secp: &Secp256k1<C>,
    pubkey: &PublicKey,
) -> TweakedPublicKey {
    let (internal_key, _parity) = pubkey.x_only_public_key();
    let (output_key, _parity) = internal_key.tap_tweak(secp, None);
    output_key
}

/// Taproot (segwit v1) address.
pub fn p2tr_address<C: Verification>(
    secp: &Secp256k1<C>,
    pubkey: &PublicKey,
    network: Network,
) -> Address {
    Address::p2tr_tweaked(taproot_output_key(secp, pubkey), network)
}

/// Script type and program bytes recovered from an address string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedAddress {
    pub script_type: ScriptType,
    /// 20-byte key hash (P2WPKH), 20-byte script hash (P2SH) or 32-byte
    /// output key (P2TR).
    pub program: Vec<u8>,
}

/// Decode an address for `network`.
///
/// A P2SH address is reported as [`ScriptType::NestedSegwit`]; the redeem
/// script is not visible in the address. Other output types are rejected.
pub fn decode_address(text: &str, network: Network) -> Result<DecodedAddress, AddressError> {
    let address = Address::from_str(text.trim())
        .map_err(|e| AddressError::InvalidInput(e.to_string()))?
        .require_network(network)
        .map_err(|e| AddressError::InvalidInput(e.to_string()))?;

    let script = address.script_pubkey();
    let bytes = script.as_bytes();
    let (script_type, program) = if script.is_p2wpkh() {
        (ScriptType::NativeSegwit, &bytes[2..22])
    } else if script.is_p2sh() {
        (ScriptType::NestedSegwit, &bytes[2..22])
    } else if script.is_p2tr() {
        (ScriptType::Taproot, &bytes[2..34])
    } else {
        return Err(AddressError::InvalidInput(format!(
            "unsupported output type: {}",
            text
        )));
    };

    Ok(DecodedAddress {
        script_type,
        program: program.to_vec(),
    })
}

/// Abbreviate an address to its first and last `keep` characters.
pub fn shorten(address: &str, keep: usize) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= keep.saturating_mul(2).saturating_add(3) {
        return address.to_string();
    }
    let head: String = chars[..keep].iter().collect();
    let tail: String = chars[chars.len() - keep..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pubkey(hex_str: &str) -> PublicKey {
        PublicKey::from_slice(&hex::decode(hex_str).unwrap()).unwrap()
    }

    /// BIP-173 example key.
    const SATOSHI_KEY: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    #[test]
    fn test_p2wpkh_bip173_vector() {
        let address = p2wpkh_address(&pubkey(SATOSHI_KEY), Network::Bitcoin);
        assert_eq!(
            address.to_string(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );

        let testnet = p2wpkh_address(&pubkey(SATOSHI_KEY), Network::Testnet);
        assert_eq!(
            testnet.to_string(),
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx"
        );
    }

    #[test]
    fn test_roundtrip_all_script_types() {
        let secp = Secp256k1::verification_only();
        let key = pubkey(SATOSHI_KEY);
        for script_type in ScriptType::ALL {
            let address = script_type.encode(&secp, &key, Network::Bitcoin).unwrap();
            let decoded = decode_address(&address.to_string(), Network::Bitcoin).unwrap();
            assert_eq!(decoded.script_type, script_type);
            assert_eq!(decoded.program, script_type.program(&secp, &key));
        }
    }

    #[test]
    fn test_address_prefixes() {
        let secp = Secp256k1::verification_only();
        let key = pubkey(SATOSHI_KEY);
        let encode = |t: ScriptType, n: Network| t.encode(&secp, &key, n).unwrap().to_string();

        assert!(encode(ScriptType::NativeSegwit, Network::Bitcoin).starts_with("bc1q"));
        assert!(encode(ScriptType::NestedSegwit, Network::Bitcoin).starts_with('3'));
        assert!(encode(ScriptType::Taproot, Network::Bitcoin).starts_with("bc1p"));
        assert!(encode(ScriptType::NestedSegwit, Network::Testnet).starts_with('2'));
        assert!(encode(ScriptType::Taproot, Network::Regtest).starts_with("bcrt1p"));
    }

    #[test]
    fn test_redeem_script_layout() {
        let script = p2wpkh_redeem_script(&pubkey(SATOSHI_KEY));
        assert_eq!(
            hex::encode(script.as_bytes()),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn test_decode_rejects_wrong_network() {
        let err = decode_address(
            "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
            Network::Bitcoin,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_decode_rejects_legacy_and_garbage() {
        // P2PKH is not one of the supported profiles.
        assert!(decode_address("1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", Network::Bitcoin).is_err());
        assert!(decode_address("not an address", Network::Bitcoin).is_err());
        assert!(decode_address("", Network::Bitcoin).is_err());
    }

    #[test]
    fn test_script_type_names() {
        for script_type in ScriptType::ALL {
            let parsed: ScriptType = script_type.to_string().parse().unwrap();
            assert_eq!(parsed, script_type);
        }
        assert_eq!("P2TR".parse::<ScriptType>().unwrap(), ScriptType::Taproot);
        assert!("p2pkh".parse::<ScriptType>().is_err());

        let json = serde_json::to_string(&ScriptType::NestedSegwit).unwrap();
        assert_eq!(json, "\"nested-segwit\"");
    }

    #[test]
    fn test_purpose_matches_account_path() {
        for script_type in ScriptType::ALL {
            let expected = format!("m/{}'/0'/0'", script_type.purpose());
            assert_eq!(script_type.account_path(), expected);
        }
    }

    #[test]
    fn test_shorten() {
        let addr = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
        assert_eq!(shorten(addr, 7), "bc1qcr8...z306fyu");
        assert_eq!(shorten("short", 7), "short");
    }

    #[test]
    fn test_shorten_oversized_keep_returns_whole_address() {
        let addr = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";
        assert_eq!(shorten(addr, 20), addr);
        assert_eq!(shorten(addr, 64), addr);
        assert_eq!(shorten(addr, usize::MAX / 2 + 1), addr);
        assert_eq!(shorten(addr, usize::MAX), addr);
    }
}
