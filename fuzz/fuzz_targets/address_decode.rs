#![no_main]

use addrdeck_core::decode_address;
use bitcoin::Network;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        for network in [Network::Bitcoin, Network::Testnet, Network::Regtest] {
            if let Ok(decoded) = decode_address(s, network) {
                assert!(decoded.program.len() == 20 || decoded.program.len() == 32);
            }
        }
    }
});
