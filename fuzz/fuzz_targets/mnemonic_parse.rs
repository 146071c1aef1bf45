#![no_main]

use addrdeck_core::seed::{mnemonic_to_entropy, mnemonic_from_entropy, parse_mnemonic};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text must parse to Ok or Err, never panic. Anything that
    // parses must survive an entropy round trip.
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(mnemonic) = parse_mnemonic(s) {
            let entropy = mnemonic_to_entropy(&mnemonic);
            let again = mnemonic_from_entropy(&entropy).expect("entropy from a valid mnemonic");
            assert_eq!(again, mnemonic);
        }
    }
});
