#![no_main]

use addrdeck_core::keys::{format_path, parse_path};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(path) = parse_path(s) {
            let text = format_path(&path);
            assert_eq!(parse_path(&text).expect("formatted path parses"), path);
        }
    }
});
