//! Fuzz target for glob compilation and matching.
//!
//! Run with: cargo +nightly fuzz run fuzz_glob_match
//!
//! The first byte picks a split point dividing the input into a pattern and
//! a path. Compilation may fail; neither compilation nor matching may panic.

#![no_main]

use ctxpack_core::glob::GlobPattern;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let split = first as usize % (rest.len() + 1);
    let (pattern, path) = rest.split_at(split);
    let (Ok(pattern), Ok(path)) = (std::str::from_utf8(pattern), std::str::from_utf8(path)) else {
        return;
    };

    if let Ok(glob) = GlobPattern::new(pattern) {
        let _ = glob.is_match(path);
    }
});
