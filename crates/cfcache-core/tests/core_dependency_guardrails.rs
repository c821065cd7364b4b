// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::PathBuf;

#[test]
fn core_crate_has_no_logging_async_or_numeric_deps() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cargo_toml = manifest_dir.join("Cargo.toml");
    let text = fs::read_to_string(cargo_toml).expect("read Cargo.toml");

    for forbidden in ["tokio", "reqwest", "tracing", "num-complex", "cfcache-store"] {
        assert!(
            !text.contains(forbidden),
            "forbidden dependency/token in core Cargo.toml: {forbidden}"
        );
    }
}

#[test]
fn core_source_does_not_touch_the_filesystem() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let lib = fs::read_to_string(manifest_dir.join("src/lib.rs")).expect("read src/lib.rs");
    assert!(
        !lib.contains("std::fs"),
        "cfcache-core must stay free of filesystem access"
    );
}
