//! Build script for tether-core
//!
//! Checks the toolchain before compilation: Rust 1.75 or newer.

fn main()
{
    println!("cargo:rerun-if-changed=build.rs");

    let Ok(found) = rustc_version::version() else {
        // Some build environments hide rustc; don't fail the build over it.
        println!("cargo:warning=could not verify Rust version");
        return;
    };

    let minimum = rustc_version::Version::new(1, 75, 0);
    assert!(
        found >= minimum,
        "tether-core requires Rust {minimum} or newer, found {found}"
    );
}
