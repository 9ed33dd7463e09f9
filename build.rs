// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Build script to generate test fixtures for the `runpath_patcher` crate.
//!
//! Compiles a small binary linked against `libm` with gcc, once with a `DT_RUNPATH`, once with a
//! `DT_RPATH` and once without either. The fixtures land in `$OUT_DIR/fixtures`, which is
//! exported to the tests as `RUNPATH_PATCHER_FIXTURES`.
//!
//! If gcc is not available, the script skips the fixtures and emits a warning. Tests will
//! gracefully skip when fixtures are missing.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Check if a command is available in PATH.
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let fixtures_dir = Path::new(&out_dir).join("fixtures");
    fs::create_dir_all(&fixtures_dir).expect("Failed to create fixtures directory");
    println!(
        "cargo:rustc-env=RUNPATH_PATCHER_FIXTURES={}",
        fixtures_dir.display()
    );
    println!("cargo:rerun-if-changed=build.rs");

    if command_exists("gcc") {
        generate_elf_fixtures(&fixtures_dir);
    } else {
        println!("cargo:warning=gcc is missing. ELF test fixtures will not be generated.");
    }
}

/// Generate ELF test files with various RPATH/RUNPATH settings.
fn generate_elf_fixtures(fixtures_dir: &Path) {
    let source_path = fixtures_dir.join("test_binary.c");
    // `cos` on a volatile keeps the libm dependency from being folded away.
    let source_code = r#"#include <math.h>
#include <stdio.h>
int main() {
    volatile double x = 1.0;
    printf("%f\n", cos(x));
    return 0;
}
"#;
    fs::write(&source_path, source_code).expect("Failed to write test source");

    let elf_fixtures = [
        (
            "test-elf-runpath.elf",
            "-Wl,--enable-new-dtags,-rpath,/opt/old/lib",
        ),
        (
            "test-elf-rpath.elf",
            "-Wl,--disable-new-dtags,-rpath,/opt/old/lib",
        ),
        ("test-elf-no-runpath.elf", "-Wl,--disable-new-dtags"),
    ];

    for (filename, linker_flags) in elf_fixtures {
        let dest_path = fixtures_dir.join(filename);
        let status = Command::new("gcc")
            .args([
                "-o",
                dest_path.to_str().unwrap(),
                source_path.to_str().unwrap(),
                "-Wl,--no-as-needed",
                "-lm",
                linker_flags,
            ])
            .status();

        if status.map(|s| !s.success()).unwrap_or(true) {
            println!("cargo:warning=Failed to compile {filename}, skipping");
            let _ = fs::remove_file(&dest_path);
        }
    }
}
