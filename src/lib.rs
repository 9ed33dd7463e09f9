// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! A tool for inspecting and rewriting the RUNPATH of ELF binaries.
//!
//! This crate provides functionality to:
//! - Read `DT_NEEDED`, `DT_RPATH` and `DT_RUNPATH` from an ELF image
//! - Resolve dependencies against a directory of library subdirectories
//! - Produce a patched copy of the image with a new `DT_RUNPATH`
//! - Generate reports on dependency status and the applied patch

pub mod elf;
pub mod patch;
pub mod report;
pub mod resolver;
pub mod runpath;

// Re-export key types for convenience
pub use elf::{ElfError, ElfImage, ElfType};
pub use patch::{patch, PatchError, PatchOptions, PatchPlan, Patched};
pub use report::Report;
pub use resolver::{ResolutionResult, ResolveError, Resolver};
