// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runpath_patcher")]
#[command(version)]
#[command(about = "Lists the dependencies of an ELF binary and rewrites its RUNPATH")]
pub(crate) struct Args {
    /// Path to the ELF binary to inspect.
    pub file: PathBuf,

    /// New RUNPATH, a colon-separated list of directories.
    #[arg(required_unless_present = "view_only")]
    pub runpath: Option<String>,

    /// Directory whose first-level subdirectories hold the libraries to resolve against.
    #[arg(long, default_value = "/lib")]
    pub search_root: PathBuf,

    /// Where to write the patched binary. Defaults to `<FILE>.patched`.
    #[arg(long, conflicts_with = "in_place")]
    pub output: Option<PathBuf>,

    /// Replace the input file instead of writing a new one.
    #[arg(long)]
    pub in_place: bool,

    /// Only list and resolve the dependencies, do not patch.
    #[arg(long)]
    pub view_only: bool,

    #[arg(
        long,
        long_help = "Grow the string table or the dynamic section when they have no room left.\n\
                Without this flag, patching fails instead. Growing shifts every byte after\n\
                the grown section but not its virtual addresses: the result keeps consistent\n\
                headers but usually does not load."
    )]
    pub allow_grow: bool,

    /// Path to the file to write the results in JSON format.
    #[arg(long)]
    pub report: Option<PathBuf>,
}
