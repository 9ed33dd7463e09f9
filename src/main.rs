// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.
mod args;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use args::Args;
use runpath_patcher::report::{summarize_report, Report};
use runpath_patcher::{patch, runpath, ElfImage, PatchOptions, Patched, Resolver};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let image = read_image(&args.file)?;
    let needed = image
        .needed()
        .with_context(|| format!("Failed to read dependencies: {}", args.file.display()))?;
    let existing = image
        .runpath()
        .with_context(|| format!("Failed to read RUNPATH: {}", args.file.display()))?;

    let resolver = Resolver::new(&args.search_root).with_context(|| {
        format!("Failed to index search root: {}", args.search_root.display())
    })?;
    let mut resolution = resolver.resolve(&needed, &existing);
    resolution.locate_in_runpath(&origin(&args.file));

    let patched = match args.runpath.as_deref() {
        Some(new_runpath) if !args.view_only => {
            let patched = patch_image(&image, new_runpath, &args)?;
            let dest = output_path(&args);
            write_output(&args.file, &dest, &patched.bytes)?;
            Some(patched)
        }
        _ => None,
    };

    let report = Report::new(
        &args.file,
        &image,
        resolver.root(),
        &resolution,
        patched.as_ref().map(|patched| &patched.plan),
    )?;
    if let Some(dest) = &args.report {
        write_report_to_file(&report, dest)?;
    }
    summarize_report(&report);
    Ok(())
}

/// Read and parse the input binary.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a supported ELF image.
fn read_image(path: &Path) -> Result<ElfImage> {
    eprintln!("Reading ELF file: file={}", path.display());
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    ElfImage::parse(bytes).with_context(|| format!("Failed to parse ELF file: {}", path.display()))
}

/// The absolute directory `$ORIGIN` expands to for `file`.
fn origin(file: &Path) -> PathBuf {
    std::path::absolute(file)
        .ok()
        .and_then(|path| path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("/"))
}

fn patch_image(image: &ElfImage, new_runpath: &str, args: &Args) -> Result<Patched> {
    for entry in runpath::invalid_entries(new_runpath) {
        warn!("RUNPATH entry is resolved relative to the working directory: entry={entry}");
    }

    let options = PatchOptions {
        allow_growth: args.allow_grow,
    };
    let patched = patch(image, new_runpath, options)
        .with_context(|| format!("Failed to patch RUNPATH: {}", args.file.display()))?;
    eprintln!(
        "Patched RUNPATH: file={}, runpath={new_runpath}, size={}",
        args.file.display(),
        patched.bytes.len()
    );
    Ok(patched)
}

fn output_path(args: &Args) -> PathBuf {
    if args.in_place {
        return args.file.clone();
    }
    args.output.clone().unwrap_or_else(|| {
        let mut name = args.file.clone().into_os_string();
        name.push(".patched");
        PathBuf::from(name)
    })
}

/// Write the patched binary next to its destination and move it into place.
///
/// Nothing is written to `dest` unless the whole buffer was written. The file keeps the
/// permissions of `source`.
///
/// # Errors
/// Returns an error if the temporary file cannot be created, written or persisted.
fn write_output(source: &Path, dest: &Path, bytes: &[u8]) -> Result<()> {
    eprintln!("Writing patched file: file={}", dest.display());
    let dir = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in: {}", dir.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("Failed to write patched file: {}", dest.display()))?;

    let permissions = fs::metadata(source)
        .with_context(|| format!("Failed to read permissions: {}", source.display()))?
        .permissions();
    fs::set_permissions(file.path(), permissions)
        .with_context(|| format!("Failed to set permissions: {}", dest.display()))?;

    file.persist(dest)
        .with_context(|| format!("Failed to move patched file into place: {}", dest.display()))?;
    Ok(())
}

/// Write the report to a file.
///
/// # Errors
/// Returns an error if the report cannot be serialized to JSON or if the file cannot be created.
fn write_report_to_file(report: &Report<'_>, dest: &Path) -> Result<()> {
    eprintln!("Writing report to file: file={}", dest.display());
    let file = File::create(dest)
        .with_context(|| format!("Failed to create JSON output file: {}", dest.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("Failed to serialize report to JSON: {}", dest.display()))?;
    Ok(())
}
