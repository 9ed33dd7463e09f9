// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Helpers for colon-separated `RUNPATH`/`RPATH` strings.
//!
//! The dynamic linker substitutes `$ORIGIN` (or `${ORIGIN}`) with the directory containing the
//! binary. Entries that are relative and do not start with `$ORIGIN` are resolved against the
//! process's current working directory, which is unknown ahead of time and allows binary
//! planting. Those entries are reported by [`invalid_entries`] and skipped by [`directories`].

use path_clean::PathClean;
use std::path::{Path, PathBuf};

/// Split a `RUNPATH` string into its entries, dropping empty ones.
#[must_use]
pub fn entries(runpath: &str) -> Vec<&str> {
    runpath.split(':').filter(|entry| !entry.is_empty()).collect()
}

/// Check if an entry would be resolved relative to the current working directory.
///
/// Absolute entries and entries starting with `$ORIGIN`/`${ORIGIN}` are fine. Anything before
/// `$ORIGIN` in a relative entry is resolved against the CWD first, so `../$ORIGIN/lib` is not.
#[must_use]
pub fn is_cwd_relative(entry: &str) -> bool {
    if entry.starts_with('/') {
        return false;
    }
    !(entry.starts_with("$ORIGIN") || entry.starts_with("${ORIGIN}"))
}

/// Entries of `runpath` that are resolved relative to the current working directory.
#[must_use]
pub fn invalid_entries(runpath: &str) -> Vec<&str> {
    entries(runpath)
        .into_iter()
        .filter(|entry| is_cwd_relative(entry))
        .collect()
}

/// Substitute `$ORIGIN` in `entry` and clean the result.
///
/// Returns `None` if the entry is still relative afterwards.
#[must_use]
pub fn expand_origin(entry: &str, origin: &Path) -> Option<PathBuf> {
    // The patterns are mutually exclusive (different chars after `$`).
    let resolved = if entry.contains("${ORIGIN}") {
        entry.replace("${ORIGIN}", &origin.to_string_lossy())
    } else if entry.contains("$ORIGIN") {
        entry.replace("$ORIGIN", &origin.to_string_lossy())
    } else {
        entry.to_string()
    };

    if resolved.starts_with('/') {
        return Some(PathBuf::from(resolved).clean());
    }
    None
}

/// Absolute search directories of `runpath` for a binary located in `origin`, in order.
#[must_use]
pub fn directories(runpath: &str, origin: &Path) -> Vec<PathBuf> {
    entries(runpath)
        .into_iter()
        .filter(|entry| !is_cwd_relative(entry))
        .filter_map(|entry| expand_origin(entry, origin))
        .collect()
}
