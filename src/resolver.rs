// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Resolves `DT_NEEDED` names against a search root holding one level of library directories.
//!
//! The root is flattened into a name -> paths index once. Every match is kept, in subdirectory
//! order, so duplicates across subdirectories all show up and the caller decides precedence.

use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::runpath;

type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that can occur when indexing a search root.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to read search root: {path:?}")]
    SearchRootUnreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Search root is not a directory: {path:?}")]
    SearchRootNotDirectory { path: PathBuf },
    #[error("Failed to make search root absolute: {path:?}")]
    AbsolutePathFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyStatus {
    Found,   // At least one candidate exists in the search root.
    Missing, // No file with that name in any subdirectory; not an error.
}

/// Resolution of a single dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyResolution {
    pub name: String,
    pub status: DependencyStatus,
    /// Absolute paths of every match, in subdirectory order.
    pub candidates: Vec<PathBuf>,
    /// First `RUNPATH` directory holding the dependency, if looked up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runpath_match: Option<PathBuf>,
}

/// Dependencies in input order, plus the binary's existing `RUNPATH` (empty if absent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub runpath: String,
    pub dependencies: Vec<DependencyResolution>,
}

impl ResolutionResult {
    /// Candidates for `name`, or `None` if it was not part of the request.
    #[must_use]
    pub fn candidates(&self, name: &str) -> Option<&[PathBuf]> {
        self.dependencies
            .iter()
            .find(|dependency| dependency.name == name)
            .map(|dependency| dependency.candidates.as_slice())
    }

    /// Number of dependencies without any candidate.
    #[must_use]
    pub fn missing(&self) -> usize {
        self.dependencies
            .iter()
            .filter(|dependency| dependency.status == DependencyStatus::Missing)
            .count()
    }

    /// Look every dependency up in the `RUNPATH` directories of a binary located in `origin`.
    ///
    /// Entries resolved relative to the current working directory are skipped. The first
    /// directory containing the name wins, the same order the dynamic linker searches.
    pub fn locate_in_runpath(&mut self, origin: &Path) {
        let directories = runpath::directories(&self.runpath, origin);
        // Cannot be parallelized without losing the search order per dependency; the lists are
        // small anyway.
        for dependency in &mut self.dependencies {
            dependency.runpath_match = directories
                .iter()
                .map(|directory| directory.join(&dependency.name))
                .find(|path| path.exists());
        }
    }
}

/// A flattened index of a search root.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    index: HashMap<String, Vec<PathBuf>>,
}

impl Resolver {
    /// Index the non-directory entries of every first-level subdirectory of `root`.
    ///
    /// Subdirectories are visited in file name order. Below the root, symlinks are not followed,
    /// so a symlinked library counts as a candidate but a symlinked directory is not descended
    /// into. The root itself may be a symlink, as `/lib` is on merged-usr systems.
    ///
    /// # Errors
    /// Returns `SearchRootUnreadable` if `root` cannot be listed and `SearchRootNotDirectory` if
    /// it is not a directory. Unreadable subdirectories are logged and skipped.
    pub fn new(root: &Path) -> Result<Self> {
        let root = std::path::absolute(root).map_err(|e| ResolveError::AbsolutePathFailed {
            path: root.to_path_buf(),
            source: e,
        })?;

        // Errors are left to the walker, which reports them as `SearchRootUnreadable`.
        if let Ok(metadata) = std::fs::metadata(&root) {
            if !metadata.is_dir() {
                return Err(ResolveError::SearchRootNotDirectory { path: root });
            }
        }

        let mut index: HashMap<String, Vec<PathBuf>> = HashMap::new();
        let walker = WalkDir::new(&root)
            .min_depth(0)
            .max_depth(2)
            .follow_links(false)
            .follow_root_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(ResolveError::SearchRootUnreadable { path: root, source: e });
                }
                Err(e) => {
                    warn!("Skipping unreadable library directory: error={e}");
                    continue;
                }
            };
            if entry.depth() == 2 && !entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                index
                    .entry(name)
                    .or_default()
                    .push(entry.into_path());
            }
        }

        info!(
            "Indexed search root: root={}, libraries={}",
            root.display(),
            index.len()
        );
        Ok(Self { root, index })
    }

    /// Absolute path of the indexed search root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Match every dependency by exact file name.
    ///
    /// The result keeps the order of `dependencies`. A dependency without matches is
    /// `Missing`, never an error.
    #[must_use]
    pub fn resolve(&self, dependencies: &[String], runpath: &str) -> ResolutionResult {
        let dependencies = dependencies
            .par_iter()
            .map(|name| {
                let candidates = self.index.get(name).cloned().unwrap_or_default();
                DependencyResolution {
                    name: name.clone(),
                    status: if candidates.is_empty() {
                        DependencyStatus::Missing
                    } else {
                        DependencyStatus::Found
                    },
                    candidates,
                    runpath_match: None,
                }
            })
            .collect();
        ResolutionResult {
            runpath: runpath.to_string(),
            dependencies,
        }
    }
}
