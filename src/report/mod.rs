// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Report struct and public API for presenting resolution and patch results.

mod console;

pub use console::summarize_report;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::elf::{ElfImage, ElfType, Layout};
use crate::patch::PatchPlan;
use crate::resolver::{DependencyStatus, ResolutionResult};
use crate::runpath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ReportTotals {
    pub(crate) dependencies: usize,
    pub(crate) found: usize,
    pub(crate) missing: usize,
    pub(crate) found_in_runpath: usize,
}

impl ReportTotals {
    #[must_use]
    fn calculate(resolution: &ResolutionResult) -> Self {
        let dependencies = &resolution.dependencies;
        Self {
            dependencies: dependencies.len(),
            found: dependencies
                .iter()
                .filter(|dependency| dependency.status == DependencyStatus::Found)
                .count(),
            missing: resolution.missing(),
            found_in_runpath: dependencies
                .iter()
                .filter(|dependency| dependency.runpath_match.is_some())
                .count(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    file: String,
    kind: ElfType,
    layout: Layout,
    search_root: &'a Path,
    rpath: String,
    /// `RUNPATH` entries that the dynamic linker resolves against the current working directory.
    invalid_runpath_entries: Vec<&'a str>,
    totals: ReportTotals,
    resolution: &'a ResolutionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<&'a PatchPlan>,
}

impl<'a> Report<'a> {
    /// Create a new report.
    ///
    /// # Errors
    /// Returns an error if the `RPATH` of the image cannot be read.
    pub fn new(
        file: &Path,
        image: &ElfImage,
        search_root: &'a Path,
        resolution: &'a ResolutionResult,
        patch: Option<&'a PatchPlan>,
    ) -> Result<Self> {
        Ok(Self {
            file: file
                .canonicalize()
                .unwrap_or_else(|_| file.to_path_buf())
                .to_string_lossy()
                .to_string(),
            kind: image.kind(),
            layout: image.layout(),
            search_root,
            rpath: image
                .rpath()
                .with_context(|| format!("Failed to read RPATH: {}", file.display()))?,
            invalid_runpath_entries: runpath::invalid_entries(&resolution.runpath),
            totals: ReportTotals::calculate(resolution),
            resolution,
            patch,
        })
    }
}
