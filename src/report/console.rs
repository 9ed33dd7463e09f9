// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Formats and prints report summaries to the console.

use comfy_table::{Attribute, Cell, Color, Table};

use super::Report;
use crate::patch::{PatchPlan, RunpathSlot, StringPlacement};
use crate::resolver::{DependencyStatus, ResolutionResult};

/// Summarize the report to the console.
///
/// Prints the file info, the resolution of every dependency and, if the file was patched,
/// what the patch changed.
pub fn summarize_report(report: &Report<'_>) {
    println!("File: {}", report.file);
    println!("Search root: {}", report.search_root.display());
    println!(
        "RUNPATH: {}\n",
        display_or_none(&report.resolution.runpath)
    );
    if !report.rpath.is_empty() {
        println!("RPATH: {}\n", report.rpath);
    }

    println!("{}\n", dependency_table(report.resolution));
    println!(
        "Total: {} dependencies, {} found, {} missing\n",
        report.totals.dependencies, report.totals.found, report.totals.missing
    );

    if !report.invalid_runpath_entries.is_empty() {
        println!(
            "RUNPATH entries relative to the working directory: {}\n",
            report.invalid_runpath_entries.join(", ")
        );
    }

    if let Some(plan) = report.patch {
        println!("{}", patch_table(plan));
    }
}

/// Create a table with the default preset styling.
fn default_table_preset() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL_CONDENSED)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table
}

fn header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(title).add_attribute(Attribute::Bold))
        .collect()
}

fn display_or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}

/// Create a table showing every dependency with its candidates.
fn dependency_table(resolution: &ResolutionResult) -> Table {
    let mut table = default_table_preset();
    table.set_header(header(&["Dependency", "Status", "Candidates", "Via RUNPATH"]));

    for dependency in &resolution.dependencies {
        let status = match dependency.status {
            DependencyStatus::Found => Cell::new("Found").fg(Color::Green),
            DependencyStatus::Missing => Cell::new("Missing").fg(Color::Red),
        };
        let candidates = dependency
            .candidates
            .iter()
            .map(|path| path.to_string_lossy())
            .collect::<Vec<_>>()
            .join("\n");
        let runpath_match = dependency
            .runpath_match
            .as_ref()
            .map_or_else(|| "-".to_string(), |path| path.to_string_lossy().to_string());
        table.add_row(vec![
            Cell::new(&dependency.name),
            status,
            Cell::new(candidates),
            Cell::new(runpath_match),
        ]);
    }
    table
}

/// Create a table showing where the new `RUNPATH` was written.
fn patch_table(plan: &PatchPlan) -> Table {
    let placement = match plan.placement {
        StringPlacement::Reused => "reused existing string".to_string(),
        StringPlacement::Slack => "written into free space".to_string(),
        StringPlacement::Grown { by } => format!("string table grown by {by} bytes"),
    };
    let slot = match plan.slot {
        RunpathSlot::Existing { index } => format!("replaced DT_RUNPATH (entry {index})"),
        RunpathSlot::ConvertedRpath { index } => {
            format!("converted DT_RPATH to DT_RUNPATH (entry {index})")
        }
        RunpathSlot::SpareNull { index } => format!("used spare entry {index}"),
        RunpathSlot::Grown { index, by } => {
            format!("dynamic section grown by {by} bytes (entry {index})")
        }
    };

    let mut table = default_table_preset();
    table
        .set_header(header(&["Patch", "Value"]))
        .add_row(vec![Cell::new("New RUNPATH"), Cell::new(&plan.runpath)])
        .add_row(vec![Cell::new("String"), Cell::new(placement)])
        .add_row(vec![
            Cell::new("String offset"),
            Cell::new(format!(
                "{:#x} (file offset {:#x})",
                plan.value, plan.insertion_offset
            )),
        ])
        .add_row(vec![Cell::new("Dynamic entry"), Cell::new(slot)]);
    table
}
