// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Rewrites the `DT_RUNPATH` entry of an ELF image into a new, complete buffer.
//!
//! The new string is appended to `.dynstr` (or reused if the table already holds it); the start
//! of the table is never overwritten. When the table or the dynamic section has no room left and
//! growing is allowed, the section grows and everything behind it shifts, see [`grow`].

mod grow;

use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::elf::{slice_mut, DynamicTag, ElfError, ElfImage, StringTable};

type Result<T> = std::result::Result<T, PatchError>;

/// Errors that can occur when patching an ELF image.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("No dynamic string table (.dynstr) found")]
    NoStringTable,
    #[error("No dynamic entry slot available for DT_RUNPATH and growing is disabled")]
    NoRunpathSlot,
    #[error("String table needs {needed} bytes, {available} are free and growing is disabled")]
    InsufficientSpace { needed: u64, available: u64 },
    #[error("Shifted offset does not fit the ELF class")]
    OffsetOverflow,
    #[error("RUNPATH must not contain NUL bytes")]
    InvalidRunpath,
    #[error("Elf error: {0}")]
    Elf(#[from] ElfError),
}

/// Knobs for [`patch`].
///
/// The default only patches in place and fails with `NoRunpathSlot` or `InsufficientSpace`
/// when there is no room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// Allow growing `.dynstr` or `.dynamic` when they have no room left.
    ///
    /// Growing shifts file offsets but not virtual addresses, so the output parses but a grown
    /// binary may fail to load.
    pub allow_growth: bool,
}

/// Where the new RUNPATH string ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StringPlacement {
    /// The table already contained the string.
    Reused,
    /// Written into zeroed bytes after the table.
    Slack,
    /// The table grew; `by` bytes were inserted into the file.
    Grown { by: u64 },
}

/// Which dynamic entry now carries `DT_RUNPATH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunpathSlot {
    Existing { index: usize },
    /// A `DT_RPATH` entry was turned into `DT_RUNPATH`.
    ConvertedRpath { index: usize },
    /// The terminator slot was reused, and the following spare slot became the terminator.
    SpareNull { index: usize },
    /// The dynamic section grew by `by` bytes to make room.
    Grown { index: usize, by: u64 },
}

impl RunpathSlot {
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Existing { index }
            | Self::ConvertedRpath { index }
            | Self::SpareNull { index }
            | Self::Grown { index, .. } => *index,
        }
    }
}

/// What a patch did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchPlan {
    pub runpath: String,
    /// File offset of the string's first byte in the output.
    pub insertion_offset: u64,
    /// Offset of the string inside `.dynstr`, i.e. the new `DT_RUNPATH` value.
    pub value: u64,
    pub placement: StringPlacement,
    pub slot: RunpathSlot,
}

/// The patched image and the plan that produced it.
#[derive(Debug, Clone)]
pub struct Patched {
    pub bytes: Vec<u8>,
    pub plan: PatchPlan,
}

/// Produce a copy of `image` whose `DT_RUNPATH` is `runpath`.
///
/// The input image is left untouched. Everything except the string table tail, the dynamic entry
/// slots, and (when a section grows) the shifted bytes and offset fields is byte-identical.
///
/// # Errors
/// Returns `NoStringTable` if there is no `.dynstr`, `NoRunpathSlot` or `InsufficientSpace` if
/// room is needed and growing is disabled, and `OffsetOverflow` if growing overflows a field.
pub fn patch(image: &ElfImage, runpath: &str, options: PatchOptions) -> Result<Patched> {
    if runpath.as_bytes().contains(&0) {
        return Err(PatchError::InvalidRunpath);
    }
    image
        .find_dynamic_string_table()
        .ok_or(PatchError::NoStringTable)?;
    image.dynamic_section()?;

    let working = image.clone();
    let (working, slot) = choose_slot(working, options)?;
    let (working, placement, value) = place_string(working, runpath, options)?;

    let layout = working.layout();
    let table = working.dynamic_table()?;
    let dynstr = working.dynamic_string_table()?;
    let insertion_offset = dynstr.offset + value;
    let strsz = (placement != StringPlacement::Reused)
        .then(|| table.find(DynamicTag::StrSz).map(|entry| (entry.index, dynstr.size)))
        .flatten();

    let mut writes = vec![
        (table.entry_offset(slot.index()), u64::from(DynamicTag::RunPath)),
        (table.entry_offset(slot.index()) + layout.word_size(), value),
    ];
    if matches!(slot, RunpathSlot::SpareNull { .. } | RunpathSlot::Grown { .. }) {
        let terminator = slot.index() + 1;
        writes.push((table.entry_offset(terminator), u64::from(DynamicTag::Null)));
        writes.push((table.entry_offset(terminator) + layout.word_size(), 0));
    }
    if let Some((index, size)) = strsz {
        writes.push((table.entry_offset(index) + layout.word_size(), size));
    }
    if !writes.iter().all(|(_, value)| layout.fits_word(*value)) {
        return Err(PatchError::OffsetOverflow);
    }

    let mut bytes = working.into_bytes();
    grow::apply(layout, &mut bytes, &writes)?;

    let plan = PatchPlan {
        runpath: runpath.to_string(),
        insertion_offset,
        value,
        placement,
        slot,
    };
    if matches!(placement, StringPlacement::Grown { .. })
        || matches!(slot, RunpathSlot::Grown { .. })
    {
        warn!(
            "Patched binary may not load after growing: slot={slot:?}, placement={placement:?}"
        );
    }
    debug!("Patched RUNPATH: plan={plan:?}");
    Ok(Patched { bytes, plan })
}

/// Pick the dynamic entry that will hold `DT_RUNPATH`, growing `.dynamic` if needed.
fn choose_slot(image: ElfImage, options: PatchOptions) -> Result<(ElfImage, RunpathSlot)> {
    let table = image.dynamic_table()?;
    if let Some(entry) = table.find(DynamicTag::RunPath) {
        let index = entry.index;
        return Ok((image, RunpathSlot::Existing { index }));
    }
    if let Some(entry) = table.find(DynamicTag::RPath) {
        let index = entry.index;
        return Ok((image, RunpathSlot::ConvertedRpath { index }));
    }

    let index = table.terminator().ok_or_else(|| ElfError::Parse {
        reason: "dynamic section has no DT_NULL terminator".to_string(),
    })?;
    if index + 1 < table.capacity() {
        return Ok((image, RunpathSlot::SpareNull { index }));
    }
    if !options.allow_growth {
        return Err(PatchError::NoRunpathSlot);
    }

    let dynamic = image.dynamic_section()?.index;
    let entry_size = image.layout().dyn_size();
    let (image, by) = grow::grow_section(image, dynamic, entry_size)?;
    Ok((image, RunpathSlot::Grown { index, by }))
}

/// Make sure `.dynstr` holds `runpath` and return its offset inside the table.
fn place_string(
    image: ElfImage,
    runpath: &str,
    options: PatchOptions,
) -> Result<(ElfImage, StringPlacement, u64)> {
    let section = image
        .find_dynamic_string_table()
        .cloned()
        .ok_or(PatchError::NoStringTable)?;
    if let Some(value) = StringTable::new(image.bytes(), &section)?.find(runpath) {
        return Ok((image, StringPlacement::Reused, value));
    }

    let needed = runpath.len() as u64 + 1;
    let value = section.size;
    let available = grow::slack_after(&image, &section);
    let (image, placement) = if needed <= available {
        let layout = image.layout();
        let mut bytes = image.into_bytes();
        grow::apply(
            layout,
            &mut bytes,
            &[(section.header_offset + layout.shdr_size_field(), section.size + needed)],
        )?;
        (ElfImage::parse(bytes)?, StringPlacement::Slack)
    } else if options.allow_growth {
        let (image, by) = grow::grow_section(image, section.index, needed)?;
        (image, StringPlacement::Grown { by })
    } else {
        return Err(PatchError::InsufficientSpace { needed, available });
    };

    // The section did not move: only bytes behind its end were shifted.
    let mut bytes = image.into_bytes();
    let target = slice_mut(&mut bytes, section.end(), needed)?;
    target[..runpath.len()].copy_from_slice(runpath.as_bytes());
    target[runpath.len()] = 0;
    Ok((ElfImage::parse(bytes)?, placement, value))
}
