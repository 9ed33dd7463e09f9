// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Growing a section in place by shifting everything behind it.
//!
//! Only file offsets move. Virtual addresses are left alone, so a grown image keeps consistent
//! metadata but content that moved inside a loadable segment no longer sits at its old address.

use log::debug;

use super::{PatchError, Result};
use crate::elf::{ElfImage, Layout, Section};

/// Number of zeroed bytes directly after `section` that no other section, segment or header
/// table claims, and that stay inside every segment covering the section's end.
pub(super) fn slack_after(image: &ElfImage, section: &Section) -> u64 {
    let end = section.end();
    let mut limit = image.len();

    for other in image.sections() {
        if other.index != section.index && other.has_file_data() && other.offset >= end {
            limit = limit.min(other.offset);
        }
    }
    for segment in image.segments() {
        if segment.offset >= end {
            limit = limit.min(segment.offset);
        } else if segment.end() >= end {
            limit = limit.min(segment.end());
        }
    }
    for table in [image.phoff(), image.shoff()].into_iter().flatten() {
        if table >= end {
            limit = limit.min(table);
        }
    }

    image.bytes()[end as usize..limit as usize]
        .iter()
        .take_while(|b| **b == 0)
        .count() as u64
}

/// Grow the section at `index` by at least `needed` bytes, inserted at its end.
///
/// The insertion is rounded up to the largest alignment among everything that moves, so shifted
/// sections and segments keep their alignment. Returns the re-parsed image and the number of
/// bytes inserted. The grown section's recorded size increases by exactly `needed`.
///
/// # Errors
/// Returns `OffsetOverflow` if any shifted offset or size no longer fits the ELF class.
pub(super) fn grow_section(image: ElfImage, index: usize, needed: u64) -> Result<(ElfImage, u64)> {
    let layout = image.layout();
    let section = image
        .section(index)
        .cloned()
        .ok_or(PatchError::NoStringTable)?;
    let at = section.end();

    let moved_sections: Vec<&Section> = image
        .sections()
        .iter()
        .filter(|other| other.index != index && other.offset >= at)
        .collect();
    let (grown_segments, moved_segments): (Vec<_>, Vec<_>) = image
        .segments()
        .iter()
        .filter(|segment| segment.contains(&section) || segment.offset >= at)
        .partition(|segment| segment.contains(&section));
    let phoff = image.phoff().filter(|phoff| *phoff >= at);
    let shoff = image.shoff().filter(|shoff| *shoff >= at);

    let align = moved_sections
        .iter()
        .map(|other| other.align)
        .chain(moved_segments.iter().map(|segment| segment.align))
        .chain(phoff.map(|_| layout.word_size()))
        .chain(shoff.map(|_| layout.word_size()))
        .fold(1, u64::max);
    let by = needed
        .checked_next_multiple_of(align)
        .ok_or(PatchError::OffsetOverflow)?;

    // Compute every new field before touching the buffer, so failures leave nothing behind.
    let shift = |value: u64| value.checked_add(by).ok_or(PatchError::OffsetOverflow);
    let header = |position: u64, table_moved: bool| {
        if table_moved {
            shift(position)
        } else {
            Ok(position)
        }
    };
    let mut writes: Vec<(u64, u64)> = Vec::new();
    for other in &moved_sections {
        writes.push((
            header(other.header_offset, shoff.is_some())? + layout.shdr_offset(),
            shift(other.offset)?,
        ));
    }
    writes.push((
        header(section.header_offset, shoff.is_some())? + layout.shdr_size_field(),
        section
            .size
            .checked_add(needed)
            .ok_or(PatchError::OffsetOverflow)?,
    ));
    for segment in &moved_segments {
        writes.push((
            header(segment.header_offset, phoff.is_some())? + layout.phdr_offset(),
            shift(segment.offset)?,
        ));
    }
    for segment in &grown_segments {
        let position = header(segment.header_offset, phoff.is_some())?;
        writes.push((position + layout.phdr_filesz(), shift(segment.filesz)?));
        writes.push((position + layout.phdr_memsz(), shift(segment.memsz)?));
    }
    if let Some(phoff) = phoff {
        writes.push((layout.ehdr_phoff(), shift(phoff)?));
    }
    if let Some(shoff) = shoff {
        writes.push((layout.ehdr_shoff(), shift(shoff)?));
    }
    let new_len = shift(image.len())?;
    if !writes.iter().all(|(_, value)| layout.fits_word(*value))
        || usize::try_from(new_len).is_err()
    {
        return Err(PatchError::OffsetOverflow);
    }

    debug!(
        "Growing section: section={}, at={at:#x}, inserted={by}, sections={}, segments={}",
        section.name,
        moved_sections.len(),
        moved_segments.len()
    );

    let mut bytes = image.into_bytes();
    // `at` is within the buffer because section ranges were checked during parsing.
    let at = at as usize;
    bytes.splice(at..at, std::iter::repeat(0u8).take(by as usize));
    apply(layout, &mut bytes, &writes)?;

    Ok((ElfImage::parse(bytes)?, by))
}

/// Write native words at the given file offsets.
pub(super) fn apply(layout: Layout, bytes: &mut [u8], writes: &[(u64, u64)]) -> Result<()> {
    for (position, value) in writes {
        layout.write_word(bytes, *position, *value)?;
    }
    Ok(())
}
