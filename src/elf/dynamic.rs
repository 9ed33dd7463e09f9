// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Dynamic section entries, read slot by slot from the section's file range.

use goblin::elf::dynamic::{DT_NEEDED, DT_NULL, DT_RPATH, DT_RUNPATH, DT_STRSZ, DT_STRTAB};
use serde::Serialize;

use super::{ElfError, ElfImage, Result, Section};

/// Dynamic entry tags this crate cares about; everything else is kept verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DynamicTag {
    Null,
    Needed,
    StrTab,
    StrSz,
    RPath,
    RunPath,
    Other(u64),
}

impl From<u64> for DynamicTag {
    fn from(tag: u64) -> Self {
        match tag {
            DT_NULL => Self::Null,
            DT_NEEDED => Self::Needed,
            DT_STRTAB => Self::StrTab,
            DT_STRSZ => Self::StrSz,
            DT_RPATH => Self::RPath,
            DT_RUNPATH => Self::RunPath,
            other => Self::Other(other),
        }
    }
}

impl From<DynamicTag> for u64 {
    fn from(tag: DynamicTag) -> Self {
        match tag {
            DynamicTag::Null => DT_NULL,
            DynamicTag::Needed => DT_NEEDED,
            DynamicTag::StrTab => DT_STRTAB,
            DynamicTag::StrSz => DT_STRSZ,
            DynamicTag::RPath => DT_RPATH,
            DynamicTag::RunPath => DT_RUNPATH,
            DynamicTag::Other(other) => other,
        }
    }
}

/// One `(tag, value)` slot of the dynamic section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DynamicEntry {
    pub index: usize,
    pub tag: DynamicTag,
    pub value: u64,
}

/// The dynamic section's slots, including any spare slots after the terminating `DT_NULL`.
#[derive(Debug, Clone)]
pub struct DynamicTable {
    offset: u64,
    entry_size: u64,
    slots: Vec<DynamicEntry>,
    terminator: Option<usize>,
}

impl DynamicTable {
    pub(crate) fn read(image: &ElfImage, section: &Section) -> Result<Self> {
        let layout = image.layout();
        let entry_size = layout.dyn_size();
        if section.entsize != 0 && section.entsize != entry_size {
            return Err(ElfError::Parse {
                reason: format!("unexpected dynamic entry size {}", section.entsize),
            });
        }

        let bytes = image.bytes();
        let count = section.size / entry_size;
        let mut slots = Vec::new();
        for index in 0..count {
            let offset = section.offset + index * entry_size;
            slots.push(DynamicEntry {
                index: index as usize,
                tag: DynamicTag::from(layout.read_word(bytes, offset)?),
                value: layout.read_word(bytes, offset + layout.word_size())?,
            });
        }
        let terminator = slots.iter().position(|slot| slot.tag == DynamicTag::Null);

        Ok(Self {
            offset: section.offset,
            entry_size,
            slots,
            terminator,
        })
    }

    /// Live entries, up to (excluding) the terminating `DT_NULL`.
    #[must_use]
    pub fn entries(&self) -> &[DynamicEntry] {
        &self.slots[..self.terminator.unwrap_or(self.slots.len())]
    }

    /// Number of slots the section can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the terminating `DT_NULL`, if any.
    #[must_use]
    pub fn terminator(&self) -> Option<usize> {
        self.terminator
    }

    /// First live entry with the given tag.
    #[must_use]
    pub fn find(&self, tag: DynamicTag) -> Option<&DynamicEntry> {
        self.entries().iter().find(|entry| entry.tag == tag)
    }

    /// File offset of the slot at `index`.
    #[must_use]
    pub fn entry_offset(&self, index: usize) -> u64 {
        self.offset + index as u64 * self.entry_size
    }
}
