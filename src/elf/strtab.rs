// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! NUL-terminated string lookup inside a string table section.

use super::{slice, ElfError, Result, Section};

/// A string table, addressed by offset relative to the start of the section.
#[derive(Debug, Clone, Copy)]
pub struct StringTable<'a> {
    data: &'a [u8],
}

impl<'a> StringTable<'a> {
    /// Borrow the bytes of `section` from the image buffer.
    ///
    /// # Errors
    /// Returns `OutOfBounds` if the section does not fit the buffer.
    pub fn new(bytes: &'a [u8], section: &Section) -> Result<Self> {
        Ok(Self {
            data: slice(bytes, section.offset, section.size)?,
        })
    }

    /// Size of the table in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the string starting at `offset`.
    ///
    /// # Errors
    /// Returns `InvalidString` if `offset` is outside the table or the string is not terminated
    /// before the table ends.
    pub fn get(&self, offset: u64) -> Result<String> {
        let invalid = || ElfError::InvalidString { offset };
        let start = usize::try_from(offset)
            .ok()
            .filter(|start| *start < self.data.len())
            .ok_or_else(invalid)?;
        let tail = &self.data[start..];
        let end = tail.iter().position(|b| *b == 0).ok_or_else(invalid)?;
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    /// Find an offset at which `value` is already stored as a NUL-terminated string.
    ///
    /// Suffixes of longer strings count, the same way linkers share string tails.
    #[must_use]
    pub fn find(&self, value: &str) -> Option<u64> {
        let mut needle = Vec::with_capacity(value.len() + 1);
        needle.extend_from_slice(value.as_bytes());
        needle.push(0);
        self.data
            .windows(needle.len())
            .position(|window| window == needle.as_slice())
            .map(|position| position as u64)
    }
}
