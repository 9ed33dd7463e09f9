// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Endian- and class-aware access to fixed-width ELF fields inside a byte buffer.

use serde::Serialize;

use super::{ElfError, Result};

/// ELF file class (`EI_CLASS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Class {
    Elf32,
    Elf64,
}

/// ELF data encoding (`EI_DATA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endianness {
    Little,
    Big,
}

/// Class and endianness of an image, plus the positions of the header fields we patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layout {
    pub class: Class,
    pub endianness: Endianness,
}

impl Layout {
    #[must_use]
    pub const fn new(class: Class, endianness: Endianness) -> Self {
        Self { class, endianness }
    }

    /// Size of an address/offset word (`Elf32_Addr` or `Elf64_Addr`).
    #[must_use]
    pub const fn word_size(self) -> u64 {
        match self.class {
            Class::Elf32 => 4,
            Class::Elf64 => 8,
        }
    }

    /// Size of one `ElfN_Dyn` entry.
    #[must_use]
    pub const fn dyn_size(self) -> u64 {
        2 * self.word_size()
    }

    #[must_use]
    pub const fn ehdr_size(self) -> u64 {
        match self.class {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        }
    }

    #[must_use]
    pub const fn phdr_size(self) -> u64 {
        match self.class {
            Class::Elf32 => 32,
            Class::Elf64 => 56,
        }
    }

    #[must_use]
    pub const fn shdr_size(self) -> u64 {
        match self.class {
            Class::Elf32 => 40,
            Class::Elf64 => 64,
        }
    }

    pub(crate) const fn ehdr_phoff(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x1c,
            Class::Elf64 => 0x20,
        }
    }

    pub(crate) const fn ehdr_shoff(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x20,
            Class::Elf64 => 0x28,
        }
    }

    pub(crate) const fn shdr_offset(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x10,
            Class::Elf64 => 0x18,
        }
    }

    pub(crate) const fn shdr_size_field(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x14,
            Class::Elf64 => 0x20,
        }
    }

    pub(crate) const fn phdr_offset(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x04,
            Class::Elf64 => 0x08,
        }
    }

    pub(crate) const fn phdr_filesz(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x10,
            Class::Elf64 => 0x20,
        }
    }

    pub(crate) const fn phdr_memsz(self) -> u64 {
        match self.class {
            Class::Elf32 => 0x14,
            Class::Elf64 => 0x28,
        }
    }

    /// Check whether `value` is representable in a native word.
    #[must_use]
    pub fn fits_word(self, value: u64) -> bool {
        match self.class {
            Class::Elf32 => u32::try_from(value).is_ok(),
            Class::Elf64 => true,
        }
    }

    pub(crate) fn read_u32(self, bytes: &[u8], offset: u64) -> Result<u32> {
        let raw: [u8; 4] = field(bytes, offset)?;
        Ok(match self.endianness {
            Endianness::Little => u32::from_le_bytes(raw),
            Endianness::Big => u32::from_be_bytes(raw),
        })
    }

    pub(crate) fn read_u64(self, bytes: &[u8], offset: u64) -> Result<u64> {
        let raw: [u8; 8] = field(bytes, offset)?;
        Ok(match self.endianness {
            Endianness::Little => u64::from_le_bytes(raw),
            Endianness::Big => u64::from_be_bytes(raw),
        })
    }

    /// Read a native word, widened to `u64`.
    pub(crate) fn read_word(self, bytes: &[u8], offset: u64) -> Result<u64> {
        match self.class {
            Class::Elf32 => self.read_u32(bytes, offset).map(u64::from),
            Class::Elf64 => self.read_u64(bytes, offset),
        }
    }

    /// Write a native word.
    ///
    /// # Errors
    /// Returns `WordTooWide` if the value does not fit an `Elf32` word and `OutOfBounds` if the
    /// field is not inside the buffer.
    pub(crate) fn write_word(self, bytes: &mut [u8], offset: u64, value: u64) -> Result<()> {
        match self.class {
            Class::Elf32 => {
                let value = u32::try_from(value).map_err(|_| ElfError::WordTooWide { value })?;
                let raw = match self.endianness {
                    Endianness::Little => value.to_le_bytes(),
                    Endianness::Big => value.to_be_bytes(),
                };
                slice_mut(bytes, offset, 4)?.copy_from_slice(&raw);
            }
            Class::Elf64 => {
                let raw = match self.endianness {
                    Endianness::Little => value.to_le_bytes(),
                    Endianness::Big => value.to_be_bytes(),
                };
                slice_mut(bytes, offset, 8)?.copy_from_slice(&raw);
            }
        }
        Ok(())
    }

    /// Write a 16-bit field. Only used when synthesizing headers.
    #[cfg(test)]
    pub(crate) fn write_u16(self, bytes: &mut [u8], offset: u64, value: u16) -> Result<()> {
        let raw = match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        slice_mut(bytes, offset, 2)?.copy_from_slice(&raw);
        Ok(())
    }

    /// Write a 32-bit field. Only used when synthesizing headers.
    #[cfg(test)]
    pub(crate) fn write_u32(self, bytes: &mut [u8], offset: u64, value: u32) -> Result<()> {
        let raw = match self.endianness {
            Endianness::Little => value.to_le_bytes(),
            Endianness::Big => value.to_be_bytes(),
        };
        slice_mut(bytes, offset, 4)?.copy_from_slice(&raw);
        Ok(())
    }
}

/// Bounds-checked `[offset, offset + size)` view of `bytes`.
///
/// # Errors
/// Returns `OutOfBounds` if the range overflows or is not inside the buffer.
pub(crate) fn slice(bytes: &[u8], offset: u64, size: u64) -> Result<&[u8]> {
    let range = range(bytes.len(), offset, size)?;
    Ok(&bytes[range])
}

/// Bounds-checked mutable view, see [`slice`].
pub(crate) fn slice_mut(bytes: &mut [u8], offset: u64, size: u64) -> Result<&mut [u8]> {
    let range = range(bytes.len(), offset, size)?;
    Ok(&mut bytes[range])
}

fn range(len: usize, offset: u64, size: u64) -> Result<std::ops::Range<usize>> {
    let out_of_bounds = || ElfError::OutOfBounds {
        offset,
        size,
        len: len as u64,
    };
    let end = offset.checked_add(size).ok_or_else(out_of_bounds)?;
    if end > len as u64 {
        return Err(out_of_bounds());
    }
    // Both values are bounded by `len`, which is a `usize`.
    Ok(offset as usize..end as usize)
}

fn field<const N: usize>(bytes: &[u8], offset: u64) -> Result<[u8; N]> {
    let mut raw = [0u8; N];
    raw.copy_from_slice(slice(bytes, offset, N as u64)?);
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LE64: Layout = Layout::new(Class::Elf64, Endianness::Little);
    const BE32: Layout = Layout::new(Class::Elf32, Endianness::Big);

    #[test]
    fn test_word_round_trip_little_endian() {
        let mut bytes = vec![0u8; 16];
        LE64.write_word(&mut bytes, 8, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(bytes[8], 0x88);
        assert_eq!(LE64.read_word(&bytes, 8).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_word_big_endian_32() {
        let mut bytes = vec![0u8; 8];
        BE32.write_word(&mut bytes, 4, 0xdead_beef).unwrap();
        assert_eq!(&bytes[4..], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(BE32.read_word(&bytes, 4).unwrap(), 0xdead_beef);
    }

    #[test]
    fn test_word_too_wide_for_elf32() {
        let mut bytes = vec![0u8; 8];
        let result = BE32.write_word(&mut bytes, 0, u64::from(u32::MAX) + 1);
        assert!(matches!(result, Err(ElfError::WordTooWide { .. })));
        assert_eq!(bytes, vec![0u8; 8]);
    }

    #[test]
    fn test_read_past_end_is_out_of_bounds() {
        let bytes = vec![0u8; 6];
        assert!(matches!(
            LE64.read_u64(&bytes, 0),
            Err(ElfError::OutOfBounds { .. })
        ));
        assert!(matches!(
            slice(&bytes, u64::MAX, 2),
            Err(ElfError::OutOfBounds { .. })
        ));
    }
}
