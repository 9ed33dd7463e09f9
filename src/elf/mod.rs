// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Parses ELF images into an offset-addressed view of their section and program header tables,
//! and reads `DT_NEEDED`, `DT_RPATH` and `DT_RUNPATH` strings from the dynamic section.
//! Uses the `goblin` crate for header and table decoding.

mod codec;
mod dynamic;
#[cfg(test)]
pub(crate) mod fixture;
mod strtab;

use goblin::container::{Container, Ctx, Endian};
use goblin::elf::header::{
    EI_CLASS, EI_DATA, ELFCLASS32, ELFCLASS64, ELFDATA2LSB, ELFDATA2MSB, ELFMAG, SELFMAG,
    SIZEOF_IDENT,
};
use goblin::elf::section_header::{SHN_XINDEX, SHT_DYNAMIC, SHT_NOBITS, SHT_STRTAB};
use goblin::elf::{Elf as GoblinElf, ProgramHeader, SectionHeader};
use goblin::strtab::Strtab;
use serde::Serialize;
use thiserror::Error;

pub use codec::{Class, Endianness, Layout};
pub(crate) use codec::{slice, slice_mut};
pub use dynamic::{DynamicEntry, DynamicTable, DynamicTag};
pub use strtab::StringTable;

pub(crate) type Result<T> = std::result::Result<T, ElfError>;

/// Errors that can occur when parsing ELF images.
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("Failed to parse ELF image: {reason}")]
    Parse { reason: String },
    #[error("Failed to parse ELF {what}")]
    ParseFailed {
        what: &'static str,
        #[source]
        source: goblin::error::Error,
    },
    #[error("Unsupported ELF class/encoding: EI_CLASS={class}, EI_DATA={data}")]
    UnsupportedClass { class: u8, data: u8 },
    #[error("Range {offset:#x}+{size:#x} exceeds the image size {len:#x}")]
    OutOfBounds { offset: u64, size: u64, len: u64 },
    #[error("Missing section: {name}")]
    MissingSection { name: &'static str },
    #[error("String table offset {offset:#x} does not point at a NUL-terminated string")]
    InvalidString { offset: u64 },
    #[error("Value {value:#x} does not fit in a 32-bit ELF word")]
    WordTooWide { value: u64 },
}

/// ELF file type (wrapper around `goblin::elf::header::e_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElfType {
    None,
    Relocatable,
    Executable,
    SharedObject,
    Core,
    Other(u16),
}

impl From<u16> for ElfType {
    fn from(e_type: u16) -> Self {
        match e_type {
            goblin::elf::header::ET_NONE => Self::None,
            goblin::elf::header::ET_REL => Self::Relocatable,
            goblin::elf::header::ET_EXEC => Self::Executable,
            goblin::elf::header::ET_DYN => Self::SharedObject,
            goblin::elf::header::ET_CORE => Self::Core,
            other => Self::Other(other),
        }
    }
}

/// A section header, addressed by its position in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub index: usize,
    pub name: String,
    pub kind: u32,
    pub offset: u64,
    pub size: u64,
    pub link: u32,
    pub entsize: u64,
    pub align: u64,
    /// File offset of this section's header inside the section header table.
    pub header_offset: u64,
}

impl Section {
    /// File offset one past the section's last byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        // Checked during parsing.
        self.offset + self.size
    }

    /// Whether the section occupies bytes in the file.
    #[must_use]
    pub fn has_file_data(&self) -> bool {
        self.kind != SHT_NOBITS
    }
}

/// A program header, addressed by its position in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub index: usize,
    pub kind: u32,
    pub offset: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
    /// File offset of this segment's header inside the program header table.
    pub header_offset: u64,
}

impl Segment {
    /// File offset one past the segment's last file byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        // Checked during parsing.
        self.offset + self.filesz
    }

    /// Whether the segment's file range fully covers `section`.
    #[must_use]
    pub fn contains(&self, section: &Section) -> bool {
        self.offset <= section.offset && section.end() <= self.end()
    }
}

/// An ELF image: the raw bytes plus the parsed header tables, referenced by offset.
///
/// The buffer is owned, never borrowed by the parsed tables, so it can be copied, mutated and
/// re-parsed independently.
#[derive(Debug, Clone)]
pub struct ElfImage {
    bytes: Vec<u8>,
    layout: Layout,
    kind: ElfType,
    phoff: u64,
    shoff: u64,
    sections: Vec<Section>,
    segments: Vec<Segment>,
}

impl ElfImage {
    /// Parse an ELF image.
    ///
    /// # Errors
    /// Returns an error if the identification bytes are malformed, the class or encoding is not
    /// supported, or any header table, section or segment lies outside the buffer.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let layout = Self::identify(&bytes)?;
        let header = GoblinElf::parse_header(&bytes).map_err(|e| ElfError::ParseFailed {
            what: "header",
            source: e,
        })?;
        let ctx = Ctx::new(
            match layout.class {
                Class::Elf32 => Container::Little,
                Class::Elf64 => Container::Big,
            },
            match layout.endianness {
                Endianness::Little => Endian::Little,
                Endianness::Big => Endian::Big,
            },
        );

        let segments = Self::parse_segments(&bytes, &header, layout, ctx)?;
        let sections = Self::parse_sections(&bytes, &header, layout, ctx)?;

        Ok(Self {
            kind: ElfType::from(header.e_type),
            phoff: header.e_phoff,
            shoff: header.e_shoff,
            bytes,
            layout,
            sections,
            segments,
        })
    }

    /// Read the identification bytes and reject anything we cannot decode faithfully.
    fn identify(bytes: &[u8]) -> Result<Layout> {
        if bytes.len() < SIZEOF_IDENT {
            return Err(ElfError::Parse {
                reason: format!("file is too small to be an ELF file ({} bytes)", bytes.len()),
            });
        }
        if &bytes[..SELFMAG] != ELFMAG {
            return Err(ElfError::Parse {
                reason: "bad ELF magic".to_string(),
            });
        }
        let (class, data) = (bytes[EI_CLASS], bytes[EI_DATA]);
        let unsupported = || ElfError::UnsupportedClass { class, data };
        let class = match class {
            ELFCLASS32 => Class::Elf32,
            ELFCLASS64 => Class::Elf64,
            _ => return Err(unsupported()),
        };
        let endianness = match data {
            ELFDATA2LSB => Endianness::Little,
            ELFDATA2MSB => Endianness::Big,
            _ => return Err(unsupported()),
        };
        let layout = Layout::new(class, endianness);
        if (bytes.len() as u64) < layout.ehdr_size() {
            return Err(ElfError::Parse {
                reason: format!("file is too small for an ELF header ({} bytes)", bytes.len()),
            });
        }
        Ok(layout)
    }

    fn parse_segments(
        bytes: &[u8],
        header: &goblin::elf::Header,
        layout: Layout,
        ctx: Ctx,
    ) -> Result<Vec<Segment>> {
        let count = u64::from(header.e_phnum);
        if count == 0 {
            return Ok(Vec::new());
        }
        if u64::from(header.e_phentsize) != layout.phdr_size() {
            return Err(ElfError::Parse {
                reason: format!("unexpected program header size {}", header.e_phentsize),
            });
        }
        // Reject the table before goblin touches it.
        slice(bytes, header.e_phoff, count * layout.phdr_size())?;
        let phdrs = ProgramHeader::parse(bytes, header.e_phoff as usize, count as usize, ctx)
            .map_err(|e| ElfError::ParseFailed {
                what: "program headers",
                source: e,
            })?;

        phdrs
            .iter()
            .enumerate()
            .map(|(index, phdr)| {
                slice(bytes, phdr.p_offset, phdr.p_filesz)?;
                Ok(Segment {
                    index,
                    kind: phdr.p_type,
                    offset: phdr.p_offset,
                    filesz: phdr.p_filesz,
                    memsz: phdr.p_memsz,
                    align: phdr.p_align,
                    header_offset: header.e_phoff + index as u64 * layout.phdr_size(),
                })
            })
            .collect()
    }

    fn parse_sections(
        bytes: &[u8],
        header: &goblin::elf::Header,
        layout: Layout,
        ctx: Ctx,
    ) -> Result<Vec<Section>> {
        if header.e_shoff == 0 {
            return Ok(Vec::new());
        }
        if u64::from(header.e_shentsize) != layout.shdr_size() {
            return Err(ElfError::Parse {
                reason: format!("unexpected section header size {}", header.e_shentsize),
            });
        }
        // The null section header may carry the real count, so check it first.
        slice(bytes, header.e_shoff, layout.shdr_size())?;
        let shdrs = SectionHeader::parse(
            bytes,
            header.e_shoff as usize,
            usize::from(header.e_shnum),
            ctx,
        )
        .map_err(|e| ElfError::ParseFailed {
            what: "section headers",
            source: e,
        })?;
        slice(
            bytes,
            header.e_shoff,
            shdrs.len() as u64 * layout.shdr_size(),
        )?;

        for shdr in shdrs.iter().filter(|shdr| shdr.sh_type != SHT_NOBITS) {
            slice(bytes, shdr.sh_offset, shdr.sh_size)?;
        }

        let shstrndx = if u32::from(header.e_shstrndx) == SHN_XINDEX {
            shdrs.first().map_or(0, |null| null.sh_link as usize)
        } else {
            usize::from(header.e_shstrndx)
        };
        let names = match shdrs.get(shstrndx) {
            Some(shdr) if shstrndx != 0 && shdr.sh_type == SHT_STRTAB => Some(
                Strtab::parse(bytes, shdr.sh_offset as usize, shdr.sh_size as usize, 0x0)
                    .map_err(|e| ElfError::ParseFailed {
                        what: "section name table",
                        source: e,
                    })?,
            ),
            _ => None,
        };

        Ok(shdrs
            .iter()
            .enumerate()
            .map(|(index, shdr)| Section {
                index,
                name: names
                    .as_ref()
                    .and_then(|names| names.get_at(shdr.sh_name))
                    .unwrap_or_default()
                    .to_string(),
                kind: shdr.sh_type,
                offset: shdr.sh_offset,
                size: shdr.sh_size,
                link: shdr.sh_link,
                entsize: shdr.sh_entsize,
                align: shdr.sh_addralign,
                header_offset: header.e_shoff + index as u64 * layout.shdr_size(),
            })
            .collect())
    }

    /// Get the raw bytes of the image.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Give back the raw bytes, e.g. to mutate and re-parse them.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Get the ELF file type (executable, shared object, etc.).
    #[must_use]
    pub fn kind(&self) -> ElfType {
        self.kind
    }

    /// File offset of the program header table, if there is one.
    #[must_use]
    pub fn phoff(&self) -> Option<u64> {
        (!self.segments.is_empty()).then_some(self.phoff)
    }

    /// File offset of the section header table, if there is one.
    #[must_use]
    pub fn shoff(&self) -> Option<u64> {
        (!self.sections.is_empty()).then_some(self.shoff)
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    #[must_use]
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    /// Get the `SHT_DYNAMIC` section.
    ///
    /// # Errors
    /// Returns `MissingSection` if the image has no dynamic section.
    pub fn dynamic_section(&self) -> Result<&Section> {
        self.sections
            .iter()
            .find(|section| section.kind == SHT_DYNAMIC)
            .ok_or(ElfError::MissingSection { name: ".dynamic" })
    }

    /// Find the string table used by the dynamic section.
    ///
    /// Prefers the table named by the dynamic section's `sh_link` and falls back to `.dynstr`.
    #[must_use]
    pub fn find_dynamic_string_table(&self) -> Option<&Section> {
        self.dynamic_section()
            .ok()
            .and_then(|dynamic| self.section(dynamic.link as usize))
            .filter(|section| section.index != 0 && section.kind == SHT_STRTAB)
            .or_else(|| {
                self.section_by_name(".dynstr")
                    .filter(|section| section.kind == SHT_STRTAB)
            })
    }

    /// Get the string table used by the dynamic section.
    ///
    /// # Errors
    /// Returns `MissingSection` if no such string table exists.
    pub fn dynamic_string_table(&self) -> Result<&Section> {
        self.find_dynamic_string_table()
            .ok_or(ElfError::MissingSection { name: ".dynstr" })
    }

    /// Read the dynamic entry table.
    ///
    /// # Errors
    /// Returns an error if there is no dynamic section or its entries cannot be read.
    pub fn dynamic_table(&self) -> Result<DynamicTable> {
        DynamicTable::read(self, self.dynamic_section()?)
    }

    /// Collect the strings referenced by every dynamic entry with the given tag, in entry order.
    ///
    /// A tag that is not present yields an empty vector.
    ///
    /// # Errors
    /// Returns `MissingSection` if the dynamic section or its string table is absent, and
    /// `InvalidString` if an entry points outside the string table.
    pub fn dynamic_strings(&self, tag: DynamicTag) -> Result<Vec<String>> {
        let table = self.dynamic_table()?;
        let strings = StringTable::new(self.bytes(), self.dynamic_string_table()?)?;
        table
            .entries()
            .iter()
            .filter(|entry| entry.tag == tag)
            .map(|entry| strings.get(entry.value))
            .collect()
    }

    /// Get the list of dynamic dependencies (`DT_NEEDED` entries).
    ///
    /// # Errors
    /// See [`ElfImage::dynamic_strings`].
    pub fn needed(&self) -> Result<Vec<String>> {
        self.dynamic_strings(DynamicTag::Needed)
    }

    /// Get the `DT_RUNPATH` string, or an empty string if the image has none.
    ///
    /// # Errors
    /// See [`ElfImage::dynamic_strings`].
    pub fn runpath(&self) -> Result<String> {
        Ok(self
            .dynamic_strings(DynamicTag::RunPath)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Get the `DT_RPATH` string, or an empty string if the image has none.
    ///
    /// # Errors
    /// See [`ElfImage::dynamic_strings`].
    pub fn rpath(&self) -> Result<String> {
        Ok(self
            .dynamic_strings(DynamicTag::RPath)?
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}
