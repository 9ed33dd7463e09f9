// Copyright (C) 2026 Checkmk GmbH - License: GNU General Public License v2
// This file is part of Checkmk (https://checkmk.com). It is subject to the terms and
// conditions defined in the file COPYING, which is part of this source code package.

//! Synthesizes small dynamically linked ELF images for tests.
//!
//! The file is laid out as: ELF header, program headers (`PT_LOAD` over the whole file and
//! `PT_DYNAMIC`), `.dynstr`, optional zeroed slack, `.dynamic`, `.shstrtab`, section headers.
//! Virtual addresses equal file offsets.

use goblin::elf::dynamic::{DT_NEEDED, DT_RPATH, DT_RUNPATH, DT_STRSZ, DT_STRTAB};
use goblin::elf::header::{ELFCLASS32, ELFCLASS64, ELFDATA2LSB, ELFDATA2MSB, ELFMAG, ET_EXEC};
use goblin::elf::program_header::{PT_DYNAMIC, PT_LOAD};
use goblin::elf::section_header::{SHT_DYNAMIC, SHT_STRTAB};

use super::{Class, Endianness, Layout};

pub(crate) struct ElfBuilder {
    layout: Layout,
    needed: Vec<String>,
    rpath: Option<String>,
    runpath: Option<String>,
    spare_slots: usize,
    dynstr_slack: usize,
    dynamic: bool,
}

impl ElfBuilder {
    pub(crate) fn new() -> Self {
        Self {
            layout: Layout::new(Class::Elf64, Endianness::Little),
            needed: Vec::new(),
            rpath: None,
            runpath: None,
            spare_slots: 0,
            dynstr_slack: 0,
            dynamic: true,
        }
    }

    pub(crate) fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub(crate) fn needed(mut self, needed: &[&str]) -> Self {
        self.needed = needed.iter().map(ToString::to_string).collect();
        self
    }

    pub(crate) fn rpath(mut self, rpath: &str) -> Self {
        self.rpath = Some(rpath.to_string());
        self
    }

    pub(crate) fn runpath(mut self, runpath: &str) -> Self {
        self.runpath = Some(runpath.to_string());
        self
    }

    /// Extra `DT_NULL` slots after the terminator.
    pub(crate) fn spare_slots(mut self, count: usize) -> Self {
        self.spare_slots = count;
        self
    }

    /// Zeroed bytes between the end of `.dynstr` and the next section.
    pub(crate) fn dynstr_slack(mut self, bytes: usize) -> Self {
        self.dynstr_slack = bytes;
        self
    }

    pub(crate) fn without_dynamic(mut self) -> Self {
        self.dynamic = false;
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let layout = self.layout;
        let word = layout.word_size();
        let phnum: u64 = if self.dynamic { 2 } else { 1 };
        let phoff = layout.ehdr_size();

        // .dynstr
        let dynstr_off = phoff + phnum * layout.phdr_size();
        let mut dynstr = vec![0u8];
        let mut push = |value: &str| {
            let offset = dynstr.len() as u64;
            dynstr.extend_from_slice(value.as_bytes());
            dynstr.push(0);
            offset
        };
        let needed: Vec<u64> = self.needed.iter().map(|name| push(name)).collect();
        let rpath = self.rpath.as_deref().map(&mut push);
        let runpath = self.runpath.as_deref().map(&mut push);
        let dynstr_size = dynstr.len() as u64;

        // .dynamic
        let mut entries: Vec<(u64, u64)> = needed.iter().map(|off| (DT_NEEDED, *off)).collect();
        entries.push((DT_STRTAB, dynstr_off));
        entries.push((DT_STRSZ, dynstr_size));
        entries.extend(rpath.map(|off| (DT_RPATH, off)));
        entries.extend(runpath.map(|off| (DT_RUNPATH, off)));
        entries.extend(std::iter::repeat((0, 0)).take(1 + self.spare_slots));
        let dynamic_off = align_up(dynstr_off + dynstr_size + self.dynstr_slack as u64, word);
        let dynamic_size = if self.dynamic {
            entries.len() as u64 * layout.dyn_size()
        } else {
            0
        };

        // .shstrtab
        let shstrtab: &[u8] = b"\0.dynstr\0.dynamic\0.shstrtab\0";
        let shstrtab_off = dynamic_off + dynamic_size;
        let shoff = align_up(shstrtab_off + shstrtab.len() as u64, 8);
        let shnum: u64 = if self.dynamic { 4 } else { 3 };
        let total = shoff + shnum * layout.shdr_size();

        let mut bytes = vec![0u8; total as usize];
        self.write_header(&mut bytes, phoff, phnum, shoff, shnum);

        self.write_phdr(&mut bytes, phoff, (PT_LOAD, 0, total, 0x1000));
        if self.dynamic {
            self.write_phdr(
                &mut bytes,
                phoff + layout.phdr_size(),
                (PT_DYNAMIC, dynamic_off, dynamic_size, word),
            );
        }

        let start = dynstr_off as usize;
        bytes[start..start + dynstr.len()].copy_from_slice(&dynstr);
        if self.dynamic {
            for (index, (tag, value)) in entries.iter().enumerate() {
                let offset = dynamic_off + index as u64 * layout.dyn_size();
                layout.write_word(&mut bytes, offset, *tag).unwrap();
                layout.write_word(&mut bytes, offset + word, *value).unwrap();
            }
        }
        let start = shstrtab_off as usize;
        bytes[start..start + shstrtab.len()].copy_from_slice(shstrtab);

        let mut shdr = shoff + layout.shdr_size();
        // name, type, flags, addr, offset, size, link, addralign, entsize
        self.write_shdr(
            &mut bytes,
            shdr,
            [1, u64::from(SHT_STRTAB), 2, dynstr_off, dynstr_off, dynstr_size, 0, 1, 0],
        );
        shdr += layout.shdr_size();
        if self.dynamic {
            self.write_shdr(
                &mut bytes,
                shdr,
                [
                    9,
                    u64::from(SHT_DYNAMIC),
                    3,
                    dynamic_off,
                    dynamic_off,
                    dynamic_size,
                    1,
                    word,
                    layout.dyn_size(),
                ],
            );
            shdr += layout.shdr_size();
        }
        self.write_shdr(
            &mut bytes,
            shdr,
            [
                18,
                u64::from(SHT_STRTAB),
                0,
                0,
                shstrtab_off,
                shstrtab.len() as u64,
                0,
                1,
                0,
            ],
        );
        bytes
    }

    fn write_header(&self, bytes: &mut [u8], phoff: u64, phnum: u64, shoff: u64, shnum: u64) {
        let layout = self.layout;
        bytes[..4].copy_from_slice(ELFMAG);
        bytes[4] = match layout.class {
            Class::Elf32 => ELFCLASS32,
            Class::Elf64 => ELFCLASS64,
        };
        bytes[5] = match layout.endianness {
            Endianness::Little => ELFDATA2LSB,
            Endianness::Big => ELFDATA2MSB,
        };
        bytes[6] = 1;
        let machine = match layout.class {
            Class::Elf32 => 3,
            Class::Elf64 => 62,
        };
        layout.write_u16(bytes, 16, ET_EXEC).unwrap();
        layout.write_u16(bytes, 18, machine).unwrap();
        layout.write_u32(bytes, 20, 1).unwrap();
        layout.write_word(bytes, layout.ehdr_phoff(), phoff).unwrap();
        layout.write_word(bytes, layout.ehdr_shoff(), shoff).unwrap();
        let ehsize = layout.ehdr_shoff() + layout.word_size() + 4;
        let u16_fields = [
            layout.ehdr_size(),
            layout.phdr_size(),
            phnum,
            layout.shdr_size(),
            shnum,
            shnum - 1,
        ];
        for (i, value) in u16_fields.iter().enumerate() {
            layout
                .write_u16(bytes, ehsize + 2 * i as u64, *value as u16)
                .unwrap();
        }
    }

    fn write_phdr(
        &self,
        bytes: &mut [u8],
        at: u64,
        (kind, offset, size, align): (u32, u64, u64, u64),
    ) {
        let layout = self.layout;
        let flags = 6;
        layout.write_u32(bytes, at, kind).unwrap();
        match layout.class {
            Class::Elf32 => {
                for (field, value) in [
                    (4, offset),
                    (8, offset),
                    (12, offset),
                    (16, size),
                    (20, size),
                    (28, align),
                ] {
                    layout.write_word(bytes, at + field, value).unwrap();
                }
                layout.write_u32(bytes, at + 24, flags).unwrap();
            }
            Class::Elf64 => {
                layout.write_u32(bytes, at + 4, flags).unwrap();
                for (field, value) in [
                    (8, offset),
                    (16, offset),
                    (24, offset),
                    (32, size),
                    (40, size),
                    (48, align),
                ] {
                    layout.write_word(bytes, at + field, value).unwrap();
                }
            }
        }
    }

    fn write_shdr(&self, bytes: &mut [u8], at: u64, fields: [u64; 9]) {
        let layout = self.layout;
        let [name, kind, flags, addr, offset, size, link, align, entsize] = fields;
        layout.write_u32(bytes, at, name as u32).unwrap();
        layout.write_u32(bytes, at + 4, kind as u32).unwrap();
        let word = layout.word_size();
        layout.write_word(bytes, at + 8, flags).unwrap();
        layout.write_word(bytes, at + 8 + word, addr).unwrap();
        layout.write_word(bytes, at + 8 + 2 * word, offset).unwrap();
        layout.write_word(bytes, at + 8 + 3 * word, size).unwrap();
        let link_at = at + 8 + 4 * word;
        layout.write_u32(bytes, link_at, link as u32).unwrap();
        layout.write_word(bytes, link_at + 8, align).unwrap();
        layout.write_word(bytes, link_at + 8 + word, entsize).unwrap();
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}
