//! Relocation tables of the contents section.
//!
//! Pointer-sized fields in object data are stored as placeholders; the real
//! value lives in one of three fixup tables that follow the section data:
//!
//! | Table   | Record (u32s)                         | Terminator / bound          |
//! |---------|---------------------------------------|-----------------------------|
//! | local   | source, target                        | `0xFFFFFFFF`, global offset |
//! | global  | source, target section, target        | `0xFFFFFFFF`, virtual offset|
//! | virtual | source, class section, class name off | `0xFFFFFFFF`, exports offset|
//!
//! Local and global records are merged into one map keyed by source offset
//! (relative to the contents section).  Virtual records are not relocations
//! of fields but the list of object instances to decode; they are kept in
//! file order.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TagfileError};
use crate::header::Header;
use crate::stream::ByteStream;

/// Sentinel for "no address": unrelocated pointer fields and empty arrays.
pub const ABSENT: u32 = 0xFFFF_FFFF;

const LOCAL_RECORD_SIZE:   u64 = 8;
const GLOBAL_RECORD_SIZE:  u64 = 12;
const VIRTUAL_RECORD_SIZE: u64 = 12;

/// One recorded relocation.  `section` is `None` for local fixups, meaning
/// the target lives in the same section as the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Fixup {
    pub target:  u32,
    pub section: Option<u32>,
}

/// One object instance: its offset in the contents section and the offset
/// of its class name in the class-names section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VirtualFixup {
    pub offset:            u32,
    pub section:           u32,
    pub class_name_offset: u32,
}

#[derive(Debug, Clone, Default)]
pub struct FixupTable {
    fixups:         HashMap<u32, Fixup>,
    virtual_fixups: Vec<VirtualFixup>,
    section_bases:  Vec<u32>,
}

impl FixupTable {
    pub fn new(section_bases: Vec<u32>) -> Self {
        Self { section_bases, ..Self::default() }
    }

    /// Scan the three fixup tables of the contents section.
    pub fn read(stream: &mut ByteStream<'_>, header: &Header) -> Result<Self> {
        let mut table = Self::new(header.section_bases());
        let section_count = header.sections.len() as u32;
        let contents = header.contents_section();

        // ── Local ───────────────────────────────────────────────────────────
        stream.seek(contents.absolute(contents.local_fixups_offset)?);
        let end = contents.absolute(contents.global_fixups_offset)?;
        while fits(stream, LOCAL_RECORD_SIZE, end) {
            let source = stream.read_u32()?;
            let target = stream.read_u32()?;
            if source == ABSENT || target == ABSENT {
                break;
            }
            table.insert(source, Fixup { target, section: None });
        }
        let local_count = table.fixups.len();

        // ── Global ──────────────────────────────────────────────────────────
        stream.seek(contents.absolute(contents.global_fixups_offset)?);
        let end = contents.absolute(contents.virtual_fixups_offset)?;
        while fits(stream, GLOBAL_RECORD_SIZE, end) {
            let source = stream.read_u32()?;
            if source == ABSENT {
                break;
            }
            let section = stream.read_u32()?;
            let target  = stream.read_u32()?;
            if section >= section_count {
                return Err(TagfileError::InvalidFormat(format!(
                    "global fixup at {source:#x} targets section {section} of {section_count}"
                )));
            }
            table.insert(source, Fixup { target, section: Some(section) });
        }

        // ── Virtual ─────────────────────────────────────────────────────────
        stream.seek(contents.absolute(contents.virtual_fixups_offset)?);
        let end = contents.absolute(contents.exports_offset)?;
        while fits(stream, VIRTUAL_RECORD_SIZE, end) {
            let offset = stream.read_u32()?;
            let section = stream.read_u32()?;
            if offset == ABSENT {
                break;
            }
            let class_name_offset = stream.read_u32()?;
            table.virtual_fixups.push(VirtualFixup { offset, section, class_name_offset });
        }

        debug!(
            local = local_count,
            global = table.fixups.len() - local_count,
            objects = table.virtual_fixups.len(),
            "read fixup tables"
        );
        Ok(table)
    }

    pub fn insert(&mut self, source: u32, fixup: Fixup) {
        self.fixups.insert(source, fixup);
    }

    pub fn get(&self, source: u32) -> Option<&Fixup> {
        self.fixups.get(&source)
    }

    /// Number of local + global relocations.
    pub fn len(&self) -> usize {
        self.fixups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixups.is_empty()
    }

    pub fn virtual_fixups(&self) -> &[VirtualFixup] {
        &self.virtual_fixups
    }

    pub fn section_base(&self, section: u32) -> Result<u32> {
        self.section_bases.get(section as usize).copied().ok_or_else(|| {
            TagfileError::InvalidFormat(format!("no section with index {section}"))
        })
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    /// Resolve the pointer field at the stream's absolute position, owned by
    /// `section`.  Always consumes the 4-byte field.  Returns [`ABSENT`] when
    /// no relocation is recorded there.
    pub fn resolve(&self, stream: &mut ByteStream<'_>, section: u32) -> Result<u32> {
        let base = u64::from(self.section_base(section)?);
        let key = stream.pos().checked_sub(base).and_then(|k| u32::try_from(k).ok());
        let resolved = match key {
            Some(key) => self.resolve_key(key, section)?,
            None      => ABSENT,
        };
        stream.skip(4)?;
        Ok(resolved)
    }

    /// Like [`resolve`](Self::resolve) for a stream whose position 0 is the
    /// start of `section` (a section sub-stream).
    pub fn resolve_relative(&self, stream: &mut ByteStream<'_>, section: u32) -> Result<u32> {
        let resolved = match u32::try_from(stream.pos()) {
            Ok(key) => self.resolve_key(key, section)?,
            Err(_)  => ABSENT,
        };
        stream.skip(4)?;
        Ok(resolved)
    }

    /// Absolute address for the field at `key` (relative to `section`).
    pub fn resolve_key(&self, key: u32, section: u32) -> Result<u32> {
        let Some(fixup) = self.fixups.get(&key) else {
            return Ok(ABSENT);
        };
        if fixup.target == 0 {
            return Err(TagfileError::InvalidFixup { offset: key });
        }
        let base = self.section_base(fixup.section.unwrap_or(section))?;
        fixup.target.checked_add(base).ok_or_else(|| {
            TagfileError::InvalidFormat(format!("fixup at {key:#x} overflows the address space"))
        })
    }
}

/// Whether a `size`-byte record starting at the cursor ends at or before
/// `end` and is backed by data.
fn fits(stream: &ByteStream<'_>, size: u64, end: u64) -> bool {
    stream.remaining() >= size && stream.pos() + size <= end
}

// ── hkArray ──────────────────────────────────────────────────────────────────

/// On-disk array descriptor: relocated data pointer, element count and the
/// capacity/flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HkArray {
    pub offset:             u32,
    pub count:              u32,
    pub capacity_and_flags: u32,
}

impl HkArray {
    pub const SIZE: u64 = 12;

    pub fn new(offset: u32, count: u32) -> Self {
        Self { offset, count, capacity_and_flags: 0 }
    }

    pub fn read(stream: &mut ByteStream<'_>, fixups: &FixupTable, section: u32) -> Result<Self> {
        Ok(Self {
            offset:             fixups.resolve(stream, section)?,
            count:              stream.read_u32()?,
            capacity_and_flags: stream.read_u32()?,
        })
    }

    /// Whether the array has no elements to read, whatever its declared count.
    pub fn is_empty(&self) -> bool {
        self.offset == ABSENT || self.count == 0
    }
}
