//! Packfile header and section table.
//!
//! # Layout
//! ```text
//! 0x00  magic0               u32   0x57E0E057
//! 0x04  magic1               u32   0x10C0C010
//! 0x08  user_tag             u32
//! 0x0C  file_version         u32
//! 0x10  layout_rules         [u8; 4]
//! 0x14  num_sections         u32
//! 0x18  contents_index       u32
//! 0x1C  contents_offset      u32
//! 0x20  class_names_index    u32
//! 0x24  class_names_offset   u32
//! 0x28  version              [u8; 15] + 1 pad
//! 0x38  flags                u32
//! 0x3C  reserved             u32
//! 0x40  sections             num_sections × 48 bytes
//! ```
//!
//! Each section record is a 19-byte name (+1 pad) followed by seven u32
//! fields: the absolute data start, then the local/global/virtual fixup,
//! exports, imports and end offsets, all relative to the data start.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, TagfileError};
use crate::stream::ByteStream;
use crate::tagfile::DecodeOptions;

pub const MAGIC: [u32; 2] = [0x57E0_E057, 0x10C0_C010];
pub const HEADER_SIZE: usize = 0x40;
pub const VERSION_FIELD_SIZE: usize = 15;
pub const SECTION_NAME_SIZE: usize = 19;
pub const SECTION_HEADER_SIZE: usize = 48;

// ── Version ──────────────────────────────────────────────────────────────────

/// Supported packfile versions.  The version picks the on-disk layout of
/// the versioned classes (skeleton, animation container) once, at header
/// parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HavokVersion {
    /// `Havok-5.5.0-r1`
    Havok550R1,
    /// `hk_2010.2.0-r1`
    Havok2010R1,
}

impl HavokVersion {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Havok-5.5.0-r1" => Some(HavokVersion::Havok550R1),
            "hk_2010.2.0-r1" => Some(HavokVersion::Havok2010R1),
            _                => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HavokVersion::Havok550R1  => "Havok-5.5.0-r1",
            HavokVersion::Havok2010R1 => "hk_2010.2.0-r1",
        }
    }
}

// ── Section ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name:                  String,
    pub absolute_data_start:   u32,
    pub local_fixups_offset:   u32,
    pub global_fixups_offset:  u32,
    pub virtual_fixups_offset: u32,
    pub exports_offset:        u32,
    pub imports_offset:        u32,
    pub end_offset:            u32,
}

impl Section {
    pub fn read(stream: &mut ByteStream<'_>) -> Result<Self> {
        let name = stream.read_fixed_string(SECTION_NAME_SIZE)?;
        stream.skip(1)?;
        Ok(Self {
            name,
            absolute_data_start:   stream.read_u32()?,
            local_fixups_offset:   stream.read_u32()?,
            global_fixups_offset:  stream.read_u32()?,
            virtual_fixups_offset: stream.read_u32()?,
            exports_offset:        stream.read_u32()?,
            imports_offset:        stream.read_u32()?,
            end_offset:            stream.read_u32()?,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write_fixed_string(&mut writer, &self.name, SECTION_NAME_SIZE + 1)?;
        writer.write_u32::<LittleEndian>(self.absolute_data_start)?;
        writer.write_u32::<LittleEndian>(self.local_fixups_offset)?;
        writer.write_u32::<LittleEndian>(self.global_fixups_offset)?;
        writer.write_u32::<LittleEndian>(self.virtual_fixups_offset)?;
        writer.write_u32::<LittleEndian>(self.exports_offset)?;
        writer.write_u32::<LittleEndian>(self.imports_offset)?;
        writer.write_u32::<LittleEndian>(self.end_offset)?;
        Ok(())
    }

    /// Absolute file offset of a position given relative to this section.
    pub fn absolute(&self, relative: u32) -> Result<u64> {
        self.absolute_data_start
            .checked_add(relative)
            .map(u64::from)
            .ok_or_else(|| TagfileError::InvalidFormat(format!(
                "offset {relative:#x} overflows section {:?}", self.name
            )))
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub user_tag:           u32,
    pub file_version:       u32,
    pub layout_rules:       [u8; 4],
    pub contents_index:     u32,
    pub contents_offset:    u32,
    pub class_names_index:  u32,
    pub class_names_offset: u32,
    pub version:            HavokVersion,
    pub flags:              u32,
    pub sections:           Vec<Section>,
}

impl Header {
    /// Parse the header and section table from offset 0.
    ///
    /// Magic and version are validated before any section record is read.
    pub fn read(stream: &mut ByteStream<'_>, options: &DecodeOptions) -> Result<Self> {
        stream.seek(0);
        let magic = [stream.read_u32()?, stream.read_u32()?];
        if magic != MAGIC {
            return Err(TagfileError::InvalidFormat(format!(
                "bad magic {:#010x} {:#010x}", magic[0], magic[1]
            )));
        }

        let user_tag     = stream.read_u32()?;
        let file_version = stream.read_u32()?;
        let mut layout_rules = [0u8; 4];
        layout_rules.copy_from_slice(stream.read_bytes(4)?);

        let num_sections       = stream.read_u32()?;
        let contents_index     = stream.read_u32()?;
        let contents_offset    = stream.read_u32()?;
        let class_names_index  = stream.read_u32()?;
        let class_names_offset = stream.read_u32()?;

        let version_name = stream.read_fixed_string(VERSION_FIELD_SIZE)?;
        let version = HavokVersion::from_name(version_name.trim_end())
            .ok_or(TagfileError::UnsupportedVersion(version_name))?;
        stream.skip(1)?;

        let flags = stream.read_u32()?;
        stream.skip(4)?;

        if num_sections > options.max_sections {
            return Err(TagfileError::ArrayTooLarge {
                count: num_sections,
                limit: options.max_sections,
            });
        }
        for (what, index) in [("contents", contents_index), ("class names", class_names_index)] {
            if index >= num_sections {
                return Err(TagfileError::InvalidFormat(format!(
                    "{what} section index {index} out of range ({num_sections} sections)"
                )));
            }
        }

        let sections = (0..num_sections)
            .map(|_| Section::read(stream))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            version = version.name(),
            sections = sections.len(),
            contents = contents_index,
            class_names = class_names_index,
            "parsed packfile header"
        );

        Ok(Self {
            user_tag,
            file_version,
            layout_rules,
            contents_index,
            contents_offset,
            class_names_index,
            class_names_offset,
            version,
            flags,
            sections,
        })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(MAGIC[0])?;
        writer.write_u32::<LittleEndian>(MAGIC[1])?;
        writer.write_u32::<LittleEndian>(self.user_tag)?;
        writer.write_u32::<LittleEndian>(self.file_version)?;
        writer.write_all(&self.layout_rules)?;
        writer.write_u32::<LittleEndian>(self.sections.len() as u32)?;
        writer.write_u32::<LittleEndian>(self.contents_index)?;
        writer.write_u32::<LittleEndian>(self.contents_offset)?;
        writer.write_u32::<LittleEndian>(self.class_names_index)?;
        writer.write_u32::<LittleEndian>(self.class_names_offset)?;
        write_fixed_string(&mut writer, self.version.name(), VERSION_FIELD_SIZE + 1)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(0)?;
        for section in &self.sections {
            section.write(&mut writer)?;
        }
        Ok(())
    }

    pub fn contents_section(&self) -> &Section {
        &self.sections[self.contents_index as usize]
    }

    pub fn class_names_section(&self) -> &Section {
        &self.sections[self.class_names_index as usize]
    }

    /// Absolute data start of every section, indexed by section number.
    pub fn section_bases(&self) -> Vec<u32> {
        self.sections.iter().map(|s| s.absolute_data_start).collect()
    }
}

/// NUL-padded string field of exactly `size` bytes (truncated if longer).
fn write_fixed_string<W: Write>(writer: &mut W, value: &str, size: usize) -> io::Result<()> {
    let mut field = vec![0u8; size];
    let len = value.len().min(size - 1);
    field[..len].copy_from_slice(&value.as_bytes()[..len]);
    writer.write_all(&field)
}
