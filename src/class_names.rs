//! `__classnames__` section reader.
//!
//! Each entry is a 4-byte class signature, one marker byte, then the
//! NUL-terminated class name.  The list ends at the first signature whose
//! low byte is `0xFF` (section padding).  Virtual fixups refer to classes by
//! the offset of the name string relative to the section's data start.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::header::Section;
use crate::stream::ByteStream;

pub const TERMINAL_TAG_BYTE: u32 = 0xFF;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassNameTable {
    names: BTreeMap<u32, String>,
}

impl ClassNameTable {
    pub fn read(stream: &mut ByteStream<'_>, section: &Section) -> Result<Self> {
        let start = u64::from(section.absolute_data_start);
        stream.seek(start);

        let mut names = BTreeMap::new();
        loop {
            let tag = stream.read_u32()?;
            if tag & 0xFF == TERMINAL_TAG_BYTE {
                break;
            }
            stream.skip(1)?;
            let offset = (stream.pos() - start) as u32;
            let name = stream.read_cstring()?;
            trace!(offset, %name, "class name");
            names.insert(offset, name);
        }
        Ok(Self { names })
    }

    pub fn get(&self, offset: u32) -> Option<&str> {
        self.names.get(&offset).map(String::as_str)
    }

    /// Offset of the first entry named `name`.
    pub fn offset_of(&self, name: &str) -> Option<u32> {
        self.names.iter().find(|(_, n)| n.as_str() == name).map(|(&off, _)| off)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().map(|(&off, n)| (off, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
