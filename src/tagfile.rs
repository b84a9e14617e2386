//! High-level [`Tagfile`] API: decode a whole packfile into an
//! address-keyed object table.
//!
//! ```no_run
//! use hkxtag::Tagfile;
//!
//! let file = Tagfile::open("character.hkx")?;
//! if let Ok(container) = file.animation_container() {
//!     for &address in &container.skeletons {
//!         let skeleton = file.skeleton(address)?;
//!         println!("{}: {} bones", skeleton.name, skeleton.bones.len());
//!     }
//! }
//! # Ok::<(), hkxtag::TagfileError>(())
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::class_names::ClassNameTable;
use crate::error::{Result, TagfileError};
use crate::fixup::{FixupTable, ABSENT};
use crate::header::Header;
use crate::objects::{
    Animation, AnimationBinding, AnimationContainer, DecodeContext, DecodedObject, PhysicsSystem,
    RigidBody, RootLevelContainer, Scene, Shape, Skeleton,
};
use crate::registry;
use crate::stream::ByteStream;

pub const DEFAULT_MAX_ARRAY_LEN: u32 = 1 << 20;
pub const DEFAULT_MAX_SECTIONS:  u32 = 64;

// ── DecodeOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`Tagfile::with_options`].
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Upper bound on any element count read from the file.
    pub max_array_len:  u32,
    pub max_sections:   u32,
    /// Fail on classes without a decoder instead of skipping them.
    pub strict_classes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_array_len:  DEFAULT_MAX_ARRAY_LEN,
            max_sections:   DEFAULT_MAX_SECTIONS,
            strict_classes: false,
        }
    }
}

// ── Tagfile ───────────────────────────────────────────────────────────────────

/// A virtual fixup whose class has no decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedObject {
    pub address:    u32,
    pub class_name: String,
}

#[derive(Debug, Clone)]
pub struct Tagfile {
    header:               Header,
    class_names:          ClassNameTable,
    fixups:               FixupTable,
    objects:              BTreeMap<u32, DecodedObject>,
    animation_container:  Option<u32>,
    physics_system:       Option<u32>,
    root_level_container: Option<u32>,
    skipped:              Vec<SkippedObject>,
}

impl Tagfile {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: &[u8], opts: DecodeOptions) -> Result<Self> {
        let mut stream = ByteStream::new(data);
        let header = Header::read(&mut stream, &opts)?;
        let class_names = ClassNameTable::read(&mut stream, header.class_names_section())?;
        let fixups = FixupTable::read(&mut stream, &header)?;

        let mut file = Self {
            header,
            class_names,
            fixups,
            objects:              BTreeMap::new(),
            animation_container:  None,
            physics_system:       None,
            root_level_container: None,
            skipped:              Vec::new(),
        };
        file.decode_objects(&mut stream, &opts)?;
        debug!(
            objects = file.objects.len(),
            skipped = file.skipped.len(),
            "decoded packfile"
        );
        Ok(file)
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Walk the virtual fixups in file order, decoding every instance with a
    /// registered decoder.  The stream cursor is restored after each entry.
    fn decode_objects(&mut self, stream: &mut ByteStream<'_>, opts: &DecodeOptions) -> Result<()> {
        let section  = self.header.contents_index;
        let contents = self.header.contents_section();
        let base     = contents.absolute_data_start;

        let start = u64::from(base);
        if start > stream.len() {
            return Err(TagfileError::InvalidFormat(format!(
                "contents section starts at {start:#x}, past the end of the file"
            )));
        }
        let len = u64::from(contents.end_offset).min(stream.len() - start);
        stream.seek(start);
        let mut content = stream.sub_stream(len as usize)?;

        for entry in self.fixups.virtual_fixups() {
            let class_name = self.class_names.get(entry.class_name_offset).unwrap_or_default();
            let address = base.checked_add(entry.offset).ok_or_else(|| {
                TagfileError::InvalidFormat(format!("object offset {:#x} overflows", entry.offset))
            })?;

            let decode = match registry::lookup(class_name) {
                Ok(decode) => decode,
                Err(TagfileError::UnknownClass(name)) if !opts.strict_classes => {
                    warn!(address, class = %name, "no decoder for class, skipping");
                    self.skipped.push(SkippedObject { address, class_name: name });
                    continue;
                }
                Err(e) => return Err(e),
            };

            let last = stream.pos();
            stream.seek(u64::from(address));
            content.seek(u64::from(entry.offset));
            let mut ctx = DecodeContext {
                stream:  &mut *stream,
                content: &mut content,
                fixups:  &self.fixups,
                section,
                version: self.header.version,
                options: opts,
            };
            let object = decode(&mut ctx)?;
            stream.seek(last);

            trace!(address, class = class_name, "{}", object.summary());
            match object {
                DecodedObject::AnimationContainer(_) => self.animation_container = Some(address),
                DecodedObject::PhysicsSystem(_)      => self.physics_system = Some(address),
                DecodedObject::RootLevelContainer(_) => self.root_level_container = Some(address),
                _ => {}
            }
            self.objects.insert(address, object);
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn class_names(&self) -> &ClassNameTable {
        &self.class_names
    }

    pub fn fixups(&self) -> &FixupTable {
        &self.fixups
    }

    /// Instances whose class has no decoder, in file order.
    pub fn skipped(&self) -> &[SkippedObject] {
        &self.skipped
    }

    /// Decoded objects in address order.
    pub fn objects(&self) -> impl Iterator<Item = (u32, &DecodedObject)> {
        self.objects.iter().map(|(&address, object)| (address, object))
    }

    pub fn object_table(&self) -> &BTreeMap<u32, DecodedObject> {
        &self.objects
    }

    pub fn object(&self, address: u32) -> Result<&DecodedObject> {
        self.objects.get(&address).ok_or(TagfileError::NotFound { address })
    }

    /// Number of decoded objects per kind.
    pub fn count_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for object in self.objects.values() {
            *counts.entry(object.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn skeleton(&self, address: u32) -> Result<&Skeleton> {
        self.typed(address, "Skeleton", |o| match o {
            DecodedObject::Skeleton(s) => Some(s),
            _ => None,
        })
    }

    pub fn animation(&self, address: u32) -> Result<&Animation> {
        self.typed(address, "Animation", |o| match o {
            DecodedObject::Animation(a) => Some(a),
            _ => None,
        })
    }

    pub fn rigid_body(&self, address: u32) -> Result<&RigidBody> {
        self.typed(address, "RigidBody", |o| match o {
            DecodedObject::RigidBody(r) => Some(r),
            _ => None,
        })
    }

    pub fn shape(&self, address: u32) -> Result<&Shape> {
        self.typed(address, "Shape", |o| match o {
            DecodedObject::Shape(s) => Some(s),
            _ => None,
        })
    }

    pub fn binding(&self, address: u32) -> Result<&AnimationBinding> {
        self.typed(address, "AnimationBinding", |o| match o {
            DecodedObject::AnimationBinding(b) => Some(b),
            _ => None,
        })
    }

    pub fn scene(&self, address: u32) -> Result<&Scene> {
        self.typed(address, "Scene", |o| match o {
            DecodedObject::Scene(s) => Some(s),
            _ => None,
        })
    }

    /// The file's animation container.  When several are present the last
    /// one in file order wins.
    pub fn animation_container(&self) -> Result<&AnimationContainer> {
        let address = self.animation_container.unwrap_or(ABSENT);
        self.typed(address, "AnimationContainer", |o| match o {
            DecodedObject::AnimationContainer(c) => Some(c),
            _ => None,
        })
    }

    pub fn physics_system(&self) -> Result<&PhysicsSystem> {
        let address = self.physics_system.unwrap_or(ABSENT);
        self.typed(address, "PhysicsSystem", |o| match o {
            DecodedObject::PhysicsSystem(p) => Some(p),
            _ => None,
        })
    }

    pub fn root_level_container(&self) -> Result<&RootLevelContainer> {
        let address = self.root_level_container.unwrap_or(ABSENT);
        self.typed(address, "RootLevelContainer", |o| match o {
            DecodedObject::RootLevelContainer(r) => Some(r),
            _ => None,
        })
    }

    fn typed<'t, T>(
        &'t self,
        address:  u32,
        expected: &'static str,
        extract:  impl FnOnce(&'t DecodedObject) -> Option<&'t T>,
    ) -> Result<&'t T> {
        let object = self.object(address)?;
        extract(object).ok_or(TagfileError::WrongType { address, expected, found: object.kind() })
    }
}
