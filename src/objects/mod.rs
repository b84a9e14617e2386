//! Decoded object model and the per-class decoders.
//!
//! Every decoded instance lands in one address-keyed table as a
//! [`DecodedObject`].  Objects refer to each other by absolute file address
//! (e.g. a binding's animation, a rigid body's shape); callers resolve those
//! through [`Tagfile`](crate::Tagfile) lookups.

pub mod animation;
pub mod container;
pub mod physics;
pub mod skeleton;

use serde::Serialize;

use crate::error::{Result, TagfileError};
use crate::fixup::{FixupTable, HkArray, ABSENT};
use crate::header::HavokVersion;
use crate::stream::ByteStream;
use crate::tagfile::DecodeOptions;

pub use animation::{Animation, Track};
pub use container::{AnimationBinding, AnimationContainer, NamedVariant, RootLevelContainer, Scene};
pub use physics::{PhysicsSystem, RigidBody, Shape, ShapeKind};
pub use skeleton::{Bone, Skeleton};

// ── DecodedObject ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum DecodedObject {
    Skeleton(Skeleton),
    Animation(Animation),
    RigidBody(RigidBody),
    Shape(Shape),
    PhysicsSystem(PhysicsSystem),
    AnimationBinding(AnimationBinding),
    AnimationContainer(AnimationContainer),
    Scene(Scene),
    RootLevelContainer(RootLevelContainer),
}

impl DecodedObject {
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedObject::Skeleton(_)           => "Skeleton",
            DecodedObject::Animation(_)          => "Animation",
            DecodedObject::RigidBody(_)          => "RigidBody",
            DecodedObject::Shape(_)              => "Shape",
            DecodedObject::PhysicsSystem(_)      => "PhysicsSystem",
            DecodedObject::AnimationBinding(_)   => "AnimationBinding",
            DecodedObject::AnimationContainer(_) => "AnimationContainer",
            DecodedObject::Scene(_)              => "Scene",
            DecodedObject::RootLevelContainer(_) => "RootLevelContainer",
        }
    }

    /// One-line human readable description (CLI listings).
    pub fn summary(&self) -> String {
        match self {
            DecodedObject::Skeleton(s) => format!("{:?}, {} bones", s.name, s.bones.len()),
            DecodedObject::Animation(a) => format!(
                "{:.3}s, {} tracks, {} frames in {} blocks",
                a.duration, a.tracks.len(), a.num_frames, a.num_blocks
            ),
            DecodedObject::RigidBody(r) => match r.shape {
                Some(shape) => format!("shape @ {shape:#x}"),
                None        => "no shape".into(),
            },
            DecodedObject::Shape(s) => match s.kind {
                ShapeKind::Box { half_extents } => format!(
                    "box {:.3} x {:.3} x {:.3}, radius {:.3}",
                    half_extents.x, half_extents.y, half_extents.z, s.radius
                ),
            },
            DecodedObject::PhysicsSystem(p) => format!(
                "{} rigid bodies, {} names", p.rigid_bodies.len(), p.names.len()
            ),
            DecodedObject::AnimationBinding(b) => format!(
                "skeleton {:?}, {} track mappings", b.skeleton_name, b.transform_track_to_bone_indices.len()
            ),
            DecodedObject::AnimationContainer(c) => format!(
                "{} skeletons, {} animations, {} bindings",
                c.skeletons.len(), c.animations.len(), c.bindings.len()
            ),
            DecodedObject::Scene(s) => format!("{:.3}s, modeller {:?}", s.scene_length, s.modeller),
            DecodedObject::RootLevelContainer(r) => format!("{} named variants", r.variants.len()),
        }
    }
}

// ── DecodeContext ────────────────────────────────────────────────────────────

/// Everything a class decoder needs, threaded explicitly through every call.
///
/// `stream` is the whole file positioned at the object (absolute addresses);
/// `content` is the contents section positioned at the same object
/// (section-relative addresses).
pub struct DecodeContext<'s, 'a> {
    pub stream:  &'s mut ByteStream<'a>,
    pub content: &'s mut ByteStream<'a>,
    pub fixups:  &'s FixupTable,
    pub section: u32,
    pub version: HavokVersion,
    pub options: &'s DecodeOptions,
}

impl<'s, 'a> DecodeContext<'s, 'a> {
    /// Resolve the pointer field at the cursor.
    pub fn fixup(&mut self) -> Result<u32> {
        self.fixups.resolve(self.stream, self.section)
    }

    /// Resolve the pointer field at the cursor, `None` when unrelocated.
    pub fn pointer(&mut self) -> Result<Option<u32>> {
        Ok(Some(self.fixup()?).filter(|&addr| addr != ABSENT))
    }

    pub fn hk_array(&mut self) -> Result<HkArray> {
        HkArray::read(self.stream, self.fixups, self.section)
    }

    pub fn seek(&mut self, address: u32) {
        self.stream.seek(u64::from(address));
    }

    pub fn skip(&mut self, count: i64) -> Result<()> {
        self.stream.skip(count)
    }

    /// Validate an element count before allocating for it: bounded by the
    /// configured limit and by the bytes the stream actually holds.
    pub fn check_count(&self, count: u32, element_size: u64) -> Result<usize> {
        let limit = self.options.max_array_len;
        if count > limit {
            return Err(TagfileError::ArrayTooLarge { count, limit });
        }
        if u64::from(count) * element_size > self.stream.len() {
            return Err(TagfileError::ArrayTooLarge {
                count,
                limit: (self.stream.len() / element_size.max(1)) as u32,
            });
        }
        Ok(count as usize)
    }

    /// NUL-terminated string at `address`; the cursor is left untouched.
    /// An absent address reads as the empty string.
    pub fn string_at(&mut self, address: u32) -> Result<String> {
        if address == ABSENT {
            return Ok(String::new());
        }
        let last = self.stream.pos();
        self.seek(address);
        let value = self.stream.read_cstring();
        self.stream.seek(last);
        value
    }

    // ── Array readers ────────────────────────────────────────────────────────
    //
    // Each reader seeks to the array data and leaves the cursor after it.
    // An absent offset reads as an empty array, whatever the count says.

    pub fn u32_array(&mut self, array: &HkArray) -> Result<Vec<u32>> {
        if array.offset == ABSENT {
            return Ok(Vec::new());
        }
        let count = self.check_count(array.count, 4)?;
        self.seek(array.offset);
        (0..count).map(|_| self.stream.read_u32()).collect()
    }

    pub fn i16_array(&mut self, array: &HkArray) -> Result<Vec<i16>> {
        if array.offset == ABSENT {
            return Ok(Vec::new());
        }
        let count = self.check_count(array.count, 2)?;
        self.seek(array.offset);
        (0..count).map(|_| self.stream.read_i16()).collect()
    }

    /// Array of pointers, each resolved through the fixup table.
    pub fn fixup_array(&mut self, array: &HkArray) -> Result<Vec<u32>> {
        if array.offset == ABSENT {
            return Ok(Vec::new());
        }
        let count = self.check_count(array.count, 4)?;
        self.seek(array.offset);
        (0..count).map(|_| self.fixup()).collect()
    }

    /// Array of pointers to strings.
    pub fn string_array(&mut self, array: &HkArray) -> Result<Vec<String>> {
        let addresses = self.fixup_array(array)?;
        addresses.into_iter().map(|addr| self.string_at(addr)).collect()
    }
}
