//! Containers and scene metadata: `hkRootLevelContainer`,
//! `hkaAnimationContainer`, `hkaAnimationBinding`, `hkxScene`.
//!
//! These hold addresses of other objects rather than the objects
//! themselves; look them up through [`Tagfile`](crate::Tagfile).

use glam::Vec4;
use serde::Serialize;
use tracing::trace;

use crate::error::{Result, TagfileError};
use crate::fixup::{HkArray, ABSENT};
use crate::header::HavokVersion;
use crate::objects::{DecodeContext, DecodedObject};
use crate::stream::ByteStream;

const NAMED_VARIANT_SIZE: u64 = 12;

// ── hkRootLevelContainer ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NamedVariant {
    pub name:       String,
    pub class_name: String,
    pub object:     Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootLevelContainer {
    pub variants: Vec<NamedVariant>,
}

impl RootLevelContainer {
    /// First variant whose class name matches `class_name`.
    pub fn find(&self, class_name: &str) -> Option<&NamedVariant> {
        self.variants.iter().find(|v| v.class_name == class_name)
    }
}

/// Read through the contents-section view: pointer fields are keyed by the
/// view's own position.
pub fn decode_root_level_container(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    let fixups  = ctx.fixups;
    let section = ctx.section;
    let base    = fixups.section_base(section)?;

    let array = HkArray {
        offset:             fixups.resolve_relative(ctx.content, section)?,
        count:              ctx.content.read_u32()?,
        capacity_and_flags: ctx.content.read_u32()?,
    };

    let mut records = Vec::new();
    if !array.is_empty() {
        let count = ctx.check_count(array.count, NAMED_VARIANT_SIZE)?;
        let relative = array.offset.checked_sub(base).ok_or_else(|| {
            TagfileError::InvalidFormat(format!("named variants at {:#x} precede their section", array.offset))
        })?;
        ctx.content.seek(u64::from(relative));
        for _ in 0..count {
            let name       = fixups.resolve_relative(ctx.content, section)?;
            let class_name = fixups.resolve_relative(ctx.content, section)?;
            let object     = fixups.resolve_relative(ctx.content, section)?;
            records.push((name, class_name, object));
        }
    }

    let variants = records
        .into_iter()
        .map(|(name, class_name, object)| {
            Ok(NamedVariant {
                name:       ctx.string_at(name)?,
                class_name: ctx.string_at(class_name)?,
                object:     Some(object).filter(|&a| a != ABSENT),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    trace!(variants = variants.len(), "decoded root level container");
    Ok(DecodedObject::RootLevelContainer(RootLevelContainer { variants }))
}

// ── hkaAnimationContainer ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnimationContainer {
    pub skeletons:  Vec<u32>,
    pub animations: Vec<u32>,
    pub bindings:   Vec<u32>,
}

/// `hk_2010.2.0-r1`: referenced-object header then skeletons, animations,
/// bindings and attachments hkArrays.  `Havok-5.5.0-r1`: pointer/count pairs
/// for skeletons and animations; bindings are not read for this layout.
pub fn decode_animation_container(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    let container = match ctx.version {
        HavokVersion::Havok2010R1 => {
            ctx.skip(8)?;
            let skeletons  = ctx.hk_array()?;
            let animations = ctx.hk_array()?;
            let bindings   = ctx.hk_array()?;
            let _attachments = ctx.hk_array()?;
            AnimationContainer {
                skeletons:  ctx.fixup_array(&skeletons)?,
                animations: ctx.fixup_array(&animations)?,
                bindings:   ctx.fixup_array(&bindings)?,
            }
        }
        HavokVersion::Havok550R1 => {
            let skeletons  = HkArray::new(ctx.fixup()?, ctx.stream.read_u32()?);
            let animations = HkArray::new(ctx.fixup()?, ctx.stream.read_u32()?);
            AnimationContainer {
                skeletons:  ctx.fixup_array(&skeletons)?,
                animations: ctx.fixup_array(&animations)?,
                bindings:   Vec::new(),
            }
        }
    };
    trace!(
        skeletons = container.skeletons.len(),
        animations = container.animations.len(),
        bindings = container.bindings.len(),
        "decoded animation container"
    );
    Ok(DecodedObject::AnimationContainer(container))
}

// ── hkaAnimationBinding ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnimationBinding {
    pub skeleton_name:                   String,
    pub animation:                       Option<u32>,
    pub transform_track_to_bone_indices: Vec<i16>,
}

pub fn decode_animation_binding(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    ctx.skip(8)?;
    let name_address = ctx.fixup()?;
    let animation    = ctx.pointer()?;
    let track_to_bone = ctx.hk_array()?;
    // float track → float slot and partition indices are not consumed
    ctx.hk_array()?;
    ctx.hk_array()?;

    let skeleton_name = ctx.string_at(name_address)?;
    let transform_track_to_bone_indices = ctx.i16_array(&track_to_bone)?;
    Ok(DecodedObject::AnimationBinding(AnimationBinding {
        skeleton_name,
        animation,
        transform_track_to_bone_indices,
    }))
}

// ── hkxScene ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    pub scene_length:      f32,
    pub applied_transform: [Vec4; 3],
    pub modeller:          String,
    pub asset:             String,
}

pub fn decode_scene(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    ctx.skip(8)?;
    let scene_length = ctx.stream.read_f32()?;
    ctx.skip(0x44)?;

    let mut applied_transform = [Vec4::ZERO; 3];
    for row in &mut applied_transform {
        let s = &mut *ctx.stream;
        *row = Vec4::new(s.read_f32()?, s.read_f32()?, s.read_f32()?, s.read_f32()?);
    }

    let modeller = read_padded_string(ctx.stream)?;
    let asset    = read_padded_string(ctx.stream)?;
    Ok(DecodedObject::Scene(Scene { scene_length, applied_transform, modeller, asset }))
}

/// Inline NUL-terminated string whose storage (terminator included) is
/// padded to a multiple of 4 bytes.
fn read_padded_string(stream: &mut ByteStream<'_>) -> Result<String> {
    let start = stream.pos();
    let value = stream.read_cstring()?;
    let end = stream.pos();
    stream.align_from(start, 4);
    if stream.pos() > stream.len() {
        stream.seek(end);
    }
    Ok(value)
}
