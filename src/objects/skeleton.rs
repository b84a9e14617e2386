//! `hkaSkeleton` in both supported layouts.
//!
//! `hk_2010.2.0-r1` (inline): referenced-object header, name pointer, then
//! seven hkArrays (parent indices, bones, reference pose, reference floats,
//! float slots, local frames, partitions).  Bone records (name pointer,
//! translation-locked word) sit directly in the bones array.
//!
//! `Havok-5.5.0-r1` (indirect): name pointer followed by pointer/count pairs
//! for parent indices, bones and reference pose.  The bones array holds
//! pointers to the bone records.
//!
//! Both store the reference pose as 48-byte records: position (xyz + pad),
//! rotation (w, x, y, z), scale (xyz + pad).  Parent indices are matched to
//! bones by position.

use glam::{Quat, Vec3};
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::fixup::HkArray;
use crate::header::HavokVersion;
use crate::objects::{DecodeContext, DecodedObject};

const BONE_RECORD_SIZE:      u64 = 8;
const TRANSFORM_RECORD_SIZE: u64 = 48;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name:               String,
    /// `-1` for root bones.
    pub parent_index:       i16,
    pub position:           Vec3,
    pub rotation:           Quat,
    pub scale:              Vec3,
    pub translation_locked: bool,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            name:               String::new(),
            parent_index:       -1,
            position:           Vec3::ZERO,
            rotation:           Quat::IDENTITY,
            scale:              Vec3::ONE,
            translation_locked: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Skeleton {
    pub name:  String,
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn parent(&self, index: usize) -> Option<&Bone> {
        let parent = self.bones.get(index)?.parent_index;
        usize::try_from(parent).ok().and_then(|p| self.bones.get(p))
    }
}

pub fn decode(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    let skeleton = match ctx.version {
        HavokVersion::Havok2010R1 => decode_inline(ctx)?,
        HavokVersion::Havok550R1  => decode_indirect(ctx)?,
    };
    Ok(DecodedObject::Skeleton(skeleton))
}

fn decode_inline(ctx: &mut DecodeContext<'_, '_>) -> Result<Skeleton> {
    ctx.skip(8)?;
    let name_address = ctx.fixup()?;

    let parent_indices = ctx.hk_array()?;
    let bones_array    = ctx.hk_array()?;
    let transforms     = ctx.hk_array()?;
    // reference floats, float slots, local frames and partitions are not consumed
    for _ in 0..4 {
        ctx.hk_array()?;
    }

    let name    = ctx.string_at(name_address)?;
    let parents = ctx.i16_array(&parent_indices)?;

    let mut bones = Vec::new();
    if bones_array.offset != crate::fixup::ABSENT {
        let count = ctx.check_count(bones_array.count, BONE_RECORD_SIZE)?;
        ctx.seek(bones_array.offset);
        bones.reserve(count);
        for _ in 0..count {
            bones.push(read_bone_record(ctx)?);
        }
    }

    assign_parents(&mut bones, &parents);
    read_reference_pose(ctx, &transforms, &mut bones)?;
    Ok(Skeleton { name, bones })
}

fn decode_indirect(ctx: &mut DecodeContext<'_, '_>) -> Result<Skeleton> {
    let name_address = ctx.fixup()?;
    let parent_indices = HkArray::new(ctx.fixup()?, ctx.stream.read_u32()?);
    let bones_array    = HkArray::new(ctx.fixup()?, ctx.stream.read_u32()?);
    let transforms     = HkArray::new(ctx.fixup()?, ctx.stream.read_u32()?);

    let name    = ctx.string_at(name_address)?;
    let parents = ctx.i16_array(&parent_indices)?;

    let bone_addresses = ctx.fixup_array(&bones_array)?;
    let mut bones = Vec::with_capacity(bone_addresses.len());
    for address in bone_addresses {
        ctx.seek(address);
        bones.push(read_bone_record(ctx)?);
    }

    assign_parents(&mut bones, &parents);
    read_reference_pose(ctx, &transforms, &mut bones)?;
    Ok(Skeleton { name, bones })
}

fn read_bone_record(ctx: &mut DecodeContext<'_, '_>) -> Result<Bone> {
    let name_address       = ctx.fixup()?;
    let translation_locked = ctx.stream.read_u32()? == 1;
    Ok(Bone {
        name: ctx.string_at(name_address)?,
        translation_locked,
        ..Bone::default()
    })
}

fn assign_parents(bones: &mut [Bone], parents: &[i16]) {
    if parents.len() != bones.len() {
        warn!(bones = bones.len(), parents = parents.len(), "parent index count mismatch");
    }
    for (bone, &parent) in bones.iter_mut().zip(parents) {
        bone.parent_index = parent;
    }
}

fn read_reference_pose(ctx: &mut DecodeContext<'_, '_>, array: &HkArray, bones: &mut [Bone]) -> Result<()> {
    if array.offset == crate::fixup::ABSENT {
        return Ok(());
    }
    let count = ctx.check_count(array.count, TRANSFORM_RECORD_SIZE)?;
    if count > bones.len() {
        warn!(transforms = count, bones = bones.len(), "extra reference pose entries ignored");
    }

    ctx.seek(array.offset);
    let s = &mut *ctx.stream;
    for bone in bones.iter_mut().take(count) {
        bone.position = Vec3::new(s.read_f32()?, s.read_f32()?, s.read_f32()?);
        s.skip(4)?;
        let w = s.read_f32()?;
        bone.rotation = Quat::from_xyzw(s.read_f32()?, s.read_f32()?, s.read_f32()?, w);
        bone.scale = Vec3::new(s.read_f32()?, s.read_f32()?, s.read_f32()?);
        s.skip(4)?;
    }
    Ok(())
}
