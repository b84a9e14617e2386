//! Physics objects: `RmdPhysicsSystem`, `hkpRigidBody`, `hkpBoxShape`.

use glam::Vec4;
use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::objects::{DecodeContext, DecodedObject};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhysicsSystem {
    /// Addresses of `hkpRigidBody` objects.
    pub rigid_bodies: Vec<u32>,
    pub names:        Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RigidBody {
    /// Address of the collision shape.
    pub shape: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ShapeKind {
    Box { half_extents: Vec4 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shape {
    pub user_data: u64,
    pub radius:    f32,
    pub kind:      ShapeKind,
}

/// Referenced-object header, four hkArrays (rigid bodies first), 12 reserved
/// bytes, three more hkArrays (names first).
pub fn decode_physics_system(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    ctx.skip(8)?;
    let rigid_bodies = ctx.hk_array()?;
    for _ in 0..3 {
        ctx.hk_array()?;
    }
    ctx.skip(12)?;
    let names = ctx.hk_array()?;
    for _ in 0..2 {
        ctx.hk_array()?;
    }

    let system = PhysicsSystem {
        rigid_bodies: ctx.fixup_array(&rigid_bodies)?,
        names:        ctx.string_array(&names)?,
    };
    trace!(rigid_bodies = system.rigid_bodies.len(), names = system.names.len(), "decoded physics system");
    Ok(DecodedObject::PhysicsSystem(system))
}

pub fn decode_rigid_body(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    ctx.skip(16)?;
    let shape = ctx.pointer()?;
    Ok(DecodedObject::RigidBody(RigidBody { shape }))
}

pub fn decode_box_shape(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    let s = &mut *ctx.stream;
    s.skip(8)?;
    let user_data = s.read_u64()?;
    let radius    = s.read_f32()?;
    s.skip(12)?;
    let half_extents = Vec4::new(s.read_f32()?, s.read_f32()?, s.read_f32()?, s.read_f32()?);
    Ok(DecodedObject::Shape(Shape { user_data, radius, kind: ShapeKind::Box { half_extents } }))
}
