//! Class name → decoder dispatch table.
//!
//! Supporting a new class means adding a [`DecodedObject`] variant, a decode
//! function and one row here.

use crate::error::{Result, TagfileError};
use crate::objects::{animation, container, physics, skeleton, DecodeContext, DecodedObject};

pub type DecodeFn = fn(&mut DecodeContext<'_, '_>) -> Result<DecodedObject>;

#[derive(Clone, Copy)]
pub struct ClassDecoder {
    pub class_name: &'static str,
    pub decode:     DecodeFn,
}

pub static DECODERS: &[ClassDecoder] = &[
    ClassDecoder { class_name: "hkaSkeleton",                  decode: skeleton::decode },
    ClassDecoder { class_name: "hkRootLevelContainer",         decode: container::decode_root_level_container },
    ClassDecoder { class_name: "hkaSplineCompressedAnimation", decode: animation::decode },
    ClassDecoder { class_name: "hkaAnimationBinding",          decode: container::decode_animation_binding },
    ClassDecoder { class_name: "hkaAnimationContainer",        decode: container::decode_animation_container },
    ClassDecoder { class_name: "hkxScene",                     decode: container::decode_scene },
    ClassDecoder { class_name: "RmdPhysicsSystem",             decode: physics::decode_physics_system },
    ClassDecoder { class_name: "hkpRigidBody",                 decode: physics::decode_rigid_body },
    ClassDecoder { class_name: "hkpBoxShape",                  decode: physics::decode_box_shape },
];

pub fn lookup(class_name: &str) -> Result<DecodeFn> {
    DECODERS
        .iter()
        .find(|d| d.class_name == class_name)
        .map(|d| d.decode)
        .ok_or_else(|| TagfileError::UnknownClass(class_name.to_string()))
}

pub fn is_supported(class_name: &str) -> bool {
    DECODERS.iter().any(|d| d.class_name == class_name)
}
