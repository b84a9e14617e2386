pub mod stream;
pub mod header;
pub mod class_names;
pub mod fixup;
pub mod codec;
pub mod objects;
pub mod registry;
pub mod tagfile;
pub mod error;

pub use error::{Result, TagfileError};
pub use header::{Header, HavokVersion, Section};
pub use class_names::ClassNameTable;
pub use fixup::{Fixup, FixupTable, HkArray, VirtualFixup, ABSENT};
pub use codec::{decode_quat40, QuantizationType, TransformMask};
pub use codec::spline::TrackSamples;
pub use objects::{
    Animation, AnimationBinding, AnimationContainer, Bone, DecodedObject, NamedVariant,
    PhysicsSystem, RigidBody, RootLevelContainer, Scene, Shape, ShapeKind, Skeleton, Track,
};
pub use tagfile::{DecodeOptions, SkippedObject, Tagfile};
