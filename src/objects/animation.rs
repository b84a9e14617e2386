//! `hkaSplineCompressedAnimation`.
//!
//! # Layout
//!
//! | Field                  | Type      |
//! |------------------------|-----------|
//! | referenced object      | 2 × u32   |
//! | animation type         | u32       |
//! | duration               | f32       |
//! | transform tracks       | u32       |
//! | float tracks           | u32       |
//! | extracted motion       | pointer   |
//! | annotation tracks      | hkArray   |
//! | frames, blocks         | 2 × u32   |
//! | max frames per block   | u32       |
//! | mask + quant size      | u32       |
//! | block, 1/block, frame  | 3 × f32   |
//! | block offsets          | hkArray   |
//! | float block offsets    | hkArray   |
//! | transform offsets      | hkArray   |
//! | float offsets          | hkArray   |
//! | data                   | hkArray (bytes) |
//!
//! Block offsets index into the data array.  Each block is handed to
//! [`codec::spline::decode_block`](crate::codec::spline::decode_block) and its
//! samples become one segment of the matching transform track.  Every track
//! has exactly one segment per block offset.
//!
//! The total number of segments and of decoded samples is bounded by
//! `max_array_len`, since block offsets may repeat.

use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::Serialize;
use tracing::trace;

use crate::codec::spline::{self, TrackSamples};
use crate::error::{Result, TagfileError};
use crate::fixup::{HkArray, ABSENT};
use crate::objects::{DecodeContext, DecodedObject};
use crate::stream::ByteStream;

const ANNOTATION_RECORD_SIZE: u64 = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Track {
    /// Samples per block, in block order.
    pub blocks: Vec<TrackSamples>,
}

impl Track {
    /// Positions of every block, concatenated.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.blocks.iter().flat_map(|b| b.positions.iter().flatten().copied())
    }

    /// Rotations of every block, concatenated.
    pub fn rotations(&self) -> impl Iterator<Item = Quat> + '_ {
        self.blocks.iter().flat_map(|b| b.rotations.iter().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Animation {
    pub duration:             f32,
    pub num_frames:           u32,
    pub num_blocks:           u32,
    pub max_frames_per_block: u32,
    pub block_duration:       f32,
    pub frame_duration:       f32,
    pub num_float_tracks:     u32,
    pub extracted_motion:     Option<u32>,
    pub tracks:               Vec<Track>,
    /// Annotation name → track index.
    pub bone_to_track:        BTreeMap<String, usize>,
}

impl Animation {
    pub fn track_for_bone(&self, name: &str) -> Option<&Track> {
        self.bone_to_track.get(name).and_then(|&i| self.tracks.get(i))
    }
}

pub fn decode(ctx: &mut DecodeContext<'_, '_>) -> Result<DecodedObject> {
    ctx.skip(8)?;
    let _animation_type  = ctx.stream.read_u32()?;
    let duration         = ctx.stream.read_f32()?;
    let num_tracks       = ctx.stream.read_u32()?;
    let num_float_tracks = ctx.stream.read_u32()?;
    let extracted_motion = ctx.pointer()?;
    let annotations      = ctx.hk_array()?;

    let num_frames           = ctx.stream.read_u32()?;
    let num_blocks           = ctx.stream.read_u32()?;
    let max_frames_per_block = ctx.stream.read_u32()?;
    let _mask_and_quant_size = ctx.stream.read_u32()?;
    let block_duration       = ctx.stream.read_f32()?;
    let _block_inv_duration  = ctx.stream.read_f32()?;
    let frame_duration       = ctx.stream.read_f32()?;

    let block_offsets = ctx.hk_array()?;
    // float block offsets, transform offsets, float offsets
    for _ in 0..3 {
        ctx.hk_array()?;
    }
    let data = ctx.hk_array()?;

    let num_tracks = ctx.check_count(num_tracks, 4)?;
    let mut tracks = vec![Track::default(); num_tracks];

    let mut data_stream = if data.offset == ABSENT {
        ByteStream::new(&[])
    } else {
        let len = ctx.check_count(data.count, 1)?;
        ctx.seek(data.offset);
        ctx.stream.sub_stream(len)?
    };

    let limit = ctx.options.max_array_len;
    let offsets = ctx.u32_array(&block_offsets)?;
    check_total(offsets.len() as u64 * num_tracks as u64, limit)?;

    let mut decoded = 0u64;
    for offset in offsets {
        let samples = spline::decode_block(&mut data_stream, u64::from(offset), num_tracks, limit)?;
        decoded += samples.iter().map(TrackSamples::len).sum::<usize>() as u64;
        check_total(decoded, limit)?;
        for (track, block) in tracks.iter_mut().zip(samples) {
            track.blocks.push(block);
        }
    }

    let bone_to_track = read_annotations(ctx, &annotations)?;

    trace!(duration, tracks = tracks.len(), blocks = num_blocks, "decoded animation");
    Ok(DecodedObject::Animation(Animation {
        duration,
        num_frames,
        num_blocks,
        max_frames_per_block,
        block_duration,
        frame_duration,
        num_float_tracks,
        extracted_motion,
        tracks,
        bone_to_track,
    }))
}

fn check_total(count: u64, limit: u32) -> Result<()> {
    if count > u64::from(limit) {
        return Err(TagfileError::ArrayTooLarge {
            count: u32::try_from(count).unwrap_or(u32::MAX),
            limit,
        });
    }
    Ok(())
}

/// Annotation records: name pointer, two reserved words, one reserved float.
fn read_annotations(ctx: &mut DecodeContext<'_, '_>, array: &HkArray) -> Result<BTreeMap<String, usize>> {
    let mut map = BTreeMap::new();
    if array.offset == ABSENT {
        return Ok(map);
    }
    let count = ctx.check_count(array.count, ANNOTATION_RECORD_SIZE)?;
    ctx.seek(array.offset);
    for index in 0..count {
        let name_address = ctx.fixup()?;
        ctx.skip(12)?;
        map.insert(ctx.string_at(name_address)?, index);
    }
    Ok(map)
}
