//! Block decoder for spline-compressed transform tracks.
//!
//! A block is a run of transform masks (one per track) followed by the
//! per-track payloads.  Each payload holds position, rotation and scale in
//! that order.  Offsets are realigned to 4 bytes, measured from the end of
//! the mask run, at fixed points:
//!
//! - position: after the knot vector and after the sample loop
//! - rotation: after the channel, whichever branch was taken
//!
//! Spline channels start with a `u16` item count and `u8` degree followed by
//! `items + degree + 2` knot bytes.  Control points are stored for
//! `items + 1` samples.  Knots are skipped: callers get the control points.

use glam::{Quat, Vec3};
use serde::Serialize;

use crate::codec::{lerp_range, read_rotation, read_unit_sample, QuantizationType, TransformMask};
use crate::error::{Result, TagfileError};
use crate::stream::ByteStream;

/// Samples of one track decoded from one block.  A static channel holds one
/// sample, a spline channel its control points.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackSamples {
    /// `None` when the block has no position data for the track.
    pub positions: Option<Vec<Vec3>>,
    pub rotations: Vec<Quat>,
}

impl TrackSamples {
    /// Decoded positions plus rotations.
    pub fn len(&self) -> usize {
        self.positions.as_ref().map_or(0, Vec::len) + self.rotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode the block starting at `offset` in the animation data stream.
/// Spline channels with more than `max_items` control points are rejected.
pub fn decode_block(
    data:       &mut ByteStream<'_>,
    offset:     u64,
    num_tracks: usize,
    max_items:  u32,
) -> Result<Vec<TrackSamples>> {
    data.seek(offset);
    let masks = (0..num_tracks)
        .map(|_| TransformMask::read(data))
        .collect::<Result<Vec<_>>>()?;

    let begin = data.pos();
    let reader = BlockReader { begin, max_items };
    masks.iter().map(|mask| reader.decode_track(data, mask)).collect()
}

/// Per-block decode state: alignment origin and item-count limit.
struct BlockReader {
    begin:     u64,
    max_items: u32,
}

impl BlockReader {
    fn decode_track(&self, data: &mut ByteStream<'_>, mask: &TransformMask) -> Result<TrackSamples> {
        let positions = read_positions(data, self, mask)?;
        let rotations = read_rotations(data, self, mask)?;
        skip_scale(data, mask)?;
        Ok(TrackSamples { positions, rotations })
    }

    /// Item count and degree of a spline channel; leaves the cursor after the
    /// knot vector.
    fn read_spline_header(&self, data: &mut ByteStream<'_>) -> Result<(usize, u8)> {
        let num_items = data.read_u16()?;
        let degree    = data.read_u8()?;
        // items + 1 samples are read, at least one byte each
        let samples = u32::from(num_items) + 1;
        if samples > self.max_items || u64::from(samples) > data.remaining() {
            return Err(TagfileError::ArrayTooLarge { count: samples, limit: self.max_items });
        }
        data.skip(i64::from(num_items) + i64::from(degree) + 2)?;
        Ok((usize::from(num_items), degree))
    }
}

fn read_positions(
    data:   &mut ByteStream<'_>,
    reader: &BlockReader,
    mask:   &TransformMask,
) -> Result<Option<Vec<Vec3>>> {
    let axes = mask.position_axes();

    if !axes.any_spline() {
        if !axes.any_fixed() {
            return Ok(None);
        }
        let mut p = [0.0f32; 3];
        for axis in 0..3 {
            if axes.fixed[axis] {
                p[axis] = data.read_f32()?;
            }
        }
        return Ok(Some(vec![Vec3::from_array(p)]));
    }

    let quantization = QuantizationType::from_raw(mask.position_quantization())
        .ok_or_else(|| TagfileError::UnsupportedQuantization(format!(
            "position quantization type {}", mask.position_quantization()
        )))?;

    let (num_items, _degree) = reader.read_spline_header(data)?;
    data.align_from(reader.begin, 4);

    let mut min   = [0.0f32; 3];
    let mut max   = [0.0f32; 3];
    let mut fixed = [0.0f32; 3];
    for axis in 0..3 {
        if axes.spline[axis] {
            min[axis] = data.read_f32()?;
            max[axis] = data.read_f32()?;
        } else if axes.fixed[axis] {
            fixed[axis] = data.read_f32()?;
        }
    }

    let mut samples = Vec::with_capacity(num_items + 1);
    for _ in 0..=num_items {
        let mut p = fixed;
        for axis in 0..3 {
            if axes.spline[axis] {
                let t = read_unit_sample(data, quantization)?;
                p[axis] = lerp_range(min[axis], max[axis], t);
            }
        }
        samples.push(Vec3::from_array(p));
    }
    data.align_from(reader.begin, 4);

    Ok(Some(samples))
}

fn read_rotations(data: &mut ByteStream<'_>, reader: &BlockReader, mask: &TransformMask) -> Result<Vec<Quat>> {
    let quantization = mask.rotation_quantization();
    let mut rotations = Vec::new();

    if mask.rotation_spline() {
        let (num_items, _degree) = reader.read_spline_header(data)?;
        rotations.reserve(num_items + 1);
        for _ in 0..=num_items {
            rotations.push(read_rotation(data, quantization)?);
        }
    } else if mask.rotation_static() {
        rotations.push(read_rotation(data, quantization)?);
    }

    data.align_from(reader.begin, 4);
    Ok(rotations)
}

/// Scale is consumed but not kept.  Spline scale is not supported.
fn skip_scale(data: &mut ByteStream<'_>, mask: &TransformMask) -> Result<()> {
    let axes = mask.scale_axes();
    if axes.any_spline() {
        return Err(TagfileError::UnsupportedQuantization("spline-compressed scale".into()));
    }
    for _ in axes.fixed.iter().filter(|&&f| f) {
        data.skip(4)?;
    }
    Ok(())
}
