//! Quantization primitives of spline-compressed animation data.
//!
//! # Transform mask
//! Every track in every block starts with a 4-byte mask:
//! ```text
//! byte 0  quantization   [scale:2][rotation:4][position:2]   (MSB..LSB)
//! byte 1  position types bit 0..2 static X/Y/Z, bit 4..6 spline X/Y/Z
//! byte 2  rotation types low nibble static, high nibble spline
//! byte 3  scale types    same layout as position types
//! ```
//! The rotation quantization nibble is offset by 2: raw 0 is 32-bit,
//! raw 1 is the 40-bit format, and so on.
//!
//! # 40-bit quaternion
//! ```text
//! bits  0..12  x   (biased by 0x801)
//! bits 12..24  y
//! bits 24..36  z
//! bits 36..38  slot of the dropped component
//! bit  38      dropped component is negative
//! bit  39      unused
//! ```
//! The encoder drops the component with the largest magnitude; the decoder
//! rebuilds it from the unit-length constraint and reinserts it at `slot`.

pub mod spline;

use glam::Quat;
use serde::Serialize;

use crate::error::{Result, TagfileError};
use crate::stream::ByteStream;

/// Scale of one 12-bit step of a 40-bit quaternion component.
pub const QUAT40_FRACTION: f32 = 0.000_345_436;
/// Bias subtracted from each raw 12-bit component.
pub const QUAT40_BIAS: i32 = 0x801;
pub const QUAT40_SIZE: usize = 5;

// ── Quantization types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuantizationType {
    Bits8  = 0,
    Bits16 = 1,
    Bits32 = 2,
    Bits40 = 3,
    Bits48 = 4,
}

impl QuantizationType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(QuantizationType::Bits8),
            1 => Some(QuantizationType::Bits16),
            2 => Some(QuantizationType::Bits32),
            3 => Some(QuantizationType::Bits40),
            4 => Some(QuantizationType::Bits48),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QuantizationType::Bits8  => "8-bit",
            QuantizationType::Bits16 => "16-bit",
            QuantizationType::Bits32 => "32-bit",
            QuantizationType::Bits40 => "40-bit",
            QuantizationType::Bits48 => "48-bit",
        }
    }
}

// ── Transform mask ───────────────────────────────────────────────────────────

/// Per-axis static/spline flags of one position or scale channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisFlags {
    pub spline: [bool; 3],
    pub fixed:  [bool; 3],
}

impl AxisFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            spline: [bits & 0x10 != 0, bits & 0x20 != 0, bits & 0x40 != 0],
            fixed:  [bits & 0x01 != 0, bits & 0x02 != 0, bits & 0x04 != 0],
        }
    }

    pub fn any_spline(&self) -> bool {
        self.spline.iter().any(|&b| b)
    }

    pub fn any_fixed(&self) -> bool {
        self.fixed.iter().any(|&b| b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformMask {
    pub quantization_types: u8,
    pub position_types:     u8,
    pub rotation_types:     u8,
    pub scale_types:        u8,
}

impl TransformMask {
    pub const SIZE: u64 = 4;

    pub fn read(stream: &mut ByteStream<'_>) -> Result<Self> {
        Ok(Self {
            quantization_types: stream.read_u8()?,
            position_types:     stream.read_u8()?,
            rotation_types:     stream.read_u8()?,
            scale_types:        stream.read_u8()?,
        })
    }

    pub fn position_quantization(&self) -> u8 {
        self.quantization_types & 0x03
    }

    pub fn rotation_quantization(&self) -> u8 {
        ((self.quantization_types >> 2) & 0x0F) + 2
    }

    pub fn scale_quantization(&self) -> u8 {
        (self.quantization_types >> 6) & 0x03
    }

    pub fn position_axes(&self) -> AxisFlags {
        AxisFlags::from_bits(self.position_types)
    }

    pub fn scale_axes(&self) -> AxisFlags {
        AxisFlags::from_bits(self.scale_types)
    }

    pub fn rotation_spline(&self) -> bool {
        self.rotation_types & 0xF0 != 0
    }

    pub fn rotation_static(&self) -> bool {
        self.rotation_types & 0x0F != 0
    }
}

// ── Scalar dequantization ────────────────────────────────────────────────────

/// Map a raw fixed-point sample to `[0, 1]`.
pub fn dequantize(raw: u32, quantization: QuantizationType) -> Result<f32> {
    match quantization {
        QuantizationType::Bits8  => Ok(raw as f32 / 255.0),
        QuantizationType::Bits16 => Ok(raw as f32 / 65535.0),
        other => Err(TagfileError::UnsupportedQuantization(format!(
            "{} position samples", other.name()
        ))),
    }
}

/// Read one fixed-point sample and map it to `[0, 1]`.
pub fn read_unit_sample(stream: &mut ByteStream<'_>, quantization: QuantizationType) -> Result<f32> {
    let raw = match quantization {
        QuantizationType::Bits8  => u32::from(stream.read_u8()?),
        QuantizationType::Bits16 => u32::from(stream.read_u16()?),
        other => return Err(TagfileError::UnsupportedQuantization(format!(
            "{} position samples", other.name()
        ))),
    };
    dequantize(raw, quantization)
}

#[inline]
pub fn lerp_range(min: f32, max: f32, t: f32) -> f32 {
    min + (max - min) * t
}

// ── 40-bit quaternion ────────────────────────────────────────────────────────

pub fn decode_quat40(raw: u64) -> Quat {
    let component = |shift: u32| ((raw >> shift) & 0xFFF) as i32 - QUAT40_BIAS;

    let mut q = [
        component(0)  as f32 * QUAT40_FRACTION,
        component(12) as f32 * QUAT40_FRACTION,
        component(24) as f32 * QUAT40_FRACTION,
        0.0,
    ];
    let slot   = ((raw >> 36) & 0x3) as usize;
    let invert = (raw >> 38) & 0x1 != 0;

    let mut w = (1.0 - (q[0] * q[0] + q[1] * q[1] + q[2] * q[2])).max(0.0).sqrt();
    if invert {
        w = -w;
    }
    q[3] = w;
    q[slot..].rotate_right(1);

    Quat::from_xyzw(q[0], q[1], q[2], q[3])
}

pub fn read_quat40(stream: &mut ByteStream<'_>) -> Result<Quat> {
    Ok(decode_quat40(stream.read_uint(QUAT40_SIZE)?))
}

/// Read one rotation sample in the given (raw, offset-applied) quantization.
pub fn read_rotation(stream: &mut ByteStream<'_>, quantization: u8) -> Result<Quat> {
    match QuantizationType::from_raw(quantization) {
        Some(QuantizationType::Bits40) => read_quat40(stream),
        Some(other) => Err(TagfileError::UnsupportedQuantization(format!(
            "{} rotation samples", other.name()
        ))),
        None => Err(TagfileError::UnsupportedQuantization(format!(
            "rotation quantization type {quantization}"
        ))),
    }
}
