//! Synthetic packfile builder shared by the integration tests.
//!
//! Produces three sections, `__classnames__`, `__types__` (empty) and
//! `__data__`, with the header written through [`Header::write`].
#![allow(dead_code)]

use hkxtag::{HavokVersion, Header, Section};

pub const CLASS_NAMES_SECTION: u32 = 0;
pub const TYPES_SECTION:       u32 = 1;
pub const DATA_SECTION:        u32 = 2;

// ── Data section ─────────────────────────────────────────────────────────────

/// Contents of `__data__` plus its relocations and object list.  All offsets
/// are relative to the section start.
#[derive(Default)]
pub struct Data {
    pub bytes:   Vec<u8>,
    pub local:   Vec<(u32, u32)>,
    pub global:  Vec<(u32, u32, u32)>,
    pub objects: Vec<(u32, String)>,
}

impl Data {
    /// Starts with 16 reserved bytes: a fixup target of 0 is invalid, so no
    /// object may live at offset 0.
    pub fn new() -> Self {
        let mut data = Self::default();
        data.zeros(16);
        data
    }

    pub fn pos(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn zeros(&mut self, n: usize) -> &mut Self {
        self.bytes.resize(self.bytes.len() + n, 0);
        self
    }

    pub fn align(&mut self, alignment: usize) -> &mut Self {
        while self.bytes.len() % alignment != 0 {
            self.bytes.push(0);
        }
        self
    }

    pub fn cstr(&mut self, s: &str) -> u32 {
        let at = self.pos();
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        at
    }

    /// Start an object of `class`, 16-byte aligned; returns its offset.
    pub fn object(&mut self, class: &str) -> u32 {
        self.align(16);
        let at = self.pos();
        self.objects.push((at, class.to_string()));
        at
    }

    /// Pointer field, linked later.
    pub fn slot(&mut self) -> u32 {
        let at = self.pos();
        self.u32(0);
        at
    }

    /// hkArray header with a pointer slot; returns the slot.
    pub fn array_slot(&mut self, count: u32) -> u32 {
        let slot = self.slot();
        self.u32(count).u32(count | 0x8000_0000);
        slot
    }

    /// Empty hkArray: unrelocated pointer, zero count.
    pub fn empty_array(&mut self) -> &mut Self {
        self.u32(0).u32(0).u32(0x8000_0000)
    }

    pub fn link(&mut self, slot: u32, target: u32) {
        self.local.push((slot, target));
    }

    /// Link `slot` to the current position.
    pub fn link_here(&mut self, slot: u32) {
        let at = self.pos();
        self.link(slot, at);
    }

    pub fn link_global(&mut self, slot: u32, section: u32, target: u32) {
        self.global.push((slot, section, target));
    }

    /// NUL-terminated string placed at the current position, pointed to by `slot`.
    pub fn string(&mut self, slot: u32, s: &str) {
        let at = self.cstr(s);
        self.link(slot, at);
    }
}

// ── Packfile ─────────────────────────────────────────────────────────────────

pub struct Built {
    pub bytes:      Vec<u8>,
    pub data_start: u32,
}

impl Built {
    /// Absolute address of a data-section offset.
    pub fn address(&self, offset: u32) -> u32 {
        self.data_start + offset
    }
}

pub fn build(version: HavokVersion, data: &Data) -> Built {
    let mut file = vec![0u8; 0x40 + 3 * 48];

    // ── __classnames__ ───────────────────────────────────────────────────────
    let class_start = file.len() as u32;
    let mut class_offsets: Vec<(String, u32)> = Vec::new();
    for (_, class) in &data.objects {
        if class_offsets.iter().any(|(c, _)| c == class) {
            continue;
        }
        file.extend_from_slice(&0x3A5C_1E02u32.to_le_bytes());
        file.push(0x09);
        class_offsets.push((class.clone(), file.len() as u32 - class_start));
        file.extend_from_slice(class.as_bytes());
        file.push(0);
    }
    file.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    pad(&mut file, 16, 0xFF);
    let class_end = file.len() as u32 - class_start;

    // ── __types__ ────────────────────────────────────────────────────────────
    let types_start = file.len() as u32;

    // ── __data__ ─────────────────────────────────────────────────────────────
    let data_start = file.len() as u32;
    file.extend_from_slice(&data.bytes);
    pad(&mut file, 16, 0);

    let local_offset = file.len() as u32 - data_start;
    for &(source, target) in &data.local {
        push_u32s(&mut file, &[source, target]);
    }
    pad(&mut file, 16, 0xFF);

    let global_offset = file.len() as u32 - data_start;
    for &(source, section, target) in &data.global {
        push_u32s(&mut file, &[source, section, target]);
    }
    pad(&mut file, 16, 0xFF);

    let virtual_offset = file.len() as u32 - data_start;
    for (offset, class) in &data.objects {
        let name = class_offsets
            .iter()
            .find(|(c, _)| c == class)
            .map(|&(_, off)| off)
            .unwrap();
        push_u32s(&mut file, &[*offset, CLASS_NAMES_SECTION, name]);
    }
    pad(&mut file, 16, 0xFF);
    let data_end = file.len() as u32 - data_start;

    let header = Header {
        user_tag:           0,
        file_version:       match version {
            HavokVersion::Havok550R1  => 7,
            HavokVersion::Havok2010R1 => 8,
        },
        layout_rules:       [4, 1, 0, 1],
        contents_index:     DATA_SECTION,
        contents_offset:    0,
        class_names_index:  CLASS_NAMES_SECTION,
        class_names_offset: 0x4B,
        version,
        flags:              0,
        sections:           vec![
            uniform_section("__classnames__", class_start, class_end),
            uniform_section("__types__", types_start, 0),
            Section {
                name:                  "__data__".into(),
                absolute_data_start:   data_start,
                local_fixups_offset:   local_offset,
                global_fixups_offset:  global_offset,
                virtual_fixups_offset: virtual_offset,
                exports_offset:        data_end,
                imports_offset:        data_end,
                end_offset:            data_end,
            },
        ],
    };
    let mut head = Vec::new();
    header.write(&mut head).unwrap();
    file[..head.len()].copy_from_slice(&head);

    Built { bytes: file, data_start }
}

/// Section without fixups: every table offset equals the end.
fn uniform_section(name: &str, start: u32, end: u32) -> Section {
    Section {
        name:                  name.into(),
        absolute_data_start:   start,
        local_fixups_offset:   end,
        global_fixups_offset:  end,
        virtual_fixups_offset: end,
        exports_offset:        end,
        imports_offset:        end,
        end_offset:            end,
    }
}

fn pad(file: &mut Vec<u8>, alignment: usize, fill: u8) {
    while file.len() % alignment != 0 {
        file.push(fill);
    }
}

fn push_u32s(file: &mut Vec<u8>, values: &[u32]) {
    for v in values {
        file.extend_from_slice(&v.to_le_bytes());
    }
}

// ── Object writers ───────────────────────────────────────────────────────────

pub struct BoneSpec {
    pub name:     &'static str,
    pub parent:   i16,
    pub position: [f32; 3],
    /// x, y, z, w
    pub rotation: [f32; 4],
    pub scale:    [f32; 3],
    pub locked:   bool,
}

pub fn sample_bones() -> Vec<BoneSpec> {
    let half = std::f32::consts::FRAC_1_SQRT_2;
    vec![
        BoneSpec { name: "Root",  parent: -1, position: [0.0, 0.0, 0.0], rotation: [0.0, 0.0, 0.0, 1.0],   scale: [1.0; 3], locked: true },
        BoneSpec { name: "Spine", parent: 2,  position: [0.0, 0.2, 0.0], rotation: [half, 0.0, 0.0, half], scale: [1.0; 3], locked: false },
        BoneSpec { name: "Hips",  parent: 0,  position: [0.0, 1.0, 0.0], rotation: [0.0, 0.0, half, half], scale: [1.0, 2.0, 1.0], locked: false },
    ]
}

fn write_pose(data: &mut Data, bones: &[BoneSpec]) {
    for b in bones {
        data.f32(b.position[0]).f32(b.position[1]).f32(b.position[2]).f32(0.0);
        data.f32(b.rotation[3]).f32(b.rotation[0]).f32(b.rotation[1]).f32(b.rotation[2]);
        data.f32(b.scale[0]).f32(b.scale[1]).f32(b.scale[2]).f32(0.0);
    }
}

/// `hkaSkeleton` in the `hk_2010.2.0-r1` layout; returns the object offset.
pub fn skeleton_2010(data: &mut Data, name: &str, bones: &[BoneSpec]) -> u32 {
    let object = data.object("hkaSkeleton");
    data.zeros(8);
    let name_slot = data.slot();
    let parents = data.array_slot(bones.len() as u32);
    let bone_array = data.array_slot(bones.len() as u32);
    let pose = data.array_slot(bones.len() as u32);
    for _ in 0..4 {
        data.empty_array();
    }

    data.link_here(parents);
    for b in bones {
        data.i16(b.parent);
    }
    data.align(4);

    data.link_here(bone_array);
    let name_slots: Vec<u32> = bones
        .iter()
        .map(|b| {
            let slot = data.slot();
            data.u32(b.locked as u32);
            slot
        })
        .collect();

    data.align(16);
    data.link_here(pose);
    write_pose(data, bones);

    data.string(name_slot, name);
    for (slot, b) in name_slots.into_iter().zip(bones) {
        data.string(slot, b.name);
    }
    object
}

/// `hkaSkeleton` in the `Havok-5.5.0-r1` layout; returns the object offset.
pub fn skeleton_550(data: &mut Data, name: &str, bones: &[BoneSpec]) -> u32 {
    let object = data.object("hkaSkeleton");
    let name_slot = data.slot();
    let parents = data.slot();
    data.u32(bones.len() as u32);
    let bone_array = data.slot();
    data.u32(bones.len() as u32);
    let pose = data.slot();
    data.u32(bones.len() as u32);

    data.link_here(parents);
    for b in bones {
        data.i16(b.parent);
    }
    data.align(4);

    data.link_here(bone_array);
    let pointers: Vec<u32> = bones.iter().map(|_| data.slot()).collect();

    let mut name_slots = Vec::new();
    for (pointer, b) in pointers.into_iter().zip(bones) {
        data.link_here(pointer);
        name_slots.push(data.slot());
        data.u32(b.locked as u32);
    }

    data.align(16);
    data.link_here(pose);
    write_pose(data, bones);

    data.string(name_slot, name);
    for (slot, b) in name_slots.into_iter().zip(bones) {
        data.string(slot, b.name);
    }
    object
}

/// `hkaSplineCompressedAnimation` with raw `blocks` and one annotation per
/// name; returns the object offset.
pub fn animation(data: &mut Data, num_tracks: u32, blocks: &[Vec<u8>], annotations: &[&str]) -> u32 {
    let object = data.object("hkaSplineCompressedAnimation");
    data.zeros(8).u32(3).f32(2.0).u32(num_tracks).u32(0);
    data.slot();
    let annotation_slot = data.array_slot(annotations.len() as u32);
    data.u32(60).u32(blocks.len() as u32).u32(256).u32(4 * num_tracks);
    data.f32(2.0).f32(0.5).f32(1.0 / 30.0);
    let offsets_slot = data.array_slot(blocks.len() as u32);
    for _ in 0..3 {
        data.empty_array();
    }
    let total: usize = blocks.iter().map(Vec::len).sum();
    let data_slot = data.array_slot(total as u32);

    data.link_here(offsets_slot);
    let mut offset = 0u32;
    for block in blocks {
        data.u32(offset);
        offset += block.len() as u32;
    }

    data.align(16);
    data.link_here(data_slot);
    for block in blocks {
        data.raw(block);
    }
    data.align(4);

    if !annotations.is_empty() {
        data.link_here(annotation_slot);
        let slots: Vec<u32> = annotations
            .iter()
            .map(|_| {
                let slot = data.slot();
                data.u32(0).u32(0).f32(0.0);
                slot
            })
            .collect();
        for (slot, name) in slots.into_iter().zip(annotations) {
            data.string(slot, name);
        }
    }
    object
}

// ── Block writer ─────────────────────────────────────────────────────────────

/// Byte builder for one spline block.  Alignment is relative to the end of
/// the mask run, which callers mark with [`Block::begin`].
#[derive(Default)]
pub struct Block {
    pub bytes: Vec<u8>,
    begin:     usize,
}

impl Block {
    pub fn mask(&mut self, quant: u8, position: u8, rotation: u8, scale: u8) -> &mut Self {
        self.bytes.extend_from_slice(&[quant, position, rotation, scale]);
        self
    }

    pub fn begin(&mut self) -> &mut Self {
        self.begin = self.bytes.len();
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.bytes.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.bytes.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Spline header: item count, degree and `items + degree + 2` knot bytes.
    pub fn spline(&mut self, items: u16, degree: u8) -> &mut Self {
        self.u16(items).u8(degree);
        for k in 0..(usize::from(items) + usize::from(degree) + 2) {
            self.bytes.push(k as u8);
        }
        self
    }

    pub fn align(&mut self) -> &mut Self {
        while (self.bytes.len() - self.begin) % 4 != 0 {
            self.bytes.push(0);
        }
        self
    }

    pub fn quat40(&mut self, q: [f32; 4]) -> &mut Self {
        self.bytes.extend_from_slice(&encode_quat40(q).to_le_bytes()[..5]);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

/// Pack a unit quaternion (x, y, z, w) into the 40-bit layout: the component
/// stored implicitly goes to `slot`, its sign in bit 38.
pub fn encode_quat40_slot(q: [f32; 4], slot: usize) -> u64 {
    const FRACTION: f32 = 0.000_345_436;
    let mut v = q;
    // stored order: the three explicit components, then the implicit one
    v[slot..].rotate_left(1);
    let field = |c: f32| -> u64 { ((c / FRACTION).round() as i32 + 0x801).clamp(0, 0xFFF) as u64 };
    let negative = v[3] < 0.0;
    field(v[0])
        | field(v[1]) << 12
        | field(v[2]) << 24
        | (slot as u64) << 36
        | (negative as u64) << 38
}

/// 40-bit encoding with the largest-magnitude component implicit.
pub fn encode_quat40(q: [f32; 4]) -> u64 {
    let slot = (0..4)
        .max_by(|&a, &b| q[a].abs().total_cmp(&q[b].abs()))
        .unwrap();
    encode_quat40_slot(q, slot)
}
