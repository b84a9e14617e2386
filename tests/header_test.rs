mod common;

use common::{build, skeleton_2010, sample_bones, Data};
use hkxtag::{DecodeOptions, HavokVersion, Tagfile, TagfileError};

fn sample_file(version: HavokVersion) -> Vec<u8> {
    let mut data = Data::new();
    skeleton_2010(&mut data, "Biped", &sample_bones());
    build(version, &data).bytes
}

#[test]
fn header_fields_are_preserved() {
    let bytes = sample_file(HavokVersion::Havok2010R1);
    let file = Tagfile::from_bytes(&bytes).unwrap();
    let header = file.header();

    assert_eq!(header.version, HavokVersion::Havok2010R1);
    assert_eq!(header.file_version, 8);
    assert_eq!(header.layout_rules, [4, 1, 0, 1]);
    assert_eq!(header.contents_index, 2);
    assert_eq!(header.class_names_index, 0);
    let names: Vec<&str> = header.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["__classnames__", "__types__", "__data__"]);
    assert_eq!(file.class_names().offset_of("hkaSkeleton").map(|o| o > 0), Some(true));
}

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = sample_file(HavokVersion::Havok2010R1);
    bytes[4] ^= 0xFF;
    match Tagfile::from_bytes(&bytes) {
        Err(TagfileError::InvalidFormat(msg)) => assert!(msg.contains("magic"), "{msg}"),
        other => panic!("expected InvalidFormat, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn unsupported_version_is_rejected() {
    let mut bytes = sample_file(HavokVersion::Havok2010R1);
    bytes[0x28..0x38].copy_from_slice(b"hk_2014.1.0-r1\0\0");
    match Tagfile::from_bytes(&bytes) {
        Err(TagfileError::UnsupportedVersion(v)) => assert_eq!(v, "hk_2014.1.0-r1"),
        other => panic!("expected UnsupportedVersion, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn header_checks_happen_before_sections_are_read() {
    // only the fixed header survives: a section read would hit end of file
    let mut bytes = sample_file(HavokVersion::Havok550R1);
    bytes.truncate(0x40);

    let mut bad_magic = bytes.clone();
    bad_magic[0] = 0;
    assert!(matches!(Tagfile::from_bytes(&bad_magic), Err(TagfileError::InvalidFormat(_))));

    let mut bad_version = bytes.clone();
    bad_version[0x28..0x38].copy_from_slice(b"Havok-6.0.0-r1\0\0");
    assert!(matches!(Tagfile::from_bytes(&bad_version), Err(TagfileError::UnsupportedVersion(_))));

    assert!(matches!(Tagfile::from_bytes(&bytes), Err(TagfileError::Io(_))));
}

#[test]
fn section_count_is_bounded() {
    let bytes = sample_file(HavokVersion::Havok2010R1);
    let opts = DecodeOptions { max_sections: 2, ..DecodeOptions::default() };
    assert!(matches!(
        Tagfile::with_options(&bytes, opts),
        Err(TagfileError::ArrayTooLarge { count: 3, limit: 2 })
    ));
}

#[test]
fn out_of_range_contents_index_is_invalid() {
    let mut bytes = sample_file(HavokVersion::Havok2010R1);
    bytes[0x18..0x1C].copy_from_slice(&7u32.to_le_bytes());
    assert!(matches!(Tagfile::from_bytes(&bytes), Err(TagfileError::InvalidFormat(_))));
}
