//! Unit tests for the NDN packet types

use super::*;

#[test]
fn test_name_creation() {
    // Create a name from a string
    let name = Name::from_string("/test/data/1").unwrap();

    // Check the components
    assert_eq!(name.len(), 3);
    assert_eq!(name.get(0).unwrap().as_bytes().as_ref(), b"test");
    assert_eq!(name.get(1).unwrap().as_bytes().as_ref(), b"data");
    assert_eq!(name.get(2).unwrap().as_bytes().as_ref(), b"1");

    // Convert back to string
    assert_eq!(name.to_string(), "/test/data/1");

    // Empty and root names
    assert!(Name::new().is_empty());
    assert_eq!(Name::from_string("/").unwrap(), Name::new());
    assert_eq!(Name::new().to_string(), "/");
}

#[test]
fn test_name_limits() {
    let long = format!("/{}", "x".repeat(MAX_NAME_COMPONENT_LENGTH + 1));
    assert!(Name::from_string(&long).is_err());

    let deep = "/c".repeat(MAX_NAME_COMPONENTS + 1);
    assert!(Name::from_string(&deep).is_err());
}

#[test]
fn test_name_compare() {
    let name1 = Name::from_string("/a/b/c").unwrap();
    let name2 = Name::from_string("/a/b/c").unwrap();
    let name3 = Name::from_string("/a/b/d").unwrap();
    let name4 = Name::from_string("/a/b").unwrap();

    assert_eq!(name1, name2);
    assert_ne!(name1, name3);
    assert_ne!(name1, name4);

    // Test prefix matching
    assert!(name4.is_prefix_of(&name1));
    assert!(!name1.is_prefix_of(&name4));
    assert!(!name3.is_prefix_of(&name1));

    // Componentwise lexicographic ordering: a prefix sorts first
    assert!(name4 < name1);
    assert!(name1 < name3);
}

#[test]
fn test_name_appending() {
    let base = Name::from_string("/video").unwrap();
    let full = base.appending("segment-0").appending("hash");

    assert_eq!(full.to_string(), "/video/segment-0/hash");
    assert!(base.is_prefix_of(&full));
    assert_eq!(full.prefix(1), base);
}

#[test]
fn test_interest_header() {
    let name = Name::from_string("/test/interest").unwrap();
    let interest = InterestHeader::new(name.clone())
        .with_nonce(42)
        .with_lifetime(Duration::from_millis(2000));

    assert_eq!(interest.name, name);
    assert_eq!(interest.nonce, 42);
    assert_eq!(interest.lifetime, Duration::from_millis(2000));

    // Untouched fields keep their defaults
    assert_eq!(interest.scope, -1);
    assert_eq!(interest.min_suffix_components, -1);
    assert_eq!(interest.nack_type, NackType::Normal);
    assert_eq!(interest.agent, 0);
    assert!(!interest.has_locator());
}

#[test]
fn test_interest_locator() {
    let name = Name::from_string("/video/seg1").unwrap();
    let locator = Name::from_string("/isp/pop3").unwrap();
    let interest = InterestHeader::new(name).with_locator(locator.clone());

    assert!(interest.has_locator());
    assert_eq!(interest.locator, Some(locator));

    // An attached but empty locator does not count
    let interest = InterestHeader::new(Name::from_string("/x").unwrap()).with_locator(Name::new());
    assert!(!interest.has_locator());
}

#[test]
fn test_content_object_header() {
    let name = Name::from_string("/test/data").unwrap();
    let header = ContentObjectHeader::new(name.clone())
        .with_position(1)
        .with_timestamp(Timestamp::from_millis(250))
        .with_signature_bits(0xdead_beef);

    assert_eq!(header.name, name);
    assert_eq!(header.position, 1);
    assert_eq!(header.signed_info.timestamp, Timestamp::from_millis(250));
    assert_eq!(header.signature.signature_bits, 0xdead_beef);
    assert_eq!(header.locator, None);
}

#[test]
fn test_packet_accessors() {
    let name = Name::from_string("/pkt").unwrap();
    let interest = Packet::Interest(InterestHeader::new(name.clone()).with_nonce(7));
    let data = Packet::Data {
        header: ContentObjectHeader::new(name.clone()),
        payload: Bytes::from_static(b"Hello, NDN!"),
    };

    assert!(interest.is_interest());
    assert!(!data.is_interest());
    assert_eq!(interest.name(), &name);
    assert_eq!(data.name(), &name);
    assert_eq!(interest.as_interest().unwrap().nonce, 7);
    assert_eq!(data.as_data().unwrap().1.as_ref(), b"Hello, NDN!");
    assert!(data.as_interest().is_none());
}
