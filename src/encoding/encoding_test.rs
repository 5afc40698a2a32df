use super::*;

fn decode(data: &[u8]) -> (Vec<u8>, LineInfo) {
    let mut out = Vec::new();
    let info = decode_line(data, &mut out);
    (out, info)
}

#[test]
fn ascii_line() {
    let (decoded, info) = decode(b"Hello, world!");
    assert_eq!(decoded, b"Hello, world!");
    assert!(!info.ascii28);
    assert!(info.ascii_only);
    assert!(info.valid_utf8);
    assert_eq!(info.length, 13);
}

#[test]
fn ascii28_is_flagged_and_kept() {
    let (decoded, info) = decode(b"Hello\x1Cthere");
    assert_eq!(decoded, b"Hello\x1Cthere");
    assert!(info.ascii28);
}

#[test]
fn iso_8859_1_fallback() {
    // 0xE9 is 'e acute' in ISO-8859-1 and invalid as a lone UTF-8 byte
    let (decoded, info) = decode(&[0x48, 0x69, 0x20, 0xE9]);
    assert_eq!(decoded, "Hi é".as_bytes());
    assert!(!info.valid_utf8);
    assert!(!info.ascii28);
}

#[test]
fn valid_utf8_copied_verbatim() {
    let input = "El Niño".as_bytes();
    let (decoded, info) = decode(input);
    assert_eq!(decoded, input);
    assert!(info.valid_utf8);
    assert!(!info.ascii_only);
}

#[test]
fn invalid_utf8_triggers_fallback() {
    // 0xF0 0x28 is an invalid sequence; every byte is transliterated
    let (decoded, info) = decode(&[0xF0, 0x28, 0x9F]);
    assert!(!info.valid_utf8);
    assert_eq!(decoded, &[0xC3, 0xB0, 0x28, 0xC2, 0x9F]);
    // The fallback output is well-formed UTF-8
    assert!(std::str::from_utf8(&decoded).is_ok());
}

#[test]
fn scan_stops_at_null() {
    let (decoded, info) = decode(b"abc\0def");
    assert_eq!(decoded, b"abc");
    assert_eq!(info.length, 3);
}

#[test]
fn ascii28_flag_survives_fallback() {
    let (decoded, info) = decode(&[b'a', 0x1C, 0xE9]);
    assert!(info.ascii28);
    assert!(!info.valid_utf8);
    assert_eq!(decoded, &[b'a', 0x1C, 0xC3, 0xA9]);
}
