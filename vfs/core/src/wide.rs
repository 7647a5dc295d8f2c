//! UTF-8 ↔ UTF-16 conversion for wire paths and directory entry names.
//!
//! Both directions are strict: malformed input and over-length output are
//! rejected, never truncated.

use crate::error::{SdmcError, SdmcErrorKind, SdmcResult};

/// Longest directory entry name, in UTF-8 bytes, that can be handed back to
/// a caller (exclusive).
pub const NAME_MAX: usize = 255;

/// Encode `src` into `dst` and append a NUL terminator.
///
/// `dst` is cleared first. Fails with `NameTooLong` once the unit count
/// reaches `limit`, which keeps one slot free for the terminator. Returns the
/// number of units written, terminator excluded.
pub fn utf8_to_utf16(src: &[u8], dst: &mut Vec<u16>, limit: usize) -> SdmcResult<usize> {
    let text = std::str::from_utf8(src)
        .map_err(|_| SdmcError::new(SdmcErrorKind::EncodingError, "wide.encode"))?;

    dst.clear();
    for unit in text.encode_utf16() {
        if dst.len() + 1 >= limit {
            dst.clear();
            return Err(SdmcError::new(SdmcErrorKind::NameTooLong, "wide.encode"));
        }
        dst.push(unit);
    }
    let units = dst.len();
    dst.push(0);
    Ok(units)
}

/// Decode `src` up to its first NUL unit into `dst`.
///
/// `dst` is cleared first. Fails with `NameTooLong` if the UTF-8 form is
/// `limit` bytes or longer.
pub fn utf16_to_utf8(src: &[u16], dst: &mut String, limit: usize) -> SdmcResult<usize> {
    let end = src.iter().position(|&unit| unit == 0).unwrap_or(src.len());

    dst.clear();
    for ch in char::decode_utf16(src[..end].iter().copied()) {
        let ch = ch.map_err(|_| SdmcError::new(SdmcErrorKind::EncodingError, "wide.decode"))?;
        if dst.len() + ch.len_utf8() >= limit {
            dst.clear();
            return Err(SdmcError::new(SdmcErrorKind::NameTooLong, "wide.decode"));
        }
        dst.push(ch);
    }
    Ok(dst.len())
}

pub fn decode_entry_name(units: &[u16]) -> SdmcResult<String> {
    let mut name = String::new();
    utf16_to_utf8(units, &mut name, NAME_MAX)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encodes_with_terminator() {
        let mut wide = Vec::new();
        let units = utf8_to_utf16("/a/é".as_bytes(), &mut wide, 16).unwrap();
        assert_eq!(units, 4);
        assert_eq!(wide, vec![b'/' as u16, b'a' as u16, b'/' as u16, 0xE9, 0]);
    }

    #[test]
    fn names_survive_the_round_trip() {
        let mut wide = Vec::new();
        for name in ["notes.txt", "日本語", "emoji 😀 dir", ""] {
            utf8_to_utf16(name.as_bytes(), &mut wide, 64).unwrap();
            assert_eq!(decode_entry_name(&wide).unwrap(), name);
        }
    }

    #[test]
    fn rejects_malformed_utf8() {
        let mut wide = Vec::new();
        let err = utf8_to_utf16(b"/bad\xffname", &mut wide, 64).unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::EncodingError);
    }

    #[test]
    fn rejects_unpaired_surrogate() {
        let err = decode_entry_name(&[b'a' as u16, 0xD800, b'b' as u16]).unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::EncodingError);
    }

    #[test]
    fn limit_reserves_the_terminator_slot() {
        let mut wide = Vec::new();
        assert_eq!(utf8_to_utf16(b"abc", &mut wide, 4).unwrap(), 3);
        let err = utf8_to_utf16(b"abcd", &mut wide, 4).unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::NameTooLong);
        assert!(wide.is_empty());
    }

    #[test]
    fn long_entry_names_are_rejected() {
        let fits: Vec<u16> = std::iter::repeat_n(b'x' as u16, NAME_MAX - 1).collect();
        assert_eq!(decode_entry_name(&fits).unwrap().len(), NAME_MAX - 1);

        // 200 two-byte characters: short in UTF-16, too long in UTF-8.
        let wide: Vec<u16> = std::iter::repeat_n(0xE9, 200).collect();
        let err = decode_entry_name(&wide).unwrap_err();
        assert_eq!(err.kind(), SdmcErrorKind::NameTooLong);
    }

    #[test]
    fn decoding_stops_at_nul() {
        let units = [b'a' as u16, b'b' as u16, 0, b'c' as u16];
        assert_eq!(decode_entry_name(&units).unwrap(), "ab");
    }
}
