// Copyright 2021 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of decoding and encoding of on-the-wire names.

use super::{Error, Name, MAX_WIRE_LEN};

/// The maximum number of compression pointers that will be followed
/// while decoding a single name.
pub const MAX_POINTER_FOLLOWS: usize = 10;

/// Label-type bits of a length octet that mark a compression pointer.
const POINTER_TAG: u8 = 0xc0;

////////////////////////////////////////////////////////////////////////
// DECODING OF (POSSIBLY COMPRESSED) ON-THE-WIRE NAMES                //
////////////////////////////////////////////////////////////////////////

/// Decodes a name starting at index `start` of `octets`, following
/// compression pointers.
///
/// Indices given in pointers are treated as indices of `octets`, so
/// the intention is for an entire DNS message to be passed in
/// `octets`. On success, this returns the name along with the index at
/// which the caller should resume reading: just past the null label if
/// no pointer was followed, or just past the *first* pointer otherwise.
///
/// At most [`MAX_POINTER_FOLLOWS`] pointers are followed, which bounds
/// the work done for pointer loops. Pointers are otherwise allowed to
/// point anywhere inside `octets`.
pub fn decode_name(octets: &[u8], start: usize) -> Result<(Name, usize), Error> {
    let mut labels = Vec::new();
    let mut wire_len = 1;
    let mut index = start;
    let mut resume_at = None;
    let mut pointers_followed = 0;

    loop {
        let len = *octets.get(index).ok_or(Error::UnexpectedEom)?;
        match len & POINTER_TAG {
            0x00 if len == 0 => {
                index += 1;
                break;
            }
            0x00 => {
                let label_start = index + 1;
                let label_end = label_start + len as usize;
                let label = octets
                    .get(label_start..label_end)
                    .ok_or(Error::UnexpectedEom)?;

                // Checking as we go also bounds the number of labels we
                // collect.
                wire_len += label.len() + 1;
                if wire_len > MAX_WIRE_LEN {
                    return Err(Error::NameTooLong);
                }
                labels.push(label.into());
                index = label_end;
            }
            POINTER_TAG => {
                let low = *octets.get(index + 1).ok_or(Error::UnexpectedEom)?;
                if pointers_followed == MAX_POINTER_FOLLOWS {
                    return Err(Error::PointerLimitExceeded);
                }
                pointers_followed += 1;
                resume_at.get_or_insert(index + 2);
                index = u16::from_be_bytes([len & !POINTER_TAG, low]) as usize;
            }
            _ => return Err(Error::ReservedLabelType),
        }
    }

    Ok((Name { labels }, resume_at.unwrap_or(index)))
}

////////////////////////////////////////////////////////////////////////
// ENCODING OF UNCOMPRESSED ON-THE-WIRE NAMES                         //
////////////////////////////////////////////////////////////////////////

/// Appends the uncompressed on-the-wire form of `name` to `out`,
/// returning the new length of `out`.
///
/// The name is validated before anything is written, so `out` is left
/// untouched on failure. This never emits compression pointers; see
/// [`Compressor`](super::Compressor) for that.
pub fn encode_name(name: &Name, out: &mut Vec<u8>) -> Result<usize, Error> {
    name.validate()?;
    for label in name.raw_labels() {
        out.push(label.len() as u8);
        out.extend_from_slice(label);
    }
    out.push(0);
    Ok(out.len())
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_name_accepts_valid_uncompressed_names() {
        let octets = b"junk\x07example\x04test\x00junk";
        let target: Name = "example.test.".parse().unwrap();
        assert_eq!(decode_name(octets, 4), Ok((target, 18)));
    }

    #[test]
    fn decode_name_accepts_root() {
        assert_eq!(decode_name(b"\x00", 0), Ok((Name::root(), 1)));
    }

    #[test]
    fn decode_name_accepts_valid_compressed_names() {
        let octets = b"junk\x04test\x00junk\x07example\xc0\x04junk";
        let target: Name = "example.test.".parse().unwrap();
        assert_eq!(decode_name(octets, 14), Ok((target, 24)));
    }

    #[test]
    fn decode_name_resumes_after_first_pointer() {
        // The second chunk itself ends with a pointer to the first
        // chunk. Only the first pointer affects where we resume.
        let octets = b"\x03com\x00\x07example\xc0\x00\x03www\xc0\x05";
        let target: Name = "www.example.com.".parse().unwrap();
        assert_eq!(decode_name(octets, 15), Ok((target, 21)));
    }

    #[test]
    fn decode_name_rejects_pointer_loops() {
        assert_eq!(
            decode_name(b"\xc0\x00", 0),
            Err(Error::PointerLimitExceeded),
        );
        assert_eq!(
            decode_name(b"\x01a\xc0\x04\x01b\xc0\x00", 0),
            Err(Error::PointerLimitExceeded),
        );
    }

    #[test]
    fn decode_name_follows_up_to_the_pointer_limit() {
        // Build a chain of exactly MAX_POINTER_FOLLOWS pointers, each
        // pointing to the one before it, ending at a root name.
        let mut octets = vec![0];
        for i in 0..MAX_POINTER_FOLLOWS {
            let target = if i == 0 { 0 } else { 1 + 2 * (i - 1) };
            octets.extend_from_slice(&[0xc0, target as u8]);
        }
        let last = octets.len() - 2;
        assert_eq!(
            decode_name(&octets, last),
            Ok((Name::root(), octets.len()))
        );

        // One more link is too many.
        octets.extend_from_slice(&[0xc0, last as u8]);
        assert_eq!(
            decode_name(&octets, octets.len() - 2),
            Err(Error::PointerLimitExceeded),
        );
    }

    #[test]
    fn decode_name_rejects_reserved_label_types() {
        assert_eq!(decode_name(b"\x40", 0), Err(Error::ReservedLabelType));
        assert_eq!(decode_name(b"\x80\x00", 0), Err(Error::ReservedLabelType));
    }

    #[test]
    fn decode_name_rejects_unexpected_eom() {
        assert_eq!(
            decode_name(b"\x07example\x04tes", 0),
            Err(Error::UnexpectedEom)
        );
        assert_eq!(
            decode_name(b"\x07example", 0),
            Err(Error::UnexpectedEom)
        );
        assert_eq!(decode_name(b"\x01a\xc0", 0), Err(Error::UnexpectedEom));
        assert_eq!(decode_name(b"\x01a\xc0\x10", 0), Err(Error::UnexpectedEom));
        assert_eq!(decode_name(b"", 0), Err(Error::UnexpectedEom));
    }

    #[test]
    fn decode_name_rejects_long_names() {
        let mut octets = Vec::new();
        for _ in 0..128 {
            octets.extend_from_slice(b"\x01x");
        }
        octets.push(0);
        assert_eq!(decode_name(&octets, 0), Err(Error::NameTooLong));
    }

    #[test]
    fn decode_name_rejects_long_names_with_pointers() {
        // 100 labels of "x" (200 octets), then a second chunk of 30
        // labels pointing back to the first.
        let mut octets = Vec::new();
        for _ in 0..100 {
            octets.extend_from_slice(b"\x01x");
        }
        octets.push(0);
        let start = octets.len();
        for _ in 0..30 {
            octets.extend_from_slice(b"\x01x");
        }
        octets.extend_from_slice(b"\xc0\x00");
        assert_eq!(decode_name(&octets, start), Err(Error::NameTooLong));
    }

    #[test]
    fn encode_name_works() {
        let name: Name = "www.example.com".parse().unwrap();
        let mut out = b"junk".to_vec();
        assert_eq!(encode_name(&name, &mut out), Ok(21));
        assert_eq!(out, b"junk\x03www\x07example\x03com\x00");
    }

    #[test]
    fn encode_name_encodes_root() {
        let mut out = Vec::new();
        assert_eq!(encode_name(&Name::root(), &mut out), Ok(1));
        assert_eq!(out, b"\x00");
    }

    #[test]
    fn encode_name_rejects_long_labels() {
        let name: Name = format!("{}.test.", "x".repeat(64)).parse().unwrap();
        let mut out = Vec::new();
        assert_eq!(encode_name(&name, &mut out), Err(Error::LabelTooLong));
        assert!(out.is_empty());
    }

    #[test]
    fn encode_name_accepts_maximal_labels_and_names() {
        let label = "x".repeat(63);
        let text = format!("{0}.{0}.{0}.{1}.", label, "y".repeat(61));
        let name: Name = text.parse().unwrap();
        assert_eq!(name.wire_len(), MAX_WIRE_LEN);
        let mut out = Vec::new();
        assert_eq!(encode_name(&name, &mut out), Ok(MAX_WIRE_LEN));
        assert_eq!(decode_name(&out, 0), Ok((name, MAX_WIRE_LEN)));
    }

    #[test]
    fn names_round_trip() {
        for text in [".", "a.", "www.example.com.", "\\000.\\255.x\\.y."] {
            let name: Name = text.parse().unwrap();
            let mut out = Vec::new();
            let end = encode_name(&name, &mut out).unwrap();
            assert_eq!(decode_name(&out, 0), Ok((name, end)));
        }
    }
}
