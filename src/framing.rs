//! Byte-stuffing codec for the framed octet protocol.
//!
//! A payload travels as `SOP, stuffed(payload), EOP`. Inside the frame,
//! each occurrence of a reserved octet (`0x80`–`0x82`) is replaced by the
//! escape octet followed by `original - 0x80`; everything else is copied
//! verbatim.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Start-of-packet delimiter.
pub const SOP: u8 = 0x81;
/// End-of-packet delimiter.
pub const EOP: u8 = 0x82;
/// Escape octet.
pub const ESC: u8 = 0x80;

/// Encodes `payload` into a complete frame, delimiters included.
///
/// An empty payload is legal and produces the two-byte frame `SOP, EOP`.
pub fn encode_frame(payload: &[u8]) -> BytesMut {
    let mut out = BytesMut::with_capacity(payload.len() + 2);
    out.put_u8(SOP);
    for &b in payload {
        if (ESC..=EOP).contains(&b) {
            out.put_u8(ESC);
            out.put_u8(b - ESC);
        } else {
            out.put_u8(b);
        }
    }
    out.put_u8(EOP);
    out
}

/// Reverses the stuffing of the bytes strictly between SOP and EOP.
pub fn unstuff(stuffed: &[u8]) -> Result<BytesMut> {
    let mut out = BytesMut::with_capacity(stuffed.len());
    let mut iter = stuffed.iter();
    while let Some(&b) = iter.next() {
        if b == ESC {
            match iter.next() {
                Some(&s) if s <= 0x02 => out.put_u8(ESC + s),
                _ => return Err(Error::InvalidEscape),
            }
        } else {
            out.put_u8(b);
        }
    }
    Ok(out)
}

/// Pulls complete frames out of an accumulation buffer.
///
/// `decode` consumes what it can and leaves the unconsumed tail in `src`:
/// bytes ahead of the first SOP are dropped (resynchronisation), a frame
/// missing its EOP is retained for the next call, and a malformed frame is
/// consumed before the error is returned so that framing continues from the
/// byte after its EOP.
#[derive(Debug, Default)]
pub struct FrameDecoder(());

impl FrameDecoder {
    pub fn new() -> FrameDecoder {
        FrameDecoder(())
    }

    /// Extracts the next payload, or `Ok(None)` when `src` holds no complete
    /// frame yet.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let Some(sop) = src.iter().position(|&b| b == SOP) else {
            if !src.is_empty() {
                log::trace!("discarding {} bytes of line noise", src.len());
                src.clear();
            }
            return Ok(None);
        };
        if sop > 0 {
            log::trace!("resynchronising past {sop} bytes");
            src.advance(sop);
        }
        let Some(eop) = src[1..].iter().position(|&b| b == EOP) else {
            return Ok(None);
        };
        let frame = src.split_to(eop + 2);
        let inner = &frame[1..frame.len() - 1];
        Ok(Some(unstuff(inner)?.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn encode_plain_payload() {
        assert_eq!(&encode_frame(&[0x01, 0x02, 0x03])[..], &[0x81, 0x01, 0x02, 0x03, 0x82]);
    }

    #[test]
    fn encode_stuffs_reserved_octets() {
        assert_eq!(
            &encode_frame(&[0x81, 0x82, 0x80])[..],
            &[0x81, 0x80, 0x01, 0x80, 0x02, 0x80, 0x00, 0x82]
        );
    }

    #[test]
    fn encode_empty_payload() {
        assert_eq!(&encode_frame(&[])[..], &[0x81, 0x82]);
    }

    #[test]
    fn body_is_free_of_delimiters() {
        let payload: Vec<u8> = (0u8..=255).collect();
        let frame = encode_frame(&payload);
        let body = &frame[1..frame.len() - 1];
        assert!(!body.contains(&SOP));
        assert!(!body.contains(&EOP));
    }

    #[test]
    fn encoded_size_bounds() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let len = rng.random_range(0..256);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let frame = encode_frame(&payload);
            assert!(frame.len() >= payload.len() + 2);
            assert!(frame.len() <= 2 * payload.len() + 2);
        }
    }

    #[test]
    fn roundtrip_random_payloads() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let len = rng.random_range(0..128);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let frame = encode_frame(&payload);
            let body = &frame[1..frame.len() - 1];
            assert_eq!(&unstuff(body).unwrap()[..], &payload[..]);
        }
    }

    #[test]
    fn unstuff_rejects_bad_escape() {
        assert!(matches!(unstuff(&[0x80, 0x55]), Err(Error::InvalidEscape)));
        assert!(matches!(unstuff(&[0x01, 0x80]), Err(Error::InvalidEscape)));
    }

    #[test]
    fn decoder_extracts_back_to_back_frames() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode_frame(&[0x01]));
        buf.extend_from_slice(&encode_frame(&[0x02, 0x03]));
        let mut dec = FrameDecoder::new();
        assert_eq!(&dec.decode(&mut buf).unwrap().unwrap()[..], &[0x01]);
        assert_eq!(&dec.decode(&mut buf).unwrap().unwrap()[..], &[0x02, 0x03]);
        assert!(dec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn decoder_withholds_partial_frame() {
        let mut buf = BytesMut::new();
        let frame = encode_frame(&[0x10, 0x20, 0x30]);
        buf.extend_from_slice(&frame[..3]);
        let mut dec = FrameDecoder::new();
        assert!(dec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&frame[3..]);
        assert_eq!(&dec.decode(&mut buf).unwrap().unwrap()[..], &[0x10, 0x20, 0x30]);
    }

    #[test]
    fn decoder_resynchronises_past_noise() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x55, 0xaa, 0x00]);
        buf.extend_from_slice(&encode_frame(&[0x07]));
        let mut dec = FrameDecoder::new();
        assert_eq!(&dec.decode(&mut buf).unwrap().unwrap()[..], &[0x07]);
    }

    #[test]
    fn decoder_skips_malformed_frame() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[SOP, ESC, 0x55, EOP]);
        buf.extend_from_slice(&encode_frame(&[0x09]));
        let mut dec = FrameDecoder::new();
        assert!(matches!(dec.decode(&mut buf), Err(Error::InvalidEscape)));
        assert_eq!(&dec.decode(&mut buf).unwrap().unwrap()[..], &[0x09]);
    }

    #[test]
    fn decoder_delivers_empty_payload() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[SOP, EOP]);
        let mut dec = FrameDecoder::new();
        assert!(dec.decode(&mut buf).unwrap().unwrap().is_empty());
    }
}
