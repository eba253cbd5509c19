//! 7-bit text-safe byte encoding.
//!
//! Packs input bytes into a stream of characters whose code points all fit
//! in 7 bits, for transports that only carry text. Every output char carries
//! 7 payload bits, so `n` bytes encode to `ceil(8n / 7)` chars; the final
//! partial group is zero-padded and the padding is discarded on decode.

/// Encode bytes as a string of 7-bit characters.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(7) * 8);
    let mut bits: u32 = 0;
    let mut bits_used: u32 = 0;
    for &byte in bytes {
        bits = (bits << 8) | u32::from(byte);
        bits_used += 8;
        while bits_used >= 7 {
            let group = ((bits >> (bits_used - 7)) & 0x7f) as u8;
            bits_used -= 7;
            out.push(char::from(group));
        }
    }
    if bits_used > 0 {
        let group = ((bits << (7 - bits_used)) & 0x7f) as u8;
        out.push(char::from(group));
    }
    out
}

/// Decode a string produced by [`encode`].
///
/// Characters outside the 7-bit range contribute only their low 7 bits.
/// Up to 7 trailing padding bits are dropped.
pub fn decode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 7 / 8);
    let mut bits: u32 = 0;
    let mut bits_used: u32 = 0;
    for c in text.chars() {
        bits = (bits << 7) | (c as u32 & 0x7f);
        bits_used += 7;
        if bits_used >= 8 {
            out.push(((bits >> (bits_used - 8)) & 0xff) as u8);
            bits_used -= 8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trip() {
        assert_eq!(encode(&[]), "");
        assert_eq!(decode(""), Vec::<u8>::new());
    }

    #[test]
    fn single_byte() {
        // 0xff packs as 1111111 then 1 padded with six zero bits.
        assert_eq!(encode(&[0xff]), "\u{7f}\u{40}");
        assert_eq!(decode("\u{7f}\u{40}"), vec![0xff]);
    }

    #[test]
    fn round_trip_all_lengths() {
        for len in 0..=32usize {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            assert_eq!(decode(&encode(&bytes)), bytes, "len={len}");
        }
    }

    #[test]
    fn output_is_seven_bit() {
        let bytes: Vec<u8> = (0u16..=255).map(|b| b as u8).collect();
        assert!(encode(&bytes).chars().all(|c| (c as u32) < 0x80));
    }

    #[test]
    fn expansion_is_eight_sevenths() {
        for len in [7usize, 70, 700, 3500] {
            let bytes = vec![0xa5u8; len];
            let encoded = encode(&bytes);
            assert_eq!(encoded.chars().count(), (len * 8).div_ceil(7));
        }
    }
}
