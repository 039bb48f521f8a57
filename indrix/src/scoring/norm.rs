//! Lossy one-byte encoding of document lengths.
//!
//! Lengths below [`NUM_FREE_VALUES`] are stored exactly. Larger lengths use a float with a
//! 3-bit mantissa (plus an implicit leading bit) and a 5-bit exponent, so the encoding is
//! monotone and every byte decodes through a fixed 256-entry table.

/// Number of lengths that are stored verbatim.
pub const NUM_FREE_VALUES: u32 = 24;

const MAX_ENCODABLE: u32 = i32::MAX as u32;

static LENGTH_TABLE: [u32; 256] = build_length_table();

const fn long_to_int4(i: u64) -> u32 {
    let num_bits = 64 - i.leading_zeros();
    if num_bits < 4 {
        i as u32
    } else {
        let shift = num_bits - 4;
        let mut encoded = ((i >> shift) & 0x07) as u32;
        encoded |= (shift + 1) << 3;
        encoded
    }
}

const fn int4_to_long(i: u32) -> u64 {
    let bits = (i & 0x07) as u64;
    let shift = (i >> 3) as i32 - 1;
    if shift == -1 {
        bits
    } else {
        (bits | 0x08) << shift
    }
}

const fn build_length_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut b = 0;
    while b < 256 {
        table[b] = if (b as u32) < NUM_FREE_VALUES {
            b as u32
        } else {
            NUM_FREE_VALUES + int4_to_long(b as u32 - NUM_FREE_VALUES) as u32
        };
        b += 1;
    }
    table
}

/// Quantize a token count to one byte. Lengths beyond `i32::MAX` saturate.
pub fn encode_length(length: u32) -> u8 {
    let length = length.min(MAX_ENCODABLE);
    if length < NUM_FREE_VALUES {
        length as u8
    } else {
        (NUM_FREE_VALUES + long_to_int4(u64::from(length - NUM_FREE_VALUES))) as u8
    }
}

/// Decode a quantized length. Decoding never exceeds the original length.
pub fn decode_length(norm: u8) -> u32 {
    LENGTH_TABLE[norm as usize]
}

/// Round a length down to what survives quantization.
pub fn quantize(length: u32) -> u32 {
    decode_length(encode_length(length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_lengths_are_exact() {
        for len in 0..NUM_FREE_VALUES {
            assert_eq!(decode_length(encode_length(len)), len);
        }
        // 24..=31 still fit in the mantissa
        for len in 24..32 {
            assert_eq!(quantize(len), len);
        }
    }

    #[test]
    fn test_table_is_strictly_increasing() {
        for b in 1..256 {
            assert!(
                decode_length(b as u8) > decode_length((b - 1) as u8),
                "table not increasing at {}",
                b
            );
        }
    }

    #[test]
    fn test_encode_is_monotone_and_rounds_down() {
        let mut previous = 0u8;
        for len in (0..200_000u32).step_by(7) {
            let encoded = encode_length(len);
            assert!(encoded >= previous);
            assert!(decode_length(encoded) <= len);
            previous = encoded;
        }
    }

    #[test]
    fn test_largest_value() {
        assert_eq!(encode_length(u32::MAX), 255);
        assert_eq!(decode_length(255), NUM_FREE_VALUES + (15u32 << 27));
    }

    #[test]
    fn test_known_quantizations() {
        assert_eq!(quantize(100), 96);
        assert_eq!(quantize(1000), 984);
    }
}
