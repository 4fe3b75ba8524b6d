// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Relative control-change decoding (`RelativeCC`).
//!
//! Encoders report direction and magnitude over the same 0-127 byte range
//! using one of three conventions. `decode` turns the raw byte into a
//! signed delta; the sign selects `increase` vs `decrease`, zero is a no-op.

use crate::events::RelativeEncoding;

/// Decode a relative CC byte to a signed delta under `encoding`.
///
/// See the module-level decoding table: each encoding partitions `0..=127`
/// into positive, negative, and (for SignMagnitude/BinaryOffset) a zero
/// value distinct from the smallest positive magnitude.
pub fn decode(value: u8, encoding: RelativeEncoding) -> i32 {
    match encoding {
        RelativeEncoding::SignMagnitude => match value {
            0 | 64 => 0,
            1..=63 => value as i32,
            65..=127 => -(value as i32 - 64),
        },
        RelativeEncoding::TwosComplement => match value {
            0 => 0,
            1..=64 => value as i32,
            65..=127 => -(128 - value as i32),
        },
        RelativeEncoding::BinaryOffset => match value {
            64 => 0,
            65..=127 => value as i32 - 64,
            0..=63 => -(64 - value as i32),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RelativeEncoding::*;

    #[test]
    fn sign_magnitude_table() {
        assert_eq!(decode(0, SignMagnitude), 0);
        assert_eq!(decode(64, SignMagnitude), 0);
        assert_eq!(decode(1, SignMagnitude), 1);
        assert_eq!(decode(63, SignMagnitude), 63);
        assert_eq!(decode(65, SignMagnitude), -1);
        assert_eq!(decode(127, SignMagnitude), -63);
    }

    #[test]
    fn twos_complement_table() {
        assert_eq!(decode(0, TwosComplement), 0);
        assert_eq!(decode(1, TwosComplement), 1);
        assert_eq!(decode(64, TwosComplement), 64);
        assert_eq!(decode(65, TwosComplement), -63);
        assert_eq!(decode(127, TwosComplement), -1);
    }

    #[test]
    fn binary_offset_table() {
        assert_eq!(decode(64, BinaryOffset), 0);
        assert_eq!(decode(65, BinaryOffset), 1);
        assert_eq!(decode(127, BinaryOffset), 63);
        assert_eq!(decode(63, BinaryOffset), -1);
        assert_eq!(decode(0, BinaryOffset), -64);
    }

    #[test]
    fn every_byte_value_decodes_for_every_encoding() {
        for encoding in [SignMagnitude, TwosComplement, BinaryOffset] {
            for value in 0u8..=127 {
                let delta = decode(value, encoding);
                assert!(delta >= -64 && delta <= 64, "{encoding:?} {value} -> {delta}");
            }
        }
    }

    #[test]
    fn sign_matches_spec_table_across_full_range() {
        for value in 0u8..=127 {
            let sm = decode(value, SignMagnitude);
            match value {
                0 | 64 => assert_eq!(sm, 0),
                1..=63 => assert!(sm > 0),
                65..=127 => assert!(sm < 0),
            }

            let tc = decode(value, TwosComplement);
            match value {
                0 => assert_eq!(tc, 0),
                1..=64 => assert!(tc > 0),
                65..=127 => assert!(tc < 0),
            }

            let bo = decode(value, BinaryOffset);
            match value {
                64 => assert_eq!(bo, 0),
                65..=127 => assert!(bo > 0),
                0..=63 => assert!(bo < 0),
            }
        }
    }
}
