// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
bit tricks.

Offset rounding for slot strides, and the handful of mask operations needed to
treat a `u32` as a set of device indices.
*/

/// Rounds `size` up to the next multiple of `power_of_2`.
///
/// `power_of_2` must be a power of two; this is the caller's contract and is
/// only checked in debug builds.
pub const fn round_up(size: usize, power_of_2: usize) -> usize {
    debug_assert!(power_of_2.is_power_of_two(), "alignment must be a power of two");
    (size + power_of_2 - 1) & !(power_of_2 - 1)
}

/// Index of the only set bit, or `None` if zero or more than one bit is set.
pub const fn single_bit_index(mask: u32) -> Option<u32> {
    if mask.count_ones() == 1 {
        Some(mask.trailing_zeros())
    } else {
        None
    }
}

/// Iterates the indices of the set bits, lowest first.
pub fn set_bits(mask: u32) -> impl Iterator<Item = u32> {
    let mut remaining = mask;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let index = remaining.trailing_zeros();
        remaining &= remaining - 1;
        Some(index)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_to_alignment() {
        assert_eq!(round_up(0, 256), 0);
        assert_eq!(round_up(1, 256), 256);
        assert_eq!(round_up(64, 256), 256);
        assert_eq!(round_up(256, 256), 256);
        assert_eq!(round_up(257, 256), 512);
        assert_eq!(round_up(12, 4), 12);
        assert_eq!(round_up(13, 4), 16);
        assert_eq!(round_up(7, 1), 7);
    }

    #[test]
    fn round_up_is_minimal() {
        for alignment in [1usize, 2, 4, 16, 64, 256] {
            for size in 0..600 {
                let r = round_up(size, alignment);
                assert!(r >= size);
                assert_eq!(r % alignment, 0);
                assert!(r - size < alignment);
            }
        }
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn round_up_rejects_non_power_of_two() {
        round_up(10, 3);
    }

    #[test]
    fn single_bit() {
        assert_eq!(single_bit_index(0), None);
        assert_eq!(single_bit_index(0b1), Some(0));
        assert_eq!(single_bit_index(0b100), Some(2));
        assert_eq!(single_bit_index(0b101), None);
        assert_eq!(single_bit_index(1 << 31), Some(31));
    }

    #[test]
    fn bits() {
        assert_eq!(set_bits(0).count(), 0);
        assert_eq!(set_bits(0b1011).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(set_bits(u32::MAX).count(), 32);
    }
}
