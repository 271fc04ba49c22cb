// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Slot layout shared by the staging and device regions.

Both regions of a [crate::FrameData] use the same layout, so a copy of
`stride` bytes at `slot * stride` is valid in either direction.
*/

use crate::bittricks::round_up;
use std::ops::Range;

/// Byte layout of `slot_count` aligned copies of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlignedRegionLayout {
    element_size: usize,
    alignment: usize,
    slot_count: usize,
}

impl AlignedRegionLayout {
    /**
    Creates a layout.

    # Panics
    * `element_size` is zero
    * `alignment` is not a power of two
    * `slot_count` is zero
    */
    pub fn new(element_size: usize, alignment: usize, slot_count: usize) -> Self {
        assert_ne!(element_size, 0, "Zero-sized elements are not allowed");
        assert!(
            alignment.is_power_of_two(),
            "Alignment {alignment} is not a power of two"
        );
        assert_ne!(slot_count, 0, "At least one slot is required");
        AlignedRegionLayout {
            element_size,
            alignment,
            slot_count,
        }
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Distance in bytes between consecutive slots.
    pub fn stride(&self) -> usize {
        round_up(self.element_size, self.alignment)
    }

    /// Total size of a region with this layout.
    pub fn region_size(&self) -> usize {
        self.stride() * self.slot_count
    }

    /// Byte offset of `slot`.
    ///
    /// # Panics
    /// If `slot` is out of range.
    pub fn offset_for_slot(&self, slot: usize) -> usize {
        assert!(
            slot < self.slot_count,
            "Slot {slot} out of range for {count} slots",
            count = self.slot_count
        );
        self.stride() * slot
    }

    /// The `element_size` bytes of `slot` that hold the value.
    pub fn element_range(&self, slot: usize) -> Range<usize> {
        let offset = self.offset_for_slot(slot);
        offset..offset + self.element_size
    }

    /// The full `stride` bytes of `slot`, including padding.
    pub fn slot_range(&self, slot: usize) -> Range<usize> {
        let offset = self.offset_for_slot(slot);
        offset..offset + self.stride()
    }
}

#[cfg(test)]
mod tests {
    use super::AlignedRegionLayout;

    #[test]
    fn matrix_layout() {
        let layout = AlignedRegionLayout::new(64, 256, 3);
        assert_eq!(layout.stride(), 256);
        assert_eq!(layout.region_size(), 768);
        assert_eq!(layout.offset_for_slot(0), 0);
        assert_eq!(layout.offset_for_slot(2), 512);
        assert_eq!(layout.element_range(1), 256..320);
        assert_eq!(layout.slot_range(1), 256..512);
    }

    #[test]
    fn oversized_element_spans_strides() {
        let layout = AlignedRegionLayout::new(300, 256, 2);
        assert_eq!(layout.stride(), 512);
        assert_eq!(layout.offset_for_slot(1), 512);
    }

    #[test]
    fn slots_never_overlap() {
        for size in [1usize, 4, 63, 64, 65, 255, 256, 257, 1000] {
            let layout = AlignedRegionLayout::new(size, 64, 5);
            assert_eq!(layout.stride() % layout.alignment(), 0);
            for i in 0..5 {
                for j in 0..5 {
                    if i != j {
                        let distance = layout.offset_for_slot(i).abs_diff(layout.offset_for_slot(j));
                        assert!(distance >= layout.stride());
                    }
                }
            }
        }
    }

    #[test]
    #[should_panic]
    fn zero_slots() {
        AlignedRegionLayout::new(4, 4, 0);
    }

    #[test]
    #[should_panic]
    fn zero_sized() {
        AlignedRegionLayout::new(0, 4, 1);
    }

    #[test]
    #[should_panic]
    fn odd_alignment() {
        AlignedRegionLayout::new(4, 24, 1);
    }

    #[test]
    #[should_panic]
    fn slot_out_of_range() {
        AlignedRegionLayout::new(4, 4, 2).offset_for_slot(2);
    }
}
