// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Construction options for [crate::FrameData].

use crate::affinity::DeviceAffinity;
use crate::bindings::visible_to::GPUBufferUsage;
use crate::error::Error;

/// Largest minimum offset alignment any mainstream device requires for a
/// uniform binding.  Slots aligned to this are bindable everywhere.
pub const MAX_OFFSET_ALIGNMENT: usize = 256;

/**
Options for creating a [crate::FrameData].

```
use frame_constants::FrameDataConfig;
use frame_constants::bindings::visible_to::GPUBufferUsage;

let config = FrameDataConfig::new(2)
    .with_usage(GPUBufferUsage::FragmentShaderRead)
    .with_debug_name("light")
    .with_raw_device_mask(0b10)
    .unwrap();
assert_eq!(config.slot_count, 2);
```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDataConfig {
    /// Number of slots, typically one per frame in flight or swapchain image.
    pub slot_count: usize,
    pub usage: GPUBufferUsage,
    pub affinity: DeviceAffinity,
    /// Requested slot alignment.  Raised to the device's minimum if smaller.
    pub alignment: usize,
    /// Queue family the update commands are recorded for.
    pub queue_family: u32,
    pub debug_name: String,
}

impl Default for FrameDataConfig {
    fn default() -> Self {
        FrameDataConfig {
            slot_count: 3,
            usage: GPUBufferUsage::default(),
            affinity: DeviceAffinity::Unscoped,
            alignment: MAX_OFFSET_ALIGNMENT,
            queue_family: 0,
            debug_name: "frame_data".to_string(),
        }
    }
}

impl FrameDataConfig {
    pub fn new(slot_count: usize) -> Self {
        FrameDataConfig {
            slot_count,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: GPUBufferUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_affinity(mut self, affinity: DeviceAffinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Sets the affinity from an integer device mask; see [DeviceAffinity::from_raw_mask].
    pub fn with_raw_device_mask(mut self, mask: u32) -> Result<Self, Error> {
        self.affinity = DeviceAffinity::from_raw_mask(mask)?;
        Ok(self)
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_queue_family(mut self, queue_family: u32) -> Self {
        self.queue_family = queue_family;
        self
    }

    pub fn with_debug_name(mut self, debug_name: &str) -> Self {
        self.debug_name = debug_name.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = FrameDataConfig::default();
        assert_eq!(config.slot_count, 3);
        assert_eq!(config.alignment, 256);
        assert_eq!(config.affinity, DeviceAffinity::Unscoped);
        assert_eq!(config.queue_family, 0);
    }

    #[test]
    fn ambiguous_mask() {
        assert!(matches!(
            FrameDataConfig::new(2).with_raw_device_mask(0b110),
            Err(Error::AmbiguousDeviceMask(0b110))
        ));
    }
}
