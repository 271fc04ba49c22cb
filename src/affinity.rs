// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Device affinity for multi-device groups.

A device group is N homogeneous physical devices driven through one logical
device.  Two related types live here:

* [DeviceMask] is an arbitrary subset of the group.  It scopes a submission, so
  only the named devices execute it.
* [DeviceAffinity] is what a [crate::FrameData] is created with.  Its staging
  region is written through a single mapped pointer, so it can only ever live
  on one device; `ScopedTo` names exactly one, and there is no way to spell
  "two devices" with this type.

The integer masks used by lower-level APIs are accepted through
[DeviceAffinity::from_raw_mask], which is where a multi-bit mask gets rejected.
*/

use crate::bittricks::{set_bits, single_bit_index};
use crate::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of physical devices in a group.
pub const MAX_DEVICE_GROUP_SIZE: u32 = 32;

/**
A subset of the physical devices in a group.

The empty mask means "unscoped": the operation applies to every device, or to
the only device in a group of one.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceMask(u32);

impl DeviceMask {
    pub const UNSCOPED: DeviceMask = DeviceMask(0);

    pub const fn from_bits(bits: u32) -> Self {
        DeviceMask(bits)
    }

    /// A mask containing only `device`.
    pub const fn single(device: u32) -> Self {
        assert!(device < MAX_DEVICE_GROUP_SIZE, "Device index out of range");
        DeviceMask(1 << device)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_unscoped(self) -> bool {
        self.0 == 0
    }

    /// Whether `device` executes work scoped to this mask.
    pub const fn contains(self, device: u32) -> bool {
        self.is_unscoped() || (device < MAX_DEVICE_GROUP_SIZE && self.0 & (1 << device) != 0)
    }

    /// The devices of a group of `group_size` that this mask selects.
    pub fn devices(self, group_size: u32) -> Vec<u32> {
        if self.is_unscoped() {
            (0..group_size).collect()
        } else {
            set_bits(self.0).collect()
        }
    }

    /// The first device named by the mask that does not exist in a group of `group_size`.
    pub fn first_missing_device(self, group_size: u32) -> Option<u32> {
        set_bits(self.0).find(|device| *device >= group_size)
    }
}

impl Display for DeviceMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_unscoped() {
            write!(f, "unscoped")
        } else {
            write!(f, "{:#b}", self.0)
        }
    }
}

/// Which device a host-writable resource is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceAffinity {
    /// The default placement; in a group, memory is instanced on every device.
    #[default]
    Unscoped,
    /// Memory exists only on this device, and updates execute only there.
    ScopedTo(u32),
}

impl DeviceAffinity {
    /**
    Interprets an integer device mask.

    Zero is [DeviceAffinity::Unscoped], a single bit is
    [DeviceAffinity::ScopedTo].  Anything else describes more than one device
    for a resource written through one host pointer, and fails with
    [Error::AmbiguousDeviceMask].
    */
    pub fn from_raw_mask(mask: u32) -> Result<Self, Error> {
        if mask == 0 {
            return Ok(DeviceAffinity::Unscoped);
        }
        single_bit_index(mask)
            .map(DeviceAffinity::ScopedTo)
            .ok_or(Error::AmbiguousDeviceMask(mask))
    }

    /// The submission mask for work on a resource with this affinity.
    pub fn mask(self) -> DeviceMask {
        match self {
            DeviceAffinity::Unscoped => DeviceMask::UNSCOPED,
            DeviceAffinity::ScopedTo(device) => DeviceMask::single(device),
        }
    }

    pub fn device(self) -> Option<u32> {
        match self {
            DeviceAffinity::Unscoped => None,
            DeviceAffinity::ScopedTo(device) => Some(device),
        }
    }
}

impl Display for DeviceAffinity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceAffinity::Unscoped => write!(f, "unscoped"),
            DeviceAffinity::ScopedTo(device) => write!(f, "device {device}"),
        }
    }
}
