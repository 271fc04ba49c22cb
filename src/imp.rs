// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Backend seam.

[crate::FrameData] allocates memory and submits commands only through the
traits in this module.  Two backends are provided:

* [software], an in-memory device group that executes command lists on the
  CPU and validates their ordering.  Always built.
* `wgpu`, behind the `backend_wgpu` feature.
*/

use crate::affinity::DeviceAffinity;
use crate::affinity::DeviceMask;
use crate::bindings::visible_to::GPUBufferUsage;
use crate::commands::CommandList;
use crate::error::Error;
use std::fmt::Debug;
use std::ops::Range;

pub mod software;

#[cfg(feature = "backend_wgpu")]
pub mod wgpu;

/// What to allocate.
#[derive(Debug, Clone, Copy)]
pub struct RegionRequest<'a> {
    pub label: &'a str,
    pub size: usize,
    /// How the device region is consumed.  Host regions are always transfer sources.
    pub usage: GPUBufferUsage,
    pub affinity: DeviceAffinity,
    pub queue_family: u32,
}

/**
Persistently mapped, host-visible memory.

Host-visible memory is not assumed to be coherent: bytes passed to
[HostRegion::write] are only guaranteed visible to the device after a
[HostRegion::flush] covering them.
*/
pub trait HostRegion {
    type Buffer;
    fn buffer(&self) -> Self::Buffer;
    /// The host's view of the region.
    fn mapped(&self) -> &[u8];
    fn write(&mut self, offset: usize, data: &[u8]);
    fn flush(&mut self, range: Range<usize>) -> Result<(), Error>;
}

/// Device-resident memory.  The host never touches its bytes.
pub trait DeviceRegion {
    type Buffer;
    fn buffer(&self) -> Self::Buffer;
    fn byte_len(&self) -> usize;
}

/// A device, or a group of devices behind one logical device.
pub trait Device {
    /// Handle recorded into command lists.
    type Buffer: Clone + Debug;
    type Queue;
    type HostRegion: HostRegion<Buffer = Self::Buffer>;
    type DeviceRegion: DeviceRegion<Buffer = Self::Buffer>;

    /// Number of physical devices in the group.
    fn device_count(&self) -> u32;

    /// Smallest offset alignment a descriptor binding of `usage` accepts.
    fn min_offset_alignment(&self, usage: GPUBufferUsage) -> usize;

    fn allocate_host_region(&self, request: &RegionRequest<'_>) -> Result<Self::HostRegion, Error>;

    fn allocate_device_region(&self, request: &RegionRequest<'_>) -> Result<Self::DeviceRegion, Error>;

    /**
    Enqueues `commands` on `queue`, executed by the devices in `mask`.

    Returns once the work is enqueued; it does not wait for execution.  No
    semaphores are waited on or signalled.
    */
    fn submit(
        &self,
        queue: &Self::Queue,
        commands: &CommandList<Self::Buffer>,
        mask: DeviceMask,
    ) -> Result<(), Error>;
}
