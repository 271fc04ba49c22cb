// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Frame-buffered values.

A [FrameData] owns one live value of type `T` and `slot_count` copies of it on
the device, one per frame in flight.  Application code mutates the live value
freely; once per frame the caller synchronizes the slot for that frame, and the
slot is uploaded only if it differs from what was last sent through it.

# Memory

Two regions with the same [AlignedRegionLayout]:

* a host-visible staging region, written by the host
* a device-resident region, read by shaders through a descriptor binding at
  [FrameData::offset_for_slot]

One update command per slot is recorded at construction and replayed whenever
that slot needs refreshing.

# Ordering

[FrameData::synchronize] only enqueues.  The caller is responsible for

* submitting it on the same queue, before the work that reads the slot, or
  otherwise ordering the two
* not reusing a slot until the GPU work that last read it has retired

# Change detection

The live value is compared against the slot's bytes in *staging* memory, not
against the device.  A never-synchronized slot always uploads, even if its
staging bytes happen to equal the value.
*/

use crate::affinity::{DeviceAffinity, MAX_DEVICE_GROUP_SIZE};
use crate::bindings::crepr::{CRepr, bytes_of};
use crate::commands::CommandList;
use crate::config::FrameDataConfig;
use crate::dirty_tracking::SlotStates;
use crate::error::Error;
use crate::imp::{Device, DeviceRegion, HostRegion, RegionRequest};
use crate::layout::AlignedRegionLayout;
use std::ops::Range;
use std::sync::Arc;

/// What a synchronize call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upload {
    /// The slot already held the value.
    Skipped,
    /// The value was staged and the slot's update command submitted.
    Submitted,
}

/**
A value of type `T` buffered across `slot_count` frames in flight.

# Type parameters
`T` - the value, copied byte for byte into each slot
`D` - the device backend
*/
pub struct FrameData<T: CRepr, D: Device> {
    value: T,
    slots: SlotStates,
    layout: AlignedRegionLayout,
    affinity: DeviceAffinity,
    //recorded once, replayed per upload
    update_commands: Vec<CommandList<D::Buffer>>,
    staging: D::HostRegion,
    device_region: D::DeviceRegion,
    device: Arc<D>,
    debug_name: String,
}

impl<T: CRepr, D: Device> std::fmt::Debug for FrameData<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameData")
            .field("debug_name", &self.debug_name)
            .field("layout", &self.layout)
            .field("affinity", &self.affinity)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl<T: CRepr, D: Device> FrameData<T, D> {
    /**
    Allocates both regions and records one update command per slot.

    # Errors
    * [Error::NoSuchDevice] if the affinity names a device outside the group
    * [Error::OutOfDeviceMemory] / [Error::OutOfHostMemory] if allocation fails

    # Panics
    * `T` is zero-sized
    * `config.slot_count` is zero
    * `config.alignment` is not a power of two
    */
    pub fn new(device: &Arc<D>, config: FrameDataConfig, initial: T) -> Result<Self, Error> {
        let element_size = std::mem::size_of::<T>();
        assert_ne!(element_size, 0, "Zero-sized values are not allowed");
        assert_ne!(config.slot_count, 0, "At least one slot is required");
        assert!(
            config.alignment.is_power_of_two(),
            "Alignment {alignment} is not a power of two",
            alignment = config.alignment
        );
        let group_size = device.device_count();
        if let Some(scoped) = config.affinity.device() {
            if scoped >= group_size || scoped >= MAX_DEVICE_GROUP_SIZE {
                return Err(Error::NoSuchDevice {
                    device: scoped,
                    group_size,
                });
            }
        }
        let alignment = config
            .alignment
            .max(device.min_offset_alignment(config.usage));
        let layout = AlignedRegionLayout::new(element_size, alignment, config.slot_count);

        let device_label = format!("{} device", config.debug_name);
        let device_region = device.allocate_device_region(&RegionRequest {
            label: &device_label,
            size: layout.region_size(),
            usage: config.usage,
            affinity: config.affinity,
            queue_family: config.queue_family,
        })?;
        let staging_label = format!("{} staging", config.debug_name);
        let staging = device.allocate_host_region(&RegionRequest {
            label: &staging_label,
            size: layout.region_size(),
            usage: config.usage,
            affinity: config.affinity,
            queue_family: config.queue_family,
        })?;

        let staging_buffer = staging.buffer();
        let device_buffer = device_region.buffer();
        let update_commands = (0..layout.slot_count())
            .map(|slot| {
                CommandList::slot_update(
                    format!("{} update[{slot}]", config.debug_name),
                    config.queue_family,
                    &staging_buffer,
                    &device_buffer,
                    layout.offset_for_slot(slot),
                    layout.stride(),
                    config.affinity.mask(),
                    config.usage.consumer_access(),
                )
            })
            .collect();

        logwise::info_sync!(
            "FrameData {name}: {slots} slots, stride {stride}, {affinity}",
            name = logwise::privacy::LogIt(&config.debug_name),
            slots = layout.slot_count(),
            stride = layout.stride(),
            affinity = logwise::privacy::LogIt(&config.affinity)
        );

        Ok(FrameData {
            value: initial,
            slots: SlotStates::new(layout.slot_count()),
            layout,
            affinity: config.affinity,
            update_commands,
            staging,
            device_region,
            device: device.clone(),
            debug_name: config.debug_name,
        })
    }

    /// The live value.
    pub fn data(&self) -> &T {
        &self.value
    }

    /// The live value, for mutation.  Nothing is uploaded until the next synchronize.
    pub fn data_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /**
    Makes `slot` hold the live value, uploading only if needed.

    If the slot has been synchronized before and its staged bytes equal the
    live value, this does nothing.  Otherwise the value is written to the
    slot's staging bytes, flushed, and the slot's update command is submitted
    to `queue` without waiting on or signalling anything.

    # Panics
    If `slot` is out of range.
    */
    pub fn synchronize(&mut self, queue: &D::Queue, slot: usize) -> Result<Upload, Error> {
        self.synchronize_imp(queue, slot, false)
    }

    /// Like [FrameData::synchronize], but always uploads.
    pub fn force_synchronize(&mut self, queue: &D::Queue, slot: usize) -> Result<Upload, Error> {
        self.synchronize_imp(queue, slot, true)
    }

    fn synchronize_imp(&mut self, queue: &D::Queue, slot: usize, force: bool) -> Result<Upload, Error> {
        let range = self.layout.element_range(slot);
        let dirtiness = self.slots.check(
            slot,
            bytes_of(&self.value),
            &self.staging.mapped()[range.clone()],
            force,
        );
        logwise::trace_sync!(
            "FrameData {name} slot {slot}: {dirtiness}",
            name = logwise::privacy::LogIt(&self.debug_name),
            slot = slot,
            dirtiness = logwise::privacy::LogIt(&dirtiness)
        );
        if !dirtiness.needs_upload() {
            return Ok(Upload::Skipped);
        }
        let _upload = logwise::perfwarn_begin!("FrameData::synchronize upload");
        self.slots.mark_initialized(slot);
        self.staging.write(range.start, bytes_of(&self.value));
        self.staging.flush(self.layout.slot_range(slot))?;
        if let Err(e) = self
            .device
            .submit(queue, &self.update_commands[slot], self.affinity.mask())
        {
            logwise::warn_sync!(
                "FrameData {name} slot {slot} submission failed: {e}",
                name = logwise::privacy::LogIt(&self.debug_name),
                slot = slot,
                e = logwise::privacy::LogIt(&e)
            );
            return Err(e);
        }
        Ok(Upload::Submitted)
    }

    /// The device-resident region, for descriptor bindings.
    pub fn device_region(&self) -> &D::DeviceRegion {
        &self.device_region
    }

    /// Handle of the device-resident region.
    pub fn device_buffer(&self) -> D::Buffer {
        self.device_region.buffer()
    }

    /// Byte offset of `slot` in the device region.
    pub fn offset_for_slot(&self, slot: usize) -> usize {
        self.layout.offset_for_slot(slot)
    }

    /// Range to bind for `slot`: its offset, `element_size` bytes long.
    pub fn binding_range(&self, slot: usize) -> Range<usize> {
        self.layout.element_range(slot)
    }

    /// Distance between slots, a multiple of the alignment.
    pub fn slot_stride(&self) -> usize {
        self.layout.stride()
    }

    /// `size_of::<T>()`.
    pub fn element_size(&self) -> usize {
        self.layout.element_size()
    }

    pub fn slot_count(&self) -> usize {
        self.layout.slot_count()
    }

    pub fn layout(&self) -> &AlignedRegionLayout {
        &self.layout
    }

    pub fn affinity(&self) -> DeviceAffinity {
        self.affinity
    }

    /// Whether `slot` has been synchronized at least once.
    pub fn is_slot_initialized(&self, slot: usize) -> bool {
        self.slots.is_initialized(slot)
    }

    /// The pre-recorded update command for `slot`.
    pub fn update_command(&self, slot: usize) -> &CommandList<D::Buffer> {
        &self.update_commands[slot]
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::software::{SoftwareDevice, SoftwareDeviceConfig};

    fn device() -> Arc<SoftwareDevice> {
        Arc::new(SoftwareDevice::new(SoftwareDeviceConfig::default()))
    }

    #[test]
    fn accessors() {
        let device = device();
        let data = FrameData::new(&device, FrameDataConfig::new(3), [0u32; 4]).unwrap();
        assert_eq!(data.element_size(), 16);
        assert_eq!(data.slot_stride(), 256);
        assert_eq!(data.slot_count(), 3);
        assert_eq!(data.offset_for_slot(2), 512);
        assert_eq!(data.binding_range(1), 256..272);
        assert_eq!(data.device_region().byte_len(), 768);
        assert!(!data.is_slot_initialized(0));
        assert_eq!(data.update_command(1).label(), "frame_data update[1]");
    }

    #[test]
    fn live_value_is_not_slot_indexed() {
        let device = device();
        let mut data = FrameData::new(&device, FrameDataConfig::new(2), 1u32).unwrap();
        *data.data_mut() = 5;
        assert_eq!(*data.data(), 5);
    }

    #[test]
    fn device_alignment_wins_when_larger() {
        let device = device();
        let data = FrameData::new(&device, FrameDataConfig::new(2).with_alignment(16), 0u32).unwrap();
        assert_eq!(data.layout().alignment(), 256);
    }

    #[test]
    fn larger_requested_alignment_is_kept() {
        let device = device();
        let data = FrameData::new(&device, FrameDataConfig::new(2).with_alignment(1024), 0u32).unwrap();
        assert_eq!(data.slot_stride(), 1024);
    }

    #[test]
    fn device_past_group_limit_is_an_error() {
        let device = Arc::new(SoftwareDevice::new(SoftwareDeviceConfig::group(2, 1024 * 1024)));
        let config = FrameDataConfig::new(2).with_affinity(DeviceAffinity::ScopedTo(MAX_DEVICE_GROUP_SIZE));
        assert!(matches!(
            FrameData::new(&device, config, 0u32),
            Err(Error::NoSuchDevice { device: 32, group_size: 2 })
        ));
        assert_eq!(device.allocated_bytes(0), 0);
    }

    #[test]
    fn last_device_of_largest_group() {
        let device = Arc::new(SoftwareDevice::new(SoftwareDeviceConfig::group(
            MAX_DEVICE_GROUP_SIZE,
            4096,
        )));
        let queue = device.queue(0, 0);
        let config = FrameDataConfig::new(2).with_affinity(DeviceAffinity::ScopedTo(MAX_DEVICE_GROUP_SIZE - 1));
        let mut data = FrameData::new(&device, config, 3u32).unwrap();
        assert_eq!(data.synchronize(&queue, 0).unwrap(), Upload::Submitted);
        queue.wait_idle().unwrap();
        assert_eq!(device.allocated_bytes(MAX_DEVICE_GROUP_SIZE - 1), 512);
    }

    #[test]
    #[should_panic]
    fn zero_slots() {
        let device = device();
        let _ = FrameData::new(&device, FrameDataConfig::new(0), 0u32);
    }

    #[test]
    #[should_panic]
    fn slot_out_of_range() {
        let device = device();
        let queue = device.queue(0, 0);
        let mut data = FrameData::new(&device, FrameDataConfig::new(2), 0u32).unwrap();
        let _ = data.synchronize(&queue, 2);
    }
}
