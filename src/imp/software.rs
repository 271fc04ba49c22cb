// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
An in-memory device group.

Executes command lists on the CPU so the update protocol can be exercised
without a GPU.  It models the parts of a real device that the protocol depends
on:

* one memory budget per physical device, plus a host budget
* device memory instanced per device, placed by [DeviceAffinity]
* host-visible memory that is not coherent unless configured so: writes reach
  the device only through `flush`
* asynchronous queues: `submit` only enqueues, [SoftwareQueue::wait_idle] executes
* per-byte access state, so a copy that reads unpublished host bytes or a read
  of bytes whose transfer was never made visible is reported as [Error::Hazard]

Every submission is logged for inspection with [SoftwareDevice::submissions].
*/

use crate::affinity::{DeviceAffinity, DeviceMask, MAX_DEVICE_GROUP_SIZE};
use crate::bindings::visible_to::GPUBufferUsage;
use crate::commands::{Access, BufferBarrier, BufferCopy, Command, CommandList};
use crate::error::Error;
use crate::imp::{Device, DeviceRegion, HostRegion, RegionRequest};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::{Display, Formatter};
use std::ops::Range;
use std::sync::{Arc, Mutex};

/// Handle to a software allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoftwareBuffer(u64);

impl Display for SoftwareBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SoftwareDeviceConfig {
    /// Bytes of device memory per physical device.  The length is the group size.
    pub device_budgets: Vec<usize>,
    /// Bytes of host-visible memory.
    pub host_budget: usize,
    /// Whether host writes are visible to the device without a flush.
    pub host_coherent: bool,
    pub queue_families: u32,
    pub min_offset_alignment: usize,
}

impl SoftwareDeviceConfig {
    /// A group of `devices` devices with `budget` bytes each.
    ///
    /// Panics unless `1 <= devices <= MAX_DEVICE_GROUP_SIZE`.
    pub fn group(devices: u32, budget: usize) -> Self {
        assert!(devices >= 1, "A device group needs at least one device");
        assert!(
            devices <= MAX_DEVICE_GROUP_SIZE,
            "A device group has at most {MAX_DEVICE_GROUP_SIZE} devices"
        );
        SoftwareDeviceConfig {
            device_budgets: vec![budget; devices as usize],
            ..Self::default()
        }
    }
}

impl Default for SoftwareDeviceConfig {
    fn default() -> Self {
        SoftwareDeviceConfig {
            device_budgets: vec![64 * 1024 * 1024],
            host_budget: 64 * 1024 * 1024,
            host_coherent: false,
            queue_families: 1,
            min_offset_alignment: 256,
        }
    }
}

/// One logged submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub queue_family: u32,
    pub queue_index: u32,
    pub label: String,
    /// The mask passed to submit.
    pub mask: DeviceMask,
    /// The mask set inside the command list.
    pub list_mask: DeviceMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostByte {
    /// Written by the host, not flushed.
    Stale,
    /// Host write available to the device.
    Available,
    /// Made visible to transfer reads.
    TransferReadable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceByte {
    Undefined,
    /// Written by a copy, not yet made visible.
    TransferWritten,
    Visible(Access),
}

#[derive(Debug)]
struct DeviceInstance {
    bytes: Vec<u8>,
    state: Vec<DeviceByte>,
}

#[derive(Debug)]
enum Memory {
    Host { bytes: Vec<u8>, state: Vec<HostByte> },
    Device { instances: BTreeMap<u32, DeviceInstance> },
}

#[derive(Debug)]
struct Allocation {
    label: String,
    size: usize,
    memory: Memory,
}

#[derive(Debug)]
struct Shared {
    budgets: Vec<usize>,
    used: Vec<usize>,
    host_budget: usize,
    host_used: usize,
    host_coherent: bool,
    queue_families: u32,
    min_offset_alignment: usize,
    lost: bool,
    next_id: u64,
    allocations: HashMap<u64, Allocation>,
    submissions: Vec<SubmissionRecord>,
}

fn hazard(label: &str, detail: String) -> Error {
    Error::Hazard {
        label: label.to_string(),
        detail,
    }
}

fn check_bounds(label: &str, allocation: &Allocation, range: &Range<usize>) -> Result<(), Error> {
    if range.end > allocation.size {
        return Err(hazard(
            label,
            format!(
                "{range:?} is out of bounds of {name} ({size} bytes)",
                name = allocation.label,
                size = allocation.size
            ),
        ));
    }
    Ok(())
}

impl Shared {
    fn group_size(&self) -> u32 {
        self.budgets.len() as u32
    }

    fn allocate(&mut self, label: &str, memory: Memory, size: usize) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.allocations.insert(
            id,
            Allocation {
                label: label.to_string(),
                size,
                memory,
            },
        );
        id
    }

    fn free(&mut self, id: u64) {
        let Some(allocation) = self.allocations.remove(&id) else {
            return;
        };
        match allocation.memory {
            Memory::Host { .. } => self.host_used -= allocation.size,
            Memory::Device { instances } => {
                for device in instances.keys() {
                    self.used[*device as usize] -= allocation.size;
                }
            }
        }
    }

    fn allocation(&self, label: &str, buffer: SoftwareBuffer) -> Result<&Allocation, Error> {
        self.allocations
            .get(&buffer.0)
            .ok_or_else(|| hazard(label, format!("{buffer} was destroyed while in use")))
    }

    fn allocation_mut(&mut self, label: &str, buffer: SoftwareBuffer) -> Result<&mut Allocation, Error> {
        self.allocations
            .get_mut(&buffer.0)
            .ok_or_else(|| hazard(label, format!("{buffer} was destroyed while in use")))
    }

    fn execute(&mut self, list: &CommandList<SoftwareBuffer>, mask: DeviceMask) -> Result<(), Error> {
        for device in mask.devices(self.group_size()) {
            let mut list_mask = DeviceMask::UNSCOPED;
            for command in list.commands() {
                match command {
                    Command::SetDeviceMask(m) => list_mask = *m,
                    _ if !list_mask.contains(device) => {}
                    Command::Barrier(barrier) => self.barrier(list.label(), device, barrier)?,
                    Command::Copy(copy) => self.copy(list.label(), device, copy)?,
                }
            }
        }
        Ok(())
    }

    fn barrier(&mut self, label: &str, device: u32, barrier: &BufferBarrier<SoftwareBuffer>) -> Result<(), Error> {
        let range = barrier.range();
        let allocation = self.allocation_mut(label, barrier.buffer)?;
        check_bounds(label, allocation, &range)?;
        match &mut allocation.memory {
            Memory::Host { state, .. } => {
                if barrier.src_access != Access::HostWrite {
                    return Ok(());
                }
                let state = &mut state[range.clone()];
                if state.contains(&HostByte::Stale) {
                    return Err(hazard(
                        label,
                        format!(
                            "barrier over {range:?} of {buffer} covers a host write that was never flushed",
                            buffer = barrier.buffer
                        ),
                    ));
                }
                if barrier.dst_access == Access::TransferRead {
                    state.fill(HostByte::TransferReadable);
                }
            }
            Memory::Device { instances } => {
                let instance = instances.get_mut(&device).ok_or_else(|| {
                    hazard(label, format!("{buffer} has no memory on device {device}", buffer = barrier.buffer))
                })?;
                if barrier.src_access != Access::TransferWrite {
                    return Ok(());
                }
                for byte in &mut instance.state[range] {
                    if *byte == DeviceByte::TransferWritten {
                        *byte = DeviceByte::Visible(barrier.dst_access);
                    }
                }
            }
        }
        Ok(())
    }

    fn copy(&mut self, label: &str, device: u32, copy: &BufferCopy<SoftwareBuffer>) -> Result<(), Error> {
        let src_range = copy.src_offset..copy.src_offset + copy.len;
        let dst_range = copy.dst_offset..copy.dst_offset + copy.len;
        let bytes = {
            let source = self.allocation(label, copy.src)?;
            check_bounds(label, source, &src_range)?;
            match &source.memory {
                Memory::Host { bytes, state } => {
                    if state[src_range.clone()].iter().any(|s| *s != HostByte::TransferReadable) {
                        return Err(hazard(
                            label,
                            format!(
                                "copy reads {src_range:?} of {buffer} before a host write -> transfer read barrier",
                                buffer = copy.src
                            ),
                        ));
                    }
                    bytes[src_range].to_vec()
                }
                Memory::Device { instances } => {
                    let instance = instances.get(&device).ok_or_else(|| {
                        hazard(label, format!("{buffer} has no memory on device {device}", buffer = copy.src))
                    })?;
                    if instance.state[src_range.clone()]
                        .iter()
                        .any(|s| *s != DeviceByte::Visible(Access::TransferRead))
                    {
                        return Err(hazard(
                            label,
                            format!("copy reads {src_range:?} of {buffer} without a barrier", buffer = copy.src),
                        ));
                    }
                    instance.bytes[src_range].to_vec()
                }
            }
        };
        let destination = self.allocation_mut(label, copy.dst)?;
        check_bounds(label, destination, &dst_range)?;
        match &mut destination.memory {
            Memory::Host { .. } => Err(hazard(
                label,
                format!("{buffer} is host memory and cannot be a copy destination", buffer = copy.dst),
            )),
            Memory::Device { instances } => {
                let instance = instances.get_mut(&device).ok_or_else(|| {
                    hazard(label, format!("{buffer} has no memory on device {device}", buffer = copy.dst))
                })?;
                instance.bytes[dst_range.clone()].copy_from_slice(&bytes);
                instance.state[dst_range].fill(DeviceByte::TransferWritten);
                Ok(())
            }
        }
    }
}

/**
A simulated device group.

Regions allocated from it borrow its memory through a shared handle, so they
may outlive the `SoftwareDevice` value itself.
*/
#[derive(Debug)]
pub struct SoftwareDevice {
    shared: Arc<Mutex<Shared>>,
}

impl SoftwareDevice {
    pub fn new(config: SoftwareDeviceConfig) -> Self {
        assert!(!config.device_budgets.is_empty(), "A device group needs at least one device");
        assert!(
            config.device_budgets.len() <= MAX_DEVICE_GROUP_SIZE as usize,
            "A device group has at most {MAX_DEVICE_GROUP_SIZE} devices"
        );
        assert!(config.queue_families >= 1, "A device needs at least one queue family");
        assert!(
            config.min_offset_alignment.is_power_of_two(),
            "Offset alignment must be a power of two"
        );
        logwise::info_sync!(
            "software device group of {count} devices",
            count = config.device_budgets.len()
        );
        let used = vec![0; config.device_budgets.len()];
        SoftwareDevice {
            shared: Arc::new(Mutex::new(Shared {
                budgets: config.device_budgets,
                used,
                host_budget: config.host_budget,
                host_used: 0,
                host_coherent: config.host_coherent,
                queue_families: config.queue_families,
                min_offset_alignment: config.min_offset_alignment,
                lost: false,
                next_id: 0,
                allocations: HashMap::new(),
                submissions: Vec::new(),
            })),
        }
    }

    /// Returns queue `index` of `family`.
    pub fn queue(&self, family: u32, index: u32) -> SoftwareQueue {
        let families = self.shared.lock().unwrap().queue_families;
        assert!(family < families, "No queue family {family}");
        SoftwareQueue {
            family,
            index,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            shared: self.shared.clone(),
        }
    }

    /// Device memory currently allocated on `device`.
    pub fn allocated_bytes(&self, device: u32) -> usize {
        self.shared.lock().unwrap().used[device as usize]
    }

    /// Host-visible memory currently allocated.
    pub fn host_allocated_bytes(&self) -> usize {
        self.shared.lock().unwrap().host_used
    }

    /// Every submission made so far, oldest first.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.shared.lock().unwrap().submissions.clone()
    }

    /// Whether `buffer` has device memory on `device`.
    pub fn has_instance(&self, buffer: SoftwareBuffer, device: u32) -> bool {
        let shared = self.shared.lock().unwrap();
        match shared.allocations.get(&buffer.0).map(|a| &a.memory) {
            Some(Memory::Device { instances }) => instances.contains_key(&device),
            _ => false,
        }
    }

    /**
    Reads device memory the way a shader would.

    Fails with [Error::Hazard] unless every byte in `range` was made visible by
    a barrier after the copy that wrote it.
    */
    pub fn read_for_shader(&self, buffer: SoftwareBuffer, device: u32, range: Range<usize>) -> Result<Vec<u8>, Error> {
        let shared = self.shared.lock().unwrap();
        let label = "read_for_shader";
        let allocation = shared.allocation(label, buffer)?;
        check_bounds(label, allocation, &range)?;
        let Memory::Device { instances } = &allocation.memory else {
            return Err(hazard(label, format!("{buffer} is not device memory")));
        };
        let instance = instances
            .get(&device)
            .ok_or_else(|| hazard(label, format!("{buffer} has no memory on device {device}")))?;
        if let Some(byte) = instance.state[range.clone()]
            .iter()
            .find(|s| !matches!(s, DeviceByte::Visible(_)))
        {
            return Err(hazard(
                label,
                format!("{range:?} of {buffer} on device {device} is not visible to shaders ({byte:?})"),
            ));
        }
        Ok(instance.bytes[range].to_vec())
    }

    /// Simulates device loss; later submissions fail with [Error::DeviceLost].
    pub fn lose_device(&self) {
        logwise::warn_sync!("software device group lost");
        self.shared.lock().unwrap().lost = true;
    }
}

impl Device for SoftwareDevice {
    type Buffer = SoftwareBuffer;
    type Queue = SoftwareQueue;
    type HostRegion = SoftwareHostRegion;
    type DeviceRegion = SoftwareDeviceRegion;

    fn device_count(&self) -> u32 {
        self.shared.lock().unwrap().group_size()
    }

    fn min_offset_alignment(&self, _usage: GPUBufferUsage) -> usize {
        self.shared.lock().unwrap().min_offset_alignment
    }

    fn allocate_host_region(&self, request: &RegionRequest<'_>) -> Result<SoftwareHostRegion, Error> {
        let mut shared = self.shared.lock().unwrap();
        if let DeviceAffinity::ScopedTo(device) = request.affinity {
            if device >= shared.group_size() {
                return Err(Error::NoSuchDevice {
                    device,
                    group_size: shared.group_size(),
                });
            }
        }
        if shared.host_used + request.size > shared.host_budget {
            return Err(Error::OutOfHostMemory {
                requested: request.size,
            });
        }
        shared.host_used += request.size;
        let id = shared.allocate(
            request.label,
            Memory::Host {
                bytes: vec![0; request.size],
                state: vec![HostByte::Available; request.size],
            },
            request.size,
        );
        Ok(SoftwareHostRegion {
            id,
            mapped: vec![0; request.size].into_boxed_slice(),
            shared: self.shared.clone(),
        })
    }

    fn allocate_device_region(&self, request: &RegionRequest<'_>) -> Result<SoftwareDeviceRegion, Error> {
        let mut shared = self.shared.lock().unwrap();
        let group_size = shared.group_size();
        let mask = request.affinity.mask();
        if let Some(device) = mask.first_missing_device(group_size) {
            return Err(Error::NoSuchDevice { device, group_size });
        }
        let devices = mask.devices(group_size);
        //check every budget before charging any
        for device in &devices {
            let d = *device as usize;
            let available = shared.budgets[d] - shared.used[d];
            if request.size > available {
                return Err(Error::OutOfDeviceMemory {
                    device: *device,
                    requested: request.size,
                    available,
                });
            }
        }
        let mut instances = BTreeMap::new();
        for device in devices {
            shared.used[device as usize] += request.size;
            instances.insert(
                device,
                DeviceInstance {
                    bytes: vec![0; request.size],
                    state: vec![DeviceByte::Undefined; request.size],
                },
            );
        }
        let id = shared.allocate(request.label, Memory::Device { instances }, request.size);
        Ok(SoftwareDeviceRegion {
            id,
            size: request.size,
            shared: self.shared.clone(),
        })
    }

    fn submit(
        &self,
        queue: &SoftwareQueue,
        commands: &CommandList<SoftwareBuffer>,
        mask: DeviceMask,
    ) -> Result<(), Error> {
        let mut shared = self.shared.lock().unwrap();
        if shared.lost {
            return Err(Error::DeviceLost);
        }
        if commands.queue_family() != queue.family {
            return Err(Error::QueueFamilyMismatch {
                recorded: commands.queue_family(),
                queue: queue.family,
            });
        }
        let group_size = shared.group_size();
        for m in [mask, commands.device_mask()] {
            if let Some(device) = m.first_missing_device(group_size) {
                return Err(Error::NoSuchDevice { device, group_size });
            }
        }
        for command in commands.commands() {
            let buffers = match command {
                Command::SetDeviceMask(_) => continue,
                Command::Barrier(barrier) => [barrier.buffer, barrier.buffer],
                Command::Copy(copy) => [copy.src, copy.dst],
            };
            for buffer in buffers {
                if !shared.allocations.contains_key(&buffer.0) {
                    return Err(Error::SubmitFailed {
                        label: commands.label().to_string(),
                        mask,
                        reason: format!("{buffer} does not exist"),
                    });
                }
            }
        }
        shared.submissions.push(SubmissionRecord {
            queue_family: queue.family,
            queue_index: queue.index,
            label: commands.label().to_string(),
            mask,
            list_mask: commands.device_mask(),
        });
        drop(shared);
        queue.pending.lock().unwrap().push_back(Pending {
            commands: commands.clone(),
            mask,
        });
        Ok(())
    }
}

#[derive(Debug)]
struct Pending {
    commands: CommandList<SoftwareBuffer>,
    mask: DeviceMask,
}

/// A queue of a [SoftwareDevice].  Work runs only in [SoftwareQueue::wait_idle].
#[derive(Debug, Clone)]
pub struct SoftwareQueue {
    family: u32,
    index: u32,
    pending: Arc<Mutex<VecDeque<Pending>>>,
    shared: Arc<Mutex<Shared>>,
}

impl SoftwareQueue {
    pub fn family(&self) -> u32 {
        self.family
    }

    /// Submissions enqueued but not yet executed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /**
    Executes everything enqueued, in submission order.

    Stops at the first failing submission and discards the rest; the queue is
    empty afterwards either way.
    */
    pub fn wait_idle(&self) -> Result<(), Error> {
        let drained: Vec<Pending> = self.pending.lock().unwrap().drain(..).collect();
        let mut shared = self.shared.lock().unwrap();
        for pending in drained {
            logwise::trace_sync!(
                "executing {list}",
                list = logwise::privacy::LogIt(&pending.commands.label())
            );
            shared.execute(&pending.commands, pending.mask)?;
        }
        Ok(())
    }
}

/// Host-visible memory of a [SoftwareDevice].
#[derive(Debug)]
pub struct SoftwareHostRegion {
    id: u64,
    //the host's mapping; reaches device-visible memory on flush
    mapped: Box<[u8]>,
    shared: Arc<Mutex<Shared>>,
}

impl HostRegion for SoftwareHostRegion {
    type Buffer = SoftwareBuffer;

    fn buffer(&self) -> SoftwareBuffer {
        SoftwareBuffer(self.id)
    }

    fn mapped(&self) -> &[u8] {
        &self.mapped
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        let range = offset..offset + data.len();
        assert!(range.end <= self.mapped.len(), "Write out of bounds");
        self.mapped[range.clone()].copy_from_slice(data);
        let mut shared = self.shared.lock().unwrap();
        let coherent = shared.host_coherent;
        if let Some(Allocation {
            memory: Memory::Host { bytes, state },
            ..
        }) = shared.allocations.get_mut(&self.id)
        {
            if coherent {
                bytes[range.clone()].copy_from_slice(data);
                state[range].fill(HostByte::Available);
            } else {
                state[range].fill(HostByte::Stale);
            }
        }
    }

    fn flush(&mut self, range: Range<usize>) -> Result<(), Error> {
        assert!(range.end <= self.mapped.len(), "Flush out of bounds");
        let mut shared = self.shared.lock().unwrap();
        if shared.lost {
            return Err(Error::DeviceLost);
        }
        if let Some(Allocation {
            memory: Memory::Host { bytes, state },
            ..
        }) = shared.allocations.get_mut(&self.id)
        {
            bytes[range.clone()].copy_from_slice(&self.mapped[range.clone()]);
            for byte in &mut state[range] {
                if *byte == HostByte::Stale {
                    *byte = HostByte::Available;
                }
            }
        }
        Ok(())
    }
}

impl Drop for SoftwareHostRegion {
    fn drop(&mut self) {
        self.shared.lock().unwrap().free(self.id);
    }
}

/// Device memory of a [SoftwareDevice].
#[derive(Debug)]
pub struct SoftwareDeviceRegion {
    id: u64,
    size: usize,
    shared: Arc<Mutex<Shared>>,
}

impl DeviceRegion for SoftwareDeviceRegion {
    type Buffer = SoftwareBuffer;

    fn buffer(&self) -> SoftwareBuffer {
        SoftwareBuffer(self.id)
    }

    fn byte_len(&self) -> usize {
        self.size
    }
}

impl Drop for SoftwareDeviceRegion {
    fn drop(&mut self) {
        self.shared.lock().unwrap().free(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandListBuilder;

    fn request(label: &str, size: usize, affinity: DeviceAffinity) -> RegionRequest<'_> {
        RegionRequest {
            label,
            size,
            usage: GPUBufferUsage::VertexShaderRead,
            affinity,
            queue_family: 0,
        }
    }

    fn regions(device: &SoftwareDevice, affinity: DeviceAffinity) -> (SoftwareHostRegion, SoftwareDeviceRegion) {
        let host = device.allocate_host_region(&request("staging", 64, affinity)).unwrap();
        let gpu = device.allocate_device_region(&request("device", 64, affinity)).unwrap();
        (host, gpu)
    }

    fn update(host: &SoftwareHostRegion, gpu: &SoftwareDeviceRegion) -> CommandList<SoftwareBuffer> {
        CommandList::slot_update(
            "update".to_string(),
            0,
            &host.buffer(),
            &gpu.buffer(),
            0,
            64,
            DeviceMask::UNSCOPED,
            Access::ShaderRead,
        )
    }

    #[test]
    fn update_round_trip() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::default());
        let queue = device.queue(0, 0);
        let (mut host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        host.write(0, &[7; 64]);
        host.flush(0..64).unwrap();
        device.submit(&queue, &update(&host, &gpu), DeviceMask::UNSCOPED).unwrap();
        //nothing runs until the queue does
        assert!(device.read_for_shader(gpu.buffer(), 0, 0..64).is_err());
        queue.wait_idle().unwrap();
        assert_eq!(device.read_for_shader(gpu.buffer(), 0, 0..64).unwrap(), vec![7; 64]);
    }

    #[test]
    fn unflushed_write_is_a_hazard() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::default());
        let queue = device.queue(0, 0);
        let (mut host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        host.write(0, &[1; 64]);
        device.submit(&queue, &update(&host, &gpu), DeviceMask::UNSCOPED).unwrap();
        assert!(matches!(queue.wait_idle(), Err(Error::Hazard { .. })));
    }

    #[test]
    fn coherent_memory_needs_no_flush() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig {
            host_coherent: true,
            ..SoftwareDeviceConfig::default()
        });
        let queue = device.queue(0, 0);
        let (mut host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        host.write(0, &[3; 64]);
        device.submit(&queue, &update(&host, &gpu), DeviceMask::UNSCOPED).unwrap();
        queue.wait_idle().unwrap();
        assert_eq!(device.read_for_shader(gpu.buffer(), 0, 0..64).unwrap(), vec![3; 64]);
    }

    #[test]
    fn copy_without_barriers_is_a_hazard() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::default());
        let queue = device.queue(0, 0);
        let (mut host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        host.write(0, &[1; 64]);
        host.flush(0..64).unwrap();
        let mut builder = CommandListBuilder::new("bare copy".to_string(), 0);
        builder.copy(BufferCopy {
            src: host.buffer(),
            dst: gpu.buffer(),
            src_offset: 0,
            dst_offset: 0,
            len: 64,
        });
        device.submit(&queue, &builder.finish(), DeviceMask::UNSCOPED).unwrap();
        assert!(matches!(queue.wait_idle(), Err(Error::Hazard { .. })));
    }

    #[test]
    fn missing_final_barrier_hides_data_from_shaders() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::default());
        let queue = device.queue(0, 0);
        let (mut host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        host.write(0, &[1; 64]);
        host.flush(0..64).unwrap();
        let full = update(&host, &gpu);
        let mut builder = CommandListBuilder::new("no visibility".to_string(), 0);
        for command in &full.commands()[..2] {
            match command {
                Command::Barrier(b) => builder.barrier(b.clone()),
                Command::Copy(c) => builder.copy(c.clone()),
                Command::SetDeviceMask(m) => builder.set_device_mask(*m),
            };
        }
        device.submit(&queue, &builder.finish(), DeviceMask::UNSCOPED).unwrap();
        queue.wait_idle().unwrap();
        assert!(matches!(
            device.read_for_shader(gpu.buffer(), 0, 0..64),
            Err(Error::Hazard { .. })
        ));
    }

    #[test]
    fn budgets() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::group(2, 100));
        let unscoped = device
            .allocate_device_region(&request("both", 60, DeviceAffinity::Unscoped))
            .unwrap();
        assert_eq!(device.allocated_bytes(0), 60);
        assert_eq!(device.allocated_bytes(1), 60);
        assert!(matches!(
            device.allocate_device_region(&request("too big", 50, DeviceAffinity::ScopedTo(1))),
            Err(Error::OutOfDeviceMemory { device: 1, .. })
        ));
        let scoped = device
            .allocate_device_region(&request("one", 40, DeviceAffinity::ScopedTo(1)))
            .unwrap();
        assert_eq!(device.allocated_bytes(0), 60);
        assert_eq!(device.allocated_bytes(1), 100);
        drop(unscoped);
        drop(scoped);
        assert_eq!(device.allocated_bytes(0), 0);
        assert_eq!(device.allocated_bytes(1), 0);
    }

    #[test]
    fn host_budget() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig {
            host_budget: 32,
            ..SoftwareDeviceConfig::default()
        });
        assert!(matches!(
            device.allocate_host_region(&request("staging", 64, DeviceAffinity::Unscoped)),
            Err(Error::OutOfHostMemory { requested: 64 })
        ));
    }

    #[test]
    fn unknown_device() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::group(2, 100));
        assert!(matches!(
            device.allocate_device_region(&request("x", 4, DeviceAffinity::ScopedTo(2))),
            Err(Error::NoSuchDevice { device: 2, group_size: 2 })
        ));
    }

    #[test]
    fn wrong_queue_family() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig {
            queue_families: 2,
            ..SoftwareDeviceConfig::default()
        });
        let (host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        let compute = device.queue(1, 0);
        assert!(matches!(
            device.submit(&compute, &update(&host, &gpu), DeviceMask::UNSCOPED),
            Err(Error::QueueFamilyMismatch { recorded: 0, queue: 1 })
        ));
        assert!(device.submissions().is_empty());
    }

    #[test]
    fn destroyed_region_in_flight() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::default());
        let queue = device.queue(0, 0);
        let (mut host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        host.write(0, &[1; 64]);
        host.flush(0..64).unwrap();
        device.submit(&queue, &update(&host, &gpu), DeviceMask::UNSCOPED).unwrap();
        drop(gpu);
        assert!(matches!(queue.wait_idle(), Err(Error::Hazard { .. })));
    }

    #[test]
    fn lost_device() {
        let device = SoftwareDevice::new(SoftwareDeviceConfig::default());
        let queue = device.queue(0, 0);
        let (host, gpu) = regions(&device, DeviceAffinity::Unscoped);
        device.lose_device();
        assert!(matches!(
            device.submit(&queue, &update(&host, &gpu), DeviceMask::UNSCOPED),
            Err(Error::DeviceLost)
        ));
    }

    #[test]
    #[should_panic]
    fn group_larger_than_mask_width() {
        let _ = SoftwareDeviceConfig::group(MAX_DEVICE_GROUP_SIZE + 1, 1024);
    }

    #[test]
    #[should_panic]
    fn oversized_budget_list() {
        let _ = SoftwareDevice::new(SoftwareDeviceConfig {
            device_budgets: vec![1024; MAX_DEVICE_GROUP_SIZE as usize + 1],
            ..SoftwareDeviceConfig::default()
        });
    }
}
