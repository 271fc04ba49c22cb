// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! wgpu backend.
//!
//! A wgpu device is a device group of one, with one queue family.
//!
//! ## Differences from explicit APIs
//!
//! - **Barriers**: wgpu tracks buffer state itself, so recorded barriers are
//!   validated against the group but otherwise skipped.
//! - **Replay**: wgpu command buffers are single-use, so the immutable
//!   [CommandList] is re-encoded on every submission.  The list itself is still
//!   recorded once.
//! - **Host memory**: `MAP_WRITE` buffers may only be `COPY_SRC`, and mapping is
//!   asynchronous.  The host region therefore keeps a host-side copy of its
//!   bytes, and `flush` publishes a range with `Queue::write_buffer`, which wgpu
//!   orders before any command buffer in the next submission.

use crate::affinity::{DeviceAffinity, DeviceMask};
use crate::bindings::visible_to::GPUBufferUsage;
use crate::commands::{Command, CommandList};
use crate::error::Error;
use crate::imp::{Device, DeviceRegion, HostRegion, RegionRequest};
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use wgpu::{BufferDescriptor, BufferUsages, CommandEncoderDescriptor, Label};

fn check_affinity(affinity: DeviceAffinity) -> Result<(), Error> {
    match affinity {
        DeviceAffinity::ScopedTo(device) if device != 0 => Err(Error::NoSuchDevice {
            device,
            group_size: 1,
        }),
        _ => Ok(()),
    }
}

fn check_mask(mask: DeviceMask) -> Result<(), Error> {
    match mask.first_missing_device(1) {
        Some(device) => Err(Error::NoSuchDevice {
            device,
            group_size: 1,
        }),
        None => Ok(()),
    }
}

/// A wgpu device and the queue it was created with.
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
}

impl WgpuDevice {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let move_lost = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            logwise::error_sync!(
                "wgpu device lost: {reason} {message}",
                reason = logwise::privacy::LogIt(&reason),
                message = logwise::privacy::LogIt(&message)
            );
            move_lost.store(true, Ordering::Relaxed);
        });
        WgpuDevice {
            device,
            queue,
            lost,
        }
    }

    /// Creates a device on the default adapter.
    pub async fn request(label: &str) -> Result<Self, Error> {
        let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
        let instance = wgpu::Instance::new(&descriptor);
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .map_err(|_| Error::NoSuchAdapter)?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Label::from(label),
                ..Default::default()
            })
            .await?;
        Ok(Self::new(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /**
    Copies `range` of a device buffer back to the host, blocking until the GPU is done.

    Intended for tests and debugging.  Not available on wasm, where blocking is not allowed.
    */
    #[cfg(not(target_arch = "wasm32"))]
    pub fn read_back(&self, buffer: &wgpu::Buffer, range: Range<usize>) -> Result<Vec<u8>, Error> {
        let len = (range.end - range.start) as u64;
        let readback = self.device.create_buffer(&BufferDescriptor {
            label: Label::from("frame_constants::read_back"),
            size: len,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Label::from("frame_constants::read_back"),
        });
        encoder.copy_buffer_to_buffer(buffer, range.start as u64, &readback, 0, len);
        self.queue.submit(std::iter::once(encoder.finish()));
        let (s, r) = std::sync::mpsc::channel();
        readback.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = s.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::Wait);
        r.recv()
            .map_err(|_| Error::DeviceLost)?
            .map_err(|_| Error::DeviceLost)?;
        let bytes = readback.slice(..).get_mapped_range().to_vec();
        readback.unmap();
        Ok(bytes)
    }
}

impl Device for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type Queue = wgpu::Queue;
    type HostRegion = WgpuHostRegion;
    type DeviceRegion = WgpuDeviceRegion;

    fn device_count(&self) -> u32 {
        1
    }

    fn min_offset_alignment(&self, usage: GPUBufferUsage) -> usize {
        let limits = self.device.limits();
        if usage.is_uniform() {
            limits.min_uniform_buffer_offset_alignment as usize
        } else if usage == GPUBufferUsage::StorageRead {
            limits.min_storage_buffer_offset_alignment as usize
        } else {
            wgpu::COPY_BUFFER_ALIGNMENT as usize
        }
    }

    fn allocate_host_region(&self, request: &RegionRequest<'_>) -> Result<WgpuHostRegion, Error> {
        check_affinity(request.affinity)?;
        if request.size as u64 > self.device.limits().max_buffer_size {
            return Err(Error::OutOfHostMemory {
                requested: request.size,
            });
        }
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Label::from(request.label),
            size: request.size as u64,
            usage: BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuHostRegion {
            buffer,
            queue: self.queue.clone(),
            mapped: vec![0; request.size].into_boxed_slice(),
        })
    }

    fn allocate_device_region(&self, request: &RegionRequest<'_>) -> Result<WgpuDeviceRegion, Error> {
        check_affinity(request.affinity)?;
        let max = self.device.limits().max_buffer_size;
        if request.size as u64 > max {
            return Err(Error::OutOfDeviceMemory {
                device: 0,
                requested: request.size,
                available: max as usize,
            });
        }
        let consumer = match request.usage {
            GPUBufferUsage::VertexShaderRead
            | GPUBufferUsage::FragmentShaderRead
            | GPUBufferUsage::ComputeShaderRead => BufferUsages::UNIFORM,
            GPUBufferUsage::StorageRead => BufferUsages::STORAGE,
            GPUBufferUsage::VertexBuffer => BufferUsages::VERTEX,
            GPUBufferUsage::Index => BufferUsages::INDEX,
        };
        //COPY_SRC so the region can be read back
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Label::from(request.label),
            size: request.size as u64,
            usage: consumer | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Ok(WgpuDeviceRegion {
            buffer,
            size: request.size,
        })
    }

    fn submit(
        &self,
        queue: &wgpu::Queue,
        commands: &CommandList<wgpu::Buffer>,
        mask: DeviceMask,
    ) -> Result<(), Error> {
        if self.lost.load(Ordering::Relaxed) {
            return Err(Error::DeviceLost);
        }
        if commands.queue_family() != 0 {
            return Err(Error::QueueFamilyMismatch {
                recorded: commands.queue_family(),
                queue: 0,
            });
        }
        check_mask(mask)?;
        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Label::from(commands.label()),
        });
        for command in commands.commands() {
            match command {
                Command::SetDeviceMask(m) => check_mask(*m)?,
                Command::Barrier(_) => {}
                Command::Copy(copy) => encoder.copy_buffer_to_buffer(
                    &copy.src,
                    copy.src_offset as u64,
                    &copy.dst,
                    copy.dst_offset as u64,
                    copy.len as u64,
                ),
            }
        }
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

/**
A staging buffer plus its host-side bytes.
*/
#[derive(Debug)]
pub struct WgpuHostRegion {
    buffer: wgpu::Buffer,
    queue: wgpu::Queue,
    mapped: Box<[u8]>,
}

impl HostRegion for WgpuHostRegion {
    type Buffer = wgpu::Buffer;

    fn buffer(&self) -> wgpu::Buffer {
        self.buffer.clone()
    }

    fn mapped(&self) -> &[u8] {
        &self.mapped
    }

    fn write(&mut self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.mapped.len(), "Write out of bounds");
        self.mapped[offset..offset + data.len()].copy_from_slice(data);
    }

    fn flush(&mut self, range: Range<usize>) -> Result<(), Error> {
        assert!(range.end <= self.mapped.len(), "Flush out of bounds");
        //write_buffer wants COPY_BUFFER_ALIGNMENT-aligned offsets and sizes
        let alignment = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        let start = range.start & !(alignment - 1);
        let end = crate::bittricks::round_up(range.end, alignment).min(self.mapped.len());
        self.queue
            .write_buffer(&self.buffer, start as u64, &self.mapped[start..end]);
        Ok(())
    }
}

/// A device-resident wgpu buffer.
#[derive(Debug)]
pub struct WgpuDeviceRegion {
    buffer: wgpu::Buffer,
    size: usize,
}

impl DeviceRegion for WgpuDeviceRegion {
    type Buffer = wgpu::Buffer;

    fn buffer(&self) -> wgpu::Buffer {
        self.buffer.clone()
    }

    fn byte_len(&self) -> usize {
        self.size
    }
}
