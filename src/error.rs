// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error type.
//!
//! Only construction and submission failures are errors.  Contract violations
//! (out-of-range slots, non-power-of-two alignment, zero slots) panic instead.

use crate::affinity::DeviceMask;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("out of device memory allocating {requested} bytes on device {device} ({available} available)")]
    OutOfDeviceMemory {
        device: u32,
        requested: usize,
        available: usize,
    },
    #[error("out of host memory allocating {requested} bytes")]
    OutOfHostMemory { requested: usize },
    #[error("device {device} is not part of a group of {group_size}")]
    NoSuchDevice { device: u32, group_size: u32 },
    #[error("device mask {0:#b} names more than one device for a host-writable resource")]
    AmbiguousDeviceMask(u32),
    #[error("commands recorded for queue family {recorded} submitted to queue family {queue}")]
    QueueFamilyMismatch { recorded: u32, queue: u32 },
    #[error("{label}: {detail}")]
    Hazard { label: String, detail: String },
    #[error("submission of {label} with mask {mask} failed: {reason}")]
    SubmitFailed {
        label: String,
        mask: DeviceMask,
        reason: String,
    },
    #[error("device lost")]
    DeviceLost,
    #[error("no such adapter")]
    NoSuchAdapter,
    #[cfg(feature = "backend_wgpu")]
    #[error("{0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}
