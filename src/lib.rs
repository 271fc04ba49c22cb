// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! frame_constants keeps small shader-visible values current across frames in flight.

Per-frame constants (camera matrices, transforms, simulation parameters) change
on the CPU every tick but are read by GPU work that may still be executing for
earlier frames.  The usual answer is one copy per frame in flight.  This crate
packages that pattern:

| Concern            | Handled by                                                        |
|--------------------|-------------------------------------------------------------------|
| Slot placement     | one region per value type, slots at `slot * stride`               |
| Redundant uploads  | byte comparison against the last staged value; unchanged = no-op  |
| Transfer ordering  | one pre-recorded barrier / copy / barrier command per slot        |
| Multi-device       | device affinity scopes both allocation and submission             |

# Example

```
use std::sync::Arc;
use frame_constants::{FrameData, FrameDataConfig, Upload};
use frame_constants::imp::software::{SoftwareDevice, SoftwareDeviceConfig};

let device = Arc::new(SoftwareDevice::new(SoftwareDeviceConfig::default()));
let queue = device.queue(0, 0);

let identity: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];
let mut camera = FrameData::new(&device, FrameDataConfig::new(3), identity).unwrap();

for frame in 0..6 {
    let slot = frame % camera.slot_count();
    let upload = camera.synchronize(&queue, slot).unwrap();
    // the first pass over each slot uploads; after that the value never changed
    assert_eq!(upload == Upload::Submitted, frame < 3);
    // ...record the frame's draws, binding camera.device_buffer() at camera.offset_for_slot(slot)
}
queue.wait_idle().unwrap();
```

# Backends

Memory and submission go through the [imp::Device] trait.  A software device
group ([imp::software]) is always available and validates the transfer
ordering; a [wgpu](https://wgpu.rs) backend is built with the default
`backend_wgpu` feature.
*/

pub mod affinity;
pub mod bindings;
mod bittricks;
pub mod commands;
pub mod config;
pub mod dirty_tracking;
pub mod error;
pub mod frame_data;
pub mod imp;
pub mod layout;

pub use affinity::{DeviceAffinity, DeviceMask};
pub use bindings::CRepr;
pub use bittricks::round_up;
pub use config::{FrameDataConfig, MAX_OFFSET_ALIGNMENT};
pub use error::Error;
pub use frame_data::{FrameData, Upload};
pub use layout::AlignedRegionLayout;
