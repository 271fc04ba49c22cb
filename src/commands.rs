// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Pre-recorded transfer commands.

A [CommandList] is recorded once with a [CommandListBuilder] and is immutable
afterwards.  Backends replay it by reference on every submission; nothing about
the list is re-described per frame.

The list is generic over the backend's buffer handle `B`, which is whatever the
backend needs to find the memory again at replay time.

# Slot updates

[CommandList::slot_update] records the three-step sequence that moves one slot
from the staging region to the device region:

1. barrier on the staging slot, host write -> transfer read
2. copy `stride` bytes, staging offset -> device offset
3. barrier on the device slot, transfer write -> the consumer's read access

Dropping either barrier lets the copy read bytes the host has not finished
publishing, or lets a shader read bytes the copy has not finished writing.
*/

use crate::affinity::DeviceMask;
use std::fmt::{Display, Formatter};
use std::ops::Range;

/// Pipeline stage on either side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Host,
    Transfer,
    AllCommands,
}

/// Memory access on either side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    HostWrite,
    TransferRead,
    TransferWrite,
    ShaderRead,
    VertexAttributeRead,
    IndexRead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferBarrier<B> {
    pub buffer: B,
    pub offset: usize,
    pub len: usize,
    pub src_stage: Stage,
    pub dst_stage: Stage,
    pub src_access: Access,
    pub dst_access: Access,
}

impl<B> BufferBarrier<B> {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferCopy<B> {
    pub src: B,
    pub dst: B,
    pub src_offset: usize,
    pub dst_offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<B> {
    /// Restricts the rest of the list to the devices in the mask.
    SetDeviceMask(DeviceMask),
    Barrier(BufferBarrier<B>),
    Copy(BufferCopy<B>),
}

/// An immutable, replayable list of commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandList<B> {
    label: String,
    queue_family: u32,
    commands: Vec<Command<B>>,
}

impl<B> CommandList<B> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The queue family this list may be submitted to.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn commands(&self) -> &[Command<B>] {
        &self.commands
    }

    /// The device mask set inside the list, if any.
    pub fn device_mask(&self) -> DeviceMask {
        self.commands
            .iter()
            .rev()
            .find_map(|command| match command {
                Command::SetDeviceMask(mask) => Some(*mask),
                _ => None,
            })
            .unwrap_or(DeviceMask::UNSCOPED)
    }
}

impl<B: Clone> CommandList<B> {
    /**
    Records the update command for one slot.

    `offset` is the slot's offset in both regions and `stride` the number of
    bytes copied.  A non-unscoped `mask` is set first so only those devices
    execute the transfer.  `consumer` is the access the device slot is made
    visible to.
    */
    #[allow(clippy::too_many_arguments)]
    pub fn slot_update(
        label: String,
        queue_family: u32,
        staging: &B,
        device: &B,
        offset: usize,
        stride: usize,
        mask: DeviceMask,
        consumer: Access,
    ) -> Self {
        let mut builder = CommandListBuilder::new(label, queue_family);
        if !mask.is_unscoped() {
            builder.set_device_mask(mask);
        }
        builder
            .barrier(BufferBarrier {
                buffer: staging.clone(),
                offset,
                len: stride,
                src_stage: Stage::Host,
                dst_stage: Stage::Transfer,
                src_access: Access::HostWrite,
                dst_access: Access::TransferRead,
            })
            .copy(BufferCopy {
                src: staging.clone(),
                dst: device.clone(),
                src_offset: offset,
                dst_offset: offset,
                len: stride,
            })
            .barrier(BufferBarrier {
                buffer: device.clone(),
                offset,
                len: stride,
                src_stage: Stage::Transfer,
                dst_stage: Stage::AllCommands,
                src_access: Access::TransferWrite,
                dst_access: consumer,
            });
        builder.finish()
    }
}

impl<B> Display for CommandList<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} commands, family {})",
            self.label,
            self.commands.len(),
            self.queue_family
        )
    }
}

/// Records a [CommandList].
#[derive(Debug)]
pub struct CommandListBuilder<B> {
    list: CommandList<B>,
}

impl<B> CommandListBuilder<B> {
    pub fn new(label: String, queue_family: u32) -> Self {
        CommandListBuilder {
            list: CommandList {
                label,
                queue_family,
                commands: Vec::new(),
            },
        }
    }

    pub fn set_device_mask(&mut self, mask: DeviceMask) -> &mut Self {
        self.list.commands.push(Command::SetDeviceMask(mask));
        self
    }

    pub fn barrier(&mut self, barrier: BufferBarrier<B>) -> &mut Self {
        self.list.commands.push(Command::Barrier(barrier));
        self
    }

    pub fn copy(&mut self, copy: BufferCopy<B>) -> &mut Self {
        self.list.commands.push(Command::Copy(copy));
        self
    }

    pub fn finish(self) -> CommandList<B> {
        self.list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Buf {
        Staging,
        Device,
    }

    #[test]
    fn slot_update_order() {
        let list = CommandList::slot_update(
            "camera update[1]".to_string(),
            0,
            &Buf::Staging,
            &Buf::Device,
            256,
            256,
            DeviceMask::UNSCOPED,
            Access::ShaderRead,
        );
        assert_eq!(list.commands().len(), 3);
        match &list.commands()[0] {
            Command::Barrier(b) => {
                assert_eq!(b.buffer, Buf::Staging);
                assert_eq!(b.range(), 256..512);
                assert_eq!((b.src_access, b.dst_access), (Access::HostWrite, Access::TransferRead));
            }
            other => panic!("expected barrier, got {other:?}"),
        }
        match &list.commands()[1] {
            Command::Copy(c) => {
                assert_eq!((c.src, c.dst), (Buf::Staging, Buf::Device));
                assert_eq!((c.src_offset, c.dst_offset, c.len), (256, 256, 256));
            }
            other => panic!("expected copy, got {other:?}"),
        }
        match &list.commands()[2] {
            Command::Barrier(b) => {
                assert_eq!(b.buffer, Buf::Device);
                assert_eq!((b.src_access, b.dst_access), (Access::TransferWrite, Access::ShaderRead));
            }
            other => panic!("expected barrier, got {other:?}"),
        }
        assert!(list.device_mask().is_unscoped());
    }

    #[test]
    fn scoped_update_sets_mask_first() {
        let list = CommandList::slot_update(
            "sim".to_string(),
            2,
            &Buf::Staging,
            &Buf::Device,
            0,
            64,
            DeviceMask::single(1),
            Access::VertexAttributeRead,
        );
        assert_eq!(list.commands().len(), 4);
        assert_eq!(list.commands()[0], Command::SetDeviceMask(DeviceMask::single(1)));
        assert_eq!(list.device_mask(), DeviceMask::single(1));
        assert_eq!(list.queue_family(), 2);
    }
}
