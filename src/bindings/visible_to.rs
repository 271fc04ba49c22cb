// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Usage declarations for device regions.
//!
//! A [crate::FrameData] device region is always a transfer destination; the
//! usage declared here says how the frame's draw or dispatch consumes it, which
//! decides both the backend buffer usage and the access the final barrier of
//! each update command makes the data visible to.
//!
//! # Examples
//!
//! ```
//! use frame_constants::bindings::visible_to::GPUBufferUsage;
//! use frame_constants::commands::Access;
//!
//! // camera matrices read by the vertex shader
//! let usage = GPUBufferUsage::VertexShaderRead;
//! assert_eq!(usage.consumer_access(), Access::ShaderRead);
//!
//! // particle positions drawn straight from the buffer
//! let usage = GPUBufferUsage::VertexBuffer;
//! assert_eq!(usage.consumer_access(), Access::VertexAttributeRead);
//! ```

use crate::commands::Access;

/// Describes how a device region will be used on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GPUBufferUsage {
    /// Uniform data read by the vertex shader.
    #[default]
    VertexShaderRead,
    /// Uniform data read by the fragment shader.
    FragmentShaderRead,
    /// Uniform data read by a compute shader.
    ComputeShaderRead,
    /// Storage-buffer data read by any shader stage.
    ///
    /// Use for values too large for a uniform binding.
    StorageRead,
    /// The buffer contains vertex attribute data.
    VertexBuffer,
    /// The buffer contains index data for indexed drawing.
    Index,
}

impl GPUBufferUsage {
    /// The access downstream commands perform on the device region.
    pub fn consumer_access(self) -> Access {
        match self {
            GPUBufferUsage::VertexShaderRead
            | GPUBufferUsage::FragmentShaderRead
            | GPUBufferUsage::ComputeShaderRead
            | GPUBufferUsage::StorageRead => Access::ShaderRead,
            GPUBufferUsage::VertexBuffer => Access::VertexAttributeRead,
            GPUBufferUsage::Index => Access::IndexRead,
        }
    }

    /// Whether the region is bound as a uniform buffer.
    pub fn is_uniform(self) -> bool {
        matches!(
            self,
            GPUBufferUsage::VertexShaderRead
                | GPUBufferUsage::FragmentShaderRead
                | GPUBufferUsage::ComputeShaderRead
        )
    }
}

#[cfg(test)]
mod tests {
    use super::GPUBufferUsage;
    use crate::commands::Access;

    #[test]
    fn storage_is_shader_read_but_not_uniform() {
        assert_eq!(GPUBufferUsage::StorageRead.consumer_access(), Access::ShaderRead);
        assert!(!GPUBufferUsage::StorageRead.is_uniform());
        assert!(GPUBufferUsage::ComputeShaderRead.is_uniform());
        assert_eq!(GPUBufferUsage::Index.consumer_access(), Access::IndexRead);
    }
}
