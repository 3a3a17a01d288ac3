/// Buffer descriptor and usage flags

use bitflags::bitflags;

use crate::error::ResourceError;

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer
        const VERTEX = 1 << 0;
        /// Index buffer
        const INDEX = 1 << 1;
        /// Uniform buffer
        const UNIFORM = 1 << 2;
        /// Storage buffer
        const STORAGE = 1 << 3;
        /// Source of copies
        const TRANSFER_SRC = 1 << 4;
        /// Destination of copies and uploads
        const TRANSFER_DST = 1 << 5;
    }
}

/// Memory residency class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Device-local, not visible to the CPU. Filled through initial contents only.
    GpuOnly,
    /// Host-visible, written by the CPU every frame
    CpuToGpu,
    /// Host-visible, read back by the CPU
    GpuToCpu,
}

impl MemoryLocation {
    /// Whether the CPU can map the memory
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, MemoryLocation::GpuOnly)
    }
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Element stride in bytes (0 = raw bytes)
    pub stride: u32,
    /// Usage flags
    pub usage: BufferUsage,
    /// Memory residency
    pub memory: MemoryLocation,
    /// Optional debug name
    pub debug_name: Option<String>,
}

impl BufferDesc {
    /// Device-local buffer with the given usage
    pub fn gpu_only(size: u64, stride: u32, usage: BufferUsage) -> Self {
        Self {
            size,
            stride,
            usage,
            memory: MemoryLocation::GpuOnly,
            debug_name: None,
        }
    }

    /// Host-visible buffer with the given usage
    pub fn cpu_to_gpu(size: u64, stride: u32, usage: BufferUsage) -> Self {
        Self {
            memory: MemoryLocation::CpuToGpu,
            ..Self::gpu_only(size, stride, usage)
        }
    }

    /// Attach a debug name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    /// Check the description, and the initial contents when supplied
    pub fn validate(&self, initial_data: Option<&[u8]>) -> Result<(), ResourceError> {
        if self.size == 0 {
            return Err(ResourceError::InvalidDescription("buffer size is zero".to_string()));
        }
        if self.usage.is_empty() {
            return Err(ResourceError::UnsupportedUsageCombination(
                "buffer has no usage flags".to_string(),
            ));
        }
        if self.stride != 0 && self.size % self.stride as u64 != 0 {
            return Err(ResourceError::InvalidDescription(format!(
                "buffer size {} is not a multiple of stride {}",
                self.size, self.stride
            )));
        }
        if let Some(data) = initial_data {
            if data.len() as u64 > self.size {
                return Err(ResourceError::InvalidDescription(format!(
                    "initial data ({} bytes) larger than buffer ({} bytes)",
                    data.len(),
                    self.size
                )));
            }
        }
        Ok(())
    }
}

/// Read-only properties of a created buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferInfo {
    pub size: u64,
    pub stride: u32,
    pub usage: BufferUsage,
    pub memory: MemoryLocation,
    pub debug_name: Option<String>,
}

impl From<&BufferDesc> for BufferInfo {
    fn from(desc: &BufferDesc) -> Self {
        Self {
            size: desc.size,
            stride: desc.stride,
            usage: desc.usage,
            memory: desc.memory,
            debug_name: desc.debug_name.clone(),
        }
    }
}
