//! Backing resources for the virtual device.
//!
//! The scheduling contract of this crate is native-API-agnostic, so textures
//! and buffers are modeled as CPU-backed storage. Task callbacks read and
//! write them through the [`CommandList`](crate::executor::CommandList), which
//! lets the full compile/execute path be exercised end-to-end without GPU
//! hardware. Barriers, layouts and queue transfers are still computed for
//! real; only the storage behind them is virtual.

use std::sync::Arc;

use glam::Vec4;
use parking_lot::RwLock;

use crate::error::GraphError;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// A texture with CPU-backed pixel storage.
///
/// Pixels are stored as RGBA `f32` regardless of format; the format governs
/// attachment compatibility and size accounting, not storage layout.
#[derive(Debug)]
pub struct Texture {
    id: u64,
    descriptor: TextureDescriptor,
    pixels: RwLock<Vec<Vec4>>,
}

impl Texture {
    pub(crate) fn new(id: u64, descriptor: TextureDescriptor) -> Result<Arc<Self>, GraphError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(GraphError::ResourceCreationFailed(format!(
                "texture {:?} has zero extent",
                descriptor.label
            )));
        }
        if descriptor.usage.is_empty() {
            return Err(GraphError::ResourceCreationFailed(format!(
                "texture {:?} has no usage flags",
                descriptor.label
            )));
        }
        let pixels = vec![Vec4::ZERO; descriptor.size.pixel_count()];
        Ok(Arc::new(Self {
            id,
            descriptor,
            pixels: RwLock::new(pixels),
        }))
    }

    /// Unique identifier for bindless tables and debugging.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The descriptor this texture was created from.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Debug label, if any.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Read one pixel. Returns `None` when out of bounds.
    pub fn read_pixel(&self, x: u32, y: u32) -> Option<Vec4> {
        if x >= self.descriptor.size.width || y >= self.descriptor.size.height {
            return None;
        }
        let index = (y * self.descriptor.size.width + x) as usize;
        Some(self.pixels.read()[index])
    }

    /// Write one pixel. Out-of-bounds writes are ignored.
    pub fn write_pixel(&self, x: u32, y: u32, value: Vec4) {
        if x >= self.descriptor.size.width || y >= self.descriptor.size.height {
            return;
        }
        let index = (y * self.descriptor.size.width + x) as usize;
        self.pixels.write()[index] = value;
    }

    /// Fill every pixel with `value`.
    pub fn clear(&self, value: Vec4) {
        self.pixels.write().fill(value);
    }

    /// Snapshot of all pixels in row-major order.
    pub fn pixels(&self) -> Vec<Vec4> {
        self.pixels.read().clone()
    }
}

/// A buffer with CPU-backed byte storage.
#[derive(Debug)]
pub struct Buffer {
    id: u64,
    descriptor: BufferDescriptor,
    data: RwLock<Vec<u8>>,
}

impl Buffer {
    pub(crate) fn new(id: u64, descriptor: BufferDescriptor) -> Result<Arc<Self>, GraphError> {
        if descriptor.size == 0 {
            return Err(GraphError::ResourceCreationFailed(format!(
                "buffer {:?} has zero size",
                descriptor.label
            )));
        }
        let data = vec![0u8; descriptor.size as usize];
        Ok(Arc::new(Self {
            id,
            descriptor,
            data: RwLock::new(data),
        }))
    }

    /// Unique identifier for bindless tables and debugging.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The descriptor this buffer was created from.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Write bytes at `offset`. Writes past the end are clamped.
    pub fn write(&self, offset: u64, bytes: &[u8]) {
        let mut data = self.data.write();
        let start = (offset as usize).min(data.len());
        let end = (start + bytes.len()).min(data.len());
        data[start..end].copy_from_slice(&bytes[..end - start]);
    }

    /// Read `len` bytes starting at `offset`, clamped to the buffer size.
    pub fn read(&self, offset: u64, len: u64) -> Vec<u8> {
        let data = self.data.read();
        let start = (offset as usize).min(data.len());
        let end = (start + len as usize).min(data.len());
        data[start..end].to_vec()
    }
}
