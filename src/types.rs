//! Common value types shared across the frame graph system.

use glam::Vec4;

/// 2D extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent2d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Texture pixel format.
///
/// The set here is intentionally small: the scheduler only needs formats to
/// distinguish attachment compatibility and compute storage sizes, not to
/// enumerate every native format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit per channel RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit per channel BGRA, normalized (common swapchain format).
    Bgra8Unorm,
    /// 16-bit float per channel RGBA.
    Rgba16Float,
    /// 32-bit float per channel RGBA.
    Rgba32Float,
    /// Single channel 8-bit, normalized.
    R8Unorm,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8Unorm | Self::Bgra8Unorm => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
            Self::R8Unorm => 1,
            Self::Depth32Float => 4,
        }
    }

    /// Check if this is a depth format.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float)
    }
}

bitflags::bitflags! {
    /// How a texture may be used over its lifetime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Usable as a color or depth render attachment.
        const RENDER_ATTACHMENT = 1 << 0;
        /// Sampled from shaders.
        const SAMPLED = 1 << 1;
        /// Read/written as a storage image.
        const STORAGE = 1 << 2;
        /// Source of copy operations.
        const TRANSFER_SRC = 1 << 3;
        /// Destination of copy operations.
        const TRANSFER_DST = 1 << 4;
    }
}

bitflags::bitflags! {
    /// How a buffer may be used over its lifetime.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex buffer data.
        const VERTEX = 1 << 0;
        /// Index buffer data.
        const INDEX = 1 << 1;
        /// Uniform (constant) data.
        const UNIFORM = 1 << 2;
        /// Storage buffer, shader read/write.
        const STORAGE = 1 << 3;
        /// Indirect draw/dispatch arguments.
        const INDIRECT = 1 << 4;
        /// Source of copy operations.
        const TRANSFER_SRC = 1 << 5;
        /// Destination of copy operations.
        const TRANSFER_DST = 1 << 6;
    }
}

/// Description of a texture to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Optional debug label.
    pub label: Option<String>,
    /// Texture dimensions.
    pub size: Extent2d,
    /// Pixel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent2d::new(width, height),
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Description of a buffer to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Optional debug label.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Clear value applied when a pass first writes an attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color for a color attachment.
    Color(Vec4),
    /// Clear values for a depth/stencil attachment.
    DepthStencil {
        /// Depth clear value.
        depth: f32,
        /// Stencil clear value.
        stencil: u32,
    },
}

impl ClearValue {
    /// Create a color clear value from RGBA components.
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color(Vec4::new(r, g, b, a))
    }

    /// Standard depth clear (depth 1.0, stencil 0).
    pub fn depth() -> Self {
        Self::DepthStencil {
            depth: 1.0,
            stencil: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_pixel_count() {
        let extent = Extent2d::new(64, 32);
        assert_eq!(extent.pixel_count(), 2048);
    }

    #[test]
    fn test_format_sizes() {
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_pixel(), 4);
        assert_eq!(TextureFormat::Rgba32Float.bytes_per_pixel(), 16);
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Rgba8Unorm.is_depth());
    }

    #[test]
    fn test_descriptor_builders() {
        let desc = TextureDescriptor::new_2d(
            128,
            128,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED,
        )
        .with_label("gbuffer");
        assert_eq!(desc.label.as_deref(), Some("gbuffer"));
        assert!(desc.usage.contains(TextureUsage::SAMPLED));

        let desc = BufferDescriptor::new(1024, BufferUsage::STORAGE).with_label("particles");
        assert_eq!(desc.size, 1024);
        assert_eq!(desc.label.as_deref(), Some("particles"));
    }

    #[test]
    fn test_clear_value() {
        let clear = ClearValue::rgba(0.0, 1.0, 1.0, 1.0);
        assert_eq!(clear, ClearValue::Color(Vec4::new(0.0, 1.0, 1.0, 1.0)));
    }
}
