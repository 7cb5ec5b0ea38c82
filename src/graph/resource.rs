//! Resource nodes and usage stages for the frame graph.

use std::sync::Arc;

use crate::graph::barrier::{AccessMask, ImageLayout};
use crate::resources::{Buffer, Texture};
use crate::types::{BufferDescriptor, ClearValue, TextureDescriptor};

/// Handle to a resource node in the graph being built.
///
/// Handles carry a generation stamped from the build they belong to; a handle
/// from an earlier build (or another device) fails generation validation on
/// dereference instead of silently aliasing a new resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ResourceHandle {
    /// Index into the registry's node array.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation stamp used for validity checks.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// What kind of resource a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Texture owned by the compiled graph, created and freed within one
    /// execution.
    TransientTexture,
    /// Buffer owned by the compiled graph.
    TransientBuffer,
    /// Caller-owned texture referenced by the graph, never allocated or freed
    /// by it.
    ImportedTexture,
    /// Caller-owned buffer referenced by the graph.
    ImportedBuffer,
    /// The swapchain image for the current frame.
    Swapchain,
}

impl ResourceKind {
    /// Check if the graph owns the resource's storage.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::TransientTexture | Self::TransientBuffer)
    }
}

/// How a pass touches a resource.
///
/// Each stage maps to the image layout and access mask the resource must be
/// in for the touch to be valid; the barrier synthesizer derives transitions
/// from consecutive stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStage {
    /// Written as a color render attachment.
    ColorAttachmentWrite,
    /// Written as a depth/stencil attachment.
    DepthStencilWrite,
    /// Sampled from a vertex shader.
    VertexSampled,
    /// Sampled from a fragment shader.
    FragmentSampled,
    /// Sampled from a compute shader.
    ComputeSampled,
    /// Read as a storage resource from a compute shader.
    ComputeStorageRead,
    /// Written as a storage resource from a compute shader.
    ComputeStorageWrite,
    /// Read and written as a storage resource from a compute shader.
    ComputeStorageReadWrite,
    /// Read as uniform data.
    UniformRead,
    /// Source of a copy operation.
    TransferRead,
    /// Destination of a copy operation.
    TransferWrite,
}

impl ResourceStage {
    /// Check if this stage writes the resource.
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Self::ColorAttachmentWrite
                | Self::DepthStencilWrite
                | Self::ComputeStorageWrite
                | Self::ComputeStorageReadWrite
                | Self::TransferWrite
        )
    }

    /// Check if this stage reads the resource.
    pub fn is_read(self) -> bool {
        matches!(
            self,
            Self::VertexSampled
                | Self::FragmentSampled
                | Self::ComputeSampled
                | Self::ComputeStorageRead
                | Self::ComputeStorageReadWrite
                | Self::UniformRead
                | Self::TransferRead
        )
    }

    /// Image layout required for this stage.
    pub fn image_layout(self) -> ImageLayout {
        match self {
            Self::ColorAttachmentWrite => ImageLayout::ColorAttachmentOptimal,
            Self::DepthStencilWrite => ImageLayout::DepthStencilAttachmentOptimal,
            Self::VertexSampled | Self::FragmentSampled | Self::ComputeSampled => {
                ImageLayout::ShaderReadOnlyOptimal
            }
            Self::ComputeStorageRead
            | Self::ComputeStorageWrite
            | Self::ComputeStorageReadWrite => ImageLayout::General,
            Self::UniformRead => ImageLayout::ShaderReadOnlyOptimal,
            Self::TransferRead => ImageLayout::TransferSrcOptimal,
            Self::TransferWrite => ImageLayout::TransferDstOptimal,
        }
    }

    /// Access mask for this stage.
    pub fn access_mask(self) -> AccessMask {
        match self {
            Self::ColorAttachmentWrite => AccessMask::COLOR_ATTACHMENT_WRITE,
            Self::DepthStencilWrite => AccessMask::DEPTH_STENCIL_WRITE,
            Self::VertexSampled | Self::FragmentSampled | Self::ComputeSampled => {
                AccessMask::SHADER_READ
            }
            Self::ComputeStorageRead => AccessMask::SHADER_READ,
            Self::ComputeStorageWrite => AccessMask::SHADER_WRITE,
            Self::ComputeStorageReadWrite => AccessMask::SHADER_READ | AccessMask::SHADER_WRITE,
            Self::UniformRead => AccessMask::UNIFORM_READ,
            Self::TransferRead => AccessMask::TRANSFER_READ,
            Self::TransferWrite => AccessMask::TRANSFER_WRITE,
        }
    }
}

/// A caller-owned resource referenced by an imported node.
#[derive(Clone)]
pub enum ImportedResource {
    /// An imported texture.
    Texture(Arc<Texture>),
    /// An imported buffer.
    Buffer(Arc<Buffer>),
}

impl std::fmt::Debug for ImportedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Texture(t) => f.debug_tuple("Texture").field(&t.id()).finish(),
            Self::Buffer(b) => f.debug_tuple("Buffer").field(&b.id()).finish(),
        }
    }
}

/// Selects the backing resource for a multi-buffered import by frame index.
pub type FrameProvider = Box<dyn Fn(u64) -> ImportedResource + Send + Sync>;

/// A resource node declared during a graph build.
pub struct ResourceNode {
    pub(crate) name: String,
    pub(crate) kind: ResourceKind,
    /// Survives culling unconditionally.
    pub(crate) essential: bool,
    pub(crate) texture_desc: Option<TextureDescriptor>,
    pub(crate) buffer_desc: Option<BufferDescriptor>,
    /// Backing resource for imported nodes.
    pub(crate) imported: Option<ImportedResource>,
    /// Per-frame backing provider for double/triple-buffered imports.
    pub(crate) provider: Option<FrameProvider>,
    pub(crate) clear: Option<ClearValue>,
}

impl std::fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceNode")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("essential", &self.essential)
            .field("clear", &self.clear)
            .finish_non_exhaustive()
    }
}

impl ResourceNode {
    pub(crate) fn transient_texture(name: String, desc: TextureDescriptor) -> Self {
        Self {
            name,
            kind: ResourceKind::TransientTexture,
            essential: false,
            texture_desc: Some(desc),
            buffer_desc: None,
            imported: None,
            provider: None,
            clear: None,
        }
    }

    pub(crate) fn transient_buffer(name: String, desc: BufferDescriptor) -> Self {
        Self {
            name,
            kind: ResourceKind::TransientBuffer,
            essential: false,
            texture_desc: None,
            buffer_desc: Some(desc),
            imported: None,
            provider: None,
            clear: None,
        }
    }

    pub(crate) fn imported_texture(name: String, texture: Arc<Texture>) -> Self {
        Self {
            name,
            kind: ResourceKind::ImportedTexture,
            essential: false,
            texture_desc: Some(texture.descriptor().clone()),
            buffer_desc: None,
            imported: Some(ImportedResource::Texture(texture)),
            provider: None,
            clear: None,
        }
    }

    pub(crate) fn imported_buffer(name: String, buffer: Arc<Buffer>) -> Self {
        Self {
            name,
            kind: ResourceKind::ImportedBuffer,
            essential: false,
            texture_desc: None,
            buffer_desc: Some(buffer.descriptor().clone()),
            imported: Some(ImportedResource::Buffer(buffer)),
            provider: None,
            clear: None,
        }
    }

    pub(crate) fn swapchain(texture: Arc<Texture>) -> Self {
        Self {
            name: "swapchain".to_string(),
            kind: ResourceKind::Swapchain,
            essential: true,
            texture_desc: Some(texture.descriptor().clone()),
            buffer_desc: None,
            imported: Some(ImportedResource::Texture(texture)),
            provider: None,
            clear: None,
        }
    }

    /// The node's name, used for pass-scoped lookups in task callbacks.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's kind.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Whether this node survives culling unconditionally.
    pub fn is_essential(&self) -> bool {
        self.essential || self.kind == ResourceKind::Swapchain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureFormat, TextureUsage};

    #[test]
    fn test_stage_classification() {
        assert!(ResourceStage::ColorAttachmentWrite.is_write());
        assert!(!ResourceStage::ColorAttachmentWrite.is_read());
        assert!(ResourceStage::FragmentSampled.is_read());
        assert!(!ResourceStage::FragmentSampled.is_write());
        assert!(ResourceStage::ComputeStorageReadWrite.is_write());
        assert!(ResourceStage::ComputeStorageReadWrite.is_read());
    }

    #[test]
    fn test_stage_layouts() {
        assert_eq!(
            ResourceStage::ColorAttachmentWrite.image_layout(),
            ImageLayout::ColorAttachmentOptimal
        );
        assert_eq!(
            ResourceStage::FragmentSampled.image_layout(),
            ImageLayout::ShaderReadOnlyOptimal
        );
        assert_eq!(
            ResourceStage::ComputeStorageWrite.image_layout(),
            ImageLayout::General
        );
        assert_eq!(
            ResourceStage::TransferWrite.image_layout(),
            ImageLayout::TransferDstOptimal
        );
    }

    #[test]
    fn test_transient_node_defaults() {
        let node = ResourceNode::transient_texture(
            "gbuffer".into(),
            TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm, TextureUsage::SAMPLED),
        );
        assert_eq!(node.kind(), ResourceKind::TransientTexture);
        assert!(node.kind().is_transient());
        assert!(!node.is_essential());
        assert_eq!(node.name(), "gbuffer");
    }
}
