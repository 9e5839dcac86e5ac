//! Render command list.
//!
//! Each render node records into its own [`RenderCommandList`]. The list is
//! backend agnostic: it stores [`RenderCommand`]s that the backend translates
//! at submission time.
//!
//! # Barrier points
//!
//! While automatic barriers are enabled, every work command is preceded by an
//! automatic barrier point; the backend resolves those from tracked resource
//! state. Staging code brackets its copies with
//! [`begin_disable_automatic_barrier_points`](RenderCommandList::begin_disable_automatic_barrier_points)
//! and records explicit transitions instead:
//!
//! ```ignore
//! cmd.begin_disable_automatic_barrier_points();
//! cmd.custom_image_barrier(dst, undefined, transfer_dst, range);
//! cmd.add_custom_barrier_point();
//! cmd.copy_buffer_to_image(staging, dst, region);
//! cmd.custom_image_barrier(dst, transfer_dst, shader_read, range);
//! cmd.add_custom_barrier_point();
//! cmd.end_disable_automatic_barrier_points();
//! ```

use super::barrier_list::{BarrierBatch, BarrierPointKind, RenderBarrierList, ResourceBarrier};
use crate::handle::RenderHandle;
use crate::types::{
    BufferCopyRegion, BufferRange, BufferTextureCopyRegion, ClearColorValue, ImageSubresourceRange,
    ResourceBarrierState, TextureBlitRegion, TextureCopyRegion,
};

/// A recorded command.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Barrier point; contents live in the [`RenderBarrierList`].
    BarrierPoint {
        /// Index into the barrier list.
        barrier_point_index: u32,
        /// Point kind.
        kind: BarrierPointKind,
    },
    /// Start of a region without automatic barrier points.
    BeginDisableAutomaticBarrierPoints,
    /// End of a region without automatic barrier points.
    EndDisableAutomaticBarrierPoints,
    /// Buffer to buffer copy.
    CopyBufferToBuffer {
        /// Source buffer.
        src: RenderHandle,
        /// Destination buffer.
        dst: RenderHandle,
        /// Region.
        region: BufferCopyRegion,
    },
    /// Buffer to image copy.
    CopyBufferToImage {
        /// Source buffer.
        src: RenderHandle,
        /// Destination image.
        dst: RenderHandle,
        /// Region.
        region: BufferTextureCopyRegion,
    },
    /// Image to buffer copy.
    CopyImageToBuffer {
        /// Source image.
        src: RenderHandle,
        /// Destination buffer.
        dst: RenderHandle,
        /// Region.
        region: BufferTextureCopyRegion,
    },
    /// Image to image copy.
    CopyImageToImage {
        /// Source image.
        src: RenderHandle,
        /// Destination image.
        dst: RenderHandle,
        /// Region.
        region: TextureCopyRegion,
    },
    /// Scaled image copy.
    BlitImage {
        /// Source image.
        src: RenderHandle,
        /// Destination image.
        dst: RenderHandle,
        /// Region.
        region: TextureBlitRegion,
    },
    /// Hardware color clear.
    ClearColorImage {
        /// Image to clear.
        dst: RenderHandle,
        /// Clear color.
        color: ClearColorValue,
        /// Cleared subresources.
        range: ImageSubresourceRange,
    },
    /// Non-indexed draw.
    Draw {
        /// Vertex count.
        vertex_count: u32,
        /// Instance count.
        instance_count: u32,
    },
    /// Compute dispatch.
    Dispatch {
        /// Group count X.
        x: u32,
        /// Group count Y.
        y: u32,
        /// Group count Z.
        z: u32,
    },
}

impl RenderCommand {
    /// Whether this command does GPU work (as opposed to markers and barriers).
    pub fn is_work(&self) -> bool {
        !matches!(
            self,
            Self::BarrierPoint { .. }
                | Self::BeginDisableAutomaticBarrierPoints
                | Self::EndDisableAutomaticBarrierPoints
        )
    }
}

/// Command list of one render node.
#[derive(Debug, Default)]
pub struct RenderCommandList {
    commands: Vec<RenderCommand>,
    barrier_list: RenderBarrierList,
    pending_barriers: BarrierBatch,
    barrier_point_count: u32,
    automatic_barriers_disabled: bool,
    work_command_count: usize,
}

impl RenderCommandList {
    /// Create an empty command list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the list and its barrier list for a new frame.
    pub fn begin_frame(&mut self) {
        self.commands.clear();
        self.barrier_list.begin_frame();
        self.pending_barriers.clear();
        self.barrier_point_count = 0;
        self.automatic_barriers_disabled = false;
        self.work_command_count = 0;
    }

    /// Recorded commands.
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Barrier list owned by this command list.
    pub fn barrier_list(&self) -> &RenderBarrierList {
        &self.barrier_list
    }

    /// Whether the list contains any command doing GPU work.
    pub fn has_valid_render_commands(&self) -> bool {
        self.work_command_count > 0
    }

    /// Number of work commands.
    pub fn work_command_count(&self) -> usize {
        self.work_command_count
    }

    /// Stop inserting automatic barrier points before work commands.
    pub fn begin_disable_automatic_barrier_points(&mut self) {
        if self.automatic_barriers_disabled {
            log::warn!("automatic barrier points already disabled");
            return;
        }
        self.automatic_barriers_disabled = true;
        self.commands
            .push(RenderCommand::BeginDisableAutomaticBarrierPoints);
    }

    /// Resume inserting automatic barrier points.
    pub fn end_disable_automatic_barrier_points(&mut self) {
        if !self.automatic_barriers_disabled {
            log::warn!("automatic barrier points were not disabled");
            return;
        }
        if !self.pending_barriers.is_empty() {
            log::warn!("custom barriers left unflushed when re-enabling automatic barriers");
            self.add_custom_barrier_point();
        }
        self.automatic_barriers_disabled = false;
        self.commands.push(RenderCommand::EndDisableAutomaticBarrierPoints);
    }

    /// Queue a custom image transition for the next custom barrier point.
    pub fn custom_image_barrier(
        &mut self,
        handle: RenderHandle,
        src: ResourceBarrierState,
        dst: ResourceBarrierState,
        range: ImageSubresourceRange,
    ) {
        self.pending_barriers.add(ResourceBarrier::Image {
            handle,
            src,
            dst,
            range,
        });
    }

    /// Queue a custom buffer barrier for the next custom barrier point.
    pub fn custom_buffer_barrier(
        &mut self,
        handle: RenderHandle,
        src: ResourceBarrierState,
        dst: ResourceBarrierState,
        range: BufferRange,
    ) {
        self.pending_barriers.add(ResourceBarrier::Buffer {
            handle,
            src,
            dst,
            range,
        });
    }

    /// Flush queued custom barriers into a new barrier point.
    ///
    /// Does nothing when no custom barrier is queued.
    pub fn add_custom_barrier_point(&mut self) {
        if self.pending_barriers.is_empty() {
            return;
        }
        let barriers = self.pending_barriers.take();
        self.push_barrier_point(BarrierPointKind::Custom, barriers);
    }

    fn push_barrier_point(&mut self, kind: BarrierPointKind, barriers: Vec<ResourceBarrier>) {
        let barrier_point_index = self.barrier_point_count;
        self.barrier_point_count += 1;
        self.barrier_list
            .add_barrier_point(barrier_point_index, kind, barriers);
        self.commands.push(RenderCommand::BarrierPoint {
            barrier_point_index,
            kind,
        });
    }

    fn push_work(&mut self, command: RenderCommand) {
        if !self.automatic_barriers_disabled {
            self.push_barrier_point(BarrierPointKind::Automatic, Vec::new());
        }
        log::trace!("RenderCommandList: {:?}", command);
        self.work_command_count += 1;
        self.commands.push(command);
    }

    /// Record a buffer to buffer copy.
    pub fn copy_buffer_to_buffer(
        &mut self,
        src: RenderHandle,
        dst: RenderHandle,
        region: BufferCopyRegion,
    ) {
        self.push_work(RenderCommand::CopyBufferToBuffer { src, dst, region });
    }

    /// Record a buffer to image copy.
    pub fn copy_buffer_to_image(
        &mut self,
        src: RenderHandle,
        dst: RenderHandle,
        region: BufferTextureCopyRegion,
    ) {
        self.push_work(RenderCommand::CopyBufferToImage { src, dst, region });
    }

    /// Record an image to buffer copy.
    pub fn copy_image_to_buffer(
        &mut self,
        src: RenderHandle,
        dst: RenderHandle,
        region: BufferTextureCopyRegion,
    ) {
        self.push_work(RenderCommand::CopyImageToBuffer { src, dst, region });
    }

    /// Record an image to image copy.
    pub fn copy_image_to_image(
        &mut self,
        src: RenderHandle,
        dst: RenderHandle,
        region: TextureCopyRegion,
    ) {
        self.push_work(RenderCommand::CopyImageToImage { src, dst, region });
    }

    /// Record a scaled image copy.
    pub fn blit_image(&mut self, src: RenderHandle, dst: RenderHandle, region: TextureBlitRegion) {
        self.push_work(RenderCommand::BlitImage { src, dst, region });
    }

    /// Record a hardware color clear.
    pub fn clear_color_image(
        &mut self,
        dst: RenderHandle,
        color: ClearColorValue,
        range: ImageSubresourceRange,
    ) {
        self.push_work(RenderCommand::ClearColorImage { dst, color, range });
    }

    /// Record a draw.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.push_work(RenderCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    /// Record a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push_work(RenderCommand::Dispatch { x, y, z });
    }
}
