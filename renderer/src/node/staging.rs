//! Built-in staging render nodes.
//!
//! [`RenderNodeStaging`] runs first in every frame and replays the
//! begin-frame staging batches; [`RenderNodeEndFrameStaging`] runs last and
//! replays copies queued with [`CopyTiming::EndFrame`](crate::staging::CopyTiming::EndFrame).

use std::sync::Arc;

use super::{RenderNode, RenderNodeContextManager};
use crate::command::RenderCommandList;
use crate::data_store::RenderDataStoreDefaultStaging;
use crate::staging::{RenderStaging, StagingConsumeStruct};

fn find_staging_store(
    context: &RenderNodeContextManager,
) -> Option<Arc<RenderDataStoreDefaultStaging>> {
    let name = &context.config().staging_data_store_name;
    let store = context
        .data_store_manager()
        .get::<RenderDataStoreDefaultStaging>(name);
    if store.is_none() {
        log::error!(
            "{}: staging data store '{}' not found",
            context.node_name(),
            name
        );
    }
    store
}

/// Replays implicit and explicit begin-frame staging work.
///
/// Recording order inside the node:
///
/// 1. direct CPU copies into host-coherent buffers
/// 2. host payloads into staging buffers
/// 3. image clears
/// 4. buffer to buffer copies
/// 5. buffer to image copies (with mip generation)
/// 6. image to buffer copies
/// 7. image to image copies
///
/// Implicit uploads of the resource manager are recorded before the
/// explicit store batch of the same direction.
#[derive(Debug, Default)]
pub struct RenderNodeStaging {
    data_store: Option<Arc<RenderDataStoreDefaultStaging>>,
    staging: RenderStaging,
}

impl RenderNodeStaging {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "RenderNodeStaging";

    /// Create an uninitialized node.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderNode for RenderNodeStaging {
    fn init_node(&mut self, context: &mut RenderNodeContextManager) {
        self.data_store = find_staging_store(context);
        self.staging = RenderStaging::new(context.config().staging_clear_budget);
    }

    fn pre_execute_frame(&mut self, context: &mut RenderNodeContextManager) {
        let clear_byte_size = self
            .data_store
            .as_ref()
            .map_or(0, |store| store.staging_clear_byte_size());
        self.staging.pre_execute_frame(
            context.gpu_resource_manager(),
            context.backend_type(),
            clear_byte_size,
        );
    }

    fn execute_frame(
        &mut self,
        context: &mut RenderNodeContextManager,
        cmd: &mut RenderCommandList,
    ) {
        crate::profile_scope!("RenderNodeStaging::execute_frame");

        let gpu = context.gpu_resource_manager();
        let implicit = gpu.consume_frame_staging_data();
        let (explicit, direct, clears) = match &self.data_store {
            Some(store) => (
                store.consume_staging_data(),
                store.consume_staging_direct_data_copy(),
                store.consume_staging_clear_data(),
            ),
            None => Default::default(),
        };
        log::trace!(
            "RenderNodeStaging: {} implicit, {} explicit, {} direct, {} clears",
            implicit.operation_count(),
            explicit.operation_count(),
            direct.data_copies.len(),
            clears.clears.len()
        );

        self.staging.copy_direct_data(gpu, &direct);
        self.staging.copy_host_to_staging(gpu, &implicit);
        self.staging.copy_host_to_staging(gpu, &explicit);

        self.staging
            .clear_images(cmd, gpu, context.backend_type(), &clears);

        let batches: [&StagingConsumeStruct; 2] = [&implicit, &explicit];
        self.staging.copy_buffers_to_buffers(cmd, gpu, &batches);
        self.staging.copy_staging_to_images(cmd, gpu, &batches);
        self.staging.copy_images_to_buffers(cmd, gpu, &batches);
        self.staging.copy_images_to_images(cmd, gpu, &batches);
    }
}

/// Replays end-frame GPU to GPU copies after every user node.
#[derive(Debug, Default)]
pub struct RenderNodeEndFrameStaging {
    data_store: Option<Arc<RenderDataStoreDefaultStaging>>,
    staging: RenderStaging,
}

impl RenderNodeEndFrameStaging {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "RenderNodeEndFrameStaging";

    /// Create an uninitialized node.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderNode for RenderNodeEndFrameStaging {
    fn init_node(&mut self, context: &mut RenderNodeContextManager) {
        self.data_store = find_staging_store(context);
    }

    fn execute_frame(
        &mut self,
        context: &mut RenderNodeContextManager,
        cmd: &mut RenderCommandList,
    ) {
        crate::profile_scope!("RenderNodeEndFrameStaging::execute_frame");

        let Some(store) = &self.data_store else {
            return;
        };
        if !store.has_end_staging_data() {
            return;
        }
        let gpu = context.gpu_resource_manager();
        let batch = store.consume_end_staging_data();
        let batches = [&batch];
        self.staging.copy_buffers_to_buffers(cmd, gpu, &batches);
        self.staging.copy_staging_to_images(cmd, gpu, &batches);
        self.staging.copy_images_to_buffers(cmd, gpu, &batches);
        self.staging.copy_images_to_images(cmd, gpu, &batches);
    }
}
