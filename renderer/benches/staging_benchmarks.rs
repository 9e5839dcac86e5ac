use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_renderer::backend::dummy::{DummyDevice, DummyRenderBackend};
use redlilium_renderer::data_store::{RenderDataStore, RenderDataStoreDefaultStaging};
use redlilium_renderer::device::GpuResourceManager;
use redlilium_renderer::types::{BufferCopyRegion, BufferDescriptor, BufferUsage};
use redlilium_renderer::{RenderHandleReference, RenderNodeRegistry, Renderer, RendererConfig};

fn destination(gpu: &dyn GpuResourceManager, size: u64) -> RenderHandleReference {
    gpu.create_buffer(&BufferDescriptor::new(
        size,
        BufferUsage::STORAGE | BufferUsage::TRANSFER_DST,
    ))
    .expect("buffer creation failed")
}

// ---------------------------------------------------------------------------
// Data store
// ---------------------------------------------------------------------------

fn bench_enqueue_uploads(c: &mut Criterion) {
    let device = DummyDevice::new();
    let gpu = Arc::clone(device.gpu());
    let store = RenderDataStoreDefaultStaging::new("bench", gpu.clone());
    let dst = destination(gpu.as_ref(), 4096);
    let data = vec![7u8; 4096];

    c.bench_function("staging_enqueue_64_uploads", |b| {
        b.iter(|| {
            for _ in 0..64 {
                store.copy_data_to_buffer(
                    black_box(&data),
                    &dst,
                    BufferCopyRegion::whole(data.len() as u64),
                );
            }
            store.pre_render();
            black_box(store.consume_staging_data());
            store.post_render();
            gpu.handle_pending_allocations();
            gpu.end_frame();
        });
    });
}

fn bench_batch_swap(c: &mut Criterion) {
    let device = DummyDevice::new();
    let gpu = Arc::clone(device.gpu());
    let store = RenderDataStoreDefaultStaging::new("bench", gpu.clone());
    let dst = destination(gpu.as_ref(), 256);
    let data = vec![1u8; 256];

    c.bench_function("staging_swap_empty_batches", |b| {
        b.iter(|| {
            store.pre_render();
            black_box(store.has_staging_data());
            store.post_render();
        });
    });

    c.bench_function("staging_swap_single_upload", |b| {
        b.iter(|| {
            store.copy_data_to_buffer(&data, &dst, BufferCopyRegion::whole(256));
            store.pre_render();
            black_box(store.consume_staging_data());
            store.post_render();
            gpu.end_frame();
        });
    });
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

fn bench_render_frame(c: &mut Criterion) {
    let device = Arc::new(DummyDevice::new());
    let backend = DummyRenderBackend::new().with_resource_manager(Arc::clone(device.gpu()));
    let renderer = Renderer::new(
        device.clone(),
        Box::new(backend),
        RenderNodeRegistry::new(),
        RendererConfig::default(),
    )
    .expect("renderer creation failed");
    let staging = renderer
        .staging_data_store()
        .expect("default staging store missing");
    let dst = destination(device.gpu().as_ref(), 1024);
    let data = vec![3u8; 1024];

    c.bench_function("render_frame_empty", |b| {
        b.iter(|| black_box(renderer.render_frame(&[])));
    });

    c.bench_function("render_frame_16_uploads", |b| {
        b.iter(|| {
            for _ in 0..16 {
                staging.copy_data_to_buffer(&data, &dst, BufferCopyRegion::whole(1024));
            }
            black_box(renderer.render_frame(&[]))
        });
    });
}

criterion_group!(
    benches,
    bench_enqueue_uploads,
    bench_batch_swap,
    bench_render_frame,
);
criterion_main!(benches);
