//! Frame scheduler integration tests.
//!
//! ```bash
//! cargo test -p redlilium-renderer --test renderer_tests
//! ```

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{TestContext, DRAW_NODE, EMPTY_NODE};
use redlilium_renderer::backend::dummy::{DummyDevice, DummyRenderBackend};
use redlilium_renderer::device::{
    BackBufferConfiguration, BackBufferType, DeviceCapabilities, GpuQueue, GpuQueueType,
};
use redlilium_renderer::{
    FrameAbortReason, RenderFrameStatus, RenderNodeDesc, RenderNodeGraphDesc, RenderNodeRegistry,
    Renderer, RendererConfig, RendererError,
};

fn multi_queue_context(enabled: bool) -> TestContext {
    TestContext::with_config(
        DummyDevice::new().with_capabilities(DeviceCapabilities {
            allow_thread_command_list_recording: true,
            multi_queue: true,
        }),
        RendererConfig::default().with_multi_queue(enabled),
    )
}

// ============================================================================
// Graph Gathering
// ============================================================================

#[test]
fn test_graph_order_and_duplicates() {
    let ctx = TestContext::new();
    let first = ctx.create_graph("first", &[(DRAW_NODE, "a")]);
    let second = ctx.create_graph("second", &[(DRAW_NODE, "b")]);

    let status = ctx
        .renderer
        .render_frame(&[first.clone(), second.clone(), first.clone()]);
    assert_eq!(status, RenderFrameStatus::Presented { frame_index: 0 });
    assert_eq!(
        ctx.last_frame().node_names(),
        vec!["first::a".to_string(), "second::b".to_string()]
    );
    assert_eq!(ctx.counters.executes(), 2);
}

#[test]
fn test_destroyed_graph_aborts_frame() {
    let ctx = TestContext::new();
    let graph = ctx.create_graph("main", &[(DRAW_NODE, "a")]);
    ctx.renderer.graph_manager().destroy(graph.handle());

    assert_eq!(
        ctx.renderer.render_frame(&[graph.clone()]),
        RenderFrameStatus::Aborted(FrameAbortReason::InvalidGraph(graph.handle()))
    );
    assert_eq!(ctx.recorder.frame_count(), 0);
    assert_eq!(ctx.counters.executes(), 0);
}

#[test]
fn test_unreferenced_graph_collected() {
    let ctx = TestContext::new();
    let graph = ctx.create_graph("main", &[(DRAW_NODE, "a")]);
    ctx.renderer.render_frame(&[graph.clone()]);
    assert_eq!(ctx.renderer.graph_manager().graph_count(), 3);

    drop(graph);
    ctx.renderer.render_frame(&[]);
    // only the two staging graphs remain
    assert_eq!(ctx.renderer.graph_manager().graph_count(), 2);
}

#[test]
fn test_dev_overlay_rendered_before_end_frame_staging() {
    let config = RendererConfig::default().with_dev_overlay(true);
    let ctx = TestContext::with_config(DummyDevice::new(), config);
    let main = ctx.create_graph("main", &[(DRAW_NODE, "scene")]);
    let overlay = ctx.create_graph("overlay", &[(DRAW_NODE, "stats")]);
    ctx.renderer.set_dev_overlay_graph(Some(overlay));

    ctx.renderer.render_frame(&[main]);
    assert_eq!(
        ctx.last_frame().node_names(),
        vec!["main::scene".to_string(), "overlay::stats".to_string()]
    );
}

#[test]
fn test_dev_overlay_ignored_when_disabled() {
    let ctx = TestContext::new();
    let overlay = ctx.create_graph("overlay", &[(DRAW_NODE, "stats")]);
    ctx.renderer.set_dev_overlay_graph(Some(overlay));

    ctx.renderer.render_frame(&[]);
    assert!(ctx.last_frame().contexts.is_empty());
}

// ============================================================================
// Node Lifecycle
// ============================================================================

#[rstest]
#[case::threaded(true)]
#[case::sequential(false)]
fn test_nodes_initialized_once(#[case] threaded: bool) {
    let ctx = TestContext::with_config(
        DummyDevice::new(),
        RendererConfig::default().with_threaded_recording(threaded),
    );
    let graph = ctx.create_graph("main", &[(DRAW_NODE, "a"), (DRAW_NODE, "b")]);

    for _ in 0..3 {
        assert!(ctx.renderer.render_frame(&[graph.clone()]).is_presented());
    }
    assert_eq!(ctx.counters.inits(), 2);
    assert_eq!(ctx.counters.pre_executes(), 6);
    assert_eq!(ctx.counters.executes(), 6);
    assert_eq!(ctx.recorder.frame_count(), 3);
}

#[test]
fn test_reinitialize_and_shader_reload() {
    let ctx = TestContext::new();
    let graph = ctx.create_graph("main", &[(DRAW_NODE, "a")]);
    ctx.renderer.render_frame(&[graph.clone()]);
    assert_eq!(ctx.counters.inits(), 1);

    ctx.renderer.reinitialize_render_nodes();
    ctx.renderer.render_frame(&[graph.clone()]);
    assert_eq!(ctx.counters.inits(), 2);

    ctx.device.reload_shaders();
    ctx.renderer.render_frame(&[graph.clone()]);
    assert_eq!(ctx.counters.inits(), 3);

    ctx.renderer.render_frame(&[graph]);
    assert_eq!(ctx.counters.inits(), 3);
}

#[test]
fn test_threading_disabled_by_device() {
    let ctx = TestContext::with_config(
        DummyDevice::new().with_capabilities(DeviceCapabilities {
            allow_thread_command_list_recording: false,
            multi_queue: false,
        }),
        RendererConfig::default(),
    );
    let graph = ctx.create_graph("main", &[(DRAW_NODE, "a"), (DRAW_NODE, "b"), (DRAW_NODE, "c")]);

    ctx.renderer.render_frame(&[graph]);
    assert_eq!(
        ctx.last_frame().node_names(),
        vec!["main::a".to_string(), "main::b".to_string(), "main::c".to_string()]
    );
}

#[test]
fn test_empty_nodes_not_submitted() {
    let ctx = TestContext::new();
    let graph = ctx.create_graph("main", &[(EMPTY_NODE, "idle"), (DRAW_NODE, "draw")]);

    ctx.renderer.render_frame(&[graph]);
    assert_eq!(ctx.counters.executes(), 2);
    assert_eq!(ctx.last_frame().node_names(), vec!["main::draw".to_string()]);
}

// ============================================================================
// Submission Dependencies
// ============================================================================

fn dependency_graph() -> RenderNodeGraphDesc {
    RenderNodeGraphDesc::new("main")
        .with_node(RenderNodeDesc::new(DRAW_NODE, "a"))
        .with_node(RenderNodeDesc::new(EMPTY_NODE, "b").with_wait_for("a"))
        .with_node(RenderNodeDesc::new(DRAW_NODE, "c").with_wait_for("b"))
        .with_node(
            RenderNodeDesc::new(DRAW_NODE, "d")
                .with_queue(GpuQueue::new(GpuQueueType::Compute, 0))
                .with_wait_for("a")
                .with_wait_for("c"),
        )
}

#[test]
fn test_waits_rewritten_to_flattened_positions() {
    let ctx = multi_queue_context(true);
    let graph = ctx.renderer.create_render_node_graph(dependency_graph()).unwrap();

    ctx.renderer.render_frame(&[graph]);

    let frame = ctx.last_frame();
    assert_eq!(
        frame.node_names(),
        vec!["main::a".to_string(), "main::c".to_string(), "main::d".to_string()]
    );
    let a = &frame.contexts[0].submit_dependencies;
    let c = &frame.contexts[1].submit_dependencies;
    let d = &frame.contexts[2].submit_dependencies;

    // c waited on the skipped b, which waited on a
    assert_eq!(c.wait_for_context_indices, vec![0]);
    assert_eq!(d.wait_for_context_indices, vec![0, 1]);
    assert!(a.signal_semaphore);
    assert!(c.signal_semaphore);
    assert!(!d.signal_semaphore);
    assert_eq!(d.queue.queue_type, GpuQueueType::Compute);

    for (position, context) in frame.contexts.iter().enumerate() {
        assert!(context
            .submit_dependencies
            .wait_for_context_indices
            .iter()
            .all(|&wait| wait < position));
    }
}

#[test]
fn test_single_queue_drops_waits() {
    let ctx = multi_queue_context(false);
    let graph = ctx.renderer.create_render_node_graph(dependency_graph()).unwrap();

    ctx.renderer.render_frame(&[graph]);

    for context in ctx.last_frame().contexts {
        assert!(context.submit_dependencies.wait_for_context_indices.is_empty());
        assert!(!context.submit_dependencies.signal_semaphore);
        assert_eq!(context.submit_dependencies.queue, GpuQueue::default());
    }
}

// ============================================================================
// Frame Lifecycle
// ============================================================================

#[test]
fn test_device_lost_aborts_frame() {
    let ctx = TestContext::new();
    let graph = ctx.create_graph("main", &[(DRAW_NODE, "a")]);
    ctx.device.set_device_lost(true);

    assert_eq!(
        ctx.renderer.render_frame(&[graph.clone()]),
        RenderFrameStatus::Aborted(FrameAbortReason::DeviceLost)
    );
    assert_eq!(ctx.counters.executes(), 0);
    assert_eq!(ctx.recorder.present_count(), 0);
    assert_eq!(ctx.device.stats().frames_ended, 0);

    ctx.device.set_device_lost(false);
    assert_eq!(
        ctx.renderer.render_frame(&[graph]),
        RenderFrameStatus::Presented { frame_index: 1 }
    );
}

#[test]
fn test_device_hooks_per_frame() {
    let ctx = TestContext::new();
    for _ in 0..4 {
        ctx.renderer.render_frame(&[]);
    }
    let stats = ctx.device.stats();
    assert_eq!(stats.frames_started, 4);
    assert_eq!(stats.frames_ended, 4);
    assert_eq!(stats.fence_waits, 4);
    assert_eq!(stats.activations, 4);
    assert!(!ctx.device.is_active());
    assert_eq!(ctx.recorder.present_count(), 4);
}

#[test]
fn test_timings_and_back_buffer() {
    let ctx = TestContext::new();
    ctx.renderer
        .set_back_buffer_configuration(BackBufferConfiguration::headless());
    ctx.renderer.render_frame(&[]);
    ctx.renderer.render_frame(&[]);

    let timings = ctx.renderer.last_timings();
    assert_eq!(timings.frame_index, 1);
    assert!(timings.delta_seconds <= 1.0 / 15.0);
    assert_eq!(ctx.renderer.frame_count(), 2);
    assert_eq!(
        ctx.last_frame().back_buffer.back_buffer_type,
        BackBufferType::Headless
    );
}

#[test]
fn test_deferred_frames() {
    let ctx = TestContext::new();
    let first = ctx.create_graph("first", &[(DRAW_NODE, "a")]);
    let second = ctx.create_graph("second", &[(DRAW_NODE, "b")]);

    ctx.renderer.render_deferred(&[first]);
    ctx.renderer.render_deferred(&[second]);
    assert!(ctx.renderer.render_deferred_frame().is_presented());
    assert_eq!(
        ctx.last_frame().node_names(),
        vec!["first::a".to_string(), "second::b".to_string()]
    );

    ctx.renderer.render_deferred_frame();
    assert!(ctx.last_frame().contexts.is_empty());
}

#[test]
fn test_renderer_requires_staging_node_types() {
    let device = Arc::new(DummyDevice::new());
    let result = Renderer::new(
        device,
        Box::new(DummyRenderBackend::new()),
        RenderNodeRegistry::empty(),
        RendererConfig::default(),
    );
    assert!(matches!(result, Err(RendererError::UnknownRenderNodeType(_))));
}

#[test]
fn test_renderer_rejects_zero_frame_rate() {
    let result = Renderer::new(
        Arc::new(DummyDevice::new()),
        Box::new(DummyRenderBackend::new()),
        RenderNodeRegistry::new(),
        RendererConfig::default().with_min_frame_rate(0.0),
    );
    assert!(matches!(result, Err(RendererError::InvalidParameter(_))));
}
