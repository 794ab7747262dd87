//! # Ember Demos
//!
//! Demo frames showcasing the Ember render graph.
//!
//! ## Available Demos
//!
//! - `frame_graph_demo` - Deferred shading frame with temporal AA, run on the
//!   dummy backend for a fixed number of frames

use ember_graphics::{
    BufferDescriptor, BufferUsage, ClearValue, DepthStencilTarget, GpuBuffer, GpuTexture,
    GraphError, LoadAction, PassHandle, RenderGraph, ResourceState, StoreAction,
    TextureDescriptor, TextureFormat, TextureUsage,
};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Counters updated by pass callbacks through the executor's user context.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SceneStats {
    pub draws: u32,
    pub dispatches: u32,
}

/// Natives owned by the application and imported every frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameImports {
    pub swapchain: GpuTexture,
    pub camera: GpuBuffer,
}

/// Handles of the passes declared by [`declare_deferred_frame`].
#[derive(Debug, Clone, Copy)]
pub struct DeferredPasses {
    pub geometry: PassHandle,
    pub light_cull: PassHandle,
    pub lighting: PassHandle,
    pub taa: PassHandle,
    pub debug_overlay: PassHandle,
    pub tonemap: PassHandle,
}

fn count_draw(ctx: &mut ember_graphics::RenderPassContext<'_>, vertices: u32) {
    ctx.draw(vertices, 1);
    if let Some(stats) = ctx.user_context::<SceneStats>() {
        stats.draws += 1;
    }
}

fn count_dispatch(ctx: &mut ember_graphics::RenderPassContext<'_>, x: u32, y: u32) {
    ctx.dispatch(x, y, 1);
    if let Some(stats) = ctx.user_context::<SceneStats>() {
        stats.dispatches += 1;
    }
}

fn target_desc(width: u32, height: u32, format: TextureFormat) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        format,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

/// Swapchain-compatible descriptor for the given surface size.
pub fn swapchain_desc(width: u32, height: u32) -> TextureDescriptor {
    target_desc(width, height, TextureFormat::Bgra8UnormSrgb)
}

/// Uniform buffer holding the camera matrices.
pub fn camera_desc() -> BufferDescriptor {
    BufferDescriptor::uniform(256)
}

/// Declare one deferred shading frame.
///
/// ```text
/// Geometry ──► LightCull ──► Lighting ──► Taa ──► Tonemap ──► Swapchain
///     │                         ▲          ▲
///     └─────── GBuffer ─────────┘       History (persistent)
/// ```
///
/// `DebugOverlay` writes statistics nothing reads, so it is culled unless
/// dead code elimination is disabled.
pub fn declare_deferred_frame(
    graph: &mut RenderGraph,
    width: u32,
    height: u32,
    imports: FrameImports,
) -> Result<DeferredPasses, GraphError> {
    let tile_x = width.div_ceil(16);
    let tile_y = height.div_ceil(16);

    graph.import_texture(
        "Swapchain",
        imports.swapchain,
        swapchain_desc(width, height),
        ResourceState::UNDEFINED,
    )?;
    graph.import_buffer(
        "Camera",
        imports.camera,
        camera_desc(),
        ResourceState::VERTEX_AND_CONSTANT_BUFFER,
    )?;

    graph.create_texture(target_desc(width, height, TextureFormat::Rgba8Unorm), "GBuffer.Albedo")?;
    graph.create_texture(target_desc(width, height, TextureFormat::Rgba16Float), "GBuffer.Normal")?;
    graph.create_texture(target_desc(width, height, TextureFormat::Depth32Float), "Depth")?;
    graph.create_texture(target_desc(width, height, TextureFormat::Rgba16Float), "HDR")?;
    graph.create_texture(
        TextureDescriptor::new_2d(
            width,
            height,
            TextureFormat::Rgba16Float,
            TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        ),
        "Resolved",
    )?;
    graph.create_buffer(
        BufferDescriptor::new(u64::from(tile_x * tile_y) * 64, BufferUsage::STORAGE),
        "LightList",
    )?;
    graph.create_buffer(BufferDescriptor::new(1024, BufferUsage::STORAGE), "DebugStats")?;

    // Accumulated across frames; dropped by the graph when the surface resizes.
    if graph.get_texture("History").is_err() {
        let history = graph.create_texture(
            TextureDescriptor::new_2d(
                width,
                height,
                TextureFormat::Rgba16Float,
                TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
            ),
            "History",
        )?;
        graph.mark_persistent(history)?;
    }

    let geometry = graph.add_render_pass(
        "Geometry",
        |pass| {
            pass.add_render_target(
                0,
                "GBuffer.Albedo",
                LoadAction::Clear,
                ClearValue::BLACK,
                StoreAction::Store,
            )?
            .add_render_target(
                1,
                "GBuffer.Normal",
                LoadAction::Clear,
                ClearValue::TRANSPARENT,
                StoreAction::Store,
            )?
            .set_depthstencil(DepthStencilTarget::new("Depth"))?
            .add_input("camera", "Camera")?;
            Ok(())
        },
        |_, ctx| {
            for _ in 0..4 {
                count_draw(ctx, 36);
            }
            Ok(())
        },
    )?;

    let light_cull = graph.add_compute_pass(
        "LightCull",
        |pass| {
            pass.add_input("depth", "Depth")?
                .add_input("camera", "Camera")?
                .add_output("lights", "LightList")?;
            Ok(())
        },
        move |_, ctx| {
            count_dispatch(ctx, tile_x, tile_y);
            Ok(())
        },
    )?;

    let lighting = graph.add_render_pass(
        "Lighting",
        |pass| {
            pass.add_render_target(
                0,
                "HDR",
                LoadAction::DontCare,
                ClearValue::BLACK,
                StoreAction::Store,
            )?
            .add_input("albedo", "GBuffer.Albedo")?
            .add_input("normal", "GBuffer.Normal")?
            .add_input("lights", "LightList")?;
            Ok(())
        },
        |_, ctx| {
            count_draw(ctx, 3);
            Ok(())
        },
    )?;

    let taa = graph.add_compute_pass(
        "Taa",
        |pass| {
            pass.add_input("current", "HDR")?
                .add_storage("history", "History")?
                .add_output("resolved", "Resolved")?;
            Ok(())
        },
        move |_, ctx| {
            count_dispatch(ctx, tile_x * 2, tile_y * 2);
            Ok(())
        },
    )?;

    let debug_overlay = graph.add_compute_pass(
        "DebugOverlay",
        |pass| {
            pass.add_input("hdr", "HDR")?.add_output("stats", "DebugStats")?;
            Ok(())
        },
        |_, ctx| {
            count_dispatch(ctx, 1, 1);
            Ok(())
        },
    )?;

    let tonemap = graph.add_present_pass(
        "Tonemap",
        |pass| {
            pass.add_input("scene", "Resolved")?
                .set_present_target("Swapchain")?;
            Ok(())
        },
        |_, ctx| {
            count_draw(ctx, 3);
            Ok(())
        },
    )?;

    Ok(DeferredPasses {
        geometry,
        light_cull,
        lighting,
        taa,
        debug_overlay,
        tonemap,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use ember_graphics::{
        DummyDevice, FrameExecutor, GpuDevice, QueueType, RenderGraphCreateInfo, ScheduleFlags,
    };

    fn imports() -> FrameImports {
        FrameImports {
            swapchain: GpuTexture::from_raw(1),
            camera: GpuBuffer::from_raw(2),
        }
    }

    fn graph(flags: ScheduleFlags) -> RenderGraph {
        RenderGraph::new(
            Arc::new(DummyDevice::new()),
            RenderGraphCreateInfo::default().with_schedule_flags(flags),
        )
        .unwrap()
    }

    #[test]
    fn test_deferred_frame_order() {
        let mut graph = graph(ScheduleFlags::empty());
        let passes = declare_deferred_frame(&mut graph, 1280, 720, imports()).unwrap();
        graph.compile().unwrap();

        let compiled = graph.compiled().unwrap();
        assert_eq!(
            compiled.pass_order(),
            [
                passes.geometry,
                passes.light_cull,
                passes.lighting,
                passes.taa,
                passes.tonemap
            ]
        );
        assert_eq!(compiled.culled_passes(), ["DebugOverlay".to_string()]);
        assert_eq!(compiled.culled_resources(), ["DebugStats".to_string()]);
    }

    #[test]
    fn test_debug_overlay_kept_without_dce() {
        let mut graph = graph(ScheduleFlags::DISABLE_DEAD_CODE_ELIMINATION);
        let passes = declare_deferred_frame(&mut graph, 1280, 720, imports()).unwrap();
        graph.compile().unwrap();
        assert!(graph.order_of(passes.debug_overlay).is_some());
    }

    #[test]
    fn test_history_declared_once() {
        let dummy = DummyDevice::new();
        let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
        let mut executor = FrameExecutor::new(0);
        executor
            .initialize(Arc::new(dummy.create_queue(QueueType::Graphics)), &device)
            .unwrap();
        executor.set_user_context(SceneStats::default());

        let mut graph = RenderGraph::new(device, RenderGraphCreateInfo::default()).unwrap();
        for _ in 0..2 {
            declare_deferred_frame(&mut graph, 640, 360, imports()).unwrap();
            graph.execute(&mut executor).unwrap();
            graph.reset().unwrap();
        }
        assert_eq!(dummy.allocation_count("History"), 1);
        assert_eq!(dummy.present_count(), 2);
    }
}
