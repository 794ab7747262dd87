//! Common utilities for render graph integration tests.
//!
//! Every test runs against the dummy backend, which records calls instead of
//! talking to a GPU. The helpers here build the device, queue and executor and
//! declare the small graphs several tests share.

#![allow(dead_code)]

use std::sync::Arc;

use ember_graphics::{
    BufferDescriptor, BufferUsage, ClearValue, DummyDevice, DummyQueue, FrameExecutor, GpuBuffer,
    GpuDevice, GpuTexture, GraphError, LoadAction, PassHandle, QueueType, RenderGraph,
    RenderGraphCreateInfo, ResourceState, ScheduleFlags, StoreAction, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Initialize logging once per test binary. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Dummy device, queue and one initialized executor.
pub struct TestContext {
    pub dummy: DummyDevice,
    pub queue: DummyQueue,
    pub device: Arc<dyn GpuDevice>,
    pub executor: FrameExecutor,
}

impl TestContext {
    pub fn new() -> Self {
        init_logging();
        let dummy = DummyDevice::new();
        let queue = dummy.create_queue(QueueType::Graphics);
        let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
        let mut executor = FrameExecutor::new(0);
        executor
            .initialize(Arc::new(queue.clone()), &device)
            .expect("dummy executor initializes");
        Self {
            dummy,
            queue,
            device,
            executor,
        }
    }

    pub fn graph(&self) -> RenderGraph {
        self.graph_with(ScheduleFlags::empty())
    }

    pub fn graph_with(&self, flags: ScheduleFlags) -> RenderGraph {
        let info = RenderGraphCreateInfo::default()
            .with_schedule_flags(flags)
            .with_random_seed(0xC0FFEE);
        RenderGraph::new(Arc::clone(&self.device), info).expect("valid create info")
    }
}

pub fn color_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        1920,
        1080,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

pub fn depth_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        1920,
        1080,
        TextureFormat::Depth32Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

pub fn storage_desc(size: u64) -> BufferDescriptor {
    BufferDescriptor::new(size, BufferUsage::STORAGE)
}

/// Import a swapchain-like texture named "Swapchain".
pub fn import_swapchain(graph: &mut RenderGraph) -> Result<(), GraphError> {
    graph.import_texture(
        "Swapchain",
        GpuTexture::from_raw(0xFFFF_0001),
        color_desc(),
        ResourceState::UNDEFINED,
    )?;
    Ok(())
}

/// Import a buffer named `name` that outlives the graph.
pub fn import_readback(graph: &mut RenderGraph, name: &str) -> Result<(), GraphError> {
    graph.import_buffer(
        name,
        GpuBuffer::from_raw(0xFFFF_0002),
        storage_desc(1024),
        ResourceState::COPY_DEST,
    )?;
    Ok(())
}

/// "Opaque" clears and renders "Color"; "Present" samples it into the swapchain.
pub fn opaque_present(graph: &mut RenderGraph) -> Result<(PassHandle, PassHandle), GraphError> {
    graph.create_texture(color_desc(), "Color")?;
    import_swapchain(graph)?;
    let opaque = graph.add_render_pass(
        "Opaque",
        |pass| {
            pass.add_render_target(
                0,
                "Color",
                LoadAction::Clear,
                ClearValue::BLACK,
                StoreAction::Store,
            )?;
            Ok(())
        },
        |_, ctx| {
            ctx.draw(3, 1);
            Ok(())
        },
    )?;
    let present = graph.add_present_pass(
        "Present",
        |pass| {
            pass.add_input("scene", "Color")?
                .set_present_target("Swapchain")?;
            Ok(())
        },
        |_, ctx| {
            ctx.draw(3, 1);
            Ok(())
        },
    )?;
    Ok((opaque, present))
}

/// Compute pass that is kept although nothing reads its results.
pub fn standalone_compute(graph: &mut RenderGraph, name: &str) -> Result<PassHandle, GraphError> {
    graph.add_compute_pass(
        name,
        |pass| {
            pass.never_cull();
            Ok(())
        },
        |_, ctx| {
            ctx.dispatch(1, 1, 1);
            Ok(())
        },
    )
}

/// Names of the scheduled passes, in order.
pub fn order_names(graph: &RenderGraph) -> Vec<String> {
    let compiled = graph.compiled().expect("graph is compiled");
    compiled
        .pass_order()
        .iter()
        .map(|&pass| graph.pass(pass).expect("scheduled pass exists").name().to_owned())
        .collect()
}
