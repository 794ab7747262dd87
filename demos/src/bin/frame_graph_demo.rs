//! Deferred shading frame driven through the render graph on the dummy backend.
//!
//! Run with: `cargo run -p ember-demos --bin frame_graph_demo -- --frames 8`
//! Set `RUST_LOG=debug` to see culling and scheduling decisions.

use std::sync::Arc;

use clap::Parser;

use ember_demos::{FrameImports, SceneStats, camera_desc, declare_deferred_frame, swapchain_desc};
use ember_graphics::{
    DummyDevice, FramePipeline, GpuDevice, GpuTexture, GraphError, QueueType, RenderGraph,
    RenderGraphCreateInfo, ScheduleFlags, SurfaceResized,
};

/// Pass scheduling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum Schedule {
    /// Dependency order, ties broken by declaration order
    #[default]
    #[value(name = "default")]
    Default,
    /// Declaration order, rejected if it breaks a dependency
    #[value(name = "program-order")]
    ProgramOrder,
    /// Depth-first order that shortens transient lifetimes and enables aliasing
    #[value(name = "memory-saving")]
    MemorySaving,
    /// Seeded random topological order
    #[value(name = "random")]
    Random,
}

impl Schedule {
    fn flags(self) -> ScheduleFlags {
        match self {
            Self::Default => ScheduleFlags::empty(),
            Self::ProgramOrder => ScheduleFlags::PROGRAM_ORDER,
            Self::MemorySaving => ScheduleFlags::MEMORY_SAVING,
            Self::Random => ScheduleFlags::RANDOM_ORDER,
        }
    }
}

/// Ember frame graph demo.
#[derive(Parser, Debug)]
#[command(name = "frame_graph_demo", about = "Ember render graph demo")]
struct Args {
    /// Number of frames to run
    #[arg(long, default_value_t = 6)]
    frames: u64,

    /// Frames the CPU may record ahead of the GPU
    #[arg(long, default_value_t = FramePipeline::DEFAULT_FRAMES_IN_FLIGHT)]
    frames_in_flight: usize,

    /// Pass scheduling strategy
    #[arg(long, value_enum, default_value_t = Schedule::Default)]
    schedule: Schedule,

    /// Seed for the random schedule
    #[arg(long, default_value_t = 0x5EED)]
    seed: u64,

    /// Keep passes whose results are never used
    #[arg(long)]
    no_dce: bool,

    /// Initial surface width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial surface height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Frame at which the surface is resized to half its size
    #[arg(long)]
    resize_at: Option<u64>,
}

/// Swapchain images owned by the demo, one per frame in flight.
struct Swapchain {
    images: Vec<GpuTexture>,
    width: u32,
    height: u32,
}

impl Swapchain {
    fn new(device: &dyn GpuDevice, count: usize, width: u32, height: u32) -> Result<Self, GraphError> {
        let desc = swapchain_desc(width, height).with_label("Swapchain");
        let images = (0..count)
            .map(|_| device.create_texture(&desc))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            images,
            width,
            height,
        })
    }

    fn destroy(self, device: &dyn GpuDevice) {
        for image in self.images {
            device.destroy_texture(image);
        }
    }
}

fn run(args: &Args) -> Result<(), GraphError> {
    ember_core::init();
    ember_graphics::init();
    log::info!("Ember Demos v{}", ember_demos::VERSION);

    let dummy = DummyDevice::new();
    let device: Arc<dyn GpuDevice> = Arc::new(dummy.clone());
    let queue = Arc::new(dummy.create_queue(QueueType::Graphics));

    let mut flags = args.schedule.flags();
    if args.no_dce {
        flags |= ScheduleFlags::DISABLE_DEAD_CODE_ELIMINATION;
    }
    let info = RenderGraphCreateInfo::default()
        .with_schedule_flags(flags)
        .with_random_seed(args.seed);

    let mut pipeline = FramePipeline::new(&device, queue, args.frames_in_flight)?;
    let mut graph = RenderGraph::new(Arc::clone(&device), info)?;
    let mut swapchain = Swapchain::new(
        device.as_ref(),
        pipeline.frames_in_flight(),
        args.width,
        args.height,
    )?;
    let camera = device.create_buffer(&camera_desc().with_label("Camera"))?;

    for frame in 0..args.frames {
        if args.resize_at == Some(frame) {
            let (width, height) = ((swapchain.width / 2).max(1), (swapchain.height / 2).max(1));
            log::info!("Resizing surface to {width}x{height}");
            pipeline.wait_idle()?;
            swapchain.destroy(device.as_ref());
            swapchain = Swapchain::new(device.as_ref(), pipeline.frames_in_flight(), width, height)?;
            graph.handle_event(&mut SurfaceResized { width, height });
            graph.reset()?;
        }

        let slot = pipeline.current_slot();
        let imports = FrameImports {
            swapchain: swapchain.images[slot],
            camera,
        };
        declare_deferred_frame(&mut graph, swapchain.width, swapchain.height, imports)?;

        let executor = pipeline.begin_frame();
        executor.set_user_context(SceneStats::default());
        graph.compile()?;
        if let Some(compiled) = graph.compiled() {
            log::info!(
                "Frame {frame}: {} passes, {} culled, {} transitions, {} allocations ({} KiB transient)",
                compiled.pass_count(),
                compiled.culled_passes().len(),
                compiled.transitions().count() + compiled.final_transitions().len(),
                compiled.allocations().len(),
                compiled.transient_memory_bytes() / 1024
            );
        }
        graph.execute(executor)?;
        pipeline.end_frame();
        graph.reset()?;
    }

    pipeline.finalize()?;
    drop(graph);
    swapchain.destroy(device.as_ref());
    device.destroy_buffer(camera);

    log::info!(
        "Done: {} submissions, {} presents, {} allocations, {} resources leaked",
        dummy.submit_count(),
        dummy.present_count(),
        dummy.total_allocations(),
        dummy.live_resource_count()
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(err) = run(&args) {
        log::error!("Frame graph demo failed: {err}");
        std::process::exit(1);
    }
}
