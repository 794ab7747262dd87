use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ember_graphics::{
    BufferDescriptor, BufferUsage, DummyDevice, GpuDevice, GraphError, RenderGraph,
    RenderGraphCreateInfo, ScheduleFlags,
};

fn new_graph(flags: ScheduleFlags) -> RenderGraph {
    let device: Arc<dyn GpuDevice> = Arc::new(DummyDevice::new());
    RenderGraph::new(
        device,
        RenderGraphCreateInfo::default().with_schedule_flags(flags),
    )
    .unwrap()
}

fn storage(size: u64) -> BufferDescriptor {
    BufferDescriptor::new(size, BufferUsage::STORAGE)
}

/// `length` compute passes, each reading the previous buffer and writing the next.
fn declare_chain(graph: &mut RenderGraph, length: usize) -> Result<(), GraphError> {
    for i in 0..=length {
        graph.create_buffer(storage(4096), &format!("buffer_{i}"))?;
    }
    for i in 0..length {
        let input = format!("buffer_{i}");
        let output = format!("buffer_{}", i + 1);
        let last = i + 1 == length;
        graph.add_compute_pass(
            &format!("pass_{i}"),
            |pass| {
                if i > 0 {
                    pass.add_input("in", &input)?;
                }
                pass.add_output("out", &output)?;
                if last {
                    pass.never_cull();
                }
                Ok(())
            },
            |_, ctx| {
                ctx.dispatch(64, 1, 1);
                Ok(())
            },
        )?;
    }
    Ok(())
}

/// One producer fanning out to `width` consumers merged by a final pass.
fn declare_diamond(graph: &mut RenderGraph, width: usize) -> Result<(), GraphError> {
    graph.create_buffer(storage(4096), "source")?;
    graph.create_buffer(storage(4096), "result")?;
    for i in 0..width {
        graph.create_buffer(storage(4096), &format!("branch_{i}"))?;
    }
    graph.add_compute_pass(
        "produce",
        |pass| {
            pass.add_output("out", "source")?;
            Ok(())
        },
        |_, _| Ok(()),
    )?;
    for i in 0..width {
        let branch = format!("branch_{i}");
        graph.add_compute_pass(
            &format!("branch_pass_{i}"),
            |pass| {
                pass.add_input("in", "source")?.add_output("out", &branch)?;
                Ok(())
            },
            |_, _| Ok(()),
        )?;
    }
    graph.add_compute_pass(
        "merge",
        |pass| {
            for i in 0..width {
                pass.add_input(&format!("in_{i}"), format!("branch_{i}"))?;
            }
            pass.add_output("out", "result")?.never_cull();
            Ok(())
        },
        |_, _| Ok(()),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Render graph construction
// ---------------------------------------------------------------------------

fn bench_graph_build_chain(c: &mut Criterion) {
    c.bench_function("render_graph_build_32_passes_chain", |b| {
        b.iter(|| {
            let mut graph = new_graph(ScheduleFlags::empty());
            declare_chain(&mut graph, 32).unwrap();
            black_box(&graph);
        });
    });
}

fn bench_graph_build_diamond(c: &mut Criterion) {
    c.bench_function("render_graph_build_diamond_16_wide", |b| {
        b.iter(|| {
            let mut graph = new_graph(ScheduleFlags::empty());
            declare_diamond(&mut graph, 16).unwrap();
            black_box(&graph);
        });
    });
}

// ---------------------------------------------------------------------------
// Render graph compilation
// ---------------------------------------------------------------------------

fn bench_graph_compile_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_graph_compile_32_passes_chain");
    for (name, flags) in [
        ("default", ScheduleFlags::empty()),
        ("memory_saving", ScheduleFlags::MEMORY_SAVING),
    ] {
        group.bench_function(name, |b| {
            b.iter_with_setup(
                || {
                    let mut graph = new_graph(flags);
                    declare_chain(&mut graph, 32).unwrap();
                    graph
                },
                |mut graph| {
                    graph.compile().unwrap();
                    black_box(graph.compiled().map(|compiled| compiled.pass_count()));
                },
            );
        });
    }
    group.finish();
}

fn bench_graph_compile_diamond(c: &mut Criterion) {
    c.bench_function("render_graph_compile_diamond_16_wide", |b| {
        b.iter_with_setup(
            || {
                let mut graph = new_graph(ScheduleFlags::empty());
                declare_diamond(&mut graph, 16).unwrap();
                graph
            },
            |mut graph| {
                graph.compile().unwrap();
                black_box(graph.compiled().map(|compiled| compiled.pass_count()));
            },
        );
    });
}

/// Reset and rebuild, the steady-state cost of one frame's declaration.
fn bench_graph_reset_rebuild(c: &mut Criterion) {
    c.bench_function("render_graph_reset_rebuild_32_passes", |b| {
        let mut graph = new_graph(ScheduleFlags::empty());
        b.iter(|| {
            graph.reset().unwrap();
            declare_chain(&mut graph, 32).unwrap();
            graph.compile().unwrap();
            black_box(graph.compiled().map(|compiled| compiled.pass_count()));
        });
    });
}

criterion_group!(
    benches,
    bench_graph_build_chain,
    bench_graph_build_diamond,
    bench_graph_compile_chain,
    bench_graph_compile_diamond,
    bench_graph_reset_rebuild,
);
criterion_main!(benches);
