use criterion::{black_box, criterion_group, criterion_main, Criterion};

use frame_graph_engine::{
    Device, DeviceConfig, Extent2d, PassTask, ResourceStage, TextureDescriptor, TextureFormat,
    TextureUsage,
};

fn bench_device() -> Device {
    let device = Device::new(DeviceConfig {
        swapchain_extent: Extent2d::new(64, 64),
        ..DeviceConfig::default()
    })
    .expect("device creation");
    device.update();
    device
}

fn target_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        64,
        64,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED,
    )
}

fn noop_graphics() -> PassTask {
    PassTask::Graphics(Box::new(|_| {}))
}

fn noop_compute() -> PassTask {
    PassTask::Compute(Box::new(|_| {}))
}

// ---------------------------------------------------------------------------
// Frame graph build + compile
// ---------------------------------------------------------------------------

fn bench_compile_small(c: &mut Criterion) {
    let device = bench_device();
    c.bench_function("frame_graph_compile_4_passes", |b| {
        b.iter(|| {
            let mut builder = device.begin_frame_graph("small", None).unwrap();
            let shadow = builder.add_transient_texture("shadow", target_desc());
            let geometry = builder.add_transient_texture("geometry", target_desc());
            let lighting = builder.add_transient_texture("lighting", target_desc());
            let post = builder.add_transient_texture("post", target_desc());
            builder.mark_essential(post);

            for (name, input, output) in [
                ("shadow", None, shadow),
                ("geometry", Some(shadow), geometry),
                ("lighting", Some(geometry), lighting),
                ("post", Some(lighting), post),
            ] {
                builder.begin_render_pass(name);
                if let Some(input) = input {
                    builder.connect_input(input, ResourceStage::FragmentSampled);
                }
                builder.connect_output(output);
                builder.set_pass_task(noop_graphics());
                builder.end_pass();
            }
            black_box(builder.end_frame_graph());
        });
    });
}

fn bench_compile_chain(c: &mut Criterion) {
    let device = bench_device();
    c.bench_function("frame_graph_compile_32_passes_chain", |b| {
        b.iter(|| {
            let mut builder = device.begin_frame_graph("chain", None).unwrap();
            let mut prev = builder.add_transient_texture("tex_0", target_desc());
            builder.begin_render_pass("pass_0");
            builder.connect_output(prev);
            builder.set_pass_task(noop_graphics());
            builder.end_pass();

            for i in 1..32 {
                let tex = builder.add_transient_texture(format!("tex_{i}"), target_desc());
                builder.begin_render_pass(format!("pass_{i}"));
                builder.connect_input(prev, ResourceStage::FragmentSampled);
                builder.connect_output(tex);
                builder.set_pass_task(noop_graphics());
                builder.end_pass();
                prev = tex;
            }
            builder.mark_essential(prev);
            black_box(builder.end_frame_graph());
        });
    });
}

fn bench_compile_mixed(c: &mut Criterion) {
    let device = bench_device();
    c.bench_function("frame_graph_compile_mixed_12_passes", |b| {
        b.iter(|| {
            let mut builder = device.begin_frame_graph("mixed", None).unwrap();
            let mut prev = builder.add_transient_texture("gbuffer", target_desc());
            builder.begin_render_pass("gbuffer");
            builder.connect_output(prev);
            builder.set_pass_task(noop_graphics());
            builder.end_pass();

            // Alternating graphics and compute hops exercise grouping, queue
            // transfers and batching.
            for i in 0..5 {
                let blurred = builder.add_transient_texture(format!("blur_{i}"), target_desc());
                builder.begin_compute_pass(format!("blur_{i}"));
                builder.connect_input(prev, ResourceStage::ComputeSampled);
                builder.connect_output_as(blurred, ResourceStage::ComputeStorageWrite);
                builder.set_pass_task(noop_compute());
                builder.end_pass();

                let composed = builder.add_transient_texture(format!("compose_{i}"), target_desc());
                builder.begin_render_pass(format!("compose_{i}"));
                builder.connect_input(blurred, ResourceStage::FragmentSampled);
                builder.connect_output(composed);
                builder.set_pass_task(noop_graphics());
                builder.end_pass();
                prev = composed;
            }
            builder.mark_essential(prev);
            black_box(builder.end_frame_graph());
        });
    });
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn bench_execute_cached(c: &mut Criterion) {
    let device = bench_device();
    let key = device.initialise_cache_key("bench_execute");

    let mut builder = device.begin_frame_graph("exec", Some(key)).unwrap();
    let out = builder.add_transient_texture("out", target_desc());
    builder.mark_essential(out);
    builder.begin_render_pass("draw");
    builder.connect_output(out);
    builder.set_pass_task(PassTask::Graphics(Box::new(|list| {
        list.draw(3, 1);
    })));
    builder.end_pass();
    let graph = builder.end_frame_graph();

    c.bench_function("frame_graph_execute_cached_1_pass", |b| {
        b.iter(|| {
            device.execute_frame_graph(black_box(&graph));
        });
    });
}

criterion_group!(
    benches,
    bench_compile_small,
    bench_compile_chain,
    bench_compile_mixed,
    bench_execute_cached
);
criterion_main!(benches);
