use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tessera_device::{
    CpuCompiler, CpuDevice, Compiler, DeviceSpec, Extent, HostBuffer, IterationSpace, Kernel, Param, Program,
};
use test_case::test_case;

use super::{add_scalar, cpu_context, fill_ones, scale};
use crate::{Arg, DeviceContext, Error, GraphState, NodeKind, TaskGraph, args};

#[test]
fn test_state_transitions() {
    let (_, context) = cpu_context();
    let kernel = fill_ones();
    let a = HostBuffer::<f32>::zeroed(4);

    let mut graph = TaskGraph::new("g", context);
    assert_eq!(graph.state(), GraphState::Unbuilt);
    graph.task("t0", &kernel, args![&a]).unwrap();
    assert_eq!(graph.state(), GraphState::Built);
    graph.warmup().unwrap();
    assert_eq!(graph.state(), GraphState::Warmed);
    graph.execute().unwrap();
    assert_eq!(graph.state(), GraphState::Idle);
    graph.dispose();
    assert_eq!(graph.state(), GraphState::Disposed);
}

#[test]
fn test_order_preserved_across_tasks() {
    let (_, context) = cpu_context();
    let (scale, add) = (scale(), add_scalar());
    let x = HostBuffer::new(vec![1.0f32, 2.0, 3.0, 4.0]);
    let y = HostBuffer::<f32>::zeroed(4);

    let mut graph = TaskGraph::new("order", context);
    graph
        .stream_in(&[&x])
        .unwrap()
        .task("scale", &scale, args![&x, 2.0f32])
        .unwrap()
        .task("add", &add, args![&x, &y, 1.0f32])
        .unwrap()
        .stream_out(&[&y])
        .unwrap();
    graph.execute().unwrap();

    assert_eq!(y.to_vec(), vec![3.0, 5.0, 7.0, 9.0]);
    // Without a stream-out the host copy of `x` is untouched.
    assert_eq!(x.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_sync_objects_reads_back() {
    let (_, context) = cpu_context();
    let kernel = scale();
    let x = HostBuffer::new(vec![1.0f32, 2.0]);

    let mut graph = TaskGraph::new("sync", context);
    graph.stream_in(&[&x]).unwrap().task("t0", &kernel, args![&x, 3.0f32]).unwrap();
    graph.execute().unwrap();
    assert_eq!(x.to_vec(), vec![1.0, 2.0]);

    graph.sync_objects(&[&x]).unwrap();
    assert_eq!(x.to_vec(), vec![3.0, 6.0]);

    let other = HostBuffer::<f32>::zeroed(2);
    assert!(matches!(graph.sync_objects(&[&other]), Err(Error::UnboundBuffer { .. })));
}

#[test]
fn test_stream_in_copies_every_run_copy_in_only_when_stale() {
    let (_, context) = cpu_context();
    let kernel = add_scalar();
    let streamed = HostBuffer::filled(16, 1.0f32);
    let copied = HostBuffer::filled(16, 2.0f32);
    let (out_a, out_b) = (HostBuffer::<f32>::zeroed(16), HostBuffer::<f32>::zeroed(16));

    let mut graph = TaskGraph::new("transfers", context);
    graph
        .stream_in(&[&streamed])
        .unwrap()
        .copy_in(&[&copied])
        .unwrap()
        .task("a", &kernel, args![&streamed, &out_a, 0.0f32])
        .unwrap()
        .task("b", &kernel, args![&copied, &out_b, 0.0f32])
        .unwrap()
        .stream_out(&[&out_a, &out_b])
        .unwrap();

    graph.execute().unwrap();
    graph.execute().unwrap();
    copied.write()[0] = 5.0;
    graph.execute().unwrap();

    let bytes = |kind: NodeKind| -> Vec<usize> {
        graph.profiles().unwrap().iter().filter(|s| s.kind == kind).map(|s| s.bytes).collect()
    };
    assert_eq!(bytes(NodeKind::StreamIn), vec![64, 64, 64]);
    assert_eq!(bytes(NodeKind::CopyIn), vec![64, 0, 64]);
    assert_eq!(out_b.to_vec()[0], 5.0);
}

#[test]
fn test_copy_out_does_not_mark_input_stale() {
    let (_, context) = cpu_context();
    let kernel = scale();
    let x = HostBuffer::new(vec![1.0f32; 4]);

    let mut graph = TaskGraph::new("inout", context);
    graph.copy_in(&[&x]).unwrap().task("t0", &kernel, args![&x, 2.0f32]).unwrap().stream_out(&[&x]).unwrap();
    graph.execute().unwrap();
    graph.execute().unwrap();

    // The device copy already matches what was streamed out, so the second
    // run scales it again without a transfer.
    assert_eq!(x.to_vec(), vec![4.0; 4]);
    let copy_in: Vec<_> = graph.profiles().unwrap().iter().filter(|s| s.kind == NodeKind::CopyIn).map(|s| s.bytes).collect();
    assert_eq!(copy_in, vec![16, 0]);
}

#[test]
fn test_unbound_input_rejected_at_build_time() {
    let (device, context) = cpu_context();
    let kernel = add_scalar();
    let a = HostBuffer::<f32>::zeroed(8);
    let b = HostBuffer::<f32>::zeroed(8);

    let mut graph = TaskGraph::new("g", context);
    let err = graph.task("t0", &kernel, args![&a, &b, 1.0f32]).unwrap_err();
    assert!(matches!(err, Error::UnboundBuffer { ref node, buffer } if node == "g.t0" && buffer == a.id()));
    assert!(graph.nodes().is_empty());
    assert_eq!(device.memory_used(), 0);

    let err = graph.stream_out(&[&b]).unwrap_err();
    assert!(matches!(err, Error::UnboundBuffer { .. }));
}

#[test]
fn test_output_of_earlier_task_is_readable() {
    let (_, context) = cpu_context();
    let (fill, add) = (fill_ones(), add_scalar());
    let a = HostBuffer::<f32>::zeroed(8);
    let b = HostBuffer::<f32>::zeroed(8);

    let mut graph = TaskGraph::new("g", context);
    graph.task("fill", &fill, args![&a]).unwrap().task("add", &add, args![&a, &b, 1.0f32]).unwrap();
    graph.stream_out(&[&b]).unwrap();
    graph.execute().unwrap();
    assert_eq!(b.to_vec(), vec![2.0; 8]);
}

#[test_case(args![] ; "missing arguments")]
#[test_case(args![1.0f32, 2.0f32, 1.0f32] ; "scalar for buffer")]
#[test_case(vec![Arg::Buffer(HostBuffer::<f32>::zeroed(4).erase()), Arg::Buffer(HostBuffer::<f32>::zeroed(4).erase()), Arg::from(1i32)] ; "scalar dtype")]
fn test_invalid_task(args: Vec<Arg>) {
    let (_, context) = cpu_context();
    let kernel = add_scalar();
    let mut graph = TaskGraph::new("g", context);
    if let Some(Arg::Buffer(host)) = args.first() {
        graph.stream_in(&[host]).unwrap();
    }

    let err = graph.task("bad", &kernel, args).unwrap_err();
    assert!(matches!(err, Error::InvalidTask { ref node, .. } if node == "g.bad"), "{err}");
}

#[test]
fn test_buffer_dtype_checked() {
    let (_, context) = cpu_context();
    let kernel = fill_ones();
    let ints = HostBuffer::<i32>::zeroed(4);
    let mut graph = TaskGraph::new("g", context);
    let err = graph.task("t0", &kernel, args![&ints]).unwrap_err();
    assert!(err.to_string().contains("expected f32 buffer"), "{err}");
}

#[test]
fn test_disposed_graph_rejects_operations() {
    let (device, context) = cpu_context();
    let kernel = fill_ones();
    let a = HostBuffer::<f32>::zeroed(32);

    let mut graph = TaskGraph::new("g", context);
    graph.task("t0", &kernel, args![&a]).unwrap();
    graph.execute().unwrap();
    assert!(device.memory_used() > 0);

    graph.dispose();
    graph.dispose();
    assert!(matches!(graph.execute(), Err(Error::GraphDisposed { .. })));
    assert!(matches!(graph.stream_in(&[&a]), Err(Error::GraphDisposed { .. })));
    assert!(matches!(graph.warmup(), Err(Error::GraphDisposed { .. })));
    assert!(matches!(graph.sync_objects(&[&a]), Err(Error::GraphDisposed { .. })));
    assert!(matches!(graph.profiles(), Err(Error::GraphDisposed { .. })));
    assert!(matches!(graph.dump_profiles(), Err(Error::GraphDisposed { .. })));
    assert!(matches!(graph.clear_profiles(), Err(Error::GraphDisposed { .. })));

    // Released blocks stay cached until the device is reset.
    assert!(device.cached_blocks() > 0);
    graph.device().reset().unwrap();
    assert_eq!(device.memory_used(), 0);
}

#[test]
fn test_out_of_memory_leaves_graph_idle() {
    let device = Arc::new(CpuDevice::builder().memory_limit(64).build());
    let context = Arc::new(DeviceContext::new(device, Arc::new(CpuCompiler)));
    let kernel = scale();
    let big = HostBuffer::filled(32, 1.0f32);

    let mut graph = TaskGraph::new("oom", context);
    graph.stream_in(&[&big]).unwrap().task("t0", &kernel, args![&big, 2.0f32]).unwrap();
    graph.stream_out(&[&big]).unwrap();

    let err = graph.execute().unwrap_err();
    assert!(matches!(err, Error::DeviceOutOfMemory { ref node, .. } if node == "oom.stream_in.0"), "{err}");
    assert_eq!(graph.state(), GraphState::Idle);
    assert_eq!(graph.execution_count(), 0);

    let small = HostBuffer::filled(8, 1.0f32);
    graph.update_reference(&big, &small).unwrap();
    graph.execute().unwrap();
    assert_eq!(small.to_vec(), vec![2.0; 8]);
}

#[test]
fn test_launch_failure_names_node() {
    let (_, context) = cpu_context();
    let kernel = Kernel::new("writes_input", [Param::input::<f32>()], IterationSpace::new_1d(Extent::Fixed(1)), |_, args| {
        args.buffer_mut::<f32>(0)?[0] = 1.0;
        Ok(())
    });
    let a = HostBuffer::<f32>::zeroed(1);

    let mut graph = TaskGraph::new("g", context);
    graph.stream_in(&[&a]).unwrap().task("bad", &kernel, args![&a]).unwrap();
    let err = graph.execute().unwrap_err();
    assert!(matches!(err, Error::LaunchFailure { ref node, .. } if node == "g.bad"), "{err}");
    assert_eq!(graph.state(), GraphState::Idle);
}

#[test]
fn test_panicking_kernel_is_launch_failure() {
    let (_, context) = cpu_context();
    let kernel = Kernel::new("overrun", [Param::output::<f32>()], IterationSpace::new_1d(Extent::Fixed(4)), |item, args| {
        args.buffer_mut::<f32>(0)?[item.x()] = 1.0;
        Ok(())
    });
    let a = HostBuffer::<f32>::zeroed(2);

    let mut graph = TaskGraph::new("g", context);
    graph.task("t0", &kernel, args![&a]).unwrap();
    let err = graph.execute().unwrap_err();
    assert!(matches!(err, Error::LaunchFailure { ref node, .. } if node == "g.t0"), "{err}");
    assert!(err.to_string().contains("panicked"), "{err}");
    assert_eq!(graph.state(), GraphState::Idle);
    assert_eq!(graph.execution_count(), 0);
}

#[test]
fn test_compilation_failure_surfaces_on_first_launch() {
    let (_, context) = cpu_context();
    let kernel = Kernel::new("bad_space", [Param::output::<f32>()], IterationSpace::new_1d(Extent::Length(3)), |_, _| Ok(()));
    let a = HostBuffer::<f32>::zeroed(1);

    let mut graph = TaskGraph::new("g", context);
    graph.task("t0", &kernel, args![&a]).unwrap();
    let err = graph.execute().unwrap_err();
    assert!(matches!(err, Error::Compilation { ref node, .. } if node == "g.t0"), "{err}");
    assert_eq!(graph.state(), GraphState::Idle);
    assert_eq!(graph.execution_count(), 0);
    assert!(graph.profiles().unwrap().is_empty());
}

#[test]
fn test_graphs_sharing_host_buffer_keep_separate_device_copies() {
    let (device, context) = cpu_context();
    let kernel = scale();
    let x = HostBuffer::filled(4, 1.0f32);

    let mut doubled = TaskGraph::new("g1", Arc::clone(&context));
    doubled.stream_in(&[&x]).unwrap().task("t0", &kernel, args![&x, 2.0f32]).unwrap();
    let mut tripled = TaskGraph::new("g2", context);
    tripled.copy_in(&[&x]).unwrap().task("t0", &kernel, args![&x, 3.0f32]).unwrap().stream_out(&[&x]).unwrap();

    doubled.execute().unwrap();
    let single = device.memory_used();
    assert_eq!(single, 16);
    tripled.execute().unwrap();
    assert_eq!(device.memory_used(), 2 * single);
    assert_eq!(x.to_vec(), vec![3.0; 4]);

    // g1's device copy was never touched by g2.
    doubled.sync_objects(&[&x]).unwrap();
    assert_eq!(x.to_vec(), vec![2.0; 4]);
}

#[test]
fn test_compilation_failure_surfaces_on_warmup() {
    let (_, context) = cpu_context();
    let kernel = Kernel::new("bad_space", [Param::output::<f32>()], IterationSpace::new_1d(Extent::Length(3)), |_, _| Ok(()));
    let a = HostBuffer::<f32>::zeroed(1);

    let mut graph = TaskGraph::new("g", context);
    graph.task("t0", &kernel, args![&a]).unwrap();
    let err = graph.warmup().unwrap_err();
    assert!(matches!(err, Error::Compilation { ref node, .. } if node == "g.t0"), "{err}");
}

#[test]
fn test_warmup_is_not_counted() {
    let (device, context) = cpu_context();
    let kernel = fill_ones();
    let a = HostBuffer::<f32>::zeroed(16);

    let mut graph = TaskGraph::new("g", context.clone());
    graph.task("t0", &kernel, args![&a]).unwrap().stream_out(&[&a]).unwrap();
    graph.warmup().unwrap();

    assert!(context.cache().contains(kernel.id(), &DeviceSpec::Cpu));
    assert!(device.memory_used() > 0);
    assert!(graph.profiles().unwrap().is_empty());
    assert_eq!(graph.execution_count(), 0);
    assert_eq!(a.to_vec(), vec![0.0; 16]);

    let report = graph.execute().unwrap();
    assert_eq!(report.run, 1);
    assert_eq!(graph.execution_count(), 1);
    assert_eq!(graph.total_elapsed(), report.elapsed);
}

#[test]
fn test_profiles_accumulate_until_cleared() {
    let (_, context) = cpu_context();
    let kernel = scale();
    let x = HostBuffer::filled(4, 1.0f32);

    let mut graph = TaskGraph::new("prof", context);
    graph.stream_in(&[&x]).unwrap().task("scale", &kernel, args![&x, 1.0f32]).unwrap().barrier().unwrap();
    graph.stream_out(&[&x]).unwrap();
    for _ in 0..3 {
        graph.execute().unwrap();
    }

    assert_eq!(graph.profiles().unwrap().len(), 12);
    assert_eq!(graph.profiles().unwrap().iter().filter(|s| s.node == "prof.scale").count(), 3);
    assert!(graph.profiles().unwrap().iter().any(|s| s.kind == NodeKind::Barrier && s.node == "prof.barrier.2"));
    assert_eq!(graph.profiles().unwrap().last().map(|s| s.run), Some(3));

    let dump = graph.dump_profiles().unwrap();
    assert!(dump.contains("prof.stream_out.3"));

    graph.clear_profiles().unwrap();
    assert!(graph.profiles().unwrap().is_empty());
    assert_eq!(graph.execution_count(), 3);
}

#[derive(Debug, Default)]
struct CountingCompiler {
    inner: CpuCompiler,
    compiled: AtomicUsize,
}

impl Compiler for CountingCompiler {
    fn compile(&self, kernel: &Arc<Kernel>, device: &DeviceSpec) -> tessera_device::Result<Arc<dyn Program>> {
        self.compiled.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(kernel, device)
    }
}

#[test]
fn test_concurrent_graphs_share_compiled_kernel() {
    let compiler = Arc::new(CountingCompiler::default());
    let context = Arc::new(DeviceContext::new(Arc::new(CpuDevice::default()), compiler.clone()));
    let kernel = add_scalar();

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let (context, kernel) = (context.clone(), kernel.clone());
            scope.spawn(move || {
                let input = HostBuffer::new((0..64).map(|i| i as f32).collect());
                let output = HostBuffer::<f32>::zeroed(64);
                let mut graph = TaskGraph::new(format!("worker{worker}"), context);
                graph.stream_in(&[&input]).unwrap().task("t0", &kernel, args![&input, &output, worker as f32]).unwrap();
                graph.stream_out(&[&output]).unwrap();
                for _ in 0..5 {
                    graph.execute().unwrap();
                }
                let expected: Vec<f32> = (0..64).map(|i| i as f32 + worker as f32).collect();
                assert_eq!(output.to_vec(), expected);
            });
        }
    });

    assert_eq!(compiler.compiled.load(Ordering::SeqCst), 1);
    assert_eq!(context.cache().len(), 1);
}
