//! Rebinding buffers between executions of the same graph.

use tessera_device::HostBuffer;

use super::{add_scalar, cpu_context, fill_ones};
use crate::{Error, GraphState, TaskGraph, args};

#[test]
fn test_resize_output_only() {
    let (_, context) = cpu_context();
    let kernel = fill_ones();
    let a = HostBuffer::<f32>::zeroed(256);

    let mut graph = TaskGraph::new("resize01", context);
    graph.task("t0", &kernel, args![&a]).unwrap().stream_out(&[&a]).unwrap();
    graph.execute().unwrap();
    assert!(a.to_vec().iter().all(|&v| v == 1.0));

    let b = HostBuffer::<f32>::zeroed(512);
    graph.update_reference(&a, &b).unwrap();
    graph.execute().unwrap();
    assert_eq!(b.len(), 512);
    assert!(b.to_vec().iter().all(|&v| v == 1.0));
}

#[test]
fn test_resize_input_and_output() {
    let (_, context) = cpu_context();
    let kernel = add_scalar();
    let a = HostBuffer::filled(256, 1.0f32);
    let b = HostBuffer::<f32>::zeroed(256);

    let mut graph = TaskGraph::new("resize02", context);
    graph
        .stream_in(&[&a])
        .unwrap()
        .task("t0", &kernel, args![&a, &b, 10.0f32])
        .unwrap()
        .stream_out(&[&b])
        .unwrap();
    graph.execute().unwrap();
    assert!(b.to_vec().iter().all(|&v| v == 11.0));

    let a2 = HostBuffer::filled(512, 1.0f32);
    let b2 = HostBuffer::<f32>::zeroed(512);
    graph.update_reference(&a, &a2).unwrap().update_reference(&b, &b2).unwrap();
    graph.execute().unwrap();

    assert_eq!(b2.to_vec(), vec![11.0; 512]);
    // The previous output is no longer written.
    assert_eq!(b.to_vec(), vec![11.0; 256]);
}

#[test]
fn test_dynamic_resize_each_iteration() {
    let (_, context) = cpu_context();
    let kernel = fill_ones();
    let mut current = HostBuffer::<f32>::zeroed(256);

    let mut graph = TaskGraph::new("dynamic", context);
    graph.task("t0", &kernel, args![&current]).unwrap().stream_out(&[&current]).unwrap();

    for _ in 0..4 {
        graph.execute().unwrap();
        assert!(current.to_vec().iter().all(|&v| v == 1.0));

        let next = HostBuffer::<f32>::zeroed(current.len() * 2);
        graph.update_reference(&current, &next).unwrap();
        current = next;
    }

    assert_eq!(current.len(), 4096);
    assert_eq!(graph.execution_count(), 4);
}

#[test]
fn test_rebind_chain_through_three_lengths() {
    let (_, context) = cpu_context();
    let kernel = add_scalar();
    let input = HostBuffer::new((0..256).map(|i| i as f32).collect());
    let output = HostBuffer::<f32>::zeroed(256);

    let mut graph = TaskGraph::new("chain", context);
    graph.stream_in(&[&input]).unwrap().task("t0", &kernel, args![&input, &output, 0.5f32]).unwrap();
    graph.stream_out(&[&output]).unwrap();
    graph.execute().unwrap();

    let (mut input, mut output) = (input, output);
    for len in [512usize, 2048] {
        let next_input = HostBuffer::new((0..len).map(|i| i as f32).collect());
        let next_output = HostBuffer::<f32>::zeroed(len);
        graph.update_reference(&input, &next_input).unwrap();
        graph.update_reference(&output, &next_output).unwrap();
        graph.execute().unwrap();

        let expected: Vec<f32> = (0..len).map(|i| i as f32 + 0.5).collect();
        assert_eq!(next_output.to_vec(), expected);
        input = next_input;
        output = next_output;
    }
    assert_eq!(output.len(), 2048);
}

#[test]
fn test_same_size_rebind_copies_new_content() {
    let (device, context) = cpu_context();
    let kernel = add_scalar();
    let a = HostBuffer::filled(64, 1.0f32);
    let b = HostBuffer::<f32>::zeroed(64);

    let mut graph = TaskGraph::new("test03", context);
    graph.copy_in(&[&a]).unwrap().task("t0", &kernel, args![&a, &b, 10.0f32]).unwrap().stream_out(&[&b]).unwrap();
    graph.execute().unwrap();
    let used = device.memory_used();

    let a2 = HostBuffer::filled(64, 10.0f32);
    graph.update_reference(&a, &a2).unwrap();
    graph.execute().unwrap();

    assert_eq!(device.memory_used(), used);
    assert!(b.to_vec().iter().all(|&v| v == 20.0));
}

#[test]
fn test_update_reference_errors() {
    let (_, context) = cpu_context();
    let kernel = fill_ones();
    let a = HostBuffer::<f32>::zeroed(8);
    let mut graph = TaskGraph::new("g", context);
    graph.task("t0", &kernel, args![&a]).unwrap();

    let stranger = HostBuffer::<f32>::zeroed(8);
    let err = graph.update_reference(&stranger, &HostBuffer::<f32>::zeroed(8)).unwrap_err();
    assert!(matches!(err, Error::UnboundBuffer { ref node, buffer } if node == "g.update_reference" && buffer == stranger.id()));

    let ints = HostBuffer::<i32>::zeroed(8);
    let err = graph.update_reference(&a, &ints).unwrap_err();
    assert!(matches!(err, Error::IncompatibleReference { .. }));
    assert_eq!(graph.state(), GraphState::Built);
}
