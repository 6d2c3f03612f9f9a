//! End-to-end scenarios over the bounded channel transport: backpressure,
//! FIFO delivery, graceful drain on cancel, and async panic routing.

use commandbus::context::Context;
use commandbus::error::BusError;
use commandbus::handler::Handler;
use commandbus::processor::{Processor, ProcessorOptions};
use commandbus::transport::{ChannelTransport, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

mod common;

#[derive(Clone)]
struct Work;

struct Gate {
    open: Mutex<bool>,
    condvar: Condvar,
}

impl Gate {
    fn new() -> Arc<Self> {
        Arc::new(Gate {
            open: Mutex::new(false),
            condvar: Condvar::new(),
        })
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.condvar.wait(open).unwrap();
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.condvar.notify_all();
    }
}

#[test]
fn buffer_full_while_one_worker_blocked_on_gate() {
    common::init_tracing();
    let transport = Arc::new(ChannelTransport::new(2));
    let gate = Gate::new();
    let gate_clone = gate.clone();
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_clone = processed.clone();

    let processor = Processor::builder(transport.clone() as Arc<dyn Transport>)
        .workers(1)
        .build();
    processor.register(Handler::new::<Work, _>(move |_ctx, _cmd| {
        gate_clone.wait();
        processed_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    let processor = Arc::new(processor);
    let ctx = Context::background();
    let proc_clone = processor.clone();
    let ctx_clone = ctx.clone();
    let run_handle = thread::spawn(move || proc_clone.run(ctx_clone));

    // Give the single worker a chance to pick up the first envelope and
    // block on the gate before we saturate the queue.
    thread::sleep(Duration::from_millis(50));

    assert!(transport
        .dispatch(Context::background(), "Work", Box::new(Work))
        .is_ok());
    assert!(transport
        .dispatch(Context::background(), "Work", Box::new(Work))
        .is_ok());
    match transport.dispatch(Context::background(), "Work", Box::new(Work)) {
        Err(BusError::BufferFull(name)) => assert_eq!(name, "Work"),
        other => panic!("expected BufferFull, got {other:?}"),
    }

    gate.release();
    thread::sleep(Duration::from_millis(100));
    ctx.cancel();
    run_handle.join().unwrap().unwrap();

    assert_eq!(processed.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_worker_pool_processes_all_enqueued_work() {
    common::init_tracing();
    let transport = Arc::new(ChannelTransport::new(32));
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_clone = processed.clone();

    let processor = Processor::builder(transport.clone() as Arc<dyn Transport>)
        .workers(4)
        .build();
    processor.register(Handler::new::<Work, _>(move |_ctx, _cmd| {
        processed_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    for _ in 0..20 {
        transport
            .dispatch(Context::background(), "Work", Box::new(Work))
            .unwrap();
    }

    let processor = Arc::new(processor);
    let ctx = Context::background();
    let proc_clone = processor.clone();
    let ctx_clone = ctx.clone();
    let run_handle = thread::spawn(move || proc_clone.run(ctx_clone));

    thread::sleep(Duration::from_millis(150));
    ctx.cancel();
    run_handle.join().unwrap().unwrap();

    assert_eq!(processed.load(Ordering::SeqCst), 20);
    assert_eq!(processor.stats().processed, 20);
}

#[test]
fn async_panic_is_routed_to_error_handler_not_the_caller() {
    common::init_tracing();
    let transport = Arc::new(ChannelTransport::new(4));
    let failure = Arc::new(Mutex::new(None));
    let failure_clone = failure.clone();

    let processor = Processor::builder(transport.clone() as Arc<dyn Transport>)
        .error_handler(move |_ctx, name, err| {
            *failure_clone.lock().unwrap() = Some((name.to_string(), err.to_string()));
        })
        .build();
    processor.register(Handler::new::<Work, _>(|_ctx, _cmd| panic!("boom")));

    let dispatch_result = transport.dispatch(Context::background(), "Work", Box::new(Work));
    assert!(dispatch_result.is_ok());

    let processor = Arc::new(processor);
    let ctx = Context::background();
    let proc_clone = processor.clone();
    let ctx_clone = ctx.clone();
    let run_handle = thread::spawn(move || proc_clone.run(ctx_clone));

    thread::sleep(Duration::from_millis(80));
    ctx.cancel();
    run_handle.join().unwrap().unwrap();

    let captured = failure.lock().unwrap().clone().expect("error handler fired");
    assert_eq!(captured.0, "Work");
    assert!(captured.1.contains("panicked"));
    assert!(captured.1.contains("boom"));
    assert_eq!(processor.stats().failed, 1);
}

#[test]
fn graceful_shutdown_drains_already_enqueued_work_before_stopping() {
    common::init_tracing();
    let transport = Arc::new(ChannelTransport::new(8));
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_clone = processed.clone();

    let processor = Processor::builder(transport.clone() as Arc<dyn Transport>)
        .workers(2)
        .shutdown_timeout(Duration::from_secs(2))
        .build();
    processor.register(Handler::new::<Work, _>(move |_ctx, _cmd| {
        thread::sleep(Duration::from_millis(20));
        processed_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    for _ in 0..6 {
        transport
            .dispatch(Context::background(), "Work", Box::new(Work))
            .unwrap();
    }

    let processor = Arc::new(processor);
    let ctx = Context::background();
    let proc_clone = processor.clone();
    let ctx_clone = ctx.clone();
    let run_handle = thread::spawn(move || proc_clone.run(ctx_clone));

    // Cancel almost immediately: the already-enqueued envelopes must still
    // drain before workers exit.
    thread::sleep(Duration::from_millis(5));
    ctx.cancel();
    let result = run_handle.join().unwrap();

    assert!(result.is_ok());
    assert_eq!(processed.load(Ordering::SeqCst), 6);
}
