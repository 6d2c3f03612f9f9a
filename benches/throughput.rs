use commandbus::context::Context;
use commandbus::dispatcher::Dispatcher;
use commandbus::handler::Handler;
use commandbus::processor::{Processor, ProcessorOptions};
use commandbus::transport::{ChannelTransport, SyncTransport, Transport};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

#[derive(Clone)]
struct Noop;

static INIT_TRACING: Once = Once::new();

/// One-time `tracing-subscriber` setup so the bus's `tracing::info!`
/// output (`TracingLogger`, `LoggingMiddleware`) is visible under
/// `cargo bench -- --nocapture` instead of going nowhere.
fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

fn bench_sync_dispatch(c: &mut Criterion) {
    init_tracing();
    let transport: Arc<dyn Transport> = Arc::new(SyncTransport::new());
    let processor = Processor::new(transport.clone(), ProcessorOptions::default());
    processor.register(Handler::new::<Noop, _>(|_ctx, _payload| Ok(())));
    let dispatcher = Dispatcher::new(transport);

    c.bench_function("sync_dispatch", |b| {
        b.iter(|| {
            let result = dispatcher.dispatch(Context::background(), Noop);
            black_box(&result);
        })
    });
}

fn bench_channel_enqueue(c: &mut Criterion) {
    init_tracing();
    let transport = Arc::new(ChannelTransport::new(4096));
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_clone = processed.clone();
    let processor = Processor::builder(transport.clone() as Arc<dyn Transport>)
        .workers(4)
        .build();
    processor.register(Handler::new::<Noop, _>(move |_ctx, _payload| {
        processed_clone.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }));

    let ctx = Context::background();
    let processor = Arc::new(processor);
    let proc_clone = processor.clone();
    let ctx_clone = ctx.clone();
    let run_handle = std::thread::spawn(move || proc_clone.run(ctx_clone));

    let dispatcher = Dispatcher::new(transport.clone() as Arc<dyn Transport>);
    c.bench_function("channel_enqueue", |b| {
        b.iter(|| {
            let result = dispatcher.dispatch(Context::background(), Noop);
            black_box(&result);
        })
    });

    ctx.cancel();
    let _ = run_handle.join();
}

criterion_group!(benches, bench_sync_dispatch, bench_channel_enqueue);
criterion_main!(benches);
