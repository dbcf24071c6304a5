#[macro_use]
extern crate criterion;

use criterion::{BenchmarkId, Criterion};
use std::rc::Rc;
use weave::backend::TestBackend;
use weave::lane::{Priority, UpdateOptions};
use weave::scheduler::Scheduling;
use weave::{CoroutineHandle, Runtime, RuntimeConfig, Value};

criterion::criterion_group!(runtime, mount_empty_root, flush_repeated_updates, memoized_hook_recompute);
criterion::criterion_main!(runtime);

fn mount_empty_root(c: &mut Criterion) {
    c.bench_function("mount_empty_root", |b| {
        b.iter(|| {
            let rt = Runtime::new(TestBackend::new(), RuntimeConfig::default(), "bench");
            rt.mount(Box::new(|_session| Value::Null))
        })
    });
}

fn flush_n_updates(rt: &Rc<Runtime>, coroutine: &CoroutineHandle, n: usize) {
    for _ in 0..n {
        rt.schedule_update(coroutine.clone(), UpdateOptions::new(Priority::UserBlocking));
    }
    rt.flush_sync();
}

fn flush_repeated_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush_repeated_updates");
    for input in &[2, 7, 23] {
        group.bench_with_input(BenchmarkId::from_parameter(input), input, |b, &n| {
            let rt = Runtime::new(TestBackend::new(), RuntimeConfig::default(), "bench");
            let (coroutine, _) = rt.mount(Box::new(|_session| Value::Null));
            b.iter(|| flush_n_updates(&rt, &coroutine, n));
        });
    }
    group.finish();
}

fn memoized_hook_recompute(c: &mut Criterion) {
    c.bench_function("memoized_hook_recompute", |b| {
        let rt = Runtime::new(TestBackend::new(), RuntimeConfig::default(), "bench");
        let (coroutine, _) = rt.mount(Box::new(|session| {
            let big = weave::use_memo(session, Some(vec![Value::Int(1)]), || Rc::new(vec![0_u8; 1_000_000]));
            Value::Int(big.len() as i64)
        }));
        b.iter(|| flush_n_updates(&rt, &coroutine, 1));
    });
}
