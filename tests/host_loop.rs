use pong::{
    HostStatus, Runtime, RuntimeBuilder, RuntimeError, TaskStatus, Thunk, Value, script_fn,
    sleep_ms,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn flag_finalizer(rt: &Runtime) -> Rc<Cell<bool>> {
    let flushed = Rc::new(Cell::new(false));
    let flag = flushed.clone();
    rt.atexit(move || {
        flag.set(true);
        Ok(())
    })
    .unwrap();
    flushed
}

#[test]
fn test_run_waits_for_real_time_to_pass() {
    init_tracing();
    let rt = RuntimeBuilder::new()
        .frame_interval(Duration::from_millis(2))
        .build();
    let flushed = flag_finalizer(&rt);

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep_ms(20.0)).await?;
            cx.await_op(sleep_ms(10.0)).await?;
            Ok(Value::from("done"))
        }),
        vec![],
    )
    .unwrap();

    let started = Instant::now();
    let value = rt.run().unwrap();

    assert_eq!(value, Value::from("done"));
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert!(flushed.get());
    assert_eq!(rt.live_tasks(), 0);
}

#[test]
fn test_run_reports_a_root_that_can_never_resume() {
    init_tracing();
    let rt = RuntimeBuilder::new().build();
    let flushed = flag_finalizer(&rt);

    let root = rt
        .start(
            script_fn(|cx, _| async move {
                // Drops its continuation without resuming it.
                cx.await_op(Thunk::new(|_, _cb| Ok(()))).await
            }),
            vec![],
        )
        .unwrap();

    assert_eq!(rt.status(root), Some(TaskStatus::Suspended));

    let err = rt.run().unwrap_err();
    assert!(matches!(err, RuntimeError::Stalled { suspended: 1 }), "{err:?}");
    assert!(flushed.get(), "Finalizers run even when the loop gives up");
}

#[test]
fn test_run_while_stops_when_the_host_quits() {
    init_tracing();
    let rt = RuntimeBuilder::new().build();
    let flushed = flag_finalizer(&rt);

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep_ms(60_000.0)).await?;
            Ok(Value::Nil)
        }),
        vec![],
    )
    .unwrap();

    let frames = Rc::new(RefCell::new(0));
    let counter = frames.clone();
    let status = rt
        .run_while(move || {
            *counter.borrow_mut() += 1;
            *counter.borrow() <= 2
        })
        .unwrap();

    assert_eq!(status, HostStatus::Pending);
    assert_eq!(*frames.borrow(), 3);
    assert!(flushed.get());
    assert_eq!(rt.root_status(), Some(TaskStatus::Suspended));
}

#[test]
fn test_run_without_a_root_task() {
    let rt = RuntimeBuilder::new().build();

    assert!(matches!(rt.run(), Err(RuntimeError::NotStarted)));
    assert!(matches!(rt.run_while(|| true), Err(RuntimeError::NotStarted)));
    assert!(!rt.finalizers_flushed());
}

#[test]
fn test_tick_after_completion_keeps_reporting_the_result() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep_ms(5.0)).await?;
            Ok(Value::Number(7.0))
        }),
        vec![],
    )
    .unwrap();

    assert!(!rt.is_done());
    assert_eq!(rt.root_status(), Some(TaskStatus::Suspended));

    let done = HostStatus::Done(Value::Number(7.0));
    assert_eq!(rt.tick(start + Duration::from_millis(5)).unwrap(), done);
    assert_eq!(rt.tick(start + Duration::from_millis(50)).unwrap(), done);
    assert_eq!(rt.root_status(), Some(TaskStatus::Completed));
    assert!(rt.is_done());
}

#[test]
fn test_dropping_the_runtime_with_suspended_tasks() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep_ms(100.0)).await?;
            Ok(Value::Nil)
        }),
        vec![],
    )
    .unwrap();

    assert_eq!(rt.pending_timers(), 1);
    drop(rt);
}
