use pong::{
    Continuation, HostStatus, RuntimeBuilder, TaskError, Value, script_fn, sleep, sleep_ms,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_sleep_zero_waits_for_the_next_tick() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep(Duration::ZERO)).await?;
            Ok(Value::Bool(true))
        }),
        vec![],
    )
    .unwrap();

    assert!(!rt.is_done(), "sleep(0) must not resume synchronously");
    assert_eq!(rt.pending_timers(), 1);
    assert_eq!(
        rt.tick(start).unwrap(),
        HostStatus::Done(Value::Bool(true))
    );
}

#[test]
fn test_equal_deadlines_fire_in_registration_order() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();
    let order = Rc::new(RefCell::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let order = order.clone();
        rt.drive(
            script_fn(move |cx, _| {
                let order = order.clone();
                async move {
                    cx.await_op(sleep_ms(20.0)).await?;
                    order.borrow_mut().push(name);
                    Ok(Value::Nil)
                }
            }),
            None,
            vec![],
        )
        .unwrap();
    }

    rt.tick(start + ms(20)).unwrap();
    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_earlier_deadline_fires_first() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();
    let order = Rc::new(RefCell::new(Vec::new()));

    for (name, delay) in [("slow", 30.0), ("fast", 10.0)] {
        let order = order.clone();
        rt.drive(
            script_fn(move |cx, _| {
                let order = order.clone();
                async move {
                    cx.await_op(sleep_ms(delay)).await?;
                    order.borrow_mut().push(name);
                    Ok(Value::Nil)
                }
            }),
            None,
            vec![],
        )
        .unwrap();
    }

    rt.tick(start + ms(100)).unwrap();
    assert_eq!(*order.borrow(), vec!["fast", "slow"]);
    assert_eq!(rt.live_tasks(), 0);
}

#[test]
fn test_timers_scheduled_while_firing_wait_for_the_next_tick() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep_ms(10.0)).await?;
            cx.await_op(sleep_ms(0.0)).await?;
            Ok(Value::Nil)
        }),
        vec![],
    )
    .unwrap();

    // Fires the first sleep; the zero sleep it schedules is due but not fired.
    assert_eq!(rt.tick(start + ms(10)).unwrap(), HostStatus::Pending);
    assert_eq!(rt.pending_timers(), 1);
    assert_eq!(rt.tick(start + ms(10)).unwrap(), HostStatus::Done(Value::Nil));
}

#[test]
fn test_sleep_deadline_uses_clock_at_invocation() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();
    let nap = sleep_ms(50.0);

    rt.start(
        script_fn(move |cx, _| {
            let nap = nap.clone();
            async move {
                cx.await_op(nap.clone()).await?;
                let woke = cx.now();
                cx.await_op(nap).await?;
                Ok(Value::Number((cx.now() - woke).as_millis() as f64))
            }
        }),
        vec![],
    )
    .unwrap();

    // Ticks arrive late; each sleep counts from when it was started.
    rt.tick(start + ms(70)).unwrap();
    assert_eq!(rt.next_deadline(), Some(start + ms(120)));
    assert_eq!(
        rt.tick(start + ms(120)).unwrap(),
        HostStatus::Done(Value::Number(50.0))
    );
}

#[test]
fn test_clock_never_moves_backwards() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();

    rt.start(
        script_fn(|cx, _| async move {
            cx.await_op(sleep_ms(30.0)).await?;
            Ok(Value::Nil)
        }),
        vec![],
    )
    .unwrap();

    rt.tick(start + ms(20)).unwrap();
    rt.tick(start + ms(5)).unwrap();
    assert_eq!(rt.now(), start + ms(20));
    assert!(!rt.is_done());
}

#[test]
fn test_invalid_sleep_duration_fails_the_await() {
    let rt = RuntimeBuilder::new().build();

    rt.start(
        script_fn(|cx, _| async move { cx.await_op(sleep_ms(-5.0)).await }),
        vec![],
    )
    .unwrap();

    assert!(matches!(rt.root_outcome(), Some(Err(TaskError::Script(_)))));
    assert_eq!(rt.pending_timers(), 0);
}

#[test]
fn test_sleep_past_the_end_of_the_clock_fails_the_await() {
    let rt = RuntimeBuilder::new().build();

    rt.start(
        script_fn(|cx, _| async move {
            let huge = cx.await_op(sleep_ms(1e22)).await.unwrap_err();
            let max = cx.await_op(sleep(Duration::MAX)).await.unwrap_err();
            Ok(Value::List(vec![Value::Error(huge), Value::Error(max)]))
        }),
        vec![],
    )
    .unwrap();

    let out_of_range = Value::Error(TaskError::script("sleep: duration out of range"));
    assert_eq!(
        rt.root_outcome(),
        Some(Ok(Value::List(vec![out_of_range.clone(), out_of_range])))
    );
    assert_eq!(rt.pending_timers(), 0);
}

#[test]
fn test_fractional_milliseconds_are_kept() {
    let start = Instant::now();
    let rt = RuntimeBuilder::new().start_time(start).build();
    let fired = Rc::new(RefCell::new(false));
    let flag = fired.clone();

    sleep_ms(1.5)
        .invoke(&rt, Continuation::terminal(move |_| *flag.borrow_mut() = true))
        .unwrap();

    let deadline = rt.next_deadline().unwrap();
    assert!(deadline > start + ms(1) && deadline < start + ms(2));
    rt.tick(start + ms(1)).unwrap();
    assert!(!*fired.borrow());
    rt.tick(start + ms(2)).unwrap();
    assert!(*fired.borrow());
}
