//! End-to-end scenarios from spec.md §8, run against the deterministic
//! `ManualPlatform` fake clock.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use deferred_runloop::config::OrchestratorBuilder;
use deferred_runloop::error::Message;
use deferred_runloop::platform::ManualPlatform;
use deferred_runloop::rate::RateKey;
use deferred_runloop::work_item::OnceTag;

/// Installs a `tracing` subscriber that writes through the test harness's
/// captured output instead of stdout, so `cargo test -- --nocapture` shows
/// the orchestrator's `debug!`/`trace!` flush transitions alongside each
/// scenario's assertions. Idempotent: later calls in other tests in this
/// binary see the subscriber already installed and no-op.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn orchestrator() -> Rc<deferred_runloop::Orchestrator<ManualPlatform>> {
    init_tracing();
    Rc::new(
        OrchestratorBuilder::new(["actions", "render"])
            .platform(ManualPlatform::new())
            .build()
            .unwrap(),
    )
}

/// Scenario 1: `run(() => schedule('render', fnA); schedule('actions', fnB))`
/// executes as outer, fnB, fnA.
#[test]
fn scenario_1_later_queue_refeeds_earlier_one() {
    let orchestrator = orchestrator();
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));

    let orch_outer = orchestrator.clone();
    let log_outer = log.clone();
    orchestrator
        .run(Rc::new(move || {
            log_outer.borrow_mut().push("outer");
            let log_a = log_outer.clone();
            orch_outer
                .schedule(
                    "render",
                    Rc::new(move || {
                        log_a.borrow_mut().push("a");
                        Ok(())
                    }),
                )
                .unwrap();
            let log_b = log_outer.clone();
            orch_outer
                .schedule(
                    "actions",
                    Rc::new(move || {
                        log_b.borrow_mut().push("b");
                        Ok(())
                    }),
                )
                .unwrap();
            Ok(())
        }))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["outer", "b", "a"]);
}

/// Scenario 2: two `scheduleOnce` calls for the same identity collapse into
/// one invocation carrying the latest argument.
#[test]
fn scenario_2_schedule_once_dedups_to_latest() {
    let orchestrator = orchestrator();
    let log = Rc::new(RefCell::new(Vec::<i32>::new()));
    let tag = OnceTag(1);

    orchestrator.ensure_instance().unwrap();
    let log1 = log.clone();
    orchestrator
        .schedule_once(
            "actions",
            tag,
            Rc::new(move || {
                log1.borrow_mut().push(1);
                Ok(())
            }),
        )
        .unwrap();
    let log2 = log.clone();
    orchestrator
        .schedule_once(
            "actions",
            tag,
            Rc::new(move || {
                log2.borrow_mut().push(2);
                Ok(())
            }),
        )
        .unwrap();
    orchestrator.end().unwrap();

    assert_eq!(*log.borrow(), vec![2]);
}

/// Scenario 3: two `later` timers fire in deadline order as the host clock
/// advances.
#[test]
fn scenario_3_later_timers_fire_in_deadline_order() {
    let orchestrator = orchestrator();
    let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));

    let log_fn = log.clone();
    orchestrator.later(
        Duration::from_millis(10),
        Rc::new(move || {
            log_fn.borrow_mut().push("fn");
            Ok(())
        }),
    );
    let log_fn2 = log.clone();
    orchestrator.later(
        Duration::from_millis(5),
        Rc::new(move || {
            log_fn2.borrow_mut().push("fn2");
            Ok(())
        }),
    );

    orchestrator.platform().advance(Duration::from_millis(5));
    orchestrator.pump().unwrap();
    assert_eq!(*log.borrow(), vec!["fn2"]);

    orchestrator.platform().advance(Duration::from_millis(5));
    orchestrator.pump().unwrap();
    assert_eq!(*log.borrow(), vec!["fn2", "fn"]);
}

/// Scenario 4: two debounce calls 50ms apart push the deadline out; fn
/// fires once, 100ms after the *second* call.
#[test]
fn scenario_4_debounce_extends_wait() {
    let orchestrator = orchestrator();
    let log = Rc::new(RefCell::new(0u32));
    let key = RateKey(1);

    let log1 = log.clone();
    orchestrator
        .debounce(
            key,
            Duration::from_millis(100),
            false,
            Rc::new(move || {
                *log1.borrow_mut() += 1;
                Ok(())
            }),
        )
        .unwrap();

    orchestrator.platform().advance(Duration::from_millis(50));
    orchestrator.pump().unwrap();
    assert_eq!(*log.borrow(), 0);

    let log2 = log.clone();
    orchestrator
        .debounce(
            key,
            Duration::from_millis(100),
            false,
            Rc::new(move || {
                *log2.borrow_mut() += 1;
                Ok(())
            }),
        )
        .unwrap();

    orchestrator.platform().advance(Duration::from_millis(99));
    orchestrator.pump().unwrap();
    assert_eq!(*log.borrow(), 0);

    orchestrator.platform().advance(Duration::from_millis(1));
    orchestrator.pump().unwrap();
    assert_eq!(*log.borrow(), 1);
}

/// Scenario 5: throttle with `immediate=true` fires once up front, then
/// suppresses until the window elapses.
#[test]
fn scenario_5_throttle_immediate_then_suppressed() {
    let orchestrator = orchestrator();
    let log = Rc::new(RefCell::new(0u32));
    let key = RateKey(7);

    for _ in 0..3 {
        let log = log.clone();
        orchestrator
            .throttle(
                key,
                Duration::from_millis(100),
                true,
                Rc::new(move || {
                    *log.borrow_mut() += 1;
                    Ok(())
                }),
            )
            .unwrap();
        orchestrator.platform().advance(Duration::from_millis(10));
        orchestrator.pump().unwrap();
    }

    assert_eq!(*log.borrow(), 1);
}

/// Scenario 6: with `on_error` configured, a throwing work item diverts to
/// the handler and subsequent `run` calls behave normally.
#[test]
fn scenario_6_on_error_contains_failures() {
    init_tracing();
    let errors = Rc::new(RefCell::new(0u32));
    let errors_handler = errors.clone();
    let orchestrator = OrchestratorBuilder::new(["actions"])
        .platform(ManualPlatform::new())
        .on_error(Rc::new(move |_err| {
            *errors_handler.borrow_mut() += 1;
        }))
        .build()
        .unwrap();

    orchestrator
        .run(Rc::new(|| Err(deferred_runloop::RunLoopError::work(Message("boom".into())))))
        .unwrap();
    assert_eq!(*errors.borrow(), 1);

    let log = Rc::new(RefCell::new(false));
    let log2 = log.clone();
    orchestrator
        .run(Rc::new(move || {
            *log2.borrow_mut() = true;
            Ok(())
        }))
        .unwrap();
    assert!(*log.borrow());
}
