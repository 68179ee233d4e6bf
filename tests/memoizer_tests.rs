//! Integration Tests for the Memoizer
//!
//! Drives wrapped functions through a pinned clock and checks hits, misses,
//! refreshes and expiry transitions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use std::collections::HashMap;

use ttl_memo::{
    cached, Arg, CallArgs, ManualClock, MemoError, MemoOptions, Memoized, REFRESH_PARAM,
};

// == Helper Functions ==

/// Wraps a function returning the next counter value on every invocation.
fn counting_memo(
    maxage: f64,
    clock: &ManualClock,
) -> Memoized<impl Fn(&CallArgs) -> Result<u64, String>, u64, String> {
    let counter = Arc::new(AtomicU64::new(0));
    cached(
        move |_: &CallArgs| Ok(counter.fetch_add(1, Ordering::SeqCst)),
        MemoOptions::new(maxage).unwrap(),
    )
    .unwrap()
    .with_clock(Arc::new(clock.clone()))
}

fn call(memo: &Memoized<impl Fn(&CallArgs) -> Result<u64, String>, u64, String>, args: CallArgs) -> u64 {
    memo.call(args).unwrap()
}

// == Argument Hashing ==

#[test]
fn test_args_hashing() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);

    assert_eq!(call(&f, CallArgs::new()), 0);
    assert_eq!(call(&f, CallArgs::new().arg(1)), 1);
    assert_eq!(call(&f, CallArgs::new().arg(1).arg(2)), 2);
    assert_eq!(call(&f, CallArgs::new().arg(1)), 1);
    assert_eq!(call(&f, CallArgs::new().arg(1).kwarg(REFRESH_PARAM, true)), 3);
    assert_eq!(call(&f, CallArgs::new().arg(1).arg(2)), 2);

    assert_eq!(call(&f, CallArgs::new().kwarg("a", 1).kwarg("b", 2)), 4);
    assert_eq!(call(&f, CallArgs::new().kwarg("b", 2).kwarg("a", 1)), 4);
    assert_eq!(
        call(&f, CallArgs::new().kwarg("b", 2).kwarg("a", 1).kwarg(REFRESH_PARAM, 1)),
        5
    );
    assert_eq!(call(&f, CallArgs::new()), 0);

    assert_eq!(call(&f, CallArgs::new().arg(2)), 6);
    assert_eq!(call(&f, CallArgs::new().arg(1)), 3);
}

#[test]
fn test_args_collision() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);

    assert_eq!(call(&f, CallArgs::new().kwarg("x", "\0B")), 0);
    assert_eq!(call(&f, CallArgs::new().kwarg("x", "\0\0C")), 1);
}

#[test]
fn test_falsy_refresh_is_a_plain_call() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);

    assert_eq!(call(&f, CallArgs::new().arg(1)), 0);
    assert_eq!(call(&f, CallArgs::new().arg(1).kwarg(REFRESH_PARAM, false)), 0);
    assert_eq!(call(&f, CallArgs::new().arg(1).kwarg(REFRESH_PARAM, 0)), 0);
}

#[test]
fn test_positional_and_keyword_forms_are_separate() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);

    assert_eq!(call(&f, CallArgs::new().arg(1)), 0);
    assert_eq!(call(&f, CallArgs::new().kwarg("x", 1)), 1);
}

#[test]
fn test_serialized_arguments_keyed_by_content() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);

    let mut by_id = HashMap::new();
    by_id.insert(1u32, "a");
    let mut by_name = HashMap::new();
    by_name.insert("1".to_string(), "a");

    assert_eq!(call(&f, CallArgs::new().arg(Arg::from_serialize(&by_id))), 0);
    assert_eq!(call(&f, CallArgs::new().arg(Arg::from_serialize(&by_name))), 1);
    assert_eq!(call(&f, CallArgs::new().arg(Arg::from_serialize(&f64::NAN))), 2);
    assert_eq!(call(&f, CallArgs::new().arg(Arg::from_serialize(&None::<f64>))), 3);
    assert_eq!(call(&f, CallArgs::new().arg(Arg::from_serialize(&f64::NAN))), 2);
    assert_eq!(call(&f, CallArgs::new().arg(0.0)), 4);
    assert_eq!(call(&f, CallArgs::new().arg(-0.0)), 5);
}

// == Expiry ==

#[test]
fn test_expiry() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);

    // populate
    assert_eq!(call(&f, CallArgs::new()), 0);
    assert_eq!(call(&f, CallArgs::new().arg(1)), 1);
    assert_eq!(call(&f, CallArgs::new().kwarg("a", 1).kwarg("b", 2)), 2);

    // verify expiry
    clock.set(301.0);
    assert_eq!(call(&f, CallArgs::new()), 3);
    assert_eq!(call(&f, CallArgs::new().arg(1)), 4);
    assert_eq!(call(&f, CallArgs::new().kwarg("a", 1).kwarg("b", 2)), 5);

    // verify maxage, entries were restamped at 301
    clock.set(299.0);
    assert_eq!(call(&f, CallArgs::new()), 3);
    assert_eq!(call(&f, CallArgs::new().arg(1)), 4);
    assert_eq!(call(&f, CallArgs::new().kwarg("a", 1).kwarg("b", 2)), 5);
}

#[test]
fn test_expiry_boundary() {
    let clock = ManualClock::new(1_000.0);
    let f = counting_memo(300.0, &clock);

    assert_eq!(call(&f, CallArgs::new().arg("x")), 0);

    clock.set(1_300.0);
    assert_eq!(call(&f, CallArgs::new().arg("x")), 0, "Hit at created + maxage");

    clock.set(1_301.0);
    assert_eq!(call(&f, CallArgs::new().arg("x")), 1, "Miss at created + maxage + 1");
}

#[test]
fn test_zero_maxage() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(0.0, &clock);

    assert_eq!(call(&f, CallArgs::new()), 0);
    assert_eq!(call(&f, CallArgs::new()), 0);

    clock.set(1.0);
    assert_eq!(call(&f, CallArgs::new()), 1);
    clock.set(2.0);
    assert_eq!(call(&f, CallArgs::new()), 2);
}

#[test]
fn test_default_maxage() {
    let clock = ManualClock::new(0.0);
    let counter = Arc::new(AtomicU64::new(0));
    let inner = counter.clone();
    let f = cached(
        move |_: &CallArgs| Ok::<_, ()>(inner.fetch_add(1, Ordering::SeqCst)),
        MemoOptions::default(),
    )
    .unwrap()
    .with_clock(Arc::new(clock.clone()));

    assert_eq!(f.maxage(), 300.0);
    assert_eq!(f.call(CallArgs::new()), Ok(0));

    clock.set(300.0);
    assert_eq!(f.call(CallArgs::new()), Ok(0));

    clock.set(300.5);
    assert_eq!(f.call(CallArgs::new()), Ok(1));
}

// == Failures ==

#[test]
fn test_exceptions() {
    let clock = ManualClock::new(0.0);
    let counter = Arc::new(AtomicU64::new(0));
    let f = cached(
        move |_: &CallArgs| {
            // fails only on the first call, which must not be cached
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err("division by zero")
            } else {
                Ok(1.0 / n as f64)
            }
        },
        MemoOptions::new(0.0).unwrap(),
    )
    .unwrap()
    .with_clock(Arc::new(clock.clone()));

    assert_eq!(f.call(CallArgs::new()), Err("division by zero"));
    assert_eq!(f.call(CallArgs::new()), Ok(1.0));

    clock.set(1.0);
    assert_eq!(f.call(CallArgs::new()), Ok(0.5));
    assert_eq!(f.stats().failures, 1);
}

#[test]
fn test_error_value_passes_through_unchanged() {
    #[derive(Debug, Clone, PartialEq)]
    struct SolverError {
        code: u16,
        message: String,
    }

    let f = cached(
        |args: &CallArgs| -> Result<u64, SolverError> {
            Err(SolverError {
                code: 503,
                message: format!("unavailable for {} args", args.len()),
            })
        },
        MemoOptions::default(),
    )
    .unwrap();

    let err = f.call(CallArgs::new().arg(1).arg(2)).unwrap_err();
    assert_eq!(
        err,
        SolverError {
            code: 503,
            message: "unavailable for 2 args".to_string(),
        }
    );
    assert!(f.is_empty());
}

// == Configuration ==

#[test]
fn test_negative_maxage_fails_at_wrap_time() {
    let result = cached(
        |_: &CallArgs| Ok::<_, ()>(0),
        MemoOptions { maxage: -1.0 },
    );
    assert!(matches!(result, Err(MemoError::InvalidMaxAge(_))));
}

// == Isolation ==

#[test]
fn test_each_wrapper_has_its_own_store() {
    let clock = ManualClock::new(0.0);
    let f = counting_memo(300.0, &clock);
    let g = counting_memo(300.0, &clock);

    assert_eq!(call(&f, CallArgs::new().arg(1)), 0);
    assert_eq!(call(&g, CallArgs::new().arg(1)), 0);
    assert_eq!(call(&g, CallArgs::new().arg(1)), 0);
    assert_eq!(f.len(), 1);
    assert_eq!(g.len(), 1);
    assert_eq!(g.stats().hits, 1);
}
