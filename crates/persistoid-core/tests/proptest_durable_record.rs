//! Property-based tests for the durable record.
//!
//! Whatever sequence of updates and flushes a host performs, after a final
//! flush the stored record must equal: latest snapshot -> eligible keys ->
//! transform pipeline -> absent values dropped -> encoded.

mod common;

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use common::stored;
use persistoid_core::{from_fn, MemoryStorage, PersistConfig, Persistoid, Snapshot};

const KEYS: &[&str] = &["a", "b", "c", "d", "secret"];

#[derive(Debug, Clone)]
enum Op {
    Set(usize, i64),
    Remove(usize),
    Resend,
    Flush,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..KEYS.len(), -5i64..50).prop_map(|(k, v)| Op::Set(k, v)),
        1 => (0..KEYS.len()).prop_map(Op::Remove),
        1 => Just(Op::Resend),
        1 => Just(Op::Flush),
    ]
}

/// Record the engine should converge to for `state`
fn expected(state: &Snapshot<Value>) -> Value {
    let mut out = Map::new();
    for (key, value) in state.iter() {
        if key == "secret" {
            continue;
        }
        let n = value.as_i64().unwrap_or_default();
        if n >= 0 {
            out.insert(key.to_string(), json!(n * 2));
        }
    }
    Value::Object(out)
}

fn run_ops(ops: Vec<Op>) -> (Value, Value, u64) {
    tokio_test::block_on(async move {
        let storage = Arc::new(MemoryStorage::new());
        let config = PersistConfig::new("prop").with_blacklist(["secret"]);
        let mut persistoid = Persistoid::<Value>::builder(config)
            .transform(from_fn::<Value, _>(|value, _key, _state| {
                // Negative values are not persisted
                value
                    .as_i64()
                    .filter(|n| *n >= 0)
                    .map(|n| Arc::new(json!(n * 2)))
            }))
            .build(storage.clone())
            .unwrap();

        let mut state = Snapshot::new();
        for op in ops {
            match op {
                Op::Set(k, v) => {
                    state = state.with(KEYS[k], json!(v));
                    persistoid.update(state.clone());
                }
                Op::Remove(k) => {
                    state = state.without(KEYS[k]);
                    persistoid.update(state.clone());
                }
                Op::Resend => persistoid.update(state.clone()),
                Op::Flush => {
                    let _ = persistoid.flush();
                }
            }
        }

        persistoid.flush().await.unwrap();
        let record = if storage.peek("persist:prop").is_some() {
            stored(&storage, "persist:prop")
        } else {
            json!({})
        };
        (record, expected(&state), persistoid.writes_issued())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn durable_record_matches_latest_state(ops in prop::collection::vec(op(), 0..40)) {
        let (record, expected, _) = run_ops(ops);
        prop_assert_eq!(record, expected);
    }

    #[test]
    fn repeated_flush_adds_no_writes(ops in prop::collection::vec(op(), 1..20)) {
        let mut with_extra = ops.clone();
        with_extra.push(Op::Flush);
        with_extra.push(Op::Flush);

        let (_, _, base) = run_ops(ops);
        let (_, _, extra) = run_ops(with_extra);
        prop_assert_eq!(base, extra);
    }
}
