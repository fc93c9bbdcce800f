//! Transform pipeline applied to values before encoding
//!
//! Each stage sees the current value, its key and the full snapshot, and
//! returns a replacement or `None` to drop the key from the persisted record.
//! Once a stage drops a key the remaining stages are skipped.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::snapshot::Snapshot;

/// One forward stage of the pipeline
///
/// Stages run in insertion order. A stage only sees values: once an earlier
/// stage returned `None` the key is dropped for this cycle and no later stage
/// is called, so a stage can never bring a dropped key back.
pub trait Transform<V>: Send + Sync {
    /// Rewrite `value` stored under `key`; `None` means "do not persist"
    fn inbound(&self, value: Arc<V>, key: &str, state: &Snapshot<V>) -> Option<Arc<V>>;
}

impl<V, T> Transform<V> for Box<T>
where
    T: Transform<V> + ?Sized,
{
    fn inbound(&self, value: Arc<V>, key: &str, state: &Snapshot<V>) -> Option<Arc<V>> {
        (**self).inbound(value, key, state)
    }
}

/// Transform backed by a closure, see [`from_fn`]
pub struct FromFn<V, F> {
    f: F,
    _value: PhantomData<fn(Arc<V>) -> Option<Arc<V>>>,
}

/// Build a transform from a closure
pub fn from_fn<V, F>(f: F) -> FromFn<V, F>
where
    F: Fn(Arc<V>, &str, &Snapshot<V>) -> Option<Arc<V>> + Send + Sync,
{
    FromFn {
        f,
        _value: PhantomData,
    }
}

impl<V, F> Transform<V> for FromFn<V, F>
where
    F: Fn(Arc<V>, &str, &Snapshot<V>) -> Option<Arc<V>> + Send + Sync,
{
    fn inbound(&self, value: Arc<V>, key: &str, state: &Snapshot<V>) -> Option<Arc<V>> {
        (self.f)(value, key, state)
    }
}

impl<V, F> fmt::Debug for FromFn<V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn").finish_non_exhaustive()
    }
}

/// Restricts an inner transform to a subset of keys
///
/// Keys outside the scope pass through untouched. Unlike the instance-level
/// [`KeyFilter`](crate::filter::KeyFilter), no key is exempt from the whitelist.
pub struct Scoped<T> {
    inner: T,
    whitelist: Option<BTreeSet<String>>,
    blacklist: Option<BTreeSet<String>>,
}

impl<T> Scoped<T> {
    /// Apply `inner` to every key until narrowed
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            whitelist: None,
            blacklist: None,
        }
    }

    /// Only apply to these keys
    pub fn whitelist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.whitelist = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Never apply to these keys
    pub fn blacklist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    fn applies_to(&self, key: &str) -> bool {
        let listed = self.whitelist.as_ref().map_or(true, |w| w.contains(key));
        let excluded = self.blacklist.as_ref().is_some_and(|b| b.contains(key));
        listed && !excluded
    }
}

impl<V, T> Transform<V> for Scoped<T>
where
    T: Transform<V>,
{
    fn inbound(&self, value: Arc<V>, key: &str, state: &Snapshot<V>) -> Option<Arc<V>> {
        if self.applies_to(key) {
            self.inner.inbound(value, key, state)
        } else {
            Some(value)
        }
    }
}

impl<T> fmt::Debug for Scoped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped")
            .field("whitelist", &self.whitelist)
            .field("blacklist", &self.blacklist)
            .finish_non_exhaustive()
    }
}

/// Ordered list of transform stages
pub struct Pipeline<V> {
    stages: Vec<Box<dyn Transform<V>>>,
}

impl<V> Pipeline<V> {
    /// Create an empty pipeline (identity)
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage
    pub fn push(&mut self, stage: Box<dyn Transform<V>>) {
        self.stages.push(stage);
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check whether the pipeline has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `initial` through every stage, left to right
    pub fn run(&self, key: &str, initial: Arc<V>, state: &Snapshot<V>) -> Option<Arc<V>> {
        self.stages
            .iter()
            .try_fold(initial, |value, stage| stage.inbound(value, key, state))
    }
}

impl<V> Default for Pipeline<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Pipeline<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn double() -> impl Transform<i64> {
        from_fn::<i64, _>(|value, _key, _state| Some(Arc::new(*value * 2)))
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let pipeline: Pipeline<i64> = Pipeline::new();
        let value = Arc::new(7);
        let out = pipeline.run("a", Arc::clone(&value), &Snapshot::new()).unwrap();
        assert!(Arc::ptr_eq(&value, &out));
    }

    #[test]
    fn test_stages_run_in_order() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(double()));
        pipeline.push(Box::new(from_fn::<i64, _>(|value, _key, _state| {
            Some(Arc::new(*value + 1))
        })));

        let out = pipeline.run("a", Arc::new(5), &Snapshot::new()).unwrap();
        assert_eq!(*out, 11);
    }

    #[test]
    fn test_absent_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(from_fn::<i64, _>(|_value, key, _state| {
            (key != "secret").then(|| Arc::new(0))
        })));
        pipeline.push(Box::new(from_fn::<i64, _>(move |value, _key, _state| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(value)
        })));

        assert!(pipeline.run("secret", Arc::new(1), &Snapshot::new()).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.run("public", Arc::new(1), &Snapshot::new()).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stage_sees_full_snapshot() {
        let state: Snapshot<i64> = [("a", 1), ("b", 10)].into_iter().collect();
        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(from_fn::<i64, _>(|value, _key, state| {
            let b = state.get("b").map_or(0, |b| **b);
            Some(Arc::new(*value + b))
        })));

        let out = pipeline.run("a", Arc::clone(state.get("a").unwrap()), &state).unwrap();
        assert_eq!(*out, 11);
    }

    #[test]
    fn test_scoped_only_touches_listed_keys() {
        let scoped = Scoped::new(double()).whitelist(["a", "b"]).blacklist(["b"]);
        let state = Snapshot::new();

        assert_eq!(*scoped.inbound(Arc::new(3), "a", &state).unwrap(), 6);
        assert_eq!(*scoped.inbound(Arc::new(3), "b", &state).unwrap(), 3);
        assert_eq!(*scoped.inbound(Arc::new(3), "c", &state).unwrap(), 3);
    }
}
