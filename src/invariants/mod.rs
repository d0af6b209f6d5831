//! Composable pre- and postconditions for local operations.
//!
//! An [`Invariant`] has two extension points:
//! - `before` runs against the pre-edit state and may record what it needs
//!   in the [`OperationCache`];
//! - `after` runs against the mutated state and compares it with the cache.
//!
//! `Ok(false)` is an ordinary rejection. `Err` is reserved for contract
//! violations that must stop the scheduler.
//!
//! Combinators:
//! - [`AndInvariants`]: all must pass, first failure short-circuits;
//! - [`OrInvariants`]: first success wins;
//! - [`MinSequence`]: score equivalent variants and keep the cheapest;
//! - [`first_success`]: operation-level OR over alternative operands.

pub mod builtin;

use std::sync::Arc;

use crate::adapt::config::RemeshConfig;
use crate::data::mesh::AttributedMesh;
use crate::geometry::oracles::Oracles;
use crate::mesh_error::MeshOpsError;
use crate::ops::cache::OperationCache;

pub use builtin::{
    EnergyNonIncrease, EnvelopeContainment, LinkCondition, ManifoldFaces, NoInversion, Reject,
    TopologyPreservation, UniformTag,
};

/// Result of one invariant check.
pub type Check = Result<bool, MeshOpsError>;

/// Read-only state every invariant may consult.
#[derive(Clone, Copy)]
pub struct InvariantContext<'a> {
    pub mesh: &'a AttributedMesh,
    pub oracles: &'a Oracles,
    pub config: &'a RemeshConfig,
}

impl<'a> InvariantContext<'a> {
    pub fn new(mesh: &'a AttributedMesh, oracles: &'a Oracles, config: &'a RemeshConfig) -> Self {
        Self {
            mesh,
            oracles,
            config,
        }
    }
}

/// One feasibility or acceptance rule.
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    fn before(&self, _ctx: &InvariantContext<'_>, _cache: &mut OperationCache) -> Check {
        Ok(true)
    }

    fn after(&self, _ctx: &InvariantContext<'_>, _cache: &OperationCache) -> Check {
        Ok(true)
    }
}

/// All invariants must hold; evaluation stops at the first failure.
#[derive(Clone, Default)]
pub struct AndInvariants {
    items: Vec<Arc<dyn Invariant>>,
}

impl AndInvariants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, invariant: impl Invariant + 'static) -> Self {
        self.items.push(Arc::new(invariant));
        self
    }

    pub fn push(&mut self, invariant: Arc<dyn Invariant>) {
        self.items.push(invariant);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.items.iter().map(|i| i.name()).collect()
    }

    /// Name of the first invariant whose `before` fails.
    pub fn first_failing_before(
        &self,
        ctx: &InvariantContext<'_>,
        cache: &mut OperationCache,
    ) -> Result<Option<&'static str>, MeshOpsError> {
        for inv in &self.items {
            if !inv.before(ctx, cache)? {
                return Ok(Some(inv.name()));
            }
        }
        Ok(None)
    }

    /// Name of the first invariant whose `after` fails.
    pub fn first_failing_after(
        &self,
        ctx: &InvariantContext<'_>,
        cache: &OperationCache,
    ) -> Result<Option<&'static str>, MeshOpsError> {
        for inv in &self.items {
            if !inv.after(ctx, cache)? {
                return Ok(Some(inv.name()));
            }
        }
        Ok(None)
    }
}

impl Invariant for AndInvariants {
    fn name(&self) -> &'static str {
        "all_of"
    }

    fn before(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
        Ok(self.first_failing_before(ctx, cache)?.is_none())
    }

    fn after(&self, ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        Ok(self.first_failing_after(ctx, cache)?.is_none())
    }
}

/// Passes when any member passes; an empty sequence passes.
#[derive(Clone, Default)]
pub struct OrInvariants {
    items: Vec<Arc<dyn Invariant>>,
}

impl OrInvariants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, invariant: impl Invariant + 'static) -> Self {
        self.items.push(Arc::new(invariant));
        self
    }
}

impl Invariant for OrInvariants {
    fn name(&self) -> &'static str {
        "any_of"
    }

    fn before(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
        if self.items.is_empty() {
            return Ok(true);
        }
        for inv in &self.items {
            if inv.before(ctx, cache)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn after(&self, ctx: &InvariantContext<'_>, cache: &OperationCache) -> Check {
        if self.items.is_empty() {
            return Ok(true);
        }
        for inv in &self.items {
            if inv.after(ctx, cache)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Equivalent variants of one edit, of which only the cheapest survives.
#[derive(Clone, Debug)]
pub struct MinSequence<T> {
    variants: Vec<T>,
}

impl<T> MinSequence<T> {
    pub fn new(variants: Vec<T>) -> Self {
        Self { variants }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Keep the variant with the lowest score. `None` scores are rejected;
    /// ties keep the earlier variant.
    pub fn into_best<F>(self, mut score: F) -> Option<(T, f64)>
    where
        F: FnMut(&T) -> Option<f64>,
    {
        let mut best: Option<(T, f64)> = None;
        for variant in self.variants {
            let Some(s) = score(&variant) else { continue };
            if best.as_ref().is_none_or(|(_, b)| s.total_cmp(b).is_lt()) {
                best = Some((variant, s));
            }
        }
        best
    }
}

/// Try alternatives in order and return the first success, or the last
/// failure when none succeeds. `None` only for an empty list.
pub fn first_success<A, T, E, I, F, S>(
    alternatives: I,
    mut attempt: F,
    is_success: S,
) -> Result<Option<T>, E>
where
    I: IntoIterator<Item = A>,
    F: FnMut(A) -> Result<T, E>,
    S: Fn(&T) -> bool,
{
    let mut last = None;
    for alt in alternatives {
        let result = attempt(alt)?;
        if is_success(&result) {
            return Ok(Some(result));
        }
        last = Some(result);
    }
    Ok(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::OperationKind;
    use crate::topology::validation::NonManifoldHandling;

    struct Fixed(&'static str, bool);

    impl Invariant for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn before(&self, _ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Check {
            cache.seeds.push(cache.seeds.len());
            Ok(self.1)
        }
    }

    fn mesh() -> AttributedMesh {
        AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2, 3]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh")
    }

    #[test]
    fn and_short_circuits_and_reports_name() {
        let m = mesh();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let all = AndInvariants::new()
            .with(Fixed("a", true))
            .with(Fixed("b", false))
            .with(Fixed("c", true));
        let mut cache = OperationCache::new(OperationKind::Split);
        assert_eq!(all.first_failing_before(&ctx, &mut cache).unwrap(), Some("b"));
        assert_eq!(cache.seeds, vec![0, 1]);
        assert_eq!(all.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn or_takes_first_success() {
        let m = mesh();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let any = OrInvariants::new().with(Fixed("x", false)).with(Fixed("y", true));
        let mut cache = OperationCache::new(OperationKind::Split);
        assert!(any.before(&ctx, &mut cache).unwrap());
        let none = OrInvariants::new().with(Fixed("x", false));
        assert!(!none.before(&ctx, &mut cache).unwrap());
    }

    #[test]
    fn min_sequence_keeps_lowest_valid_score() {
        let seq = MinSequence::new(vec![3.0, f64::NAN, 1.0, 2.0, 1.0]);
        let best = seq.into_best(|&x: &f64| (!x.is_nan()).then_some(x));
        assert_eq!(best, Some((1.0, 1.0)));
        let empty: MinSequence<f64> = MinSequence::new(vec![5.0]);
        assert_eq!(empty.into_best(|_| None), None);
    }

    #[test]
    fn first_success_returns_last_failure() {
        let r: Result<_, ()> = first_success([1, 2, 3], |x| Ok(x * 10), |&y| y == 20);
        assert_eq!(r, Ok(Some(20)));
        let r: Result<_, ()> = first_success([1, 3], |x| Ok(x * 10), |&y| y == 20);
        assert_eq!(r, Ok(Some(30)));
    }
}
