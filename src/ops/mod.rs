//! Local operations as a before / mutate / after state machine.
//!
//! Every attempt runs the same pipeline:
//!
//! 1. reject stale handles;
//! 2. read the operand and fill the [`OperationCache`];
//! 3. run the `before` half of the invariant set;
//! 4. mutate the mesh through a [`MeshTransaction`](crate::data::mesh::MeshTransaction);
//! 5. run the `after` half;
//! 6. commit, or roll the transaction back exactly.
//!
//! Rejections are ordinary [`Outcome`]s. Only contract violations and broken
//! stores surface as [`MeshOpsError`], and the mesh is rolled back before
//! they are returned.

pub mod cache;
pub mod collapse;
pub mod smooth;
pub mod split;
pub mod swap;

use std::sync::Arc;

use crate::data::attributes::TetAttributes;
use crate::invariants::{
    AndInvariants, EnergyNonIncrease, EnvelopeContainment, Invariant, InvariantContext,
    LinkCondition, ManifoldFaces, NoInversion, TopologyPreservation, UniformTag, first_success,
};
use crate::mesh_error::MeshOpsError;
use crate::topology::local::LOCAL_FACES;
use crate::topology::{FaceKey, SimplexKind, TetMesh, Tuple};

pub use cache::OperationCache;

/// The local edits the engine knows.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Collapse,
    Split,
    /// Three tetrahedra around an interior edge become two.
    Swap32,
    /// Two tetrahedra across an interior face become three.
    Swap23,
    Swap44,
    Swap56,
    /// Relocate one vertex inside its star.
    Smooth,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Collapse,
        OperationKind::Split,
        OperationKind::Swap32,
        OperationKind::Swap23,
        OperationKind::Swap44,
        OperationKind::Swap56,
        OperationKind::Smooth,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Collapse => "collapse",
            OperationKind::Split => "split",
            OperationKind::Swap32 => "swap_3_2",
            OperationKind::Swap23 => "swap_2_3",
            OperationKind::Swap44 => "swap_4_4",
            OperationKind::Swap56 => "swap_5_6",
            OperationKind::Smooth => "smooth",
        }
    }

    /// Simplex kind of the operand.
    pub fn operand(self) -> SimplexKind {
        match self {
            OperationKind::Swap23 => SimplexKind::Face,
            OperationKind::Smooth => SimplexKind::Vertex,
            _ => SimplexKind::Edge,
        }
    }

    /// Number of tetrahedra an edge swap expects around its edge.
    pub fn edge_valence(self) -> Option<usize> {
        match self {
            OperationKind::Swap32 => Some(3),
            OperationKind::Swap44 => Some(4),
            OperationKind::Swap56 => Some(5),
            _ => None,
        }
    }

    /// Vertices of the operand; the centre of the lock region.
    pub fn operand_vertices(self, mesh: &TetMesh, tuple: &Tuple) -> Option<Vec<usize>> {
        match self.operand() {
            SimplexKind::Vertex => mesh.is_valid(tuple).then(|| vec![tuple.vid()]),
            SimplexKind::Face => Some(mesh.tuple_face(tuple)?.vertices().to_vec()),
            _ => Some(mesh.tuple_edge_vertices(tuple)?.to_vec()),
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one attempt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpState {
    Proposed,
    PreconditionChecked,
    Mutated,
    PostconditionChecked,
    Committed,
    RolledBack,
}

/// Why an attempt left the mesh untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The handle no longer names a live simplex.
    Stale,
    /// A feasibility check failed before anything was written.
    Precondition(&'static str),
    /// The edit was applied, judged and undone.
    Rollback(&'static str),
}

/// What a committed edit touched, for work renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpReport {
    pub kind: OperationKind,
    /// Tetrahedra written by the edit.
    pub new_tets: Vec<usize>,
    /// Operand vertices after the edit.
    pub vertices: Vec<usize>,
    pub new_vertex: Option<usize>,
    pub removed_vertex: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Committed(OpReport),
    Rejected(Rejection),
}

impl Outcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed(_))
    }

    pub fn report(&self) -> Option<&OpReport> {
        match self {
            Outcome::Committed(r) => Some(r),
            Outcome::Rejected(_) => None,
        }
    }

    /// Final state of the attempt.
    pub fn state(&self) -> OpState {
        match self {
            Outcome::Committed(_) => OpState::Committed,
            Outcome::Rejected(Rejection::Rollback(_)) => OpState::RolledBack,
            Outcome::Rejected(_) => OpState::Proposed,
        }
    }
}

/// Early exit of the operation-specific steps.
#[derive(Debug)]
pub(crate) enum Abort {
    Reject(&'static str),
    Fatal(MeshOpsError),
}

impl From<MeshOpsError> for Abort {
    fn from(e: MeshOpsError) -> Self {
        Abort::Fatal(e)
    }
}

/// An operation kind together with the invariants that guard it.
#[derive(Clone)]
pub struct Operation {
    kind: OperationKind,
    invariants: AndInvariants,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field("invariants", &self.invariants.names())
            .finish()
    }
}

impl Operation {
    /// The operation with its default invariant set.
    pub fn new(kind: OperationKind) -> Self {
        let invariants = match kind {
            OperationKind::Collapse => AndInvariants::new()
                .with(LinkCondition)
                .with(TopologyPreservation)
                .with(EnvelopeContainment)
                .with(NoInversion)
                .with(EnergyNonIncrease { strict: false })
                .with(ManifoldFaces),
            OperationKind::Split => AndInvariants::new()
                .with(TopologyPreservation)
                .with(EnvelopeContainment)
                .with(NoInversion)
                .with(ManifoldFaces),
            OperationKind::Swap32
            | OperationKind::Swap23
            | OperationKind::Swap44
            | OperationKind::Swap56 => AndInvariants::new()
                .with(UniformTag)
                .with(TopologyPreservation)
                .with(EnvelopeContainment)
                .with(NoInversion)
                .with(EnergyNonIncrease { strict: true })
                .with(ManifoldFaces),
            OperationKind::Smooth => AndInvariants::new()
                .with(EnvelopeContainment)
                .with(NoInversion)
                .with(EnergyNonIncrease { strict: false }),
        };
        Self { kind, invariants }
    }

    /// The operation with an explicit invariant set.
    pub fn with_invariants(kind: OperationKind, invariants: AndInvariants) -> Self {
        Self { kind, invariants }
    }

    /// Append a caller-supplied invariant after the defaults.
    pub fn with_extra(mut self, invariant: Arc<dyn Invariant>) -> Self {
        self.invariants.push(invariant);
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn invariants(&self) -> &AndInvariants {
        &self.invariants
    }

    /// Try the operation on `tuple`.
    ///
    /// A collapse is tried towards the tuple's other endpoint first and, if
    /// that is rejected, in the reverse direction.
    pub fn attempt(
        &self,
        ctx: &InvariantContext<'_>,
        tuple: Tuple,
        cache: OperationCache,
    ) -> Result<Outcome, MeshOpsError> {
        let topo = ctx.mesh.topology();
        let mut alternatives = vec![tuple];
        if self.kind == OperationKind::Collapse && topo.is_valid(&tuple) {
            alternatives.extend(topo.switch_vertex(&tuple));
        }
        let mut first = Some(cache);
        let outcome = first_success(
            alternatives,
            |t| {
                let cache = first
                    .take()
                    .unwrap_or_else(|| OperationCache::new(self.kind));
                self.run_once(ctx, t, cache)
            },
            Outcome::is_committed,
        )?;
        Ok(outcome.unwrap_or(Outcome::Rejected(Rejection::Stale)))
    }

    fn run_once(
        &self,
        ctx: &InvariantContext<'_>,
        tuple: Tuple,
        mut cache: OperationCache,
    ) -> Result<Outcome, MeshOpsError> {
        let mesh = ctx.mesh;
        let mut state = OpState::Proposed;
        log::trace!("[{}] {:?} {:?}", self.kind, state, tuple);

        if !mesh.topology().is_valid(&tuple) {
            return Ok(Outcome::Rejected(Rejection::Stale));
        }
        match self.prepare(ctx, tuple, &mut cache) {
            Ok(()) => {}
            Err(Abort::Reject(reason)) => {
                log::trace!("[{}] rejected: {reason}", self.kind);
                return Ok(Outcome::Rejected(Rejection::Precondition(reason)));
            }
            Err(Abort::Fatal(e)) => return Err(e),
        }
        if let Some(name) = self.invariants.first_failing_before(ctx, &mut cache)? {
            log::trace!("[{}] precondition `{name}` failed", self.kind);
            return Ok(Outcome::Rejected(Rejection::Precondition(name)));
        }
        state = transition(self.kind, state, OpState::PreconditionChecked);

        match self.mutate(ctx, &mut cache) {
            Ok(()) => {}
            Err(abort) => {
                mesh.rollback(std::mem::take(&mut cache.tx));
                transition(self.kind, state, OpState::RolledBack);
                return match abort {
                    Abort::Reject(reason) => Ok(Outcome::Rejected(Rejection::Rollback(reason))),
                    Abort::Fatal(e) => {
                        log::error!("[{}] aborted: {e}", self.kind);
                        Err(e)
                    }
                };
            }
        }
        state = transition(self.kind, state, OpState::Mutated);

        let verdict = self.invariants.first_failing_after(ctx, &cache);
        match verdict {
            Ok(None) => {}
            Ok(Some(name)) => {
                mesh.rollback(std::mem::take(&mut cache.tx));
                transition(self.kind, state, OpState::RolledBack);
                log::trace!("[{}] postcondition `{name}` failed", self.kind);
                return Ok(Outcome::Rejected(Rejection::Rollback(name)));
            }
            Err(e) => {
                mesh.rollback(std::mem::take(&mut cache.tx));
                transition(self.kind, state, OpState::RolledBack);
                log::error!("[{}] aborted: {e}", self.kind);
                return Err(e);
            }
        }
        state = transition(self.kind, state, OpState::PostconditionChecked);

        let report = OpReport {
            kind: self.kind,
            new_tets: cache.new_tets.clone(),
            vertices: cache.seeds_after(),
            new_vertex: cache.new_vertex,
            removed_vertex: cache
                .renamed
                .first()
                .map(|&(old, _)| old)
                .filter(|&old| !mesh.topology().is_vertex_live(old)),
        };
        mesh.commit(std::mem::take(&mut cache.tx));
        transition(self.kind, state, OpState::Committed);
        Ok(Outcome::Committed(report))
    }

    fn prepare(
        &self,
        ctx: &InvariantContext<'_>,
        tuple: Tuple,
        cache: &mut OperationCache,
    ) -> Result<(), Abort> {
        match self.kind {
            OperationKind::Collapse => collapse::prepare(ctx, tuple, cache),
            OperationKind::Split => split::prepare(ctx, tuple, cache),
            OperationKind::Swap23 => swap::prepare_face_swap(ctx, tuple, cache),
            OperationKind::Swap32 | OperationKind::Swap44 | OperationKind::Swap56 => {
                swap::prepare_edge_swap(ctx, tuple, cache)
            }
            OperationKind::Smooth => smooth::prepare(ctx, tuple, cache),
        }
    }

    fn mutate(&self, ctx: &InvariantContext<'_>, cache: &mut OperationCache) -> Result<(), Abort> {
        match self.kind {
            OperationKind::Collapse => collapse::mutate(ctx, cache),
            OperationKind::Split => split::mutate(ctx, cache),
            OperationKind::Swap23 => swap::mutate_face_swap(ctx, cache),
            OperationKind::Swap32 | OperationKind::Swap44 | OperationKind::Swap56 => {
                swap::mutate_edge_swap(ctx, cache)
            }
            OperationKind::Smooth => smooth::mutate(ctx, cache),
        }
    }
}

fn transition(kind: OperationKind, from: OpState, to: OpState) -> OpState {
    log::trace!("[{kind}] {from:?} -> {to:?}");
    to
}

// -----------------------------------------------------------------------------
// Helpers shared by the operations
// -----------------------------------------------------------------------------

/// Capture the tetrahedra an edit is about to replace.
pub(crate) fn record_old_tets(
    ctx: &InvariantContext<'_>,
    cache: &mut OperationCache,
    tets: Vec<usize>,
) -> Result<(), Abort> {
    let topo = ctx.mesh.topology();
    let mut vertices = Vec::with_capacity(tets.len());
    for &t in &tets {
        let vids = topo
            .tet_vertices(t)
            .ok_or_else(|| MeshOpsError::StaleHandle(format!("tetrahedron {t} vanished")))?;
        vertices.push(vids);
    }
    cache.old_tets = tets;
    cache.old_tet_vertices = vertices;
    Ok(())
}

/// Highest fresh energy over a set of live tetrahedra.
pub(crate) fn max_energy_of(ctx: &InvariantContext<'_>, tets: &[usize]) -> f64 {
    let topo = ctx.mesh.topology();
    tets.iter()
        .filter_map(|&t| topo.tet_vertices(t))
        .map(|vids| ctx.oracles.energy_of(ctx.mesh, vids))
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Replace `cache.old_tets` by `new`, storing fresh energies as quality.
pub(crate) fn write_new_tets(
    ctx: &InvariantContext<'_>,
    cache: &mut OperationCache,
    new: Vec<([usize; 4], TetAttributes)>,
) {
    let energies: Vec<f64> = new
        .iter()
        .map(|(vids, _)| ctx.oracles.energy_of(ctx.mesh, *vids))
        .collect();
    let new: Vec<([usize; 4], TetAttributes)> = new
        .into_iter()
        .zip(&energies)
        .map(|((vids, mut attrs), &e)| {
            attrs.quality = e;
            (vids, attrs)
        })
        .collect();
    cache.new_tets = ctx.mesh.replace_tets(&cache.old_tets, &new, &mut cache.tx);
    cache.new_energies = energies;
}

/// Faces of a set of vertex tuples, deduplicated.
pub(crate) fn faces_of(tets: &[[usize; 4]]) -> Vec<FaceKey> {
    let mut out: Vec<FaceKey> = tets
        .iter()
        .flat_map(|vids| LOCAL_FACES.map(|lf| FaceKey::from_array(lf.map(|j| vids[j]))))
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// `vids` with `from` replaced by `to`.
pub(crate) fn replace_vertex(vids: [usize; 4], from: usize, to: usize) -> [usize; 4] {
    vids.map(|v| if v == from { to } else { v })
}

/// Tetrahedron attributes of the first old tetrahedron, as a template for children.
pub(crate) fn parent_attrs(ctx: &InvariantContext<'_>, t: usize) -> Result<TetAttributes, Abort> {
    Ok(ctx.mesh.tet_attrs().try_get(&t)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::config::RemeshConfig;
    use crate::data::mesh::AttributedMesh;
    use crate::geometry::oracles::Oracles;
    use crate::invariants::Reject;
    use crate::topology::validation::NonManifoldHandling;

    fn two_tets() -> AttributedMesh {
        AttributedMesh::new(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 1.0, 1.0],
            ],
            &[[0, 1, 2, 3], [4, 1, 3, 2]],
            NonManifoldHandling::Error,
        )
        .expect("valid mesh")
    }

    #[test]
    fn names_are_stable() {
        let names: Vec<_> = OperationKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            ["collapse", "split", "swap_3_2", "swap_2_3", "swap_4_4", "swap_5_6", "smooth"]
        );
        assert_eq!(OperationKind::Smooth.operand(), SimplexKind::Vertex);
        assert_eq!(
            serde_json::to_string(&OperationKind::Swap44).unwrap(),
            "\"swap44\""
        );
    }

    #[test]
    fn default_invariant_sets() {
        assert_eq!(
            Operation::new(OperationKind::Split).invariants().names(),
            ["topology_preservation", "envelope_containment", "no_inversion", "manifold_faces"]
        );
        let swap = Operation::new(OperationKind::Swap23);
        assert_eq!(swap.invariants().names()[0], "uniform_tag");
        assert!(swap.invariants().names().contains(&"energy_decrease"));
        assert_eq!(
            Operation::new(OperationKind::Smooth).invariants().names(),
            ["envelope_containment", "no_inversion", "energy_non_increase"]
        );
    }

    #[test]
    fn stale_tuple_is_rejected_without_touching_the_mesh() {
        let m = two_tets();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let tuple = m.topology().tuple_from_vertices(1, 2).unwrap();
        let split = Operation::new(OperationKind::Split);
        let out = split
            .attempt(&ctx, tuple, OperationCache::new(OperationKind::Split))
            .unwrap();
        assert!(out.is_committed());
        let again = split
            .attempt(&ctx, tuple, OperationCache::new(OperationKind::Split))
            .unwrap();
        assert_eq!(again, Outcome::Rejected(Rejection::Stale));
    }

    #[test]
    fn reject_invariant_rolls_back_exactly() {
        let m = two_tets();
        let before = m.snapshot();
        let (oracles, config) = (Oracles::default(), RemeshConfig::default());
        let ctx = InvariantContext::new(&m, &oracles, &config);
        let op = Operation::new(OperationKind::Split).with_extra(Arc::new(Reject));
        let tuple = m.topology().tuple_from_vertices(1, 2).unwrap();
        let out = op
            .attempt(&ctx, tuple, OperationCache::new(OperationKind::Split))
            .unwrap();
        assert_eq!(out, Outcome::Rejected(Rejection::Rollback("reject")));
        assert_eq!(out.state(), OpState::RolledBack);
        assert_eq!(m.snapshot(), before);
    }
}
