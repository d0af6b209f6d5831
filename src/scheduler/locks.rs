//! Vertex try-locks over the two-ring of an operand.
//!
//! A worker locks the operand vertices, then their one-ring, then the
//! one-ring of that, each level in ascending id order. Locks never block:
//! the first vertex owned by another worker releases everything taken so
//! far and the attempt is deferred.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::topology::TetMesh;

/// Owner table shared by the workers of one pass.
#[derive(Debug, Default)]
pub struct RingLocks {
    owners: DashMap<usize, usize>,
}

/// Locks held by one worker; released on drop.
#[derive(Debug)]
pub struct RegionGuard<'a> {
    locks: &'a RingLocks,
    held: Vec<usize>,
}

impl RegionGuard<'_> {
    /// Locked vertices, in acquisition order.
    pub fn vertices(&self) -> &[usize] {
        &self.held
    }
}

impl Drop for RegionGuard<'_> {
    fn drop(&mut self) {
        for v in self.held.drain(..) {
            self.locks.owners.remove(&v);
        }
    }
}

impl RingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices currently locked by any worker.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    fn try_lock(&self, v: usize, owner: usize, held: &mut Vec<usize>) -> bool {
        match self.owners.entry(v) {
            Entry::Occupied(e) => *e.get() == owner,
            Entry::Vacant(e) => {
                e.insert(owner);
                held.push(v);
                true
            }
        }
    }

    /// Lock the closed two-ring of `seeds` for `owner`, or nothing at all.
    pub fn try_lock_region(
        &self,
        mesh: &TetMesh,
        owner: usize,
        seeds: &[usize],
    ) -> Option<RegionGuard<'_>> {
        let mut guard = RegionGuard {
            locks: self,
            held: Vec::new(),
        };
        let mut level: Vec<usize> = seeds.to_vec();
        level.sort_unstable();
        level.dedup();
        for depth in 0..3 {
            if depth > 0 {
                level = mesh.closed_star_vertices(&level);
            }
            for &v in &level {
                if !self.try_lock(v, owner, &mut guard.held) {
                    log::trace!("worker {owner}: vertex {v} is busy");
                    return None;
                }
            }
        }
        Some(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fan() -> TetMesh {
        // Two tetrahedra sharing face (1, 2, 3), then a third hanging off vertex 4.
        TetMesh::from_tets(7, &[[0, 1, 2, 3], [4, 1, 3, 2], [4, 5, 6, 3]]).unwrap()
    }

    #[test]
    fn region_covers_two_ring_and_releases_on_drop() {
        let mesh = fan();
        let locks = RingLocks::new();
        {
            let guard = locks.try_lock_region(&mesh, 0, &[0]).expect("free region");
            let mut got = guard.vertices().to_vec();
            got.sort_unstable();
            assert_eq!(got, vec![0, 1, 2, 3, 4, 5, 6]);
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn overlapping_regions_conflict() {
        let mesh = fan();
        let locks = RingLocks::new();
        let first = locks.try_lock_region(&mesh, 0, &[5, 6]).expect("free region");
        assert!(locks.try_lock_region(&mesh, 1, &[0]).is_none());
        // The failed attempt left nothing behind.
        assert_eq!(locks.len(), first.vertices().len());
        drop(first);
        assert!(locks.try_lock_region(&mesh, 1, &[0]).is_some());
    }
}
