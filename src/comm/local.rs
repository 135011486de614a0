//! In-process multi-rank communication backend.
//!
//! Runs P ranks as threads of one process, sharing a `LocalWorld`. Each
//! collective posts the local contribution into a slot table and meets the
//! other ranks at a barrier, so the trait methods have true collective
//! semantics without a network. The single-rank world degenerates to no-op
//! barriers.

use std::sync::{Arc, Barrier, Mutex};

use super::Communicator;

/// Shared state of an in-process world: one slot per rank plus a barrier.
pub struct LocalWorld {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f64>>>,
}

impl LocalWorld {
    pub fn new(size: usize) -> Arc<Self> {
        assert!(size > 0, "world size must be positive");
        Arc::new(Self {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
        })
    }

    /// Communicator handles for all ranks of this world, indexed by rank.
    pub fn communicators(self: Arc<Self>) -> Vec<LocalComm> {
        (0..self.size)
            .map(|rank| LocalComm {
                world: Arc::clone(&self),
                rank,
            })
            .collect()
    }

    /// Every rank posts `local`; returns a copy of all ranks' contributions.
    ///
    /// Two barriers: one after the write phase so all slots are filled, one
    /// after the read phase so no rank starts the next collective while
    /// another is still reading.
    fn exchange(&self, rank: usize, local: Vec<f64>) -> Vec<Vec<f64>> {
        {
            let mut slots = self.slots.lock().unwrap();
            slots[rank] = local;
        }
        self.barrier.wait();
        let all = self.slots.lock().unwrap().clone();
        self.barrier.wait();
        all
    }
}

/// One rank's handle onto a `LocalWorld`.
#[derive(Clone)]
pub struct LocalComm {
    world: Arc<LocalWorld>,
    rank: usize,
}

impl LocalComm {
    /// Convenience constructor for a single-rank world.
    pub fn solo() -> Self {
        let world = LocalWorld::new(1);
        world.communicators().remove(0)
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.world.size
    }

    fn allgather_point(&self, local: [f64; 3]) -> Vec<[f64; 3]> {
        let all = self.world.exchange(self.rank, local.to_vec());
        all.iter().map(|v| [v[0], v[1], v[2]]).collect()
    }

    fn allreduce_sum_i64(&self, local: i64) -> i64 {
        let all = self.world.exchange(self.rank, vec![local as f64]);
        all.iter().map(|v| v[0] as i64).sum()
    }

    fn neighbor_allgather(&self, neighbors: &[usize], local: &[f64]) -> Vec<Vec<f64>> {
        let all = self.world.exchange(self.rank, local.to_vec());
        neighbors.iter().map(|&r| all[r].clone()).collect()
    }

    fn barrier(&self) {
        self.world.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn spawn_world<T, F>(size: usize, f: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(LocalComm) -> T + Send + Sync + 'static,
    {
        let world = LocalWorld::new(size);
        let f = Arc::new(f);
        let handles: Vec<_> = world
            .communicators()
            .into_iter()
            .map(|comm| {
                let f = Arc::clone(&f);
                thread::spawn(move || (*f)(comm))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    }

    #[test]
    fn solo_world_collectives() {
        let comm = LocalComm::solo();
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.allreduce_sum_i64(7), 7);
        assert_eq!(comm.allgather_point([1.0, 2.0, 3.0]), vec![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn allgather_orders_by_rank() {
        let results = spawn_world(4, |comm| {
            let r = comm.rank() as f64;
            comm.allgather_point([r, 10.0 * r, 0.0])
        });
        for gathered in results {
            for (rank, point) in gathered.iter().enumerate() {
                assert_eq!(point[0], rank as f64);
                assert_eq!(point[1], 10.0 * rank as f64);
            }
        }
    }

    #[test]
    fn allreduce_sums_over_ranks() {
        let results = spawn_world(3, |comm| comm.allreduce_sum_i64(comm.rank() as i64 + 1));
        assert_eq!(results, vec![6, 6, 6]);
    }

    #[test]
    fn neighbor_allgather_selects_in_list_order() {
        let results = spawn_world(3, |comm| {
            let me = comm.rank() as f64;
            // Everyone exchanges with the two other ranks, higher rank first.
            let neighbors: Vec<usize> = (0..3).rev().filter(|&r| r != comm.rank()).collect();
            (neighbors.clone(), comm.neighbor_allgather(&neighbors, &[me, me + 0.5]))
        });
        for (neighbors, blocks) in results {
            assert_eq!(blocks.len(), 2);
            for (i, &nbr) in neighbors.iter().enumerate() {
                assert_eq!(blocks[i], vec![nbr as f64, nbr as f64 + 0.5]);
            }
        }
    }

    #[test]
    fn consecutive_collectives_do_not_interfere() {
        let results = spawn_world(2, |comm| {
            let a = comm.allreduce_sum_i64(1);
            let b = comm.allreduce_sum_i64(10);
            (a, b)
        });
        assert_eq!(results, vec![(2, 20), (2, 20)]);
    }
}
