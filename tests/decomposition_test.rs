//! Multi-rank decomposition invariants over the in-process SPMD backend.
//!
//! A cubic 6x6x6-cell box over 8 ranks in a 2x2x2 process grid gives every
//! rank a 3x3x3 block on the initial regular split.

mod common;

use cellflow::partition::Partitioner;

use common::{boundary_in_global_ids, build_partitioner, local_cells, midpoint, run_spmd};

#[test]
fn eight_ranks_cover_the_grid_exactly() {
    let views = run_spmd(8, |comm| {
        let p = build_partitioner(comm, 6.0);
        (p.n_local_cells(), p.n_ghost_cells(), local_cells(p.as_ref()))
    });

    let mut owners = vec![0u32; 216];
    for (n_local, n_ghost, locals) in &views {
        assert_eq!(*n_local, 27);
        assert!(*n_ghost > 0);
        for &g in locals {
            owners[g] += 1;
        }
    }
    assert!(
        owners.iter().all(|&c| c == 1),
        "every global cell must be owned by exactly one rank"
    );
}

#[test]
fn neighbor_list_has_the_seven_other_ranks() {
    let views = run_spmd(8, |comm| {
        let p = build_partitioner(comm, 6.0);
        let rank = p.position_to_rank(midpoint(p.as_ref(), p.global_cell(0))).unwrap();
        let mut neighbors: Vec<usize> = (0..p.n_neighbors()).map(|i| p.neighbor_rank(i)).collect();
        neighbors.sort_unstable();
        (rank, neighbors)
    });
    for (rank, (own, neighbors)) in views.into_iter().enumerate() {
        assert_eq!(own, rank);
        let expected: Vec<usize> = (0..8).filter(|&r| r != rank).collect();
        assert_eq!(neighbors, expected);
    }
}

#[test]
fn ghost_exchange_is_symmetric() {
    let views = run_spmd(8, |comm| {
        let p = build_partitioner(comm, 6.0);
        boundary_in_global_ids(p.as_ref())
    });

    for (rank, entries) in views.iter().enumerate() {
        for (dest, send, recv) in entries {
            let peer = views[*dest]
                .iter()
                .find(|(d, _, _)| *d == rank)
                .unwrap_or_else(|| panic!("rank {dest} has no entry back to {rank}"));
            assert_eq!(send, &peer.2, "send of {rank}->{dest} must equal recv of {dest}->{rank}");
            assert_eq!(recv, &peer.1, "recv of {rank}->{dest} must equal send of {dest}->{rank}");
        }
    }
}

#[test]
fn exchange_lists_are_sorted_and_deterministic() {
    let views = run_spmd(8, |comm| {
        let first = build_partitioner(comm.clone(), 6.0);
        let second = build_partitioner(comm, 6.0);
        (
            boundary_in_global_ids(first.as_ref()),
            boundary_in_global_ids(second.as_ref()),
            first.boundary_info().to_vec(),
            second.boundary_info().to_vec(),
        )
    });

    for (globals_a, globals_b, raw_a, raw_b) in views {
        assert_eq!(globals_a, globals_b);
        assert_eq!(raw_a, raw_b, "identical grid state must give bitwise identical descriptors");
        for (_, send, recv) in &globals_a {
            assert!(send.windows(2).all(|w| w[0] < w[1]), "send sorted by global id");
            assert!(recv.windows(2).all(|w| w[0] < w[1]), "recv sorted by global id");
        }
    }
}

#[test]
fn midpoint_resolution_round_trip() {
    let views = run_spmd(8, |comm| {
        let p = build_partitioner(comm, 6.0);
        let owners: Vec<usize> = (0..216)
            .map(|g| p.position_to_rank(midpoint(p.as_ref(), g)).expect("midpoint must resolve"))
            .collect();
        let local_indices: Vec<usize> = local_cells(p.as_ref())
            .iter()
            .map(|&g| {
                p.position_to_cell_index(midpoint(p.as_ref(), g))
                    .expect("local midpoint must give a cell index")
            })
            .collect();
        (owners, local_cells(p.as_ref()), local_indices, p.n_local_cells())
    });

    // Every rank resolves every midpoint to the same owner.
    for view in &views[1..] {
        assert_eq!(view.0, views[0].0);
    }
    for (rank, (owners, locals, local_indices, n_local)) in views.iter().enumerate() {
        for &g in locals {
            assert_eq!(owners[g], rank, "cell {g} must resolve to its owner");
        }
        for &idx in local_indices {
            assert!(idx < *n_local);
        }
    }
}

#[test]
fn ghost_layer_across_a_face() {
    // Two ranks split the box along x; a position just across rank 0's
    // upper x face lands in rank 1's first cell column.
    let pos = [3.2, 0.5, 0.5];
    let views = run_spmd(2, move |comm| {
        let p = build_partitioner(comm, 6.0);
        let cell: usize = (3 * 6) * 6; // cell coordinates (3, 0, 0)
        (
            p.n_neighbors(),
            p.position_to_rank(pos).unwrap(),
            p.position_to_neighidx(pos).ok(),
            p.position_to_cell_index(pos).is_ok(),
            boundary_in_global_ids(p.as_ref()),
            cell,
        )
    });

    let (n_neigh, owner, neighidx, is_local, boundary, cell) = &views[0];
    assert_eq!(*n_neigh, 1);
    assert_eq!(*owner, 1);
    assert_eq!(*neighidx, Some(0));
    assert!(!*is_local, "a ghost-layer position must not resolve to a local cell");
    let (dest, _, recv) = &boundary[0];
    assert_eq!(*dest, 1);
    assert!(recv.contains(cell), "the cell across the face must be in the recv list");

    let (_, owner, neighidx, is_local, _, _) = &views[1];
    assert_eq!(*owner, 1);
    assert!(neighidx.is_none(), "own position has no neighbor index");
    assert!(*is_local);
}
