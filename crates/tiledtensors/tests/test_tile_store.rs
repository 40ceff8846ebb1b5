//! Tile store behavior across ranks of a local cluster.

use std::sync::Arc;

use tiledtensors::{
    DistArray, LocalCluster, PmapPolicy, Range, RoundRobinPmap, RuntimeConfig, Tensor, Tile,
    TileStore, TiledError, TiledRange,
};

fn cluster(ranks: usize) -> LocalCluster {
    LocalCluster::new(RuntimeConfig::default().with_ranks(ranks)).unwrap()
}

fn tile_for(ordinal: usize) -> Tile<f64> {
    Tile::new(Tensor::from_fn(Range::from_extent(&[2, 2]), |i| {
        (ordinal * 100 + i[0] + 2 * i[1]) as f64
    }))
}

#[test]
fn test_remote_get_returns_owner_value() {
    let results = cluster(3)
        .run(|world| {
            let pmap = Arc::new(RoundRobinPmap::new(9, world.rank(), world.size()).unwrap());
            let store = TileStore::<f64>::new(&world, pmap).unwrap();

            // ask for remote tiles before their owners produced them
            let futures: Vec<_> = (0..9).map(|o| store.get(o).unwrap()).collect();
            for o in (world.rank()..9).step_by(world.size()) {
                store.insert(o, tile_for(o)).unwrap();
            }
            futures.iter().map(|f| f.wait().unwrap()).collect::<Vec<_>>()
        })
        .unwrap();

    for tiles in results {
        for (o, tile) in tiles.iter().enumerate() {
            assert_eq!(tile, &tile_for(o));
        }
    }
}

#[test]
fn test_ownership_errors() {
    let results = cluster(2)
        .run(|world| {
            let pmap = PmapPolicy::Blocked.build(4, world.rank(), world.size()).unwrap();
            let store = TileStore::<f64>::new(&world, pmap).unwrap();
            let mine = if world.rank() == 0 { 0 } else { 2 };
            let theirs = if world.rank() == 0 { 3 } else { 1 };

            let first = store.insert(mine, tile_for(mine));
            let second = store.insert(mine, tile_for(mine));
            let remote = store.insert(theirs, tile_for(theirs));
            let outside = store.get(4).map(|_| ());
            (first, second, remote, outside, world.rank())
        })
        .unwrap();

    for (first, second, remote, outside, rank) in results {
        let (mine, theirs, owner) = if rank == 0 { (0, 3, 1) } else { (2, 1, 0) };
        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(TiledError::AlreadySet { ordinal: mine }));
        assert_eq!(
            remote,
            Err(TiledError::NotLocal {
                ordinal: theirs,
                owner,
                rank
            })
        );
        assert!(matches!(outside, Err(TiledError::OutOfRange { .. })));
    }
}

#[test]
fn test_producer_tasks_run_on_owner_pool() {
    let results = cluster(2)
        .run(|world| {
            let pmap = PmapPolicy::Hashed.build(16, world.rank(), world.size()).unwrap();
            let local: Vec<usize> = pmap.local_ordinals().to_vec();
            let store = TileStore::<f64>::new(&world, pmap).unwrap();
            for &o in &local {
                store
                    .insert_future(o, async move { Ok(tile_for(o)) })
                    .unwrap();
            }
            store.wait_local().unwrap();
            let ready = local.iter().all(|&o| store.is_ready(o).unwrap());
            let sum: f64 = (0..16)
                .map(|o| store.get(o).unwrap().wait().unwrap().sum().unwrap())
                .sum();
            (ready, sum)
        })
        .unwrap();

    let expected: f64 = (0..16).map(|o| tile_for(o).sum().unwrap()).sum();
    for (ready, sum) in results {
        assert!(ready);
        assert_eq!(sum, expected);
    }
}

#[test]
fn test_abandoned_remote_request() {
    let results = cluster(2)
        .run(|world| {
            let pmap = PmapPolicy::Blocked.build(2, world.rank(), world.size()).unwrap();
            let store = TileStore::<f64>::new(&world, pmap).unwrap();
            let other = 1 - world.rank();
            let pending = store.get(other).unwrap();
            world.barrier().unwrap();
            // the owner gives up on the tile everyone is waiting for
            store.abandon(world.rank()).unwrap();
            pending.wait()
        })
        .unwrap();

    assert_eq!(results[0], Err(TiledError::Abandoned { ordinal: 1 }));
    assert_eq!(results[1], Err(TiledError::Abandoned { ordinal: 0 }));
}

#[test]
fn test_owner_drop_keeps_tiles_readable() {
    let results = cluster(2)
        .run(|world| {
            let trange = TiledRange::from_boundaries(vec![vec![0, 2, 4, 6, 8]]).unwrap();
            let a = DistArray::from_fn(&world, trange, |i| i[0] as f64 + 0.5).unwrap();
            a.fence().unwrap();
            if world.rank() == 0 {
                drop(a);
                world.barrier().unwrap();
                None
            } else {
                // tiles 0 and 1 belong to rank 0, which no longer holds the array
                world.barrier().unwrap();
                let first = a.find(0).unwrap().wait();
                let second = a.find(1).unwrap().wait();
                Some((first, second))
            }
        })
        .unwrap();

    assert!(results[0].is_none());
    let (first, second) = results.into_iter().nth(1).flatten().unwrap();
    assert_eq!(first.unwrap().tensor().unwrap().data(), &[0.5, 1.5]);
    assert_eq!(second.unwrap().tensor().unwrap().data(), &[2.5, 3.5]);
}

#[test]
fn test_dropped_owner_abandons_unproduced_tile() {
    let results = cluster(2)
        .run(|world| {
            let pmap = PmapPolicy::Blocked.build(2, world.rank(), world.size()).unwrap();
            let store = TileStore::<f64>::new(&world, pmap).unwrap();
            if world.rank() == 0 {
                drop(store);
                world.barrier().unwrap();
                None
            } else {
                world.barrier().unwrap();
                Some(store.get(0).unwrap().wait())
            }
        })
        .unwrap();

    assert_eq!(results[1], Some(Err(TiledError::Abandoned { ordinal: 0 })));
}
