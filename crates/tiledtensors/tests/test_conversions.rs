//! Dense/sparse conversions, tile type conversion and redistribution.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tiledtensors::{
    DistArray, LocalCluster, PmapPolicy, RuntimeConfig, Shape, SparseShape, Tensor, TiledError,
    TiledRange, World,
};

fn cluster(ranks: usize) -> LocalCluster {
    LocalCluster::new(RuntimeConfig::default().with_ranks(ranks)).unwrap()
}

fn trange() -> TiledRange {
    TiledRange::from_boundaries(vec![vec![0, 3, 4, 8, 10], vec![0, 2, 5, 6]]).unwrap()
}

fn collect_tiles(array: &DistArray<f64>) -> Vec<Option<Vec<f64>>> {
    (0..array.trange().volume())
        .map(|o| {
            if array.is_zero(o).unwrap() {
                None
            } else {
                Some(array.find(o).unwrap().wait().unwrap().tensor().unwrap().data().to_vec())
            }
        })
        .collect()
}

#[test]
fn test_one_dimensional_zero_tile() {
    let world = World::single(RuntimeConfig::default()).unwrap();
    let trange = TiledRange::from_boundaries(vec![vec![0, 2, 5, 7]]).unwrap();
    let a = DistArray::<f64>::with_sparse_tiles(&world, trange, &[0, 2]).unwrap();
    a.init_tiles(|range| Tensor::filled(range, 4.0)).unwrap();
    a.fence().unwrap();

    assert!(a.is_zero(1).unwrap());
    assert!(!a.is_zero(0).unwrap());
    assert!(!a.is_zero(2).unwrap());

    let d = a.to_dense().unwrap();
    d.fence().unwrap();
    let t1 = d.find(1).unwrap().wait().unwrap();
    assert_eq!(t1.tensor().unwrap().len(), 3);
    assert_eq!(t1.tensor().unwrap().data(), &[0.0, 0.0, 0.0]);
    assert_eq!(t1.range().unwrap().lobound(), &[2]);
}

#[test]
fn test_sparse_dense_round_trip() {
    let results = cluster(3)
        .run(|world| {
            let a = DistArray::<f64>::new(&world, trange(), None).unwrap();
            // tiles in tile-column 1 are small
            a.init_tiles(|range| {
                let small = range.lobound()[1] == 2;
                Tensor::from_fn(range, |i| {
                    let v = (i[0] + 3 * i[1]) as f64 + 1.0;
                    if small { v * 1e-9 } else { v }
                })
            })
            .unwrap();
            a.fence().unwrap();
            let threshold = 1e-3;

            let s = a.to_sparse(threshold).unwrap();
            s.fence().unwrap();
            let d = s.to_dense().unwrap();
            d.fence().unwrap();
            let s2 = d.to_sparse(threshold).unwrap();
            s2.fence().unwrap();

            (
                collect_tiles(&a),
                collect_tiles(&d),
                collect_tiles(&s),
                s2.shape().clone(),
                s.shape().clone(),
            )
        })
        .unwrap();

    for (a, d, s, s2_shape, s_shape) in results {
        let volume = a.len();
        for o in 0..volume {
            let tile = a[o].as_ref().unwrap();
            let norm = tile.iter().map(|x| x * x).sum::<f64>().sqrt();
            let dense = d[o].as_ref().unwrap();
            if norm > 1e-3 {
                assert_eq!(dense, tile);
                assert_eq!(s[o].as_ref(), Some(tile));
            } else {
                assert!(dense.iter().all(|&x| x == 0.0));
                assert!(s[o].is_none());
            }
        }
        // the occupied tiles survive a second round trip
        let s_ord: Vec<_> = s_shape.as_sparse().unwrap().nonzero_ordinals().collect();
        let s2_ord: Vec<_> = s2_shape.as_sparse().unwrap().nonzero_ordinals().collect();
        assert_eq!(s_ord, s2_ord);
        assert_eq!(s_ord.len(), 8);
    }
}

#[test]
fn test_unsynchronized_random_shape_rejected() {
    let results = cluster(2)
        .run(|world| {
            let fine = TiledRange::from_boundaries(vec![(0..=64).collect(), (0..=4).collect()]).unwrap();
            let mut rng = StdRng::seed_from_u64(100 + world.rank() as u64);
            let own = Shape::Sparse(SparseShape::random(fine.volume(), 0.5, &mut rng));
            let rejected = DistArray::<f64>::new(&world, fine.clone(), Some(own.clone())).map(|_| ());

            let shared = own.synchronize(&world, 0).unwrap();
            let accepted = DistArray::<f64>::new(&world, fine, Some(shared)).map(|_| ());
            (rejected, accepted)
        })
        .unwrap();

    for (rejected, accepted) in results {
        assert_eq!(rejected, Err(TiledError::InconsistentShape { rank: 1 }));
        assert_eq!(accepted, Ok(()));
    }
}

#[test]
fn test_tile_type_round_trip() {
    let results = cluster(2)
        .run(|world| {
            let a = DistArray::from_fn(&world, trange(), |i| (i[0] * 7 + i[1]) as f64 - 20.0).unwrap();
            let ints = a.to_new_tile_type(|x: f64| x as i64).unwrap();
            let back = ints.to_new_tile_type(|x: i64| x as f64).unwrap();
            back.fence().unwrap();
            (collect_tiles(&a), collect_tiles(&back), ints.shape() == a.shape())
        })
        .unwrap();

    for (a, back, same_shape) in results {
        assert_eq!(a, back);
        assert!(same_shape);
    }
}

#[test]
fn test_redistribute_preserves_values() {
    let results = cluster(3)
        .run(|world| {
            let shape = SparseShape::from_tile_list(trange().volume(), &[0, 1, 5, 6, 10, 11]).unwrap();
            let a = DistArray::<f64>::new(&world, trange(), Some(Shape::Sparse(shape))).unwrap();
            a.fill_random(42).unwrap();
            a.fence().unwrap();

            let pmap = PmapPolicy::RoundRobin
                .build(trange().volume(), world.rank(), world.size())
                .unwrap();
            let b = a.redistribute(pmap).unwrap();
            b.fence().unwrap();
            let local_ok = b
                .local_nonzero_ordinals()
                .iter()
                .all(|&o| b.owner(o).unwrap() == world.rank());
            (collect_tiles(&a), collect_tiles(&b), local_ok)
        })
        .unwrap();

    for (a, b, local_ok) in results {
        assert_eq!(a, b);
        assert!(local_ok);
    }
}
