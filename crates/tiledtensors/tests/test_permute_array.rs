//! Permutation of distributed arrays.

use tiledtensors::{
    DistArray, LocalCluster, Permutation, RuntimeConfig, Shape, SparseShape, TiledRange, World,
};

fn trange() -> TiledRange {
    TiledRange::from_boundaries(vec![vec![0, 2, 5], vec![0, 1, 3, 4], vec![0, 3, 5]]).unwrap()
}

fn element(i: &[usize]) -> f64 {
    (i[0] * 100 + i[1] * 10 + i[2]) as f64
}

/// Every stored element of `array`, keyed by its global coordinate.
fn elements(array: &DistArray<f64>) -> Vec<(Vec<usize>, f64)> {
    let mut out = Vec::new();
    for o in 0..array.trange().volume() {
        if array.is_zero(o).unwrap() {
            continue;
        }
        let tile = array.find(o).unwrap().wait().unwrap();
        let t = tile.tensor().unwrap();
        for e in 0..t.len() {
            out.push((t.range().index(e).unwrap().to_vec(), t.data()[e]));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

#[test]
fn test_permute_moves_elements() {
    let world = World::single(RuntimeConfig::default()).unwrap();
    let a = DistArray::from_fn(&world, trange(), element).unwrap();
    let perm = Permutation::new(vec![2, 0, 1]).unwrap();
    let b = a.permute(&perm).unwrap();
    b.fence().unwrap();

    // result dimension perm[d] is source dimension d
    for (idx, value) in elements(&b) {
        let source = perm.apply_inverse(&idx).unwrap();
        assert_eq!(value, element(&source));
    }
    assert_eq!(elements(&b).len(), trange().element_volume());
}

#[test]
fn test_permute_composition() {
    let results = LocalCluster::new(RuntimeConfig::default().with_ranks(3))
        .unwrap()
        .run(|world| {
            let shape = SparseShape::from_tile_list(trange().volume(), &[0, 3, 4, 7, 11]).unwrap();
            let a = DistArray::<f64>::new(&world, trange(), Some(Shape::Sparse(shape))).unwrap();
            a.fill_random(5).unwrap();
            a.fence().unwrap();

            let p = Permutation::new(vec![1, 2, 0]).unwrap();
            let q = Permutation::new(vec![0, 2, 1]).unwrap();
            let twice = a.permute(&p).unwrap().permute(&q).unwrap();
            let once = a.permute(&q.compose(&p).unwrap()).unwrap();
            twice.fence().unwrap();
            once.fence().unwrap();

            (
                elements(&twice),
                elements(&once),
                twice.shape() == once.shape(),
                twice.trange() == once.trange(),
            )
        })
        .unwrap();

    for (twice, once, same_shape, same_trange) in results {
        assert!(same_shape);
        assert!(same_trange);
        assert_eq!(twice, once);
        // tiles 0, 3, 4, 7 and 11 hold 6 + 18 + 6 + 6 + 6 elements
        assert_eq!(twice.len(), 42);
    }
}
