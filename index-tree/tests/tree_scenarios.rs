use index_tree::{
    CoordinateSystem, ElementIndex, Envelope, MemoryElementMapper, RTree, SharedRTree,
    SpatialPredicate, SpatialTree, SplitPolicy, TreeConfig, TreeError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn point(x: f64, y: f64) -> Envelope {
    Envelope::point(&[x, y]).unwrap()
}

fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
    ids.sort_unstable();
    ids
}

#[test]
fn line_of_points_with_fanout_three() {
    for policy in [SplitPolicy::Linear, SplitPolicy::Quadratic] {
        let config = TreeConfig::new()
            .with_max_elements(3)
            .with_split_policy(policy)
            .with_verify_invariants(true);
        let mut tree = RTree::in_memory(config).unwrap();
        for x in 0..10u32 {
            tree.insert(x + 100, point(x as f64, 0.0)).unwrap();
            let report = tree.check_integrity().unwrap();
            assert!(report.fanout_violations.is_empty(), "{:?}", report.errors);
        }

        let query = Envelope::from_2d(2.5, -1.0, 6.5, 1.0).unwrap();
        assert_eq!(sorted(tree.search(&query).unwrap()), vec![103, 104, 105, 106]);
    }
}

#[test]
fn insert_then_remove_leaves_empty_tree() {
    let mut tree = RTree::in_memory(TreeConfig::default()).unwrap();
    let square = Envelope::from_2d(0.0, 0.0, 10.0, 10.0).unwrap();
    tree.insert(1, square.clone()).unwrap();
    assert!(tree.search(&square).unwrap().contains(&1));

    assert!(tree.remove(1, &square).unwrap());
    assert_eq!(tree.extent().unwrap(), None);
    assert!(tree.search(&square).unwrap().is_empty());
}

#[test]
fn count_tracks_successful_operations() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut tree = RTree::in_memory(TreeConfig::new().with_max_elements(6)).unwrap();
    let mut entries = Vec::new();
    for id in 1..=200u32 {
        let x: f64 = rng.gen_range(0.0..1000.0);
        let y: f64 = rng.gen_range(0.0..1000.0);
        let e = Envelope::from_2d(x, y, x + 3.0, y + 3.0).unwrap();
        tree.insert(id, e.clone()).unwrap();
        entries.push((id, e));
    }

    let mut removed = 0;
    for (id, e) in entries.iter().filter(|(id, _)| id % 3 == 0) {
        assert!(tree.remove(*id, e).unwrap());
        removed += 1;
    }
    // absent entries do not count
    assert!(!tree.remove(3, &entries[2].1).unwrap());

    assert_eq!(tree.len(), 200 - removed);
    for (id, e) in &entries {
        let found = tree.search(e).unwrap().contains(id);
        assert_eq!(found, id % 3 != 0, "id {}", id);
    }
    assert!(tree.check_integrity().unwrap().is_valid);
}

#[test]
fn three_dimensional_tree() {
    let config = TreeConfig::new()
        .with_coordinate_system(CoordinateSystem::cartesian(3).unwrap())
        .with_max_elements(4)
        .with_verify_invariants(true);
    let mut tree = RTree::in_memory(config).unwrap();
    for i in 0..5u32 {
        for j in 0..5u32 {
            let (x, y) = (i as f64, j as f64);
            let id = i * 5 + j + 1;
            tree.insert(id, Envelope::point(&[x, y, (i + j) as f64]).unwrap())
                .unwrap();
        }
    }
    let slab = Envelope::new(vec![0.0, 0.0, 0.0, 4.0, 4.0, 1.0]).unwrap();
    // points with i + j <= 1
    assert_eq!(sorted(tree.search(&slab).unwrap()), vec![1, 2, 6]);

    let flat = Envelope::from_2d(0.0, 0.0, 1.0, 1.0).unwrap();
    assert!(matches!(tree.search(&flat), Err(TreeError::InvalidArgument(_))));
}

#[test]
fn element_index_over_named_places() {
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Place {
        name: String,
        x: i64,
        y: i64,
    }

    let tree = RTree::in_memory(TreeConfig::new().with_max_elements(4)).unwrap();
    let mapper = MemoryElementMapper::new(|p: &Place| Envelope::point(&[p.x as f64, p.y as f64]));
    let mut index = ElementIndex::new(tree, mapper);

    let places: Vec<Place> = (0..20)
        .map(|i| Place {
            name: format!("place-{}", i),
            x: i,
            y: i * 2,
        })
        .collect();
    index.insert_all(&places).unwrap();

    let query = Envelope::from_2d(4.0, 0.0, 6.0, 100.0).unwrap();
    let mut names: Vec<String> = index
        .search(&query)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["place-4", "place-5", "place-6"]);

    let outside = index
        .search_with(SpatialPredicate::Disjoint, &query)
        .unwrap();
    assert_eq!(outside.len(), 17);
}

#[test]
fn shared_tree_across_threads() {
    let tree = SharedRTree::new(RTree::in_memory(TreeConfig::new().with_max_elements(5)).unwrap());
    let workers: Vec<_> = (0..8u32)
        .map(|w| {
            let tree = tree.clone();
            std::thread::spawn(move || {
                for i in 0..25u32 {
                    let id = w * 25 + i + 1;
                    tree.add(&point(id as f64, w as f64), id).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(tree.size(), 200);
    let everything = Envelope::from_2d(0.0, 0.0, 1000.0, 1000.0).unwrap();
    assert_eq!(tree.find_intersecting_keys(&everything).unwrap().len(), 200);
}
