//! Property tests for dependency resolution.
//!
//! Six system types `Node<0>`..`Node<5>` are wired with random `executes_after`
//! edges at runtime and registered in random order.

use std::cell::RefCell;
use std::rc::Rc;

use dawn_ecs::prelude::*;
use proptest::prelude::*;

const NAMES: [&str; 6] = ["n0", "n1", "n2", "n3", "n4", "n5"];

type Log = Rc<RefCell<Vec<usize>>>;

struct Node<const I: usize> {
    deps: Vec<usize>,
    log: Log,
}

fn after(reqs: SystemRequirements, dep: usize) -> SystemRequirements {
    match dep {
        0 => reqs.executes_after::<Node<0>>(),
        1 => reqs.executes_after::<Node<1>>(),
        2 => reqs.executes_after::<Node<2>>(),
        3 => reqs.executes_after::<Node<3>>(),
        4 => reqs.executes_after::<Node<4>>(),
        _ => reqs.executes_after::<Node<5>>(),
    }
}

impl<const I: usize> System for Node<I> {
    fn requirements(&self) -> SystemRequirements {
        self.deps
            .iter()
            .fold(SystemRequirements::new(), |reqs, &d| after(reqs, d))
    }

    fn name(&self) -> &'static str {
        NAMES[I]
    }

    fn begin_processing(&mut self, _ctx: &mut SystemContext<'_>) {
        self.log.borrow_mut().push(I);
    }

    fn process(&mut self, _ctx: &mut SystemContext<'_>, _entity: EntityId, _dt: f64) {}
}

fn add_node(
    s: &mut Scheduler,
    i: usize,
    deps: Vec<usize>,
    log: &Log,
) -> Result<(), ScheduleError> {
    let log = log.clone();
    match i {
        0 => s.add_system(Node::<0> { deps, log }).map(|_| ()),
        1 => s.add_system(Node::<1> { deps, log }).map(|_| ()),
        2 => s.add_system(Node::<2> { deps, log }).map(|_| ()),
        3 => s.add_system(Node::<3> { deps, log }).map(|_| ()),
        4 => s.add_system(Node::<4> { deps, log }).map(|_| ()),
        _ => s.add_system(Node::<5> { deps, log }).map(|_| ()),
    }
}

/// Dependency lists for nodes 0..n where every edge points at a lower index,
/// so the graph is acyclic.
fn dag(n: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(any::<bool>(), n), n).prop_map(|masks| {
        masks
            .into_iter()
            .enumerate()
            .map(|(i, mask)| (0..i).filter(|&j| mask[j]).collect())
            .collect()
    })
}

fn permutation(n: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..n).collect::<Vec<_>>()).prop_shuffle()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    #[test]
    fn acyclic_graphs_order_every_edge(deps in dag(6), order in permutation(6)) {
        let log = Log::default();
        let mut s = Scheduler::new();
        for &i in &order {
            add_node(&mut s, i, deps[i].clone(), &log).unwrap();
        }

        let resolved = s.execution_order();
        prop_assert_eq!(resolved.len(), 6);
        let pos = |i: usize| resolved.iter().position(|&n| n == NAMES[i]);

        for (i, ds) in deps.iter().enumerate() {
            for &d in ds {
                prop_assert!(pos(d) < pos(i), "{} must precede {}", NAMES[d], NAMES[i]);
            }
        }

        let mut world = World::new();
        s.update(&mut world, 1.0 / 60.0);
        let ran: Vec<&str> = log.borrow().iter().map(|&i| NAMES[i]).collect();
        prop_assert_eq!(ran, resolved);
    }

    #[test]
    fn closing_a_cycle_is_rejected_without_side_effects(
        deps in dag(5),
        order in permutation(5),
        closer in 0..5usize,
    ) {
        let log = Log::default();
        let mut s = Scheduler::new();
        for &i in &order {
            let mut ds = deps[i].clone();
            if i == closer {
                // Points at a system that is not registered yet.
                ds.push(5);
            }
            add_node(&mut s, i, ds, &log).unwrap();
        }
        let before = s.execution_order();

        let err = add_node(&mut s, 5, vec![closer], &log).unwrap_err();
        let is_cycle = matches!(err, ScheduleError::CyclicDependency { .. });
        prop_assert!(is_cycle);
        prop_assert_eq!(s.execution_order(), before);
        prop_assert_eq!(s.system_count(), 5);
        prop_assert!(!s.contains::<Node<5>>());
    }
}
