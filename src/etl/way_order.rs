//! Recovers the ordered node list of a way from the directed edges it was
//! split into.
//!
//! Recovery is attempted by each entry of [`STRATEGIES`] in turn and the
//! first one that produces an order wins. The last strategy cannot fail, so
//! a way always gets some node list; [`WayOrder::recovered`] against
//! [`WayOrder::total`] tells how much of it is trustworthy. The last
//! strategy only guesses, so none of its nodes count as recovered.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::data::osm::OsmId;

/// A directed edge `(u, v)`.
pub type EdgeRef = (OsmId, OsmId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SingleEdge,
    WholeChain,
    LargestComponent,
    PinnedFirstNode,
    FirstAppearance,
}

type StrategyFn = fn(&[EdgeRef]) -> Option<Vec<OsmId>>;

pub const STRATEGIES: [(Strategy, StrategyFn); 5] = [
    (Strategy::SingleEdge, single_edge),
    (Strategy::WholeChain, whole_chain),
    (Strategy::LargestComponent, largest_component),
    (Strategy::PinnedFirstNode, pinned_first_node),
    (Strategy::FirstAppearance, first_appearance),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WayOrder {
    pub nodes: Vec<OsmId>,
    pub strategy: Strategy,
    /// Distinct nodes in `nodes` whose order was derived from the edges.
    pub recovered: usize,
    /// Distinct nodes over all edges of the way.
    pub total: usize,
}

impl WayOrder {
    pub fn is_complete(&self) -> bool {
        self.recovered >= self.total
    }
}

/// Nodes in the order they first occur along the edge list.
fn nodes_in_order(edges: &[EdgeRef]) -> Vec<OsmId> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for &(u, v) in edges {
        for node in [u, v] {
            if seen.insert(node) {
                nodes.push(node);
            }
        }
    }
    nodes
}

/// Kahn's algorithm. Nodes free to go in any order keep their order in
/// `nodes`. `None` if the edges contain a cycle.
fn topological_sort(nodes: &[OsmId], edges: &[EdgeRef]) -> Option<Vec<OsmId>> {
    let mut in_degree: HashMap<OsmId, usize> = nodes.iter().map(|&node| (node, 0)).collect();
    let mut successors: HashMap<OsmId, Vec<OsmId>> = HashMap::new();
    for &(u, v) in edges {
        successors.entry(u).or_default().push(v);
        *in_degree.entry(v).or_default() += 1;
    }

    let mut ready: VecDeque<OsmId> = nodes
        .iter()
        .copied()
        .filter(|node| in_degree.get(node) == Some(&0))
        .collect();
    let mut sorted = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_front() {
        sorted.push(node);
        for next in successors.get(&node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push_back(*next);
                }
            }
        }
    }

    if sorted.len() == in_degree.len() {
        Some(sorted)
    } else {
        None
    }
}

/// Weakly-connected components, in order of discovery. Each component lists
/// its nodes in first-appearance order.
fn weak_components(edges: &[EdgeRef]) -> Vec<Vec<OsmId>> {
    let order = nodes_in_order(edges);
    let mut neighbours: HashMap<OsmId, Vec<OsmId>> = HashMap::new();
    for &(u, v) in edges {
        neighbours.entry(u).or_default().push(v);
        neighbours.entry(v).or_default().push(u);
    }

    let mut component_of: HashMap<OsmId, usize> = HashMap::new();
    let mut count = 0;
    for &start in &order {
        if component_of.contains_key(&start) {
            continue;
        }
        component_of.insert(start, count);
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            for &next in neighbours.get(&node).into_iter().flatten() {
                if !component_of.contains_key(&next) {
                    component_of.insert(next, count);
                    queue.push_back(next);
                }
            }
        }
        count += 1;
    }

    let mut components = vec![Vec::new(); count];
    for node in order {
        if let Some(component) = component_of.get(&node).and_then(|&index| components.get_mut(index)) {
            component.push(node);
        }
    }
    components
}

pub fn single_edge(edges: &[EdgeRef]) -> Option<Vec<OsmId>> {
    match edges {
        [(u, v)] => Some(vec![*u, *v]),
        _ => None,
    }
}

/// Succeeds when every edge belongs to one acyclic, connected piece.
pub fn whole_chain(edges: &[EdgeRef]) -> Option<Vec<OsmId>> {
    if weak_components(edges).len() != 1 {
        return None;
    }
    topological_sort(&nodes_in_order(edges), edges)
}

/// Sorts only the largest weakly-connected component. Ties go to the
/// component discovered first.
pub fn largest_component(edges: &[EdgeRef]) -> Option<Vec<OsmId>> {
    let mut largest: Option<Vec<OsmId>> = None;
    for component in weak_components(edges) {
        if largest.as_ref().map_or(true, |best| component.len() > best.len()) {
            largest = Some(component);
        }
    }
    let component = largest?;

    let members: HashSet<OsmId> = component.iter().copied().collect();
    let inside: Vec<EdgeRef> = edges
        .iter()
        .copied()
        .filter(|(u, _)| members.contains(u))
        .collect();
    topological_sort(&component, &inside)
}

/// Keeps the first edge's origin as the start and orders the remaining edges,
/// which breaks cycles closed by the first edge (e.g. a closed way).
pub fn pinned_first_node(edges: &[EdgeRef]) -> Option<Vec<OsmId>> {
    let ((first, _), rest) = edges.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut nodes = largest_component(rest)?;
    if nodes.first() != Some(first) {
        nodes.insert(0, *first);
    }
    Some(nodes)
}

/// Never fails: nodes in order of first appearance along the edge list.
pub fn first_appearance(edges: &[EdgeRef]) -> Option<Vec<OsmId>> {
    Some(nodes_in_order(edges))
}

pub fn reconstruct(edges: &[EdgeRef]) -> WayOrder {
    let total = nodes_in_order(edges).len();
    let (strategy, nodes) = STRATEGIES
        .iter()
        .find_map(|(strategy, attempt)| attempt(edges).map(|nodes| (*strategy, nodes)))
        .unwrap_or((Strategy::FirstAppearance, Vec::new()));
    let recovered = match strategy {
        Strategy::FirstAppearance => 0,
        _ => nodes.iter().collect::<HashSet<_>>().len(),
    };
    WayOrder {
        nodes,
        strategy,
        recovered,
        total,
    }
}
