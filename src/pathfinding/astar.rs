use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;
use std::ops::Add;

/// Priority-queue entry. Ordered by `cost` (f = g + h), then by push order so
/// that equal-cost frontiers expand first-come first-served and the search
/// is reproducible.
struct State<N, C> {
    node: N,
    cost: C,
    seq: u64,
}

impl<N, C: PartialOrd> PartialEq for State<N, C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N, C: PartialOrd> Eq for State<N, C> {}

impl<N, C: PartialOrd> Ord for State<N, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse both keys for min-first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<N, C: PartialOrd> PartialOrd for State<N, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A found path and its accumulated cost.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult<N, C> {
    pub cost: C,
    /// Start and goal included.
    pub path: Vec<N>,
}

/// Generic A*.
///
/// * `neighbors` - returns `(neighbor, edge_cost)` pairs for a node.
/// * `heuristic` - must not overestimate the remaining cost.
/// * `is_goal` - the search stops at the first goal node expanded.
///
/// Neighbours are considered in the order `neighbors` returns them, which
/// together with the push-order tie-break makes equal-cost results stable.
pub fn a_star<N, C, FN, FH, FG>(
    start: N,
    mut neighbors: FN,
    mut heuristic: FH,
    mut is_goal: FG,
) -> Option<SearchResult<N, C>>
where
    N: Eq + Hash + Copy,
    C: Default + Copy + PartialOrd + Add<Output = C>,
    FN: FnMut(N) -> Vec<(N, C)>,
    FH: FnMut(N) -> C,
    FG: FnMut(N) -> bool,
{
    let mut open = BinaryHeap::new();
    let mut closed: HashSet<N> = HashSet::new();
    let mut came_from: HashMap<N, N> = HashMap::new();
    let mut g_score: HashMap<N, C> = HashMap::new();
    let mut seq = 0u64;

    g_score.insert(start, C::default());
    open.push(State {
        node: start,
        cost: heuristic(start),
        seq,
    });

    while let Some(State { node: current, .. }) = open.pop() {
        // Stale entry left behind by a later improvement.
        if !closed.insert(current) {
            continue;
        }

        let current_g = g_score.get(&current).copied().unwrap_or_default();

        if is_goal(current) {
            let mut path = vec![current];
            let mut cursor = current;
            while let Some(&prev) = came_from.get(&cursor) {
                path.push(prev);
                cursor = prev;
            }
            path.reverse();
            return Some(SearchResult {
                cost: current_g,
                path,
            });
        }

        for (next, step) in neighbors(current) {
            if closed.contains(&next) {
                continue;
            }
            let tentative = current_g + step;
            let improves = g_score.get(&next).map_or(true, |&known| tentative < known);
            if improves {
                g_score.insert(next, tentative);
                came_from.insert(next, current);
                seq += 1;
                open.push(State {
                    node: next,
                    cost: tentative + heuristic(next),
                    seq,
                });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_cheapest_of_two_branches() {
        // 0 -> 1 -> 3 costs 5, 0 -> 2 -> 3 costs 3.
        let graph = |n: u32| -> Vec<(u32, f32)> {
            match n {
                0 => vec![(1, 1.0), (2, 2.0)],
                1 => vec![(3, 4.0)],
                2 => vec![(3, 1.0)],
                _ => vec![],
            }
        };
        let found = a_star(0u32, graph, |_| 0.0f32, |n| n == 3).unwrap();
        assert_eq!(found.path, vec![0, 2, 3]);
        assert_eq!(found.cost, 3.0);
    }

    #[test]
    fn unreachable_goal_returns_none() {
        let found = a_star(0u32, |_| Vec::<(u32, f32)>::new(), |_| 0.0f32, |n| n == 1);
        assert!(found.is_none());
    }

    #[test]
    fn equal_costs_prefer_first_listed_neighbor() {
        let graph = |n: u32| -> Vec<(u32, f32)> {
            match n {
                0 => vec![(1, 1.0), (2, 1.0)],
                1 | 2 => vec![(3, 1.0)],
                _ => vec![],
            }
        };
        let found = a_star(0u32, graph, |_| 0.0f32, |n| n == 3).unwrap();
        assert_eq!(found.path, vec![0, 1, 3]);
    }
}
