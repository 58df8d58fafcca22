//! Lazy breadth-first and depth-first traversal over a neighbor relation.
//!
//! A [`Traversal`] is pull-driven: each call to `next` runs one step
//! (pop, discover, push) and yields a [`Context`] for the popped element.
//! Nothing is computed ahead of the consumer, so traversals over infinite
//! relations are fine as long as the caller stops pulling.

use std::cell::RefCell;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use crate::types::{Element, Hypergraph};

/// A relation mapping each element to a lazy sequence of neighbors.
pub trait Neighbors<T> {
    /// Iterator over the neighbors of one element.
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    /// Neighbors of `item`.
    fn neighbors<'a>(&'a self, item: &T) -> Self::Iter<'a>;
}

/// Adapts a closure `Fn(&T) -> impl IntoIterator<Item = T>` into a relation.
#[derive(Debug, Clone, Copy)]
pub struct FnNeighbors<F>(pub F);

impl<T, I, F> Neighbors<T> for FnNeighbors<F>
where
    F: Fn(&T) -> I,
    I: IntoIterator<Item = T>,
{
    type Iter<'a> = I::IntoIter where Self: 'a;

    fn neighbors<'a>(&'a self, item: &T) -> Self::Iter<'a> {
        (self.0)(item).into_iter()
    }
}

/// Nodes neighbor their incident edges; edges neighbor their member nodes.
impl<V: Ord + Clone, E: Ord + Clone> Neighbors<Element<V, E>> for Hypergraph<V, E> {
    type Iter<'a> = Box<dyn Iterator<Item = Element<V, E>> + 'a> where Self: 'a;

    fn neighbors<'a>(&'a self, item: &Element<V, E>) -> Self::Iter<'a> {
        match item {
            Element::Node(v) => match self.incident_edges(v) {
                Some(incident) => Box::new(incident.iter().cloned().map(Element::Edge)),
                None => Box::new(std::iter::empty()),
            },
            Element::Edge(e) => match self.edge(e) {
                Some(members) => Box::new(members.iter().cloned().map(Element::Node)),
                None => Box::new(std::iter::empty()),
            },
        }
    }
}

/// Which end of the pending list a traversal pops from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Pop the oldest entry (queue).
    Breadth,
    /// Pop the newest entry (stack).
    Depth,
}

/// One entry of a traversal's discovery log.
#[derive(Debug)]
struct Discovered<T> {
    item: T,
    /// Step at which the entry was popped, once it has been.
    popped_at: Option<usize>,
}

/// Append-only log of every element a traversal has discovered, shared by
/// the traversal and the contexts it yields.
type DiscoveryLog<T> = Rc<RefCell<Vec<Discovered<T>>>>;

/// One visit: the element, its accumulated state and a view of the
/// traversal's bookkeeping at the moment it was popped.
///
/// The bookkeeping is not copied per step. Each context keeps a handle on
/// the shared discovery log plus the step number and log length it saw, and
/// [`visited`](Self::visited) and [`pending`](Self::pending) rebuild the view
/// on demand.
pub struct Context<'g, N, T, R> {
    /// Element being visited.
    pub current: T,
    /// State accumulated along the path that discovered `current`.
    pub state: R,
    step: usize,
    known: usize,
    log: DiscoveryLog<T>,
    relation: &'g N,
}

impl<'g, N, T, R> Context<'g, N, T, R>
where
    N: Neighbors<T> + 'g,
{
    /// Immediate neighbors of `current`, computed on demand.
    pub fn neighbors(&self) -> N::Iter<'g> {
        self.relation.neighbors(&self.current)
    }
}

impl<N, T: Clone, R> Context<'_, N, T, R> {
    /// Zero-based index of this visit.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of elements discovered when `current` was popped.
    pub fn visited_count(&self) -> usize {
        self.known
    }

    /// Elements discovered when `current` was popped, `current` included,
    /// in discovery order.
    pub fn visited(&self) -> Vec<T> {
        self.log.borrow()[..self.known]
            .iter()
            .map(|entry| entry.item.clone())
            .collect()
    }

    /// Elements still waiting to be visited when `current` was popped, in
    /// discovery order.
    pub fn pending(&self) -> Vec<T> {
        self.log.borrow()[..self.known]
            .iter()
            .filter(|entry| entry.popped_at.map_or(true, |at| at > self.step))
            .map(|entry| entry.item.clone())
            .collect()
    }
}

impl<N, T: Clone + fmt::Debug, R: fmt::Debug> fmt::Debug for Context<'_, N, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("current", &self.current)
            .field("state", &self.state)
            .field("step", &self.step)
            .field("visited", &self.known)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Lazy traversal yielding one [`Context`] per reachable element.
pub struct Traversal<'g, N, T, R, F> {
    relation: &'g N,
    order: Order,
    /// Log index and state of each element waiting to be visited.
    pending: VecDeque<(usize, R)>,
    seen: HashSet<T>,
    log: DiscoveryLog<T>,
    step: usize,
    update: F,
}

impl<'g, N, T, R, F> Traversal<'g, N, T, R, F>
where
    N: Neighbors<T> + 'g,
    T: Clone + Eq + Hash,
    F: FnMut(&R, &T) -> R,
{
    /// Start a traversal at `start` carrying `initial` state.
    pub fn new(relation: &'g N, order: Order, start: T, initial: R, update: F) -> Self {
        let mut seen = HashSet::new();
        seen.insert(start.clone());
        Self {
            relation,
            order,
            pending: VecDeque::from([(0, initial)]),
            seen,
            log: Rc::new(RefCell::new(vec![Discovered { item: start, popped_at: None }])),
            step: 0,
            update,
        }
    }

    /// Pop order of this traversal.
    pub fn order(&self) -> Order {
        self.order
    }
}

impl<'g, N, T, R, F> Iterator for Traversal<'g, N, T, R, F>
where
    N: Neighbors<T> + 'g,
    T: Clone + Eq + Hash,
    F: FnMut(&R, &T) -> R,
{
    type Item = Context<'g, N, T, R>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, state) = match self.order {
            Order::Breadth => self.pending.pop_front()?,
            Order::Depth => self.pending.pop_back()?,
        };
        let step = self.step;
        self.step += 1;

        let (current, known) = {
            let mut log = self.log.borrow_mut();
            let entry = &mut log[index];
            entry.popped_at = Some(step);
            (entry.item.clone(), log.len())
        };

        for neighbor in self.relation.neighbors(&current) {
            if self.seen.insert(neighbor.clone()) {
                let next_state = (self.update)(&state, &neighbor);
                let mut log = self.log.borrow_mut();
                self.pending.push_back((log.len(), next_state));
                log.push(Discovered { item: neighbor, popped_at: None });
            }
        }

        Some(Context {
            current,
            state,
            step,
            known,
            log: Rc::clone(&self.log),
            relation: self.relation,
        })
    }
}

/// Breadth-first traversal of `relation` from `start`.
pub fn bfs<'g, N, T, R, F>(relation: &'g N, start: T, initial: R, update: F) -> Traversal<'g, N, T, R, F>
where
    N: Neighbors<T> + 'g,
    T: Clone + Eq + Hash,
    F: FnMut(&R, &T) -> R,
{
    Traversal::new(relation, Order::Breadth, start, initial, update)
}

/// Depth-first traversal of `relation` from `start`.
pub fn dfs<'g, N, T, R, F>(relation: &'g N, start: T, initial: R, update: F) -> Traversal<'g, N, T, R, F>
where
    N: Neighbors<T> + 'g,
    T: Clone + Eq + Hash,
    F: FnMut(&R, &T) -> R,
{
    Traversal::new(relation, Order::Depth, start, initial, update)
}

impl<V, E> Hypergraph<V, E>
where
    V: Ord + Clone + Hash,
    E: Ord + Clone + Hash,
{
    /// Breadth-first walk alternating between nodes and edges.
    pub fn bfs<R, F>(&self, start: Element<V, E>, initial: R, update: F) -> Traversal<'_, Self, Element<V, E>, R, F>
    where
        F: FnMut(&R, &Element<V, E>) -> R,
    {
        bfs(self, start, initial, update)
    }

    /// Depth-first walk alternating between nodes and edges.
    pub fn dfs<R, F>(&self, start: Element<V, E>, initial: R, update: F) -> Traversal<'_, Self, Element<V, E>, R, F>
    where
        F: FnMut(&R, &Element<V, E>) -> R,
    {
        dfs(self, start, initial, update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> FnNeighbors<impl Fn(&u32) -> Vec<u32>> {
        FnNeighbors(|&n: &u32| [2 * n, 2 * n + 1].into_iter().filter(|&m| m < 8).collect())
    }

    #[test]
    fn test_bfs_visits_level_by_level() {
        let relation = tree();
        let order: Vec<u32> = bfs(&relation, 1u32, (), |_, _| ()).map(|c| c.current).collect();
        assert_eq!(order, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_dfs_follows_newest_branch() {
        let relation = tree();
        let order: Vec<u32> = dfs(&relation, 1u32, (), |_, _| ()).map(|c| c.current).collect();
        assert_eq!(order, vec![1, 3, 7, 6, 2, 5, 4]);
    }

    #[test]
    fn test_state_accumulates_along_path() {
        let relation = tree();
        let paths: Vec<(u32, Vec<u32>)> = bfs(&relation, 1u32, vec![1], |path: &Vec<u32>, &n| {
            let mut path = path.clone();
            path.push(n);
            path
        })
        .map(|c| (c.current, c.state))
        .collect();

        assert_eq!(paths[0], (1, vec![1]));
        assert_eq!(paths[6], (7, vec![1, 3, 7]));
    }

    #[test]
    fn test_context_snapshots_bookkeeping() {
        let relation = tree();
        let mut traversal = bfs(&relation, 1u32, 0u32, |depth, _| *depth + 1);

        let first = traversal.next().unwrap();
        assert_eq!(first.visited(), vec![1]);
        assert!(first.pending().is_empty());
        assert_eq!(first.neighbors().collect::<Vec<_>>(), vec![2, 3]);

        let second = traversal.next().unwrap();
        assert_eq!(second.current, 2);
        assert_eq!(second.state, 1);
        assert_eq!(second.step(), 1);
        assert_eq!(second.pending(), vec![3]);
        assert!(second.visited().contains(&3));
    }

    #[test]
    fn test_old_context_keeps_its_view() {
        let relation = tree();
        let mut traversal = bfs(&relation, 1u32, (), |_, _| ());

        traversal.next().unwrap();
        let second = traversal.next().unwrap();
        let rest: Vec<_> = traversal.collect();
        assert_eq!(rest.len(), 5);

        assert_eq!(second.visited_count(), 3);
        assert_eq!(second.visited(), vec![1, 2, 3]);
        assert_eq!(second.pending(), vec![3]);

        let last = rest.last().unwrap();
        assert_eq!(last.current, 7);
        assert_eq!(last.visited_count(), 7);
        assert!(last.pending().is_empty());
    }

    #[test]
    fn test_depth_first_pending_view() {
        let relation = tree();
        let contexts: Vec<_> = dfs(&relation, 1u32, (), |_, _| ()).collect();

        // 1 pushes 2 and 3; 3 is popped first and pushes 6 and 7.
        assert_eq!(contexts[1].current, 3);
        assert_eq!(contexts[1].pending(), vec![2]);
        assert_eq!(contexts[2].current, 7);
        assert_eq!(contexts[2].pending(), vec![2, 6]);
    }

    #[test]
    fn test_infinite_relation_is_lazy() {
        let relation = FnNeighbors(|&n: &u64| [n + 1]);
        let first: Vec<u64> = bfs(&relation, 0u64, (), |_, _| ()).take(5).map(|c| c.current).collect();
        assert_eq!(first, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cycles_terminate() {
        let relation = FnNeighbors(|&n: &u8| [(n + 1) % 4, (n + 3) % 4]);
        assert_eq!(dfs(&relation, 0u8, (), |_, _| ()).count(), 4);
    }

    #[test]
    fn test_hypergraph_walk_alternates() {
        let hg: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a', 'b']), (1, vec!['b'])]);
        let visits: Vec<(Element<char, u8>, usize)> = hg
            .bfs(Element::Node('a'), 0usize, |depth, _| *depth + 1)
            .map(|c| (c.current, c.state))
            .collect();

        assert_eq!(
            visits,
            vec![
                (Element::Node('a'), 0),
                (Element::Edge(0), 1),
                (Element::Node('b'), 2),
                (Element::Edge(1), 3),
            ]
        );
        assert_eq!(hg.dfs(Element::Edge(1), (), |_, _| ()).count(), 4);
    }

    #[test]
    fn test_unknown_start_yields_only_itself() {
        let hg: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a'])]);
        let visits: Vec<_> = hg.bfs(Element::Node('z'), (), |_, _| ()).collect();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].neighbors().count(), 0);
    }
}
