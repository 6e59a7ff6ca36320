//! Strongly connected components with root-based reachability.
//!
//! # Algorithm
//!
//! Tarjan's algorithm: a single DFS assigns every vertex a discovery index
//! and a low-link; a component closes when a vertex's low-link equals its own
//! index, at which point its members are popped off the explicit stack.
//!
//! The DFS is iterative (an explicit frame stack holding each vertex's
//! remaining successors), so chain length is bounded by heap, not by the
//! thread's stack.
//!
//! ## Reachability
//!
//! When roots are supplied the DFS only starts from them, so vertices not
//! reachable from a root are never discovered and never appear in the
//! output. The reachable forward and reverse adjacency is recorded while
//! walking; no second filtering pass is needed.
//!
//! ## Component Ids
//!
//! Ids are assigned in completion order. Because edges point from dependent
//! to dependency, a component always completes after every component it
//! depends on, so ids are already in reverse-topological discovery order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, instrument, trace};

use super::Adjacency;

/// A maximal set of mutually reachable vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component<V> {
    /// Completion-order id, dense from zero.
    pub id: usize,
    /// Members in natural order.
    pub vertices: Vec<V>,
}

impl<V> Component<V> {
    /// `true` if this component holds more than one vertex.
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.vertices.len() > 1
    }
}

/// Forward and reverse adjacency restricted to reachable vertices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachableAdjacency<V> {
    /// `v → dependencies of v`.
    pub forward: Adjacency<V>,
    /// `v → dependents of v`.
    pub reverse: Adjacency<V>,
}

impl<V> Default for ReachableAdjacency<V> {
    fn default() -> Self {
        Self {
            forward: Adjacency::new(),
            reverse: Adjacency::new(),
        }
    }
}

/// Output of [`compute_components`].
#[derive(Debug, Clone)]
pub struct TarjanResult<V> {
    pub components: Vec<Component<V>>,
    pub component_of: BTreeMap<V, usize>,
    pub adjacency: ReachableAdjacency<V>,
}

/// Decompose the graph reachable from `roots` into components.
///
/// With `roots == None` every vertex of `full` is a start point. Roots that
/// are not vertices of `full` are skipped. A target that appears only on the
/// right-hand side of `full` is treated as a vertex with no dependencies.
#[must_use]
#[instrument(skip_all, fields(vertices = full.len(), rooted = roots.is_some()))]
pub fn compute_components<V: Ord + Clone>(
    full: &Adjacency<V>,
    roots: Option<&BTreeSet<V>>,
) -> TarjanResult<V> {
    let mut tarjan = Tarjan::new(full);

    match roots {
        Some(roots) => {
            for root in roots {
                if let Some((vertex, _)) = full.get_key_value(root) {
                    tarjan.visit(vertex);
                } else {
                    trace!("skipping root with no adjacency entry");
                }
            }
        }
        None => {
            for vertex in full.keys() {
                tarjan.visit(vertex);
            }
        }
    }

    let result = tarjan.finish();
    debug!(
        components = result.components.len(),
        reachable = result.component_of.len(),
        "computed strongly connected components"
    );
    result
}

// ---------------------------------------------------------------------------
// Internal DFS state
// ---------------------------------------------------------------------------

type Successors<'a, V> = std::iter::Flatten<std::option::IntoIter<&'a BTreeSet<V>>>;

struct Frame<'a, V> {
    vertex: &'a V,
    successors: Successors<'a, V>,
}

struct Tarjan<'a, V> {
    full: &'a Adjacency<V>,
    next_index: usize,
    index: BTreeMap<&'a V, usize>,
    low_link: BTreeMap<&'a V, usize>,
    on_stack: BTreeSet<&'a V>,
    stack: Vec<&'a V>,
    frames: Vec<Frame<'a, V>>,
    components: Vec<Component<V>>,
    component_of: BTreeMap<V, usize>,
    adjacency: ReachableAdjacency<V>,
}

impl<'a, V: Ord + Clone> Tarjan<'a, V> {
    fn new(full: &'a Adjacency<V>) -> Self {
        Self {
            full,
            next_index: 0,
            index: BTreeMap::new(),
            low_link: BTreeMap::new(),
            on_stack: BTreeSet::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            components: Vec::new(),
            component_of: BTreeMap::new(),
            adjacency: ReachableAdjacency::default(),
        }
    }

    fn visit(&mut self, root: &'a V) {
        if self.index.contains_key(root) {
            return;
        }
        self.open(root);

        loop {
            let Some(frame) = self.frames.last_mut() else {
                break;
            };
            let vertex = frame.vertex;
            match frame.successors.next() {
                Some(next) => self.follow(vertex, next),
                None => self.close(vertex),
            }
        }
    }

    /// Discover `vertex`: number it, push it, and record its reachable edges.
    fn open(&mut self, vertex: &'a V) {
        let full = self.full;
        let deps = full.get(vertex);

        self.index.insert(vertex, self.next_index);
        self.low_link.insert(vertex, self.next_index);
        self.next_index += 1;
        self.stack.push(vertex);
        self.on_stack.insert(vertex);
        self.frames.push(Frame {
            vertex,
            successors: deps.into_iter().flatten(),
        });

        self.adjacency
            .forward
            .insert(vertex.clone(), deps.cloned().unwrap_or_default());
        self.adjacency.reverse.entry(vertex.clone()).or_default();
    }

    fn follow(&mut self, vertex: &'a V, next: &'a V) {
        self.adjacency
            .reverse
            .entry(next.clone())
            .or_default()
            .insert(vertex.clone());

        match self.index.get(next).copied() {
            None => self.open(next),
            Some(next_index) if self.on_stack.contains(next) => {
                self.lower(vertex, next_index);
            }
            Some(_) => {}
        }
    }

    /// All successors of `vertex` are done: propagate its low-link to the
    /// parent frame and emit a component if `vertex` is a root of one.
    fn close(&mut self, vertex: &'a V) {
        self.frames.pop();
        let low = self.low_link[vertex];

        if let Some(parent) = self.frames.last() {
            let parent = parent.vertex;
            self.lower(parent, low);
        }

        if low != self.index[vertex] {
            return;
        }

        let id = self.components.len();
        let mut members = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(member);
            self.component_of.insert(member.clone(), id);
            members.push(member.clone());
            if member == vertex {
                break;
            }
        }
        members.sort_unstable();
        trace!(id, size = members.len(), "closed component");
        self.components.push(Component {
            id,
            vertices: members,
        });
    }

    fn lower(&mut self, vertex: &'a V, candidate: usize) {
        if let Some(low) = self.low_link.get_mut(vertex) {
            *low = (*low).min(candidate);
        }
    }

    fn finish(self) -> TarjanResult<V> {
        TarjanResult {
            components: self.components,
            component_of: self.component_of,
            adjacency: self.adjacency,
        }
    }
}
