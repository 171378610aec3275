use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use bitflags::bitflags;
use futures::future::AbortHandle;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::{NodeStatus, ProviderError, ProviderKey, ProviderKind};

new_key_type! {
    pub struct NodeId;
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub(crate) struct NodeFlags: u8 {
        /// An upstream changed since the cached value was computed.
        const DIRTY = 1 << 0;
        /// A synchronous computation for this node is on the stack.
        const COMPUTING = 1 << 1;
    }
}

/// How a computation read one of its dependencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Edge {
    /// Took the current value or snapshot.
    Watch,
    /// Awaited the dependency's result.
    Await,
}

pub(crate) type Cleanup = Box<dyn FnOnce()>;
pub(crate) type Notify = Rc<dyn Fn()>;

pub(crate) struct Node {
    pub key: ProviderKey,
    pub kind: ProviderKind,
    pub flags: NodeFlags,
    /// `T` for computed/state nodes, `ProviderState<T>` for future nodes.
    pub value: Option<Box<dyn Any>>,
    /// Shared in-flight future of a future node.
    pub in_flight: Option<Box<dyn Any>>,
    /// The cached future result is an error.
    pub failed: bool,
    pub task: Option<AbortHandle>,
    // upstream nodes this one read during its last computation
    pub deps: SmallVec<[NodeId; 4]>,
    // deps that were only ever awaited, never snapshotted
    pub awaited: SmallVec<[NodeId; 2]>,
    // downstream nodes that watched this one
    pub listeners: HashSet<NodeId>,
    pub subscribers: Vec<(u64, Notify)>,
    pub cleanups: Vec<Cleanup>,
    pub generation: u64,
    pub recomputes: u64,
}

impl Node {
    fn new(key: ProviderKey, kind: ProviderKind) -> Self {
        Self {
            key,
            kind,
            flags: NodeFlags::empty(),
            value: None,
            in_flight: None,
            failed: false,
            task: None,
            deps: SmallVec::new(),
            awaited: SmallVec::new(),
            listeners: HashSet::new(),
            subscribers: Vec::new(),
            cleanups: Vec::new(),
            generation: 0,
            recomputes: 0,
        }
    }

    pub fn is_fresh(&self) -> bool {
        !self.flags.contains(NodeFlags::DIRTY)
    }

    pub fn status(&self) -> NodeStatus {
        if self.in_flight.is_some() {
            return NodeStatus::Loading;
        }
        match self.value {
            None => NodeStatus::Uninitialized,
            Some(_) if self.failed => NodeStatus::Error,
            Some(_) => NodeStatus::Data,
        }
    }

    /// Drops everything tied to the current computation and starts a new generation.
    fn stale(&mut self, fallout: &mut Fallout) {
        self.generation += 1;
        self.in_flight = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        fallout.cleanups.append(&mut self.cleanups);
    }
}

/// Side effects of a graph mutation, run by the caller once the graph is no
/// longer borrowed.
#[derive(Default)]
#[must_use]
pub(crate) struct Fallout {
    pub cleanups: Vec<Cleanup>,
    pub notify: Vec<Notify>,
    pub touched: usize,
}

impl Fallout {
    pub fn absorb(&mut self, mut other: Fallout) {
        self.cleanups.append(&mut other.cleanups);
        self.notify.append(&mut other.notify);
        self.touched += other.touched;
    }

    pub fn run(self) {
        for cleanup in self.cleanups {
            cleanup();
        }
        for notify in self.notify {
            notify();
        }
    }
}

#[derive(Default)]
pub(crate) struct Graph {
    pub nodes: SlotMap<NodeId, Node>,
    index: HashMap<ProviderKey, NodeId>,
    next_subscriber: u64,
}

impl Graph {
    pub fn lookup(&self, key: &ProviderKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn node_for(&mut self, key: &ProviderKey, kind: ProviderKind) -> NodeId {
        if let Some(id) = self.index.get(key) {
            let node = &self.nodes[*id];
            if node.kind != kind {
                log::warn!(
                    "provider `{}` registered as {:?} but used as {:?}",
                    key,
                    node.kind,
                    kind
                );
            }
            return *id;
        }
        let id = self.nodes.insert(Node::new(key.clone(), kind));
        self.index.insert(key.clone(), id);
        log::trace!("created node for `{key}`");
        id
    }

    /// Live members of a family, by family name.
    pub fn family_members(&self, name: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.key.name() == name && n.key.is_family_member())
            .map(|(id, _)| id)
            .collect()
    }

    /// Records that `listener` read `dep`. Fails if the edge would close a cycle.
    ///
    /// A dependency counts as awaited only while every read of it was an await.
    pub fn add_edge(
        &mut self,
        dep: NodeId,
        listener: NodeId,
        edge: Edge,
    ) -> Result<(), ProviderError> {
        if dep == listener || self.depends_on(dep, listener) {
            return Err(ProviderError::cycle(&self.nodes[listener].key));
        }
        let Some(node) = self.nodes.get_mut(listener) else {
            return Ok(());
        };
        if !node.deps.contains(&dep) {
            node.deps.push(dep);
            if edge == Edge::Await {
                node.awaited.push(dep);
            }
        } else if edge == Edge::Watch {
            node.awaited.retain(|d| *d != dep);
        }
        if let Some(upstream) = self.nodes.get_mut(dep) {
            upstream.listeners.insert(listener);
        }
        Ok(())
    }

    /// Whether `node` transitively reads `target`.
    fn depends_on(&self, node: NodeId, target: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(n) = self.nodes.get(id) {
                stack.extend(n.deps.iter().copied());
            }
        }
        false
    }

    pub fn remove_all_edges_for(&mut self, id: NodeId) {
        let deps = match self.nodes.get_mut(id) {
            Some(node) => {
                node.awaited.clear();
                std::mem::take(&mut node.deps)
            }
            None => return,
        };
        for dep in deps {
            if let Some(upstream) = self.nodes.get_mut(dep) {
                upstream.listeners.remove(&id);
            }
        }
    }

    /// Prepares `id` for a fresh computation. Returns the new generation and
    /// the cleanups registered by the previous one.
    pub fn begin_compute(&mut self, id: NodeId) -> (u64, Fallout) {
        // clear previous deps before recompute
        self.remove_all_edges_for(id);
        let mut fallout = Fallout::default();
        let node = &mut self.nodes[id];
        node.stale(&mut fallout);
        node.recomputes += 1;
        if node.kind == ProviderKind::Future {
            node.value = None;
            node.failed = false;
        }
        log::trace!("recomputing `{}` (#{})", node.key, node.recomputes);
        (node.generation, fallout)
    }

    /// Breadth-first dirty marking.
    ///
    /// `roots` lose their cached value when `reset_roots` is set and are marked
    /// dirty otherwise; every transitive listener is marked dirty once.
    /// Listeners that are already dirty are not revisited, their downstream is
    /// dirty already.
    pub fn invalidate(&mut self, roots: &[NodeId], reset_roots: bool) -> Fallout {
        let mut fallout = Fallout::default();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();

        for &root in roots {
            if !visited.insert(root) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(root) else {
                continue;
            };
            if reset_roots {
                node.value = None;
                node.failed = false;
                node.flags.remove(NodeFlags::DIRTY);
            } else {
                node.flags.insert(NodeFlags::DIRTY);
            }
            node.stale(&mut fallout);
            fallout.touched += 1;
            fallout
                .notify
                .extend(node.subscribers.iter().map(|(_, f)| f.clone()));
            queue.extend(node.listeners.iter().copied());
        }

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if node.flags.contains(NodeFlags::DIRTY) {
                continue;
            }
            node.flags.insert(NodeFlags::DIRTY);
            node.stale(&mut fallout);
            fallout.touched += 1;
            fallout
                .notify
                .extend(node.subscribers.iter().map(|(_, f)| f.clone()));
            queue.extend(node.listeners.iter().copied());
        }

        fallout
    }

    /// `id` produced a new value: notify its subscribers and dirty its listeners.
    ///
    /// With `skip_in_flight`, in-flight listeners that awaited this node are
    /// left alone; they receive the new value through the shared future. A
    /// listener that only took a snapshot saw a value that is now outdated and
    /// is dirtied, which restarts its computation on the next read.
    pub fn changed(&mut self, id: NodeId, skip_in_flight: bool) -> Fallout {
        let Some(node) = self.nodes.get(id) else {
            return Fallout::default();
        };
        let own: Vec<Notify> = node.subscribers.iter().map(|(_, f)| f.clone()).collect();
        let listeners: Vec<NodeId> = node
            .listeners
            .iter()
            .copied()
            .filter(|l| {
                let awaiting = self
                    .nodes
                    .get(*l)
                    .is_some_and(|n| n.in_flight.is_some() && n.awaited.contains(&id));
                !(skip_in_flight && awaiting)
            })
            .collect();
        let mut fallout = self.invalidate(&listeners, false);
        fallout.notify.splice(0..0, own);
        fallout
    }

    /// Removes a node. Its listeners are marked dirty.
    pub fn remove(&mut self, id: NodeId) -> Fallout {
        self.remove_all_edges_for(id);
        let Some(mut node) = self.nodes.remove(id) else {
            return Fallout::default();
        };
        self.index.remove(&node.key);
        log::debug!("disposed `{}`", node.key);

        let listeners: Vec<NodeId> = node.listeners.drain().collect();
        for l in &listeners {
            if let Some(n) = self.nodes.get_mut(*l) {
                n.deps.retain(|d| *d != id);
                n.awaited.retain(|d| *d != id);
            }
        }
        let mut fallout = self.invalidate(&listeners, false);
        node.stale(&mut fallout);
        fallout
            .notify
            .extend(node.subscribers.drain(..).map(|(_, f)| f));
        fallout
    }

    /// Removes every node, returning their cleanups.
    pub fn clear(&mut self) -> Fallout {
        let mut fallout = Fallout::default();
        for (_, mut node) in self.nodes.drain() {
            node.stale(&mut fallout);
        }
        self.index.clear();
        fallout
    }

    pub fn subscribe(&mut self, id: NodeId, f: Notify) -> u64 {
        let sub = self.next_subscriber;
        self.next_subscriber += 1;
        self.nodes[id].subscribers.push((sub, f));
        sub
    }

    pub fn unsubscribe(&mut self, key: &ProviderKey, sub: u64) {
        if let Some(id) = self.lookup(key) {
            self.nodes[id].subscribers.retain(|(s, _)| *s != sub);
        }
    }
}
