use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};

use futures::future::{self, AbortHandle, Abortable, Either, FutureExt, LocalBoxFuture, Shared};
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::graph::{Edge, Fallout, Graph, NodeFlags, NodeId};
use crate::provider::ComputeFn;
use crate::{
    FutureProvider, InvalidationTarget, NodeStatus, Provider, ProviderError, ProviderKey,
    ProviderKind, ProviderRef, ProviderState, StateProvider,
};

type SharedResult<T> = Shared<LocalBoxFuture<'static, Result<T, ProviderError>>>;

struct Inner {
    graph: RefCell<Graph>,
    spawner: Box<dyn LocalSpawn>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // nobody is left to notify; only release resources
        let fallout = self.graph.get_mut().clear();
        for cleanup in fallout.cleanups {
            cleanup();
        }
    }
}

/// Owner of the provider graph.
///
/// Every provider value lives in exactly one container; handles are cheap
/// clones of the same graph. Dropping the last handle runs all registered
/// cleanups.
#[derive(Clone)]
pub struct ProviderContainer {
    inner: Rc<Inner>,
}

enum Resolved<T> {
    Ready(Result<T, ProviderError>),
    Pending {
        shared: SharedResult<T>,
        id: NodeId,
        generation: u64,
    },
}

// Clears COMPUTING even if the computation unwinds.
struct ComputeGuard<'a> {
    graph: &'a RefCell<Graph>,
    id: NodeId,
}

impl Drop for ComputeGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut g) = self.graph.try_borrow_mut()
            && let Some(node) = g.nodes.get_mut(self.id)
        {
            node.flags.remove(NodeFlags::COMPUTING);
        }
    }
}

impl ProviderContainer {
    /// Creates an empty container. Asynchronous providers are driven on `spawner`.
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                graph: RefCell::new(Graph::default()),
                spawner: Box::new(spawner),
            }),
        }
    }

    fn downgrade(&self) -> Weak<Inner> {
        Rc::downgrade(&self.inner)
    }

    /// Reads a synchronous provider, computing it if needed.
    ///
    /// # Panics
    ///
    /// If the provider (transitively) depends on itself.
    pub fn read<T: Clone + 'static>(&self, provider: &Provider<T>) -> T {
        self.try_read(provider).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_read<T: Clone + 'static>(&self, provider: &Provider<T>) -> Result<T, ProviderError> {
        self.read_sync(provider.key(), ProviderKind::Computed, &provider.compute)
    }

    /// Current value of a state cell, running its initializer on first read.
    ///
    /// # Panics
    ///
    /// If the initializer (transitively) depends on the cell itself.
    pub fn read_state<T: Clone + 'static>(&self, provider: &StateProvider<T>) -> T {
        self.try_read_state(provider)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_read_state<T: Clone + 'static>(
        &self,
        provider: &StateProvider<T>,
    ) -> Result<T, ProviderError> {
        self.read_sync(provider.key(), ProviderKind::State, &provider.init)
    }

    fn read_sync<T: Clone + 'static>(
        &self,
        key: &ProviderKey,
        kind: ProviderKind,
        compute: &ComputeFn<T>,
    ) -> Result<T, ProviderError> {
        let (id, generation, fallout) = {
            let mut g = self.inner.graph.borrow_mut();
            let id = g.node_for(key, kind);
            let node = &g.nodes[id];
            if node.flags.contains(NodeFlags::COMPUTING) {
                return Err(ProviderError::cycle(key));
            }
            if node.is_fresh()
                && let Some(value) = node.value.as_ref()
            {
                match value.downcast_ref::<T>() {
                    Some(v) => return Ok(v.clone()),
                    None => log::warn!("provider `{key}` cached a different type; recomputing"),
                }
            }
            let (generation, fallout) = g.begin_compute(id);
            g.nodes[id].flags.insert(NodeFlags::COMPUTING);
            (id, generation, fallout)
        };
        fallout.run();

        let guard = ComputeGuard {
            graph: &self.inner.graph,
            id,
        };
        let value = compute(&Ref::new(self.downgrade(), id, generation));
        drop(guard);

        let mut g = self.inner.graph.borrow_mut();
        if let Some(node) = g.nodes.get_mut(id)
            && node.generation == generation
        {
            node.value = Some(Box::new(value.clone()));
            node.flags.remove(NodeFlags::DIRTY);
        }
        Ok(value)
    }

    /// Replaces the value of a state cell. Listeners are marked dirty.
    pub fn set_state<T: 'static>(&self, provider: &StateProvider<T>, value: T) {
        let fallout = {
            let mut g = self.inner.graph.borrow_mut();
            let id = g.node_for(provider.key(), ProviderKind::State);
            let node = &mut g.nodes[id];
            node.value = Some(Box::new(value));
            node.flags.remove(NodeFlags::DIRTY);
            g.changed(id, false)
        };
        log::trace!(
            "state `{}` changed, {} dependents dirty",
            provider.key(),
            fallout.touched
        );
        fallout.run();
    }

    pub fn update_state<T: Clone + 'static>(
        &self,
        provider: &StateProvider<T>,
        f: impl FnOnce(&mut T),
    ) {
        let mut value = self.read_state(provider);
        f(&mut value);
        self.set_state(provider, value);
    }

    /// Snapshot of an asynchronous provider. Starts the computation when there
    /// is no fresh value and none in flight.
    pub fn read_async<T: Clone + 'static>(&self, provider: &FutureProvider<T>) -> ProviderState<T> {
        match self.resolve(provider) {
            Resolved::Ready(res) => res.into(),
            Resolved::Pending { .. } => ProviderState::Loading,
        }
    }

    /// Resolves once the provider has a value. Concurrent callers share the
    /// same in-flight computation.
    pub fn future<T: Clone + 'static>(
        &self,
        provider: &FutureProvider<T>,
    ) -> impl Future<Output = Result<T, ProviderError>> + use<T> {
        match self.resolve(provider) {
            Resolved::Ready(res) => Either::Left(future::ready(res)),
            Resolved::Pending {
                shared,
                id,
                generation,
            } => {
                // whoever observes the result first settles the node
                let weak = self.downgrade();
                Either::Right(shared.map(move |res| {
                    if let Some(inner) = weak.upgrade() {
                        ProviderContainer { inner }.complete(id, generation, res.clone());
                    }
                    res
                }))
            }
        }
    }

    fn resolve<T: Clone + 'static>(&self, provider: &FutureProvider<T>) -> Resolved<T> {
        let key = provider.key();
        let (id, generation, fallout) = {
            let mut g = self.inner.graph.borrow_mut();
            let id = g.node_for(key, ProviderKind::Future);
            let node = &g.nodes[id];
            if node.is_fresh() {
                if let Some(shared) = node
                    .in_flight
                    .as_ref()
                    .and_then(|f| f.downcast_ref::<SharedResult<T>>())
                {
                    return Resolved::Pending {
                        shared: shared.clone(),
                        id,
                        generation: node.generation,
                    };
                }
                if let Some(state) = node
                    .value
                    .as_ref()
                    .and_then(|v| v.downcast_ref::<ProviderState<T>>())
                {
                    match state {
                        ProviderState::Data(v) => return Resolved::Ready(Ok(v.clone())),
                        ProviderState::Error(e) => return Resolved::Ready(Err(e.clone())),
                        ProviderState::Loading => {}
                    }
                }
            }
            let (generation, fallout) = g.begin_compute(id);
            (id, generation, fallout)
        };
        fallout.run();

        let computation = (provider.compute)(Ref::new(self.downgrade(), id, generation));
        let shared: SharedResult<T> = computation
            .map(|res| res.map_err(ProviderError::from))
            .boxed_local()
            .shared();

        let (abort, registration) = AbortHandle::new_pair();
        let weak = self.downgrade();
        let task = Abortable::new(shared.clone(), registration).map(move |res| {
            // aborted once the node moved on to a newer generation
            let Ok(res) = res else { return };
            if let Some(inner) = weak.upgrade() {
                ProviderContainer { inner }.complete(id, generation, res);
            }
        });

        {
            let mut g = self.inner.graph.borrow_mut();
            if let Some(node) = g.nodes.get_mut(id)
                && node.generation == generation
            {
                node.in_flight = Some(Box::new(shared.clone()));
                node.task = Some(abort);
            }
        }
        if let Err(err) = self.inner.spawner.spawn_local(task) {
            log::error!("could not spawn computation for `{key}`: {err}");
        }
        Resolved::Pending {
            shared,
            id,
            generation,
        }
    }

    fn complete<T: 'static>(&self, id: NodeId, generation: u64, res: Result<T, ProviderError>) {
        let fallout = {
            let mut g = self.inner.graph.borrow_mut();
            let Some(node) = g.nodes.get_mut(id) else {
                return;
            };
            if node.generation != generation {
                log::trace!("discarding stale result for `{}`", node.key);
                return;
            }
            if node.in_flight.is_none() {
                // already settled by another observer
                return;
            }
            if let Err(e) = &res {
                log::debug!("`{}` failed: {e}", node.key);
            }
            node.in_flight = None;
            node.task = None;
            node.failed = res.is_err();
            node.value = Some(Box::new(ProviderState::from(res)));
            node.flags.remove(NodeFlags::DIRTY);
            g.changed(id, true)
        };
        fallout.run();
    }

    /// Records that the computation behind `r` read `key`.
    fn track(
        &self,
        r: &Ref,
        key: &ProviderKey,
        kind: ProviderKind,
        edge: Edge,
    ) -> Result<(), ProviderError> {
        let mut g = self.inner.graph.borrow_mut();
        let dep = g.node_for(key, kind);
        let current = g
            .nodes
            .get(r.node)
            .is_some_and(|n| n.generation == r.generation);
        if !current {
            // superseded computation; its reads no longer count
            return Ok(());
        }
        g.add_edge(dep, r.node, edge)
    }

    fn targets(g: &Graph, targets: impl IntoIterator<Item = InvalidationTarget>) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for target in targets {
            match target {
                InvalidationTarget::Provider(key) => ids.extend(g.lookup(&key)),
                InvalidationTarget::Family(name) => ids.extend(g.family_members(name)),
            }
        }
        ids
    }

    /// Drops the cached state of `target` and marks every dependent dirty.
    /// Nothing is recomputed until the next read.
    pub fn invalidate(&self, target: impl Into<InvalidationTarget>) -> usize {
        self.invalidate_many([target.into()])
    }

    /// Invalidates several targets as one batch; each affected node is marked
    /// and notified once. Returns the number of nodes touched.
    pub fn invalidate_many(&self, targets: impl IntoIterator<Item = InvalidationTarget>) -> usize {
        let fallout = {
            let mut g = self.inner.graph.borrow_mut();
            let roots = Self::targets(&g, targets);
            g.invalidate(&roots, true)
        };
        let touched = fallout.touched;
        log::debug!("invalidated {touched} nodes");
        fallout.run();
        touched
    }

    fn invalidate_node(&self, id: NodeId) {
        let fallout = self.inner.graph.borrow_mut().invalidate(&[id], true);
        fallout.run();
    }

    /// Removes `target` from the graph, running its cleanups. Dependents are
    /// marked dirty; a later read creates a fresh node.
    pub fn dispose(&self, target: impl Into<InvalidationTarget>) {
        let fallout = {
            let mut g = self.inner.graph.borrow_mut();
            let mut fallout = Fallout::default();
            for id in Self::targets(&g, [target.into()]) {
                fallout.absorb(g.remove(id));
            }
            fallout
        };
        fallout.run();
    }

    /// Tears down the whole graph, e.g. when the owning session ends.
    pub fn dispose_all(&self) {
        let fallout = self.inner.graph.borrow_mut().clear();
        log::debug!("disposed all providers");
        fallout.run();
    }

    /// Calls `f` whenever `provider` is invalidated, becomes dirty, or an
    /// asynchronous computation for it completes. The callback should re-read.
    pub fn listen(&self, provider: &impl ProviderRef, f: impl Fn() + 'static) -> ListenerHandle {
        let mut g = self.inner.graph.borrow_mut();
        let id = g.node_for(provider.key(), provider.kind());
        let sub = g.subscribe(id, Rc::new(f));
        ListenerHandle {
            container: self.downgrade(),
            key: provider.key().clone(),
            sub,
        }
    }

    pub fn contains(&self, provider: &impl ProviderRef) -> bool {
        self.inner.graph.borrow().lookup(provider.key()).is_some()
    }

    /// `None` when the provider has no node (never read, or disposed).
    pub fn status(&self, provider: &impl ProviderRef) -> Option<NodeStatus> {
        let g = self.inner.graph.borrow();
        g.lookup(provider.key()).map(|id| g.nodes[id].status())
    }

    pub fn is_dirty(&self, provider: &impl ProviderRef) -> bool {
        let g = self.inner.graph.borrow();
        g.lookup(provider.key())
            .is_some_and(|id| !g.nodes[id].is_fresh())
    }

    /// How many times the provider's computation has started.
    pub fn recompute_count(&self, provider: &impl ProviderRef) -> u64 {
        let g = self.inner.graph.borrow();
        g.lookup(provider.key())
            .map_or(0, |id| g.nodes[id].recomputes)
    }

    /// Keys of every node that transitively watches `provider`.
    pub fn dependents_of(&self, provider: &impl ProviderRef) -> Vec<ProviderKey> {
        let g = self.inner.graph.borrow();
        let Some(start) = g.lookup(provider.key()) else {
            return Vec::new();
        };
        let mut seen = std::collections::HashSet::new();
        let mut stack: Vec<NodeId> = g.nodes[start].listeners.iter().copied().collect();
        let mut out = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = g.nodes.get(id) {
                out.push(node.key.clone());
                stack.extend(node.listeners.iter().copied());
            }
        }
        out
    }

    pub fn snapshot(&self) -> Vec<NodeSnapshot> {
        let g = self.inner.graph.borrow();
        let mut nodes: Vec<NodeSnapshot> = g
            .nodes
            .values()
            .map(|n| NodeSnapshot {
                key: n.key.clone(),
                kind: n.kind,
                status: n.status(),
                dirty: !n.is_fresh(),
                dependencies: n
                    .deps
                    .iter()
                    .filter_map(|d| g.nodes.get(*d).map(|d| d.key.clone()))
                    .collect(),
                listeners: n.listeners.len(),
                subscribers: n.subscribers.len(),
                recomputes: n.recomputes,
            })
            .collect();
        nodes.sort_by_key(|n| n.key.to_string());
        nodes
    }
}

/// Read-only view of one node, for inspection tooling.
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    pub key: ProviderKey,
    pub kind: ProviderKind,
    pub status: NodeStatus,
    pub dirty: bool,
    pub dependencies: Vec<ProviderKey>,
    pub listeners: usize,
    pub subscribers: usize,
    pub recomputes: u64,
}

/// Subscription created by [`ProviderContainer::listen`]. Unsubscribes on drop.
pub struct ListenerHandle {
    container: Weak<Inner>,
    key: ProviderKey,
    sub: u64,
}

impl ListenerHandle {
    /// Unsubscribes now. Dropping the handle does the same.
    ///
    /// The subscription belongs to the node that existed when `listen` was
    /// called. Disposing that node ends it; a node created later for the same
    /// provider does not inherit it, so listen again after a dispose.
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the node this handle subscribed to still holds the subscription.
    pub fn is_attached(&self) -> bool {
        let Some(inner) = self.container.upgrade() else {
            return false;
        };
        let Ok(g) = inner.graph.try_borrow() else {
            return true;
        };
        g.lookup(&self.key)
            .is_some_and(|id| g.nodes[id].subscribers.iter().any(|(s, _)| *s == self.sub))
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        let Some(inner) = self.container.upgrade() else {
            return;
        };
        match inner.graph.try_borrow_mut() {
            Ok(mut g) => g.unsubscribe(&self.key, self.sub),
            Err(_) => log::warn!("listener for `{}` dropped while the graph is busy", self.key),
        };
    }
}

/// Handle given to a provider's computation.
///
/// Reads made through `watch*` become dependencies of the computation; when any
/// of them is invalidated the computation is marked dirty. `read*` reads
/// without subscribing.
#[derive(Clone)]
pub struct Ref {
    container: Weak<Inner>,
    node: NodeId,
    generation: u64,
}

impl Ref {
    fn new(container: Weak<Inner>, node: NodeId, generation: u64) -> Self {
        Self {
            container,
            node,
            generation,
        }
    }

    pub fn container(&self) -> Result<ProviderContainer, ProviderError> {
        self.container
            .upgrade()
            .map(|inner| ProviderContainer { inner })
            .ok_or(ProviderError::ContainerDropped)
    }

    fn live(&self) -> ProviderContainer {
        self.container().unwrap_or_else(|e| panic!("{e}"))
    }

    /// Whether this computation is still the node's current one.
    pub fn is_current(&self) -> bool {
        self.container.upgrade().is_some_and(|inner| {
            inner
                .graph
                .borrow()
                .nodes
                .get(self.node)
                .is_some_and(|n| n.generation == self.generation)
        })
    }

    /// # Panics
    ///
    /// On a dependency cycle, or if the container was dropped.
    pub fn watch<T: Clone + 'static>(&self, provider: &Provider<T>) -> T {
        self.try_watch(provider).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_watch<T: Clone + 'static>(&self, provider: &Provider<T>) -> Result<T, ProviderError> {
        let c = self.container()?;
        c.track(self, provider.key(), ProviderKind::Computed, Edge::Watch)?;
        c.try_read(provider)
    }

    /// # Panics
    ///
    /// On a dependency cycle, or if the container was dropped.
    pub fn watch_state<T: Clone + 'static>(&self, provider: &StateProvider<T>) -> T {
        let c = self.live();
        c.track(self, provider.key(), ProviderKind::State, Edge::Watch)
            .and_then(|()| c.try_read_state(provider))
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Snapshot of an asynchronous provider; the caller recomputes when it settles.
    pub fn watch_async<T: Clone + 'static>(&self, provider: &FutureProvider<T>) -> ProviderState<T> {
        let c = match self.container() {
            Ok(c) => c,
            Err(e) => return ProviderState::Error(e),
        };
        match c.track(self, provider.key(), ProviderKind::Future, Edge::Watch) {
            Ok(()) => c.read_async(provider),
            Err(e) => ProviderState::Error(e),
        }
    }

    /// Awaits an asynchronous provider and depends on it.
    pub fn watch_future<T: Clone + 'static>(
        &self,
        provider: &FutureProvider<T>,
    ) -> impl Future<Output = Result<T, ProviderError>> + use<T> {
        let pending = self.container().and_then(|c| {
            c.track(self, provider.key(), ProviderKind::Future, Edge::Await)?;
            Ok(c.future(provider))
        });
        async move { pending?.await }
    }

    /// # Panics
    ///
    /// If the container was dropped.
    pub fn read<T: Clone + 'static>(&self, provider: &Provider<T>) -> T {
        self.live().read(provider)
    }

    /// # Panics
    ///
    /// If the container was dropped.
    pub fn read_state<T: Clone + 'static>(&self, provider: &StateProvider<T>) -> T {
        self.live().read_state(provider)
    }

    pub fn read_future<T: Clone + 'static>(
        &self,
        provider: &FutureProvider<T>,
    ) -> impl Future<Output = Result<T, ProviderError>> + use<T> {
        let pending = self.container().map(|c| c.future(provider));
        async move { pending?.await }
    }

    /// Registers a cleanup that runs before this computation is replaced, when
    /// the node is invalidated, and on disposal. Runs immediately if the
    /// computation is already stale.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        let Some(inner) = self.container.upgrade() else {
            f();
            return;
        };
        {
            let mut g = inner.graph.borrow_mut();
            if let Some(node) = g.nodes.get_mut(self.node)
                && node.generation == self.generation
            {
                node.cleanups.push(Box::new(f));
                return;
            }
        }
        f();
    }

    /// Invalidates the node this computation belongs to.
    pub fn invalidate_self(&self) {
        if let Ok(c) = self.container() {
            c.invalidate_node(self.node);
        }
    }
}
