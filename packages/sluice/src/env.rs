//! Environments: type-keyed, read-only property bags
//!
//! Receivers expose an [`Env`] describing the context they complete into (stop token, scheduler,
//! allocator, domain, ...). Senders expose one as their "attributes" (completion schedulers,
//! domain). Entries are keyed by the query type, see [`Query`].

use crate::query::Query;
use std::{
    any::{Any, TypeId, type_name},
    fmt::{self, Debug, Formatter},
    sync::Arc,
};


/// Immutable, cheaply clonable, type-keyed property bag
///
/// Structurally this is a persistent linked list, so [`with`](Env::with) and
/// [`clone`](Clone::clone) never copy existing entries. Later entries shadow earlier ones for the
/// same query.
#[derive(Clone, Default)]
pub struct Env {
    head: Option<Arc<Node>>,
}

struct Node {
    key: TypeId,
    name: &'static str,
    forwarding: bool,
    value: Arc<dyn Any + Send + Sync>,
    next: Option<Arc<Node>>,
}

impl Env {
    /// Construct an environment with no entries
    pub fn empty() -> Self {
        Env { head: None }
    }

    /// Construct a new environment which answers `query` with `value`, and everything else the way
    /// `self` does
    pub fn with<Q: Query>(self, query: Q, value: Q::Output) -> Self {
        self.push(TypeId::of::<Q>(), type_name::<Q>(), query.forwarding(), Arc::new(value))
    }

    /// Look up the value for a query
    ///
    /// If the environment has no entry for the query, the query's fallback is used, which for most
    /// queries is none.
    pub fn query<Q: Query>(&self, query: &Q) -> Option<Q::Output> {
        self.lookup::<Q>().or_else(|| query.fallback())
    }

    /// Whether the environment has an entry for the query, not considering fallbacks
    pub fn contains<Q: Query>(&self) -> bool {
        self.nodes().any(|node| node.key == TypeId::of::<Q>())
    }

    /// Combine two environments, answering from `self` first and from `other` otherwise
    pub fn join(&self, other: &Env) -> Env {
        let mut own = self.nodes().collect::<Vec<_>>();
        let mut env = other.clone();
        while let Some(node) = own.pop() {
            env = env.push(node.key, node.name, node.forwarding, Arc::clone(&node.value));
        }
        env
    }

    /// The environment with non-forwarding entries removed
    ///
    /// This is the environment an adaptor passes through from its child, or to its child.
    pub fn forwarded(&self) -> Env {
        self.retain(|node| node.forwarding)
    }

    /// The environment with all entries for query `Q` removed
    pub fn without<Q: Query>(&self) -> Env {
        self.retain(|node| node.key != TypeId::of::<Q>())
    }

    /// Whether the environment has no entries
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    fn push(
        self,
        key: TypeId,
        name: &'static str,
        forwarding: bool,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Env { head: Some(Arc::new(Node { key, name, forwarding, value, next: self.head })) }
    }

    // rebuild with only the entries matching the predicate, keeping their order.
    fn retain(&self, keep: impl Fn(&Node) -> bool) -> Env {
        if self.nodes().all(&keep) {
            return self.clone();
        }
        let mut kept = self.nodes().filter(|node| keep(node)).collect::<Vec<_>>();
        let mut env = Env::empty();
        while let Some(node) = kept.pop() {
            env = env.push(node.key, node.name, node.forwarding, Arc::clone(&node.value));
        }
        env
    }

    fn lookup<Q: Query>(&self) -> Option<Q::Output> {
        self.nodes()
            .find(|node| node.key == TypeId::of::<Q>())
            .and_then(|node| node.value.downcast_ref::<Q::Output>())
            .cloned()
    }

    // iterate from most recently added entry to least.
    fn nodes(&self) -> impl Iterator<Item = &Node> {
        let mut next = self.head.as_deref();
        std::iter::from_fn(move || {
            let node = next?;
            next = node.next.as_deref();
            Some(node)
        })
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_list().entries(self.nodes().map(|node| node.name)).finish()
    }
}
