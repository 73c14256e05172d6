//! Queries and the standard query set
//!
//! A query is a type used as a key into an [`Env`]. Each standard query comes with a pure accessor
//! function, such as [`get_stop_token`], which is the usual way of asking an environment for it.

use crate::{
    completion::ChannelTag,
    domain::Domain,
    env::Env,
    scheduler::AnyScheduler,
    stop::StopToken,
};
use std::{
    alloc::GlobalAlloc,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
    sync::Arc,
};


/// A key into an [`Env`]
pub trait Query: Send + Sync + 'static {
    /// Type of value the query is answered with
    type Output: Clone + Send + Sync + 'static;

    /// Whether adaptors pass this query through from child attributes and to child receivers
    fn forwarding(&self) -> bool {
        true
    }

    /// Value to answer with when an environment has no entry for the query
    fn fallback(&self) -> Option<Self::Output> {
        None
    }
}

/// Whether a query is forwarded through adaptors
pub fn forwarding_query<Q: Query>(query: &Q) -> bool {
    query.forwarding()
}


/// How much progress a scheduler's execution agents are guaranteed to make relative to each other
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ForwardProgressGuarantee {
    /// Agents run concurrently; one blocking on another always gets unblocked
    Concurrent,
    /// Agents which have started running continue to make progress
    Parallel,
    /// No guarantee beyond eventually being run
    WeaklyParallel,
}

impl Default for ForwardProgressGuarantee {
    fn default() -> Self {
        ForwardProgressGuarantee::WeaklyParallel
    }
}

/// Shared handle to an allocator, as answered by [`GetAllocator`]
pub type Allocator = Arc<dyn GlobalAlloc + Send + Sync>;


// ==== standard queries ====


/// Query for the [`StopToken`] work should observe
///
/// Falls back to the never-stop token.
#[derive(Debug, Copy, Clone, Default)]
pub struct GetStopToken;

impl Query for GetStopToken {
    type Output = StopToken;

    fn fallback(&self) -> Option<StopToken> {
        Some(StopToken::never())
    }
}

/// Query for a scheduler's [`ForwardProgressGuarantee`]
///
/// Not forwarded. Falls back to [`ForwardProgressGuarantee::WeaklyParallel`].
#[derive(Debug, Copy, Clone, Default)]
pub struct GetForwardProgressGuarantee;

impl Query for GetForwardProgressGuarantee {
    type Output = ForwardProgressGuarantee;

    fn forwarding(&self) -> bool {
        false
    }

    fn fallback(&self) -> Option<ForwardProgressGuarantee> {
        Some(ForwardProgressGuarantee::WeaklyParallel)
    }
}

/// Query for the scheduler on which a receiver's continuation may schedule further work
#[derive(Debug, Copy, Clone, Default)]
pub struct GetScheduler;

impl Query for GetScheduler {
    type Output = AnyScheduler;
}

/// Query for a scheduler onto which blocking work may be delegated, such as the run-loop being
/// driven by a blocked thread
#[derive(Debug, Copy, Clone, Default)]
pub struct GetDelegationScheduler;

impl Query for GetDelegationScheduler {
    type Output = AnyScheduler;
}

/// Query on sender attributes for the scheduler on which completion on channel `C` happens
pub struct GetCompletionScheduler<C>(PhantomData<C>);

impl<C> GetCompletionScheduler<C> {
    /// Construct
    pub fn new() -> Self {
        GetCompletionScheduler(PhantomData)
    }
}

impl<C> Default for GetCompletionScheduler<C> {
    fn default() -> Self {
        GetCompletionScheduler::new()
    }
}

impl<C> Clone for GetCompletionScheduler<C> {
    fn clone(&self) -> Self {
        GetCompletionScheduler::new()
    }
}

impl<C> Copy for GetCompletionScheduler<C> {}

impl<C: ChannelTag> Debug for GetCompletionScheduler<C> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "GetCompletionScheduler<{:?}>", C::CHANNEL)
    }
}

impl<C: ChannelTag> Query for GetCompletionScheduler<C> {
    type Output = AnyScheduler;
}

/// Query for the [`Domain`] which transforms senders at connect time
#[derive(Debug, Copy, Clone, Default)]
pub struct GetDomain;

impl Query for GetDomain {
    type Output = Domain;
}

/// Query for the allocator operations should allocate from
#[derive(Debug, Copy, Clone, Default)]
pub struct GetAllocator;

impl Query for GetAllocator {
    type Output = Allocator;
}


// ==== accessors ====


/// Get the stop token, or the never-stop token if the environment carries none
pub fn get_stop_token(env: &Env) -> StopToken {
    env.query(&GetStopToken).unwrap_or_default()
}

/// Get the forward progress guarantee, or weakly parallel if the environment carries none
pub fn get_forward_progress_guarantee(env: &Env) -> ForwardProgressGuarantee {
    env.query(&GetForwardProgressGuarantee).unwrap_or_default()
}

/// Get the scheduler
pub fn get_scheduler(env: &Env) -> Option<AnyScheduler> {
    env.query(&GetScheduler)
}

/// Get the delegation scheduler
pub fn get_delegation_scheduler(env: &Env) -> Option<AnyScheduler> {
    env.query(&GetDelegationScheduler)
}

/// Get the completion scheduler for channel `C`
pub fn get_completion_scheduler<C: ChannelTag>(env: &Env) -> Option<AnyScheduler> {
    env.query(&GetCompletionScheduler::<C>::new())
}

/// Get the domain
pub fn get_domain(env: &Env) -> Option<Domain> {
    env.query(&GetDomain)
}

/// Get the allocator
pub fn get_allocator(env: &Env) -> Option<Allocator> {
    env.query(&GetAllocator)
}
