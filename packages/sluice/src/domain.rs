//! Domains: connect-time sender transformation
//!
//! A domain is a table of rewrite rules keyed by concrete sender type. When a sender is
//! [connected](crate::connect), its domain is determined from the sender's attributes and the
//! receiver's environment, and the sender is rewritten until no rule applies any more. This is the
//! hook through which an execution context substitutes its own implementation of an algorithm.
//!
//! Besides rewrite rules, a domain may carry environment rules, which change the environment an
//! adaptor's child is connected with, and apply rules, which take over running a consuming
//! [`Algorithm`] such as [`SyncWait`](crate::SyncWait).

use crate::{
    completion::{SetError, SetStopped, SetValue},
    env::Env,
    query::{get_completion_scheduler, get_domain, get_scheduler},
    scheduler::Scheduler,
    sender::{AnySender, Sender, Transformed},
};
use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};


// a rewrite rule for the concrete sender type S, stored type-erased in the rule table.
type Rule<S> = Box<dyn Fn(S, &Env) -> AnySender<<S as Sender>::Value> + Send + Sync>;

type EnvRule<S> = Box<dyn Fn(&S, &Env) -> Env + Send + Sync>;

type ApplyRule<A, S> = Box<dyn Fn(S) -> <A as Algorithm>::Output<S> + Send + Sync>;

type RuleTable<K> = HashMap<K, Box<dyn Any + Send + Sync>>;


/// A consuming algorithm whose implementation a domain may take over
///
/// The algorithm type is only used as a key, see [`DomainBuilder::apply_rule`].
pub trait Algorithm: 'static {
    /// What running the algorithm on a sender of type `S` produces
    type Output<S: Sender>: 'static;
}

/// Table of sender rewrite rules, or the default domain which has none
///
/// Cloning is cheap. Two domains are equal if they are both the default domain, or are clones of
/// the same built domain.
#[derive(Clone, Default)]
pub struct Domain {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    name: String,
    // values are Rule<S> where the key is TypeId::of::<S>()
    rules: RuleTable<TypeId>,
    // values are EnvRule<S>, keyed the same way
    env_rules: RuleTable<TypeId>,
    // values are ApplyRule<A, S> keyed by (TypeId::of::<A>(), TypeId::of::<S>())
    apply_rules: RuleTable<(TypeId, TypeId)>,
}

impl Domain {
    /// Begin building a domain with rewrite rules
    pub fn builder(name: impl Into<String>) -> DomainBuilder {
        DomainBuilder {
            name: name.into(),
            rules: HashMap::new(),
            env_rules: HashMap::new(),
            apply_rules: HashMap::new(),
        }
    }

    /// Whether this is the default domain
    pub fn is_default(&self) -> bool {
        self.inner.is_none()
    }

    /// Name of the domain, `"default"` for the default domain
    pub fn name(&self) -> &str {
        self.inner.as_ref().map(|inner| inner.name.as_str()).unwrap_or("default")
    }

    /// Apply one transformation pass to a sender
    ///
    /// If the domain has a rule for the sender's concrete type it is applied, otherwise the
    /// sender's own [`transform_sender`](Sender::transform_sender) hook decides.
    pub fn transform_sender<S: Sender>(&self, sender: S, env: &Env) -> Transformed<S> {
        match self.rule::<S>() {
            Some(rule) => {
                trace!(domain = self.name(), sender = type_name::<S>(), "applying domain rule");
                Transformed::Rewritten(rule(sender, env))
            }
            None => sender.transform_sender(self, env),
        }
    }

    /// Apply transformation passes until the sender reaches a fixed point, returning it type-erased
    ///
    /// Panics if no fixed point is reached within [`MAX_TRANSFORM_DEPTH`](crate::MAX_TRANSFORM_DEPTH)
    /// rewrites.
    pub fn transform_fully<S: Sender>(&self, sender: S, env: &Env) -> AnySender<S::Value> {
        let mut current = match self.transform_sender(sender, env) {
            Transformed::Unchanged(sender) => return sender.boxed(),
            Transformed::Rewritten(sender) => sender,
        };
        for _ in 1..crate::MAX_TRANSFORM_DEPTH {
            current = match self.transform_sender(current, env) {
                Transformed::Unchanged(sender) => return sender,
                Transformed::Rewritten(sender) => sender,
            };
        }
        panic!(
            "domain {:?} did not reach a fixed point transforming {} within {} rewrites",
            self, type_name::<S>(), crate::MAX_TRANSFORM_DEPTH,
        );
    }

    /// Whether the domain has a rewrite rule for senders of concrete type `S`
    pub fn has_rule<S: Sender>(&self) -> bool {
        self.rule::<S>().is_some()
    }

    /// Whether transforming `sender` in this domain may rewrite it, either by a rule of the domain
    /// or by the sender's own hook
    pub fn may_rewrite<S: Sender>(&self, sender: &S) -> bool {
        self.has_rule::<S>() || sender.may_transform(self)
    }

    /// Whether the domain has an environment rule for senders of concrete type `S`
    pub fn has_env_rule<S: Sender>(&self) -> bool {
        self.env_rule::<S>().is_some()
    }

    /// Transform the environment the children of `sender` are connected with
    ///
    /// Without an environment rule for `S` this is the identity.
    pub fn transform_env<S: Sender>(&self, sender: &S, env: Env) -> Env {
        match self.env_rule::<S>() {
            Some(rule) => {
                trace!(domain = self.name(), sender = type_name::<S>(), "applying env rule");
                rule(sender, &env)
            }
            None => env,
        }
    }

    /// Run algorithm `A` on `sender` with the domain's implementation of it
    ///
    /// Gives the sender back if the domain has no apply rule for `A` and `S`, in which case the
    /// caller runs its own implementation.
    pub fn apply_sender<A: Algorithm, S: Sender>(&self, sender: S) -> Result<A::Output<S>, S> {
        match self.apply_rule::<A, S>() {
            Some(rule) => {
                trace!(
                    domain = self.name(),
                    algorithm = type_name::<A>(),
                    sender = type_name::<S>(),
                    "applying algorithm rule"
                );
                Ok(rule(sender))
            }
            None => Err(sender),
        }
    }

    fn rule<S: Sender>(&self) -> Option<&Rule<S>> {
        self.inner.as_ref()?
            .rules.get(&TypeId::of::<S>())?
            .downcast_ref::<Rule<S>>()
    }

    fn env_rule<S: Sender>(&self) -> Option<&EnvRule<S>> {
        self.inner.as_ref()?
            .env_rules.get(&TypeId::of::<S>())?
            .downcast_ref::<EnvRule<S>>()
    }

    fn apply_rule<A: Algorithm, S: Sender>(&self) -> Option<&ApplyRule<A, S>> {
        self.inner.as_ref()?
            .apply_rules.get(&(TypeId::of::<A>(), TypeId::of::<S>()))?
            .downcast_ref::<ApplyRule<A, S>>()
    }
}

impl PartialEq for Domain {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Domain {}

impl Debug for Domain {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("Domain").field(&self.name()).finish()
    }
}


/// Builder for a [`Domain`]
pub struct DomainBuilder {
    name: String,
    rules: RuleTable<TypeId>,
    env_rules: RuleTable<TypeId>,
    apply_rules: RuleTable<(TypeId, TypeId)>,
}

impl DomainBuilder {
    /// Add a rule rewriting senders of concrete type `S`
    ///
    /// Replaces any rule previously added for `S`. The rule receives the environment of the
    /// receiver being connected to.
    ///
    /// Senders nested inside the rule's output are transformed again when they in turn get
    /// connected, so the output must not contain a sender of type `S` itself.
    pub fn rule<S, F>(mut self, rule: F) -> Self
    where
        S: Sender,
        F: Fn(S, &Env) -> AnySender<S::Value> + Send + Sync + 'static,
    {
        let rule: Rule<S> = Box::new(rule);
        self.rules.insert(TypeId::of::<S>(), Box::new(rule));
        self
    }

    /// Add a rule computing the environment the child of an adaptor of concrete type `S` is
    /// connected with, from the environment of the adaptor's receiver
    ///
    /// Replaces any environment rule previously added for `S`. Only adaptors built on
    /// [`BasicSender`](crate::basic::BasicSender) consult environment rules.
    pub fn env_rule<S, F>(mut self, rule: F) -> Self
    where
        S: Sender,
        F: Fn(&S, &Env) -> Env + Send + Sync + 'static,
    {
        let rule: EnvRule<S> = Box::new(rule);
        self.env_rules.insert(TypeId::of::<S>(), Box::new(rule));
        self
    }

    /// Add a rule running algorithm `A` on senders of concrete type `S` in place of the
    /// algorithm's own implementation
    ///
    /// Replaces any apply rule previously added for `A` and `S`.
    pub fn apply_rule<A, S, F>(mut self, rule: F) -> Self
    where
        A: Algorithm,
        S: Sender,
        F: Fn(S) -> A::Output<S> + Send + Sync + 'static,
    {
        let rule: ApplyRule<A, S> = Box::new(rule);
        self.apply_rules.insert((TypeId::of::<A>(), TypeId::of::<S>()), Box::new(rule));
        self
    }

    /// Finish building
    pub fn build(self) -> Domain {
        Domain {
            inner: Some(Arc::new(Inner {
                name: self.name,
                rules: self.rules,
                env_rules: self.env_rules,
                apply_rules: self.apply_rules,
            })),
        }
    }
}


/// Determine the domain a sender is connected in
///
/// In order of precedence: the domain in the sender's attributes, the domain shared by the
/// sender's completion schedulers, the domain in the receiver's environment, the domain of the
/// receiver's scheduler. A default domain at one step defers to later steps.
///
/// Panics if the sender's completion schedulers disagree on a domain.
pub fn late_domain(sender_attrs: &Env, receiver_env: &Env) -> Domain {
    let candidates = [
        get_domain(sender_attrs),
        completion_domain(sender_attrs),
        get_domain(receiver_env),
        get_scheduler(receiver_env).map(|scheduler| scheduler.domain()),
    ];
    candidates.into_iter()
        .flatten()
        .find(|domain| !domain.is_default())
        .unwrap_or_default()
}

pub(crate) fn resolve_domain(sender_attrs: &Env, receiver_env: &Env) -> Domain {
    let domain = late_domain(sender_attrs, receiver_env);
    if !domain.is_default() {
        trace!(domain = domain.name(), "resolved non-default domain");
    }
    domain
}

// the domain the sender's completion schedulers agree on, if it has any.
fn completion_domain(attrs: &Env) -> Option<Domain> {
    let schedulers = [
        get_completion_scheduler::<SetValue>(attrs),
        get_completion_scheduler::<SetError>(attrs),
        get_completion_scheduler::<SetStopped>(attrs),
    ];
    let mut found: Option<Domain> = None;
    for domain in schedulers.into_iter().flatten().map(|scheduler| scheduler.domain()) {
        match &found {
            None => found = Some(domain),
            Some(prev) if *prev == domain => (),
            Some(prev) => panic!(
                "sender completion schedulers disagree on domain: {:?} vs {:?}",
                prev, domain,
            ),
        }
    }
    found
}
