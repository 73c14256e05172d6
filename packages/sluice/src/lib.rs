//! Structured asynchronous execution with senders and receivers.
//!
//! A [`Sender`] is a lazy description of asynchronous work. Connecting it to a [`Receiver`]
//! produces an [`OperationState`], and starting that runs the work, which eventually completes the
//! receiver on exactly one of three channels: value, error, or stopped.
//!
//! Work is composed with the adaptors ([`then`], [`let_value`], [`upon_error`], ...), each of which
//! comes in a free function, a [`SenderExt`] method, and a [`pipe`] form. It is moved between
//! execution contexts through [`Scheduler`]s, such as those of a [`RunLoop`], a [`ThreadPool`], or
//! a tokio runtime. Queries against [`Env`]s carry context like stop tokens and schedulers between
//! senders and receivers, and [`Domain`]s let execution contexts substitute their own
//! implementations of senders at connect time.
//!
//! ```
//! use sluice::{schedule, sync_wait, SenderExt, ThreadPool};
//!
//! let pool = ThreadPool::new(2).unwrap();
//! let sender = schedule(&pool.scheduler())
//!     .then(|()| 6)
//!     .let_value(|n| sluice::just(n * 7));
//! assert_eq!(sync_wait(sender).unwrap(), Some(42));
//! ```

#[macro_use]
extern crate tracing;

mod completion;
mod env;
mod query;
mod stop;
mod receiver;
mod operation;
mod sender;
mod domain;
mod adaptors;
mod scheduler;
mod run_loop;
mod thread_pool;
mod sync_wait;
mod signal;
#[cfg(feature = "tokio")]
mod tokio_rt;
#[cfg(test)]
mod test_util;

pub mod basic;

pub use crate::{
    adaptors::{
        just,
        just_error,
        just_stopped,
        let_error,
        let_stopped,
        let_value,
        pipe,
        read_env,
        then,
        upon_error,
        upon_stopped,
        SenderExt,
    },
    completion::{
        Channel,
        ChannelTag,
        Completion,
        CompletionSignatures,
        SetError,
        SetStopped,
        SetValue,
        Signature,
    },
    domain::{late_domain, Algorithm, Domain, DomainBuilder},
    env::Env,
    operation::{start, OperationHandle, OperationState},
    query::*,
    receiver::{AnyReceiver, Receiver},
    run_loop::{RunLoop, RunLoopScheduler, ScheduleOperation, ScheduleSender, SynchronizedRunLoop},
    scheduler::{schedule, AnyScheduler, Scheduler},
    sender::{
        completion_signatures,
        connect,
        AnySender,
        Connected,
        Sender,
        Transformed,
        MAX_TRANSFORM_DEPTH,
    },
    signal::{signal, Signal, SignalOperation, SignalSender},
    stop::{StopSource, StopToken},
    sync_wait::{sync_wait, sync_wait_timeout, SyncWait},
    thread_pool::{ThreadPool, ThreadPoolBuilder},
};
#[cfg(feature = "tokio")]
pub use crate::tokio_rt::{TokioScheduleOperation, TokioScheduleSender, TokioScheduler};

/// Error types
pub mod error;

/// Adaptor sender types
pub mod senders {
    pub use crate::adaptors::{
        Just,
        JustError,
        JustErrorData,
        JustStopped,
        JustStoppedData,
        JustTag,
        LetError,
        LetStopped,
        LetTag,
        LetValue,
        ReadEnv,
        ReadEnvTag,
        Then,
        ThenTag,
        UponError,
        UponStopped,
    };
}

pub use crate::error::Error;
