// implementation of the run-loop execution contexts.
//
// the basic architecture is a FIFO of boxed tasks behind a mutex:
//
// run-loop handles and schedulers wrap around Arc<shared state>
//                                              |
//          /-----------------------------------/
//          v
//       shared state
//          |
//          |------ it contains a VecDeque of boxed tasks. a task is a started schedule operation,
//          |       which owns the receiver it will complete.
//          |
//          |------ it contains a condvar, which threads blocked waiting for a task wait on.
//          |
//          \------ it contains a state byte: running, finished (draining), or closed.
//
// tasks are always executed or abandoned with the mutex unlocked, because executing a task runs
// arbitrary receiver code, which may well schedule more tasks onto the same loop.
//
// the organization of these modules is as such:
//
//      core: The queue, the state machine, and the blocking pop. Panicky and minimal.
//       ^
//       |
//      api: The run-loop types, the scheduler, and its schedule sender, as re-exported publicly.
//
// the thread pool and sync_wait are both built on the synchronized run-loop.

pub(crate) mod api;

mod core;

pub use self::api::*;
