//! Operation states: connected, ready-to-start work

use std::fmt::{self, Debug, Formatter};


/// The result of connecting a sender to a receiver
///
/// An operation owns its receiver and everything needed to produce the completion. Starting it
/// consumes it, so it can neither be started twice nor touched afterwards. Once started, the
/// operation must eventually complete its receiver exactly once.
pub trait OperationState: Send + 'static {
    /// Initiate the work
    ///
    /// Must not block beyond initiating work. The receiver may be completed before this returns.
    fn start(self);
}

/// Start an operation
pub fn start<O: OperationState>(operation: O) {
    operation.start()
}


/// Type-erased [`OperationState`]
pub struct OperationHandle(Box<dyn FnOnce() + Send>);

impl OperationHandle {
    /// Erase the type of an operation
    pub fn new<O: OperationState>(operation: O) -> Self {
        OperationHandle(Box::new(move || operation.start()))
    }
}

impl OperationState for OperationHandle {
    fn start(self) {
        (self.0)()
    }
}

impl Debug for OperationHandle {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("OperationHandle")
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering::SeqCst},
        Arc,
    };

    struct Bump(Arc<AtomicUsize>);

    impl OperationState for Bump {
        fn start(self) {
            self.0.fetch_add(1, SeqCst);
        }
    }

    #[test]
    fn handle_starts_inner_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = OperationHandle::new(Bump(Arc::clone(&count)));
        assert_eq!(count.load(SeqCst), 0);
        start(handle);
        assert_eq!(count.load(SeqCst), 1);
    }
}
