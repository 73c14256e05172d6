// test doubles shared between unit test modules.

use crate::{
    completion::Completion,
    env::Env,
    error::Error,
    receiver::Receiver,
};
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};


// receiver which records every completion it receives.
//
// the exactly-once contract is enforced by ownership for well-behaved code, so recording more than
// one completion means something cloned or forged a receiver.
pub(crate) struct Recorder<V> {
    log: Arc<Mutex<Vec<Completion<V>>>>,
    env: Env,
}

// test-side view of what a recorder received.
pub(crate) struct Recording<V> {
    log: Arc<Mutex<Vec<Completion<V>>>>,
}

impl<V> Recorder<V> {
    pub(crate) fn new() -> (Self, Recording<V>) {
        Recorder::with_env(Env::empty())
    }

    pub(crate) fn with_env(env: Env) -> (Self, Recording<V>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (Recorder { log: Arc::clone(&log), env }, Recording { log })
    }
}

impl<V: Send + 'static> Receiver<V> for Recorder<V> {
    fn set_value(self, value: V) {
        self.log.lock().unwrap().push(Completion::Value(value));
    }

    fn set_error(self, error: Error) {
        self.log.lock().unwrap().push(Completion::Error(error));
    }

    fn set_stopped(self) {
        self.log.lock().unwrap().push(Completion::Stopped);
    }

    fn env(&self) -> Env {
        self.env.clone()
    }
}

impl<V> Recording<V> {
    // number of completions received so far.
    pub(crate) fn count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    // assert exactly one completion was received and take it.
    pub(crate) fn single(&self) -> Completion<V> {
        let mut log = self.log.lock().unwrap();
        assert_eq!(log.len(), 1, "expected exactly one completion");
        log.pop().unwrap()
    }

    // assert exactly one value completion was received and take the value.
    pub(crate) fn value(&self) -> V
    where
        V: Debug,
    {
        match self.single() {
            Completion::Value(value) => value,
            other => panic!("expected value completion, got {:?}", other),
        }
    }

    // assert exactly one error completion was received and take the error.
    pub(crate) fn error(&self) -> Error
    where
        V: Debug,
    {
        match self.single() {
            Completion::Error(error) => error,
            other => panic!("expected error completion, got {:?}", other),
        }
    }

    // assert exactly one stopped completion was received.
    pub(crate) fn stopped(&self)
    where
        V: Debug,
    {
        match self.single() {
            Completion::Stopped => (),
            other => panic!("expected stopped completion, got {:?}", other),
        }
    }
}
