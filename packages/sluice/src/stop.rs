//! Cooperative cancellation
//!
//! A [`StopSource`] owns the right to request stop. [`StopToken`]s observe it. Stop is advisory:
//! work which sees a stop request is expected to complete with the stopped channel as soon as it
//! conveniently can, but nothing is interrupted.

use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{
            AtomicBool,
            Ordering::{Acquire, AcqRel},
        },
        Arc,
    },
};


/// Owner of a stop flag, from which [`StopToken`]s are derived
#[derive(Clone, Default)]
pub struct StopSource {
    flag: Arc<AtomicBool>,
}

impl StopSource {
    /// Construct a stop source on which stop has not yet been requested
    pub fn new() -> Self {
        StopSource::default()
    }

    /// Get a token observing this source
    pub fn token(&self) -> StopToken {
        StopToken { flag: Some(Arc::clone(&self.flag)) }
    }

    /// Request stop. Returns true if this call was the one which requested it.
    pub fn request_stop(&self) -> bool {
        !self.flag.swap(true, AcqRel)
    }

    /// Whether stop has been requested
    pub fn stop_requested(&self) -> bool {
        self.flag.load(Acquire)
    }
}

impl Debug for StopSource {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("StopSource").field("stop_requested", &self.stop_requested()).finish()
    }
}

/// Observer of a [`StopSource`], or the never-stop token
///
/// The default value is the never-stop token, for which stop is neither possible nor ever
/// requested. It is what the stop token query falls back to when an environment carries none.
#[derive(Clone, Default)]
pub struct StopToken {
    // none for the never-stop token.
    flag: Option<Arc<AtomicBool>>,
}

impl StopToken {
    /// The never-stop token
    pub fn never() -> Self {
        StopToken { flag: None }
    }

    /// Whether stop has been requested on the associated source
    pub fn stop_requested(&self) -> bool {
        self.flag.as_ref().is_some_and(|flag| flag.load(Acquire))
    }

    /// Whether stop could ever be requested through this token
    pub fn stop_possible(&self) -> bool {
        self.flag.is_some()
    }
}

impl PartialEq for StopToken {
    fn eq(&self, other: &Self) -> bool {
        match (&self.flag, &other.flag) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for StopToken {}

impl Debug for StopToken {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.stop_possible() {
            f.debug_struct("StopToken").field("stop_requested", &self.stop_requested()).finish()
        } else {
            f.write_str("StopToken(never)")
        }
    }
}
