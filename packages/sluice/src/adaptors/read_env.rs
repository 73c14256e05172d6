// sender reading a capability from its receiver's environment.

use crate::{
    basic::{BasicSender, SenderImpl, StartImpl},
    completion::CompletionSignatures,
    env::Env,
    error::{Error, QueryUnavailable},
    query::Query,
    receiver::Receiver,
};


/// Tag for [`read_env`]
pub struct ReadEnvTag;

/// Sender returned by [`read_env`]
pub type ReadEnv<Q> = BasicSender<ReadEnvTag, Q, ()>;

/// Sender completing with the answer to `query` from the environment of the receiver it is
/// connected to
///
/// If the environment neither carries the query nor has a fallback for it, completes with a
/// [`QueryUnavailable`] error.
pub fn read_env<Q: Query>(query: Q) -> ReadEnv<Q> {
    BasicSender::new(query, ())
}

impl<Q: Query> SenderImpl<Q, ()> for ReadEnvTag {
    type Value = Q::Output;
    type State = Q;

    fn get_state(query: Q) -> Q {
        query
    }

    fn signatures(query: &Q, _: &(), env: &Env) -> CompletionSignatures {
        let value = CompletionSignatures::value::<Q::Output>();
        if env.query(query).is_some() {
            value
        } else {
            value.union(&CompletionSignatures::error())
        }
    }
}

impl<Q: Query> StartImpl<Q> for ReadEnvTag {
    fn start<R: Receiver<Q::Output>>(query: Q, receiver: R) {
        match receiver.env().query(&query) {
            Some(value) => receiver.set_value(value),
            None => receiver.set_error(Error::new(QueryUnavailable::of::<Q>())),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        completion::Channel,
        query::{GetScheduler, GetStopToken},
        sender::{connect, Sender},
        operation::OperationState,
        stop::StopSource,
        test_util::Recorder,
    };

    #[test]
    fn missing_capability_is_error() {
        let (recorder, recording) = Recorder::new();
        connect(read_env(GetScheduler), recorder).start();
        let error = recording.error();
        let unavailable = error.downcast_ref::<QueryUnavailable>().unwrap();
        assert!(unavailable.query.ends_with("GetScheduler"));
    }

    #[test]
    fn stop_token_falls_back() {
        let (recorder, recording) = Recorder::new();
        connect(read_env(GetStopToken), recorder).start();
        assert!(!recording.value().stop_possible());
    }

    #[test]
    fn reads_receiver_env() {
        let source = StopSource::new();
        let (recorder, recording) = Recorder::with_env(
            Env::empty().with(GetStopToken, source.token())
        );
        connect(read_env(GetStopToken), recorder).start();
        assert_eq!(recording.value(), source.token());
    }

    #[test]
    fn signatures_depend_on_env() {
        assert!(read_env(GetScheduler).completion_signatures(&Env::empty()).sends(Channel::Error));
        assert!(!read_env(GetStopToken).completion_signatures(&Env::empty()).sends(Channel::Error));
    }
}
