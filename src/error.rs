use std::thread::ThreadId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThreadError {
    #[error("Can't locate start method")]
    StartNotResolved,

    #[error("Thread creation failed: {0}")]
    SpawnFailed(String),

    #[error("Can't join my own thread ({0:?})")]
    SelfJoin(ThreadId),

    #[error("Can't find thread id {0:?}")]
    UnknownThread(ThreadId),
}
