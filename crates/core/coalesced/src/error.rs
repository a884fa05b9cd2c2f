use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
/// Coalescer error.
pub enum Error {
    /// The call's completion channel closed before a result was broadcast
    RecvError,
    /// Reached the `max_concurrent` amount of calls running at once
    MaxConcurrent,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RecvError => write!(f, "Unable to receive the call's result from the channel"),
            Error::MaxConcurrent => write!(f, "Max number of calls running at once"),
        }
    }
}

impl std::error::Error for Error {}
