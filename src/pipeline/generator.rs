use crate::error::Outcome;
use crate::request::Request;

/// Lazily produces the next request from the previous step's value.
///
/// Generators run only after the previous step succeeded. `R` defaults to a
/// database [`Request`]; network pipelines use `NetworkRequest`.
pub type Generator<P, R = Request> = Box<dyn FnOnce(P) -> Outcome<R> + Send>;

pub mod generators {
    use super::*;

    /// Ignore the previous value and issue `request`.
    pub fn constant<P, R>(request: R) -> Generator<P, R>
    where
        R: Send + 'static,
    {
        Box::new(move |_| Ok(request))
    }

    pub fn from_fn<P, R, F>(f: F) -> Generator<P, R>
    where
        F: FnOnce(P) -> Outcome<R> + Send + 'static,
    {
        Box::new(f)
    }
}
