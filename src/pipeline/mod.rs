//! Pipeline plumbing shared by the database and network processors:
//! the retry combinator, the middleware chain and request generators.

mod chain;
mod generator;
mod retry;

pub use chain::MiddlewareChain;
pub use generator::{generators, Generator};
pub use retry::retry;
