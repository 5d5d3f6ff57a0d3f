pub mod compose;
pub mod error;
pub mod runtime;
pub mod waiter;

pub use compose::*;
pub use error::*;
pub use runtime::*;
pub use waiter::*;
