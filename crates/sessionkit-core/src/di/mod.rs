pub mod depends;
pub mod error;
pub mod extract;
pub mod from_context;
pub mod try_from_event;

pub use depends::{DepScope, Depends};
pub use error::DiError;
pub use from_context::FromContext;
pub use try_from_event::TryFromEvent;
