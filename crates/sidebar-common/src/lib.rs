pub mod error;
pub mod message;
pub mod page;

pub use error::{Error, Result};
pub use message::{Turn, TurnRole};
pub use page::{PageContext, TabId};
