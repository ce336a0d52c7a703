pub mod error;
pub mod sanitize;
pub mod temp;

pub use error::{DocsenseError, Result};
