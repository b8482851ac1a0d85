pub mod error;
pub mod proto;
pub mod rest;
pub mod util;
pub mod test_util;

pub use error::{AblyError, Result};
