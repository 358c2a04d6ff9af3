#![allow(unreachable_pub)]

mod error;
mod outcome;
mod request;

pub use error::ErrorKind;
pub use outcome::Outcome;
pub use request::{FetchRequest, FetchResult};

/// The scrapegate `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
