pub mod error;
pub mod hash;
pub mod mphf;
pub mod rank;
mod serialize;

pub use error::*;
pub use hash::*;
pub use mphf::*;
pub use rank::*;
