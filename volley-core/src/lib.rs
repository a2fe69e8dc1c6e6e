mod config;
mod constants;
mod data;
mod error;
mod threshold;
mod verdict;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use error::*;
pub use threshold::*;
pub use verdict::*;
