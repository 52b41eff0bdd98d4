pub mod dates;
pub mod symbols;

pub use dates::*;
pub use symbols::*;
