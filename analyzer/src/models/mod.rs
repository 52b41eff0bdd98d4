pub mod analysis;
pub mod series;

pub use analysis::*;
pub use series::*;
