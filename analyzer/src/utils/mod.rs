pub mod csv_loader;
pub mod logger;

pub use csv_loader::*;
pub use logger::*;
