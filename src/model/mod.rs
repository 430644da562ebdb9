pub mod branch;
pub mod created;

pub use branch::*;
pub use created::*;
