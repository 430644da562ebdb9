pub mod lifecycle;
pub mod naming;

pub use lifecycle::*;
pub use naming::*;
