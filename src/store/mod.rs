pub mod mem;
pub mod neon;
pub mod traits;
pub mod transport;

pub use mem::*;
pub use neon::*;
pub use traits::*;
pub use transport::Transport;
