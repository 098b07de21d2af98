pub mod error;
pub mod format;
pub mod shutdown;
pub mod state;

pub use error::*;
pub use format::*;
pub use shutdown::*;
pub use state::*;
