pub mod passcode;
pub mod session_manager;

pub use passcode::*;
pub use session_manager::*;
