pub mod sessions;
pub mod users;

pub use sessions::*;
pub use users::*;
