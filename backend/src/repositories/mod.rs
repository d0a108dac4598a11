pub mod memory;
pub mod postgres;
pub mod principal;

pub use memory::InMemoryPrincipalStore;
pub use postgres::PgPrincipalStore;
pub use principal::{PrincipalStore, StoreError, StoreResult};
