// store

mod session_family_store;

pub use session_family_store::*;

// repo

mod auth_repo;
mod user_repo;

pub use auth_repo::*;
pub use user_repo::*;
