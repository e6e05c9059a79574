mod auth_repo_memory;
mod session_family_store_memory;
mod user_repo_memory;

pub use auth_repo_memory::*;
pub use session_family_store_memory::*;
pub use user_repo_memory::*;
