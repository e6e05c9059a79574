mod auth_repo_mysql;
mod user_repo_mysql;

pub use auth_repo_mysql::*;
pub use user_repo_mysql::*;
