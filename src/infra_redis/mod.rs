mod session_family_store_redis;

pub use session_family_store_redis::*;
