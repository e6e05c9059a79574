mod ids;
mod token;

pub use ids::*;
pub use token::*;
