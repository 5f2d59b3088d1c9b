mod echo;
mod fallback;
mod health;

pub use echo::echo;
pub use fallback::{method_not_allowed, not_found};
pub use health::health_check;
