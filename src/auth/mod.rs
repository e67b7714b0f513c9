pub mod extractors;
pub mod password;
pub mod session;

pub use extractors::{safe_next, Anonymous, CurrentUser};
