pub mod capture;
pub mod user;

pub use capture::*;
pub use user::*;
