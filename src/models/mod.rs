pub mod incidence;
pub mod user;

pub use incidence::*;
pub use user::*;
