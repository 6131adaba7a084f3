pub mod auth;
pub mod incidence;
pub mod upload;

pub use auth::AuthService;
pub use incidence::IncidenceService;
pub use upload::UploadService;
