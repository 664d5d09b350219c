pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, FrameSourceError};
pub use services::session::controller::{Collaborators, SessionController};
