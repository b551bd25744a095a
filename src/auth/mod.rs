pub mod cookie;
pub mod csrf;
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use handlers::router;
