pub mod auth;
pub mod error;
pub mod routes;
pub mod serde_ext;
pub mod validation;
