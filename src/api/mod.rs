pub mod client;
pub mod error;
pub mod types;

pub use client::HttpApi;
pub use error::ApiError;
