pub mod chunk;
pub mod config;
pub mod digest;
pub mod error;
pub mod extract;
pub mod timestamps;
