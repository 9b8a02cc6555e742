pub mod api;
pub mod auth;
pub mod binding;
pub mod cli;
pub mod siwe;
pub mod store;
pub mod totp;
