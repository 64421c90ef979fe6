// adsim - Library root for testing

pub mod config;
pub mod error;
pub mod retry;
pub mod services;
pub mod session;
pub mod store;
