pub mod adaptation;
pub mod config;
pub mod constants;
pub mod ks;
pub mod logging;
pub mod store;
