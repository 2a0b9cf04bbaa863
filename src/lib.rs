pub mod config;
pub mod domain;
pub mod logger;
pub mod server;

pub use config::*;
pub use domain::*;
pub use logger::*;
pub use server::ApplicationServer;
pub use server::*;
