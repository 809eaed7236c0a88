//! Server configuration

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{AppConfig, ProtocolConfig, SidebarConfig, SocketConfig, SocketMode, V1Spellings};
