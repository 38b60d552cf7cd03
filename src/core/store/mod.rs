// Key-value storage: the port, the server handler and per-plugin namespaces.

pub mod kv_store;
pub mod plugin_data;
pub mod server_handler;
pub mod server_models;

pub use kv_store::{KvStore, StoreError, MAX_INPUT_LENGTH};
pub use plugin_data::PluginDataManager;
pub use server_handler::ServerHandler;
pub use server_models::*;
