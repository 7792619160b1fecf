pub mod haproxy;
pub mod http;
pub mod redb_store;

pub use haproxy::{ConfigTemplate, HaproxyConfig};
pub use http::AdminServer;
pub use redb_store::RedbStore;
