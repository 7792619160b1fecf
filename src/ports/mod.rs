pub mod config_renderer;
pub mod entity_store;

pub use config_renderer::{ConfigRenderer, RenderError, RenderResult};
pub use entity_store::{EntityStore, StoreError, StoreResult};
