pub mod adapter;
pub mod error;
pub mod executor;
pub mod generator;
pub mod migration;
pub mod orm;
pub mod schema;
pub mod settings;
pub mod template;
pub mod types;

pub use adapter::ActiveRecordAdapter;
pub use error::{Error, Result};
