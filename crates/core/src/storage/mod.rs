pub mod error;
pub mod history;
pub mod lock;

pub use error::StorageUnavailable;
pub use history::{CsvHistoryStore, HistoryStore};
