pub mod bin_database;
pub mod window_record;

pub use bin_database::{BinDatabase, DatabaseKind};
pub use window_record::{read_window_record, remove_window_record, write_window_record};
