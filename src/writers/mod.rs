pub mod bin_writer;

pub use bin_writer::BinTableWriter;
