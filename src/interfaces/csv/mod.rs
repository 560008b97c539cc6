pub mod payment_reader;
pub mod rollup_writer;
