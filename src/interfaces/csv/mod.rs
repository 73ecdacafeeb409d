pub mod energy_reader;
pub mod session_writer;
