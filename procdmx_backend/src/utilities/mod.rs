pub mod config;
pub mod serialized_data;
