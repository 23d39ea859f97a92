pub mod core;

pub mod connector;
pub mod input_router;
pub mod output_dmx;
pub mod scheduler;
