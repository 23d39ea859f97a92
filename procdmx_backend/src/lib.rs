pub mod init;
pub mod mixer_utils;
pub mod plugins;
pub mod processes;
pub mod utilities;

#[cfg(test)]
mod tests;

pub use init::{
	async_main,
	EngineInterfaces,
};
pub use procdmx_plugin_framework::*;
