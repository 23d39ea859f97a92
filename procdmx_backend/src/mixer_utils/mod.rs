pub mod addressing;
pub mod bit_assignment;
pub mod channel_group;
pub mod default_blender;
pub mod state;
