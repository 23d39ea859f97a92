//! Ready-made processes for common lighting behaviours

pub mod connector_control;
pub mod fade;
pub mod input_forwarder;
pub mod round_robin;

pub use connector_control::ConnectorControl;
pub use fade::Fade;
pub use input_forwarder::InputForwarder;
pub use round_robin::RoundRobin;
