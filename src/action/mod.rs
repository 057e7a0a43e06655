pub mod invocation;
pub mod registry;

pub use invocation::{decode, ActionInvocation, CalendarAction};
pub use registry::{ActionDescriptor, ActionRegistry, ParameterSpec, ParameterType};
