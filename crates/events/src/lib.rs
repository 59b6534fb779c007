//! Log events and the publishing abstraction used to forward them.

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;

pub use bus::{EventPublisher, Subscription};
pub use envelope::LogEvent;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
