//! Transport implementations

pub mod circuit_breaker;
pub mod console;
pub mod dead_letter;
pub mod file;
pub mod filterable;
pub mod memory;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreakerMetrics, CircuitBreakerOptions, CircuitBreakerTransport, ResetHook,
    StateChangeHook, TripHook,
};
pub use console::ConsoleTransport;
pub use dead_letter::{DeadLetter, DeadLetterCallback, DeadLetterOptions, DeadLetterQueue};
pub use file::FileTransport;
pub use filterable::FilterableTransport;
pub use memory::MemoryTransport;
pub use retry::{
    CircuitHook, RetryAttemptHook, RetryExhaustedHook, RetryHooks, RetryOptions, RetryTransport,
};
