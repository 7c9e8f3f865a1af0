//! Concrete [`EventSource`](crate::source::EventSource) implementations.
//!
//! The HTTP source is the production transport. Tests drive sessions through in-memory
//! sources instead.
mod http;

pub use http::HttpEventSource;
