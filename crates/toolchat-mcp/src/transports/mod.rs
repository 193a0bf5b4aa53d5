pub mod sse;
pub mod stdio;

#[cfg(test)]
pub(crate) mod memory;

pub use sse::SseTransport;
pub use stdio::StdioTransport;
