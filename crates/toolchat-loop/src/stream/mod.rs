pub mod assembler;

pub use assembler::{assemble, AssembleError, AssembledResponse, PartialResponse, StreamUpdate};
