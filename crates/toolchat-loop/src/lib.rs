pub mod config;
pub mod discovery;
pub mod runner;
pub mod state;
pub mod stream;

pub use config::OrchestratorConfig;
pub use discovery::{discover, Catalog};
pub use runner::{Orchestrator, TurnReport, TurnSummary};
pub use state::{TurnEvent, TurnMachine, TurnState};
pub use stream::{assemble, AssembleError, AssembledResponse, PartialResponse, StreamUpdate};
