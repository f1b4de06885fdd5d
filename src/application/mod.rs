//! Application Layer - Order execution, retry and the rebalancing loop

pub mod shutdown;
pub mod retry;
pub mod executor;
pub mod orchestrator;

pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use retry::RetryPolicy;
pub use executor::{ExecutionError, OrderExecutor};
pub use orchestrator::{time_until_next_period, CycleOutcome, Orchestrator, OrchestratorError};
