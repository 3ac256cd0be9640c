// 8.0: trade orchestrator. quotes a request, funds it from the trader's units,
// carves exact payment pieces, applies the ledger transition, and settles.
// nothing is written unless the whole sequence succeeds.

mod config;
mod core;
mod pricing;
mod queries;
mod results;
mod trades;

pub use config::EngineConfig;
pub use core::Exchange;
pub use results::{ErrorKind, TradeError, TradeReceipt};
pub use trades::TradeRequest;
