// socialcoin-core: bonding curve social token exchange.
// pricing and funding math run before a trade is built; the subject ledger
// keeps its invariants after the trade is applied. integer amounts throughout.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: Identity, UnitId, Direction, FeeRate, Timestamp
//   2.x  curve.rs: bonding curve shapes and range pricing
//   3.x  fees.rs: protocol/subject fee application, PriceQuote
//   4.x  selector.rs: greedy-prefix funding unit selection
//   4.2  wallet.rs: funding source trait, reservations, carve plans
//   5.x  ledger.rs: subject state machine, Global fee/curve settings
//   5.3  store.rs: versioned ledger store with compare-and-set
//   7.x  config.rs: fee rates, curve, env presets
//   8.x  engine/: trade orchestration: quotes, issue/buy/sell, queries
//   11.x events.rs: trade events for audit

pub mod config;
pub mod curve;
pub mod engine;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod selector;
pub mod store;
pub mod types;
pub mod wallet;

pub use config::{ConfigError, Environment, ExchangeConfig};
pub use curve::*;
pub use engine::*;
pub use events::*;
pub use fees::*;
pub use ledger::*;
pub use selector::*;
pub use store::*;
pub use types::*;
pub use wallet::*;
