pub mod arbiter;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod metrics;
pub mod service;
pub mod store;
pub mod sweeper;

pub use arbiter::*;
pub use clock::*;
pub use config::*;
pub use domain::*;
pub use error::*;
pub use inventory::*;
pub use ledger::*;
pub use metrics::*;
pub use service::*;
pub use store::*;
pub use sweeper::*;
