//! Funding flows subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP fund request
//!     → service.rs (one attempt per experiment, guard + lifecycle)
//!     → sequencer.rs (Idle → Approving → Approved → Depositing → Complete)
//!     → submit.rs (build, sign, broadcast)
//!     → watcher.rs (receipt polling until confirmation depth)
//!
//! withdraw / bet / claim → claim.rs (single-step flows, claim bounded by
//! a wall-clock timeout)
//! ```

pub mod amount;
pub mod claim;
pub mod sequencer;
pub mod service;
pub mod submit;
pub mod types;
pub mod watcher;

pub use amount::TokenAmount;
pub use sequencer::FundingSequencer;
pub use service::{FlowOutcome, FundOutcome, FundingService};
pub use submit::{TransactionSubmitter, WalletSubmitter};
pub use types::{FundingError, SequencerState, TransactionHandle};
pub use watcher::{ConfirmationWatcher, ConfirmedAt, ReceiptWatcher};
