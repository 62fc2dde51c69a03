pub use access::{AccessGate, Caller, Capability};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use expenses::{Expense, ExpenseNew, ExpenseUpdate};
pub use itinerary::{ItineraryItem, ItineraryItemNew, ItineraryItemUpdate, ItineraryOp};
pub use ledger::{
    BALANCE_TOLERANCE, BalanceEntry, SETTLEMENT_EPSILON, SettlementSuggestion, compute_balances,
    optimize_settlements,
};
pub use members::Member;
pub use ops::{DocCommit, Engine, EngineBuilder, TripAccessGate};
pub use patch::{PatchError, PatchOp, apply_patch};
pub use proposals::{
    AiProposal, ApplyOutcome, DEFAULT_PROPOSAL_TTL_SECONDS, EditGenerator, EditRequest,
    ProposalStatus, ProposedEdits,
};
pub use settlements::{Settlement, SettlementMode, SettlementNew, SettlementUpdate};
pub use trip_doc::{INITIAL_REVISION, SCHEMA_VERSION, TripDoc, default_body};
pub use trip_links::TripLink;
pub use trips::Trip;

mod access;
mod clock;
mod error;
mod expenses;
mod itinerary;
mod ledger;
mod members;
mod ops;
mod patch;
mod proposals;
mod settlements;
mod trip_doc;
mod trip_links;
mod trips;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
