//! Claims management core.
//!
//! Domain records, the [`ClaimStore`] persistence port with in-memory and
//! PostgreSQL backends, and the operations the web layer exposes: the claim
//! listing pipeline, the claim detail view, flag/note mutations and the
//! admin dashboard report.

pub mod dashboard;
pub mod detail;
pub mod error;
pub mod listing;
pub mod memory;
pub mod messages;
pub mod mutations;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod store;
pub mod types;

pub use dashboard::DashboardReport;
pub use detail::ClaimDetailView;
pub use error::{ClaimsError, ClaimsResult};
pub use listing::{list_claims, ClaimListing, ListParams};
pub use memory::MemoryStore;
pub use messages::{Message, MessageLevel};
pub use mutations::{add_note, flag_claim, FlagOutcome};
#[cfg(feature = "postgres")]
pub use postgres::{DatabaseConfig, PgClaimStore};
pub use store::ClaimStore;
