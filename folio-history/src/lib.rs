//! Per-record time-series storage: each record with a `his` marker tag
//! gets a remote sorted set of `(timestamp, value)` points, read back with
//! the "prev / window / next-2" shape described for history queries, and
//! mirrored into cache-only summary tags (`hisSize`, `hisStart(+Val)`,
//! `hisEnd(+Val)`) that never persist and never advance a record's `mod`.

mod hooks;
mod span;
mod store;

pub use hooks::PostHisWriteHook;
pub use span::Span;
pub use store::{HistoryRead, HistoryStore, WriteOpts, WriteOutcome};
