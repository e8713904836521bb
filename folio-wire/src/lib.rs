//! A minimal RESP client and bounded connection pool for talking to the
//! remote store that backs Folio's persistence and history layers. This
//! crate knows nothing about records, tags, or diffs, only bytes in,
//! bytes out.

mod client;
mod pool;
mod resp;

pub use client::{Credentials, Pipeline, WireClient};
pub use pool::{ConnPool, PoolConfig};
pub use resp::Reply;
