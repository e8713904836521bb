//! The concurrent record cache, tag indexing, query planning and the
//! single-writer commit pipeline that sits on top of [`folio_wire`].

mod cache;
mod codec;
mod commit;
mod filter;
mod hooks;
mod query;
mod store;

pub use codec::{decode_dict, decode_value_bytes, encode_dict, encode_value_bytes};
pub use filter::Predicate;
pub use hooks::CommitHooks;
pub use store::{ReadOpts, RecordStore, RecordStoreStats, Sort};
