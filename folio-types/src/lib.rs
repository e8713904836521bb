//! The Folio record data model: interned refs, ordered tag dicts, the typed
//! value union, proposed diffs, and history items. Nothing in this crate
//! talks to Redis or knows about caching. It's pure data.

mod dict;
mod diff;
mod his_item;
mod refid;
mod value;
mod word;

pub use dict::Dict;
pub use diff::Diff;
pub use his_item::HisItem;
pub use refid::Ref;
pub use value::Value;
pub use word::{reserved, Word};
