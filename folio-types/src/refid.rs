use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

/// An opaque, immutable record identifier.
///
/// `Ref` carries an id string (immutable for the life of the instance) and a
/// mutable display-string slot that display-macro resolution patches in
/// place after the fact (§4.3 "Display-string resolution"). Equality and
/// hashing use the id only, never the display string, so a `Ref` can be used
/// as a cache key even while its display is being recomputed concurrently.
///
/// `RecordStore` is the only thing that hands out canonical instances (via
/// `internRef`); this type itself places no uniqueness guarantee on its own
/// constructors, it just carries the two fields and compares on id.
#[derive(Clone)]
pub struct Ref(Arc<Inner>);

struct Inner {
    id: Box<str>,
    display: RwLock<Box<str>>,
}

impl Ref {
    /// Construct a fresh `Ref`, with its display defaulting to the id
    /// string itself (overwritten later by display resolution).
    pub fn new(id: impl Into<String>) -> Self {
        let id: Box<str> = id.into().into_boxed_str();
        let display = RwLock::new(id.clone());
        Ref(Arc::new(Inner { id, display }))
    }

    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// The current display string. Cheap but not free: it clones out of the
    /// lock so callers never hold a reference across a potential
    /// `set_display` from another thread.
    pub fn display(&self) -> String {
        self.0.display.read().to_string()
    }

    /// Patch the display slot in place. Used only by display-macro
    /// resolution; ordinary reads/writes never touch this.
    pub fn set_display(&self, s: impl Into<String>) {
        *self.0.display.write() = s.into().into_boxed_str();
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for Ref {}

impl PartialOrd for Ref {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Ref {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for Ref {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ref").field(&self.0.id).finish()
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.id)
    }
}
