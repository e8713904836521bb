use std::fmt;
use std::ops::Deref;

use folio_errors::FolioError;

/// A tag name: a non-empty identifier. Cheap to clone, since it's backed by
/// a reference-counted string rather than an owned `String` per occurrence.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Word(std::sync::Arc<str>);

impl Word {
    /// Parse a tag name, rejecting the empty string.
    ///
    /// `spec.md` only requires non-emptiness; it does not define a closed
    /// identifier grammar (that lives in the tag-predicate parser, which is
    /// out of scope), so this is intentionally permissive beyond that.
    pub fn try_new(s: impl Into<String>) -> Result<Self, FolioError> {
        let s = s.into();
        if s.is_empty() {
            return Err(FolioError::commit("tag name must not be empty"));
        }
        Ok(Word(s.into()))
    }

    /// Construct a `Word` from a literal known to be valid at compile time.
    pub fn new_unchecked(s: &str) -> Self {
        debug_assert!(!s.is_empty(), "Word::new_unchecked called with empty str");
        Word(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Word {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Word {
    fn from(s: &str) -> Self {
        Word::new_unchecked(s)
    }
}

/// The well-known reserved tag names, named once so callers and the commit
/// pipeline never retype the string literal.
pub mod reserved {
    use super::Word;

    pub fn id() -> Word {
        Word::new_unchecked("id")
    }
    pub fn mod_() -> Word {
        Word::new_unchecked("mod")
    }
    pub fn trash() -> Word {
        Word::new_unchecked("trash")
    }
    pub fn point() -> Word {
        Word::new_unchecked("point")
    }
    pub fn his() -> Word {
        Word::new_unchecked("his")
    }
    pub fn aux() -> Word {
        Word::new_unchecked("aux")
    }
    pub fn unit() -> Word {
        Word::new_unchecked("unit")
    }
    pub fn tz() -> Word {
        Word::new_unchecked("tz")
    }
    pub fn dis_macro() -> Word {
        Word::new_unchecked("disMacro")
    }
    pub fn his_size() -> Word {
        Word::new_unchecked("hisSize")
    }
    pub fn his_start() -> Word {
        Word::new_unchecked("hisStart")
    }
    pub fn his_start_val() -> Word {
        Word::new_unchecked("hisStartVal")
    }
    pub fn his_end() -> Word {
        Word::new_unchecked("hisEnd")
    }
    pub fn his_end_val() -> Word {
        Word::new_unchecked("hisEndVal")
    }
}
