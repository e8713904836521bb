use indexmap::IndexMap;

use crate::value::Value;
use crate::word::{reserved, Word};

/// An ordered mapping from tag name to tag value: a record, or a history
/// item's payload. Order is preserved for round-trip fidelity through the
/// opaque Trio codec, even though the engine itself never depends on it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dict(IndexMap<Word, Value>);

impl Dict {
    pub fn new() -> Self {
        Dict(IndexMap::new())
    }

    pub fn get(&self, tag: &Word) -> Option<&Value> {
        self.0.get(tag)
    }

    pub fn has(&self, tag: &Word) -> bool {
        self.0.contains_key(tag)
    }

    /// True if `tag` is present and its value is the marker singleton.
    pub fn has_marker(&self, tag: &Word) -> bool {
        matches!(self.0.get(tag), Some(Value::Marker))
    }

    pub fn set(&mut self, tag: Word, val: Value) {
        self.0.insert(tag, val);
    }

    pub fn remove(&mut self, tag: &Word) -> Option<Value> {
        self.0.shift_remove(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Word, &Value)> {
        self.0.iter()
    }

    /// Tag names other than `id`/`mod`, the set that participates in tag
    /// indexing (§3 invariant 2, §6 storage layout `idx:tag:{name}`).
    pub fn indexable_tags(&self) -> impl Iterator<Item = &Word> {
        let id = reserved::id();
        let mod_ = reserved::mod_();
        self.0.keys().filter(move |t| **t != id && **t != mod_)
    }

    pub fn id(&self) -> Option<&str> {
        match self.0.get(&reserved::id()) {
            Some(Value::Ref(r)) => Some(r.id()),
            Some(Value::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The `mod` stamp, as epoch milliseconds. Absent for transient-only
    /// records that were never persisted with a stamp.
    pub fn mod_millis(&self) -> Option<i64> {
        match self.0.get(&reserved::mod_()) {
            Some(Value::DateTime { epoch_millis, .. }) => Some(*epoch_millis),
            _ => None,
        }
    }

    pub fn is_trash(&self) -> bool {
        self.has_marker(&reserved::trash())
    }

    pub fn is_point(&self) -> bool {
        self.has_marker(&reserved::point())
    }

    pub fn is_his(&self) -> bool {
        self.has_marker(&reserved::his())
    }

    pub fn is_aux(&self) -> bool {
        self.has_marker(&reserved::aux())
    }

    pub fn unit(&self) -> Option<Word> {
        match self.0.get(&reserved::unit()) {
            Some(Value::Str(s)) => Word::try_new(s.clone()).ok(),
            _ => None,
        }
    }
}

impl FromIterator<(Word, Value)> for Dict {
    fn from_iter<T: IntoIterator<Item = (Word, Value)>>(iter: T) -> Self {
        Dict(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Dict {
    type Item = (&'a Word, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Word, Value>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
