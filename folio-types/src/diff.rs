use indexmap::IndexMap;

use crate::value::Value;
use crate::word::Word;

/// A proposed change to a single record, as submitted to the commit
/// pipeline (§4.3). `changes` maps a tag name to its new value, or to
/// [`Value::Remove`] to delete that tag.
#[derive(Clone, Debug, Default)]
pub struct Diff {
    id: String,
    expected_mod: Option<i64>,
    changes: IndexMap<Word, Value>,
    add: bool,
    remove: bool,
    transient: bool,
    force: bool,
}

impl Diff {
    /// A diff against an existing record, checked against `expected_mod`
    /// unless `force` is set.
    pub fn update(id: impl Into<String>, expected_mod: i64) -> Self {
        Diff {
            id: id.into(),
            expected_mod: Some(expected_mod),
            ..Default::default()
        }
    }

    /// A diff that creates a brand-new record. `expected_mod` is irrelevant
    /// here: the commit pipeline instead checks that no record with this id
    /// already exists (§4.3, duplicate-id invariant).
    pub fn create(id: impl Into<String>) -> Self {
        Diff {
            id: id.into(),
            add: true,
            ..Default::default()
        }
    }

    /// A diff that destroys an existing record outright: evicted from the
    /// cache and every index, deleted from storage. Soft deletion (setting
    /// the `trash` marker tag) is just an ordinary [`Self::update`] diff,
    /// not this.
    pub fn remove(id: impl Into<String>, expected_mod: i64) -> Self {
        Diff {
            id: id.into(),
            expected_mod: Some(expected_mod),
            remove: true,
            ..Default::default()
        }
    }

    pub fn set(mut self, tag: Word, val: Value) -> Self {
        self.changes.insert(tag, val);
        self
    }

    pub fn unset(mut self, tag: Word) -> Self {
        self.changes.insert(tag, Value::Remove);
        self
    }

    /// Marks this diff transient: it bypasses persistence entirely and the
    /// `mod` stamp is left untouched (§5, "transient writes never advance
    /// the version counter").
    pub fn transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Skips the optimistic `expected_mod` check, applying unconditionally.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expected_mod(&self) -> Option<i64> {
        self.expected_mod
    }

    pub fn is_create(&self) -> bool {
        self.add
    }

    pub fn is_remove(&self) -> bool {
        self.remove
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn is_force(&self) -> bool {
        self.force
    }

    pub fn changes(&self) -> impl Iterator<Item = (&Word, &Value)> {
        self.changes.iter()
    }

    pub fn changes_len(&self) -> usize {
        self.changes.len()
    }
}
