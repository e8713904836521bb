use dashmap::{DashMap, DashSet};

use folio_types::{Dict, Ref, Word};

/// The in-memory mirror of everything persisted. Reads never touch the
/// remote store once a record is cached; only the commit pipeline and the
/// startup load sequence write to it (§4.3, "cache apply" is the only
/// mutation path other than load).
///
/// Built on `dashmap` rather than a hand-rolled left-right map: the
/// commit pipeline already serializes all writers through one mailbox
/// (see `commit::Writer`), so the only concurrency `Cache` itself needs to
/// provide is lock-free-ish concurrent reads, which sharded per-key
/// locking gives for free.
#[derive(Default)]
pub struct Cache {
    records: DashMap<String, Dict>,
    /// tag name -> set of record ids carrying that tag, maintained
    /// incrementally by the commit pipeline's "cache apply" step.
    tag_index: DashMap<Word, DashSet<String>>,
    /// Canonical `Ref` instances, handed out by `intern` so that repeated
    /// references to the same id share one display-string slot.
    refs: DashMap<String, Ref>,
}

impl Cache {
    pub fn new() -> Self {
        Cache::default()
    }

    pub fn get(&self, id: &str) -> Option<Dict> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.records.iter().map(|e| e.key().clone()).collect()
    }

    pub fn ids_with_tag(&self, tag: &Word) -> Vec<String> {
        self.tag_index
            .get(tag)
            .map(|set| set.iter().map(|id| id.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the canonical `Ref` for `id`, creating one on first sight.
    pub fn intern(&self, id: &str) -> Ref {
        if let Some(r) = self.refs.get(id) {
            return r.clone();
        }
        self.refs
            .entry(id.to_owned())
            .or_insert_with(|| Ref::new(id))
            .clone()
    }

    /// Replaces (or inserts) a record and reconciles the tag index against
    /// its previous tag set. This is the only mutation entry point besides
    /// [`Self::remove`]; both are called exclusively from the commit
    /// pipeline's cache-apply step, which already runs with exclusive
    /// access to this id (the mailbox serializes all writers).
    pub fn put(&self, id: &str, dict: Dict) {
        let old_tags: Vec<Word> = self
            .records
            .get(id)
            .map(|old| old.indexable_tags().cloned().collect())
            .unwrap_or_default();
        let new_tags: Vec<Word> = dict.indexable_tags().cloned().collect();

        for tag in &old_tags {
            if !new_tags.contains(tag) {
                self.unindex(tag, id);
            }
        }
        for tag in &new_tags {
            self.index(tag, id);
        }
        self.records.insert(id.to_owned(), dict);
    }

    pub fn remove(&self, id: &str) {
        if let Some((_, dict)) = self.records.remove(id) {
            for tag in dict.indexable_tags() {
                self.unindex(tag, id);
            }
        }
    }

    fn index(&self, tag: &Word, id: &str) {
        self.tag_index
            .entry(tag.clone())
            .or_default()
            .insert(id.to_owned());
    }

    fn unindex(&self, tag: &Word, id: &str) {
        if let Some(set) = self.tag_index.get(tag) {
            set.remove(id);
        }
    }
}
