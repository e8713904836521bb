use folio_errors::FolioError;
use folio_types::{Diff, Dict};

/// Extension points the commit pipeline calls into, one before persistence
/// and one after (§4.3 "pre-commit hook" / "post-commit hook"). The
/// default no-op implementation on `()` lets callers who don't need either
/// hook skip providing one.
pub trait CommitHooks: Send + Sync {
    /// Called with the validated, not-yet-materialized batch. Returning an
    /// error aborts the whole commit before anything is persisted.
    fn pre_commit(&self, diffs: &[Diff]) -> Result<(), FolioError> {
        let _ = diffs;
        Ok(())
    }

    /// Called after persistence and cache-apply have both succeeded, with
    /// the materialized records in the same order as the submitted diffs.
    fn post_commit(&self, records: &[Dict]) {
        let _ = records;
    }
}

impl CommitHooks for () {}
