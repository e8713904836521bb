use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use folio_errors::FolioError;
use folio_types::{Diff, Dict, Word};
use folio_wire::ConnPool;

use crate::cache::Cache;
use crate::codec::decode_dict;
use crate::commit;
use crate::filter::Predicate;
use crate::hooks::CommitHooks;
use crate::query;

/// A snapshot of cache occupancy, exposed for operational logging/metrics
/// rather than anything the engine itself branches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordStoreStats {
    pub records: usize,
}

/// How a read result should be ordered. `ById` is the only ordering the
/// engine itself imposes; anything richer (by a tag's value, say) is a
/// host-side concern layered on top of the returned `Dict`s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sort {
    #[default]
    None,
    ById,
}

/// Options shared by every read operation (§4.3): whether trashed records
/// are included, how many records to return at most, and how to order
/// them.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadOpts {
    pub trash: bool,
    pub limit: usize,
    pub sort: Sort,
}

impl Default for ReadOpts {
    fn default() -> Self {
        ReadOpts {
            trash: false,
            limit: 10_000,
            sort: Sort::None,
        }
    }
}

struct CommitRequest {
    diffs: Vec<Diff>,
    reply: oneshot::Sender<Result<Vec<Dict>, FolioError>>,
}

/// The concurrent record cache plus its single-writer commit pipeline
/// (§4.3, §5). Reads go straight to the in-memory [`Cache`] and never
/// block on the remote store; writes are serialized through one mailbox
/// task so the commit procedure never has to reason about concurrent
/// mutation of the same id.
pub struct RecordStore {
    cache: Cache,
    pool: Arc<ConnPool>,
    id_index_key: String,
    commit_tx: mpsc::Sender<CommitRequest>,
    version: AtomicI64,
}

impl RecordStore {
    pub fn new(
        pool: Arc<ConnPool>,
        id_index_key: impl Into<String>,
        hooks: Arc<dyn CommitHooks>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(64);
        let store = Arc::new(RecordStore {
            cache: Cache::new(),
            pool,
            id_index_key: id_index_key.into(),
            commit_tx: tx,
            version: AtomicI64::new(0),
        });
        let mailbox_store = store.clone();
        tokio::spawn(async move {
            mailbox_store.run_mailbox(rx, hooks).await;
        });
        store
    }

    async fn run_mailbox(
        &self,
        mut rx: mpsc::Receiver<CommitRequest>,
        hooks: Arc<dyn CommitHooks>,
    ) {
        while let Some(req) = rx.recv().await {
            let result = commit::run(
                &self.cache,
                &self.pool,
                &self.id_index_key,
                req.diffs,
                hooks.as_ref(),
                &self.version,
            )
            .await;
            if req.reply.send(result).is_err() {
                warn!("commit caller dropped its reply channel before the result arrived");
            }
        }
    }

    /// Loads every record named by the remote id index into the cache, and
    /// the current version counter. Called once at startup; a record whose
    /// body fails to decode is logged and skipped rather than aborting the
    /// whole load (§4.3, "a single corrupt record must not prevent the rest
    /// from loading").
    pub async fn load(&self) -> Result<(), FolioError> {
        let id_index_key = self.id_index_key.clone();
        let ids: Vec<String> = self
            .pool
            .with_conn(move |conn| {
                let id_index_key = id_index_key.clone();
                Box::pin(async move {
                    let reply = conn.call(&[b"SMEMBERS", id_index_key.as_bytes()]).await?;
                    Ok(reply
                        .into_array()
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|r| r.into_bulk_string())
                        .collect())
                })
            })
            .await?;

        let mut loaded = 0usize;
        for id in ids {
            let key = format!("rec:{id}");
            let body = self
                .pool
                .with_conn(move |conn| {
                    let key = key.clone();
                    Box::pin(async move {
                        let reply = conn.call(&[b"HGET", key.as_bytes(), b"trio"]).await?;
                        Ok(reply.into_bulk_string())
                    })
                })
                .await?;
            match body {
                Some(body) => match decode_dict(&id, body.as_bytes()) {
                    Ok(dict) => {
                        self.cache.put(&id, dict);
                        loaded += 1;
                    }
                    Err(e) => warn!(%id, error = %e, "skipping record that failed to decode at load"),
                },
                None => warn!(%id, "id index referenced a record with no body"),
            }
        }

        let version = self
            .pool
            .with_conn(move |conn| {
                Box::pin(async move {
                    let reply = conn.call(&[b"GET", b"meta:version"]).await?;
                    Ok(reply
                        .into_bulk_string()
                        .and_then(|s| s.parse::<i64>().ok())
                        .unwrap_or(0))
                })
            })
            .await?;
        self.version.store(version, Ordering::SeqCst);

        info!(loaded, version, "record store load complete");
        Ok(())
    }

    /// The current value of the persisted version counter (`meta:version`),
    /// advanced by one on every commit that persists at least one record
    /// (§4.3 "version counter", §8 "update monotonicity").
    pub fn cur_ver(&self) -> i64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn read_by_id(&self, id: &str, opts: &ReadOpts) -> Option<Dict> {
        let dict = self.cache.get(id)?;
        if !opts.trash && dict.is_trash() {
            return None;
        }
        Some(dict)
    }

    pub fn read_by_ids(&self, ids: &[String], opts: &ReadOpts) -> Vec<Option<Dict>> {
        ids.iter().map(|id| self.read_by_id(id, opts)).collect()
    }

    pub fn read_all(&self, predicate: Option<&Predicate>, opts: &ReadOpts) -> Vec<Dict> {
        self.collect_matching(self.cache.all_ids(), predicate, opts)
    }

    pub fn read_count(&self, predicate: Option<&Predicate>, opts: &ReadOpts) -> usize {
        self.cache
            .all_ids()
            .into_iter()
            .filter_map(|id| self.cache.get(&id))
            .filter(|dict| opts.trash || !dict.is_trash())
            .filter(|dict| predicate.map_or(true, |p| p.eval(dict)))
            .count()
    }

    /// Visits matching cached records in the query planner's own order
    /// (index lookup when `predicate` is a simple `has(tag)`, a full scan
    /// otherwise), stopping early the first time `f` returns `false` or
    /// once `opts.limit` records have been visited (§4.3 "streaming read").
    pub fn read_all_each_while(
        &self,
        predicate: Option<&Predicate>,
        opts: &ReadOpts,
        mut f: impl FnMut(&Dict) -> bool,
    ) {
        let ids = match predicate.and_then(Predicate::as_simple_has) {
            Some(tag) => self.cache.ids_with_tag(tag),
            None => self.cache.all_ids(),
        };
        let mut visited = 0usize;
        for id in ids {
            if visited >= opts.limit {
                break;
            }
            let Some(dict) = self.cache.get(&id) else {
                continue;
            };
            if !opts.trash && dict.is_trash() {
                continue;
            }
            if let Some(p) = predicate {
                if p.as_simple_has().is_none() && !p.eval(&dict) {
                    continue;
                }
            }
            visited += 1;
            if !f(&dict) {
                break;
            }
        }
    }

    pub fn query(&self, predicate: &Predicate, opts: &ReadOpts) -> Vec<Dict> {
        let matches = query::run(&self.cache, predicate);
        Self::finish(matches, opts)
    }

    fn collect_matching(
        &self,
        ids: Vec<String>,
        predicate: Option<&Predicate>,
        opts: &ReadOpts,
    ) -> Vec<Dict> {
        let matches: Vec<Dict> = ids
            .into_iter()
            .filter_map(|id| self.cache.get(&id))
            .filter(|dict| predicate.map_or(true, |p| p.eval(dict)))
            .collect();
        Self::finish(matches, opts)
    }

    fn finish(mut matches: Vec<Dict>, opts: &ReadOpts) -> Vec<Dict> {
        matches.retain(|dict| opts.trash || !dict.is_trash());
        if opts.sort == Sort::ById {
            matches.sort_by(|a, b| a.id().unwrap_or("").cmp(b.id().unwrap_or("")));
        }
        matches.truncate(opts.limit);
        matches
    }

    pub fn intern(&self, id: &str) -> folio_types::Ref {
        self.cache.intern(id)
    }

    pub fn ids_with_tag(&self, tag: &Word) -> Vec<String> {
        self.cache.ids_with_tag(tag)
    }

    /// Applies `f` to the cached copy of `id` and writes the result back to
    /// the cache only, bypassing persistence and the `mod` stamp entirely.
    /// This is the only sanctioned path for the "never tags" (`hisSize`,
    /// `hisStart(+Val)`, `hisEnd(+Val)`) that the history store maintains:
    /// they describe the history store's own state, not a user edit, so
    /// they must never advance the version counter or round-trip through
    /// the commit pipeline (§4.4).
    pub fn patch_never_tags(&self, id: &str, f: impl FnOnce(&mut Dict)) -> Option<Dict> {
        let mut dict = self.cache.get(id)?;
        f(&mut dict);
        self.cache.put(id, dict.clone());
        Some(dict)
    }

    /// Submits a batch of diffs to the commit mailbox and waits for the
    /// result. Multiple concurrent callers are safe: the mailbox processes
    /// one batch at a time.
    pub async fn commit(&self, diffs: Vec<Diff>) -> Result<Vec<Dict>, FolioError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commit_tx
            .send(CommitRequest {
                diffs,
                reply: reply_tx,
            })
            .await
            .map_err(|_| FolioError::commit("commit mailbox is closed"))?;
        reply_rx
            .await
            .map_err(|_| FolioError::commit("commit mailbox dropped without replying"))?
    }

    pub fn stats(&self) -> RecordStoreStats {
        RecordStoreStats {
            records: self.cache.len(),
        }
    }
}
