use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono_tz::UTC;

use folio_errors::FolioError;
use folio_types::{reserved, Dict, Diff, Value, Word};

use crate::cache::Cache;
use crate::codec::encode_dict;
use crate::hooks::CommitHooks;

/// What happens to one diff once it clears validation: either it's
/// materialized into a new record body to persist and cache, or (for a
/// [`Diff::is_remove`] diff) the record is destroyed outright.
enum Outcome {
    Put {
        id: String,
        dict: Dict,
        old_tags: Vec<Word>,
        transient: bool,
    },
    Destroy {
        id: String,
        old: Dict,
    },
}

/// Runs one batch of diffs through the full commit procedure (§4.3):
/// validate, prepare each diff against the current cache state, stamp a
/// new `mod`, materialize the resulting records, call the pre-commit
/// hook, persist atomically, apply to the cache, then call the
/// post-commit hook. Everything here runs with exclusive access to the
/// ids in `diffs` because `RecordStore` only ever calls this from its
/// single commit mailbox task (§5).
///
/// A remove diff destroys the record: evicted from the cache, every tag
/// index, and storage. It never materializes a body. Soft deletion (the
/// `trash` marker tag) is just an ordinary update diff and flows through
/// the normal put path like any other tag change.
pub async fn run(
    cache: &Cache,
    pool: &folio_wire::ConnPool,
    id_index_key: &str,
    diffs: Vec<Diff>,
    hooks: &dyn CommitHooks,
    version: &AtomicI64,
) -> Result<Vec<Dict>, FolioError> {
    validate_batch(&diffs)?;

    let mut prepared = Vec::with_capacity(diffs.len());
    for diff in &diffs {
        prepared.push(prepare(cache, diff)?);
    }

    let now = now_millis();
    let mut outcomes = Vec::with_capacity(diffs.len());
    for (diff, old) in diffs.iter().zip(prepared) {
        if diff.is_remove() {
            let old = old.expect("prepare guarantees an existing record for remove diffs");
            outcomes.push(Outcome::Destroy {
                id: diff.id().to_owned(),
                old,
            });
        } else {
            let old_tags: Vec<Word> = old
                .as_ref()
                .map(|d| d.indexable_tags().cloned().collect())
                .unwrap_or_default();
            let (id, dict) = materialize(cache, diff, old, now);
            outcomes.push(Outcome::Put {
                id,
                dict,
                old_tags,
                transient: diff.is_transient(),
            });
        }
    }

    hooks.pre_commit(&diffs)?;

    let to_persist: Vec<(&str, &Dict, &[Word])> = outcomes
        .iter()
        .filter_map(|o| match o {
            Outcome::Put {
                id,
                dict,
                old_tags,
                transient: false,
            } => Some((id.as_str(), dict, old_tags.as_slice())),
            _ => None,
        })
        .collect();
    let to_destroy: Vec<(&str, &Dict)> = outcomes
        .iter()
        .filter_map(|o| match o {
            Outcome::Destroy { id, old } => Some((id.as_str(), old)),
            _ => None,
        })
        .collect();

    if !to_persist.is_empty() || !to_destroy.is_empty() {
        let new_version = persist(pool, id_index_key, now, &to_persist, &to_destroy).await?;
        version.store(new_version, Ordering::SeqCst);
    }

    let mut records = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Outcome::Put { id, dict, .. } => {
                cache.put(&id, dict.clone());
                records.push(dict);
            }
            Outcome::Destroy { id, old } => {
                cache.remove(&id);
                records.push(old);
            }
        }
    }

    hooks.post_commit(&records);
    Ok(records)
}

fn validate_batch(diffs: &[Diff]) -> Result<(), FolioError> {
    if diffs.is_empty() {
        return Err(FolioError::commit("empty diff batch"));
    }
    let mut seen = std::collections::HashSet::new();
    for diff in diffs {
        if diff.id().is_empty() {
            return Err(FolioError::commit("diff targets an empty id"));
        }
        if !seen.insert(diff.id()) {
            return Err(FolioError::commit(format!(
                "id {} targeted by more than one diff in the same batch",
                diff.id()
            )));
        }
    }
    Ok(())
}

/// Per-diff prep: fetch the current record (if any) and check existence /
/// optimistic-concurrency invariants before anything is materialized.
fn prepare(cache: &Cache, diff: &Diff) -> Result<Option<Dict>, FolioError> {
    let existing = cache.get(diff.id());
    if diff.is_create() {
        if existing.is_some() {
            return Err(FolioError::already_exists(diff.id()));
        }
        return Ok(None);
    }
    let existing = existing.ok_or_else(|| FolioError::unknown_rec(diff.id()))?;
    if !diff.is_force() {
        if let Some(expected) = diff.expected_mod() {
            let actual = existing.mod_millis();
            if actual != Some(expected) {
                return Err(FolioError::concurrent_change(
                    diff.id(),
                    format!("expected mod {expected:?}, found {actual:?}"),
                ));
            }
        }
    }
    Ok(Some(existing))
}

fn materialize(cache: &Cache, diff: &Diff, old: Option<Dict>, now_millis: i64) -> (String, Dict) {
    let mut dict = old.unwrap_or_default();
    for (tag, val) in diff.changes() {
        if val.is_remove() {
            dict.remove(tag);
        } else {
            dict.set(tag.clone(), val.clone());
        }
    }
    dict.set(reserved::id(), Value::Ref(cache.intern(diff.id())));
    if !diff.is_transient() {
        dict.set(
            reserved::mod_(),
            Value::DateTime {
                epoch_millis: now_millis,
                tz: UTC,
            },
        );
    }
    (diff.id().to_owned(), dict)
}

/// Diffs an old and new tag set, returning `(added, removed)`.
fn tag_diff(old_tags: &[Word], new_tags: &[Word]) -> (Vec<Word>, Vec<Word>) {
    let added = new_tags.iter().filter(|t| !old_tags.contains(t)).cloned().collect();
    let removed = old_tags.iter().filter(|t| !new_tags.contains(t)).cloned().collect();
    (added, removed)
}

/// Persists one commit batch atomically: `HSET rec:{id}` for every put,
/// `DEL rec:{id}` for every destroy, `SADD`/`SREM` against `idx:all` and
/// every affected `idx:tag:{name}`, and an `INCR meta:version` to advance
/// the version counter (§4.3 step 6, §6 storage layout). Returns the new
/// version.
async fn persist(
    pool: &folio_wire::ConnPool,
    id_index_key: &str,
    now_millis: i64,
    to_persist: &[(&str, &Dict, &[Word])],
    to_destroy: &[(&str, &Dict)],
) -> Result<i64, FolioError> {
    let puts: Vec<(String, Vec<u8>, Vec<Word>, Vec<Word>)> = to_persist
        .iter()
        .map(|(id, dict, old_tags)| {
            let new_tags: Vec<Word> = dict.indexable_tags().cloned().collect();
            let (added, removed) = tag_diff(old_tags, &new_tags);
            ((*id).to_owned(), encode_dict(dict), added, removed)
        })
        .collect();
    let destroys: Vec<(String, Vec<Word>)> = to_destroy
        .iter()
        .map(|(id, dict)| ((*id).to_owned(), dict.indexable_tags().cloned().collect()))
        .collect();
    let id_index_key = id_index_key.to_owned();

    pool.with_conn(move |conn| {
        let puts = puts.clone();
        let destroys = destroys.clone();
        let id_index_key = id_index_key.clone();
        Box::pin(async move {
            conn.begin().await?;
            for (id, bytes, added, removed) in &puts {
                let key = format!("rec:{id}");
                conn.call(&[
                    b"HSET",
                    key.as_bytes(),
                    b"trio",
                    bytes,
                    b"mod",
                    now_millis.to_string().as_bytes(),
                ])
                .await?;
                conn.call(&[b"SADD", id_index_key.as_bytes(), id.as_bytes()])
                    .await?;
                for tag in added {
                    let tag_key = format!("idx:tag:{}", tag.as_str());
                    conn.call(&[b"SADD", tag_key.as_bytes(), id.as_bytes()])
                        .await?;
                }
                for tag in removed {
                    let tag_key = format!("idx:tag:{}", tag.as_str());
                    conn.call(&[b"SREM", tag_key.as_bytes(), id.as_bytes()])
                        .await?;
                }
            }
            for (id, tags) in &destroys {
                let key = format!("rec:{id}");
                conn.call(&[b"DEL", key.as_bytes()]).await?;
                conn.call(&[b"SREM", id_index_key.as_bytes(), id.as_bytes()])
                    .await?;
                for tag in tags {
                    let tag_key = format!("idx:tag:{}", tag.as_str());
                    conn.call(&[b"SREM", tag_key.as_bytes(), id.as_bytes()])
                        .await?;
                }
            }
            conn.call(&[b"INCR", b"meta:version"]).await?;
            let replies = conn.exec().await?;
            if let Some(err) = replies.iter().find(|r| r.is_error()) {
                return Err(FolioError::commit(format!("persist failed: {err:?}")));
            }
            match replies.last() {
                Some(folio_wire::Reply::Integer(n)) => Ok(*n),
                other => Err(FolioError::commit(format!(
                    "persist: expected meta:version reply to be an integer, got {other:?}"
                ))),
            }
        })
    })
    .await
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_millis() as i64
}
