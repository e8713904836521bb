use std::sync::Arc;

use tracing::debug;

use folio_errors::FolioError;
use folio_store::{decode_value_bytes, encode_value_bytes, ReadOpts, RecordStore};
use folio_types::{reserved, HisItem, Value, Word};
use folio_wire::ConnPool;

use crate::hooks::PostHisWriteHook;
use crate::span::Span;

/// The result of a history read: the point immediately before the span
/// (the "current value as of `start`" carry-in), the points within the
/// span, and up to two points immediately after it: the "prev / window /
/// next-2" shape described in §4.4.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRead {
    pub prev: Option<HisItem>,
    pub items: Vec<HisItem>,
    pub next: Vec<HisItem>,
}

/// Options governing one [`HistoryStore::write`] call: an optional bulk
/// clear before the items are applied, either of the whole series or of
/// one span.
#[derive(Clone, Debug, Default)]
pub struct WriteOpts {
    /// Deletes the entire series before writing `items`.
    pub clear_all: bool,
    /// Deletes every point in this span before writing `items`. Ignored
    /// when `clear_all` is set.
    pub clear: Option<Span>,
}

/// What one [`HistoryStore::write`] call did: how many items were
/// written as ordinary points (an item whose value is [`Value::Remove`]
/// doesn't count as a write, it deletes the point at that timestamp
/// instead), and how many points were removed in total, by `clear`/
/// `clear_all` and by per-item sentinel deletes combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: usize,
    pub cleared: u64,
}

pub struct HistoryStore {
    pool: Arc<ConnPool>,
    store: Arc<RecordStore>,
    hooks: Arc<dyn PostHisWriteHook>,
}

impl HistoryStore {
    pub fn new(pool: Arc<ConnPool>, store: Arc<RecordStore>, hooks: Arc<dyn PostHisWriteHook>) -> Self {
        HistoryStore { pool, store, hooks }
    }

    fn his_key(id: &str) -> String {
        format!("his:{id}")
    }

    /// Checks that `id` names a record history can legally be attached to:
    /// carries both the `his` and `point` marker tags, and carries neither
    /// `aux` nor `trash`. Reads with `trash: true` so a trashed record
    /// raises [`FolioError::HisConfig`] rather than a misleading
    /// [`FolioError::UnknownRec`].
    fn require_his_record(&self, id: &str) -> Result<(), FolioError> {
        let opts = ReadOpts {
            trash: true,
            ..Default::default()
        };
        let dict = self
            .store
            .read_by_id(id, &opts)
            .ok_or_else(|| FolioError::unknown_rec(id))?;
        if !dict.is_his() {
            return Err(FolioError::his_config(
                id,
                "record does not carry the his marker tag",
            ));
        }
        if !dict.is_point() {
            return Err(FolioError::his_config(
                id,
                "record does not carry the point marker tag",
            ));
        }
        if dict.is_aux() {
            return Err(FolioError::his_config(
                id,
                "history is not valid on an aux record",
            ));
        }
        if dict.is_trash() {
            return Err(FolioError::his_config(id, "record is trashed"));
        }
        Ok(())
    }

    /// Applies an optional bulk clear, then writes `items` in order. An
    /// item whose value is [`Value::Remove`] deletes the point at that
    /// timestamp instead of writing one (§4.4 "sentinel delete"). Refreshes
    /// the host record's summary tags once afterward and returns what was
    /// written and removed.
    pub async fn write(
        &self,
        id: &str,
        items: Vec<HisItem>,
        opts: WriteOpts,
    ) -> Result<WriteOutcome, FolioError> {
        self.require_his_record(id)?;
        let key = Self::his_key(id);
        let mut outcome = WriteOutcome::default();

        if opts.clear_all {
            let key = key.clone();
            self.pool
                .with_conn(move |conn| {
                    let key = key.clone();
                    Box::pin(async move {
                        conn.call(&[b"DEL", key.as_bytes()]).await?;
                        Ok(())
                    })
                })
                .await?;
        } else if let Some(span) = opts.clear {
            let key = key.clone();
            outcome.cleared += self
                .pool
                .with_conn(move |conn| {
                    let key = key.clone();
                    Box::pin(async move {
                        let reply = conn
                            .call(&[
                                b"ZREMRANGEBYSCORE",
                                key.as_bytes(),
                                span.start.to_string().as_bytes(),
                                format!("({}", span.end).as_bytes(),
                            ])
                            .await?;
                        Ok(match reply {
                            folio_wire::Reply::Integer(n) => n as u64,
                            _ => 0,
                        })
                    })
                })
                .await?;
        }

        for item in &items {
            let key = key.clone();
            let score = item.ts;
            if item.val.is_remove() {
                outcome.cleared += self
                    .pool
                    .with_conn(move |conn| {
                        let key = key.clone();
                        Box::pin(async move {
                            let reply = conn
                                .call(&[
                                    b"ZREMRANGEBYSCORE",
                                    key.as_bytes(),
                                    score.to_string().as_bytes(),
                                    score.to_string().as_bytes(),
                                ])
                                .await?;
                            Ok(match reply {
                                folio_wire::Reply::Integer(n) => n as u64,
                                _ => 0,
                            })
                        })
                    })
                    .await?;
            } else {
                let member = encode_value_bytes(&item.val);
                self.pool
                    .with_conn(move |conn| {
                        let key = key.clone();
                        let member = member.clone();
                        Box::pin(async move {
                            conn.call(&[b"ZADD", key.as_bytes(), score.to_string().as_bytes(), &member])
                                .await?;
                            Ok(())
                        })
                    })
                    .await?;
                outcome.written += 1;
                self.hooks.on_post_his_write(id, item);
            }
        }

        if opts.clear_all || opts.clear.is_some() || !items.is_empty() {
            self.refresh_summary_tags(id).await?;
        }
        Ok(outcome)
    }

    /// Removes every point in `span` and refreshes the summary tags.
    /// A thin wrapper over [`Self::write`] with an empty item batch.
    pub async fn clear(&self, id: &str, span: Span) -> Result<u64, FolioError> {
        let outcome = self
            .write(
                id,
                Vec::new(),
                WriteOpts {
                    clear: Some(span),
                    ..Default::default()
                },
            )
            .await?;
        Ok(outcome.cleared)
    }

    /// Deletes the entire history series for `id`. A thin wrapper over
    /// [`Self::write`] with an empty item batch.
    pub async fn clear_all(&self, id: &str) -> Result<(), FolioError> {
        self.write(
            id,
            Vec::new(),
            WriteOpts {
                clear_all: true,
                ..Default::default()
            },
        )
        .await?;
        debug!(%id, "cleared entire history series");
        Ok(())
    }

    async fn refresh_summary_tags(&self, id: &str) -> Result<(), FolioError> {
        let key = Self::his_key(id);
        let size = self
            .pool
            .with_conn(move |conn| {
                let key = key.clone();
                Box::pin(async move {
                    let reply = conn.call(&[b"ZCARD", key.as_bytes()]).await?;
                    Ok(match reply {
                        folio_wire::Reply::Integer(n) => n as u64,
                        _ => 0,
                    })
                })
            })
            .await?;
        let first = self.range_by_rank(id, 0, 0).await?.into_iter().next();
        let last = self.range_by_rank(id, -1, -1).await?.into_iter().next();

        self.store.patch_never_tags(id, |dict| {
            dict.set(reserved::his_size(), Value::number(size as f64));
            match &first {
                Some(item) => {
                    dict.set(
                        reserved::his_start(),
                        Value::DateTime {
                            epoch_millis: item.ts,
                            tz: chrono_tz::UTC,
                        },
                    );
                    dict.set(reserved::his_start_val(), item.val.clone());
                }
                None => {
                    dict.remove(&reserved::his_start());
                    dict.remove(&reserved::his_start_val());
                }
            }
            match &last {
                Some(item) => {
                    dict.set(
                        reserved::his_end(),
                        Value::DateTime {
                            epoch_millis: item.ts,
                            tz: chrono_tz::UTC,
                        },
                    );
                    dict.set(reserved::his_end_val(), item.val.clone());
                }
                None => {
                    dict.remove(&reserved::his_end());
                    dict.remove(&reserved::his_end_val());
                }
            }
        });
        Ok(())
    }

    async fn range_by_rank(&self, id: &str, start: i64, stop: i64) -> Result<Vec<HisItem>, FolioError> {
        let key = Self::his_key(id);
        let id = id.to_owned();
        let raw = self
            .pool
            .with_conn(move |conn| {
                let key = key.clone();
                Box::pin(async move {
                    let reply = conn
                        .call(&[
                            b"ZRANGE",
                            key.as_bytes(),
                            start.to_string().as_bytes(),
                            stop.to_string().as_bytes(),
                            b"WITHSCORES",
                        ])
                        .await?;
                    Ok(reply.into_array().unwrap_or_default())
                })
            })
            .await?;
        decode_scored_members(&id, raw)
    }

    /// Reads the "prev / window / next-2" shape for `span` (§4.4). When
    /// `unit` is given (the host record's own `unit` tag), it's attached to
    /// every unitless numeric item returned. History items are stored
    /// without a per-point unit; the unit always comes from the host.
    pub async fn read(
        &self,
        id: &str,
        span: Span,
        unit: Option<Word>,
    ) -> Result<HistoryRead, FolioError> {
        self.require_his_record(id)?;
        let key = Self::his_key(id);

        let prev_key = key.clone();
        let prev_raw = self
            .pool
            .with_conn(move |conn| {
                let prev_key = prev_key.clone();
                Box::pin(async move {
                    let reply = conn
                        .call(&[
                            b"ZREVRANGEBYSCORE",
                            prev_key.as_bytes(),
                            format!("({}", span.start).as_bytes(),
                            b"-inf",
                            b"LIMIT",
                            b"0",
                            b"1",
                            b"WITHSCORES",
                        ])
                        .await?;
                    Ok(reply.into_array().unwrap_or_default())
                })
            })
            .await?;
        let prev = decode_scored_members(id, prev_raw)?.into_iter().next();

        let window_key = key.clone();
        let window_raw = self
            .pool
            .with_conn(move |conn| {
                let window_key = window_key.clone();
                Box::pin(async move {
                    let reply = conn
                        .call(&[
                            b"ZRANGEBYSCORE",
                            window_key.as_bytes(),
                            span.start.to_string().as_bytes(),
                            format!("({}", span.end).as_bytes(),
                            b"WITHSCORES",
                        ])
                        .await?;
                    Ok(reply.into_array().unwrap_or_default())
                })
            })
            .await?;
        let items = decode_scored_members(id, window_raw)?;

        let next_raw = self
            .pool
            .with_conn(move |conn| {
                let key = key.clone();
                Box::pin(async move {
                    let reply = conn
                        .call(&[
                            b"ZRANGEBYSCORE",
                            key.as_bytes(),
                            span.end.to_string().as_bytes(),
                            b"+inf",
                            b"LIMIT",
                            b"0",
                            b"2",
                            b"WITHSCORES",
                        ])
                        .await?;
                    Ok(reply.into_array().unwrap_or_default())
                })
            })
            .await?;
        let next = decode_scored_members(id, next_raw)?;

        let apply_unit = |mut item: HisItem| {
            if let Some(unit) = &unit {
                item.val = item.val.with_unit(unit.clone());
            }
            item
        };
        Ok(HistoryRead {
            prev: prev.map(apply_unit),
            items: items.into_iter().map(apply_unit).collect(),
            next: next.into_iter().map(apply_unit).collect(),
        })
    }
}

fn decode_scored_members(id: &str, raw: Vec<folio_wire::Reply>) -> Result<Vec<HisItem>, FolioError> {
    let mut out = Vec::with_capacity(raw.len() / 2);
    let mut iter = raw.into_iter();
    while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
        let bytes = member
            .into_bulk_string()
            .ok_or_else(|| FolioError::encoding(id, "history member is not a bulk string"))?;
        let score = score
            .into_bulk_string()
            .ok_or_else(|| FolioError::encoding(id, "history score is not a bulk string"))?
            .parse::<f64>()
            .map_err(|e| FolioError::encoding(id, e))?;
        let val = decode_value_bytes(id, bytes.as_bytes())?;
        out.push(HisItem::new(score as i64, val));
    }
    Ok(out)
}
