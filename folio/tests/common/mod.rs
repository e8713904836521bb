//! An in-process stand-in for the remote store, just capable enough of
//! RESP to exercise the engine's read/write/history paths end to end
//! without a real Redis. Single-threaded command execution behind one
//! mutex; nowhere near a full implementation, just the command surface
//! `folio-wire`/`folio-store`/`folio-history` actually issue (strings,
//! hashes, sets, sorted sets, `MULTI`/`EXEC` queuing).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

#[derive(Default)]
struct Db {
    strings: HashMap<String, Vec<u8>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
    sets: HashMap<String, HashSet<String>>,
    zsets: HashMap<String, BTreeMap<(i64, Vec<u8>), ()>>,
}

pub struct FakeRedis {
    pub addr: std::net::SocketAddr,
}

pub async fn spawn() -> FakeRedis {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let db = Arc::new(Mutex::new(Db::default()));
    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let db = db.clone();
            tokio::spawn(async move {
                let _ = handle_conn(socket, db).await;
            });
        }
    });
    FakeRedis { addr }
}

async fn handle_conn(socket: tokio::net::TcpStream, db: Arc<Mutex<Db>>) -> std::io::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);
    let mut queue: Option<Vec<Vec<Vec<u8>>>> = None;
    loop {
        let args = match read_command(&mut reader).await? {
            Some(args) => args,
            None => return Ok(()),
        };
        let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
        if let Some(q) = &mut queue {
            if name == "EXEC" || name == "DISCARD" {
                // fall through to dispatch below
            } else {
                q.push(args);
                write_half.write_all(b"+QUEUED\r\n").await?;
                continue;
            }
        }
        match name.as_str() {
            "MULTI" => {
                queue = Some(Vec::new());
                write_half.write_all(b"+OK\r\n").await?;
            }
            "DISCARD" => {
                queue = None;
                write_half.write_all(b"+OK\r\n").await?;
            }
            "EXEC" => {
                let queued = queue.take().unwrap_or_default();
                let mut out = Vec::new();
                for cmd in queued {
                    out.push(dispatch(&db, &cmd));
                }
                write_half.write_all(&encode_array(&out)).await?;
            }
            _ => {
                let reply = dispatch(&db, &args);
                write_half.write_all(&reply).await?;
            }
        }
    }
}

async fn read_command(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> std::io::Result<Option<Vec<Vec<u8>>>> {
    let mut header = String::new();
    if reader.read_line(&mut header).await? == 0 {
        return Ok(None);
    }
    let header = header.trim_end();
    if !header.starts_with('*') {
        return Ok(None);
    }
    let n: usize = header[1..].parse().unwrap_or(0);
    let mut args = Vec::with_capacity(n);
    for _ in 0..n {
        let mut len_line = String::new();
        reader.read_line(&mut len_line).await?;
        let len: usize = len_line.trim_end()[1..].parse().unwrap_or(0);
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await?;
        buf.truncate(len);
        args.push(buf);
    }
    Ok(Some(args))
}

fn dispatch(db: &Arc<Mutex<Db>>, args: &[Vec<u8>]) -> Vec<u8> {
    let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
    let arg = |i: usize| String::from_utf8_lossy(&args[i]).into_owned();
    let mut db = db.lock();
    match name.as_str() {
        "PING" => simple("PONG"),
        "AUTH" | "SELECT" => simple("OK"),
        "SET" => {
            db.strings.insert(arg(1), args[2].clone());
            simple("OK")
        }
        "GET" => match db.strings.get(&arg(1)) {
            Some(v) => bulk(Some(v.clone())),
            None => bulk(None),
        },
        "INCR" => {
            let key = arg(1);
            let current: i64 = db
                .strings
                .get(&key)
                .map(|v| String::from_utf8_lossy(v).parse().unwrap_or(0))
                .unwrap_or(0);
            let next = current + 1;
            db.strings.insert(key, next.to_string().into_bytes());
            integer(next)
        }
        "HSET" => {
            let map = db.hashes.entry(arg(1)).or_default();
            let mut i = 2;
            let mut added = 0i64;
            while i + 1 < args.len() {
                let field = arg(i);
                if map.insert(field, args[i + 1].clone()).is_none() {
                    added += 1;
                }
                i += 2;
            }
            integer(added)
        }
        "HGET" => match db.hashes.get(&arg(1)).and_then(|m| m.get(&arg(2))) {
            Some(v) => bulk(Some(v.clone())),
            None => bulk(None),
        },
        "SADD" => {
            let added = db.sets.entry(arg(1)).or_default().insert(arg(2));
            integer(added as i64)
        }
        "SREM" => {
            let removed = db
                .sets
                .get_mut(&arg(1))
                .map(|s| s.remove(&arg(2)))
                .unwrap_or(false);
            integer(removed as i64)
        }
        "SMEMBERS" => {
            let members: Vec<Vec<u8>> = db
                .sets
                .get(&arg(1))
                .map(|s| s.iter().map(|m| m.as_bytes().to_vec()).collect())
                .unwrap_or_default();
            encode_array(&members.into_iter().map(|m| bulk(Some(m))).collect::<Vec<_>>())
        }
        "DEL" => {
            let key = arg(1);
            let existed = db.strings.remove(&key).is_some()
                || db.hashes.remove(&key).is_some()
                || db.zsets.remove(&key).is_some();
            integer(existed as i64)
        }
        "ZADD" => {
            let score: i64 = arg(2).parse().unwrap_or(0);
            let member = args[3].clone();
            let added = db
                .zsets
                .entry(arg(1))
                .or_default()
                .insert((score, member), ())
                .is_none();
            integer(added as i64)
        }
        "ZCARD" => integer(db.zsets.get(&arg(1)).map(|z| z.len()).unwrap_or(0) as i64),
        "ZRANGE" => {
            let set = db.zsets.get(&arg(1)).cloned().unwrap_or_default();
            let items: Vec<(i64, Vec<u8>)> = set.into_keys().collect();
            let len = items.len() as i64;
            let (start, stop) = (arg(2).parse::<i64>().unwrap_or(0), arg(3).parse::<i64>().unwrap_or(-1));
            let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
            let (s, e) = (norm(start) as usize, (norm(stop) + 1).max(0) as usize);
            let slice = items.get(s..e.min(items.len())).unwrap_or(&[]);
            encode_scored(slice, args.len() > 4)
        }
        "ZRANGEBYSCORE" | "ZREVRANGEBYSCORE" => {
            let rev = name == "ZREVRANGEBYSCORE";
            let set = db.zsets.get(&arg(1)).cloned().unwrap_or_default();
            let mut items: Vec<(i64, Vec<u8>)> = set.into_keys().collect();
            if rev {
                items.reverse();
            }
            let (lo_raw, hi_raw) = if rev { (arg(3), arg(2)) } else { (arg(2), arg(3)) };
            let (lo, lo_excl) = parse_bound(&lo_raw, i64::MIN);
            let (hi, hi_excl) = parse_bound(&hi_raw, i64::MAX);
            let mut filtered: Vec<(i64, Vec<u8>)> = items
                .into_iter()
                .filter(|(score, _)| {
                    let above = if lo_excl { *score > lo } else { *score >= lo };
                    let below = if hi_excl { *score < hi } else { *score <= hi };
                    above && below
                })
                .collect();
            let mut with_scores = false;
            let mut i = 4;
            while i < args.len() {
                let tok = String::from_utf8_lossy(&args[i]).to_ascii_uppercase();
                if tok == "WITHSCORES" {
                    with_scores = true;
                    i += 1;
                } else if tok == "LIMIT" {
                    let offset: usize = arg(i + 1).parse().unwrap_or(0);
                    let count: i64 = arg(i + 2).parse().unwrap_or(-1);
                    filtered = filtered.into_iter().skip(offset).collect();
                    if count >= 0 {
                        filtered.truncate(count as usize);
                    }
                    i += 3;
                } else {
                    i += 1;
                }
            }
            encode_scored(&filtered, with_scores)
        }
        "ZREMRANGEBYSCORE" => {
            let (lo, lo_excl) = parse_bound(&arg(2), i64::MIN);
            let (hi, hi_excl) = parse_bound(&arg(3), i64::MAX);
            let set = db.zsets.entry(arg(1)).or_default();
            let before = set.len();
            set.retain(|(score, _), _| {
                let above = if lo_excl { *score > lo } else { *score >= lo };
                let below = if hi_excl { *score < hi } else { *score <= hi };
                !(above && below)
            });
            integer((before - set.len()) as i64)
        }
        other => error(&format!("ERR unknown command '{other}'")),
    }
}

fn parse_bound(s: &str, default: i64) -> (i64, bool) {
    if s == "-inf" {
        return (i64::MIN, false);
    }
    if s == "+inf" {
        return (i64::MAX, false);
    }
    if let Some(rest) = s.strip_prefix('(') {
        return (rest.parse().unwrap_or(default), true);
    }
    (s.parse().unwrap_or(default), false)
}

fn encode_scored(items: &[(i64, Vec<u8>)], with_scores: bool) -> Vec<u8> {
    let mut replies = Vec::new();
    for (score, member) in items {
        replies.push(bulk(Some(member.clone())));
        if with_scores {
            replies.push(bulk(Some(score.to_string().into_bytes())));
        }
    }
    encode_array(&replies)
}

fn simple(s: &str) -> Vec<u8> {
    format!("+{s}\r\n").into_bytes()
}

fn error(s: &str) -> Vec<u8> {
    format!("-{s}\r\n").into_bytes()
}

fn integer(n: i64) -> Vec<u8> {
    format!(":{n}\r\n").into_bytes()
}

fn bulk(v: Option<Vec<u8>>) -> Vec<u8> {
    match v {
        None => b"$-1\r\n".to_vec(),
        Some(b) => {
            let mut out = format!("${}\r\n", b.len()).into_bytes();
            out.extend_from_slice(&b);
            out.extend_from_slice(b"\r\n");
            out
        }
    }
}

fn encode_array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend_from_slice(item);
    }
    out
}
