use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use folio_errors::{FolioError, ProtocolError, TransportError};

/// A decoded reply frame from the remote store. Only the shapes the engine
/// actually issues commands for are represented; anything else surfaces as
/// [`ProtocolError::UnknownFrame`].
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

impl Reply {
    pub fn into_bulk_string(self) -> Option<String> {
        match self {
            Reply::Bulk(Some(b)) => String::from_utf8(b).ok(),
            Reply::Simple(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(a) => a,
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

/// Encodes a command as a RESP array of bulk strings, the wire format the
/// remote store speaks for both requests and pipelined/transaction frames.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 * args.len());
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

pub async fn write_command(
    w: &mut OwnedWriteHalf,
    endpoint: &str,
    op: &'static str,
    args: &[&[u8]],
) -> Result<(), FolioError> {
    let frame = encode_command(args);
    w.write_all(&frame)
        .await
        .map_err(|source| TransportError::Io {
            endpoint: endpoint.to_owned(),
            op,
            source,
        })?;
    Ok(())
}

/// Reads one full reply frame, recursing for arrays.
pub async fn read_reply(
    r: &mut BufReader<OwnedReadHalf>,
    endpoint: &str,
    op: &'static str,
) -> Result<Reply, FolioError> {
    let line = read_line(r, endpoint, op).await?;
    if line.is_empty() {
        return Err(ProtocolError::Truncated {
            expected: 1,
            got: 0,
        }
        .into());
    }
    let (tag, rest) = line.split_at(1);
    match tag.as_bytes()[0] {
        b'+' => Ok(Reply::Simple(rest.to_owned())),
        b'-' => Ok(Reply::Error(rest.to_owned())),
        b':' => rest
            .parse::<i64>()
            .map(Reply::Integer)
            .map_err(|_| ProtocolError::BadInteger(rest.to_owned()).into()),
        b'$' => {
            let len: i64 = rest
                .parse()
                .map_err(|_| ProtocolError::BadBulkLength(rest.to_owned()))?;
            if len < 0 {
                return Ok(Reply::Bulk(None));
            }
            let mut buf = vec![0u8; len as usize + 2];
            r.read_exact(&mut buf)
                .await
                .map_err(|source| TransportError::Io {
                    endpoint: endpoint.to_owned(),
                    op,
                    source,
                })?;
            buf.truncate(len as usize);
            Ok(Reply::Bulk(Some(buf)))
        }
        b'*' => {
            let len: i64 = rest
                .parse()
                .map_err(|_| ProtocolError::BadInteger(rest.to_owned()))?;
            if len < 0 {
                return Ok(Reply::Array(None));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(Box::pin(read_reply(r, endpoint, op)).await?);
            }
            Ok(Reply::Array(Some(items)))
        }
        other => Err(ProtocolError::UnknownFrame { found: other }.into()),
    }
}

async fn read_line(
    r: &mut BufReader<OwnedReadHalf>,
    endpoint: &str,
    op: &'static str,
) -> Result<String, FolioError> {
    let mut line = String::new();
    let n = r
        .read_line(&mut line)
        .await
        .map_err(|source| TransportError::Io {
            endpoint: endpoint.to_owned(),
            op,
            source,
        })?;
    if n == 0 {
        return Err(TransportError::Eof {
            endpoint: endpoint.to_owned(),
            op,
        }
        .into());
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}
