use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;

use folio_errors::{FolioError, RemoteError, TransportError};

use crate::resp::{read_reply, write_command, Reply};

/// Credentials for `AUTH`, if the remote store requires them.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A single framed connection to the remote store. Not `Sync`: callers use
/// it from one task at a time, borrowing it from a [`crate::ConnPool`] for
/// the duration of a request (or a transaction).
pub struct WireClient {
    endpoint: String,
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
    connect_timeout: Duration,
    receive_timeout: Duration,
    in_transaction: bool,
}

impl WireClient {
    pub async fn open(
        endpoint: &str,
        db: Option<u32>,
        credentials: Option<Credentials>,
        connect_timeout: Duration,
        receive_timeout: Duration,
    ) -> Result<Self, FolioError> {
        let stream = timeout(connect_timeout, TcpStream::connect(endpoint))
            .await
            .map_err(|_| TransportError::Timeout {
                endpoint: endpoint.to_owned(),
                op: "connect",
                timeout: connect_timeout,
            })?
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_owned(),
                source,
            })?;
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        let mut client = WireClient {
            endpoint: endpoint.to_owned(),
            reader: BufReader::new(read_half),
            writer: write_half,
            connect_timeout,
            receive_timeout,
            in_transaction: false,
        };

        if let Some(creds) = credentials {
            match (creds.username, creds.password) {
                (Some(u), Some(p)) => {
                    client.call(&[b"AUTH", u.as_bytes(), p.as_bytes()]).await?;
                }
                (None, Some(p)) => {
                    client.call(&[b"AUTH", p.as_bytes()]).await?;
                }
                _ => {}
            }
        }
        if let Some(db) = db {
            client
                .call(&[b"SELECT", db.to_string().as_bytes()])
                .await?;
        }
        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issues one command and waits for its reply, converting an `Error`
    /// reply frame into a [`FolioError::Remote`].
    pub async fn call(&mut self, args: &[&[u8]]) -> Result<Reply, FolioError> {
        write_command(&mut self.writer, &self.endpoint, "send", args).await?;
        let reply = timeout(
            self.receive_timeout,
            read_reply(&mut self.reader, &self.endpoint, "recv"),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            endpoint: self.endpoint.clone(),
            op: "recv",
            timeout: self.receive_timeout,
        })??;
        if let Reply::Error(msg) = &reply {
            return Err(RemoteError(msg.clone()).into());
        }
        Ok(reply)
    }

    /// Queues `MULTI`. Subsequent `call`s are queued by the remote store
    /// until [`Self::exec`] or [`Self::discard`].
    pub async fn begin(&mut self) -> Result<(), FolioError> {
        self.call(&[b"MULTI"]).await?;
        self.in_transaction = true;
        Ok(())
    }

    /// Runs `EXEC`, returning the per-command replies in submission order.
    pub async fn exec(&mut self) -> Result<Vec<Reply>, FolioError> {
        self.in_transaction = false;
        let reply = self.call(&[b"EXEC"]).await?;
        Ok(reply.into_array().unwrap_or_default())
    }

    pub async fn discard(&mut self) -> Result<(), FolioError> {
        self.in_transaction = false;
        self.call(&[b"DISCARD"]).await?;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// A cheap liveness probe used by [`crate::ConnPool`] before handing a
    /// connection back out of the free list. Only a bare `PONG` counts as
    /// alive (§4.2); any other reply is treated the same as a transport
    /// error by callers that interpret this result.
    pub async fn ping(&mut self) -> Result<(), FolioError> {
        match self.call(&[b"PING"]).await? {
            Reply::Simple(s) if s == "PONG" => Ok(()),
            other => Err(RemoteError(format!("unexpected reply to PING: {other:?}")).into()),
        }
    }

    /// Opens a pipeline batch on this connection (§4.1): commands queued
    /// through the returned [`Pipeline`] are written immediately but their
    /// replies are not read back one at a time. Call [`Pipeline::finish`]
    /// to read exactly as many replies as were queued, in submission order.
    ///
    /// A real scope-exit flush (reading the queued replies when the
    /// pipeline value is dropped) would need async work in `Drop`, which
    /// safe Rust doesn't allow; `finish` is the explicit stand-in a caller
    /// must remember to call.
    pub fn pipeline(&mut self) -> Pipeline<'_> {
        Pipeline {
            client: self,
            queued: 0,
        }
    }
}

/// A batch of commands written to the connection but not yet read back.
/// See [`WireClient::pipeline`].
pub struct Pipeline<'a> {
    client: &'a mut WireClient,
    queued: usize,
}

impl<'a> Pipeline<'a> {
    /// Writes one command to the connection without waiting for its reply.
    pub async fn queue(&mut self, args: &[&[u8]]) -> Result<(), FolioError> {
        write_command(&mut self.client.writer, &self.client.endpoint, "send", args).await?;
        self.queued += 1;
        Ok(())
    }

    /// Reads exactly as many replies as were queued, in submission order.
    /// Consumes the pipeline: once its replies are read there is nothing
    /// left to finish.
    pub async fn finish(self) -> Result<Vec<Reply>, FolioError> {
        let mut replies = Vec::with_capacity(self.queued);
        for _ in 0..self.queued {
            let reply = timeout(
                self.client.receive_timeout,
                read_reply(&mut self.client.reader, &self.client.endpoint, "recv"),
            )
            .await
            .map_err(|_| TransportError::Timeout {
                endpoint: self.client.endpoint.clone(),
                op: "recv",
                timeout: self.client.receive_timeout,
            })??;
            replies.push(reply);
        }
        Ok(replies)
    }

    /// How many commands have been queued so far.
    pub fn len(&self) -> usize {
        self.queued
    }

    pub fn is_empty(&self) -> bool {
        self.queued == 0
    }
}
