// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sink client: the single consumer of the entry channel.
//!
//! The client owns the [`Batch`] and the receiving half of the bounded entry
//! channel. It runs one loop that either
//!
//! - receives an entry and appends it to the batch, or
//! - on every flush tick, pushes the batch if it is ready to send.
//!
//! When every sender has been dropped the channel closes, the client performs
//! one final push regardless of readiness, and [`SinkClient::run`] returns.
//!
//! A failed push never drops data: the batch is kept and retried on the next
//! tick. [`SinkConfig::max_retained_bytes`] optionally bounds how much a
//! failing sink may accumulate.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::batch::Batch;
use crate::constants;
use crate::entry::Entry;
use crate::error::PushError;

#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Full push URL, e.g. `http://loki:3100/loki/api/v1/push`.
    pub url: String,
    pub user_agent: String,
    pub flush_period: Duration,
    pub push_timeout: Duration,
    pub final_flush_timeout: Duration,
    pub max_batch_age: Duration,
    pub min_batch_bytes: usize,
    pub channel_capacity: usize,
    /// When set, a batch still larger than this after a failed push is
    /// dropped. `None` retains and retries without bound.
    pub max_retained_bytes: Option<usize>,
}

impl SinkConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: concat!("loki-push/", env!("CARGO_PKG_VERSION")).to_string(),
            flush_period: constants::FLUSH_PERIOD,
            push_timeout: constants::PUSH_TIMEOUT,
            final_flush_timeout: constants::FINAL_FLUSH_TIMEOUT,
            max_batch_age: constants::MAX_BATCH_AGE,
            min_batch_bytes: constants::MIN_BATCH_BYTES,
            channel_capacity: constants::CHANNEL_CAPACITY,
            max_retained_bytes: None,
        }
    }
}

pub struct SinkClient {
    client: reqwest::Client,
    config: SinkConfig,
    headers: HeaderMap,
    batch: Batch,
    rx: mpsc::Receiver<Entry>,
}

impl SinkClient {
    /// Creates the client together with the sending half of its entry
    /// channel. The client stops once every clone of the sender is dropped.
    pub fn new(config: SinkConfig) -> Result<(Self, mpsc::Sender<Entry>), PushError> {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let client = reqwest::Client::builder().build()?;
        let headers = build_headers(&config.user_agent);
        let batch = Batch::new(config.max_batch_age, config.min_batch_bytes);
        Ok((
            Self {
                client,
                config,
                headers,
                batch,
                rx,
            },
            tx,
        ))
    }

    #[must_use]
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub async fn run(mut self) {
        let period = self.config.flush_period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                entry = self.rx.recv() => {
                    let Some(entry) = entry else {
                        break;
                    };
                    self.batch.add(entry);
                }
                _ = ticker.tick() => {
                    if self.batch.ready_to_send() {
                        self.flush(self.config.push_timeout).await;
                    }
                }
            }
        }

        info!("LOKI | Entry channel closed, performing final flush");
        self.flush(self.config.final_flush_timeout).await;
    }

    /// Pushes the current batch. Resets it on success; on failure the batch
    /// is kept for the next attempt, subject to `max_retained_bytes`.
    pub async fn flush(&mut self, timeout: Duration) -> bool {
        if self.batch.is_empty() {
            return true;
        }

        let started = std::time::Instant::now();
        match self.push(timeout).await {
            Ok(()) => {
                debug!(
                    streams = self.batch.stream_count(),
                    entries = self.batch.entry_count(),
                    "LOKI | Pushed batch in {} ms",
                    started.elapsed().as_millis()
                );
                self.batch.reset();
                true
            }
            Err(err) => {
                warn!(
                    entries = self.batch.entry_count(),
                    bytes = self.batch.bytes(),
                    "LOKI | Failed to push batch, keeping it for retry: {err}"
                );
                if let Some(limit) = self.config.max_retained_bytes {
                    if self.batch.bytes() > limit {
                        error!(
                            entries = self.batch.entry_count(),
                            bytes = self.batch.bytes(),
                            limit,
                            "LOKI | Dropping batch exceeding retention limit"
                        );
                        self.batch.reset();
                    }
                }
                false
            }
        }
    }

    async fn push(&self, timeout: Duration) -> Result<(), PushError> {
        let body = self.batch.make_push_request()?;
        let resp = self
            .client
            .post(&self.config.url)
            .timeout(timeout)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        let message = text.lines().next().unwrap_or_default().to_string();
        Err(PushError::Status { status, message })
    }
}

fn build_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(constants::CONTENT_TYPE),
    );
    match HeaderValue::from_str(user_agent) {
        Ok(value) => {
            headers.insert(USER_AGENT, value);
        }
        Err(e) => warn!("LOKI | Invalid user agent {user_agent:?}: {e}"),
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelSet;
    use crate::proto::PushRequest;
    use mockito::{Matcher, Server};
    use prost::Message;
    use std::sync::{Arc, Mutex};
    use std::time::UNIX_EPOCH;

    fn entry(line: &str) -> Entry {
        let labels: LabelSet = [("nomad_alloc_id", "a1"), ("stream", "stdout")]
            .into_iter()
            .collect();
        Entry::new(UNIX_EPOCH + Duration::from_secs(1), line, labels)
    }

    fn config(url: String) -> SinkConfig {
        let mut config = SinkConfig::new(url);
        config.user_agent = "nomad-shipper/test".to_string();
        config
    }

    #[tokio::test]
    async fn failed_push_keeps_batch_and_success_resets_it() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("POST", "/loki/api/v1/push")
            .with_status(500)
            .with_body("ingester unavailable\nstack trace follows")
            .expect(1)
            .create_async()
            .await;

        let (mut client, _tx) =
            SinkClient::new(config(format!("{}/loki/api/v1/push", server.url()))).expect("client");
        client.batch.add(entry("hello"));

        assert!(!client.flush(Duration::from_secs(5)).await);
        failing.assert_async().await;
        assert_eq!(client.batch().entry_count(), 1);

        // entries keep arriving while the sink is failing
        client.batch.add(entry("world"));
        assert_eq!(client.batch().entry_count(), 2);

        failing.remove_async().await;
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&pushed);
        let ok = server
            .mock("POST", "/loki/api/v1/push")
            .match_request(move |request| {
                if let Ok(body) = request.body() {
                    captured.lock().unwrap().clone_from(body);
                }
                true
            })
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        assert!(client.flush(Duration::from_secs(5)).await);
        ok.assert_async().await;
        assert!(client.batch().is_empty());

        let body = pushed.lock().unwrap().clone();
        let raw = snap::raw::Decoder::new()
            .decompress_vec(&body)
            .expect("valid snappy block");
        let request = PushRequest::decode(raw.as_slice()).expect("valid protobuf");
        assert_eq!(request.streams.len(), 1);
        let lines: Vec<&str> = request.streams[0]
            .entries
            .iter()
            .map(|e| e.line.as_str())
            .collect();
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn non_success_status_reports_first_body_line() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/push")
            .with_status(400)
            .with_body("entry out of order\nmore details")
            .create_async()
            .await;

        let (mut client, _tx) =
            SinkClient::new(config(format!("{}/push", server.url()))).expect("client");
        client.batch.add(entry("hello"));

        let err = client
            .push(Duration::from_secs(5))
            .await
            .expect_err("push should fail");
        match err {
            PushError::Status { status, message } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(message, "entry out of order");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_sends_protobuf_headers() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/push")
            .match_header("content-type", "application/x-protobuf")
            .match_header("user-agent", "nomad-shipper/test")
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let (mut client, _tx) =
            SinkClient::new(config(format!("{}/push", server.url()))).expect("client");
        client.batch.add(entry("hello"));

        assert!(client.flush(Duration::from_secs(5)).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transport_error_keeps_batch() {
        // nothing listens on port 1
        let (mut client, _tx) =
            SinkClient::new(config("http://127.0.0.1:1/push".to_string())).expect("client");
        client.batch.add(entry("hello"));

        assert!(!client.flush(Duration::from_secs(2)).await);
        assert_eq!(client.batch().entry_count(), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_not_pushed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/push")
            .with_status(204)
            .expect(0)
            .create_async()
            .await;

        let (mut client, _tx) =
            SinkClient::new(config(format!("{}/push", server.url()))).expect("client");

        assert!(client.flush(Duration::from_secs(5)).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn retention_limit_drops_oversized_batch() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/push")
            .with_status(503)
            .create_async()
            .await;

        let mut cfg = config(format!("{}/push", server.url()));
        cfg.max_retained_bytes = Some(8);
        let (mut client, _tx) = SinkClient::new(cfg).expect("client");

        client.batch.add(entry("1234"));
        assert!(!client.flush(Duration::from_secs(5)).await);
        assert_eq!(client.batch().entry_count(), 1, "under the limit");

        client.batch.add(entry("56789"));
        assert!(!client.flush(Duration::from_secs(5)).await);
        assert!(client.batch().is_empty(), "over the limit");
    }

    #[tokio::test]
    async fn channel_close_triggers_final_flush() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/push")
            .match_body(Matcher::Any)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;

        let (client, tx) =
            SinkClient::new(config(format!("{}/push", server.url()))).expect("client");
        let handle = tokio::spawn(client.run());

        tx.send(entry("one")).await.expect("send");
        tx.send(entry("two")).await.expect("send");
        drop(tx);

        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("client exits after channel close")
            .expect("task does not panic");
        mock.assert_async().await;
    }
}
