//! Redis Streams broker publisher for production deployments.
//!
//! A batch becomes one `MULTI`/`EXEC` transaction of `XADD` commands, so the
//! primary applies all entries or none. Each entry goes to the stream of its
//! partition (`{topic}:{subject_id % partitions}`), which keeps every event of
//! one track in a single ordered stream.
//!
//! Durability is checked after `EXEC` with `WAIT`: when `min_replicas` is
//! set, the batch only counts as published once that many replicas
//! acknowledged it. Streams are trimmed with `MINID ~` so entries older than
//! the retention window are dropped by the broker.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{ErrorKind, RedisError};

use crate::config::BrokerConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::outbox::BrokerMessage;
use crate::ports::{BrokerPublisher, PublishError};

/// One `XADD` of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StreamEntry<'a> {
    stream: String,
    event_id: &'a str,
    key: u64,
    payload: &'a str,
}

/// Publishes outbox batches into Redis Streams.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: MultiplexedConnection,
    config: BrokerConfig,
}

impl RedisStreamPublisher {
    /// Create a publisher over an existing connection.
    pub fn new(conn: MultiplexedConnection, config: BrokerConfig) -> Self {
        Self { conn, config }
    }

    /// Open a multiplexed connection to the configured broker.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, PublishError> {
        let client = redis::Client::open(config.url.as_str()).map_err(map_redis_error)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(map_redis_error)?;

        tracing::info!(
            topic = %config.topic,
            partitions = config.partitions,
            min_replicas = config.min_replicas,
            "Connected to Redis Streams broker"
        );

        Ok(Self::new(conn, config.clone()))
    }

    async fn wait_for_replicas(
        &self,
        conn: &mut MultiplexedConnection,
    ) -> Result<(), PublishError> {
        let required = self.config.min_replicas;
        if required == 0 {
            return Ok(());
        }

        let acknowledged: u32 = redis::cmd("WAIT")
            .arg(required)
            .arg(self.config.ack_timeout().as_millis() as u64)
            .query_async(conn)
            .await
            .map_err(map_redis_error)?;

        if acknowledged < required {
            return Err(PublishError::InsufficientReplicas {
                acknowledged,
                required,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerPublisher for RedisStreamPublisher {
    async fn publish_batch(&self, messages: &[BrokerMessage]) -> Result<(), PublishError> {
        if messages.is_empty() {
            return Ok(());
        }

        let min_id = min_id(&self.config, Timestamp::now());
        let mut pipe = redis::pipe();
        pipe.atomic();
        for entry in entries(&self.config, messages) {
            pipe.cmd("XADD")
                .arg(&entry.stream)
                .arg("MINID")
                .arg("~")
                .arg(&min_id)
                .arg("*")
                .arg("event_id")
                .arg(entry.event_id)
                .arg("key")
                .arg(entry.key)
                .arg("payload")
                .arg(entry.payload);
        }

        let mut conn = self.conn.clone();
        let entry_ids: Vec<String> = pipe
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if entry_ids.len() != messages.len() {
            return Err(PublishError::PartialAck {
                acknowledged: entry_ids.len(),
                expected: messages.len(),
            });
        }

        self.wait_for_replicas(&mut conn).await?;

        tracing::debug!(
            batch_size = messages.len(),
            first_entry = %entry_ids[0],
            "Batch appended to Redis Streams"
        );
        Ok(())
    }
}

fn entries<'a>(config: &BrokerConfig, messages: &'a [BrokerMessage]) -> Vec<StreamEntry<'a>> {
    messages
        .iter()
        .map(|m| StreamEntry {
            stream: config.stream_name(m.partition(config.partitions)),
            event_id: m.event_id.as_str(),
            key: m.key.value(),
            payload: &m.body,
        })
        .collect()
}

/// Oldest entry id kept by trimming, as `<millis>-0`.
fn min_id(config: &BrokerConfig, now: Timestamp) -> String {
    let retention_ms = i64::try_from(config.retention().as_millis()).unwrap_or(i64::MAX);
    let cutoff = now.as_unix_millis().saturating_sub(retention_ms).max(0);
    format!("{}-0", cutoff)
}

/// Connection-level failures are `Unavailable`, everything the server
/// refused is `Rejected`.
fn map_redis_error(e: RedisError) -> PublishError {
    if e.is_io_error()
        || e.is_connection_refusal()
        || e.is_connection_dropped()
        || e.is_timeout()
        || e.kind() == ErrorKind::TryAgain
        || e.kind() == ErrorKind::BusyLoadingError
    {
        PublishError::Unavailable(e.to_string())
    } else {
        PublishError::Rejected(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{EventId, TrackId};

    fn message(key: u64) -> BrokerMessage {
        BrokerMessage {
            event_id: EventId::from_string(format!("evt-{key}")),
            key: TrackId::new(key),
            body: format!("{{\"subject_id\":{key}}}"),
        }
    }

    fn config(partitions: u32) -> BrokerConfig {
        BrokerConfig {
            url: "redis://127.0.0.1:6379".to_string(),
            partitions,
            ..Default::default()
        }
    }

    #[test]
    fn entries_follow_subject_partition() {
        let config = config(2);
        let batch = [message(1), message(2), message(3)];

        let entries = entries(&config, &batch);

        let streams: Vec<_> = entries.iter().map(|e| e.stream.as_str()).collect();
        assert_eq!(
            streams,
            vec![
                "sync-default-events:1",
                "sync-default-events:0",
                "sync-default-events:1"
            ]
        );
        assert_eq!(entries[0].event_id, "evt-1");
        assert_eq!(entries[0].key, 1);
        assert_eq!(entries[0].payload, "{\"subject_id\":1}");
    }

    #[test]
    fn single_partition_uses_one_stream() {
        let config = config(1);
        let batch = [message(7), message(8)];

        assert!(entries(&config, &batch)
            .iter()
            .all(|e| e.stream == "sync-default-events:0"));
    }

    #[test]
    fn min_id_is_retention_before_now() {
        let config = config(1);
        let now = Timestamp::now();

        let expected = now.as_unix_millis() - 7 * 24 * 3_600_000;

        assert_eq!(min_id(&config, now), format!("{expected}-0"));
    }

    #[test]
    fn server_errors_are_rejections() {
        let err = RedisError::from((ErrorKind::ResponseError, "OOM command not allowed"));
        assert!(matches!(map_redis_error(err), PublishError::Rejected(_)));
    }

    #[test]
    fn io_errors_are_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_redis_error(RedisError::from(io)),
            PublishError::Unavailable(_)
        ));
    }

    #[test]
    fn busy_loading_is_unavailable() {
        let err = RedisError::from((ErrorKind::BusyLoadingError, "loading dataset"));
        assert!(matches!(map_redis_error(err), PublishError::Unavailable(_)));
    }

    // Tests below need a running Redis instance.

    async fn publisher(partitions: u32) -> RedisStreamPublisher {
        let config = BrokerConfig {
            topic: format!("outbox-test-{}", EventId::new().as_str().replace('-', "")),
            ..config(partitions)
        };
        RedisStreamPublisher::connect(&config).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn batch_is_appended_to_partition_streams() {
        let publisher = publisher(2).await;
        let topic = publisher.config.topic.clone();

        publisher
            .publish_batch(&[message(1), message(2), message(3)])
            .await
            .unwrap();

        let mut conn = publisher.conn.clone();
        let len: usize = redis::cmd("XLEN")
            .arg(format!("{topic}:1"))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(len, 2);
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn missing_replicas_fail_the_batch() {
        let mut publisher = publisher(1).await;
        publisher.config.min_replicas = 1;
        publisher.config.ack_timeout_ms = 50;

        let err = publisher.publish_batch(&[message(1)]).await.unwrap_err();

        assert_eq!(
            err,
            PublishError::InsufficientReplicas {
                acknowledged: 0,
                required: 1
            }
        );
    }
}
