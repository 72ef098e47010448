//! Broker adapters - Implementations of `BrokerPublisher`.
//!
//! - `RedisStreamPublisher` - Redis Streams, one atomic transaction per batch
//! - `InMemoryBroker` - Records deliveries for tests

mod in_memory;
mod redis_streams;

pub use in_memory::InMemoryBroker;
pub use redis_streams::RedisStreamPublisher;
