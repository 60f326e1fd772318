use redis::Client;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use tracing::info;

/// One shared, self-reconnecting connection for ordinary commands.
#[derive(Clone)]
pub struct RedisService {
    client: Client,
    shared: ConnectionManager,
}

impl RedisService {
    /// Opens the client and fails fast if the server does not answer `PING`.
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(connection_string)?;

        let mut shared = ConnectionManager::new(client.clone()).await?;
        let _: String = redis::cmd("PING").query_async(&mut shared).await?;

        let info = client.get_connection_info();
        info!("Connected to Redis at {} (db {})", info.addr, info.redis.db);
        Ok(Self { client, shared })
    }

    /// Handle to the shared connection; clones multiplex onto one socket.
    pub fn conn(&self) -> ConnectionManager {
        self.shared.clone()
    }

    /// Opens a connection of its own. Blocking commands need one, since a
    /// blocked connection stalls every command multiplexed on it.
    pub async fn dedicated_conn(&self) -> Result<MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}
