// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Perceptia

//! Redis-backed session store.
//!
//! Layout:
//!
//! | Key              | Value                      |
//! |------------------|----------------------------|
//! | `sid:<token>`    | JSON [`SessionRecord`]     |
//! | `suid:<uuid>`    | token the session is under |
//!
//! Both keys carry the same TTL. Reads and deletes run as Lua scripts so the
//! pair is refreshed or removed in a single round trip.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisResult, Script};
use tracing::debug;
use uuid::Uuid;

use super::{SessionRecord, SessionStore, SessionStoreError, SessionToken};

const SESSION_PREFIX: &str = "sid:";
const UUID_PREFIX: &str = "suid:";

// KEYS[1] = session key, ARGV[1] = ttl in ms, ARGV[2] = uuid index prefix
const GET_AND_REFRESH: &str = r#"
local value = redis.call('GET', KEYS[1])
if not value then
    return false
end
redis.call('PEXPIRE', KEYS[1], ARGV[1])
local ok, record = pcall(cjson.decode, value)
if ok and record.sessionUuid then
    redis.call('PEXPIRE', ARGV[2] .. record.sessionUuid, ARGV[1])
end
return value
"#;

// KEYS[1] = session key, ARGV[1] = uuid index prefix
const DELETE_PAIR: &str = r#"
local value = redis.call('GET', KEYS[1])
if not value then
    return 0
end
local ok, record = pcall(cjson.decode, value)
if ok and record.sessionUuid then
    redis.call('DEL', ARGV[1] .. record.sessionUuid)
end
return redis.call('DEL', KEYS[1])
"#;

fn session_key(token: &SessionToken) -> String {
    format!("{SESSION_PREFIX}{}", token.as_str())
}

fn uuid_key(session_uuid: Uuid) -> String {
    format!("{UUID_PREFIX}{session_uuid}")
}

pub struct RedisSessionStore {
    conn: ConnectionManager,
    ttl: Duration,
    timeout: Duration,
    get_and_refresh: Script,
    delete_pair: Script,
}

impl RedisSessionStore {
    /// Connect to `address` (`host:port`).
    pub async fn connect(
        address: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(format!("redis://{address}/"))
            .map_err(|e| SessionStoreError::BackendUnavailable(e.to_string()))?;
        let conn = match tokio::time::timeout(timeout, ConnectionManager::new(client)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(SessionStoreError::BackendUnavailable(e.to_string())),
            Err(_) => return Err(timed_out()),
        };

        Ok(Self {
            conn,
            ttl,
            timeout,
            get_and_refresh: Script::new(GET_AND_REFRESH),
            delete_pair: Script::new(DELETE_PAIR),
        })
    }

    fn ttl_millis(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX)
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, SessionStoreError> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(SessionStoreError::BackendUnavailable(e.to_string())),
            Err(_) => Err(timed_out()),
        }
    }
}

fn timed_out() -> SessionStoreError {
    SessionStoreError::BackendUnavailable("timed out".into())
}

fn decode(value: &str) -> Result<SessionRecord, SessionStoreError> {
    let record: SessionRecord = serde_json::from_str(value)
        .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;
    if !record.is_consistent() {
        return Err(SessionStoreError::Serialization(
            "authenticated flag does not match bound user".into(),
        ));
    }
    Ok(record)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(
        &self,
        token: &SessionToken,
        record: &SessionRecord,
    ) -> Result<(), SessionStoreError> {
        let value = serde_json::to_string(record)
            .map_err(|e| SessionStoreError::Serialization(e.to_string()))?;
        let ttl = self.ttl_millis();
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .pset_ex(session_key(token), value, ttl)
            .ignore()
            .pset_ex(uuid_key(record.session_uuid()), token.as_str(), ttl)
            .ignore();

        let () = self.bounded(async move { pipe.query_async(&mut conn).await }).await?;
        debug!(session_uuid = %record.session_uuid(), "session saved");
        Ok(())
    }

    async fn get(&self, token: &SessionToken) -> Result<SessionRecord, SessionStoreError> {
        let key = session_key(token);
        let ttl = self.ttl_millis();
        let mut conn = self.conn.clone();

        let value: Option<String> = self
            .bounded(async {
                self.get_and_refresh
                    .key(key)
                    .arg(ttl)
                    .arg(UUID_PREFIX)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;

        decode(&value.ok_or(SessionStoreError::NotFound)?)
    }

    async fn exists(&self, token: &SessionToken) -> Result<bool, SessionStoreError> {
        let key = session_key(token);
        let mut conn = self.conn.clone();
        let found: bool = self
            .bounded(async move { redis::cmd("EXISTS").arg(key).query_async(&mut conn).await })
            .await?;
        Ok(found)
    }

    async fn delete(&self, token: &SessionToken) -> Result<(), SessionStoreError> {
        let key = session_key(token);
        let mut conn = self.conn.clone();

        let removed: i64 = self
            .bounded(async {
                self.delete_pair
                    .key(key)
                    .arg(UUID_PREFIX)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        debug!(removed, "session delete");
        Ok(())
    }

    async fn id_by_uuid(&self, session_uuid: Uuid) -> Result<SessionToken, SessionStoreError> {
        let key = uuid_key(session_uuid);
        let mut conn = self.conn.clone();
        let token: Option<String> = self
            .bounded(async move { redis::cmd("GET").arg(key).query_async(&mut conn).await })
            .await?;

        let token = SessionToken::from_stored(token.ok_or(SessionStoreError::NotFound)?);
        // The index can briefly outlive its session.
        if !self.exists(&token).await? {
            return Err(SessionStoreError::NotFound);
        }
        Ok(token)
    }

    async fn ping(&self) -> Result<(), SessionStoreError> {
        let mut conn = self.conn.clone();
        let _pong: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }
}
