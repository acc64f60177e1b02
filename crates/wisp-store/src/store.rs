//! The `SqliteEventStore`.
//!
//! Implements the persistence boundary with one `INSERT OR IGNORE` per
//! notification — writing the same record twice leaves one row, which is
//! what makes redelivery harmless even if it slips past the in-memory
//! dedup window.

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params};
use tracing::{debug, instrument};

use wisp_core::records::{Event, EventRecord};
use wisp_core::writer::{EventWriter, WriteError};
use wisp_core::EventKind;

use crate::errors::{Result, StoreError};
use crate::schema::run_migrations;

type ConnectionPool = Pool<SqliteConnectionManager>;
type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const SQLITE_BUSY_MAX_RETRIES: u32 = 32;

/// SQLite-backed notification store.
pub struct SqliteEventStore {
    pool: ConnectionPool,
}

impl SqliteEventStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        Self::from_manager(manager)
    }

    /// Open an in-memory database (tests).
    ///
    /// Pool size 1 so every handle sees the same in-memory database.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = Pool::builder().max_size(1).build(manager)?;
        {
            let conn = pool.get()?;
            run_migrations(&conn)?;
        }
        Ok(Self { pool })
    }

    fn from_manager(manager: SqliteConnectionManager) -> Result<Self> {
        let pool = Pool::builder().max_size(4).build(manager)?;
        {
            let conn = pool.get()?;
            run_migrations(&conn)?;
        }
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Insert the record unless its natural key already exists.
    #[instrument(skip(self, record), fields(message_id = %record.message_id, kind = %record.event.kind()))]
    pub fn insert(&self, record: &EventRecord) -> Result<()> {
        retry_on_sqlite_busy(|| {
            let conn = self.conn()?;
            let changed = insert_record(&conn, record)?;
            if changed == 0 {
                debug!("record already stored, ignoring");
            }
            Ok(())
        })
    }

    /// Count stored rows for a kind.
    pub fn count(&self, kind: EventKind) -> Result<i64> {
        let conn = self.conn()?;
        let (table, filter) = table_for(kind);
        let count = match filter {
            Some((column, value)) => conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
                params![value],
                |row| row.get(0),
            )?,
            None => conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?,
        };
        Ok(count)
    }
}

impl EventWriter for SqliteEventStore {
    fn upsert(&self, record: &EventRecord) -> std::result::Result<(), WriteError> {
        self.insert(record).map_err(|e| WriteError(Box::new(e)))
    }
}

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )
}

/// Which table (and discriminator filter, for shared tables) a kind maps to.
fn table_for(kind: EventKind) -> (&'static str, Option<(&'static str, &'static str)>) {
    match kind {
        EventKind::ChatMessage => ("chat_messages", None),
        EventKind::Follow => ("follows", None),
        EventKind::Subscribe => ("subscriptions", None),
        EventKind::SubscriptionEnd => ("subscription_ends", None),
        EventKind::SubscriptionGift => ("subscription_gifts", None),
        EventKind::SubscriptionMessage => ("subscription_messages", None),
        EventKind::Raid => ("raids", None),
        EventKind::Ban => ("bans", None),
        EventKind::Unban => ("unbans", None),
        EventKind::Cheer => ("cheers", None),
        EventKind::RewardRedemption => ("reward_redemptions", None),
        EventKind::PollBegin => ("polls", Some(("phase", "begin"))),
        EventKind::PollEnd => ("polls", Some(("phase", "end"))),
        EventKind::PredictionBegin => ("predictions", Some(("phase", "begin"))),
        EventKind::PredictionLock => ("predictions", Some(("phase", "lock"))),
        EventKind::PredictionEnd => ("predictions", Some(("phase", "end"))),
        EventKind::VipAdd => ("vip_changes", Some(("action", "add"))),
        EventKind::VipRemove => ("vip_changes", Some(("action", "remove"))),
        EventKind::StreamOnline => ("stream_states", Some(("status", "online"))),
        EventKind::StreamOffline => ("stream_states", Some(("status", "offline"))),
    }
}

fn insert_record(conn: &Connection, record: &EventRecord) -> Result<usize> {
    let received_at = record.received_at.to_rfc3339();
    let msg_id = &record.message_id;

    let changed = match &record.event {
        Event::ChatMessage(e) => conn.execute(
            "INSERT OR IGNORE INTO chat_messages
             (message_id, broadcaster_id, chatter_id, chatter_login, chatter_name, text, color, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                e.message_id,
                e.broadcaster_user_id,
                e.chatter_user_id,
                e.chatter_user_login,
                e.chatter_user_name,
                e.message.text,
                e.color,
                received_at
            ],
        )?,
        Event::Follow(e) => conn.execute(
            "INSERT OR IGNORE INTO follows
             (message_id, user_id, user_login, user_name, broadcaster_id, followed_at, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                msg_id,
                e.user_id,
                e.user_login,
                e.user_name,
                e.broadcaster_user_id,
                e.followed_at,
                received_at
            ],
        )?,
        Event::Subscribe(e) => conn.execute(
            "INSERT OR IGNORE INTO subscriptions
             (message_id, user_id, user_name, broadcaster_id, tier, is_gift, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.tier,
                e.is_gift,
                received_at
            ],
        )?,
        Event::SubscriptionEnd(e) => conn.execute(
            "INSERT OR IGNORE INTO subscription_ends
             (message_id, user_id, user_name, broadcaster_id, tier, is_gift, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.tier,
                e.is_gift,
                received_at
            ],
        )?,
        Event::SubscriptionGift(e) => conn.execute(
            "INSERT OR IGNORE INTO subscription_gifts
             (message_id, user_id, user_name, broadcaster_id, total, tier, cumulative_total, is_anonymous, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.total,
                e.tier,
                e.cumulative_total,
                e.is_anonymous,
                received_at
            ],
        )?,
        Event::SubscriptionMessage(e) => conn.execute(
            "INSERT OR IGNORE INTO subscription_messages
             (message_id, user_id, user_name, broadcaster_id, tier, text, cumulative_months, streak_months, duration_months, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.tier,
                e.message.text,
                e.cumulative_months,
                e.streak_months,
                e.duration_months,
                received_at
            ],
        )?,
        Event::Raid(e) => conn.execute(
            "INSERT OR IGNORE INTO raids
             (message_id, from_broadcaster_id, from_broadcaster_name, to_broadcaster_id, viewers, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                msg_id,
                e.from_broadcaster_user_id,
                e.from_broadcaster_user_name,
                e.to_broadcaster_user_id,
                e.viewers,
                received_at
            ],
        )?,
        Event::Ban(e) => conn.execute(
            "INSERT OR IGNORE INTO bans
             (message_id, user_id, user_name, broadcaster_id, moderator_id, reason, banned_at, ends_at, is_permanent, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.moderator_user_id,
                e.reason,
                e.banned_at,
                e.ends_at,
                e.is_permanent,
                received_at
            ],
        )?,
        Event::Unban(e) => conn.execute(
            "INSERT OR IGNORE INTO unbans
             (message_id, user_id, user_name, broadcaster_id, moderator_id, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.moderator_user_id,
                received_at
            ],
        )?,
        Event::Cheer(e) => conn.execute(
            "INSERT OR IGNORE INTO cheers
             (message_id, user_id, user_name, broadcaster_id, message, bits, is_anonymous, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                msg_id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.message,
                e.bits,
                e.is_anonymous,
                received_at
            ],
        )?,
        Event::RewardRedemption(e) => conn.execute(
            "INSERT OR IGNORE INTO reward_redemptions
             (id, user_id, user_name, broadcaster_id, user_input, status, reward_id, reward_title, reward_cost, redeemed_at, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                e.id,
                e.user_id,
                e.user_name,
                e.broadcaster_user_id,
                e.user_input,
                e.status,
                e.reward.id,
                e.reward.title,
                e.reward.cost,
                e.redeemed_at,
                received_at
            ],
        )?,
        Event::PollBegin(e) | Event::PollEnd(e) => {
            let phase = if matches!(record.event, Event::PollBegin(_)) {
                "begin"
            } else {
                "end"
            };
            conn.execute(
                "INSERT OR IGNORE INTO polls
                 (id, phase, broadcaster_id, title, choices, started_at, ends_at, status, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    e.id,
                    phase,
                    e.broadcaster_user_id,
                    e.title,
                    serde_json::to_string(&e.choices)?,
                    e.started_at,
                    e.ends_at,
                    e.status,
                    received_at
                ],
            )?
        }
        Event::PredictionBegin(e) | Event::PredictionLock(e) | Event::PredictionEnd(e) => {
            let phase = match record.event {
                Event::PredictionBegin(_) => "begin",
                Event::PredictionLock(_) => "lock",
                _ => "end",
            };
            conn.execute(
                "INSERT OR IGNORE INTO predictions
                 (id, phase, broadcaster_id, title, outcomes, started_at, locks_at, winning_outcome_id, status, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    e.id,
                    phase,
                    e.broadcaster_user_id,
                    e.title,
                    serde_json::to_string(&e.outcomes)?,
                    e.started_at,
                    e.locks_at,
                    e.winning_outcome_id,
                    e.status,
                    received_at
                ],
            )?
        }
        Event::VipAdd(e) | Event::VipRemove(e) => {
            let action = if matches!(record.event, Event::VipAdd(_)) {
                "add"
            } else {
                "remove"
            };
            conn.execute(
                "INSERT OR IGNORE INTO vip_changes
                 (message_id, action, user_id, user_name, broadcaster_id, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    msg_id,
                    action,
                    e.user_id,
                    e.user_name,
                    e.broadcaster_user_id,
                    received_at
                ],
            )?
        }
        Event::StreamOnline(e) => conn.execute(
            "INSERT OR IGNORE INTO stream_states
             (message_id, broadcaster_id, status, stream_id, stream_type, started_at, received_at)
             VALUES (?1, ?2, 'online', ?3, ?4, ?5, ?6)",
            params![
                msg_id,
                e.broadcaster_user_id,
                e.id,
                e.stream_type,
                e.started_at,
                received_at
            ],
        )?,
        Event::StreamOffline(e) => conn.execute(
            "INSERT OR IGNORE INTO stream_states
             (message_id, broadcaster_id, status, stream_id, stream_type, started_at, received_at)
             VALUES (?1, ?2, 'offline', NULL, NULL, NULL, ?3)",
            params![msg_id, e.broadcaster_user_id, received_at],
        )?,
    };
    Ok(changed)
}

/// Retry an operation on SQLite BUSY/LOCKED with linear backoff + jitter.
fn retry_on_sqlite_busy<T>(mut f: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempts = 0;

    loop {
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if is_sqlite_busy_or_locked(&err) && attempts < SQLITE_BUSY_MAX_RETRIES => {
                attempts += 1;
                let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                let jitter_range = base_ms / 4;
                let jitter = if jitter_range > 0 {
                    rand::random::<u64>() % (jitter_range * 2 + 1)
                } else {
                    0
                };
                let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                std::thread::sleep(Duration::from_millis(backoff_ms));
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_sqlite_busy_or_locked(err: &StoreError) -> bool {
    match err {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
