//! Table definitions.
//!
//! One table per event family, keyed for idempotency: where the service
//! supplies a domain id (chat message id, redemption id, poll id + phase)
//! that is the primary key; otherwise the transport message id is, which is
//! stable across redeliveries. Poll choices and prediction outcomes are
//! stored as JSON columns.

use rusqlite::Connection;

use crate::errors::Result;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS chat_messages (
        message_id    TEXT PRIMARY KEY,
        broadcaster_id TEXT NOT NULL,
        chatter_id    TEXT NOT NULL,
        chatter_login TEXT NOT NULL,
        chatter_name  TEXT NOT NULL,
        text          TEXT NOT NULL,
        color         TEXT,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS follows (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_login    TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        followed_at   TEXT NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS subscriptions (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        tier          TEXT NOT NULL,
        is_gift       INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS subscription_ends (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        tier          TEXT NOT NULL,
        is_gift       INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS subscription_gifts (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT,
        user_name     TEXT,
        broadcaster_id TEXT NOT NULL,
        total         INTEGER NOT NULL,
        tier          TEXT NOT NULL,
        cumulative_total INTEGER,
        is_anonymous  INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS subscription_messages (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        tier          TEXT NOT NULL,
        text          TEXT NOT NULL,
        cumulative_months INTEGER NOT NULL,
        streak_months INTEGER,
        duration_months INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS raids (
        message_id    TEXT PRIMARY KEY,
        from_broadcaster_id TEXT NOT NULL,
        from_broadcaster_name TEXT NOT NULL,
        to_broadcaster_id TEXT NOT NULL,
        viewers       INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS bans (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        moderator_id  TEXT NOT NULL,
        reason        TEXT NOT NULL,
        banned_at     TEXT NOT NULL,
        ends_at       TEXT,
        is_permanent  INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS unbans (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        moderator_id  TEXT NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS cheers (
        message_id    TEXT PRIMARY KEY,
        user_id       TEXT,
        user_name     TEXT,
        broadcaster_id TEXT NOT NULL,
        message       TEXT NOT NULL,
        bits          INTEGER NOT NULL,
        is_anonymous  INTEGER NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reward_redemptions (
        id            TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        user_input    TEXT NOT NULL,
        status        TEXT NOT NULL,
        reward_id     TEXT NOT NULL,
        reward_title  TEXT NOT NULL,
        reward_cost   INTEGER NOT NULL,
        redeemed_at   TEXT NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS polls (
        id            TEXT NOT NULL,
        phase         TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        title         TEXT NOT NULL,
        choices       TEXT NOT NULL,
        started_at    TEXT NOT NULL,
        ends_at       TEXT,
        status        TEXT,
        received_at   TEXT NOT NULL,
        PRIMARY KEY (id, phase)
    )",
    "CREATE TABLE IF NOT EXISTS predictions (
        id            TEXT NOT NULL,
        phase         TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        title         TEXT NOT NULL,
        outcomes      TEXT NOT NULL,
        started_at    TEXT NOT NULL,
        locks_at      TEXT,
        winning_outcome_id TEXT,
        status        TEXT,
        received_at   TEXT NOT NULL,
        PRIMARY KEY (id, phase)
    )",
    "CREATE TABLE IF NOT EXISTS vip_changes (
        message_id    TEXT PRIMARY KEY,
        action        TEXT NOT NULL,
        user_id       TEXT NOT NULL,
        user_name     TEXT NOT NULL,
        broadcaster_id TEXT NOT NULL,
        received_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS stream_states (
        message_id    TEXT PRIMARY KEY,
        broadcaster_id TEXT NOT NULL,
        status        TEXT NOT NULL,
        stream_id     TEXT,
        stream_type   TEXT,
        started_at    TEXT,
        received_at   TEXT NOT NULL
    )",
];

/// Create all tables if they don't exist.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    for ddl in TABLES {
        let _ = conn.execute(ddl, [])?;
    }
    Ok(())
}
