//! Player Directory
//!
//! Resolves social-media account handles and display names to [`Player`]s
//! (name + current team). Two backends:
//! - `MemoryPlayerDirectory`: a roster loaded from a JSON file, for replay and tests
//! - `SqlitePlayerDirectory`: a persistent `players` table with a name index

use crate::models::Player;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[async_trait::async_trait]
pub trait PlayerDirectory: Send + Sync {
    /// Look up by account handle (the directory's primary key).
    async fn by_account(&self, account: &str) -> Result<Option<Player>>;

    /// Look up by display name, as named in athlete annotations.
    async fn by_name(&self, name: &str) -> Result<Option<Player>>;
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryPlayerDirectory {
    by_account: HashMap<String, Player>,
    by_name: HashMap<String, Player>,
}

impl MemoryPlayerDirectory {
    pub fn new(players: impl IntoIterator<Item = Player>) -> Self {
        let mut dir = Self::default();
        for player in players {
            dir.insert(player);
        }
        dir
    }

    /// Load a JSON array of `{account, name, team}` objects.
    pub fn from_roster_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster {}", path.display()))?;
        let players: Vec<Player> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse roster {}", path.display()))?;
        info!(path = %path.display(), players = players.len(), "roster loaded");
        Ok(Self::new(players))
    }

    pub fn insert(&mut self, player: Player) {
        self.by_name.insert(player.name.clone(), player.clone());
        self.by_account.insert(player.account.clone(), player);
    }

    pub fn len(&self) -> usize {
        self.by_account.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_account.is_empty()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.by_account.values()
    }
}

#[async_trait::async_trait]
impl PlayerDirectory for MemoryPlayerDirectory {
    async fn by_account(&self, account: &str) -> Result<Option<Player>> {
        Ok(self.by_account.get(account).cloned())
    }

    async fn by_name(&self, name: &str) -> Result<Option<Player>> {
        Ok(self.by_name.get(name).cloned())
    }
}

// =============================================================================
// SQLITE
// =============================================================================

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS players (
    account TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    team TEXT NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_players_name ON players(name);
"#;

/// Insert or refresh one player. A refresh also bumps `updated_at`, which
/// decides `by_name` when two accounts share a display name.
const UPSERT_SQL: &str = "INSERT INTO players (account, name, team) VALUES (?1, ?2, ?3)
     ON CONFLICT(account) DO UPDATE SET
        name = excluded.name,
        team = excluded.team,
        updated_at = strftime('%s', 'now')";

pub struct SqlitePlayerDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePlayerDirectory {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open player directory at {}", db_path))?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize player directory schema")?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM players", [], |row| row.get(0))
            .unwrap_or(0);
        info!("📇 Player directory at {} ({} players)", db_path, count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn upsert(&self, player: &Player) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            UPSERT_SQL,
            params![&player.account, &player.name, &player.team],
        )?;
        Ok(())
    }

    /// Bulk load in one transaction. Returns the number of rows written.
    pub fn import(&self, players: &[Player]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_SQL)?;
            for player in players {
                stmt.execute(params![&player.account, &player.name, &player.team])?;
            }
        }
        tx.commit()?;
        Ok(players.len())
    }

    pub fn len(&self) -> usize {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM players", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn row_to_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
        Ok(Player {
            account: row.get(0)?,
            name: row.get(1)?,
            team: row.get(2)?,
        })
    }

    fn query_one(&self, sql: &str, key: &str) -> Result<Option<Player>> {
        let conn = self.conn.lock();
        let player = conn
            .query_row(sql, params![key], Self::row_to_player)
            .optional()?;
        Ok(player)
    }
}

#[async_trait::async_trait]
impl PlayerDirectory for SqlitePlayerDirectory {
    async fn by_account(&self, account: &str) -> Result<Option<Player>> {
        self.query_one(
            "SELECT account, name, team FROM players WHERE account = ?1",
            account,
        )
    }

    async fn by_name(&self, name: &str) -> Result<Option<Player>> {
        // Several accounts may share a display name; take the most recent.
        self.query_one(
            "SELECT account, name, team FROM players WHERE name = ?1
             ORDER BY updated_at DESC, account LIMIT 1",
            name,
        )
    }
}
