//! Database schema migrations for SQLite.
//!
//! A simple versioned migration system. Each migration is a SQL batch that
//! transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema. Idempotent.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;
        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;
            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            info!(version, "applied schema migration");
        }
        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: blob store, structural index, trust, named versions.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Content-addressed blobs
        CREATE TABLE blobs (
            id INTEGER PRIMARY KEY,
            codec INTEGER NOT NULL,           -- multicodec code
            multihash BLOB NOT NULL,          -- 0x1e 0x20 || blake3 digest
            size INTEGER NOT NULL,
            data BLOB NOT NULL,
            UNIQUE (codec, multihash)
        );

        -- Interned public keys
        CREATE TABLE public_keys (
            id INTEGER PRIMARY KEY,
            principal BLOB NOT NULL UNIQUE    -- 32 bytes, Ed25519
        );

        -- Addressable mutable entities
        CREATE TABLE resources (
            id INTEGER PRIMARY KEY,
            iri TEXT NOT NULL UNIQUE,
            owner INTEGER REFERENCES public_keys (id),
            create_time INTEGER               -- packed HLC
        );

        -- One row per indexed typed blob
        CREATE TABLE structural_blobs (
            id INTEGER PRIMARY KEY REFERENCES blobs (id) ON DELETE CASCADE,
            type TEXT NOT NULL,               -- 'Change' | 'KeyDelegation'
            ts INTEGER,                       -- packed HLC
            author INTEGER REFERENCES public_keys (id),
            resource INTEGER REFERENCES resources (id) ON DELETE CASCADE,
            meta TEXT                         -- indexing hint
        );
        CREATE INDEX structural_blobs_by_author ON structural_blobs (author, resource);
        CREATE INDEX structural_blobs_by_resource ON structural_blobs (resource, author);
        CREATE INDEX structural_blobs_by_ts ON structural_blobs (ts, resource);

        -- Typed edges between blobs
        CREATE TABLE blob_links (
            source INTEGER NOT NULL REFERENCES blobs (id) ON DELETE CASCADE,
            target INTEGER NOT NULL REFERENCES blobs (id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            PRIMARY KEY (source, type, target)
        ) WITHOUT ROWID;
        CREATE INDEX blob_links_by_target ON blob_links (target, type, source);

        -- issuer -> delegate capabilities
        CREATE TABLE key_delegations (
            id INTEGER PRIMARY KEY REFERENCES blobs (id) ON DELETE CASCADE,
            issuer INTEGER NOT NULL REFERENCES public_keys (id),
            delegate INTEGER NOT NULL REFERENCES public_keys (id)
        );
        CREATE INDEX key_delegations_by_issuer ON key_delegations (issuer, delegate);
        CREATE INDEX key_delegations_by_delegate ON key_delegations (delegate, issuer);

        -- Accounts whose changes the local user trusts
        CREATE TABLE trusted_accounts (
            id INTEGER PRIMARY KEY REFERENCES public_keys (id)
        );

        -- Local mutable refs
        CREATE TABLE named_versions (
            resource INTEGER NOT NULL REFERENCES resources (id) ON DELETE CASCADE,
            namespace TEXT NOT NULL,
            writer INTEGER NOT NULL REFERENCES public_keys (id),
            version TEXT NOT NULL,
            PRIMARY KEY (resource, namespace, writer)
        );
        "#,
    )?;

    Ok(())
}

/// Migration v2: named versions keyed by account as well as signer, and
/// resource tombstones.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE named_versions_v2 (
            resource INTEGER NOT NULL REFERENCES resources (id) ON DELETE CASCADE,
            namespace TEXT NOT NULL,
            account INTEGER NOT NULL REFERENCES public_keys (id),
            signer INTEGER NOT NULL REFERENCES public_keys (id),
            version TEXT NOT NULL,
            PRIMARY KEY (resource, namespace, account, signer)
        );
        -- v1 pointers were only ever written by self-signing writers
        INSERT INTO named_versions_v2 (resource, namespace, account, signer, version)
            SELECT resource, namespace, writer, writer, version FROM named_versions;
        DROP TABLE named_versions;
        ALTER TABLE named_versions_v2 RENAME TO named_versions;

        -- Deleted resources; their changes are refused on re-ingest
        CREATE TABLE deleted_resources (
            iri TEXT PRIMARY KEY,
            reason TEXT NOT NULL,
            meta TEXT,
            delete_time INTEGER NOT NULL      -- packed HLC
        ) WITHOUT ROWID;
        "#,
    )?;

    Ok(())
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
