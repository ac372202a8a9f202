//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use causeway_core::{
    Blob, BlobType, Change, ChangeSummary, Cid, HlcTimestamp, Iri, KeyDelegation, PublicKey,
    Resource, Version,
};
use causeway_identity::DelegationSource;

use crate::error::{Result, StoreError};
use crate::index::{check_dependencies, earliest_root, DepInfo};
use crate::migration;
use crate::traits::{DeletedResource, InsertResult, NamedVersion, Store, DEP_LINK};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {e}")))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {e}")))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn ts_param(ts: HlcTimestamp) -> i64 {
    ts.as_u64() as i64
}

fn ts_column(raw: i64) -> HlcTimestamp {
    HlcTimestamp::from_raw(raw as u64)
}

fn blob_id(conn: &Connection, cid: &Cid) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM blobs WHERE codec = ?1 AND multihash = ?2",
        params![cid.codec().code() as i64, cid.multihash()],
        |row| row.get(0),
    )
    .optional()
    .map_err(StoreError::from)
}

/// Insert the blob unless present. Returns its row id and whether it was new.
fn put_blob_row(conn: &Connection, blob: &Blob) -> Result<(i64, bool)> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO blobs (codec, multihash, size, data) VALUES (?1, ?2, ?3, ?4)",
        params![
            blob.codec().code() as i64,
            blob.cid().multihash(),
            blob.len() as i64,
            blob.data().as_ref(),
        ],
    )? > 0;
    let id = blob_id(conn, blob.cid())?
        .ok_or_else(|| StoreError::NotFound(blob.cid().to_string()))?;
    Ok((id, inserted))
}

fn ensure_key(conn: &Connection, key: &PublicKey) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO public_keys (principal) VALUES (?1)",
        params![key.as_bytes().as_slice()],
    )?;
    conn.query_row(
        "SELECT id FROM public_keys WHERE principal = ?1",
        params![key.as_bytes().as_slice()],
        |row| row.get(0),
    )
    .map_err(StoreError::from)
}

fn key_id(conn: &Connection, key: &PublicKey) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM public_keys WHERE principal = ?1",
        params![key.as_bytes().as_slice()],
        |row| row.get(0),
    )
    .optional()
    .map_err(StoreError::from)
}

fn resource_id(conn: &Connection, iri: &Iri) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM resources WHERE iri = ?1",
        params![iri.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(StoreError::from)
}

/// Get or create a resource row. Account resources are owned by their key
/// from the start.
fn ensure_resource(conn: &Connection, iri: &Iri) -> Result<i64> {
    if let Some(id) = resource_id(conn, iri)? {
        return Ok(id);
    }
    let owner = match iri.account_key() {
        Some(key) => Some(ensure_key(conn, &key)?),
        None => None,
    };
    conn.execute(
        "INSERT INTO resources (iri, owner) VALUES (?1, ?2)",
        params![iri.as_str(), owner],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Recompute owner and creation time from the resource's root changes.
fn refresh_ownership(conn: &Connection, resource: i64, iri: &Iri) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT sb.ts, b.codec, b.multihash, sb.author
         FROM structural_blobs sb
         JOIN blobs b ON b.id = sb.id
         WHERE sb.resource = ?1 AND sb.type = ?2
           AND NOT EXISTS (
               SELECT 1 FROM blob_links l WHERE l.source = sb.id AND l.type = ?3
           )",
    )?;
    let rows = stmt
        .query_map(
            params![resource, BlobType::Change.as_str(), DEP_LINK],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut roots = Vec::with_capacity(rows.len());
    for (ts, codec, mh, author) in rows {
        roots.push((ts_column(ts), Cid::from_multihash(codec as u64, &mh)?, author));
    }
    let Some((ts, _, author)) = earliest_root(roots) else {
        return Ok(());
    };

    let owner = match iri.account_key() {
        Some(key) => ensure_key(conn, &key)?,
        None => author,
    };
    conn.execute(
        "UPDATE resources SET owner = ?2, create_time = ?3 WHERE id = ?1",
        params![resource, owner, ts_param(ts)],
    )?;
    Ok(())
}

fn dep_info(conn: &Connection, cid: &Cid) -> Result<Option<DepInfo>> {
    let row: Option<(String, Option<String>, Option<i64>)> = conn
        .query_row(
            "SELECT sb.type, r.iri, sb.ts
             FROM structural_blobs sb
             JOIN blobs b ON b.id = sb.id
             LEFT JOIN resources r ON r.id = sb.resource
             WHERE b.codec = ?1 AND b.multihash = ?2",
            params![cid.codec().code() as i64, cid.multihash()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((ty, iri, ts)) = row else {
        return Ok(None);
    };
    Ok(Some(DepInfo {
        is_change: ty == BlobType::Change.as_str(),
        resource: iri.map(|s| Iri::parse(&s)).transpose()?,
        ts: ts.map(ts_column).unwrap_or(HlcTimestamp::ZERO),
    }))
}

fn is_tombstoned(conn: &Connection, iri: &Iri) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM deleted_resources WHERE iri = ?1)",
        params![iri.as_str()],
        |row| row.get(0),
    )
    .map_err(StoreError::from)
}

fn is_indexed(conn: &Connection, blob: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM structural_blobs WHERE id = ?1)",
        params![blob],
        |row| row.get(0),
    )
    .map_err(StoreError::from)
}

/// Write a named version after checking that it points at indexed changes
/// of its resource.
fn write_named_version(conn: &Connection, resource: i64, named: &NamedVersion) -> Result<()> {
    for cid in named.version.iter() {
        match dep_info(conn, cid)? {
            Some(info) if info.is_change && info.resource.as_ref() == Some(&named.resource) => {}
            _ => {
                return Err(StoreError::InvalidData(format!(
                    "{cid} is not a change of {}",
                    named.resource
                )))
            }
        }
    }
    let account = ensure_key(conn, &named.account)?;
    let signer = ensure_key(conn, &named.signer)?;
    conn.execute(
        "INSERT INTO named_versions (resource, namespace, account, signer, version)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (resource, namespace, account, signer)
         DO UPDATE SET version = excluded.version",
        params![resource, named.namespace, account, signer, named.version.to_string()],
    )?;
    Ok(())
}

const SUMMARY_SELECT: &str = "SELECT sb.id, b.codec, b.multihash, pk.principal, r.iri, sb.ts,
        EXISTS(SELECT 1 FROM trusted_accounts t WHERE t.id = sb.author)
     FROM structural_blobs sb
     JOIN blobs b ON b.id = sb.id
     JOIN public_keys pk ON pk.id = sb.author
     JOIN resources r ON r.id = sb.resource";

type SummaryRow = (i64, i64, Vec<u8>, Vec<u8>, String, i64, bool);

/// Load change summaries matching `filter`, ordered by `(ts, CID)`.
fn load_summaries(
    conn: &Connection,
    filter: &str,
    args: &[&dyn ToSql],
) -> Result<Vec<ChangeSummary>> {
    let sql = format!("{SUMMARY_SELECT} WHERE sb.type = 'Change' AND {filter}");
    let rows: Vec<SummaryRow> = conn
        .prepare(&sql)?
        .query_map(args, |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut deps_stmt = conn.prepare(
        "SELECT b.codec, b.multihash FROM blob_links l
         JOIN blobs b ON b.id = l.target
         WHERE l.source = ?1 AND l.type = ?2",
    )?;

    let mut summaries = Vec::with_capacity(rows.len());
    for (id, codec, mh, principal, iri, ts, is_trusted) in rows {
        let dep_rows = deps_stmt
            .query_map(params![id, DEP_LINK], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut deps = dep_rows
            .iter()
            .map(|(codec, mh)| Cid::from_multihash(*codec as u64, mh))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        deps.sort();

        summaries.push(ChangeSummary {
            id: Cid::from_multihash(codec as u64, &mh)?,
            author: PublicKey::try_from(principal.as_slice())?,
            resource: Iri::parse(&iri)?,
            create_time: ts_column(ts),
            deps,
            is_trusted,
        });
    }
    summaries.sort_by_key(|s| (s.create_time, s.id));
    Ok(summaries)
}

fn load_keys(conn: &Connection, sql: &str, args: &[&dyn ToSql]) -> Result<Vec<PublicKey>> {
    let raw = conn
        .prepare(sql)?
        .query_map(args, |row| row.get::<_, Vec<u8>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.iter()
        .map(|bytes| PublicKey::try_from(bytes.as_slice()).map_err(StoreError::from))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Store implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl Store for SqliteStore {
    async fn put_blob(&self, blob: &Blob) -> Result<InsertResult> {
        let blob = blob.clone();
        self.run(move |conn| {
            let (_, inserted) = put_blob_row(conn, &blob)?;
            Ok(if inserted {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_blob(&self, cid: &Cid) -> Result<Option<Bytes>> {
        let cid = *cid;
        self.run(move |conn| {
            let data: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT data FROM blobs WHERE codec = ?1 AND multihash = ?2",
                    params![cid.codec().code() as i64, cid.multihash()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(data.map(Bytes::from))
        })
        .await
    }

    async fn has_blob(&self, cid: &Cid) -> Result<bool> {
        let cid = *cid;
        self.run(move |conn| Ok(blob_id(conn, &cid)?.is_some())).await
    }

    async fn insert_change(
        &self,
        blob: &Blob,
        change: &Change,
        named: Option<&NamedVersion>,
    ) -> Result<InsertResult> {
        if let Some(named) = named {
            if named.resource != change.resource {
                return Err(StoreError::InvalidData(format!(
                    "named version for {} cannot advance with a change of {}",
                    named.resource, change.resource
                )));
            }
        }
        let blob = blob.clone();
        let change = change.clone();
        let named = named.cloned();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            // 1. Already indexed?
            if let Some(id) = blob_id(&tx, blob.cid())? {
                if is_indexed(&tx, id)? {
                    return Ok(InsertResult::AlreadyExists);
                }
            }

            // 2. Deleted resources stay deleted
            if is_tombstoned(&tx, &change.resource)? {
                return Ok(InsertResult::Tombstoned);
            }

            // 3. Dependencies
            if let Some(rejection) = check_dependencies(&change, |dep| dep_info(&tx, dep))? {
                return Ok(rejection);
            }

            // 4. Keys and resource
            let author = ensure_key(&tx, &change.author)?;
            ensure_key(&tx, &change.signer)?;
            let resource = ensure_resource(&tx, &change.resource)?;

            // 5. Blob and structural row
            let (id, _) = put_blob_row(&tx, &blob)?;
            tx.execute(
                "INSERT INTO structural_blobs (id, type, ts, author, resource, meta)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    BlobType::Change.as_str(),
                    ts_param(change.hlc),
                    author,
                    resource,
                    change.hint,
                ],
            )?;

            // 6. Dependency edges
            for dep in &change.deps {
                let target = blob_id(&tx, dep)?
                    .ok_or_else(|| StoreError::NotFound(dep.to_string()))?;
                tx.execute(
                    "INSERT OR IGNORE INTO blob_links (source, target, type) VALUES (?1, ?2, ?3)",
                    params![id, target, DEP_LINK],
                )?;
            }

            // 7. Ownership only moves when a root arrives
            if change.is_root() {
                refresh_ownership(&tx, resource, &change.resource)?;
            }

            // 8. Named version, same transaction
            if let Some(named) = &named {
                write_named_version(&tx, resource, named)?;
            }

            tx.commit()?;
            debug!(cid = %blob.cid(), resource = %change.resource, "indexed change");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn insert_delegation(
        &self,
        blob: &Blob,
        delegation: &KeyDelegation,
    ) -> Result<InsertResult> {
        let blob = blob.clone();
        let delegation = delegation.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            if let Some(id) = blob_id(&tx, blob.cid())? {
                if is_indexed(&tx, id)? {
                    return Ok(InsertResult::AlreadyExists);
                }
            }

            let issuer = ensure_key(&tx, &delegation.issuer)?;
            let delegate = ensure_key(&tx, &delegation.delegate)?;

            let issued_at = HlcTimestamp::new(delegation.issue_time, 0);
            let account_iri = Iri::account(&delegation.issuer);
            if !is_tombstoned(&tx, &account_iri)? {
                let account = ensure_resource(&tx, &account_iri)?;
                tx.execute(
                    "UPDATE resources SET create_time = ?2 WHERE id = ?1 AND create_time IS NULL",
                    params![account, ts_param(issued_at)],
                )?;
            }

            let (id, _) = put_blob_row(&tx, &blob)?;
            tx.execute(
                "INSERT INTO structural_blobs (id, type, ts, author, resource, meta)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
                params![
                    id,
                    BlobType::KeyDelegation.as_str(),
                    ts_param(issued_at),
                    issuer
                ],
            )?;
            tx.execute(
                "INSERT INTO key_delegations (id, issuer, delegate) VALUES (?1, ?2, ?3)",
                params![id, issuer, delegate],
            )?;

            tx.commit()?;
            debug!(cid = %blob.cid(), issuer = %delegation.issuer, delegate = %delegation.delegate, "indexed delegation");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_change(&self, cid: &Cid) -> Result<Option<ChangeSummary>> {
        let cid = *cid;
        self.run(move |conn| {
            let mut found = load_summaries(
                conn,
                "b.codec = ?1 AND b.multihash = ?2",
                &[&(cid.codec().code() as i64), &cid.multihash()],
            )?;
            Ok(found.pop())
        })
        .await
    }

    async fn changes_for_resource(&self, iri: &Iri) -> Result<Vec<ChangeSummary>> {
        let iri = iri.clone();
        self.run(move |conn| load_summaries(conn, "r.iri = ?1", &[&iri.as_str()]))
            .await
    }

    async fn changes_by_author(&self, author: &PublicKey) -> Result<Vec<ChangeSummary>> {
        let author = *author;
        self.run(move |conn| {
            load_summaries(conn, "pk.principal = ?1", &[&author.as_bytes().as_slice()])
        })
        .await
    }

    async fn changes_in_range(
        &self,
        from: HlcTimestamp,
        to: HlcTimestamp,
    ) -> Result<Vec<ChangeSummary>> {
        self.run(move |conn| {
            load_summaries(
                conn,
                "sb.ts >= ?1 AND sb.ts < ?2",
                &[&ts_param(from), &ts_param(to)],
            )
        })
        .await
    }

    async fn get_resource(&self, iri: &Iri) -> Result<Option<Resource>> {
        let iri = iri.clone();
        self.run(move |conn| {
            let row: Option<(Option<Vec<u8>>, Option<i64>)> = conn
                .query_row(
                    "SELECT pk.principal, r.create_time FROM resources r
                     LEFT JOIN public_keys pk ON pk.id = r.owner
                     WHERE r.iri = ?1",
                    params![iri.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((owner, create_time)) = row else {
                return Ok(None);
            };
            Ok(Some(Resource {
                iri,
                owner: owner
                    .map(|bytes| PublicKey::try_from(bytes.as_slice()))
                    .transpose()?,
                create_time: create_time.map(ts_column),
            }))
        })
        .await
    }

    async fn list_resources(&self, prefix: &str) -> Result<Vec<Iri>> {
        let prefix = prefix.to_owned();
        self.run(move |conn| {
            let raw = conn
                .prepare(
                    "SELECT iri FROM resources
                     WHERE substr(iri, 1, length(?1)) = ?1
                     ORDER BY iri",
                )?
                .query_map(params![prefix], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw.iter()
                .map(|s| Iri::parse(s).map_err(StoreError::from))
                .collect()
        })
        .await
    }

    async fn delete_resource(&self, tombstone: &DeletedResource) -> Result<bool> {
        let tombstone = tombstone.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO deleted_resources (iri, reason, meta, delete_time)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (iri) DO UPDATE SET
                     reason = excluded.reason,
                     meta = excluded.meta,
                     delete_time = excluded.delete_time",
                params![
                    tombstone.iri.as_str(),
                    tombstone.reason,
                    tombstone.meta,
                    ts_param(tombstone.delete_time),
                ],
            )?;

            let Some(resource) = resource_id(&tx, &tombstone.iri)? else {
                tx.commit()?;
                return Ok(false);
            };

            // Structural rows, edges and named versions follow by cascade.
            let blobs = tx.execute(
                "DELETE FROM blobs WHERE id IN (
                     SELECT id FROM structural_blobs WHERE resource = ?1 AND type = ?2
                 )",
                params![resource, BlobType::Change.as_str()],
            )?;
            tx.execute("DELETE FROM resources WHERE id = ?1", params![resource])?;
            tx.commit()?;

            debug!(resource = %tombstone.iri, blobs, "deleted resource");
            Ok(true)
        })
        .await
    }

    async fn undelete_resource(&self, iri: &Iri) -> Result<bool> {
        let iri = iri.clone();
        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM deleted_resources WHERE iri = ?1",
                params![iri.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn is_deleted(&self, iri: &Iri) -> Result<bool> {
        let iri = iri.clone();
        self.run(move |conn| is_tombstoned(conn, &iri)).await
    }

    async fn list_deleted_resources(&self) -> Result<Vec<DeletedResource>> {
        self.run(|conn| {
            let rows = conn
                .prepare(
                    "SELECT iri, reason, meta, delete_time FROM deleted_resources
                     ORDER BY iri",
                )?
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut deleted = Vec::with_capacity(rows.len());
            for (iri, reason, meta, delete_time) in rows {
                deleted.push(DeletedResource {
                    iri: Iri::parse(&iri)?,
                    reason,
                    meta,
                    delete_time: ts_column(delete_time),
                });
            }
            Ok(deleted)
        })
        .await
    }

    async fn set_trust(&self, account: &PublicKey, trusted: bool) -> Result<bool> {
        let account = *account;
        self.run(move |conn| {
            let changed = if trusted {
                let id = ensure_key(conn, &account)?;
                conn.execute(
                    "INSERT OR IGNORE INTO trusted_accounts (id) VALUES (?1)",
                    params![id],
                )?
            } else {
                match key_id(conn, &account)? {
                    Some(id) => {
                        conn.execute("DELETE FROM trusted_accounts WHERE id = ?1", params![id])?
                    }
                    None => 0,
                }
            };
            Ok(changed > 0)
        })
        .await
    }

    async fn is_trusted(&self, account: &PublicKey) -> Result<bool> {
        let account = *account;
        self.run(move |conn| {
            conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM trusted_accounts t
                     JOIN public_keys pk ON pk.id = t.id
                     WHERE pk.principal = ?1
                 )",
                params![account.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_trusted(&self) -> Result<Vec<PublicKey>> {
        self.run(|conn| {
            load_keys(
                conn,
                "SELECT pk.principal FROM trusted_accounts t
                 JOIN public_keys pk ON pk.id = t.id
                 ORDER BY pk.principal",
                &[],
            )
        })
        .await
    }

    async fn get_named_version(
        &self,
        resource: &Iri,
        namespace: &str,
        account: &PublicKey,
        signer: &PublicKey,
    ) -> Result<Option<Version>> {
        let resource = resource.clone();
        let namespace = namespace.to_owned();
        let (account, signer) = (*account, *signer);
        self.run(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT nv.version FROM named_versions nv
                     JOIN resources r ON r.id = nv.resource
                     JOIN public_keys a ON a.id = nv.account
                     JOIN public_keys s ON s.id = nv.signer
                     WHERE r.iri = ?1 AND nv.namespace = ?2
                       AND a.principal = ?3 AND s.principal = ?4",
                    params![
                        resource.as_str(),
                        namespace,
                        account.as_bytes().as_slice(),
                        signer.as_bytes().as_slice(),
                    ],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|s| Version::parse(&s).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn set_named_version(&self, named: &NamedVersion) -> Result<()> {
        let named = named.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let resource = resource_id(&tx, &named.resource)?
                .ok_or_else(|| StoreError::NotFound(named.resource.to_string()))?;
            write_named_version(&tx, resource, &named)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn list_named_versions(&self, resource: &Iri) -> Result<Vec<NamedVersion>> {
        let resource = resource.clone();
        self.run(move |conn| {
            let rows = conn
                .prepare(
                    "SELECT nv.namespace, a.principal, s.principal, nv.version
                     FROM named_versions nv
                     JOIN resources r ON r.id = nv.resource
                     JOIN public_keys a ON a.id = nv.account
                     JOIN public_keys s ON s.id = nv.signer
                     WHERE r.iri = ?1
                     ORDER BY nv.namespace, a.principal, s.principal",
                )?
                .query_map(params![resource.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, Vec<u8>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut named = Vec::with_capacity(rows.len());
            for (namespace, account, signer, version) in rows {
                named.push(NamedVersion {
                    resource: resource.clone(),
                    namespace,
                    account: PublicKey::try_from(account.as_slice())?,
                    signer: PublicKey::try_from(signer.as_slice())?,
                    version: Version::parse(&version)?,
                });
            }
            Ok(named)
        })
        .await
    }
}

#[async_trait]
impl DelegationSource for SqliteStore {
    async fn delegates_of(
        &self,
        issuer: &PublicKey,
    ) -> causeway_identity::Result<Vec<PublicKey>> {
        let issuer = *issuer;
        let delegates = self
            .run(move |conn| {
                load_keys(
                    conn,
                    "SELECT DISTINCT d.principal FROM key_delegations k
                     JOIN public_keys i ON i.id = k.issuer
                     JOIN public_keys d ON d.id = k.delegate
                     WHERE i.principal = ?1
                     ORDER BY d.principal",
                    &[&issuer.as_bytes().as_slice()],
                )
            })
            .await?;
        Ok(delegates)
    }
}
