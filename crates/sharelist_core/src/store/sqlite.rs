//! SQLite-backed list store.
//!
//! # Responsibility
//! - Persist list documents in `todo_lists`, one row per list.
//! - Broadcast post-write snapshots to in-process subscribers.
//!
//! # Invariants
//! - `collaborators` and `tasks` columns hold JSON arrays in the persisted
//!   document schema.
//! - Read paths reject undecodable rows instead of masking them.
//! - Snapshot fan-out happens while the connection lock is held, so
//!   subscribers observe writes in commit order.

use super::hub::SubscriberHub;
use super::{ListFilter, ListStore, StoreError, StoreResult, Subscription};
use crate::db::{open_db, open_db_in_memory};
use crate::model::list::{ListDocument, ListId, ListPatch, NewList};
use crate::model::principal::Principal;
use crate::model::task::Task;
use async_trait::async_trait;
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const LIST_SELECT_SQL: &str = "SELECT
    id,
    title,
    owner_id,
    collaborators,
    tasks
FROM todo_lists";

/// List store over a migrated SQLite connection.
#[derive(Clone)]
pub struct SqliteListStore {
    conn: Arc<Mutex<Connection>>,
    hub: SubscriberHub,
}

impl SqliteListStore {
    /// Opens (or creates) a database file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already went through `db::open_db*`.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            hub: SubscriberHub::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ListStore for SqliteListStore {
    async fn create(&self, draft: NewList) -> StoreResult<ListId> {
        let conn = self.lock();
        let id = ListId::generate();
        let document = ListDocument::from_new(id.clone(), draft);

        conn.execute(
            "INSERT INTO todo_lists (
                id,
                title,
                owner_id,
                collaborators,
                tasks
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                document.id.as_str(),
                document.title.as_str(),
                document.owner_id.as_str(),
                serde_json::to_string(&document.collaborators)?,
                serde_json::to_string(&document.tasks)?,
            ],
        )
        .map_err(|err| log_write_error("create", &id, err))?;

        self.hub.publish(&id, &Some(document));
        debug!("event=store_write module=store status=ok backend=sqlite op=create list_id={id}");
        Ok(id)
    }

    async fn get(&self, id: &ListId) -> StoreResult<Option<ListDocument>> {
        load_document(&self.lock(), id)
    }

    async fn update(&self, id: &ListId, patch: ListPatch) -> StoreResult<()> {
        let conn = self.lock();
        let fields = patch.field_names();
        let tasks_json = patch.tasks.as_ref().map(serde_json::to_string).transpose()?;
        let collaborators_json = patch
            .collaborators
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let changed = conn
            .execute(
                "UPDATE todo_lists
                 SET
                    tasks = COALESCE(?2, tasks),
                    collaborators = COALESCE(?3, collaborators),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id.as_str(), tasks_json, collaborators_json],
            )
            .map_err(|err| log_write_error("update", id, err))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }

        let snapshot = load_document(&conn, id)?;
        self.hub.publish(id, &snapshot);
        debug!("event=store_write module=store status=ok backend=sqlite op=update list_id={id} fields={fields}");
        Ok(())
    }

    async fn delete(&self, id: &ListId) -> StoreResult<()> {
        let conn = self.lock();
        let changed = conn
            .execute("DELETE FROM todo_lists WHERE id = ?1;", [id.as_str()])
            .map_err(|err| log_write_error("delete", id, err))?;

        if changed == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }

        self.hub.publish(id, &None);
        debug!("event=store_write module=store status=ok backend=sqlite op=delete list_id={id}");
        Ok(())
    }

    async fn query(&self, filter: &ListFilter) -> StoreResult<Vec<ListDocument>> {
        let conn = self.lock();
        let (sql, principal) = match filter {
            ListFilter::OwnedBy(principal) => (
                format!("{LIST_SELECT_SQL} WHERE owner_id = ?1 ORDER BY id ASC;"),
                principal,
            ),
            ListFilter::SharedWith(principal) => (
                format!(
                    "{LIST_SELECT_SQL}
                     WHERE EXISTS (
                        SELECT 1
                        FROM json_each(todo_lists.collaborators)
                        WHERE json_each.value = ?1
                     )
                     ORDER BY id ASC;"
                ),
                principal,
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([principal.as_str()])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_list_row(row)?);
        }
        Ok(documents)
    }

    fn subscribe(&self, id: &ListId) -> StoreResult<Subscription> {
        let conn = self.lock();
        let current = load_document(&conn, id)?;
        Ok(self.hub.register(id, current))
    }
}

fn load_document(conn: &Connection, id: &ListId) -> StoreResult<Option<ListDocument>> {
    let mut stmt = conn.prepare(&format!("{LIST_SELECT_SQL} WHERE id = ?1;"))?;
    let raw = stmt
        .query_row([id.as_str()], |row| RawListRow::read(row))
        .optional()?;
    raw.map(RawListRow::decode).transpose()
}

fn parse_list_row(row: &Row<'_>) -> StoreResult<ListDocument> {
    RawListRow::read(row)?.decode()
}

struct RawListRow {
    id: String,
    title: String,
    owner_id: String,
    collaborators: String,
    tasks: String,
}

impl RawListRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            owner_id: row.get("owner_id")?,
            collaborators: row.get("collaborators")?,
            tasks: row.get("tasks")?,
        })
    }

    fn decode(self) -> StoreResult<ListDocument> {
        let collaborators: BTreeSet<Principal> = serde_json::from_str(&self.collaborators)
            .map_err(|err| {
                StoreError::InvalidData(format!(
                    "invalid collaborators `{}` in todo_lists.collaborators: {err}",
                    self.collaborators
                ))
            })?;
        let tasks: Vec<Task> = serde_json::from_str(&self.tasks).map_err(|err| {
            StoreError::InvalidData(format!("invalid tasks in todo_lists.tasks: {err}"))
        })?;

        Ok(ListDocument {
            id: ListId::new(self.id),
            title: self.title,
            owner_id: Principal::new(self.owner_id),
            collaborators,
            tasks,
        })
    }
}

fn log_write_error(operation: &str, id: &ListId, err: rusqlite::Error) -> StoreError {
    error!(
        "event=store_write module=store status=error backend=sqlite op={} list_id={} error={}",
        operation, id, err
    );
    err.into()
}
