use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::DbError;

/// A row that can live in a [`Table`].
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

type KeyFn<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;

struct UniqueConstraint<T> {
    name: &'static str,
    key: KeyFn<T>,
}

/// An in-process table keyed by UUID.
///
/// Unique constraints are checked under the write lock, so two concurrent
/// writers racing for the same key resolve to one success and one
/// [`DbError::UniqueViolation`]. When persisted, every mutation rewrites a
/// JSON snapshot of the table (temp file + rename).
pub struct Table<T: Record> {
    name: String,
    rows: RwLock<BTreeMap<Uuid, T>>,
    constraints: Vec<UniqueConstraint<T>>,
    snapshot_path: Option<PathBuf>,
}

impl<T: Record> Table<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(BTreeMap::new()),
            constraints: Vec::new(),
            snapshot_path: None,
        }
    }

    /// Adds a named unique constraint. Rows whose key is `None` are exempt.
    pub fn unique<F>(mut self, name: &'static str, key: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.constraints.push(UniqueConstraint {
            name,
            key: Box::new(key),
        });
        self
    }

    /// Backs the table with `<dir>/<name>.json`, loading existing rows.
    /// `None` keeps the table in memory only.
    pub async fn persisted(mut self, dir: Option<&Path>) -> Result<Self, DbError> {
        let Some(dir) = dir else {
            return Ok(self);
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| self.persistence_error(e))?;

        let path = dir.join(format!("{}.json", self.name));
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let rows: Vec<T> = serde_json::from_slice(&bytes)?;
                let map: BTreeMap<Uuid, T> = rows.into_iter().map(|row| (row.id(), row)).collect();
                info!("Loaded {} rows into table {}", map.len(), self.name);
                self.rows = RwLock::new(map);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No snapshot for table {} at {}", self.name, path.display());
            }
            Err(e) => return Err(self.persistence_error(e)),
        }

        self.snapshot_path = Some(path);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert(&self, row: T) -> Result<T, DbError> {
        let mut rows = self.rows.write().await;
        let id = row.id();

        if rows.contains_key(&id) {
            return Err(DbError::DuplicateId {
                table: self.name.clone(),
                id,
            });
        }
        self.check_unique(&rows, &row)?;

        rows.insert(id, row.clone());
        if let Err(e) = self.flush(&rows).await {
            rows.remove(&id);
            return Err(e);
        }

        debug!("Inserted {} into {}", id, self.name);
        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.rows.read().await.get(&id).cloned()
    }

    pub async fn require(&self, id: Uuid) -> Result<T, DbError> {
        self.get(id).await.ok_or_else(|| self.not_found(id))
    }

    pub async fn find<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        self.rows.read().await.values().find(|row| predicate(row)).cloned()
    }

    pub async fn filter<P>(&self, predicate: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        self.rows
            .read()
            .await
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    pub async fn count<P>(&self, predicate: P) -> usize
    where
        P: Fn(&T) -> bool,
    {
        self.rows.read().await.values().filter(|row| predicate(row)).count()
    }

    pub async fn all(&self) -> Vec<T> {
        self.rows.read().await.values().cloned().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Applies `change` to a copy of the row and commits it if the closure
    /// succeeds and no unique constraint is broken. The row is re-read under
    /// the write lock, so checks inside `change` see the committed state.
    pub async fn modify<E, F>(&self, id: Uuid, change: F) -> Result<T, E>
    where
        E: From<DbError>,
        F: FnOnce(&mut T) -> Result<(), E>,
    {
        let mut rows = self.rows.write().await;
        let current = rows.get(&id).cloned().ok_or_else(|| self.not_found(id))?;

        let mut updated = current.clone();
        change(&mut updated)?;
        debug_assert_eq!(updated.id(), id, "modify must not change the row id");
        self.check_unique(&rows, &updated)?;

        rows.insert(id, updated.clone());
        if let Err(e) = self.flush(&rows).await {
            rows.insert(id, current);
            return Err(e.into());
        }

        debug!("Updated {} in {}", id, self.name);
        Ok(updated)
    }

    pub async fn update<F>(&self, id: Uuid, change: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut T),
    {
        self.modify::<DbError, _>(id, |row| {
            change(row);
            Ok(())
        })
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<T, DbError> {
        let mut rows = self.rows.write().await;
        let removed = rows.remove(&id).ok_or_else(|| self.not_found(id))?;

        if let Err(e) = self.flush(&rows).await {
            rows.insert(id, removed);
            return Err(e);
        }

        debug!("Deleted {} from {}", id, self.name);
        Ok(removed)
    }

    pub async fn delete_where<P>(&self, predicate: P) -> Result<Vec<T>, DbError>
    where
        P: Fn(&T) -> bool,
    {
        let mut rows = self.rows.write().await;
        let doomed: Vec<Uuid> = rows
            .values()
            .filter(|row| predicate(row))
            .map(|row| row.id())
            .collect();

        let removed: Vec<T> = doomed.iter().filter_map(|id| rows.remove(id)).collect();
        if removed.is_empty() {
            return Ok(removed);
        }

        if let Err(e) = self.flush(&rows).await {
            for row in removed {
                rows.insert(row.id(), row);
            }
            return Err(e);
        }

        debug!("Deleted {} rows from {}", removed.len(), self.name);
        Ok(removed)
    }

    fn check_unique(&self, rows: &BTreeMap<Uuid, T>, candidate: &T) -> Result<(), DbError> {
        for constraint in &self.constraints {
            let Some(key) = (constraint.key)(candidate) else {
                continue;
            };

            let clash = rows.values().any(|existing| {
                existing.id() != candidate.id()
                    && (constraint.key)(existing).as_deref() == Some(key.as_str())
            });

            if clash {
                debug!("Unique constraint {} rejected key {} on {}", constraint.name, key, self.name);
                return Err(DbError::UniqueViolation {
                    table: self.name.clone(),
                    constraint: constraint.name,
                });
            }
        }
        Ok(())
    }

    async fn flush(&self, rows: &BTreeMap<Uuid, T>) -> Result<(), DbError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot: Vec<&T> = rows.values().collect();
        let data = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| self.persistence_error(e))?;
        tokio::fs::rename(&tmp, path).await.map_err(|e| {
            error!("Failed to replace snapshot {}: {}", path.display(), e);
            self.persistence_error(e)
        })
    }

    fn not_found(&self, id: Uuid) -> DbError {
        DbError::NotFound {
            table: self.name.clone(),
            id,
        }
    }

    fn persistence_error(&self, e: impl std::fmt::Display) -> DbError {
        DbError::Persistence {
            table: self.name.clone(),
            message: e.to_string(),
        }
    }
}
