use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::{JobId, JobStore, JobStoreError, JobStoreResult, RenderJob};

const JOB_SCHEMA: &str = include_str!("../../../sql/jobs.sql");

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;\n\
         PRAGMA synchronous = NORMAL;\n\
         PRAGMA temp_store = MEMORY;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}

#[derive(Debug, Clone)]
pub struct SqliteJobStoreBuilder {
    path: Option<PathBuf>,
    read_only: bool,
    create_if_missing: bool,
}

impl Default for SqliteJobStoreBuilder {
    fn default() -> Self {
        Self {
            path: None,
            read_only: false,
            create_if_missing: true,
        }
    }
}

impl SqliteJobStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Opens the database and applies the schema unless read-only.
    pub fn build(self) -> JobStoreResult<SqliteJobStore> {
        let path = self.path.ok_or(JobStoreError::MissingStore)?;
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        if !self.read_only && self.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let store = SqliteJobStore { path, flags };
        if !self.read_only {
            store.initialize()?;
        }
        Ok(store)
    }
}

/// Job registry persisted as JSON payloads, so job status survives a CLI
/// process. Each call opens its own connection.
#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteJobStore {
    pub fn builder() -> SqliteJobStoreBuilder {
        SqliteJobStoreBuilder::new()
    }

    pub fn new(path: impl AsRef<Path>) -> JobStoreResult<Self> {
        SqliteJobStoreBuilder::new().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> JobStoreResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, self.flags).map_err(|source| {
            JobStoreError::OpenDatabase {
                path: self.path.clone(),
                source,
            }
        })?;
        configure_connection(&conn).map_err(|source| JobStoreError::OpenDatabase {
            path: self.path.clone(),
            source,
        })?;
        Ok(conn)
    }

    pub fn initialize(&self) -> JobStoreResult<()> {
        let conn = self.open()?;
        conn.execute_batch(JOB_SCHEMA)?;
        Ok(())
    }
}

fn decode(payload: String) -> JobStoreResult<RenderJob> {
    Ok(serde_json::from_str(&payload)?)
}

impl JobStore for SqliteJobStore {
    fn insert(&self, job: &RenderJob) -> JobStoreResult<()> {
        let conn = self.open()?;
        let payload = serde_json::to_string(job)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO render_jobs (job_id, state, tier, payload, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.id.to_string(),
                job.state.as_str(),
                job.backend_tier_used.map(|tier| tier.as_str()),
                payload,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
            ],
        )?;
        if inserted == 0 {
            return Err(JobStoreError::Duplicate(job.id));
        }
        Ok(())
    }

    fn update(&self, job: &RenderJob) -> JobStoreResult<()> {
        let conn = self.open()?;
        let payload = serde_json::to_string(job)?;
        let updated = conn.execute(
            "UPDATE render_jobs SET state = ?2, tier = ?3, payload = ?4, updated_at = ?5
             WHERE job_id = ?1",
            params![
                job.id.to_string(),
                job.state.as_str(),
                job.backend_tier_used.map(|tier| tier.as_str()),
                payload,
                job.updated_at.to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(JobStoreError::NotFound(job.id));
        }
        Ok(())
    }

    fn get(&self, id: &JobId) -> JobStoreResult<Option<RenderJob>> {
        let conn = self.open()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM render_jobs WHERE job_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        payload.map(decode).transpose()
    }

    fn remove(&self, id: &JobId) -> JobStoreResult<bool> {
        let conn = self.open()?;
        let removed = conn.execute(
            "DELETE FROM render_jobs WHERE job_id = ?1",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }

    fn list(&self) -> JobStoreResult<Vec<RenderJob>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare("SELECT payload FROM render_jobs ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(decode(row?)?);
        }
        Ok(jobs)
    }
}
