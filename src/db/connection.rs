use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const WORKER_NAME: &str = "leadzen-db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

enum Target {
    File(PathBuf),
    Memory,
}

impl Target {
    fn open(&self) -> Result<Connection> {
        match self {
            Target::File(path) => Connection::open(path)
                .with_context(|| format!("failed to open SQLite database at {}", path.display())),
            Target::Memory => {
                Connection::open_in_memory().context("failed to open in-memory database")
            }
        }
    }

    fn label(&self) -> PathBuf {
        match self {
            Target::File(path) => path.clone(),
            Target::Memory => PathBuf::from(":memory:"),
        }
    }
}

/// Sender half plus the thread that drains it. Dropping the last clone stops
/// the thread and waits for in-flight work.
struct Worker {
    tx: mpsc::Sender<Message>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else { return };

        if let Err(err) = self.tx.send(Message::Stop) {
            error!("Failed to stop DB worker: {err}");
        }
        if let Err(err) = handle.join() {
            error!("DB worker panicked: {err:?}");
        }
    }
}

/// SQLite behind a single worker thread. Queries are closures shipped to
/// that thread, so async callers never touch the connection directly.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        Self::start(Target::File(db_path))
    }

    /// Process-lifetime database with nothing on disk.
    pub fn open_in_memory() -> Result<Self> {
        Self::start(Target::Memory)
    }

    fn start(target: Target) -> Result<Self> {
        let path = target.label();
        let (tx, rx) = mpsc::channel::<Message>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let handle = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || {
                let mut conn = match target.open().and_then(prepare) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                drain(&mut conn, rx);
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before it was ready")??;
        info!("Database ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                tx,
                handle: Mutex::new(Some(handle)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Runs `task` on the worker thread and hands back its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // Receiver gone means the caller was cancelled; nothing to do.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .tx
            .send(Message::Run(job))
            .map_err(|_| anyhow!("database worker is no longer running"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database worker dropped the request"))?
    }
}

fn prepare(mut conn: Connection) -> Result<Connection> {
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        // In-memory databases only support MEMORY journaling.
        warn!("WAL unavailable: {err}");
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn drain(conn: &mut Connection, rx: mpsc::Receiver<Message>) {
    for message in rx {
        match message {
            Message::Run(job) => job(conn),
            Message::Stop => break,
        }
    }
    info!("Database worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_runs_queries() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));

        let fk: i64 = db
            .execute(|conn| Ok(conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn task_errors_reach_the_caller() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db
            .execute(|conn| {
                conn.execute("SELECT * FROM no_such_table", [])?;
                Ok(())
            })
            .await;
        assert!(result.is_err());

        // The worker survives a failed task.
        let leads: i64 = db
            .execute(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM leads", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(leads, 0);
    }

    #[tokio::test]
    async fn file_database_creates_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("core.sqlite3");
        let db = Database::new(path.clone()).unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
    }
}
