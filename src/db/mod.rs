//! SQLite-backed medication event history.
//!
//! All statements run on a dedicated worker thread owning the only
//! connection; callers submit closures over an mpsc queue and await the
//! reply on a oneshot channel. Writes are therefore serialized, and readers
//! never observe a half-applied reconciliation pass.

use std::{
    convert::TryFrom,
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use migrations::run_migrations;

use crate::models::{MedicationEvent, MedicationStatus};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} holds out-of-range value {value}"))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn status_from_str(value: &str) -> Result<MedicationStatus> {
    match value {
        "Taken" => Ok(MedicationStatus::Taken),
        "Missed" => Ok(MedicationStatus::Missed),
        "Pending" => Ok(MedicationStatus::Pending),
        _ => Err(anyhow!("unknown medication status '{value}'")),
    }
}

fn row_to_event(row: &Row) -> Result<MedicationEvent> {
    Ok(MedicationEvent {
        id: row.get(0)?,
        compartment_number: to_u32(row.get::<_, i64>(1)?, "compartment_number")?,
        medicine_name: row.get(2)?,
        scheduled_time: parse_datetime(&row.get::<_, String>(3)?)?,
        actual_time: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_datetime(&s))
            .transpose()?,
        status: status_from_str(&row.get::<_, String>(5)?)?,
        pills_taken: to_u32(row.get::<_, i64>(6)?, "pills_taken")?,
        created_at: parse_datetime(&row.get::<_, String>(7)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(8)?)?,
    })
}

const EVENT_COLUMNS: &str = "id, compartment_number, medicine_name, scheduled_time, actual_time, \
                             status, pills_taken, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("dispenser-agent-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    pub async fn insert_event(&self, event: &MedicationEvent) -> Result<()> {
        let record = event.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO medication_events
                     (id, compartment_number, medicine_name, scheduled_time, actual_time,
                      status, pills_taken, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.id,
                    to_i64(u64::from(record.compartment_number))?,
                    record.medicine_name,
                    record.scheduled_time.to_rfc3339(),
                    record.actual_time.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    to_i64(u64::from(record.pills_taken))?,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert medication event")?;
            Ok(())
        })
        .await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<MedicationEvent> {
        let event_id = event_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM medication_events WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![event_id])?;
            match rows.next()? {
                Some(row) => row_to_event(row),
                None => bail!("no medication event with id {event_id}"),
            }
        })
        .await
    }

    /// Events for one compartment with `start <= scheduled_time < end`.
    /// Timestamps are stored as UTC RFC 3339 text, so string comparison
    /// orders correctly.
    pub async fn events_for_compartment_in_range(
        &self,
        compartment_number: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MedicationEvent>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM medication_events
                 WHERE compartment_number = ?1
                   AND scheduled_time >= ?2
                   AND scheduled_time < ?3
                 ORDER BY scheduled_time ASC"
            ))?;

            let mut rows = stmt.query(params![
                to_i64(u64::from(compartment_number))?,
                start.to_rfc3339(),
                end.to_rfc3339(),
            ])?;

            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }

            Ok(events)
        })
        .await
    }

    pub async fn recent_events(&self, limit: u32) -> Result<Vec<MedicationEvent>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM medication_events
                 ORDER BY scheduled_time DESC
                 LIMIT ?1"
            ))?;

            let mut rows = stmt.query(params![to_i64(u64::from(limit))?])?;
            let mut events = Vec::new();
            while let Some(row) = rows.next()? {
                events.push(row_to_event(row)?);
            }

            Ok(events)
        })
        .await
    }

    /// Pending → Taken transition. Refuses to touch events in any other
    /// status, so a repeated confirmation cannot overwrite an earlier intake.
    pub async fn mark_event_taken(
        &self,
        event_id: &str,
        actual_time: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let event_id = event_id.to_string();
        self.execute(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE medication_events
                     SET status = ?1,
                         actual_time = ?2,
                         pills_taken = 1,
                         updated_at = ?3
                     WHERE id = ?4 AND status = ?5",
                    params![
                        MedicationStatus::Taken.as_str(),
                        actual_time.to_rfc3339(),
                        updated_at.to_rfc3339(),
                        event_id,
                        MedicationStatus::Pending.as_str(),
                    ],
                )
                .with_context(|| "failed to update medication event status")?;

            if updated == 0 {
                bail!("medication event {event_id} is not pending");
            }

            Ok(())
        })
        .await
    }
}
