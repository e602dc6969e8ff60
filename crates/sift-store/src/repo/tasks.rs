use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sift_core::domain::{Partition, Status, Task, TaskUuid};
use std::str::FromStr;

pub struct TasksRepo<'a> {
    conn: &'a Connection,
}

impl<'a> TasksRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Stores a new task at the end of its partition. A missing status reads
    /// as pending and a missing entry date is stamped with `now`.
    pub fn add(&self, now: DateTime<Utc>, mut task: Task) -> Result<Task> {
        if !task.has("status") {
            task.set_status(Status::Pending);
        }
        if !task.has("entry") {
            task.set("entry", now.timestamp().to_string())?;
        }
        let partition = task.status()?.partition();

        let tx = self.conn.unchecked_transaction()?;
        let seq: i64 = tx.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM tasks;", [], |row| {
            row.get(0)
        })?;
        tx.execute(
            "INSERT INTO tasks (uuid, partition, seq) VALUES (?1, ?2, ?3);",
            params![task.uuid.to_string(), partition.as_str(), seq],
        )?;
        write_attributes(&tx, &task)?;
        tx.commit()?;

        self.get(task.uuid)?
            .ok_or_else(|| StoreError::NotFound(task.uuid.to_string()))
    }

    pub fn get(&self, uuid: TaskUuid) -> Result<Option<Task>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT partition, seq FROM tasks WHERE uuid = ?1;",
                [uuid.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((partition, seq)) = row else {
            return Ok(None);
        };

        let mut task = Task::new(uuid);
        if Partition::from_str(&partition)? == Partition::Pending {
            let position: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE partition = 'pending' AND seq <= ?1;",
                [seq],
                |row| row.get(0),
            )?;
            task.id = Some(position as u64);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, value FROM task_attributes WHERE task_uuid = ?1;")?;
        let mut rows = stmt.query([uuid.to_string()])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let value: String = row.get(1)?;
            task.set(&name, value)?;
        }
        Ok(Some(task))
    }

    /// One partition in insertion order. Pending tasks are numbered from 1.
    pub fn list(&self, partition: Partition) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT tasks.uuid, task_attributes.name, task_attributes.value
             FROM tasks
             LEFT JOIN task_attributes ON task_attributes.task_uuid = tasks.uuid
             WHERE tasks.partition = ?1
             ORDER BY tasks.seq ASC, task_attributes.name ASC;",
        )?;
        let mut rows = stmt.query([partition.as_str()])?;

        let mut tasks: Vec<Task> = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid: String = row.get(0)?;
            let uuid = parse_uuid(&uuid)?;
            if tasks.last().map(|task| task.uuid) != Some(uuid) {
                let mut task = Task::new(uuid);
                if partition == Partition::Pending {
                    task.id = Some(tasks.len() as u64 + 1);
                }
                tasks.push(task);
            }
            let name: Option<String> = row.get(1)?;
            let value: Option<String> = row.get(2)?;
            if let (Some(name), Some(value), Some(task)) = (name, value, tasks.last_mut()) {
                task.set(&name, value)?;
            }
        }
        Ok(tasks)
    }

    /// Replaces the stored attributes. The partition follows the status.
    pub fn update(&self, task: &Task) -> Result<()> {
        let partition = task.status()?.partition();
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE tasks SET partition = ?2 WHERE uuid = ?1;",
            params![task.uuid.to_string(), partition.as_str()],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(task.uuid.to_string()));
        }
        tx.execute(
            "DELETE FROM task_attributes WHERE task_uuid = ?1;",
            [task.uuid.to_string()],
        )?;
        write_attributes(&tx, task)?;
        tx.commit()?;
        Ok(())
    }

    /// Moves a task to the partition its new status belongs to. Completing or
    /// deleting stamps `end`; reopening clears it.
    pub fn set_status(&self, now: DateTime<Utc>, uuid: TaskUuid, status: Status) -> Result<Task> {
        let mut task = self
            .get(uuid)?
            .ok_or_else(|| StoreError::NotFound(uuid.to_string()))?;
        task.set_status(status);
        match status.partition() {
            Partition::Completed => task.set("end", now.timestamp().to_string())?,
            Partition::Pending => {
                task.remove("end");
            }
        }
        task.set("modified", now.timestamp().to_string())?;
        self.update(&task)?;
        self.get(uuid)?
            .ok_or_else(|| StoreError::NotFound(uuid.to_string()))
    }

    pub fn count(&self, partition: Partition) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE partition = ?1;",
            [partition.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn write_attributes(conn: &Connection, task: &Task) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO task_attributes (task_uuid, name, value) VALUES (?1, ?2, ?3);",
    )?;
    let uuid = task.uuid.to_string();
    for (name, value) in task.attributes() {
        stmt.execute(params![uuid, name, value])?;
    }
    Ok(())
}

fn parse_uuid(raw: &str) -> Result<TaskUuid> {
    TaskUuid::from_str(raw).map_err(|_| StoreError::InvalidId(raw.to_string()))
}
