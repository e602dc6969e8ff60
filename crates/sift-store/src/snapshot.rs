use crate::error::{Result, StoreError};
use crate::repo::TasksRepo;
use rusqlite::Connection;
use sift_core::domain::{Partition, Task};
use sift_core::TaskSource;
use std::cell::OnceCell;

/// Read view of both partitions for one command. Each partition is read
/// from the database at most once, on first use.
pub struct Snapshot<'a> {
    conn: &'a Connection,
    pending: OnceCell<Vec<Task>>,
    completed: OnceCell<Vec<Task>>,
}

impl<'a> Snapshot<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            pending: OnceCell::new(),
            completed: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self, partition: Partition) -> bool {
        match partition {
            Partition::Pending => self.pending.get().is_some(),
            Partition::Completed => self.completed.get().is_some(),
        }
    }

    fn load(&self, partition: Partition) -> Result<&[Task]> {
        let cell = match partition {
            Partition::Pending => &self.pending,
            Partition::Completed => &self.completed,
        };
        if let Some(tasks) = cell.get() {
            return Ok(tasks);
        }
        let tasks = TasksRepo::new(self.conn).list(partition)?;
        Ok(cell.get_or_init(|| tasks))
    }
}

impl TaskSource for Snapshot<'_> {
    type Error = StoreError;

    fn pending_tasks(&self) -> Result<&[Task]> {
        self.load(Partition::Pending)
    }

    fn completed_tasks(&self) -> Result<&[Task]> {
        self.load(Partition::Completed)
    }
}
