use crate::domain::{Partition, Task};
use crate::filter::FilterError;
use std::cell::RefCell;

/// The two ordered partitions of the task store. Each call returns a list
/// that stays loaded and unchanged for the rest of the filter pass.
pub trait TaskSource {
    type Error: From<FilterError>;

    fn pending_tasks(&self) -> Result<&[Task], Self::Error>;
    fn completed_tasks(&self) -> Result<&[Task], Self::Error>;
}

/// In-memory partitions. Remembers which partitions were asked for.
#[derive(Debug, Default)]
pub struct MemorySource {
    pending: Vec<Task>,
    completed: Vec<Task>,
    loads: RefCell<Vec<Partition>>,
}

impl MemorySource {
    pub fn new(pending: Vec<Task>, completed: Vec<Task>) -> Self {
        Self {
            pending,
            completed,
            loads: RefCell::new(Vec::new()),
        }
    }

    /// Splits tasks by status, numbering pending ones from 1 in order.
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let mut pending = Vec::new();
        let mut completed = Vec::new();
        for mut task in tasks {
            let partition = task.status().map_or(Partition::Pending, |status| status.partition());
            match partition {
                Partition::Pending => {
                    task.id = Some(pending.len() as u64 + 1);
                    pending.push(task);
                }
                Partition::Completed => {
                    task.id = None;
                    completed.push(task);
                }
            }
        }
        Self::new(pending, completed)
    }

    /// Pending then completed, without counting as a load.
    pub fn all(&self) -> Vec<Task> {
        self.pending.iter().chain(&self.completed).cloned().collect()
    }

    pub fn loads(&self) -> Vec<Partition> {
        self.loads.borrow().clone()
    }

    pub fn loaded(&self, partition: Partition) -> bool {
        self.loads.borrow().contains(&partition)
    }
}

impl TaskSource for MemorySource {
    type Error = FilterError;

    fn pending_tasks(&self) -> Result<&[Task], FilterError> {
        self.loads.borrow_mut().push(Partition::Pending);
        Ok(&self.pending)
    }

    fn completed_tasks(&self) -> Result<&[Task], FilterError> {
        self.loads.borrow_mut().push(Partition::Completed);
        Ok(&self.completed)
    }
}
