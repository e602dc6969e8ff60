use crate::domain::ids::TaskUuid;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Waiting,
    Recurring,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Pending,
    Completed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Waiting => "waiting",
            Status::Recurring => "recurring",
            Status::Completed => "completed",
            Status::Deleted => "deleted",
        }
    }

    pub fn partition(&self) -> Partition {
        match self {
            Status::Pending | Status::Waiting | Status::Recurring => Partition::Pending,
            Status::Completed | Status::Deleted => Partition::Completed,
        }
    }
}

impl FromStr for Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Status::Pending),
            "waiting" => Ok(Status::Waiting),
            "recurring" => Ok(Status::Recurring),
            "completed" => Ok(Status::Completed),
            "deleted" => Ok(Status::Deleted),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Pending => "pending",
            Partition::Completed => "completed",
        }
    }
}

impl FromStr for Partition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Partition::Pending),
            "completed" => Ok(Partition::Completed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// A task record: a string-valued attribute bag addressed by a lifetime-stable
/// uuid, plus a working-set id that only exists while the task is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<u64>,
    pub uuid: TaskUuid,
    attributes: BTreeMap<String, String>,
}

impl Task {
    pub fn new(uuid: TaskUuid) -> Self {
        Self {
            id: None,
            uuid,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), CoreError> {
        if name == "id" || name == "uuid" {
            return Err(CoreError::ReadOnlyAttribute(name.to_string()));
        }
        if !is_valid_attribute_name(name) {
            return Err(CoreError::InvalidAttributeName(name.to_string()));
        }
        self.attributes.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Missing status reads as pending; an unknown spelling is an error.
    pub fn status(&self) -> Result<Status, CoreError> {
        match self.get("status") {
            Some(raw) => Status::from_str(raw),
            None => Ok(Status::Pending),
        }
    }

    pub fn set_status(&mut self, status: Status) {
        self.attributes
            .insert("status".to_string(), status.as_str().to_string());
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.get("tags")
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().any(|existing| existing == tag)
    }

    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if tag.is_empty() || self.has_tag(tag) {
            return;
        }
        let mut tags: Vec<&str> = self.tags().collect();
        tags.push(tag);
        let joined = tags.join(",");
        self.attributes.insert("tags".to_string(), joined);
    }
}

pub fn is_valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::{Partition, Status, Task};
    use crate::domain::TaskUuid;
    use crate::error::CoreError;

    #[test]
    fn status_partitions() {
        assert_eq!(Status::Waiting.partition(), Partition::Pending);
        assert_eq!(Status::Deleted.partition(), Partition::Completed);
    }

    #[test]
    fn tags_are_comma_separated() {
        let mut task = Task::new(TaskUuid::new());
        task.add_tag("home");
        task.add_tag("errand");
        task.add_tag("home");
        assert_eq!(task.get("tags"), Some("home,errand"));
        assert!(task.has_tag("errand"));
        assert!(!task.has_tag("err"));
    }

    #[test]
    fn id_and_uuid_are_not_attributes() {
        let mut task = Task::new(TaskUuid::new());
        let err = task.set("uuid", "x").unwrap_err();
        assert_eq!(err, CoreError::ReadOnlyAttribute("uuid".to_string()));
        assert!(task.set("Project", "x").is_err());
        assert!(task.set("project", "Home").is_ok());
    }

    #[test]
    fn missing_status_reads_pending() {
        let task = Task::new(TaskUuid::new());
        assert_eq!(task.status().unwrap(), Status::Pending);
    }
}
