use crate::domain::{Schema, Task};
use crate::eval::value::Value;
use crate::time::parse_date_text;
use chrono::{Datelike, FixedOffset, Timelike};

/// Per-evaluation state handed to every resolver. The current task travels
/// here instead of living in shared state, so one compiled expression can be
/// evaluated from several threads, each with its own context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    task: Option<&'a Task>,
}

impl<'a> EvalContext<'a> {
    pub fn empty() -> Self {
        Self { task: None }
    }

    pub fn for_task(task: &'a Task) -> Self {
        Self { task: Some(task) }
    }

    pub fn task(&self) -> Option<&'a Task> {
        self.task
    }
}

pub trait Resolver: Send + Sync {
    fn name(&self) -> &str;

    /// `None` defers to the next resolver in the chain.
    fn resolve(&self, identifier: &str, ctx: &EvalContext<'_>) -> Option<Value>;
}

/// Resolves identifiers against the current task: schema attributes, `id`,
/// `uuid`, and `<date-attribute>.<element>` paths.
#[derive(Debug, Clone)]
pub struct TaskAttributes {
    schema: Schema,
    offset: FixedOffset,
}

impl TaskAttributes {
    pub fn new(schema: Schema, offset: FixedOffset) -> Self {
        Self { schema, offset }
    }

    pub fn lookup(&self, path: &str, task: &Task) -> Option<String> {
        match path {
            "id" => return Some(task.id.map_or_else(|| "0".to_string(), |id| id.to_string())),
            "uuid" => return Some(task.uuid.to_string()),
            _ => {}
        }

        if self.schema.contains(path) {
            return Some(task.get(path).unwrap_or_default().to_string());
        }

        let (attribute, element) = path.split_once('.')?;
        if !self.schema.is_date(attribute) {
            return None;
        }
        let raw = task.get(attribute).unwrap_or_default();
        let Some(date) = parse_date_text(raw, self.offset) else {
            return date_element_known(element).then(String::new);
        };
        let local = date.with_timezone(&self.offset);
        let number = match element {
            "year" => local.year() as i64,
            "month" => i64::from(local.month()),
            "day" => i64::from(local.day()),
            "week" => i64::from(local.iso_week().week()),
            "weekday" => i64::from(local.weekday().num_days_from_sunday()),
            "hour" => i64::from(local.hour()),
            "minute" => i64::from(local.minute()),
            "second" => i64::from(local.second()),
            _ => return None,
        };
        Some(number.to_string())
    }
}

fn date_element_known(element: &str) -> bool {
    matches!(
        element,
        "year" | "month" | "day" | "week" | "weekday" | "hour" | "minute" | "second"
    )
}

impl Resolver for TaskAttributes {
    fn name(&self) -> &str {
        "task-attributes"
    }

    fn resolve(&self, identifier: &str, ctx: &EvalContext<'_>) -> Option<Value> {
        let task = ctx.task()?;
        self.lookup(identifier, task).map(Value::String)
    }
}
