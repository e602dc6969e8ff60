use anyhow::{Context as _, Result};
use chrono::{DateTime, FixedOffset, Utc};
use clap::Args;
use sift_core::eval::{is_named_date, EvalSettings, NamedDates};
use sift_core::profile::filter_timer;
use sift_core::time::{format_timestamp_date, parse_date_text, parse_local_timestamp};
use sift_core::{parse_filter_args, Filter, Schema, Status, Task, TaskUuid};
use tracing::debug;

use crate::commands::{print_json, prompt_yes_no, Context};
use crate::error::invalid_input;

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub words: Vec<String>,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Filter words: ids, uuids, +tag, -tag, name[.modifier]:value, /pattern/,
    /// bare words, and/or/xor/not, parentheses and infix expressions
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub filter: Vec<String>,
}

pub fn add_task(ctx: &Context<'_>, args: AddArgs) -> Result<()> {
    let settings = ctx.eval_settings();
    let task = build_task(&args.words, &settings)?;
    let task = ctx
        .store
        .tasks()
        .add(settings.now, task)
        .with_context(|| "add task")?;

    if ctx.json {
        print_json(&task)?;
    } else {
        match task.id {
            Some(id) => println!("created task {}", id),
            None => println!("created task {}", task.uuid.short()),
        }
    }
    Ok(())
}

pub fn list_tasks(ctx: &Context<'_>, args: FilterArgs) -> Result<()> {
    let tasks = select(ctx, &args.filter, true)?;
    if ctx.json {
        print_json(&tasks)?;
        return Ok(());
    }

    if tasks.is_empty() {
        println!("no matching tasks");
        return Ok(());
    }

    let offset = ctx.eval_settings().offset;
    for task in &tasks {
        println!("{}", task_line(task, offset));
    }
    Ok(())
}

pub fn count_tasks(ctx: &Context<'_>, args: FilterArgs) -> Result<()> {
    let count = select(ctx, &args.filter, true)?.len();
    if ctx.json {
        print_json(&serde_json::json!({ "count": count }))?;
    } else {
        println!("{}", count);
    }
    Ok(())
}

pub fn complete_tasks(ctx: &Context<'_>, args: FilterArgs) -> Result<()> {
    change_status(ctx, &args.filter, Status::Completed, "completed")
}

pub fn delete_tasks(ctx: &Context<'_>, args: FilterArgs) -> Result<()> {
    change_status(ctx, &args.filter, Status::Deleted, "deleted")
}

fn change_status(ctx: &Context<'_>, words: &[String], status: Status, verb: &str) -> Result<()> {
    let selected = select(ctx, words, false)?;
    let now = ctx.eval_settings().now;
    let repo = ctx.store.tasks();

    let mut changed = Vec::new();
    for task in selected {
        if !needs_status_change(&task, status) {
            debug!(uuid = %task.uuid, status = %status, "task already in target state");
            continue;
        }
        let label = task_label(&task);
        let updated = repo
            .set_status(now, task.uuid, status)
            .with_context(|| format!("update task {}", label))?;
        if !ctx.json {
            println!("{} task {} '{}'", verb, label, task.get("description").unwrap_or(""));
        }
        changed.push(updated);
    }

    if ctx.json {
        print_json(&changed)?;
    } else if changed.is_empty() {
        println!("no matching tasks");
    }
    Ok(())
}

/// Runs the filter over the whole store. Mutating commands go through the
/// no-filter confirmation.
fn select(ctx: &Context<'_>, words: &[String], read_only: bool) -> Result<Vec<Task>> {
    let parsed = parse_filter_args(words, &ctx.config.schema).with_context(|| "parse filter")?;
    let mut filter = Filter::new(&parsed, ctx.filter_settings(read_only));
    if ctx.config.filter.verify_legacy {
        filter = filter.with_legacy_oracle();
    }
    if ctx.config.confirmation {
        filter = filter.with_confirm(prompt_yes_no);
    }

    let snapshot = ctx.store.snapshot();
    let tasks = filter.subset_all(&snapshot).with_context(|| "filter tasks")?;
    let stats = filter.stats();
    if stats.mismatches > 0 {
        debug!(mismatches = stats.mismatches, "legacy filter disagreed");
    }
    let timer = filter_timer();
    debug!(elapsed = ?timer.total(), runs = timer.runs(), "filter time");
    Ok(tasks)
}

fn needs_status_change(task: &Task, status: Status) -> bool {
    match task.status() {
        Ok(current) if current == status => false,
        Ok(Status::Deleted) => false,
        _ => true,
    }
}

/// Turns `add` words into a new task. `+tag` adds a tag, `name:value` sets
/// a known attribute, everything else is description.
fn build_task(words: &[String], settings: &EvalSettings) -> Result<Task> {
    let dates = NamedDates::new(settings.now, settings.offset).week_start(settings.week_start);
    let mut task = Task::new(TaskUuid::new());
    let mut description = Vec::new();

    for word in words {
        if let Some(tag) = word.strip_prefix('+') {
            if tag.is_empty() || tag.contains(',') || tag.chars().any(char::is_whitespace) {
                return Err(invalid_input(format!("invalid tag: {}", word)));
            }
            task.add_tag(tag);
            continue;
        }

        if let Some((name, value)) = attribute_word(word, &settings.schema) {
            if name == "tags" {
                for tag in value.split(',') {
                    task.add_tag(tag);
                }
            } else if settings.schema.is_date(name) {
                let at = resolve_date(value, &dates, settings.offset)
                    .with_context(|| format!("parse {} date '{}'", name, value))?;
                task.set(name, at.timestamp().to_string())?;
            } else {
                task.set(name, value)?;
            }
            continue;
        }

        description.push(word.as_str());
    }

    let description = description.join(" ");
    if description.trim().is_empty() {
        return Err(invalid_input("task description cannot be empty"));
    }
    task.set("description", description)?;
    task.status()?;
    Ok(task)
}

fn attribute_word<'w>(word: &'w str, schema: &Schema) -> Option<(&'w str, &'w str)> {
    let (name, value) = word.split_once(':')?;
    if name == "id" || name == "uuid" || !schema.contains(name) {
        return None;
    }
    Some((name, value))
}

fn resolve_date(
    value: &str,
    dates: &NamedDates,
    offset: FixedOffset,
) -> Result<DateTime<Utc>> {
    if is_named_date(value) {
        if let Some(at) = dates.lookup(value) {
            return Ok(at);
        }
    }
    Ok(parse_local_timestamp(value, offset)?)
}

fn task_label(task: &Task) -> String {
    match task.id {
        Some(id) => id.to_string(),
        None => task.uuid.short(),
    }
}

fn task_line(task: &Task, offset: FixedOffset) -> String {
    let id = task
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let status = task.status().map(|s| s.as_str()).unwrap_or("?");
    let mut line = format!(
        "{}  {}  [{}]  {}",
        id,
        task.uuid.short(),
        status,
        task.get("description").unwrap_or("")
    );
    if let Some(project) = task.get("project").filter(|p| !p.is_empty()) {
        line.push_str(&format!("  project:{}", project));
    }
    if let Some(due) = task.get("due").and_then(|raw| parse_date_text(raw, offset)) {
        line.push_str(&format!("  due:{}", format_timestamp_date(due, offset)));
    }
    let tags: Vec<String> = task.tags().map(|tag| format!("+{}", tag)).collect();
    if !tags.is_empty() {
        line.push_str("  ");
        line.push_str(&tags.join(" "));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{build_task, needs_status_change, task_line};
    use chrono::{FixedOffset, TimeZone, Utc};
    use sift_core::eval::EvalSettings;
    use sift_core::{Status, Task, TaskUuid};

    fn settings() -> EvalSettings {
        EvalSettings {
            now: Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(0).unwrap(),
            ..EvalSettings::default()
        }
    }

    fn words(input: &str) -> Vec<String> {
        input.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn add_words_split_into_attributes_tags_and_description() {
        let task = build_task(&words("Pay rent project:Home +bills due:2024-04-01"), &settings())
            .expect("build");
        assert_eq!(task.get("description"), Some("Pay rent"));
        assert_eq!(task.get("project"), Some("Home"));
        assert!(task.has_tag("bills"));
        let due = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap().timestamp();
        assert_eq!(task.get("due"), Some(due.to_string().as_str()));
    }

    #[test]
    fn add_accepts_named_dates() {
        let task = build_task(&words("call mom due:tomorrow"), &settings()).expect("build");
        let tomorrow = Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap().timestamp();
        assert_eq!(task.get("due"), Some(tomorrow.to_string().as_str()));
    }

    #[test]
    fn unknown_names_stay_in_description() {
        let task = build_task(&words("read chapter:3 of the book"), &settings()).expect("build");
        assert_eq!(task.get("description"), Some("read chapter:3 of the book"));
    }

    #[test]
    fn add_rejects_bad_input() {
        assert!(build_task(&words("+work"), &settings()).is_err());
        assert!(build_task(&words("thing due:whenever"), &settings()).is_err());
        assert!(build_task(&words("thing status:sleeping"), &settings()).is_err());
        assert!(build_task(&words("thing +"), &settings()).is_err());
    }

    #[test]
    fn status_changes_skip_finished_tasks() {
        let mut task = Task::new(TaskUuid::new());
        assert!(needs_status_change(&task, Status::Completed));
        task.set_status(Status::Completed);
        assert!(!needs_status_change(&task, Status::Completed));
        assert!(needs_status_change(&task, Status::Deleted));
        task.set_status(Status::Deleted);
        assert!(!needs_status_change(&task, Status::Completed));
    }

    #[test]
    fn list_line_shows_id_status_and_tags() {
        let mut task = Task::new(TaskUuid::new()).with_id(3);
        task.set("description", "water plants").unwrap();
        task.add_tag("home");
        let line = task_line(&task, FixedOffset::east_opt(0).unwrap());
        assert!(line.starts_with("3  "));
        assert!(line.contains("[pending]"));
        assert!(line.ends_with("+home"));
    }
}
