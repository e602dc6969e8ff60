mod compile;
mod dates;
mod error;
mod lexer;
mod resolve;
mod value;

use crate::domain::Schema;
use crate::time::{local_offset, now_utc};
use chrono::{DateTime, FixedOffset, Utc, Weekday};

pub use compile::{CompiledExpr, Compiler};
pub use dates::{is_named_date, NamedDates, NAMED_DATES};
pub use error::{EvalError, SyntaxError};
pub use lexer::{tokenize, Op, Token, TokenKind};
pub use resolve::{EvalContext, Resolver, TaskAttributes};
pub use value::Value;

/// Everything a task compiler needs to know about the environment it runs in.
#[derive(Debug, Clone)]
pub struct EvalSettings {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
    pub week_start: Weekday,
    pub regex: bool,
    pub schema: Schema,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            now: now_utc(),
            offset: local_offset(),
            week_start: Weekday::Sun,
            regex: true,
            schema: Schema::builtin(),
        }
    }
}

/// The standard resolver chain for filtering tasks: named dates first, then
/// the current task's attributes.
pub fn task_compiler(settings: &EvalSettings) -> Compiler {
    Compiler::new()
        .offset(settings.offset)
        .regex(settings.regex)
        .with_source(
            NamedDates::new(settings.now, settings.offset).week_start(settings.week_start),
        )
        .with_source(TaskAttributes::new(settings.schema.clone(), settings.offset))
}
