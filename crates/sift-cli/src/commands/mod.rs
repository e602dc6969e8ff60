use anyhow::Result;
use serde::Serialize;
use sift_config::AppConfig;
use sift_core::eval::EvalSettings;
use sift_core::time::{local_offset, now_utc};
use sift_core::FilterSettings;
use sift_store::Store;
use std::io::{self, BufRead, Write};

pub mod completions;
pub mod tasks;

pub struct Context<'a> {
    pub store: &'a Store,
    pub json: bool,
    pub config: &'a AppConfig,
}

impl Context<'_> {
    pub fn eval_settings(&self) -> EvalSettings {
        EvalSettings {
            now: now_utc(),
            offset: local_offset(),
            week_start: self.config.filter.week_start,
            regex: self.config.filter.regex,
            schema: self.config.schema.clone(),
        }
    }

    pub fn filter_settings(&self, read_only: bool) -> FilterSettings {
        FilterSettings {
            debug: self.config.debug,
            read_only,
            confirmation: self.config.confirmation,
            trace_eval: false,
            eval: self.eval_settings(),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Asks on stderr and reads one line from stdin. Anything but y/yes declines.
pub fn prompt_yes_no(prompt: &str) -> bool {
    let mut stderr = io::stderr().lock();
    if write!(stderr, "{} (y/N) ", prompt).is_err() || stderr.flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
    }
}
