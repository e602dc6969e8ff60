use crate::domain::Task;
use crate::eval::{task_compiler, CompiledExpr, EvalSettings};
use crate::filter::parser::FilterSource;
use crate::filter::safety::{check_safety, Confirm};
use crate::filter::scope::needs_completed_partition;
use crate::filter::shadow::{Oracle, Predicate, Shadowed};
use crate::filter::source::TaskSource;
use crate::filter::FilterError;
use crate::profile::filter_timer;
use std::cell::Cell;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FilterSettings {
    pub debug: bool,
    /// Read-only commands skip the safety guard.
    pub read_only: bool,
    pub confirmation: bool,
    pub trace_eval: bool,
    pub eval: EvalSettings,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            debug: false,
            read_only: true,
            confirmation: true,
            trace_eval: false,
            eval: EvalSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub evaluated: usize,
    pub matched: usize,
    pub mismatches: usize,
    pub completed_skipped: bool,
}

pub struct Filter<'a> {
    source: &'a dyn FilterSource,
    settings: FilterSettings,
    oracle: Option<Box<dyn Oracle + 'a>>,
    confirm: Option<Box<dyn Confirm + 'a>>,
    stats: Cell<FilterStats>,
}

impl<'a> Filter<'a> {
    pub fn new(source: &'a dyn FilterSource, settings: FilterSettings) -> Self {
        Self {
            source,
            settings,
            oracle: None,
            confirm: None,
            stats: Cell::new(FilterStats::default()),
        }
    }

    pub fn with_oracle(mut self, oracle: impl Oracle + 'a) -> Self {
        self.oracle = Some(Box::new(oracle));
        self
    }

    /// Cross-checks every verdict against the term-by-term legacy filter.
    #[cfg(feature = "legacy-oracle")]
    pub fn with_legacy_oracle(self) -> Self {
        let eval = &self.settings.eval;
        let dates =
            crate::eval::NamedDates::new(eval.now, eval.offset).week_start(eval.week_start);
        let legacy =
            crate::filter::legacy::LegacyFilter::new(self.source.tree(), &dates, eval.offset);
        self.with_oracle(legacy)
    }

    pub fn with_confirm(mut self, confirm: impl Confirm + 'a) -> Self {
        self.confirm = Some(Box::new(confirm));
        self
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn stats(&self) -> FilterStats {
        self.stats.get()
    }

    pub fn pending_only(&self) -> bool {
        !needs_completed_partition(self.source.tree())
    }

    /// Filters an explicit list. An empty filter returns it unchanged.
    pub fn subset(&self, tasks: &[Task]) -> Result<Vec<Task>, FilterError> {
        let _running = filter_timer().start();
        let mut stats = FilterStats::default();

        let Some(expr) = self.compile()? else {
            stats.matched = tasks.len();
            self.stats.set(stats);
            return Ok(tasks.to_vec());
        };

        let shadow = self.shadow(&expr);
        let predicate: &dyn Predicate = match &shadow {
            Some(shadow) => shadow,
            None => &expr,
        };

        let mut out = Vec::new();
        select(predicate, tasks, &mut out, &mut stats)?;
        stats.mismatches = shadow.as_ref().map_or(0, Shadowed::mismatches);
        self.stats.set(stats);
        Ok(out)
    }

    /// Filters the whole store: pending tasks first, then completed ones
    /// unless the filter cannot match them. Store errors come back as-is.
    pub fn subset_all<S: TaskSource>(&mut self, store: &S) -> Result<Vec<Task>, S::Error> {
        let mut running = filter_timer().start();
        let mut stats = FilterStats::default();

        let Some(expr) = self.compile()? else {
            running.paused(|| self.check_safety())?;

            let pending = running.paused(|| store.pending_tasks())?;
            let completed = running.paused(|| store.completed_tasks())?;
            let out: Vec<Task> = pending.iter().chain(completed).cloned().collect();
            stats.matched = out.len();
            self.stats.set(stats);
            return Ok(out);
        };

        let pending = running.paused(|| store.pending_tasks())?;

        let shadow = self.shadow(&expr);
        let predicate: &dyn Predicate = match &shadow {
            Some(shadow) => shadow,
            None => &expr,
        };

        let mut out = Vec::new();
        select(predicate, pending, &mut out, &mut stats)?;

        if self.pending_only() {
            stats.completed_skipped = true;
        } else {
            let completed = running.paused(|| store.completed_tasks())?;
            select(predicate, completed, &mut out, &mut stats)?;
        }

        stats.mismatches = shadow.as_ref().map_or(0, Shadowed::mismatches);
        debug!(
            evaluated = stats.evaluated,
            matched = stats.matched,
            mismatches = stats.mismatches,
            completed_skipped = stats.completed_skipped,
            "filter pass finished"
        );
        self.stats.set(stats);
        Ok(out)
    }

    fn compile(&self) -> Result<Option<CompiledExpr>, FilterError> {
        if self.settings.debug {
            debug!("{}", self.source.tree().dump());
        }
        let text = self.source.expression();
        debug!("\x1b[1;37;42mFILTER\x1b[0m {}", text);

        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut compiler = task_compiler(&self.settings.eval);
        compiler.debug(self.settings.debug);
        if self.settings.debug {
            debug!(sources = ?compiler.source_names(), "resolver chain");
        }
        let mut expr = compiler.compile(text)?;
        expr.set_trace(self.settings.trace_eval);
        Ok(Some(expr))
    }

    fn shadow<'p>(&'p self, expr: &'p CompiledExpr) -> Option<Shadowed<'p>> {
        self.oracle
            .as_deref()
            .map(|oracle| Shadowed::new(expr, oracle).report(self.settings.debug))
    }

    fn check_safety(&mut self) -> Result<(), FilterError> {
        let allow_prompt = self.settings.confirmation && self.confirm.is_some();
        let mut decline = |_: &str| false;
        let confirm: &mut dyn Confirm = match self.confirm.as_deref_mut() {
            Some(confirm) => confirm,
            None => &mut decline,
        };
        check_safety(true, self.settings.read_only, allow_prompt, confirm)
    }
}

fn select(
    predicate: &dyn Predicate,
    tasks: &[Task],
    out: &mut Vec<Task>,
    stats: &mut FilterStats,
) -> Result<(), FilterError> {
    for task in tasks {
        stats.evaluated += 1;
        if predicate.matches(task)? {
            stats.matched += 1;
            out.push(task.clone());
        }
    }
    Ok(())
}
