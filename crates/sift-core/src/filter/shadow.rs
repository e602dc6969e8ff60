use crate::domain::Task;
use crate::eval::{CompiledExpr, EvalContext};
use crate::filter::FilterError;
use std::cell::Cell;
use tracing::warn;

/// The authoritative task predicate.
pub trait Predicate {
    fn matches(&self, task: &Task) -> Result<bool, FilterError>;
}

impl Predicate for CompiledExpr {
    fn matches(&self, task: &Task) -> Result<bool, FilterError> {
        let value = self.evaluate(&EvalContext::for_task(task))?;
        Ok(value.to_bool())
    }
}

/// A second opinion on a filter. Never fails; only ever compared.
pub trait Oracle {
    fn eval_filter(&self, task: &Task) -> bool;
}

impl<F> Oracle for F
where
    F: Fn(&Task) -> bool,
{
    fn eval_filter(&self, task: &Task) -> bool {
        self(task)
    }
}

/// Runs an oracle next to the real predicate and counts disagreements.
/// The verdict returned is always the predicate's.
pub struct Shadowed<'p> {
    primary: &'p dyn Predicate,
    oracle: &'p dyn Oracle,
    report: bool,
    mismatches: Cell<usize>,
}

impl<'p> Shadowed<'p> {
    pub fn new(primary: &'p dyn Predicate, oracle: &'p dyn Oracle) -> Self {
        Self {
            primary,
            oracle,
            report: false,
            mismatches: Cell::new(0),
        }
    }

    pub fn report(mut self, enabled: bool) -> Self {
        self.report = enabled;
        self
    }

    pub fn mismatches(&self) -> usize {
        self.mismatches.get()
    }
}

impl Predicate for Shadowed<'_> {
    fn matches(&self, task: &Task) -> Result<bool, FilterError> {
        let verdict = self.primary.matches(task)?;
        if self.oracle.eval_filter(task) != verdict {
            self.mismatches.set(self.mismatches.get() + 1);
            if self.report {
                warn!(
                    "# filter mismatch ID {} UUID {}",
                    task.id.unwrap_or(0),
                    task.uuid
                );
            }
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::{Predicate, Shadowed};
    use crate::domain::{Task, TaskUuid};
    use crate::eval::{task_compiler, EvalSettings};

    fn task(project: &str) -> Task {
        let mut task = Task::new(TaskUuid::new()).with_id(1);
        task.set("project", project).unwrap();
        task
    }

    #[test]
    fn compiled_expression_is_a_predicate() {
        let expr = task_compiler(&EvalSettings::default())
            .compile("project == \"Home\"")
            .unwrap();
        assert!(expr.matches(&task("Home")).unwrap());
        assert!(!expr.matches(&task("Work")).unwrap());
    }

    #[test]
    fn mismatches_are_counted_but_never_change_the_verdict() {
        let expr = task_compiler(&EvalSettings::default())
            .compile("project == \"Home\"")
            .unwrap();
        let always = |_: &Task| true;
        let shadow = Shadowed::new(&expr, &always).report(true);

        assert!(shadow.matches(&task("Home")).unwrap());
        assert!(!shadow.matches(&task("Work")).unwrap());
        assert_eq!(shadow.mismatches(), 1);
    }

    #[test]
    fn primary_errors_propagate() {
        let expr = task_compiler(&EvalSettings::default())
            .compile("nosuchfield == 1")
            .unwrap();
        let never = |_: &Task| false;
        let shadow = Shadowed::new(&expr, &never);
        assert!(shadow.matches(&task("Home")).is_err());
        assert_eq!(shadow.mismatches(), 0);
    }
}
