use crate::filter::FilterError;
use tracing::{debug, warn};

pub const SAFETY_PROMPT: &str =
    "This command has no filter, and will modify all (including completed and deleted) tasks. Are you sure?";

/// Interactive yes/no confirmation.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Refuses a mutating command with an empty filter unless the user, when
/// prompting is allowed, explicitly agrees.
pub fn check_safety(
    filter_is_empty: bool,
    read_only: bool,
    allow_prompt: bool,
    confirm: &mut dyn Confirm,
) -> Result<(), FilterError> {
    if read_only || !filter_is_empty {
        return Ok(());
    }

    if allow_prompt && confirm.confirm(SAFETY_PROMPT) {
        debug!("unfiltered command confirmed");
        return Ok(());
    }

    warn!("refusing to apply a command to every task without a filter");
    Err(FilterError::SafetyViolation)
}

#[cfg(test)]
mod tests {
    use super::{check_safety, SAFETY_PROMPT};
    use crate::filter::FilterError;

    fn never_asked(_: &str) -> bool {
        panic!("prompt should not be shown");
    }

    #[test]
    fn read_only_and_filtered_commands_pass() {
        assert!(check_safety(true, true, false, &mut never_asked).is_ok());
        assert!(check_safety(false, false, false, &mut never_asked).is_ok());
    }

    #[test]
    fn empty_mutating_filter_without_prompt_is_refused() {
        let err = check_safety(true, false, false, &mut never_asked).unwrap_err();
        assert!(matches!(err, FilterError::SafetyViolation));
    }

    #[test]
    fn declined_confirmation_is_refused() {
        let mut asked = Vec::new();
        let mut decline = |prompt: &str| {
            asked.push(prompt.to_string());
            false
        };
        let err = check_safety(true, false, true, &mut decline).unwrap_err();
        assert!(matches!(err, FilterError::SafetyViolation));
        assert_eq!(asked, vec![SAFETY_PROMPT.to_string()]);
    }

    #[test]
    fn accepted_confirmation_passes() {
        let mut accept = |_: &str| true;
        assert!(check_safety(true, false, true, &mut accept).is_ok());
    }
}
