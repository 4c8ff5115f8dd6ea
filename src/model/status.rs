use crate::error::AppError;
use std::fmt::Display;
use std::str::FromStr;

/// A record status with a fixed set of legal transitions.
pub trait StatusFlow: Copy + PartialEq + Display + FromStr + 'static {
    /// Name used in error messages, e.g. "leave request".
    const RECORD: &'static str;

    fn next_states(self) -> &'static [Self];

    fn can_transition_to(self, next: Self) -> bool {
        self.next_states().contains(&next)
    }

    fn is_final(self) -> bool {
        self.next_states().is_empty()
    }

    /// Parses the stored status and checks that `next` is reachable from it.
    fn ensure_transition(current: &str, next: Self) -> Result<Self, AppError> {
        let current = Self::parse_stored(current)?;

        if !current.can_transition_to(next) {
            return Err(AppError::unprocessable(format!(
                "Cannot move {} from '{}' to '{}'",
                Self::RECORD,
                current,
                next
            )));
        }

        Ok(current)
    }

    fn parse_stored(raw: &str) -> Result<Self, AppError> {
        Self::from_str(raw).map_err(|_| {
            AppError::internal(format!("unknown {} status '{}'", Self::RECORD, raw))
        })
    }
}
