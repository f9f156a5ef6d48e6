use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{JoinError, JoinResult};

/// Cooperative cancellation shared by the tasks of one run.
///
/// The first task that fails raises the flag; the others observe it between records and stop with
/// [`JoinError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Return `Err(Cancelled)` once the flag is raised.
    pub fn check(&self) -> JoinResult<()> {
        if self.is_cancelled() {
            Err(JoinError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Raise the flag if `result` is an error, then pass it through.
    pub fn observe<T>(&self, result: JoinResult<T>) -> JoinResult<T> {
        if result.is_err() {
            self.cancel();
        }
        result
    }
}

/// Collect the results of one fan-out.
///
/// Returns the first root-cause error by task index; [`JoinError::Cancelled`] is only reported when
/// no task failed for another reason.
pub fn first_error<T>(results: Vec<JoinResult<T>>) -> JoinResult<Vec<T>> {
    let mut out = Vec::with_capacity(results.len());
    let mut cancelled = false;
    let mut root: Option<JoinError> = None;
    for r in results {
        match r {
            Ok(v) => out.push(v),
            Err(JoinError::Cancelled) => cancelled = true,
            Err(e) => {
                if root.is_none() {
                    root = Some(e);
                }
            }
        }
    }
    match root {
        Some(e) => Err(e),
        None if cancelled => Err(JoinError::Cancelled),
        None => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::{first_error, Cancellation};
    use crate::error::JoinError;

    #[test]
    fn observe_raises_flag_on_error() {
        let c = Cancellation::new();
        assert!(c.check().is_ok());
        let _ = c.observe::<()>(Err(JoinError::config("boom")));
        assert!(c.is_cancelled());
        assert!(matches!(c.check(), Err(JoinError::Cancelled)));
    }

    #[test]
    fn first_error_prefers_root_cause_over_cancellation() {
        let results: Vec<Result<u32, JoinError>> = vec![
            Ok(1),
            Err(JoinError::Cancelled),
            Err(JoinError::schema("root")),
            Err(JoinError::config("later")),
        ];
        let err = first_error(results).unwrap_err();
        assert!(matches!(err, JoinError::Schema { .. }));
    }

    #[test]
    fn first_error_keeps_order_on_success() {
        let results: Vec<Result<u32, JoinError>> = vec![Ok(3), Ok(1), Ok(2)];
        assert_eq!(first_error(results).unwrap(), vec![3, 1, 2]);
    }
}
