use parking_lot::Mutex;

use crate::domain::{DeadLetterQueue, Error};

/// Logs rejected commands and keeps a count for the final report.
#[derive(Default, Debug)]
pub struct TracingDLQ {
    rejected: Mutex<usize>,
}

impl TracingDLQ {
    pub fn rejected(&self) -> usize {
        *self.rejected.lock()
    }
}

impl DeadLetterQueue for TracingDLQ {
    fn report(&self, error: &Error) {
        *self.rejected.lock() += 1;
        tracing::warn!(error = %error, retryable = error.is_retryable(), "command rejected");
    }
}
