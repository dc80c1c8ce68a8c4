//! Result reporter: the single chokepoint for subsystem call outcomes
//!
//! Every subsystem primitive goes through [`Reporter::invoke`] (or
//! [`Reporter::invoke_void`]), which logs the attempt and the outcome and turns
//! a non-success status into a fatal [`Error::SubsystemCall`].

use crate::error::{Error, Result};
use crate::logging::LogStream;
use crate::subsystem::{ResultCode, SlResult};

#[derive(Debug, Clone)]
pub struct Reporter {
    log: LogStream,
}

impl Reporter {
    pub fn new(log: LogStream) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &LogStream {
        &self.log
    }

    /// Log the outcome of `operation`.
    ///
    /// # Errors
    /// [`Error::SubsystemCall`] for any non-success `code`.
    pub fn report(&self, operation: &str, code: ResultCode) -> Result<()> {
        if code.is_success() {
            self.log.line(format!("SUCCESS: {}()", operation));
            return Ok(());
        }

        Err(self.failure(operation, code))
    }

    fn failure(&self, operation: &str, code: ResultCode) -> Error {
        self.log.line(format!(
            "ERROR: Failure in {}(). Error code: {}",
            operation,
            code.label()
        ));
        Error::SubsystemCall {
            operation: operation.to_string(),
            code,
        }
    }

    /// Run one subsystem call and check its status
    pub fn invoke<T>(&self, operation: &str, call: impl FnOnce() -> SlResult<T>) -> Result<T> {
        self.log.line(format!("CALLING: {}()", operation));
        match call() {
            Ok(value) => {
                self.report(operation, ResultCode::Success)?;
                Ok(value)
            }
            Err(ResultCode::Success) => Err(Error::InvalidState(format!(
                "{}() failed without a failure status",
                operation
            ))),
            Err(code) => Err(self.failure(operation, code)),
        }
    }

    /// Run a subsystem call that has no status to check
    pub fn invoke_void(&self, operation: &str, call: impl FnOnce()) {
        self.log.line(format!("CALLING: {}()", operation));
        call();
        self.log.line(format!("SUCCESS: {}()", operation));
    }

    /// Log the reason a run is being abandoned
    pub fn aborted(&self, label: &str) {
        self.log.line(format!("ABORTED: {}", label));
    }
}
