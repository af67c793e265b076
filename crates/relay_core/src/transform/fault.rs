//! Fault-injection transform.

use std::thread;
use std::time::Duration;

use super::{Transform, TransformError, TransformOutput, TransformRequest};

/// Stage transform that always fails after a fixed delay.
///
/// Used to validate the controller's failure path without depending on
/// the real tool.
#[derive(Debug, Clone)]
pub struct FaultInjection {
    delay: Duration,
}

impl FaultInjection {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Transform for FaultInjection {
    fn name(&self) -> &str {
        "fault"
    }

    fn run(
        &self,
        request: &TransformRequest<'_>,
        _on_progress: &mut dyn FnMut(u8),
    ) -> Result<TransformOutput, TransformError> {
        thread::sleep(self.delay);
        Err(TransformError::Injected(format!(
            "Simulated failure in stage {}",
            request.stage
        )))
    }
}
