use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Connect or write failed partway through a tick. `sent` is the number of
    /// lines fully written before the failure.
    #[error("{source}")]
    AttemptFailed {
        sent: usize,
        #[source]
        source: std::io::Error,
    },
}

impl SimulatorError {
    pub fn attempt(sent: usize, source: std::io::Error) -> Self {
        SimulatorError::AttemptFailed { sent, source }
    }

    pub fn sent(&self) -> usize {
        match self {
            SimulatorError::AttemptFailed { sent, .. } => *sent,
        }
    }
}
