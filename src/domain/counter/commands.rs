use super::value_objects::HistoryAction;

// ============================================================================
// Counter Commands - Represent user intent
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterCommand {
    Increment,
    Reset,
}

impl CounterCommand {
    /// Operation label used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            CounterCommand::Increment => "increment",
            CounterCommand::Reset => "reset",
        }
    }

    /// History action recorded when the command succeeds
    pub fn action(&self) -> HistoryAction {
        match self {
            CounterCommand::Increment => HistoryAction::Increment,
            CounterCommand::Reset => HistoryAction::Reset,
        }
    }
}
