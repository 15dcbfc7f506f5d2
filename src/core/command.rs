use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Replay context captured when a command is first executed.
///
/// The context is logged next to the command and handed back verbatim on
/// replay, so commands that read wall-clock time or draw randomness stay
/// deterministic across recoveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Sequence number assigned to the command.
    pub seq: u64,
    /// Wall-clock time of the first (live) execution.
    pub executed_at: DateTime<Utc>,
    /// Unique id of the first execution; stable across replays.
    pub execution_id: Uuid,
}

impl ExecutionContext {
    pub(crate) fn assign(seq: u64) -> Self {
        Self {
            seq,
            executed_at: Utc::now(),
            execution_id: Uuid::new_v4(),
        }
    }

    /// Deterministic seed derived from the execution id.
    pub fn seed(&self) -> u64 {
        let bits = self.execution_id.as_u128();
        (bits >> 64) as u64 ^ bits as u64
    }
}

/// A mutating operation over the root that needs its replay context.
///
/// Implementations must be deterministic: applying the same command with the
/// same context to the same prior state always produces the same resulting
/// state and output. Domain failures belong in `Output` (e.g. a `Result`),
/// where they replay deterministically like any other value.
pub trait ContextCommand<R> {
    type Output;

    fn apply(&self, root: &mut R, ctx: &ExecutionContext) -> Self::Output;
}

/// A mutating operation over the root.
///
/// Every `Command` is also a [`ContextCommand`] that ignores the context;
/// implement exactly one of the two traits per command type.
pub trait Command<R> {
    type Output;

    fn apply(&self, root: &mut R) -> Self::Output;
}

impl<R, C: Command<R>> ContextCommand<R> for C {
    type Output = C::Output;

    fn apply(&self, root: &mut R, _ctx: &ExecutionContext) -> Self::Output {
        Command::apply(self, root)
    }
}
