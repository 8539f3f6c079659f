//! Time value fields: the current time of an external time keeper.

use fieldgraph_core::{EvaluationError, FieldValue, Location, Managed, ManagedRef, TimeKeeper};
use tracing::warn;

use super::Evaluation;

/// Reads a [`TimeKeeper`] without owning it. The location's own time is
/// ignored; derivatives are zero.
#[derive(Debug, Clone)]
pub struct TimeValueCore {
    keeper: ManagedRef<TimeKeeper>,
}

impl TimeValueCore {
    pub fn new(keeper: &Managed<TimeKeeper>) -> Self {
        Self { keeper: keeper.weak() }
    }

    pub fn keeper_name(&self) -> String {
        self.keeper.name()
    }

    pub(crate) fn keeper(&self) -> &ManagedRef<TimeKeeper> {
        &self.keeper
    }

    pub(crate) fn evaluate(&self, eval: &Evaluation<'_>, location: &Location) -> Result<FieldValue, EvaluationError> {
        let Some(keeper) = self.keeper.upgrade() else {
            warn!(field = %eval.field_name(), time_keeper = %self.keeper_name(), "Time keeper no longer exists");
            return Err(eval.resource_unavailable(format!("time keeper '{}'", self.keeper_name())));
        };
        Ok(FieldValue::constant(vec![keeper.time()], location.number_of_derivatives()))
    }
}
