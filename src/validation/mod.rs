//! The validator chain: an ordered list of row filters applied in sequence.
//!
//! The schema check always runs first; duplicate removal always runs last.

pub mod validators;

pub use validators::Validator;

use tracing::trace;

use crate::config::FarePolicy;
use crate::errors::PipelineError;
use crate::trip::Batch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorChain {
    validators: Vec<Validator>,
}

impl Default for ValidatorChain {
    fn default() -> Self {
        ValidatorChain::standard(FarePolicy::default())
    }
}

impl ValidatorChain {
    /// Every rule, in the canonical order.
    pub fn standard(fare_policy: FarePolicy) -> Self {
        ValidatorChain::new(vec![
            Validator::RequiredColumns,
            Validator::NoMissingValues,
            Validator::PositivePassengerCount,
            Validator::PositiveDistance,
            Validator::PositiveFare(fare_policy),
            Validator::NonNegativeTip,
            Validator::ValidDateRange,
            Validator::TripDuration,
            Validator::DropDuplicates,
        ])
    }

    pub fn new(validators: Vec<Validator>) -> Self {
        ValidatorChain { validators }
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Runs every validator over `batch`, stopping at the first schema error.
    pub fn apply(&self, batch: Batch) -> Result<Batch, PipelineError> {
        self.validators.iter().try_fold(batch, |batch, validator| {
            let before = batch.len();
            let after = validator.apply(batch)?;
            trace!(
                validator = validator.name(),
                rows_in = before,
                rows_out = after.len(),
                "Validator applied"
            );
            Ok(after)
        })
    }
}
