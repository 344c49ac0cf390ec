mod rules;
mod validator;

use crate::error::ValidationError;
use crate::types::Sequence;
use validator::Validator;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Sequence {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_sequence(self)
    }
}

/// Structural checks that need no registry or network: every violation is
/// collected before returning.
pub fn validate_sequence(sequence: &Sequence) -> Result<(), ValidationError> {
    let mut v = Validator::new();
    v.validate_sequence(sequence);
    v.finish()
}
