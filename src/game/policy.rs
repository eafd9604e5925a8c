//! Model-backed policy seam
//!
//! The engine ships no inference runtime. A backend maps a flattened
//! observation to at least three floats `[dx, dy, action_type]`.

use thiserror::Error;

use crate::game::action::Action;
use crate::game::observation::{PlayerState, FEATURE_LEN};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("inference backend failed: {0}")]
    Backend(String),
    #[error("expected at least {expected} outputs, got {got}")]
    ShortOutput { expected: usize, got: usize },
    #[error("non-finite value at output {0}")]
    NonFinite(usize),
}

pub trait InferenceBackend: Send {
    fn infer(&mut self, features: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

impl<F> InferenceBackend for F
where
    F: FnMut(&[f32]) -> Result<Vec<f32>, InferenceError> + Send,
{
    fn infer(&mut self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        self(features)
    }
}

/// Wraps a backend and turns its raw output into an `Action`
pub struct ModelPolicy {
    backend: Box<dyn InferenceBackend>,
    calls: u64,
}

impl ModelPolicy {
    pub fn new(backend: impl InferenceBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn decide(&mut self, observation: &PlayerState) -> Result<Action, InferenceError> {
        let features = observation.to_features();
        debug_assert_eq!(features.len(), FEATURE_LEN);
        self.calls += 1;
        let output = self.backend.infer(&features)?;
        if output.len() < 3 {
            return Err(InferenceError::ShortOutput {
                expected: 3,
                got: output.len(),
            });
        }
        if let Some(idx) = output[..3].iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFinite(idx));
        }
        Ok(Action::from([output[0], output[1], output[2]]))
    }
}

impl std::fmt::Debug for ModelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelPolicy").field("calls", &self.calls).finish()
    }
}
