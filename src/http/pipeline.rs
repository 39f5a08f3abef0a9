//! Request pipeline composition.
//!
//! The global stages are an explicit ordered list rather than nested
//! wrapping at the call site. The first stage listed is the outermost:
//!
//! ```text
//! RecoverPanic → RateLimit → Authenticate → router → (per-route gate) → handler
//! ```
//!
//! `RecoverPanic` must come first; the others may be omitted but never
//! reordered or repeated.

use std::sync::Arc;

use axum::{middleware, Router};
use thiserror::Error;

use crate::http::recover::recover_panic;
use crate::security::{authenticate, rate_limit, AuthState, RateLimiter};

/// Stage identity, ordered outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    RecoverPanic,
    RateLimit,
    Authenticate,
}

pub enum Stage {
    RecoverPanic,
    RateLimit(Arc<RateLimiter>),
    Authenticate(AuthState),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::RecoverPanic => StageKind::RecoverPanic,
            Stage::RateLimit(_) => StageKind::RateLimit,
            Stage::Authenticate(_) => StageKind::Authenticate,
        }
    }

    fn wrap(self, router: Router) -> Router {
        match self {
            Stage::RecoverPanic => router.layer(middleware::from_fn(recover_panic)),
            Stage::RateLimit(limiter) => {
                router.layer(middleware::from_fn_with_state(limiter, rate_limit))
            }
            Stage::Authenticate(auth) => {
                router.layer(middleware::from_fn_with_state(auth, authenticate))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("panic recovery must be the outermost stage, found {0:?}")]
    RecoveryNotOutermost(StageKind),

    #[error("stage {0:?} appears more than once")]
    Duplicate(StageKind),

    #[error("stage {found:?} cannot run inside {outer:?}")]
    OutOfOrder { outer: StageKind, found: StageKind },
}

#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn recover_panic(self) -> Self {
        self.stage(Stage::RecoverPanic)
    }

    pub fn rate_limit(self, limiter: Arc<RateLimiter>) -> Self {
        self.stage(Stage::RateLimit(limiter))
    }

    pub fn authenticate(self, auth: AuthState) -> Self {
        self.stage(Stage::Authenticate(auth))
    }

    pub fn build(self) -> Result<Pipeline, PipelineError> {
        let first = self.stages.first().ok_or(PipelineError::Empty)?;
        if first.kind() != StageKind::RecoverPanic {
            return Err(PipelineError::RecoveryNotOutermost(first.kind()));
        }

        for pair in self.stages.windows(2) {
            let (outer, inner) = (pair[0].kind(), pair[1].kind());
            if outer == inner {
                return Err(PipelineError::Duplicate(inner));
            }
            if outer > inner {
                return Err(PipelineError::OutOfOrder { outer, found: inner });
            }
        }

        Ok(Pipeline { stages: self.stages })
    }
}

/// A validated, ordered list of global stages.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Panic recovery, rate limiting, then authentication.
    pub fn standard(limiter: Arc<RateLimiter>, auth: AuthState) -> Self {
        Pipeline {
            stages: vec![
                Stage::RecoverPanic,
                Stage::RateLimit(limiter),
                Stage::Authenticate(auth),
            ],
        }
    }

    pub fn stages(&self) -> Vec<StageKind> {
        self.stages.iter().map(Stage::kind).collect()
    }

    /// Wrap `router` so the first stage runs first. Add every route and
    /// fallback before calling this; later additions bypass the stages.
    pub fn wrap(self, router: Router) -> Router {
        self.stages
            .into_iter()
            .rev()
            .fold(router, |router, stage| stage.wrap(router))
    }
}
