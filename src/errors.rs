use thiserror::Error;

/// Fatal errors that abort compilation. Per spec.md §7, only `IllegalConfig`
/// (programmer errors: malformed weight format, SRAM free of an unallocated
/// offset, undersized weight tile) and `CapabilityMismatch` (unknown
/// firmware capability header version) are represented this way.
///
/// `NoMceFound` and `StrategyInfeasible` are NOT variants here: they are
/// routine outcomes of pass building, not exceptional conditions, and are
/// represented as [`crate::pass::GreedyOutcome`] variants instead so the
/// driver loop can match on them without unwinding a `Result`.
#[derive(Error, Debug)]
pub enum PassError {
    #[error("illegal configuration: {0}")]
    IllegalConfig(String),
    #[error("capability header version mismatch: expected {expected}, found {found}")]
    CapabilityMismatch { expected: u32, found: u32 },
}

pub type PassResult<T> = Result<T, PassError>;
