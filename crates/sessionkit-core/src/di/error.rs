use thiserror::Error;

/// Errors raised while resolving a handler's dependencies.
///
/// Ported from melobot's `DependInitError` (construction-time) and
/// `DependNotMatched` (per-call, recoverable — the dispatcher is expected
/// to treat it as "this handler doesn't apply, try the next one" rather
/// than a fatal error).
#[derive(Debug, Error, Clone)]
pub enum DiError {
    #[error("failed to initialize dependency: {0}")]
    Init(String),

    #[error("failed to bind dependency: {0}")]
    Bind(String),

    #[error(
        "dependency not matched in `{func_name}` for argument `{arg_name}`: value has type \
         `{real_type}`, handler expects `{hint}`"
    )]
    NotMatched { func_name: String, arg_name: String, real_type: String, hint: String },
}

impl DiError {
    pub fn init(msg: impl Into<String>) -> Self {
        DiError::Init(msg.into())
    }

    pub fn bind(msg: impl Into<String>) -> Self {
        DiError::Bind(msg.into())
    }

    pub fn not_matched(
        func_name: impl Into<String>,
        arg_name: impl Into<String>,
        real_type: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        DiError::NotMatched {
            func_name: func_name.into(),
            arg_name: arg_name.into(),
            real_type: real_type.into(),
            hint: hint.into(),
        }
    }
}
