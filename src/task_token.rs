use std::fmt::{Debug, Display, Formatter};

/// Type-safe wrapper for the opaque credential the orchestration service hands out with each
/// activity task. Every service call made on behalf of the task carries it.
#[derive(Hash, Eq, PartialEq, Clone, derive_more::From, derive_more::Into)]
pub struct TaskToken(pub Vec<u8>);

impl Display for TaskToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&fmt_tt(&self.0))
    }
}

impl Debug for TaskToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("TaskToken({})", fmt_tt(&self.0)))
    }
}

/// Tokens are arbitrary bytes, so they are always rendered as base64 in logs
pub fn fmt_tt(tt: &[u8]) -> String {
    base64::encode(tt)
}
