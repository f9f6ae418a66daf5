//! Engine error type.

use crate::dom::MarkupError;

/// Errors raised to callers.
///
/// Configuration problems found during a render pass (unknown directive,
/// recursion ceilings, broken parent chains) are logged instead and never
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bind attribute named a path or index instead of a bare variable.
    #[error("{name} expression is forbidden in {attr}, you can only use raw variable name")]
    ForbiddenBind { name: String, attr: String },
    /// A directive or injector tried to claim a bookkeeping attribute.
    #[error("`{0}` is a reserved attribute name")]
    ReservedName(String),
    #[error("invalid markup: {0}")]
    Markup(#[from] MarkupError),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Raised by a watcher or listener.
    #[error("{0}")]
    Callback(String),
}

impl Error {
    /// Error for watchers and listeners to return.
    pub fn callback(message: impl Into<String>) -> Self {
        Error::Callback(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = Error::ForbiddenBind {
            name: "user.name".into(),
            attr: "bbind".into(),
        };
        assert_eq!(
            err.to_string(),
            "user.name expression is forbidden in bbind, you can only use raw variable name"
        );
        assert_eq!(Error::ReservedName("bscope".into()).to_string(), "`bscope` is a reserved attribute name");
        assert_eq!(Error::callback("nope").to_string(), "nope");
    }

    #[test]
    fn markup_errors_convert() {
        let err: Error = crate::dom::parse_markup("<a></b>").err().unwrap().into();
        assert!(matches!(err, Error::Markup(_)));
    }
}
