//! Error types for references, the coupling model, and blocking waits.

use thiserror::Error;

/// Errors from parsing or constructing a [`Reference`](crate::Reference)
/// or [`Identifier`](crate::Identifier).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ReferenceError {
    /// The input text was empty.
    #[error("reference is empty")]
    Empty,
    /// A reference must begin with an identifier, not an index.
    #[error("reference '{text}' must start with an identifier")]
    MustStartWithIdentifier {
        /// The offending input.
        text: String,
    },
    /// An identifier contained characters outside `[A-Za-z0-9_]` or
    /// started with a digit.
    #[error("invalid identifier '{text}'")]
    InvalidIdentifier {
        /// The offending identifier text.
        text: String,
    },
    /// An index part was not a non-negative integer or was not closed.
    #[error("invalid index in reference '{text}'")]
    InvalidIndex {
        /// The full reference text.
        text: String,
    },
}

/// Errors detected while loading or validating a [`Model`](crate::Model).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The TOML input could not be parsed into a model.
    #[error("could not parse model: {reason}")]
    Parse {
        /// Parser diagnostic.
        reason: String,
    },
    /// A reference inside the model is malformed.
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    /// Two components share a name.
    #[error("duplicate component '{name}'")]
    DuplicateComponent {
        /// The repeated component name.
        name: String,
    },
    /// A component name contains index parts.
    #[error("component name '{name}' may not contain indices")]
    IndexedComponentName {
        /// The offending component name.
        name: String,
    },
    /// A multiplicity vector contains a zero-length dimension.
    #[error("component '{name}' has a zero-sized dimension in {multiplicity:?}")]
    EmptyDimension {
        /// The offending component.
        name: String,
        /// Its declared multiplicity.
        multiplicity: Vec<usize>,
    },
    /// A conduit endpoint is not of the form `component.port`.
    #[error("conduit endpoint '{endpoint}' is not of the form component.port")]
    MalformedConduit {
        /// The endpoint text.
        endpoint: String,
    },
    /// A conduit or resource entry names a component that is not declared.
    #[error("unknown component '{name}'")]
    UnknownComponent {
        /// The undeclared component name.
        name: String,
    },
    /// A conduit names a port the component does not declare, or uses it in
    /// the wrong direction.
    #[error("component '{component}' has no {direction} port '{port}'")]
    UnknownPort {
        /// The component.
        component: String,
        /// The port name.
        port: String,
        /// `"sending"` or `"receiving"`.
        direction: &'static str,
    },
    /// A resource requirement is malformed.
    #[error("invalid resource requirement: {reason}")]
    InvalidRequirement {
        /// Description of the problem.
        reason: String,
    },
}

/// A blocking wait was abandoned by its timeout handler.
///
/// Returned from [`TimeoutHandler::on_timeout`](crate::TimeoutHandler::on_timeout)
/// when the wait can never complete, e.g. because the waiter is part of a
/// detected deadlock.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("wait aborted: {reason}")]
pub struct WaitAborted {
    /// Why the wait was abandoned.
    pub reason: String,
}
