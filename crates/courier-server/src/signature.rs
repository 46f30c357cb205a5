//! Method parameter descriptors.
//!
//! Methods are called with named arguments only. A [`Signature`] lists the
//! names a method declares, which of them have defaults and whether extra
//! names are accepted. It is built once when the method is registered.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use courier_protocol::REQUEST_PARAM;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub has_default: bool,
}

/// Declared parameters of a method.
///
/// ```rust
/// use courier_server::Signature;
///
/// let signature = Signature::new().required("a").optional("b");
/// assert!(signature.check_call(["a"], []).is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
    accepts_extra: bool,
    bound: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter without a default.
    #[must_use]
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            has_default: false,
        });
        self
    }

    /// Declares a parameter with a default.
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            has_default: true,
        });
        self
    }

    /// Accepts any number of undeclared names.
    #[must_use]
    pub fn accepts_extra(mut self) -> Self {
        self.accepts_extra = true;
        self
    }

    /// Marks the first declared parameter as the receiver.
    ///
    /// The receiver is never supplied by a call and is ignored everywhere.
    #[must_use]
    pub fn bound(mut self) -> Self {
        self.bound = true;
        self
    }

    /// Declared parameters, receiver excluded.
    pub fn params(&self) -> &[Param] {
        match (self.bound, self.params.split_first()) {
            (true, Some((_, rest))) => rest,
            _ => &self.params,
        }
    }

    pub fn declares(&self, name: &str) -> bool {
        self.params().iter().any(|p| p.name == name)
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params().iter().find(|p| p.name == name)
    }

    pub fn has_extra(&self) -> bool {
        self.accepts_extra
    }

    /// Checks whether a call supplying `supplied` names fits this signature
    /// when the host provides `context` names.
    ///
    /// Context names and the request-injection name are never expected from
    /// the caller. Missing names are reported before unexpected ones.
    pub fn check_call<'a>(
        &self,
        supplied: impl IntoIterator<Item = &'a str>,
        context: impl IntoIterator<Item = &'a str>,
    ) -> CallCheck {
        let supplied: BTreeSet<&str> = supplied.into_iter().collect();
        let mut reserved: HashSet<&str> = context.into_iter().collect();
        reserved.insert(REQUEST_PARAM);

        let missing = names(
            self.params()
                .iter()
                .filter(|p| !p.has_default)
                .map(|p| p.name.as_str())
                .filter(|n| !reserved.contains(n) && !supplied.contains(n)),
        );
        if !missing.is_empty() {
            return CallCheck::Missing(missing);
        }

        if self.accepts_extra {
            let unavailable = names(supplied.iter().copied().filter(|n| reserved.contains(n)));
            if !unavailable.is_empty() {
                return CallCheck::Unavailable(unavailable);
            }
        } else {
            let unexpected = names(
                supplied
                    .iter()
                    .copied()
                    .filter(|n| reserved.contains(n) || !self.declares(n)),
            );
            if !unexpected.is_empty() {
                return CallCheck::Unexpected(unexpected);
            }
        }

        CallCheck::Ok
    }
}

fn names<'a>(iter: impl Iterator<Item = &'a str>) -> Vec<String> {
    iter.collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Result of [`Signature::check_call`]. Name lists are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCheck {
    Ok,
    /// Required names the call does not supply.
    Missing(Vec<String>),
    /// Names the method does not declare.
    Unexpected(Vec<String>),
    /// Names reserved for the host, supplied to a method with an open sink.
    Unavailable(Vec<String>),
}

impl CallCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Human-readable reason the call does not fit, if it does not.
    pub fn explanation(&self) -> Option<String> {
        match self {
            Self::Ok => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for CallCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, names) = match self {
            Self::Ok => return f.write_str("ok"),
            Self::Missing(names) => ("Missing", names),
            Self::Unexpected(names) => ("Unexpected", names),
            Self::Unavailable(names) => ("Unavailable", names),
        };
        write!(f, "{label} arguments: {}", names.join(", "))
    }
}
