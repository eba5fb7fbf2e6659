//! Stream capabilities
//!
//! The session layer does not interpret media; it only stores the
//! capabilities the application configured and answers caps queries.

/// Capability descriptor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caps {
    /// Anything is accepted
    #[default]
    Any,
    /// A list of media type strings, in preference order
    Media(Vec<String>),
}

impl Caps {
    pub fn media<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Caps::Media(types.into_iter().map(Into::into).collect())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Caps::Any)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Caps::Media(types) if types.is_empty())
    }

    /// Intersect, keeping the order of `self`
    pub fn intersect_first(&self, other: &Caps) -> Caps {
        match (self, other) {
            (Caps::Any, other) => other.clone(),
            (this, Caps::Any) => this.clone(),
            (Caps::Media(ours), Caps::Media(theirs)) => Caps::Media(
                ours.iter()
                    .filter(|t| theirs.contains(t))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// Answer a caps query against the configured caps
    pub fn query(configured: Option<&Caps>, filter: Option<&Caps>) -> Caps {
        match (configured, filter) {
            (Some(caps), Some(filter)) => filter.intersect_first(caps),
            (Some(caps), None) => caps.clone(),
            (None, Some(filter)) => filter.clone(),
            (None, None) => Caps::Any,
        }
    }
}
