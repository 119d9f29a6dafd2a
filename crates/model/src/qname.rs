use std::fmt;

/// An expanded qualified name: optional namespace URI plus local name.
///
/// Names compare case-sensitively on both parts; prefixes are a lexical
/// concern of expressions and are resolved before a `QName` is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Option<String>,
    local_name: String,
}

impl QName {
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(Into::<String>::into).filter(|ns| !ns.is_empty()),
            local_name: local_name.into(),
        }
    }

    /// A name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(Some(namespace), local_name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

/// Formats as `Q{namespace}local`, or just `local` when there is no namespace.
impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}
