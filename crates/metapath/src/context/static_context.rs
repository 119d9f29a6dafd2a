use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metaschema_model::QName;

use crate::error::{ErrorCode, MetapathError};
use crate::functions::FunctionLibrary;
use crate::namespaces;

/// Compile-time environment of an expression. Immutable once built.
#[derive(Debug, Clone)]
pub struct StaticContext {
    base_uri: Option<String>,
    default_model_namespace: Option<String>,
    default_function_namespace: String,
    default_type_namespace: String,
    namespaces: HashMap<String, String>,
    variables: HashSet<QName>,
    function_library: Arc<FunctionLibrary>,
}

/// The three lexical forms a name can take in expression text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexicalName<'t> {
    /// `Q{uri}local`
    Expanded(QName),
    Prefixed { prefix: &'t str, local: &'t str },
    Local(&'t str),
}

impl<'t> LexicalName<'t> {
    pub fn parse(text: &'t str) -> Result<Self, MetapathError> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix("Q{") {
            let (uri, local) = rest
                .split_once('}')
                .ok_or_else(|| MetapathError::syntax(format!("unterminated braced URI in '{text}'")))?;
            if local.is_empty() {
                return Err(MetapathError::syntax(format!("missing local name in '{text}'")));
            }
            return Ok(LexicalName::Expanded(QName::new(Some(uri), local)));
        }
        match text.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
                Ok(LexicalName::Prefixed { prefix, local })
            }
            Some(_) => Err(MetapathError::syntax(format!("malformed name '{text}'"))),
            None if text.is_empty() => Err(MetapathError::syntax("empty name")),
            None => Ok(LexicalName::Local(text)),
        }
    }
}

impl Default for StaticContext {
    fn default() -> Self {
        StaticContextBuilder::default().build()
    }
}

impl StaticContext {
    pub fn builder() -> StaticContextBuilder {
        StaticContextBuilder::default()
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    pub fn default_model_namespace(&self) -> Option<&str> {
        self.default_model_namespace.as_deref()
    }

    pub fn default_function_namespace(&self) -> &str {
        &self.default_function_namespace
    }

    pub fn default_type_namespace(&self) -> &str {
        &self.default_type_namespace
    }

    pub fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    pub fn function_library(&self) -> &FunctionLibrary {
        &self.function_library
    }

    /// True for variables declared as externally supplied.
    pub fn is_declared_variable(&self, name: &QName) -> bool {
        self.variables.contains(name)
    }

    /// Expands a lexical name, using `default_namespace` for unprefixed names.
    pub fn expand_name(
        &self,
        lexical: &str,
        default_namespace: Option<&str>,
    ) -> Result<QName, MetapathError> {
        match LexicalName::parse(lexical)? {
            LexicalName::Expanded(name) => Ok(name),
            LexicalName::Local(local) => Ok(QName::new(default_namespace, local)),
            LexicalName::Prefixed { prefix, local } => {
                let namespace = self.namespace_for_prefix(prefix).ok_or_else(|| {
                    MetapathError::static_error(
                        ErrorCode::XPST0081,
                        format!("namespace prefix '{prefix}' is not bound"),
                    )
                })?;
                Ok(QName::namespaced(namespace, local))
            }
        }
    }

    /// Names in path steps and kind tests.
    pub fn expand_model_name(&self, lexical: &str) -> Result<QName, MetapathError> {
        self.expand_name(lexical, self.default_model_namespace())
    }

    pub fn expand_function_name(&self, lexical: &str) -> Result<QName, MetapathError> {
        self.expand_name(lexical, Some(self.default_function_namespace()))
    }

    pub fn expand_type_name(&self, lexical: &str) -> Result<QName, MetapathError> {
        self.expand_name(lexical, Some(self.default_type_namespace()))
    }

    /// Unprefixed variable names are in no namespace.
    pub fn expand_variable_name(&self, lexical: &str) -> Result<QName, MetapathError> {
        self.expand_name(lexical, None)
    }
}

/// Builds a [`StaticContext`]. Well-known prefixes are bound up front and may
/// be overridden.
#[derive(Debug, Clone)]
pub struct StaticContextBuilder {
    base_uri: Option<String>,
    default_model_namespace: Option<String>,
    default_function_namespace: String,
    default_type_namespace: String,
    namespaces: HashMap<String, String>,
    variables: HashSet<QName>,
    function_library: Option<Arc<FunctionLibrary>>,
}

impl Default for StaticContextBuilder {
    fn default() -> Self {
        Self {
            base_uri: None,
            default_model_namespace: None,
            default_function_namespace: namespaces::FUNCTIONS.to_string(),
            default_type_namespace: namespaces::METAPATH_TYPES.to_string(),
            namespaces: namespaces::WELL_KNOWN_PREFIXES
                .iter()
                .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
                .collect(),
            variables: HashSet::new(),
            function_library: None,
        }
    }
}

impl StaticContextBuilder {
    pub fn base_uri(mut self, uri: impl Into<String>) -> Self {
        self.base_uri = Some(uri.into());
        self
    }

    pub fn default_model_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_model_namespace = Some(uri.into());
        self
    }

    pub fn default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_function_namespace = uri.into();
        self
    }

    pub fn default_type_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_type_namespace = uri.into();
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Declares a variable whose value the dynamic context supplies.
    pub fn declare_variable(mut self, name: QName) -> Self {
        self.variables.insert(name);
        self
    }

    pub fn function_library(mut self, library: Arc<FunctionLibrary>) -> Self {
        self.function_library = Some(library);
        self
    }

    pub fn build(self) -> StaticContext {
        StaticContext {
            base_uri: self.base_uri,
            default_model_namespace: self.default_model_namespace,
            default_function_namespace: self.default_function_namespace,
            default_type_namespace: self.default_type_namespace,
            namespaces: self.namespaces,
            variables: self.variables,
            function_library: self
                .function_library
                .unwrap_or_else(FunctionLibrary::standard),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_prefixes() {
        let context = StaticContext::default();
        assert_eq!(
            context.expand_type_name("meta:string").unwrap(),
            QName::namespaced(namespaces::METAPATH_TYPES, "string")
        );
        assert_eq!(
            context.expand_function_name("count").unwrap(),
            QName::namespaced(namespaces::FUNCTIONS, "count")
        );
        assert_eq!(
            context.expand_function_name("map:get").unwrap().namespace(),
            Some(namespaces::MAP_FUNCTIONS)
        );
    }

    #[test]
    fn test_unbound_prefix_is_static_error() {
        let err = StaticContext::default().expand_model_name("oscal:catalog").unwrap_err();
        assert_eq!(err.code(), ErrorCode::XPST0081);
        assert!(err.is_static());
    }

    #[test]
    fn test_expanded_and_default_names() {
        let context = StaticContext::builder()
            .default_model_namespace("http://example.com/ns")
            .namespace("ex", "http://example.com/other")
            .build();
        assert_eq!(
            context.expand_model_name("item").unwrap(),
            QName::namespaced("http://example.com/ns", "item")
        );
        assert_eq!(
            context.expand_model_name("ex:item").unwrap(),
            QName::namespaced("http://example.com/other", "item")
        );
        assert_eq!(
            context.expand_model_name("Q{urn:x}item").unwrap(),
            QName::namespaced("urn:x", "item")
        );
        assert_eq!(
            context.expand_variable_name("v").unwrap(),
            QName::local("v")
        );
    }

    #[test]
    fn test_malformed_lexical_names() {
        assert!(LexicalName::parse("a:").is_err());
        assert!(LexicalName::parse("Q{urn:x").is_err());
        assert!(LexicalName::parse("").is_err());
    }
}
