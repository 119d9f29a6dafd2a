use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

use crate::error::MetapathError;

use super::StaticContextBuilder;
use super::static_context::LexicalName;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid static context configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Metapath(#[from] MetapathError),
}

/// Static context settings loadable from JSON.
///
/// ```json
/// {
///   "base-uri": "file:///catalog.json",
///   "default-model-namespace": "http://csrc.nist.gov/ns/oscal/1.0",
///   "namespaces": { "oscal": "http://csrc.nist.gov/ns/oscal/1.0" },
///   "variables": ["threshold", "Q{urn:x}limit"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct StaticContextConfig {
    pub base_uri: Option<String>,
    pub default_model_namespace: Option<String>,
    pub default_function_namespace: Option<String>,
    pub default_type_namespace: Option<String>,
    pub namespaces: HashMap<String, String>,
    /// Declared external variables, as local names or `Q{uri}local`.
    pub variables: Vec<String>,
}

impl StaticContextConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_builder(self) -> Result<StaticContextBuilder, ConfigError> {
        let mut builder = StaticContextBuilder::default();
        if let Some(uri) = self.base_uri {
            builder = builder.base_uri(uri);
        }
        if let Some(uri) = self.default_model_namespace {
            builder = builder.default_model_namespace(uri);
        }
        if let Some(uri) = self.default_function_namespace {
            builder = builder.default_function_namespace(uri);
        }
        if let Some(uri) = self.default_type_namespace {
            builder = builder.default_type_namespace(uri);
        }
        for (prefix, uri) in self.namespaces {
            builder = builder.namespace(prefix, uri);
        }
        for variable in &self.variables {
            let name = match LexicalName::parse(variable)? {
                LexicalName::Expanded(name) => name,
                LexicalName::Local(local) => metaschema_model::QName::local(local),
                LexicalName::Prefixed { .. } => {
                    return Err(MetapathError::syntax(format!(
                        "variable '{variable}' must be a local or Q{{uri}}local name"
                    ))
                    .into());
                }
            };
            builder = builder.declare_variable(name);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_model::QName;

    #[test]
    fn test_load_from_json() {
        let config = StaticContextConfig::from_json(
            r#"{
                "base-uri": "file:///a.json",
                "namespaces": { "ex": "urn:example" },
                "variables": ["limit", "Q{urn:example}max"]
            }"#,
        )
        .unwrap();
        let context = config.into_builder().unwrap().build();
        assert_eq!(context.base_uri(), Some("file:///a.json"));
        assert_eq!(context.namespace_for_prefix("ex"), Some("urn:example"));
        assert_eq!(context.namespace_for_prefix("meta"), Some(crate::namespaces::METAPATH_TYPES));
        assert!(context.is_declared_variable(&QName::local("limit")));
        assert!(context.is_declared_variable(&QName::namespaced("urn:example", "max")));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = StaticContextConfig::from_json(r#"{ "base_uri": "x" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_rejects_prefixed_variable() {
        let config = StaticContextConfig {
            variables: vec!["ex:v".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.into_builder(), Err(ConfigError::Metapath(_))));
    }
}
