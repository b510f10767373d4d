//! Inputs of a dynamic instance and their TOML form

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;
use thiserror::Error;

use crate::artifact::ModuleRef;
use crate::context::{Context, Value};
use crate::resolver::{FixedRequestFactory, RemoteTemplateFactory, RequestOptions};
use crate::selector::DEFAULT_SELECTOR_PREFIX;

/// Errors that can occur when loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// The input set of one dynamic instance
///
/// Template sources are tried in order: `template`, `template_path`,
/// `template_url`.
#[derive(Clone, Default)]
pub struct DynamicInputs {
    pub template: Option<String>,
    pub template_path: Option<PathBuf>,
    pub template_url: Option<String>,
    /// Used when fetching `template_url` fails
    pub default_template: Option<String>,
    pub remote_factory: Option<Rc<dyn RemoteTemplateFactory>>,
    /// Loaded before resolution and appended to the imports
    pub lazy_modules: Vec<String>,
    /// Per-instance import modules
    pub modules: Vec<ModuleRef>,
    pub styles: Vec<String>,
    pub context: Option<Context>,
    /// `None` follows redirects without limit
    pub max_redirects: Option<usize>,
}

impl fmt::Debug for DynamicInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicInputs")
            .field("template", &self.template)
            .field("template_path", &self.template_path)
            .field("template_url", &self.template_url)
            .field("default_template", &self.default_template)
            .field("remote_factory", &self.remote_factory.is_some())
            .field("lazy_modules", &self.lazy_modules)
            .field("modules", &self.modules)
            .field("styles", &self.styles)
            .field("context", &self.context)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

impl DynamicInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn with_template_url(mut self, url: impl Into<String>) -> Self {
        self.template_url = Some(url.into());
        self
    }

    pub fn with_default_template(mut self, template: impl Into<String>) -> Self {
        self.default_template = Some(template.into());
        self
    }

    pub fn with_remote_factory(mut self, factory: Rc<dyn RemoteTemplateFactory>) -> Self {
        self.remote_factory = Some(factory);
        self
    }

    pub fn with_lazy_module(mut self, name: impl Into<String>) -> Self {
        self.lazy_modules.push(name.into());
        self
    }

    pub fn with_module(mut self, module: ModuleRef) -> Self {
        self.modules.push(module);
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.styles.push(style.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_max_redirects(mut self, limit: usize) -> Self {
        self.max_redirects = Some(limit);
        self
    }
}

/// TOML structure of a dynamic template configuration
///
/// ```toml
/// selector_prefix = "widget"
/// template_url = "https://example.test/card.html"
/// default_template = "<p>offline</p>"
/// styles = ["p { margin: 0 }"]
///
/// [context]
/// title = "Hello"
///
/// [remote]
/// with_credentials = false
/// headers = { Accept = "text/html" }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DynamicConfig {
    pub selector_prefix: Option<String>,
    pub template: Option<String>,
    pub template_path: Option<PathBuf>,
    pub template_url: Option<String>,
    pub default_template: Option<String>,
    pub lazy_modules: Vec<String>,
    /// Extra modules imported by every instance
    pub static_modules: Vec<String>,
    pub modules: Vec<String>,
    pub styles: Vec<String>,
    pub max_redirects: Option<usize>,
    pub context: BTreeMap<String, toml::Value>,
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub with_credentials: bool,
    pub headers: BTreeMap<String, String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            with_credentials: true,
            headers: BTreeMap::new(),
        }
    }
}

impl DynamicConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn selector_prefix(&self) -> &str {
        self.selector_prefix
            .as_deref()
            .unwrap_or(DEFAULT_SELECTOR_PREFIX)
    }

    pub fn static_modules(&self) -> Vec<ModuleRef> {
        self.static_modules.iter().map(ModuleRef::new).collect()
    }

    /// Convert into the input set of one instance
    pub fn to_inputs(&self) -> DynamicInputs {
        let context = if self.context.is_empty() {
            None
        } else {
            Some(
                self.context
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect::<Context>(),
            )
        };

        let remote_factory = self.remote.as_ref().map(|remote| {
            Rc::new(FixedRequestFactory {
                options: RequestOptions {
                    with_credentials: remote.with_credentials,
                    headers: remote
                        .headers
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                },
            }) as Rc<dyn RemoteTemplateFactory>
        });

        DynamicInputs {
            template: self.template.clone(),
            template_path: self.template_path.clone(),
            template_url: self.template_url.clone(),
            default_template: self.default_template.clone(),
            remote_factory,
            lazy_modules: self.lazy_modules.clone(),
            modules: self.modules.iter().map(ModuleRef::new).collect(),
            styles: self.styles.clone(),
            context,
            max_redirects: self.max_redirects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r##"
selector_prefix = "widget"
template_url = "https://example.test/card.html"
default_template = "<p>offline</p>"
lazy_modules = ["app/admin#AdminModule"]
static_modules = ["common"]
modules = ["charts"]
styles = ["p { margin: 0 }"]
max_redirects = 3

[context]
title = "Hello"
count = 2

[remote]
with_credentials = false
headers = { Accept = "text/html" }
"##;
        let config = DynamicConfig::from_str(toml_str).expect("Should parse");
        assert_eq!(config.selector_prefix(), "widget");
        assert_eq!(config.static_modules(), vec![ModuleRef::new("common")]);

        let inputs = config.to_inputs();
        assert_eq!(
            inputs.template_url.as_deref(),
            Some("https://example.test/card.html")
        );
        assert_eq!(inputs.modules, vec![ModuleRef::new("charts")]);
        assert_eq!(inputs.max_redirects, Some(3));

        let context = inputs.context.expect("context table present");
        assert_eq!(context.get("title"), Some(Value::from("Hello")));
        assert_eq!(context.get("count"), Some(Value::Number(2.0)));

        let options = inputs
            .remote_factory
            .expect("remote table present")
            .build_request_options();
        assert!(!options.with_credentials);
        assert_eq!(
            options.headers,
            vec![("Accept".to_string(), "text/html".to_string())]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DynamicConfig::from_str("").expect("Should parse");
        assert_eq!(config.selector_prefix(), DEFAULT_SELECTOR_PREFIX);
        let inputs = config.to_inputs();
        assert!(inputs.template.is_none());
        assert!(inputs.context.is_none());
        assert!(inputs.remote_factory.is_none());
    }

    #[test]
    fn test_invalid_toml_error() {
        let result = DynamicConfig::from_str("template = [unterminated");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_builder_pattern() {
        let inputs = DynamicInputs::new()
            .with_template("<p>x</p>")
            .with_style("p {}")
            .with_lazy_module("admin")
            .with_max_redirects(2);
        assert_eq!(inputs.template.as_deref(), Some("<p>x</p>"));
        assert_eq!(inputs.styles, vec!["p {}".to_string()]);
        assert_eq!(inputs.lazy_modules, vec!["admin".to_string()]);
        assert_eq!(inputs.max_redirects, Some(2));
    }
}
