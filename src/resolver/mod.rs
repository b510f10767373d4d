//! Template source resolution
//!
//! Turns the inputs of a dynamic instance into one concrete template source.
//! Lazy modules are loaded first; the source is then chosen by priority:
//! inline text, template path, remote URL, nothing.

mod loader;
mod remote;

pub use loader::{LoadError, ModuleLoader, StaticModuleLoader};
pub use remote::{
    FixedRequestFactory, HttpClient, RemoteTemplateFactory, RequestOptions, Response,
    TransportError, REDIRECT_STATUSES,
};

use std::rc::Rc;

use futures_util::future;
use log::{debug, warn};
use thiserror::Error;

use crate::artifact::{ArtifactBuilder, ContainerArtifact, ImportLists, ModuleRef, TemplateSource};
use crate::config::DynamicInputs;

/// Errors that can occur while resolving a template source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A lazy module failed to load
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Redirect status without a `Location` header
    #[error("redirect ({status}) from {url} has no Location header")]
    MissingLocation { url: String, status: u16 },

    /// The configured redirect limit was exceeded
    #[error("more than {limit} redirects while fetching {url}")]
    TooManyRedirects { url: String, limit: usize },
}

/// A resolved source together with the lazily loaded modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub source: TemplateSource,
    pub lazy_modules: Vec<ModuleRef>,
}

#[derive(Clone)]
pub struct TemplateResolver {
    loader: Rc<dyn ModuleLoader>,
    http: Rc<dyn HttpClient>,
}

impl TemplateResolver {
    pub fn new(loader: Rc<dyn ModuleLoader>, http: Rc<dyn HttpClient>) -> Self {
        Self { loader, http }
    }

    /// Resolve and wrap the template into a container artifact
    pub async fn resolve(
        &self,
        inputs: &DynamicInputs,
        builder: &ArtifactBuilder<'_>,
        static_modules: &[ModuleRef],
    ) -> Result<ContainerArtifact, ResolveError> {
        let resolved = self.resolve_source(inputs).await?;
        Ok(builder.build(
            &resolved.source,
            ImportLists {
                static_modules,
                instance_modules: &inputs.modules,
                lazy_modules: &resolved.lazy_modules,
            },
        ))
    }

    /// Load lazy modules, then pick and resolve the template source
    ///
    /// A remote source always comes back as `Inline`: either the fetched
    /// text or, when the transport fails, the default template.
    pub async fn resolve_source(
        &self,
        inputs: &DynamicInputs,
    ) -> Result<ResolvedTemplate, ResolveError> {
        let lazy_modules = self.load_lazy_modules(&inputs.lazy_modules).await?;

        let source = if let Some(template) = &inputs.template {
            debug!("using inline template");
            TemplateSource::Inline(template.clone())
        } else if let Some(path) = &inputs.template_path {
            debug!("using template path {}", path.display());
            TemplateSource::PathRef(path.clone())
        } else if let Some(url) = &inputs.template_url {
            TemplateSource::Inline(self.fetch_remote(url, inputs).await?)
        } else {
            debug!("no template source given");
            TemplateSource::None
        };

        Ok(ResolvedTemplate {
            source,
            lazy_modules,
        })
    }

    async fn load_lazy_modules(&self, names: &[String]) -> Result<Vec<ModuleRef>, ResolveError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        debug!("loading lazy modules: {}", names.join(", "));
        let loads = names.iter().map(|name| self.loader.load(name));
        let modules = future::join_all(loads)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(modules)
    }

    async fn fetch_remote(&self, url: &str, inputs: &DynamicInputs) -> Result<String, ResolveError> {
        let factory = inputs.remote_factory.as_ref();
        let mut url = url.to_string();
        let mut redirects = 0usize;

        loop {
            let options = factory
                .map(|f| f.build_request_options())
                .unwrap_or_default();

            debug!("fetching remote template {}", url);
            let response = match self.http.get(&url, &options).await {
                Ok(response) => response,
                Err(err) => {
                    warn!("{}; falling back to default template", err);
                    return Ok(inputs.default_template.clone().unwrap_or_default());
                }
            };

            if !response.is_redirect() {
                return Ok(match factory {
                    Some(f) => f.parse_response(&response),
                    None => response.text().to_string(),
                });
            }

            let Some(location) = response.header("Location") else {
                return Err(ResolveError::MissingLocation {
                    url,
                    status: response.status,
                });
            };

            redirects += 1;
            if let Some(limit) = inputs.max_redirects {
                if redirects > limit {
                    return Err(ResolveError::TooManyRedirects { url, limit });
                }
            }
            debug!("following {} redirect to {}", response.status, location);
            url = location.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use futures_util::future::{FutureExt, LocalBoxFuture};
    use pretty_assertions::assert_eq;

    use crate::hash::Fnv1a32;

    /// Replays queued results and records requested URLs
    #[derive(Default)]
    struct ScriptedHttp {
        replies: RefCell<VecDeque<Result<Response, TransportError>>>,
        requests: RefCell<Vec<(String, RequestOptions)>>,
    }

    impl ScriptedHttp {
        fn reply(self, reply: Result<Response, TransportError>) -> Self {
            self.replies.borrow_mut().push_back(reply);
            self
        }
    }

    impl HttpClient for ScriptedHttp {
        fn get(
            &self,
            url: &str,
            options: &RequestOptions,
        ) -> LocalBoxFuture<'static, Result<Response, TransportError>> {
            self.requests
                .borrow_mut()
                .push((url.to_string(), options.clone()));
            let reply = self.replies.borrow_mut().pop_front().unwrap_or_else(|| {
                Err(TransportError {
                    url: url.to_string(),
                    message: "no scripted reply".to_string(),
                })
            });
            future::ready(reply).boxed_local()
        }
    }

    fn resolver(http: ScriptedHttp) -> (TemplateResolver, Rc<ScriptedHttp>) {
        let http = Rc::new(http);
        let loader = Rc::new(StaticModuleLoader::permissive());
        (TemplateResolver::new(loader, http.clone()), http)
    }

    fn offline(url: &str) -> Result<Response, TransportError> {
        Err(TransportError {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })
    }

    #[tokio::test]
    async fn test_inline_template_wins() {
        let (resolver, http) = resolver(ScriptedHttp::default());
        let inputs = DynamicInputs::new()
            .with_template("<p>inline</p>")
            .with_template_path("a.html")
            .with_template_url("https://example.test/a");

        let resolved = resolver.resolve_source(&inputs).await.expect("resolves");
        assert_eq!(resolved.source, TemplateSource::Inline("<p>inline</p>".into()));
        assert!(http.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_path_before_url() {
        let (resolver, _) = resolver(ScriptedHttp::default());
        let inputs = DynamicInputs::new()
            .with_template_path("a.html")
            .with_template_url("https://example.test/a");

        let resolved = resolver.resolve_source(&inputs).await.expect("resolves");
        assert_eq!(resolved.source, TemplateSource::PathRef("a.html".into()));
    }

    #[tokio::test]
    async fn test_no_source() {
        let (resolver, _) = resolver(ScriptedHttp::default());
        let resolved = resolver
            .resolve_source(&DynamicInputs::new())
            .await
            .expect("resolves");
        assert_eq!(resolved.source, TemplateSource::None);
    }

    #[tokio::test]
    async fn test_remote_template_uses_response_text() {
        let (resolver, http) =
            resolver(ScriptedHttp::default().reply(Ok(Response::new(200, "<p>remote</p>"))));
        let inputs = DynamicInputs::new().with_template_url("https://example.test/a");

        let resolved = resolver.resolve_source(&inputs).await.expect("resolves");
        assert_eq!(resolved.source, TemplateSource::Inline("<p>remote</p>".into()));

        let requests = http.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.with_credentials);
    }

    #[tokio::test]
    async fn test_redirect_is_followed() {
        let (resolver, http) = resolver(
            ScriptedHttp::default()
                .reply(Ok(
                    Response::new(302, "").with_header("Location", "https://example.test/b")
                ))
                .reply(Ok(Response::new(200, "<p>b</p>"))),
        );
        let inputs = DynamicInputs::new().with_template_url("https://example.test/a");

        let resolved = resolver.resolve_source(&inputs).await.expect("resolves");
        assert_eq!(resolved.source, TemplateSource::Inline("<p>b</p>".into()));

        let urls: Vec<String> = http.requests.borrow().iter().map(|(u, _)| u.clone()).collect();
        assert_eq!(urls, vec!["https://example.test/a", "https://example.test/b"]);
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_an_error() {
        let (resolver, _) = resolver(ScriptedHttp::default().reply(Ok(Response::new(301, ""))));
        let inputs = DynamicInputs::new().with_template_url("https://example.test/a");

        let result = resolver.resolve_source(&inputs).await;
        assert_eq!(
            result,
            Err(ResolveError::MissingLocation {
                url: "https://example.test/a".to_string(),
                status: 301
            })
        );
    }

    #[tokio::test]
    async fn test_redirect_limit() {
        let hop = || Ok(Response::new(307, "").with_header("Location", "https://example.test/loop"));
        let (resolver, _) = resolver(ScriptedHttp::default().reply(hop()).reply(hop()).reply(hop()));
        let inputs = DynamicInputs::new()
            .with_template_url("https://example.test/loop")
            .with_max_redirects(2);

        let result = resolver.resolve_source(&inputs).await;
        assert!(matches!(
            result,
            Err(ResolveError::TooManyRedirects { limit: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back_to_default() {
        let (resolver, _) = resolver(ScriptedHttp::default().reply(offline("https://example.test/a")));
        let inputs = DynamicInputs::new()
            .with_template_url("https://example.test/a")
            .with_default_template("<p>offline</p>");

        let resolved = resolver.resolve_source(&inputs).await.expect("failure is absorbed");
        assert_eq!(resolved.source, TemplateSource::Inline("<p>offline</p>".into()));
    }

    #[tokio::test]
    async fn test_transport_failure_without_default_is_empty() {
        let (resolver, _) = resolver(ScriptedHttp::default().reply(offline("https://example.test/a")));
        let inputs = DynamicInputs::new().with_template_url("https://example.test/a");

        let resolved = resolver.resolve_source(&inputs).await.expect("failure is absorbed");
        assert_eq!(resolved.source, TemplateSource::Inline(String::new()));
    }

    struct UpperCaseFactory;

    impl RemoteTemplateFactory for UpperCaseFactory {
        fn build_request_options(&self) -> RequestOptions {
            RequestOptions {
                with_credentials: false,
                headers: vec![("Accept".into(), "text/html".into())],
            }
        }

        fn parse_response(&self, response: &Response) -> String {
            response.text().to_uppercase()
        }
    }

    #[tokio::test]
    async fn test_remote_factory_customizes_request_and_parsing() {
        let (resolver, http) =
            resolver(ScriptedHttp::default().reply(Ok(Response::new(200, "<p>x</p>"))));
        let inputs = DynamicInputs::new()
            .with_template_url("https://example.test/a")
            .with_remote_factory(Rc::new(UpperCaseFactory));

        let resolved = resolver.resolve_source(&inputs).await.expect("resolves");
        assert_eq!(resolved.source, TemplateSource::Inline("<P>X</P>".into()));
        assert!(!http.requests.borrow()[0].1.with_credentials);
    }

    #[tokio::test]
    async fn test_lazy_modules_are_loaded_in_order() {
        let (resolver, _) = resolver(ScriptedHttp::default());
        let inputs = DynamicInputs::new()
            .with_template("<p/>")
            .with_lazy_module("a#AModule")
            .with_lazy_module("b#BModule");

        let resolved = resolver.resolve_source(&inputs).await.expect("resolves");
        assert_eq!(
            resolved.lazy_modules,
            vec![ModuleRef::new("AModule"), ModuleRef::new("BModule")]
        );
    }

    #[tokio::test]
    async fn test_lazy_module_failure_propagates() {
        let http = Rc::new(ScriptedHttp::default());
        let resolver = TemplateResolver::new(Rc::new(StaticModuleLoader::new()), http);
        let inputs = DynamicInputs::new().with_lazy_module("missing");

        let result = resolver.resolve_source(&inputs).await;
        assert!(matches!(result, Err(ResolveError::Load(LoadError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn test_resolve_builds_container() {
        let (resolver, _) = resolver(ScriptedHttp::default());
        let inputs = DynamicInputs::new()
            .with_template("<p/>")
            .with_module(ModuleRef::new("charts"))
            .with_lazy_module("admin");
        let styles = Vec::new();
        let builder = ArtifactBuilder::new("dyn-9", &styles, &Fnv1a32);

        let artifact = resolver
            .resolve(&inputs, &builder, &[ModuleRef::new("common")])
            .await
            .expect("resolves");
        assert_eq!(
            artifact.imports,
            vec![
                ModuleRef::new("common"),
                ModuleRef::new("charts"),
                ModuleRef::new("admin")
            ]
        );
        assert!(artifact.content_hash().is_some());
    }
}
