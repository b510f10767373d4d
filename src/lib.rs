//! Dynamic Template - components compiled from templates at runtime
//!
//! A [`DynamicBase`] owns one slot in a host view. Each time its inputs
//! change it resolves a template (inline text, a file path or a remote URL),
//! wraps it in a container artifact, compiles it through a content-hash cache,
//! mounts the result and projects a context object onto the live component.
//!
//! # Example
//!
//! ```rust
//! use dynamic_template::{render, Context};
//!
//! let context = Context::new().with("name", "Ada");
//! let html = render("<p>Hello {{ name }}</p>", &context).unwrap();
//! assert_eq!(html, "<p>Hello Ada</p>");
//! ```

pub mod artifact;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod context;
pub mod dynamic;
pub mod error;
pub mod events;
pub mod hash;
pub mod lifecycle;
pub mod markup;
pub mod mount;
pub mod resolver;
pub mod selector;
pub mod transport;

pub use artifact::{ArtifactBuilder, ArtifactId, ContainerArtifact, ModuleRef, TemplateSource};
pub use cache::CompilationCache;
pub use compiler::{CompiledArtifact, Compiler, DynamicInstance};
pub use config::{ConfigError, DynamicConfig, DynamicInputs};
pub use context::{Callable, Context, ContextBinder, PropertyError, PropertyTable, Value};
pub use dynamic::{DynamicBase, HostServices};
pub use error::CompileError;
pub use hash::{hash_fnv32a, ContentHasher, Fnv1a32};
pub use lifecycle::{LifecycleError, LifecycleState};
pub use markup::MarkupCompiler;
pub use mount::{Injector, MemoryViewContainer, MountError, ViewContainer};
pub use resolver::{
    HttpClient, ModuleLoader, RemoteTemplateFactory, ResolveError, StaticModuleLoader,
};
pub use transport::{OfflineClient, ReqwestClient};

use std::rc::Rc;

use futures_util::FutureExt;
use thiserror::Error;

/// Errors that can end a build
#[derive(Debug, Clone, Error)]
pub enum DynamicError {
    /// Error while resolving the template source
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Error reported by the compiler service
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Error while mounting the compiled artifact
    #[error("mount error: {0}")]
    Mount(#[from] MountError),

    /// Event not allowed in the current lifecycle state
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Render an inline markup template against `context`
///
/// Runs one complete build of a throwaway [`DynamicBase`] and returns what
/// its view renders. Compilations land in the thread's shared cache, so
/// rendering the same text again skips the compiler.
///
/// # Example
///
/// ```rust
/// use dynamic_template::{render, Callable, Context, Value};
///
/// let shout = Callable::new(|args| match args.first() {
///     Some(v) => Value::String(v.to_string().to_uppercase()),
///     None => Value::Null,
/// });
/// let context = Context::new().with("shout", shout);
///
/// let html = render(r#"<b>{{ shout("hey") }}</b>"#, &context).unwrap();
/// assert_eq!(html, "<b>HEY</b>");
/// ```
pub fn render(template: &str, context: &Context) -> Result<String, DynamicError> {
    let container = Rc::new(MemoryViewContainer::new());
    let services = HostServices::new(
        Rc::new(MarkupCompiler::new()),
        Rc::new(StaticModuleLoader::permissive()),
        Rc::new(OfflineClient),
    );
    let dynamic = DynamicBase::new(services, container.clone());

    let inputs = DynamicInputs::new()
        .with_template(template)
        .with_context(context.clone());

    // Inline markup builds never wait on I/O
    match dynamic.on_changes(inputs).now_or_never() {
        Some(result) => {
            result?;
        }
        None => return Err(CompileError::failed("build did not complete").into()),
    }

    Ok(container.render())
}
