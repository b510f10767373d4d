//! Fakes shared by the integration tests

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures_channel::oneshot;
use futures_util::future::{self, FutureExt, LocalBoxFuture};

use dynamic_template::compiler::CompiledArtifact;
use dynamic_template::mount::HostView;
use dynamic_template::resolver::{RequestOptions, Response, TransportError};
use dynamic_template::{
    ArtifactId, CompilationCache, CompileError, Compiler, ContainerArtifact, DynamicBase,
    HostServices, HttpClient, MarkupCompiler, MemoryViewContainer, StaticModuleLoader,
    ViewContainer,
};

/// Markup compiler that counts calls and can hold results until released
#[derive(Default)]
pub struct TestCompiler {
    inner: MarkupCompiler,
    compiles: Cell<usize>,
    cleared: RefCell<Vec<ArtifactId>>,
    gated: bool,
    gates: RefCell<Vec<oneshot::Sender<()>>>,
}

impl TestCompiler {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Compilations stay pending until `release` is called
    pub fn gated() -> Rc<Self> {
        Rc::new(Self {
            gated: true,
            ..Self::default()
        })
    }

    pub fn release(&self) {
        for gate in self.gates.borrow_mut().drain(..) {
            let _ = gate.send(());
        }
    }

    pub fn compiles(&self) -> usize {
        self.compiles.get()
    }

    pub fn cleared(&self) -> Vec<ArtifactId> {
        self.cleared.borrow().clone()
    }
}

impl Compiler for TestCompiler {
    fn compile(
        &self,
        artifact: &ContainerArtifact,
    ) -> LocalBoxFuture<'static, Result<CompiledArtifact, CompileError>> {
        self.compiles.set(self.compiles.get() + 1);
        let result = self.inner.compile(artifact);
        if !self.gated {
            return result;
        }
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push(tx);
        async move {
            let _ = rx.await;
            result.await
        }
        .boxed_local()
    }

    fn clear_cache(&self, id: ArtifactId) {
        self.cleared.borrow_mut().push(id);
        self.inner.clear_cache(id);
    }
}

/// Compiler whose component factories match neither selector nor hash
#[derive(Default)]
pub struct ForeignCompiler {
    inner: MarkupCompiler,
}

impl Compiler for ForeignCompiler {
    fn compile(
        &self,
        artifact: &ContainerArtifact,
    ) -> LocalBoxFuture<'static, Result<CompiledArtifact, CompileError>> {
        let mut foreign = artifact.clone();
        foreign.component.selector = "foreign-component".to_string();
        foreign.component.content_hash = None;
        self.inner.compile(&foreign)
    }

    fn clear_cache(&self, id: ArtifactId) {
        self.inner.clear_cache(id);
    }
}

/// HTTP client answering from a fixed script and recording requests
#[derive(Default)]
pub struct ScriptedHttp {
    responses: RefCell<HashMap<String, Response>>,
    requests: RefCell<Vec<(String, RequestOptions)>>,
}

impl ScriptedHttp {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.responses.borrow_mut().insert(url.to_string(), response);
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn requests(&self) -> Vec<(String, RequestOptions)> {
        self.requests.borrow().clone()
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
        let result = match self.responses.borrow().get(url) {
            Some(response) => Ok(response.clone()),
            None => Err(TransportError {
                url: url.to_string(),
                message: "connection refused".to_string(),
            }),
        };
        future::ready(result).boxed_local()
    }
}

/// View container that logs inserts and removals
#[derive(Default)]
pub struct RecordingContainer {
    views: MemoryViewContainer,
    log: RefCell<Vec<String>>,
}

impl RecordingContainer {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn render(&self) -> String {
        self.views.render()
    }
}

impl ViewContainer for RecordingContainer {
    fn insert(&self, view: Rc<dyn HostView>, index: usize) {
        self.log
            .borrow_mut()
            .push(format!("insert {} at {}", view.render(), index));
        self.views.insert(view, index);
    }

    fn remove(&self, view: &Rc<dyn HostView>) {
        self.log.borrow_mut().push(format!("remove {}", view.render()));
        self.views.remove(view);
    }

    fn len(&self) -> usize {
        self.views.len()
    }
}

/// Services with a private cache so tests do not see each other's entries
pub fn services(compiler: Rc<dyn Compiler>, http: Rc<dyn HttpClient>) -> HostServices {
    HostServices::new(compiler, Rc::new(StaticModuleLoader::permissive()), http)
        .with_cache(CompilationCache::new())
}

/// A dynamic instance with its own container and an unscripted HTTP client
pub fn dynamic_with(compiler: Rc<dyn Compiler>) -> (DynamicBase, Rc<RecordingContainer>) {
    let container = RecordingContainer::new();
    let dynamic = DynamicBase::new(services(compiler, ScriptedHttp::new()), container.clone());
    (dynamic, container)
}
