//! Live module and component instances produced by the markup compiler

use std::cell::Cell;
use std::rc::Rc;

use log::debug;

use super::ast::{Expr, Literal, Node, Template};
use crate::artifact::ModuleRef;
use crate::compiler::{ComponentFactory, ComponentInstance, ModuleFactory, ModuleInstance};
use crate::context::{PropertyTable, Value};
use crate::mount::{HostView, Injector};

pub struct MarkupModuleFactory {
    pub imports: Vec<ModuleRef>,
}

impl ModuleFactory for MarkupModuleFactory {
    fn create(&self, _injector: &Rc<Injector>) -> Rc<dyn ModuleInstance> {
        Rc::new(MarkupModule {
            imports: self.imports.clone(),
            destroyed: Cell::new(false),
        })
    }
}

pub struct MarkupModule {
    imports: Vec<ModuleRef>,
    destroyed: Cell<bool>,
}

impl MarkupModule {
    pub fn imports(&self) -> &[ModuleRef] {
        &self.imports
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

impl ModuleInstance for MarkupModule {
    fn destroy(&self) {
        self.destroyed.set(true);
    }
}

pub struct MarkupComponentFactory {
    pub selector: String,
    pub content_hash: Option<String>,
    pub template: Rc<Template>,
    pub styles: Rc<[String]>,
}

impl ComponentFactory for MarkupComponentFactory {
    fn selector(&self) -> &str {
        &self.selector
    }

    fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    fn create(
        &self,
        _injector: &Rc<Injector>,
        _module: &Rc<dyn ModuleInstance>,
    ) -> Rc<dyn ComponentInstance> {
        let state = Rc::new(ComponentState {
            properties: PropertyTable::new(),
            template: self.template.clone(),
            styles: self.styles.clone(),
            destroyed: Cell::new(false),
        });
        Rc::new(MarkupComponent {
            selector: self.selector.clone(),
            view: Rc::new(MarkupView {
                state: state.clone(),
            }),
            state,
        })
    }
}

struct ComponentState {
    properties: PropertyTable,
    template: Rc<Template>,
    styles: Rc<[String]>,
    destroyed: Cell<bool>,
}

pub struct MarkupComponent {
    selector: String,
    state: Rc<ComponentState>,
    view: Rc<MarkupView>,
}

impl MarkupComponent {
    pub fn styles(&self) -> &[String] {
        &self.state.styles
    }
}

impl ComponentInstance for MarkupComponent {
    fn selector(&self) -> &str {
        &self.selector
    }

    fn properties(&self) -> &PropertyTable {
        &self.state.properties
    }

    fn host_view(&self) -> Rc<dyn HostView> {
        self.view.clone()
    }

    fn destroy(&self) {
        self.state.destroyed.set(true);
    }

    fn is_destroyed(&self) -> bool {
        self.state.destroyed.get()
    }
}

/// Renders the template against the component's properties on every call
pub struct MarkupView {
    state: Rc<ComponentState>,
}

impl HostView for MarkupView {
    fn render(&self) -> String {
        let properties = &self.state.properties;
        let mut out = String::new();
        for node in &self.state.template.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Interpolation(expr) => out.push_str(&evaluate(&expr.node, properties).to_string()),
            }
        }
        out
    }
}

fn evaluate(expr: &Expr, properties: &PropertyTable) -> Value {
    match expr {
        Expr::Property(name) => properties.get(name.node.as_str()).unwrap_or(Value::Null),
        Expr::Call { name, args } => match properties.get(name.node.as_str()) {
            Some(Value::Callable(callable)) => {
                let args: Vec<Value> = args
                    .iter()
                    .map(|arg| match &arg.node {
                        Literal::String(s) => Value::String(s.clone()),
                        Literal::Number(n) => Value::Number(*n),
                    })
                    .collect();
                callable.call(&args)
            }
            _ => {
                debug!("{} is not callable", name.node);
                Value::Null
            }
        },
    }
}
