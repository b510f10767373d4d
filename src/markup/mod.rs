//! Reference compiler for markup templates
//!
//! Templates are literal text with `{{ name }}` and `{{ name(args) }}`
//! interpolations. Each interpolation is evaluated against the component's
//! property table whenever the view renders, so context projection shows up
//! directly in the output.
//!
//! # Example
//!
//! ```text
//! <h1>{{ title }}</h1>
//! <p>{{ greet("Ada") }}</p>
//! ```

pub mod ast;
mod compiler;
mod grammar;
pub mod lexer;
mod view;

pub use ast::Template;
pub use compiler::MarkupCompiler;
pub use grammar::parse;
pub use view::{MarkupComponent, MarkupModule, MarkupView};
