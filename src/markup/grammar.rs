//! Template parser
//!
//! A template is literal text with `{{ expr }}` interpolations. Text is split
//! off by scanning for the delimiters; each expression is lexed with logos
//! and parsed with chumsky.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use super::ast::*;
use super::lexer::{self, Token};
use crate::error::CompileError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Parse template text into a [`Template`]
pub fn parse(input: &str) -> Result<Template, CompileError> {
    let mut nodes = Vec::new();
    let mut rest = 0;

    while let Some(found) = input[rest..].find(OPEN) {
        let open = rest + found;
        if open > rest {
            nodes.push(Node::Text(input[rest..open].to_string()));
        }

        let content_start = open + OPEN.len();
        let Some(len) = input[content_start..].find(CLOSE) else {
            return Err(CompileError::Syntax {
                span: open..input.len(),
                message: "Unclosed interpolation".to_string(),
                expected: vec![format!("'{}'", CLOSE)],
            });
        };
        let content_end = content_start + len;

        let expr = parse_expr(&input[content_start..content_end], content_start)?;
        nodes.push(Node::Interpolation(expr));
        rest = content_end + CLOSE.len();
    }

    if rest < input.len() {
        nodes.push(Node::Text(input[rest..].to_string()));
    }

    Ok(Template { nodes })
}

/// Parse one interpolation expression; `offset` is its position in the template
fn parse_expr(source: &str, offset: usize) -> Result<Spanned<Expr>, CompileError> {
    let tokens = lexer::lex(source, offset).map_err(|span| CompileError::Syntax {
        span,
        message: "Unexpected character in expression".to_string(),
        expected: Vec::new(),
    })?;

    let end = offset + source.len();
    let token_iter = tokens
        .into_iter()
        .map(|(tok, span)| (tok, SimpleSpan::from(span)));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter).map((end..end).into(), |(t, s): (_, _)| (t, s));

    expr_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| match errs.into_iter().next() {
            Some(err) => syntax_error(err),
            None => CompileError::Syntax {
                span: offset..end,
                message: "Invalid expression".to_string(),
                expected: Vec::new(),
            },
        })
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> Span {
    e.start()..e.end()
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    let string_literal = select! {
        Token::String(s) => Literal::String(s),
    };

    // Numbers (including negative via Minus token)
    let number_literal = just(Token::Minus)
        .or_not()
        .then(select! { Token::Number(n) => n })
        .map(|(neg, n)| Literal::Number(if neg.is_some() { -n } else { n }));

    let literal = choice((string_literal, number_literal))
        .map_with(|lit, e| Spanned::new(lit, span_range(&e.span())));

    let args = literal
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(Token::ParenOpen), just(Token::ParenClose));

    identifier
        .then(args.or_not())
        .map(|(name, args)| match args {
            Some(args) => Expr::Call { name, args },
            None => Expr::Property(name),
        })
        .map_with(|expr, e| Spanned::new(expr, span_range(&e.span())))
        .then_ignore(end())
}

fn syntax_error(err: Rich<'_, Token>) -> CompileError {
    use chumsky::error::RichReason;

    let message = match err.reason() {
        RichReason::ExpectedFound { found, .. } => match found {
            Some(tok) => format!("Unexpected {}", format_token(tok)),
            None => "Unexpected end of expression".to_string(),
        },
        RichReason::Custom(msg) => msg.to_string(),
    };

    let expected: Vec<String> = err
        .expected()
        .filter_map(|e| match e {
            chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
            chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
            chumsky::error::RichPattern::EndOfInput => Some("end of expression".to_string()),
            chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
            chumsky::error::RichPattern::Any => Some("any token".to_string()),
            chumsky::error::RichPattern::SomethingElse => None,
        })
        .collect();

    CompileError::Syntax {
        span: err.span().into_range(),
        message,
        expected,
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Number(n) => format!("number {}", n),
        Token::ParenOpen => "'('".to_string(),
        Token::ParenClose => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Minus => "'-'".to_string(),
    }
}
