//! Blueprint parser — turns per-project blueprint text into module
//! declarations.
//!
//! This is a best-effort parser: a malformed module is reported as a
//! diagnostic and skipped, and the rest of the file still parses. Only a
//! file that yields nothing at all is treated as a hard failure.

pub mod lexer;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::ParseError;
use crate::project::ProjectId;
use crate::value::{Properties, PropertyValue};
use lexer::{line_col, tokenize, unquote, Token, TokenKind};

/// One top-level `module_type { ... }` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDeclaration {
    /// The declaring keyword, e.g. `cc_library`.
    pub module_type: String,
    /// Property bag in declaration order. `name` is itself a property.
    pub properties: Properties,
    /// Project the declaring blueprint file belongs to.
    pub origin_project: ProjectId,
    /// 1-indexed line of the declaration.
    pub origin_line: usize,
}

impl ModuleDeclaration {
    /// The mandatory `name` property.
    pub fn name(&self) -> Option<&str> {
        self.properties.get("name").and_then(PropertyValue::as_str)
    }
}

/// The outcome of parsing one blueprint file.
#[derive(Debug, Default)]
pub struct ParsedBlueprint {
    /// Declarations in file order.
    pub modules: Vec<ModuleDeclaration>,
    /// Per-module errors that were recovered from.
    pub diagnostics: Vec<ParseError>,
}

/// Parse the text of one blueprint file.
///
/// Returns `Err` only when the file produced nothing usable; otherwise
/// malformed modules are reported through
/// [`ParsedBlueprint::diagnostics`] and the rest of the file survives.
pub fn parse_blueprint(
    source: &str,
    file: &str,
    project: &ProjectId,
) -> Result<ParsedBlueprint, ParseError> {
    let mut parser = Parser {
        source,
        file,
        project,
        tokens: tokenize(source),
        pos: 0,
        variables: HashMap::new(),
        modules: Vec::new(),
        diagnostics: Vec::new(),
    };
    parser.parse_file();

    if parser.modules.is_empty() && parser.variables.is_empty() {
        if let Some(first) = parser.diagnostics.first() {
            return Err(first.clone());
        }
    }

    Ok(ParsedBlueprint {
        modules: parser.modules,
        diagnostics: parser.diagnostics,
    })
}

struct Parser<'a> {
    source: &'a str,
    file: &'a str,
    project: &'a ProjectId,
    tokens: Vec<Token>,
    pos: usize,
    variables: HashMap<String, PropertyValue>,
    modules: Vec<ModuleDeclaration>,
    diagnostics: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = line_col(self.source, offset);
        ParseError {
            file: self.file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let found = self.peek().clone();
            let found_text = if found.kind == TokenKind::Eof {
                "end of file".to_string()
            } else {
                format!("`{}`", found.text)
            };
            Err(self.error_at(
                found.span.start,
                format!("expected {what}, found {found_text}"),
            ))
        }
    }

    fn parse_file(&mut self) {
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Ident => match self.peek_kind_at(1) {
                    TokenKind::LBrace => self.parse_module(),
                    TokenKind::Equal | TokenKind::PlusEqual => {
                        if let Err(err) = self.parse_variable() {
                            self.diagnostics.push(err);
                            self.recover_top_level();
                        }
                    }
                    _ => {
                        let token = self.advance();
                        warn!(
                            file = self.file,
                            token = %token.text,
                            "skipping unknown top-level token"
                        );
                    }
                },
                _ => {
                    let token = self.advance();
                    warn!(
                        file = self.file,
                        token = %token.text,
                        "skipping unknown top-level token"
                    );
                }
            }
        }
    }

    fn parse_module(&mut self) {
        let header = self.advance();
        let open = self.pos;
        self.advance(); // the `{`

        match self.parse_module_body(&header) {
            Ok(Some(module)) => self.modules.push(module),
            Ok(None) => {}
            Err(err) => {
                self.diagnostics.push(err);
                self.skip_block(open);
            }
        }
    }

    fn parse_module_body(
        &mut self,
        header: &Token,
    ) -> Result<Option<ModuleDeclaration>, ParseError> {
        let properties = self.parse_pairs(TokenKind::RBrace)?;

        if properties.get("name").and_then(PropertyValue::as_str).is_none() {
            // soong_namespace declarations legitimately carry no name;
            // namespace semantics stay out of scope, so drop them.
            if header.text == "soong_namespace" {
                debug!(file = self.file, "skipping soong_namespace declaration");
                return Ok(None);
            }
            return Err(self.error_at(
                header.span.start,
                format!("module `{}` has no name property", header.text),
            ));
        }

        let (origin_line, _) = line_col(self.source, header.span.start);
        Ok(Some(ModuleDeclaration {
            module_type: header.text.clone(),
            properties,
            origin_project: self.project.clone(),
            origin_line,
        }))
    }

    /// Parse `ident: value` pairs up to (and including) the closing
    /// token. Commas separate pairs; a trailing comma is legal.
    fn parse_pairs(&mut self, close: TokenKind) -> Result<Properties, ParseError> {
        let mut properties = Properties::new();
        loop {
            if self.peek().kind == close {
                self.advance();
                break;
            }
            let key = self.expect(TokenKind::Ident, "a property name")?;
            self.expect(TokenKind::Colon, "`:`")?;
            let value = self.parse_value()?;
            properties.insert(key.text, value);

            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                kind if kind == close => {
                    self.advance();
                    break;
                }
                _ => {
                    let found = self.peek().clone();
                    return Err(self.error_at(
                        found.span.start,
                        format!("expected `,` or closing brace, found `{}`", found.text),
                    ));
                }
            }
        }
        Ok(properties)
    }

    fn parse_value(&mut self) -> Result<PropertyValue, ParseError> {
        let mut value = self.parse_primary()?;
        while self.peek().kind == TokenKind::Plus {
            let plus = self.advance();
            let rhs = self.parse_primary()?;
            value = self.concat(value, rhs, plus.span.start)?;
        }
        Ok(value)
    }

    fn parse_primary(&mut self) -> Result<PropertyValue, ParseError> {
        match self.peek().kind {
            TokenKind::Str => {
                let token = self.advance();
                Ok(PropertyValue::String(unquote(&token.text)))
            }
            TokenKind::True => {
                self.advance();
                Ok(PropertyValue::Bool(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(PropertyValue::Bool(false))
            }
            TokenKind::Int => {
                let token = self.advance();
                let parsed = token.text.parse::<i64>().map_err(|_| {
                    self.error_at(token.span.start, format!("invalid integer `{}`", token.text))
                })?;
                Ok(PropertyValue::Integer(parsed))
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::LBrace => {
                self.advance();
                let block = self.parse_pairs(TokenKind::RBrace)?;
                Ok(PropertyValue::Block(block))
            }
            TokenKind::Ident => {
                let token = self.advance();
                self.variables.get(&token.text).cloned().ok_or_else(|| {
                    self.error_at(
                        token.span.start,
                        format!("undefined variable `{}`", token.text),
                    )
                })
            }
            _ => {
                let found = self.peek().clone();
                Err(self.error_at(
                    found.span.start,
                    format!("expected a value, found `{}`", found.text),
                ))
            }
        }
    }

    fn parse_list(&mut self) -> Result<PropertyValue, ParseError> {
        self.advance(); // the `[`
        let mut items = Vec::new();
        loop {
            if self.peek().kind == TokenKind::RBracket {
                self.advance();
                break;
            }
            items.push(self.parse_value()?);
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                _ => {
                    let found = self.peek().clone();
                    return Err(self.error_at(
                        found.span.start,
                        format!("expected `,` or `]`, found `{}`", found.text),
                    ));
                }
            }
        }
        Ok(PropertyValue::List(items))
    }

    fn concat(
        &self,
        lhs: PropertyValue,
        rhs: PropertyValue,
        offset: usize,
    ) -> Result<PropertyValue, ParseError> {
        match (lhs, rhs) {
            (PropertyValue::String(a), PropertyValue::String(b)) => {
                Ok(PropertyValue::String(a + &b))
            }
            (PropertyValue::List(mut a), PropertyValue::List(b)) => {
                a.extend(b);
                Ok(PropertyValue::List(a))
            }
            (PropertyValue::List(mut a), PropertyValue::String(s)) => {
                a.push(PropertyValue::String(s));
                Ok(PropertyValue::List(a))
            }
            (PropertyValue::String(s), PropertyValue::List(b)) => {
                let mut items = vec![PropertyValue::String(s)];
                items.extend(b);
                Ok(PropertyValue::List(items))
            }
            (lhs, rhs) => Err(self.error_at(
                offset,
                format!("cannot concatenate {lhs} and {rhs}"),
            )),
        }
    }

    fn parse_variable(&mut self) -> Result<(), ParseError> {
        let name = self.advance();
        let op = self.advance();
        let value = self.parse_value()?;

        if op.kind == TokenKind::Equal {
            if let Some(old) = self.variables.get(&name.text) {
                if *old != value {
                    debug!(file = self.file, variable = %name.text, "overwriting variable");
                }
            }
            self.variables.insert(name.text, value);
            return Ok(());
        }

        let old = self.variables.remove(&name.text).ok_or_else(|| {
            self.error_at(
                name.span.start,
                format!("append to undefined variable `{}`", name.text),
            )
        })?;
        let appended = self.concat(old, value, op.span.start)?;
        self.variables.insert(name.text, appended);
        Ok(())
    }

    /// Skip past the block whose opening brace sits at `open`, balancing
    /// nested braces. Leaves the cursor just after the matching close.
    fn skip_block(&mut self, open: usize) {
        let mut pos = open;
        let mut depth = 0usize;
        while pos < self.tokens.len() {
            match self.tokens[pos].kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        pos += 1;
                        break;
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
            pos += 1;
        }
        self.pos = pos.min(self.tokens.len() - 1);
    }

    /// After a bad top-level statement, advance to the next plausible
    /// top-level item.
    fn recover_top_level(&mut self) {
        self.advance();
        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Ident => match self.peek_kind_at(1) {
                    TokenKind::LBrace | TokenKind::Equal | TokenKind::PlusEqual => break,
                    _ => {
                        self.advance();
                    }
                },
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedBlueprint {
        parse_blueprint(source, "Android.bp", &ProjectId::new("test"))
            .expect("blueprint should parse")
    }

    fn first(parsed: &ParsedBlueprint) -> &ModuleDeclaration {
        parsed.modules.first().expect("at least one module")
    }

    #[test]
    fn test_simple_module() {
        let parsed = parse(r#"cc_binary { name: "linker" }"#);
        assert_eq!(parsed.modules.len(), 1);

        let linker = first(&parsed);
        assert_eq!(linker.module_type, "cc_binary");
        assert_eq!(linker.name(), Some("linker"));
        assert_eq!(linker.origin_line, 1);
    }

    #[test]
    fn test_boolean_parsing() {
        let parsed = parse(
            r#"cc_binary {
                name: "linker",
                static_executable: true,
                native_coverage: false,
            }"#,
        );
        let linker = first(&parsed);
        assert_eq!(
            linker.properties.get("static_executable"),
            Some(&PropertyValue::Bool(true))
        );
        assert_eq!(
            linker.properties.get("native_coverage"),
            Some(&PropertyValue::Bool(false))
        );
    }

    #[test]
    fn test_list_parsing_with_trailing_comma() {
        let parsed = parse(
            r#"cc_binary {
                name: "linker",
                cflags: [
                    "-DHAVE_CONFIG_H",
                    "-DSIZEOF_KERNEL_LONG_T=SIZEOF_LONG",
                    "-DSIZEOF_OFF_T=SIZEOF_LONG",
                ],
            }"#,
        );
        let cflags = first(&parsed).properties.get("cflags").unwrap();
        assert_eq!(cflags.string_items().len(), 3);
        assert_eq!(cflags.string_items()[0], "-DHAVE_CONFIG_H");
    }

    #[test]
    fn test_empty_list_shorthand() {
        let parsed = parse(r#"cc_library { name: "l", whole_static_libs: [] }"#);
        assert_eq!(
            first(&parsed).properties.get("whole_static_libs"),
            Some(&PropertyValue::List(vec![]))
        );
    }

    #[test]
    fn test_nested_arch_block() {
        let parsed = parse(
            r#"cc_library {
                name: "libnfc-nci",
                arch: {
                    arm: {
                        instruction_set: "arm",
                    },
                },
            }"#,
        );
        let arch = first(&parsed).properties.get("arch").unwrap();
        let PropertyValue::Block(arch) = arch else {
            panic!("arch should be a block");
        };
        let PropertyValue::Block(arm) = arch.get("arm").unwrap() else {
            panic!("arm should be a block");
        };
        assert_eq!(
            arm.get("instruction_set"),
            Some(&PropertyValue::String("arm".into()))
        );
    }

    #[test]
    fn test_variables_and_references() {
        let parsed = parse(
            r#"
            value = 2
            subdirs = ["*"]
            cc_binary {
                name: "linker",
                value_int: value,
                dirs: subdirs,
            }"#,
        );
        let linker = first(&parsed);
        assert_eq!(
            linker.properties.get("value_int"),
            Some(&PropertyValue::Integer(2))
        );
        assert_eq!(
            linker.properties.get("dirs").unwrap().string_items(),
            vec!["*"]
        );
    }

    #[test]
    fn test_variable_append() {
        let parsed = parse(
            r#"
            common = ["a.cc"]
            common += ["b.cc"]
            cc_library { name: "l", srcs: common }
            "#,
        );
        let srcs = first(&parsed).properties.get("srcs").unwrap();
        assert_eq!(srcs.string_items(), vec!["a.cc", "b.cc"]);
    }

    #[test]
    fn test_string_and_list_concatenation() {
        let parsed = parse(
            r#"
            stem = "lib"
            extra = ["z.cc"]
            cc_library {
                name: stem + "foo",
                srcs: ["a.cc"] + extra,
            }"#,
        );
        let module = first(&parsed);
        assert_eq!(module.name(), Some("libfoo"));
        assert_eq!(
            module.properties.get("srcs").unwrap().string_items(),
            vec!["a.cc", "z.cc"]
        );
    }

    #[test]
    fn test_comments_are_stripped() {
        let parsed = parse(
            r#"
            // a binary
            cc_binary {
                name: "linker", /* inline */
            }"#,
        );
        assert_eq!(parsed.modules.len(), 1);
    }

    #[test]
    fn test_missing_name_is_rejected_but_file_survives() {
        let parsed = parse(
            r#"
            cc_library { srcs: ["a.cc"] }
            cc_binary { name: "kept" }
            "#,
        );
        assert_eq!(parsed.modules.len(), 1);
        assert_eq!(first(&parsed).name(), Some("kept"));
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.diagnostics[0].message.contains("no name"));
        assert_eq!(parsed.diagnostics[0].line, 2);
    }

    #[test]
    fn test_malformed_module_does_not_lose_rest_of_file() {
        let parsed = parse(
            r#"
            cc_library {
                name: "broken",
                srcs: [,],
            }
            cc_binary { name: "kept" }
            "#,
        );
        assert_eq!(parsed.modules.len(), 1);
        assert_eq!(first(&parsed).name(), Some("kept"));
        assert_eq!(parsed.diagnostics.len(), 1);
    }

    #[test]
    fn test_undefined_variable_reference() {
        let parsed = parse(
            r#"
            cc_library { name: "bad", srcs: missing_var }
            cc_binary { name: "kept" }
            "#,
        );
        assert_eq!(parsed.modules.len(), 1);
        assert!(parsed.diagnostics[0].message.contains("undefined variable"));
    }

    #[test]
    fn test_soong_namespace_is_skipped_silently() {
        let parsed = parse(
            r#"
            soong_namespace {}
            cc_binary { name: "kept" }
            "#,
        );
        assert_eq!(parsed.modules.len(), 1);
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_unknown_top_level_token_is_skipped() {
        let parsed = parse(
            r#"
            @ stray
            cc_binary { name: "kept" }
            "#,
        );
        assert_eq!(parsed.modules.len(), 1);
    }

    #[test]
    fn test_garbage_file_fails() {
        let result = parse_blueprint("{{{{", "Android.bp", &ProjectId::new("test"));
        assert!(result.is_err() || result.unwrap().modules.is_empty());
    }

    #[test]
    fn test_append_to_undefined_variable_is_diagnosed() {
        let parsed = parse(
            r#"
            ghost += ["a.cc"]
            cc_binary { name: "kept" }
            "#,
        );
        assert_eq!(parsed.modules.len(), 1);
        assert!(parsed.diagnostics[0].message.contains("undefined variable `ghost`")
            || parsed.diagnostics[0].message.contains("append to undefined"));
    }
}
