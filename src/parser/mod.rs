pub mod ast;
mod expr;
pub mod scope;

use std::collections::{HashMap, HashSet};

use crate::errors::Diagnostics;
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::TokenStream;
use self::ast::{Block, DeclKind, Function, Ident, Program, Stmt};
use self::scope::SymbolTable;

/// Parse a whole program, collecting diagnostics instead of failing fast.
pub fn parse(source: &str) -> (Program, Diagnostics) {
    Parser::new(TokenStream::new(source)).parse_program()
}

pub struct Parser<'a> {
    ts: TokenStream<'a>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) scopes: SymbolTable,
    param_counts: HashMap<String, usize>,
    declared_functions: HashSet<String>,
    encounter_order: Vec<String>,
    next_ident_id: u64,
    fatal: bool,
}

impl<'a> Parser<'a> {
    pub fn new(ts: TokenStream<'a>) -> Self {
        Self {
            ts,
            diagnostics: Diagnostics::new(),
            scopes: SymbolTable::new(),
            param_counts: HashMap::new(),
            declared_functions: HashSet::new(),
            encounter_order: Vec::new(),
            next_ident_id: 0,
            fatal: false,
        }
    }

    pub fn parse_program(mut self) -> (Program, Diagnostics) {
        let mut functions = Vec::new();
        while !self.at_end() {
            functions.push(self.parse_function());
        }

        let externs = self
            .encounter_order
            .iter()
            .filter(|name| !self.declared_functions.contains(*name))
            .map(|name| (name.clone(), self.param_counts[name]))
            .collect();

        (Program { functions, externs }, self.diagnostics)
    }

    fn parse_function(&mut self) -> Function {
        self.scopes.reset();
        let name_token = self.peek();
        let ident = self.parse_identifier();
        self.declared_functions.insert(ident.name.clone());

        self.match_token(TokenKind::LeftParen, "parameter list opening parenthesis");
        let params = self.parse_param_list();
        self.match_token(TokenKind::RightParen, "parameter list closing parenthesis");
        let body = self.parse_block();

        self.check_function_param_counts(&ident.name, params.len(), name_token);
        let auto_locals = self.scopes.collect_auto_locals();
        Function {
            name: ident.name,
            params,
            body,
            auto_locals,
        }
    }

    fn parse_param_list(&mut self) -> Vec<Ident> {
        let mut params = Vec::new();
        if matches!(self.peek().kind, TokenKind::Identifier(_)) {
            params.push(self.parse_param());
        }
        while self.peek().kind == TokenKind::Comma {
            self.match_token(TokenKind::Comma, "parameter separator comma");
            params.push(self.parse_param());
        }
        params
    }

    fn parse_param(&mut self) -> Ident {
        let token = self.peek();
        let mut ident = self.parse_identifier();
        match self.scopes.insert(&ident.name, false, true) {
            Some(unique) => ident.name = unique,
            None => self.error_at(
                format!("duplicate function parameter: \"{}\"", ident.name),
                token,
            ),
        }
        ident
    }

    fn parse_block(&mut self) -> Block {
        self.match_token(TokenKind::LeftBrace, "opening brace in block");
        self.scopes.enter_scope();

        let mut statements = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RightBrace | TokenKind::Eof) {
            statements.push(self.parse_decl_statement());
        }

        self.match_token(TokenKind::RightBrace, "closing brace in block");
        self.scopes.leave_scope();
        Block { statements }
    }

    fn parse_decl_statement(&mut self) -> Stmt {
        let kind = match self.peek().kind {
            TokenKind::Auto => DeclKind::Auto,
            TokenKind::Register => DeclKind::Register,
            _ => return self.parse_statement(),
        };
        self.advance();

        let name_token = self.peek();
        let mut ident = self.parse_identifier();
        self.match_token(TokenKind::Equal, "assignment operator in declaration");
        let init = self.expression();
        self.match_token(TokenKind::Semicolon, "\";\"");

        // The initializer is parsed first: `auto x = x + 1;` reads the outer x.
        match self
            .scopes
            .insert(&ident.name, kind == DeclKind::Register, false)
        {
            Some(unique) => ident.name = unique,
            None => self.error_at(
                format!("redeclared identifier \"{}\"", ident.name),
                name_token,
            ),
        }

        Stmt::Decl { kind, ident, init }
    }

    fn parse_statement(&mut self) -> Stmt {
        match self.peek().kind {
            TokenKind::Return => {
                self.advance();
                if self.peek().kind == TokenKind::Semicolon {
                    self.advance();
                    return Stmt::Return(None);
                }
                let expr = self.expression();
                self.match_token(TokenKind::Semicolon, "\";\"");
                Stmt::Return(Some(expr))
            }
            TokenKind::If => {
                self.advance();
                self.match_token(TokenKind::LeftParen, "opening parenthesis around if condition");
                let cond = self.expression();
                self.match_token(TokenKind::RightParen, "closing parenthesis around if condition");
                let then_branch = Box::new(self.parse_statement());
                let else_branch = if self.peek().kind == TokenKind::Else {
                    self.advance();
                    Some(Box::new(self.parse_statement()))
                } else {
                    None
                };
                Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                }
            }
            TokenKind::While => {
                self.advance();
                self.match_token(
                    TokenKind::LeftParen,
                    "opening parenthesis around while condition",
                );
                let cond = self.expression();
                self.match_token(
                    TokenKind::RightParen,
                    "closing parenthesis around while condition",
                );
                let body = Box::new(self.parse_statement());
                Stmt::While { cond, body }
            }
            TokenKind::LeftBrace => Stmt::Block(self.parse_block()),
            _ => {
                let expr = self.expression();
                self.match_token(TokenKind::Semicolon, "\";\"");
                Stmt::Expr(expr)
            }
        }
    }

    pub(crate) fn parse_identifier(&mut self) -> Ident {
        let token = self.advance();
        match token.kind {
            TokenKind::Identifier(name) => self.new_ident(name.to_string()),
            _ => {
                self.unexpected(token, Some("identifier"));
                self.new_ident(String::new())
            }
        }
    }

    pub(crate) fn new_ident(&mut self, name: String) -> Ident {
        let id = self.next_ident_id;
        self.next_ident_id += 1;
        Ident { name, id }
    }

    /// Record or check the argument count associated with a function name;
    /// both calls and definitions go through here.
    pub(crate) fn check_function_param_counts(
        &mut self,
        name: &str,
        count: usize,
        token: Token<'a>,
    ) {
        match self.param_counts.get(name) {
            None => {
                self.param_counts.insert(name.to_string(), count);
                self.encounter_order.push(name.to_string());
            }
            Some(&previous) if previous != count => {
                self.error_at(
                    format!(
                        "function \"{}\" called with mismatching number of parameters: {}, previously called with {} parameters",
                        name, count, previous
                    ),
                    token,
                );
            }
            Some(_) => {}
        }
    }

    pub(crate) fn match_token(&mut self, kind: TokenKind<'a>, expected: &str) {
        let token = self.advance();
        if token.kind != kind {
            self.unexpected(token, Some(expected));
        }
    }

    pub(crate) fn peek(&mut self) -> Token<'a> {
        let token = self.ts.peek();
        if token.kind == TokenKind::Unknown {
            self.report_unknown(token)
        } else {
            token
        }
    }

    pub(crate) fn advance(&mut self) -> Token<'a> {
        let token = self.ts.next();
        if token.kind == TokenKind::Unknown {
            self.report_unknown(token)
        } else {
            token
        }
    }

    fn at_end(&mut self) -> bool {
        self.fatal || self.ts.empty()
    }

    fn report_unknown(&mut self, token: Token<'a>) -> Token<'a> {
        if !self.fatal {
            self.fatal = true;
            self.diagnostics.unknown_token(token.line, token.column);
        }
        Token::new(TokenKind::Eof, token.line, token.column)
    }

    pub(crate) fn error_at(&mut self, message: String, token: Token<'a>) {
        if self.fatal {
            return;
        }
        self.diagnostics.error(message, token.line, token.column);
    }

    pub(crate) fn unexpected(&mut self, token: Token<'a>, expected: Option<&str>) {
        if self.fatal {
            return;
        }
        self.diagnostics.unexpected_token(token, expected);
    }
}
