use crate::lexer::token::TokenKind;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::Parser;

impl<'a> Parser<'a> {
    pub(crate) fn expression(&mut self) -> Expr {
        self.binary_expression(0)
    }

    /// Precedence climbing: fold operators at or above `min_precedence`,
    /// parsing the right operand one level tighter (same level for the
    /// right-associative `=`).
    fn binary_expression(&mut self, min_precedence: u8) -> Expr {
        let mut lhs = self.term();

        loop {
            let token = self.peek();
            let Some(op) = binary_op(token.kind) else { break };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();

            if op == BinaryOp::Assign && !lhs.is_lvalue() {
                self.error_at("cannot assign to rvalue expression".to_string(), token);
            }

            let rhs = if op == BinaryOp::Assign {
                self.binary_expression(precedence)
            } else {
                self.binary_expression(precedence + 1)
            };

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        lhs
    }

    fn term(&mut self) -> Expr {
        let token = self.peek();
        match token.kind {
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression();
                self.match_token(
                    TokenKind::RightParen,
                    "closing parenthesis around expression",
                );
                expr
            }
            TokenKind::Amp => {
                self.advance();
                let operand_token = self.peek();
                let expr = self.parse_value(true);

                if !matches!(expr, Expr::Index { .. }) {
                    if let TokenKind::Identifier(name) = operand_token.kind {
                        let flags = self
                            .scopes
                            .get(name)
                            .map(|symbol| (symbol.is_register, symbol.is_function_param));
                        match flags {
                            Some((true, _)) => self.error_at(
                                format!("cannot reference register type \"{}\"", name),
                                operand_token,
                            ),
                            Some((_, true)) => self.error_at(
                                format!("cannot reference function parameter \"{}\"", name),
                                operand_token,
                            ),
                            _ => {}
                        }
                    }
                }

                Expr::Unary {
                    op: UnaryOp::AddrOf,
                    expr: Box::new(expr),
                }
            }
            TokenKind::Bang | TokenKind::Minus | TokenKind::Tilde => {
                self.advance();
                let op = match token.kind {
                    TokenKind::Bang => UnaryOp::Not,
                    TokenKind::Minus => UnaryOp::Neg,
                    _ => UnaryOp::BitNot,
                };
                let expr = self.term();
                Expr::Unary {
                    op,
                    expr: Box::new(expr),
                }
            }
            TokenKind::Number(value) => {
                self.advance();
                Expr::IntLit(value)
            }
            TokenKind::Identifier(_) => self.parse_value(false),
            _ => {
                self.advance();
                self.unexpected(token, Some("expression"));
                Expr::IntLit(0)
            }
        }
    }

    /// Identifier-rooted value: a variable read or a function call, followed
    /// by any number of indexing suffixes. With `lvalue` set the result must
    /// denote a storage location.
    fn parse_value(&mut self, lvalue: bool) -> Expr {
        let name_token = self.peek();
        let mut ident = self.parse_identifier();
        if ident.name.is_empty() {
            return Expr::IntLit(0);
        }

        let mut value = if self.peek().kind == TokenKind::LeftParen {
            let args = self.parse_call_args();
            self.check_function_param_counts(&ident.name, args.len(), name_token);
            let call = Expr::Call {
                callee: ident,
                args,
            };
            if lvalue && self.peek().kind != TokenKind::LeftBracket {
                self.error_at("expected lvalue".to_string(), name_token);
            }
            call
        } else {
            let resolved = self.scopes.get(&ident.name).map(|symbol| symbol.name.clone());
            match resolved {
                Some(unique) => ident.name = unique,
                None => self.error_at(
                    format!("unknown identifier: \"{}\"", ident.name),
                    name_token,
                ),
            }
            Expr::Ident(ident)
        };

        while self.peek().kind == TokenKind::LeftBracket {
            self.advance();
            let index = self.expression();
            let size = if self.peek().kind == TokenKind::At {
                self.advance();
                self.parse_size_spec()
            } else {
                8
            };
            self.match_token(
                TokenKind::RightBracket,
                "closing bracket of indexing operation",
            );
            value = Expr::Index {
                base: Box::new(value),
                index: Box::new(index),
                size,
            };
        }

        value
    }

    fn parse_size_spec(&mut self) -> u8 {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(value @ (1 | 2 | 4 | 8)) => value as u8,
            TokenKind::Number(value) => {
                self.error_at(
                    format!("invalid size specifier, must be 1, 2, 4 or 8, was {}", value),
                    token,
                );
                8
            }
            _ => {
                self.unexpected(token, Some("size specifier"));
                8
            }
        }
    }

    fn parse_call_args(&mut self) -> Vec<Expr> {
        self.match_token(TokenKind::LeftParen, "opening parenthesis of function call");
        let mut args = Vec::new();
        if !matches!(self.peek().kind, TokenKind::RightParen | TokenKind::Eof) {
            args.push(self.expression());
        }
        while self.peek().kind == TokenKind::Comma {
            self.advance();
            args.push(self.expression());
        }
        self.match_token(
            TokenKind::RightParen,
            "closing parenthesis of function call",
        );
        args
    }
}

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::ShiftLeft => BinaryOp::Shl,
        TokenKind::ShiftRight => BinaryOp::Shr,
        TokenKind::Less => BinaryOp::Lt,
        TokenKind::LessEqual => BinaryOp::Le,
        TokenKind::Greater => BinaryOp::Gt,
        TokenKind::GreaterEqual => BinaryOp::Ge,
        TokenKind::EqualEqual => BinaryOp::Eq,
        TokenKind::BangEqual => BinaryOp::Ne,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::AmpAmp => BinaryOp::And,
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::Equal => BinaryOp::Assign,
        _ => return None,
    };
    Some(op)
}
