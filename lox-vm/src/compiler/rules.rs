// lox-vm - Bytecode compiler and virtual machine for the Lox programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The Pratt parse rule table: one `(prefix, infix, precedence)` triple per
//! token kind.

use lox_scanner::TokenKind;

use super::Parser;

/// Operator precedence, lowest to highest. `Ord` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    None,
    /// `=`
    Assignment,
    /// `or`
    Or,
    /// `and`
    And,
    /// `==` `!=`
    Equality,
    /// `<` `>` `<=` `>=`
    Comparison,
    /// `+` `-`
    Term,
    /// `*` `/`
    Factor,
    /// `!` `-`
    Unary,
    /// `.` `()`
    Call,
    Primary,
}

impl Precedence {
    /// The next-higher level, used to make binary operators left-associative.
    pub fn higher(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// A prefix or infix parse handler.
pub(crate) type ParseFn<'a> = fn(&mut Parser<'a>, bool);

/// The rule row for one token kind.
pub(crate) struct ParseRule<'a> {
    pub prefix: Option<ParseFn<'a>>,
    pub infix: Option<ParseFn<'a>>,
    pub precedence: Precedence,
}

impl<'a> ParseRule<'a> {
    /// Look up the rule for a token kind. Kinds with no entry parse as
    /// neither prefix nor infix and terminate any expression around them.
    pub fn of(kind: TokenKind) -> ParseRule<'a> {
        use TokenKind::*;
        match kind {
            LeftParen => rule(Some(Parser::grouping), Some(Parser::call), Precedence::Call),
            Minus => rule(Some(Parser::unary), Some(Parser::binary), Precedence::Term),
            Plus => rule(None, Some(Parser::binary), Precedence::Term),
            Slash | Star => rule(None, Some(Parser::binary), Precedence::Factor),
            Bang => rule(Some(Parser::unary), None, Precedence::None),
            BangEqual | EqualEqual => rule(None, Some(Parser::binary), Precedence::Equality),
            Greater | GreaterEqual | Less | LessEqual => {
                rule(None, Some(Parser::binary), Precedence::Comparison)
            }
            Identifier => rule(Some(Parser::variable), None, Precedence::None),
            String => rule(Some(Parser::string), None, Precedence::None),
            Number => rule(Some(Parser::number), None, Precedence::None),
            And => rule(None, Some(Parser::and), Precedence::And),
            Or => rule(None, Some(Parser::or), Precedence::Or),
            False | Nil | True => rule(Some(Parser::literal), None, Precedence::None),
            _ => rule(None, None, Precedence::None),
        }
    }
}

fn rule<'a>(
    prefix: Option<ParseFn<'a>>,
    infix: Option<ParseFn<'a>>,
    precedence: Precedence,
) -> ParseRule<'a> {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}
