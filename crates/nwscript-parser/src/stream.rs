//! Token stream wrapper for the hand-written parser.

use nwscript_ast::{Diagnostic, ErrorKind, Span};
use nwscript_lexer::Token;

/// Token stream with lookahead and span tracking.
///
/// Consumes the flat, fully preprocessed token vector of one compilation
/// unit. Tokens from included files carry spans into their own source
/// files, so error locations stay accurate across include boundaries.
pub(crate) struct TokenStream {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    eof_span: Span,
}

impl TokenStream {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        let eof_span = tokens
            .last()
            .map(|(_, s)| Span::new(s.file_id, s.end, s.end))
            .unwrap_or_else(|| Span::zero(0));
        Self {
            tokens,
            pos: 0,
            eof_span,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance past the current token, returning it with its span.
    pub fn advance(&mut self) -> Option<(Token, Span)> {
        let entry = self.tokens.get(self.pos).cloned();
        if entry.is_some() {
            self.pos += 1;
        }
        entry
    }

    /// Check whether the current token matches, comparing by kind only.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(
            self.peek(),
            Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected)
        )
    }

    /// Consume the current token when it matches, by kind.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance past it.
    pub fn expect(&mut self, expected: Token) -> Result<Span, Diagnostic> {
        if self.check(&expected) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            let message = match self.peek() {
                Some(found) => format!("expected '{}', found '{}'", expected, found),
                None => format!("expected '{}', found end of file", expected),
            };
            Err(Diagnostic::error(
                ErrorKind::Parse,
                self.current_span(),
                message,
            ))
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Span of the current token, or a zero-width span at EOF.
    pub fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(self.eof_span)
    }

    /// Span of the most recently consumed token.
    pub fn prev_span(&self) -> Span {
        if self.pos == 0 {
            return self.current_span();
        }
        self.tokens
            .get(self.pos - 1)
            .map(|(_, s)| *s)
            .unwrap_or(self.eof_span)
    }

    /// Skip forward to a statement/declaration boundary for error
    /// recovery: just past the next `;`, or to a `}` or type keyword.
    pub fn synchronize(&mut self) {
        while let Some(tok) = self.peek() {
            match tok {
                Token::Semicolon => {
                    self.pos += 1;
                    return;
                }
                Token::RBrace => {
                    self.pos += 1;
                    return;
                }
                tok if tok.is_type_keyword() => return,
                _ => self.pos += 1,
            }
        }
    }
}
