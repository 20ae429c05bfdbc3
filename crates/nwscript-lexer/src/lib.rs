//! Lexical analysis for NWScript source.
//!
//! Tokenization of `.nss` source text using logos.
//!
//! # Design
//!
//! - `Token` — all NWScript token types (keywords, operators, literals,
//!   identifiers, preprocessor directives)
//! - Plain `//` and `/* */` comments are stripped during lexing (not tokens)
//! - Newlines are tokens: the preprocessor needs logical-line boundaries to
//!   recognise directives and terminate their argument lists
//! - Source bytes are 8-bit; [`decode_source`] maps them 1:1 onto scalar
//!   values so string literals survive losslessly and [`encode_str`] maps
//!   them back when emitting bytecode
//!
//! # Examples
//!
//! ```
//! # use nwscript_lexer::*;
//! # use logos::Logos;
//! let source = "void main() { int x = 1; }";
//! let tokens: Vec<Result<Token, ()>> = Token::lexer(source).collect();
//! ```

use logos::Logos;
use std::rc::Rc;

/// NWScript token.
///
/// Represents all lexical elements of NWScript including keywords,
/// operators, literals, identifiers and preprocessor directives.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")] // Skip horizontal whitespace; \n is a token
#[logos(skip r"//[^\n]*")] // Skip // comments to end of line
#[logos(skip r"/\*([^*]|\*[^/])*\*/")] // Skip /* */ comments (not nested)
pub enum Token {
    // === Keywords ===

    // Control flow
    /// Keyword `if`
    #[token("if")]
    If,
    /// Keyword `else`
    #[token("else")]
    Else,
    /// Keyword `while`
    #[token("while")]
    While,
    /// Keyword `do`
    #[token("do")]
    Do,
    /// Keyword `for`
    #[token("for")]
    For,
    /// Keyword `switch`
    #[token("switch")]
    Switch,
    /// Keyword `case`
    #[token("case")]
    Case,
    /// Keyword `default`
    #[token("default")]
    Default,
    /// Keyword `break`
    #[token("break")]
    Break,
    /// Keyword `continue`
    #[token("continue")]
    Continue,
    /// Keyword `return`
    #[token("return")]
    Return,

    // Type names
    /// Keyword `void`
    #[token("void")]
    Void,
    /// Keyword `int`
    #[token("int")]
    Int,
    /// Keyword `float`
    #[token("float")]
    Float,
    /// Keyword `string`
    #[token("string")]
    String,
    /// Keyword `object`
    #[token("object")]
    Object,
    /// Keyword `vector`
    #[token("vector")]
    Vector,
    /// Keyword `action`
    #[token("action")]
    Action,

    // Storage
    /// Keyword `const`
    #[token("const")]
    Const,
    /// Keyword `struct` (reserved; rejected by the parser)
    #[token("struct")]
    Struct,

    // === Operators ===

    // Arithmetic
    /// Operator `+`
    #[token("+")]
    Plus,
    /// Operator `-`
    #[token("-")]
    Minus,
    /// Operator `*`
    #[token("*")]
    Star,
    /// Operator `/`
    #[token("/")]
    Slash,
    /// Operator `%`
    #[token("%")]
    Percent,

    // Increment / decrement
    /// Operator `++`
    #[token("++")]
    PlusPlus,
    /// Operator `--`
    #[token("--")]
    MinusMinus,

    // Compound assignment
    /// Operator `+=`
    #[token("+=")]
    PlusEq,
    /// Operator `-=`
    #[token("-=")]
    MinusEq,
    /// Operator `*=`
    #[token("*=")]
    StarEq,
    /// Operator `/=`
    #[token("/=")]
    SlashEq,
    /// Operator `%=`
    #[token("%=")]
    PercentEq,

    // Comparison
    /// Operator `==`
    #[token("==")]
    EqEq,
    /// Operator `!=`
    #[token("!=")]
    BangEq,
    /// Operator `<`
    #[token("<")]
    Lt,
    /// Operator `<=`
    #[token("<=")]
    LtEq,
    /// Operator `>`
    #[token(">")]
    Gt,
    /// Operator `>=`
    #[token(">=")]
    GtEq,

    // Logic and bitwise
    /// Operator `&&`
    #[token("&&")]
    AmpAmp,
    /// Operator `||`
    #[token("||")]
    PipePipe,
    /// Operator `&`
    #[token("&")]
    Amp,
    /// Operator `|`
    #[token("|")]
    Pipe,
    /// Operator `^`
    #[token("^")]
    Caret,
    /// Operator `~`
    #[token("~")]
    Tilde,
    /// Operator `!`
    #[token("!")]
    Bang,

    // Shifts
    /// Operator `<<`
    #[token("<<")]
    Shl,
    /// Operator `>>`
    #[token(">>")]
    Shr,
    /// Operator `>>>` (unsigned shift right)
    #[token(">>>")]
    Ushr,

    // Assignment and structure
    /// Operator `=`
    #[token("=")]
    Eq,
    /// Operator `?`
    #[token("?")]
    Question,
    /// Operator `:`
    #[token(":")]
    Colon,
    /// Operator `.`
    #[token(".")]
    Dot,
    /// Operator `,`
    #[token(",")]
    Comma,
    /// Operator `;`
    #[token(";")]
    Semicolon,

    // === Delimiters ===
    /// Delimiter `(`
    #[token("(")]
    LParen,
    /// Delimiter `)`
    #[token(")")]
    RParen,
    /// Delimiter `{`
    #[token("{")]
    LBrace,
    /// Delimiter `}`
    #[token("}")]
    RBrace,
    /// Delimiter `[`
    #[token("[")]
    LBracket,
    /// Delimiter `]`
    #[token("]")]
    RBracket,

    /// Newline; syntax trivia everywhere except in preprocessor directives,
    /// which run to end of line.
    #[token("\n")]
    Newline,

    /// Preprocessor directive (`#` + name), e.g. `#define`, `#include`.
    ///
    /// The payload excludes the `#`. Only directives at the start of a
    /// logical line are legal; the preprocessor enforces position and
    /// rejects unknown names.
    #[regex(r"#[A-Za-z_]+", |lex| Rc::from(&lex.slice()[1..]))]
    Directive(Rc<str>),

    // === Literals ===
    /// Integer literal: decimal, `0x` hex, or leading-`0` octal.
    ///
    /// Values wrap to 32-bit two's complement; a literal too large for
    /// 64 bits (or with an invalid octal digit) is a lexical error.
    #[regex(r"0[xX][0-9a-fA-F]+", parse_int_hex)]
    #[regex(r"[0-9]+", parse_int_dec_oct)]
    IntLiteral(i32),

    /// Float literal. Requires a decimal point or exponent, with an
    /// optional `f` suffix (e.g. `1.0`, `.5`, `2e3`, `1.5f`).
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?f?", parse_float)]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?f?", parse_float)]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+f?", parse_float)]
    FloatLiteral(f32),

    /// String literal with `\\ \" \n \r \t` escapes. May not contain a
    /// raw newline.
    ///
    /// Uses `Rc<str>` for cheap cloning throughout the parser pipeline.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).map(|s| Rc::from(s.as_str()))
    })]
    StringLiteral(Rc<str>),

    /// Identifier: `[A-Za-z_][A-Za-z0-9_]*`. Non-ASCII bytes are never
    /// part of identifiers.
    ///
    /// Uses `Rc<str>` for cheap cloning throughout the parser pipeline.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),

    /// A string literal missing its closing quote. Surfaced as a token so
    /// the preprocessor can report "unterminated string" with a span.
    #[regex(r#""([^"\\\n]|\\.)*"#)]
    BadString,

    /// A block comment missing its `*/` terminator.
    #[regex(r"/\*([^*]|\*[^/])*\**")]
    BadComment,
}

fn parse_int_hex(lex: &mut logos::Lexer<Token>) -> Option<i32> {
    u64::from_str_radix(&lex.slice()[2..], 16)
        .ok()
        .map(|v| v as i32)
}

fn parse_int_dec_oct(lex: &mut logos::Lexer<Token>) -> Option<i32> {
    let s = lex.slice();
    if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8).ok().map(|v| v as i32)
    } else {
        s.parse::<u64>().ok().map(|v| v as i32)
    }
}

fn parse_float(lex: &mut logos::Lexer<Token>) -> Option<f32> {
    let s = lex.slice();
    let digits = s.strip_suffix('f').unwrap_or(s);
    digits.parse::<f32>().ok()
}

/// Unescape string literal content.
///
/// Only the escapes of the reference language are accepted; anything else
/// is a lexical error.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Decode raw 8-bit source bytes into a `String`, one scalar per byte.
///
/// NWScript sources are single-byte encoded. Mapping every byte to the
/// scalar with the same value (Latin-1) is lossless, so bytes above 0x7F
/// inside string literals round-trip through [`encode_str`].
pub fn decode_source(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode a decoded string back into 8-bit bytes.
///
/// The inverse of [`decode_source`] for any text that came from it.
/// Scalars above 0xFF cannot appear in decoded sources and are replaced
/// with `?`.
pub fn encode_str(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

impl Token {
    /// True for tokens that begin a declaration with a type specifier.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            Token::Void
                | Token::Int
                | Token::Float
                | Token::String
                | Token::Object
                | Token::Vector
                | Token::Action
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Do => "do",
            Token::For => "for",
            Token::Switch => "switch",
            Token::Case => "case",
            Token::Default => "default",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Return => "return",
            Token::Void => "void",
            Token::Int => "int",
            Token::Float => "float",
            Token::String => "string",
            Token::Object => "object",
            Token::Vector => "vector",
            Token::Action => "action",
            Token::Const => "const",
            Token::Struct => "struct",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::PlusEq => "+=",
            Token::MinusEq => "-=",
            Token::StarEq => "*=",
            Token::SlashEq => "/=",
            Token::PercentEq => "%=",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::AmpAmp => "&&",
            Token::PipePipe => "||",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Bang => "!",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Ushr => ">>>",
            Token::Eq => "=",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Newline => "<newline>",
            Token::Directive(name) => return write!(f, "#{}", name),
            Token::IntLiteral(n) => return write!(f, "{}", n),
            Token::FloatLiteral(x) => return write!(f, "{}", x),
            Token::StringLiteral(s) => return write!(f, "\"{}\"", s),
            Token::Ident(id) => return write!(f, "{}", id),
            Token::BadString => "<unterminated string>",
            Token::BadComment => "<unterminated comment>",
        };
        write!(f, "{}", s)
    }
}
