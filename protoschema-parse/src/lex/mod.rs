#[cfg(test)]
mod tests;

use std::fmt;

use logos::{Lexer, Logos};

#[derive(Debug, Clone, Logos, PartialEq, Eq)]
#[logos(extras = TokenExtras)]
#[logos(skip r"[\t\v\f\r ]+")]
#[logos(subpattern exponent = r"[eE][+\-]?[0-9]+")]
pub(crate) enum Token<'a> {
    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident(&'a str),
    #[regex("[0-9]+")]
    #[regex("0[xX][0-9A-Fa-f]+")]
    #[regex(r#"[0-9]+\.[0-9]*(?&exponent)?"#)]
    #[regex(r#"[0-9]+(?&exponent)"#)]
    #[regex(r#"\.[0-9]+(?&exponent)?"#)]
    Number(&'a str),
    #[regex(r#"'|""#, string)]
    StringLiteral(String),
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token("<")]
    LeftAngleBracket,
    #[token(">")]
    RightAngleBracket,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[regex(r#"//[^\n]*"#, line_comment)]
    LineComment(&'a str),
    #[token("/*", block_comment)]
    BlockComment(String),
    #[token("\n")]
    Newline,
}

impl Token<'_> {
    pub const WEAK: Token<'static> = Token::Ident("weak");
    pub const PUBLIC: Token<'static> = Token::Ident("public");
    pub const STREAM: Token<'static> = Token::Ident("stream");
    pub const RETURNS: Token<'static> = Token::Ident("returns");
    pub const MAP: Token<'static> = Token::Ident("map");
    pub const GROUP: Token<'static> = Token::Ident("group");
    pub const TO: Token<'static> = Token::Ident("to");
    pub const MAX: Token<'static> = Token::Ident("max");
    pub const TRUE: Token<'static> = Token::Ident("true");
    pub const FALSE: Token<'static> = Token::Ident("false");
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(value) => write!(f, "{}", value),
            Token::Number(value) => write!(f, "{}", value),
            Token::StringLiteral(value) => write!(f, "\"{}\"", value.escape_default()),
            Token::Dot => write!(f, "."),
            Token::Minus => write!(f, "-"),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::LeftBrace => write!(f, "{{"),
            Token::RightBrace => write!(f, "}}"),
            Token::LeftBracket => write!(f, "["),
            Token::RightBracket => write!(f, "]"),
            Token::LeftAngleBracket => write!(f, "<"),
            Token::RightAngleBracket => write!(f, ">"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::LineComment(value) => write!(f, "//{}", value),
            Token::BlockComment(value) => write!(f, "/*{}*/", value),
            Token::Newline => write!(f, "\\n"),
        }
    }
}

/// State shared between the lexer callbacks and the parser.
///
/// Callbacks that reject their input leave a message here so the parser can report something
/// more useful than "invalid token".
#[derive(Debug, Default)]
pub(crate) struct TokenExtras {
    pub error: Option<String>,
}

fn line_comment<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    let text = &lex.slice()[2..];
    let text = text.strip_prefix(' ').unwrap_or(text);
    text.trim_end_matches('\r')
}

fn block_comment<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<String> {
    let Some(len) = lex.remainder().find("*/") else {
        lex.extras.error = Some("unterminated comment".to_owned());
        lex.bump(lex.remainder().len());
        return None;
    };

    let body = &lex.remainder()[..len];
    lex.bump(len + 2);

    // Leading whitespace and a single '*' are stripped from each line of the comment.
    let mut result = String::with_capacity(body.len());
    let mut start_of_line = true;
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\n' {
            result.push('\n');
            start_of_line = true;
        } else if !start_of_line {
            result.push(ch);
        } else if ch == '*' {
            if chars.peek() == Some(&' ') {
                chars.next();
            }
            start_of_line = false;
        } else if !ch.is_whitespace() {
            result.push(ch);
            start_of_line = false;
        }
    }

    Some(result.trim().to_owned())
}

fn string<'a>(lex: &mut Lexer<'a, Token<'a>>) -> Option<String> {
    #[derive(Logos)]
    #[logos(subpattern hex = r"[0-9A-Fa-f]")]
    enum Component<'a> {
        #[regex(r#"[^\n\\'"]+"#)]
        Unescaped(&'a str),
        #[regex(r#"['"]"#, terminator)]
        Terminator(char),
        #[regex(r#"\\[xX](?&hex)(?&hex)?"#, hex_escape)]
        #[regex(r#"\\[0-7][0-7]?[0-7]?"#, oct_escape)]
        #[regex(r#"\\[^xX0-7\n]"#, char_escape)]
        Char(char),
    }

    fn terminator<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<char> {
        lex.slice().chars().next()
    }

    fn hex_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<char> {
        u32::from_str_radix(&lex.slice()[2..], 16)
            .ok()
            .and_then(char::from_u32)
    }

    fn oct_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<char> {
        u32::from_str_radix(&lex.slice()[1..], 8)
            .ok()
            .and_then(char::from_u32)
    }

    fn char_escape<'a>(lex: &mut Lexer<'a, Component<'a>>) -> Option<char> {
        match lex.slice()[1..].chars().next()? {
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\x0b'),
            ch => Some(ch),
        }
    }

    let mut result = String::new();

    let mut char_lexer = Component::lexer(lex.remainder());
    let terminator = lex.slice().chars().next();

    loop {
        match char_lexer.next() {
            Some(Ok(Component::Unescaped(s))) => result.push_str(s),
            Some(Ok(Component::Terminator(t))) if Some(t) == terminator => break,
            Some(Ok(Component::Terminator(ch) | Component::Char(ch))) => result.push(ch),
            Some(Err(())) if char_lexer.slice().starts_with('\\') => {
                lex.extras.error = Some("invalid string escape".to_owned());
                lex.bump(char_lexer.span().end);
                return None;
            }
            Some(Err(())) => {
                lex.extras.error = Some("unterminated string".to_owned());
                lex.bump(char_lexer.span().start);
                return None;
            }
            None => {
                lex.extras.error = Some("unterminated string".to_owned());
                lex.bump(lex.remainder().len());
                return None;
            }
        }
    }

    lex.bump(char_lexer.span().end);
    Some(result)
}
