use super::*;

#[test]
fn simple_tokens() {
    let source = r#"hell0 052 42 0x2A 5. 0.5 0.42e+2 2e-4 .2e+3 true
        false "hello \a\b\f\n\r\t\v\?\\\'\" \052 \x2a" 'hello 😀' _foo"#;
    let mut lexer = Token::lexer(source);

    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("hell0")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("052")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("42")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("0x2A")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("5.")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("0.5")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("0.42e+2")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number("2e-4")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Number(".2e+3")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::TRUE));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Newline));
    assert_eq!(lexer.next().unwrap(), Ok(Token::FALSE));
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral(
            "hello \x07\x08\x0c\n\r\t\x0b?\\'\" * *".to_owned()
        ))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral("hello 😀".to_owned()))
    );
    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("_foo")));
    assert_eq!(lexer.next(), None);

    assert_eq!(lexer.extras.error, None);
}

#[test]
fn string_escapes() {
    let source = r#"'\1\12\123\1234' "\xA\X4a\x4a5" "it's" 'say "hi"'"#;
    let mut lexer = Token::lexer(source);

    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral("\x01\nS\x534".to_owned()))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral("\nJJ5".to_owned()))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral("it's".to_owned()))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::StringLiteral("say \"hi\"".to_owned()))
    );
    assert_eq!(lexer.next(), None);
}

#[test]
fn unterminated_string() {
    let mut lexer = Token::lexer("\"hello\nworld\"");

    assert_eq!(lexer.next(), Some(Err(())));
    assert_eq!(lexer.span(), 0..6);
    assert_eq!(lexer.extras.error.as_deref(), Some("unterminated string"));
}

#[test]
fn unterminated_string_at_eof() {
    let mut lexer = Token::lexer("'hello");

    assert_eq!(lexer.next(), Some(Err(())));
    assert_eq!(lexer.extras.error.as_deref(), Some("unterminated string"));
}

#[test]
fn invalid_string_escape() {
    let mut lexer = Token::lexer(r#""\xg""#);

    assert_eq!(lexer.next(), Some(Err(())));
    assert_eq!(lexer.extras.error.as_deref(), Some("invalid string escape"));
}

#[test]
fn line_comments() {
    let source = "foo // bar  \r\n//baz\n//\n";
    let mut lexer = Token::lexer(source);

    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::LineComment("bar  ")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Newline));
    assert_eq!(lexer.next().unwrap(), Ok(Token::LineComment("baz")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Newline));
    assert_eq!(lexer.next().unwrap(), Ok(Token::LineComment("")));
    assert_eq!(lexer.next().unwrap(), Ok(Token::Newline));
    assert_eq!(lexer.next(), None);
}

#[test]
fn block_comments() {
    let source = "/* one */ /**\n * two\n *   three\n */ /*\n  four\n*/";
    let mut lexer = Token::lexer(source);

    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::BlockComment("one".to_owned()))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::BlockComment("two\n  three".to_owned()))
    );
    assert_eq!(
        lexer.next().unwrap(),
        Ok(Token::BlockComment("four".to_owned()))
    );
    assert_eq!(lexer.next(), None);
}

#[test]
fn unterminated_block_comment() {
    let mut lexer = Token::lexer("foo /* bar");

    assert_eq!(lexer.next().unwrap(), Ok(Token::Ident("foo")));
    assert_eq!(lexer.next(), Some(Err(())));
    assert_eq!(lexer.extras.error.as_deref(), Some("unterminated comment"));
}

#[test]
fn punctuation() {
    let source = "map<a, .b> = (c)[d]{e}:-;";
    let mut lexer = Token::lexer(source);

    let tokens: Vec<_> = lexer.by_ref().map(Result::unwrap).collect();
    assert_eq!(
        tokens,
        vec![
            Token::MAP,
            Token::LeftAngleBracket,
            Token::Ident("a"),
            Token::Comma,
            Token::Dot,
            Token::Ident("b"),
            Token::RightAngleBracket,
            Token::Equals,
            Token::LeftParen,
            Token::Ident("c"),
            Token::RightParen,
            Token::LeftBracket,
            Token::Ident("d"),
            Token::RightBracket,
            Token::LeftBrace,
            Token::Ident("e"),
            Token::RightBrace,
            Token::Colon,
            Token::Minus,
            Token::Semicolon,
        ]
    );
}
