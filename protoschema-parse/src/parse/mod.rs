use std::{fmt, mem};

use logos::{Lexer, Logos, Span};

use crate::{
    ast::*,
    error::SyntaxError,
    lex::Token,
    lines::LineResolver,
    Location,
};


pub(crate) fn parse_file(location: Location, source: &str) -> Result<ProtoFileElement, SyntaxError> {
    let mut parser = Parser::new(location, source);
    match parser.parse_file() {
        Ok(file) => Ok(file),
        Err(err) => Err(parser.into_error(err)),
    }
}

/// A parse failure, before it is resolved to a line and column.
#[derive(Debug)]
pub(crate) struct Unexpected {
    message: String,
    /// The offending token, or `None` at the end of the file.
    span: Option<Span>,
}

type Result<T, E = Unexpected> = std::result::Result<T, E>;

/// The kind of declaration whose body is being parsed. Each keyword is only legal in some of
/// these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    File,
    Message,
    Enum,
    Service,
    Extend,
    Rpc,
    OneOf,
}

impl Context {
    fn permits_file_statement(self) -> bool {
        self == Context::File
    }

    fn permits_type(self) -> bool {
        matches!(self, Context::File | Context::Message)
    }

    fn permits_option(self) -> bool {
        self != Context::Extend
    }

    fn permits_reserved(self) -> bool {
        matches!(self, Context::Message | Context::Enum)
    }

    fn permits_label(self) -> bool {
        matches!(self, Context::Message | Context::Extend)
    }

    fn permits_group(self) -> bool {
        matches!(self, Context::Message | Context::OneOf)
    }

    fn permits_field(self) -> bool {
        matches!(self, Context::Message | Context::Extend | Context::OneOf)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Context::File => "file",
            Context::Message => "message",
            Context::Enum => "enum",
            Context::Service => "service",
            Context::Extend => "extend",
            Context::Rpc => "rpc",
            Context::OneOf => "oneof",
        })
    }
}

enum Declaration {
    Empty,
    Syntax(Syntax),
    Package(String),
    Import { path: String, public: bool },
    Option(OptionElement),
    Type(TypeElement),
    Service(ServiceElement),
    Extend(ExtendElement),
    Rpc(RpcElement),
    OneOf(OneOfElement),
    Extensions(Vec<ExtensionsElement>),
    Reserved(ReservedElement),
    Field(FieldElement),
    Group(GroupElement),
    EnumConstant(EnumConstantElement),
}

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a, Token<'a>>,
    peek: Option<(Token<'a>, Span)>,
    lines: LineResolver,
    file: Location,
    syntax: Option<Syntax>,
    declaration_count: usize,
}

impl<'a> Parser<'a> {
    pub fn new(file: Location, source: &'a str) -> Self {
        Parser {
            lexer: Token::lexer(source),
            peek: None,
            lines: LineResolver::new(source),
            file,
            syntax: None,
            declaration_count: 0,
        }
    }

    fn into_error(self, err: Unexpected) -> SyntaxError {
        let source = self.lexer.source();
        let offset = match &err.span {
            Some(span) => span.start,
            None => source.len(),
        };
        let location = self.lines.location(&self.file, offset);
        SyntaxError::new(location, err.message, err.span, source)
    }

    fn parse_file(&mut self) -> Result<ProtoFileElement> {
        let mut file = ProtoFileElement::empty(self.file.clone());

        loop {
            let documentation = self.read_documentation()?;
            let span = match self.peek()? {
                Some((_, span)) => span,
                None => break,
            };

            match self.parse_declaration(Context::File, documentation)? {
                Declaration::Empty => continue,
                Declaration::Syntax(syntax) => file.syntax = Some(syntax),
                Declaration::Package(name) => {
                    if file.package_name.is_some() {
                        return Err(self.error(span, "too many package names"));
                    }
                    file.package_name = Some(name);
                }
                Declaration::Import { path, public } => {
                    if public {
                        file.public_imports.push(path);
                    } else {
                        file.imports.push(path);
                    }
                }
                Declaration::Option(option) => file.options.push(option),
                Declaration::Type(ty) => file.types.push(ty),
                Declaration::Service(service) => file.services.push(service),
                Declaration::Extend(extend) => file.extend_declarations.push(extend),
                _ => unreachable!("declaration not permitted in file"),
            }
            self.declaration_count += 1;
        }

        Ok(file)
    }

    fn parse_declaration(&mut self, context: Context, documentation: String) -> Result<Declaration> {
        let (token, span) = match self.peek()? {
            Some(token) => token,
            None => return self.unexpected_token("'}'"),
        };
        let location = self.location(&span);

        let word = match token {
            Token::Semicolon => {
                self.bump();
                return Ok(Declaration::Empty);
            }
            Token::Ident(word) => word,
            Token::Dot if context.permits_field() => {
                let label = self.implicit_label(context);
                return self.parse_field(location, documentation, label, context);
            }
            _ => return self.unexpected_token("a declaration"),
        };

        match word {
            "syntax" => {
                self.check_context(context.permits_file_statement(), &span, word, context)?;
                if self.declaration_count != 0 {
                    return Err(self.error(span, "too late to declare a syntax"));
                }
                self.bump();
                self.expect_eq(Token::Equals)?;
                let (value, value_span) = self.parse_string()?;
                let syntax = match value.as_str() {
                    "proto2" => Syntax::Proto2,
                    "proto3" => Syntax::Proto3,
                    _ => {
                        return Err(self.error(value_span, "'syntax' must be 'proto2' or 'proto3'"))
                    }
                };
                self.expect_statement_end()?;
                self.syntax = Some(syntax);
                Ok(Declaration::Syntax(syntax))
            }
            "package" => {
                self.check_context(context.permits_file_statement(), &span, word, context)?;
                self.bump();
                let name = self.parse_dotted_name()?;
                self.expect_statement_end()?;
                Ok(Declaration::Package(name))
            }
            "import" => {
                self.check_context(context.permits_file_statement(), &span, word, context)?;
                self.bump();
                let public = self.bump_if_eq(Token::PUBLIC)?;
                if !public {
                    self.bump_if_eq(Token::WEAK)?;
                }
                let (path, _) = self.parse_string()?;
                self.expect_statement_end()?;
                Ok(Declaration::Import { path, public })
            }
            "option" => {
                self.check_context(context.permits_option(), &span, word, context)?;
                self.bump();
                let option = self.parse_option(Token::Equals)?;
                self.expect_statement_end()?;
                Ok(Declaration::Option(option))
            }
            "message" => {
                self.check_context(context.permits_type(), &span, word, context)?;
                self.bump();
                let message = self.parse_message(location, documentation)?;
                Ok(Declaration::Type(TypeElement::Message(message)))
            }
            "enum" => {
                self.check_context(context.permits_type(), &span, word, context)?;
                self.bump();
                let enum_ = self.parse_enum(location, documentation)?;
                Ok(Declaration::Type(TypeElement::Enum(enum_)))
            }
            "service" => {
                self.check_context(context.permits_file_statement(), &span, word, context)?;
                self.bump();
                Ok(Declaration::Service(
                    self.parse_service(location, documentation)?,
                ))
            }
            "extend" => {
                self.check_context(context.permits_type(), &span, word, context)?;
                self.bump();
                Ok(Declaration::Extend(self.parse_extend(location, documentation)?))
            }
            "rpc" => {
                self.check_context(context == Context::Service, &span, word, context)?;
                self.bump();
                Ok(Declaration::Rpc(self.parse_rpc(location, documentation)?))
            }
            "oneof" => {
                self.check_context(context == Context::Message, &span, word, context)?;
                self.bump();
                Ok(Declaration::OneOf(self.parse_oneof(location, documentation)?))
            }
            "extensions" => {
                self.check_context(context == Context::Message, &span, word, context)?;
                self.bump();
                Ok(Declaration::Extensions(
                    self.parse_extensions(location, documentation)?,
                ))
            }
            "reserved" => {
                self.check_context(context.permits_reserved(), &span, word, context)?;
                self.bump();
                Ok(Declaration::Reserved(
                    self.parse_reserved(location, documentation)?,
                ))
            }
            "optional" | "required" | "repeated" => {
                self.check_context(context.permits_label(), &span, word, context)?;
                let label = match word {
                    "optional" => Label::Optional,
                    "required" => Label::Required,
                    _ => Label::Repeated,
                };
                if self.syntax == Some(Syntax::Proto3) && label != Label::Repeated {
                    return Err(self.error(
                        span,
                        format!("'{}' label forbidden in proto3 field declarations", word),
                    ));
                }
                self.bump();
                self.parse_field(location, documentation, Some(label), context)
            }
            _ if context.permits_field() => {
                let label = self.implicit_label(context);
                self.parse_field(location, documentation, label, context)
            }
            _ if context == Context::Enum => {
                self.bump();
                Ok(Declaration::EnumConstant(self.parse_enum_constant(
                    location,
                    documentation,
                    word.to_owned(),
                )?))
            }
            _ => Err(self.error(span, format!("unexpected label: {}", word))),
        }
    }

    fn implicit_label(&self, context: Context) -> Option<Label> {
        match context {
            Context::OneOf => Some(Label::OneOf),
            _ => None,
        }
    }

    fn check_context(&self, permitted: bool, span: &Span, label: &str, context: Context) -> Result<()> {
        if permitted {
            Ok(())
        } else {
            Err(self.error(span.clone(), format!("'{}' in {}", label, context)))
        }
    }

    fn parse_message(&mut self, location: Location, documentation: String) -> Result<MessageElement> {
        let (name, _) = self.parse_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut message = MessageElement::new(location, name);
        message.documentation = documentation;

        loop {
            let documentation = self.read_documentation()?;
            if self.bump_if_eq(Token::RightBrace)? {
                break;
            }

            match self.parse_declaration(Context::Message, documentation)? {
                Declaration::Empty => {}
                Declaration::Field(field) => message.fields.push(field),
                Declaration::OneOf(one_of) => message.one_ofs.push(one_of),
                Declaration::Type(ty) => message.nested_types.push(ty),
                Declaration::Extensions(extensions) => message.extensions.extend(extensions),
                Declaration::Reserved(reserved) => message.reserveds.push(reserved),
                Declaration::Option(option) => message.options.push(option),
                Declaration::Group(group) => message.groups.push(group),
                Declaration::Extend(extend) => message.extend_declarations.push(extend),
                _ => unreachable!("declaration not permitted in message"),
            }
        }

        Ok(message)
    }

    fn parse_enum(&mut self, location: Location, documentation: String) -> Result<EnumElement> {
        let (name, _) = self.parse_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut enum_ = EnumElement {
            location,
            name,
            documentation,
            options: Vec::new(),
            constants: Vec::new(),
            reserveds: Vec::new(),
        };

        loop {
            let documentation = self.read_documentation()?;
            if self.bump_if_eq(Token::RightBrace)? {
                break;
            }

            match self.parse_declaration(Context::Enum, documentation)? {
                Declaration::Empty => {}
                Declaration::EnumConstant(constant) => enum_.constants.push(constant),
                Declaration::Option(option) => enum_.options.push(option),
                Declaration::Reserved(reserved) => enum_.reserveds.push(reserved),
                _ => unreachable!("declaration not permitted in enum"),
            }
        }

        Ok(enum_)
    }

    fn parse_enum_constant(
        &mut self,
        location: Location,
        documentation: String,
        name: String,
    ) -> Result<EnumConstantElement> {
        self.expect_eq(Token::Equals)?;
        let tag = self.parse_int()?;
        let options = self.parse_bracketed_options()?;
        self.expect_eq(Token::Semicolon)?;
        let documentation = self.read_trailing_documentation(documentation)?;

        Ok(EnumConstantElement {
            location,
            name,
            tag,
            documentation,
            options,
        })
    }

    fn parse_field(
        &mut self,
        location: Location,
        documentation: String,
        label: Option<Label>,
        context: Context,
    ) -> Result<Declaration> {
        if let Some(span) = self.peek_eq(Token::GROUP)? {
            self.check_context(context.permits_group(), &span, "group", context)?;
            self.bump();
            return Ok(Declaration::Group(self.parse_group(
                location,
                documentation,
                label,
            )?));
        }

        let ty = self.parse_field_type()?;
        let (name, _) = self.parse_ident()?;
        self.expect_eq(Token::Equals)?;
        let tag = self.parse_int()?;
        let options = self.parse_bracketed_options()?;
        self.expect_eq(Token::Semicolon)?;
        let documentation = self.read_trailing_documentation(documentation)?;

        Ok(Declaration::Field(FieldElement {
            location,
            label,
            ty,
            name,
            tag,
            documentation,
            options,
        }))
    }

    fn parse_group(
        &mut self,
        location: Location,
        documentation: String,
        label: Option<Label>,
    ) -> Result<GroupElement> {
        let (name, _) = self.parse_ident()?;
        self.expect_eq(Token::Equals)?;
        let tag = self.parse_int()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut fields = Vec::new();
        loop {
            let documentation = self.read_documentation()?;
            let span = match self.peek()? {
                Some((Token::RightBrace, _)) => {
                    self.bump();
                    break;
                }
                Some((_, span)) => span,
                None => return self.unexpected_token("'}'"),
            };

            match self.parse_declaration(Context::Message, documentation)? {
                Declaration::Empty => {}
                Declaration::Field(field) => fields.push(field),
                _ => return Err(self.error(span, "groups may only contain fields")),
            }
        }

        Ok(GroupElement {
            location,
            label,
            name,
            tag,
            documentation,
            fields,
        })
    }

    fn parse_oneof(&mut self, location: Location, documentation: String) -> Result<OneOfElement> {
        let (name, _) = self.parse_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut one_of = OneOfElement {
            location,
            name,
            documentation,
            fields: Vec::new(),
            groups: Vec::new(),
            options: Vec::new(),
        };

        loop {
            let documentation = self.read_documentation()?;
            if self.bump_if_eq(Token::RightBrace)? {
                break;
            }

            match self.parse_declaration(Context::OneOf, documentation)? {
                Declaration::Empty => {}
                Declaration::Field(field) => one_of.fields.push(field),
                Declaration::Group(group) => one_of.groups.push(group),
                Declaration::Option(option) => one_of.options.push(option),
                _ => unreachable!("declaration not permitted in oneof"),
            }
        }

        Ok(one_of)
    }

    fn parse_extend(&mut self, location: Location, documentation: String) -> Result<ExtendElement> {
        let name = self.parse_type_name()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut fields = Vec::new();
        loop {
            let documentation = self.read_documentation()?;
            if self.bump_if_eq(Token::RightBrace)? {
                break;
            }

            match self.parse_declaration(Context::Extend, documentation)? {
                Declaration::Empty => {}
                Declaration::Field(field) => fields.push(field),
                _ => unreachable!("declaration not permitted in extend"),
            }
        }

        Ok(ExtendElement {
            location,
            name,
            documentation,
            fields,
        })
    }

    fn parse_service(&mut self, location: Location, documentation: String) -> Result<ServiceElement> {
        let (name, _) = self.parse_ident()?;
        self.expect_eq(Token::LeftBrace)?;

        let mut service = ServiceElement {
            location,
            name,
            documentation,
            rpcs: Vec::new(),
            options: Vec::new(),
        };

        loop {
            let documentation = self.read_documentation()?;
            if self.bump_if_eq(Token::RightBrace)? {
                break;
            }

            match self.parse_declaration(Context::Service, documentation)? {
                Declaration::Empty => {}
                Declaration::Rpc(rpc) => service.rpcs.push(rpc),
                Declaration::Option(option) => service.options.push(option),
                _ => unreachable!("declaration not permitted in service"),
            }
        }

        Ok(service)
    }

    fn parse_rpc(&mut self, location: Location, documentation: String) -> Result<RpcElement> {
        let (name, _) = self.parse_ident()?;

        self.expect_eq(Token::LeftParen)?;
        let (request_streaming, request_type) = self.parse_rpc_type()?;
        self.expect_eq(Token::RightParen)?;

        self.expect_eq(Token::RETURNS)?;

        self.expect_eq(Token::LeftParen)?;
        let (response_streaming, response_type) = self.parse_rpc_type()?;
        self.expect_eq(Token::RightParen)?;

        let mut rpc = RpcElement {
            location,
            name,
            documentation,
            request_type,
            response_type,
            request_streaming,
            response_streaming,
            options: Vec::new(),
        };

        if self.bump_if_eq(Token::LeftBrace)? {
            loop {
                let documentation = self.read_documentation()?;
                if self.bump_if_eq(Token::RightBrace)? {
                    break;
                }

                match self.parse_declaration(Context::Rpc, documentation)? {
                    Declaration::Empty => {}
                    Declaration::Option(option) => rpc.options.push(option),
                    _ => unreachable!("declaration not permitted in rpc"),
                }
            }
        } else {
            self.expect_eq(Token::Semicolon)?;
            rpc.documentation = self.read_trailing_documentation(mem::take(&mut rpc.documentation))?;
        }

        Ok(rpc)
    }

    fn parse_rpc_type(&mut self) -> Result<(bool, String)> {
        if self.bump_if_eq(Token::STREAM)? {
            // A message may itself be named 'stream'.
            if let Some((Token::RightParen, _)) = self.peek()? {
                return Ok((false, "stream".to_owned()));
            }
            Ok((true, self.parse_type_name()?))
        } else {
            Ok((false, self.parse_type_name()?))
        }
    }

    fn parse_extensions(
        &mut self,
        location: Location,
        documentation: String,
    ) -> Result<Vec<ExtensionsElement>> {
        let mut ranges = Vec::new();
        loop {
            let start = self.parse_int()?;
            let end = if self.bump_if_eq(Token::TO)? {
                self.parse_range_end()?
            } else {
                start
            };
            ranges.push((start, end));

            if !self.bump_if_eq(Token::Comma)? {
                break;
            }
        }

        // Declaration options on extension ranges carry no meaning here.
        self.parse_bracketed_options()?;
        self.expect_eq(Token::Semicolon)?;
        let documentation = self.read_trailing_documentation(documentation)?;

        Ok(ranges
            .into_iter()
            .map(|(start, end)| ExtensionsElement {
                location: location.clone(),
                documentation: documentation.clone(),
                start,
                end,
            })
            .collect())
    }

    fn parse_reserved(&mut self, location: Location, documentation: String) -> Result<ReservedElement> {
        let mut reserved = ReservedElement {
            location,
            documentation: String::new(),
            tags: Vec::new(),
            ranges: Vec::new(),
            names: Vec::new(),
        };

        loop {
            if let Some((Token::StringLiteral(_), _)) = self.peek()? {
                let (name, _) = self.parse_string()?;
                reserved.names.push(name);
            } else {
                let start = self.parse_int()?;
                if self.bump_if_eq(Token::TO)? {
                    let end = self.parse_range_end()?;
                    reserved.ranges.push(start..=end);
                } else {
                    reserved.tags.push(start);
                }
            }

            if !self.bump_if_eq(Token::Comma)? {
                break;
            }
        }

        self.expect_eq(Token::Semicolon)?;
        reserved.documentation = self.read_trailing_documentation(documentation)?;
        Ok(reserved)
    }

    fn parse_range_end(&mut self) -> Result<i32> {
        if self.bump_if_eq(Token::MAX)? {
            Ok(MAX_TAG_VALUE)
        } else {
            self.parse_int()
        }
    }

    fn parse_bracketed_options(&mut self) -> Result<Vec<OptionElement>> {
        let mut options = Vec::new();
        if !self.bump_if_eq(Token::LeftBracket)? {
            return Ok(options);
        }

        loop {
            options.push(self.parse_option(Token::Equals)?);
            if !self.bump_if_eq(Token::Comma)? {
                self.expect_eq(Token::RightBracket)?;
                return Ok(options);
            }
        }
    }

    /// Parses `name = value`, where `name` may be parenthesized and followed by a nested field
    /// path. Inside text-format maps the separator is ':', which may be omitted before '{'.
    fn parse_option(&mut self, separator: Token<'static>) -> Result<OptionElement> {
        let (name, is_parenthesized) = self.parse_option_name()?;

        let mut nested_name = None;
        if is_parenthesized && self.bump_if_eq(Token::Dot)? {
            nested_name = Some(self.parse_dotted_name()?);
        }

        let omitted_separator =
            separator == Token::Colon && matches!(self.peek()?, Some((Token::LeftBrace, _)));
        if !omitted_separator {
            self.expect_eq(separator)?;
        }

        let mut value = self.parse_option_value()?;
        if let Some(nested_name) = nested_name {
            value = OptionValue::Option(Box::new(OptionElement::new(nested_name, value)));
        }

        Ok(OptionElement {
            name,
            value,
            is_parenthesized,
        })
    }

    fn parse_option_name(&mut self) -> Result<(String, bool)> {
        if self.bump_if_eq(Token::LeftParen)? {
            let name = self.parse_type_name()?;
            self.expect_eq(Token::RightParen)?;
            Ok((name, true))
        } else if self.bump_if_eq(Token::LeftBracket)? {
            let name = self.parse_type_name()?;
            self.expect_eq(Token::RightBracket)?;
            Ok((format!("[{}]", name), false))
        } else {
            Ok((self.parse_dotted_name()?, false))
        }
    }

    fn parse_option_value(&mut self) -> Result<OptionValue> {
        match self.peek()? {
            Some((Token::LeftBrace, _)) => {
                self.bump();
                Ok(OptionValue::Map(self.parse_option_map()?))
            }
            Some((Token::LeftBracket, _)) => {
                self.bump();
                Ok(OptionValue::List(self.parse_option_list()?))
            }
            Some((Token::StringLiteral(_), _)) => Ok(OptionValue::String(self.parse_string()?.0)),
            Some((Token::Minus, _)) => {
                self.bump();
                match self.peek()? {
                    Some((Token::Number(value) | Token::Ident(value), _)) => {
                        self.bump();
                        Ok(OptionValue::Number(format!("-{}", value)))
                    }
                    _ => self.unexpected_token("a number"),
                }
            }
            Some((Token::Number(value), _)) => {
                self.bump();
                Ok(OptionValue::Number(value.to_owned()))
            }
            Some((Token::Ident(_), _)) => {
                if self.bump_if_eq(Token::TRUE)? {
                    Ok(OptionValue::Boolean(true))
                } else if self.bump_if_eq(Token::FALSE)? {
                    Ok(OptionValue::Boolean(false))
                } else {
                    Ok(OptionValue::Enum(self.parse_dotted_name()?))
                }
            }
            _ => self.unexpected_token("an option value"),
        }
    }

    fn parse_option_map(&mut self) -> Result<Vec<(String, OptionValue)>> {
        let mut entries = Vec::new();
        loop {
            if self.bump_if_eq(Token::RightBrace)? {
                return Ok(entries);
            }

            let option = self.parse_option(Token::Colon)?;
            match option.value {
                OptionValue::Option(nested) => {
                    let entry = entry_mut(&mut entries, option.name);
                    if !matches!(entry, OptionValue::Map(_)) {
                        *entry = OptionValue::Map(Vec::new());
                    }
                    if let OptionValue::Map(nested_entries) = entry {
                        *entry_mut(nested_entries, nested.name) = nested.value;
                    }
                }
                value => merge_map_value(&mut entries, option.name, value),
            }

            if !self.bump_if_eq(Token::Comma)? {
                self.bump_if_eq(Token::Semicolon)?;
            }
        }
    }

    fn parse_option_list(&mut self) -> Result<Vec<OptionValue>> {
        let mut values = Vec::new();
        loop {
            if self.bump_if_eq(Token::RightBracket)? {
                return Ok(values);
            }

            values.push(self.parse_option_value()?);
            if !self.bump_if_eq(Token::Comma)? && !matches!(self.peek()?, Some((Token::RightBracket, _))) {
                return self.unexpected_token("',' or ']'");
            }
        }
    }

    /// Parses a field type, including `map<K, V>`.
    fn parse_field_type(&mut self) -> Result<String> {
        if self.bump_if_eq(Token::MAP)? {
            if self.bump_if_eq(Token::LeftAngleBracket)? {
                let key = self.parse_type_name()?;
                self.expect_eq(Token::Comma)?;
                let value = self.parse_type_name()?;
                self.expect_eq(Token::RightAngleBracket)?;
                return Ok(format!("map<{}, {}>", key, value));
            }

            // A message may itself be named 'map'.
            let mut name = "map".to_owned();
            while self.bump_if_eq(Token::Dot)? {
                name.push('.');
                name.push_str(&self.parse_ident()?.0);
            }
            return Ok(name);
        }

        self.parse_type_name()
    }

    /// Parses a possibly fully-qualified type name such as `.foo.Bar`.
    fn parse_type_name(&mut self) -> Result<String> {
        if self.bump_if_eq(Token::Dot)? {
            Ok(format!(".{}", self.parse_dotted_name()?))
        } else {
            self.parse_dotted_name()
        }
    }

    fn parse_dotted_name(&mut self) -> Result<String> {
        let (mut name, _) = self.parse_ident()?;
        while self.bump_if_eq(Token::Dot)? {
            name.push('.');
            name.push_str(&self.parse_ident()?.0);
        }
        Ok(name)
    }

    fn parse_ident(&mut self) -> Result<(String, Span)> {
        match self.peek()? {
            Some((Token::Ident(value), span)) => {
                self.bump();
                Ok((value.to_owned(), span))
            }
            _ => self.unexpected_token("an identifier"),
        }
    }

    fn parse_int(&mut self) -> Result<i32> {
        let negative = self.bump_if_eq(Token::Minus)?;
        match self.peek()? {
            Some((Token::Number(text), span)) => {
                self.bump();
                match parse_int_literal(negative, text) {
                    Some(value) => Ok(value),
                    None => Err(self.error(
                        span,
                        format!(
                            "expected an integer but was {}{}",
                            if negative { "-" } else { "" },
                            text
                        ),
                    )),
                }
            }
            Some((Token::Ident(text), span)) => Err(self.error(
                span,
                format!("expected an integer but was {}", text),
            )),
            _ => self.unexpected_token("an integer"),
        }
    }

    /// Parses a string literal, concatenating any adjacent literals.
    fn parse_string(&mut self) -> Result<(String, Span)> {
        match self.peek()? {
            Some((Token::StringLiteral(mut value), span)) => {
                self.bump();
                while let Some((Token::StringLiteral(next), _)) = self.peek()? {
                    self.bump();
                    value.push_str(&next);
                }
                Ok((value, span))
            }
            _ => self.unexpected_token("a string"),
        }
    }

    /// Expects the `;` ending a statement that has no documentation of its own, discarding any
    /// comment that follows it on the same line.
    fn expect_statement_end(&mut self) -> Result<()> {
        self.expect_eq(Token::Semicolon)?;
        self.read_trailing_documentation(String::new())?;
        Ok(())
    }

    /// Collects the comments preceding a declaration.
    fn read_documentation(&mut self) -> Result<String> {
        let mut result: Option<String> = None;
        loop {
            let comment = match self.peek_raw()? {
                Some((Token::Newline, _)) => {
                    self.bump();
                    continue;
                }
                Some((Token::LineComment(text), _)) => text.to_owned(),
                Some((Token::BlockComment(text), _)) => text,
                _ => return Ok(result.unwrap_or_default()),
            };
            self.bump();

            match &mut result {
                Some(result) => {
                    result.push('\n');
                    result.push_str(&comment);
                }
                None => result = Some(comment),
            }
        }
    }

    /// Appends a comment on the same line as the `;` just consumed to `documentation`.
    fn read_trailing_documentation(&mut self, documentation: String) -> Result<String> {
        let trailing = match self.peek_raw()? {
            Some((Token::LineComment(text), _)) => {
                self.bump();
                text.trim_end().to_owned()
            }
            Some((Token::BlockComment(text), span)) => {
                if self.lexer.source()[span.clone()].contains('\n') {
                    return Err(self.error(span, "trailing comment must be closed on the same line"));
                }
                self.bump();
                match self.peek_raw()? {
                    None | Some((Token::Newline, _)) => {}
                    Some((_, span)) => {
                        return Err(self.error(span, "no syntax may follow trailing comment"))
                    }
                }
                text
            }
            _ => return Ok(documentation),
        };

        if trailing.is_empty() {
            Ok(documentation)
        } else if documentation.is_empty() {
            Ok(trailing)
        } else {
            Ok(format!("{}\n{}", documentation, trailing))
        }
    }

    fn expect_eq(&mut self, t: Token<'static>) -> Result<Span> {
        match self.peek()? {
            Some((tok, span)) if tok == t => {
                self.bump();
                Ok(span)
            }
            _ => self.unexpected_token(format!("'{}'", t)),
        }
    }

    fn peek_eq(&mut self, t: Token<'static>) -> Result<Option<Span>> {
        match self.peek()? {
            Some((tok, span)) if tok == t => Ok(Some(span)),
            _ => Ok(None),
        }
    }

    fn bump_if_eq(&mut self, t: Token<'static>) -> Result<bool> {
        match self.peek()? {
            Some((tok, _)) if tok == t => {
                self.bump();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn bump(&mut self) -> (Token<'a>, Span) {
        self.peek
            .take()
            .expect("called bump without peek returning Some()")
    }

    /// Peeks the next token, skipping newlines and comments.
    fn peek(&mut self) -> Result<Option<(Token<'a>, Span)>> {
        loop {
            match self.peek_raw()? {
                Some((Token::Newline | Token::LineComment(_) | Token::BlockComment(_), _)) => {
                    self.bump();
                }
                token => return Ok(token),
            }
        }
    }

    fn peek_raw(&mut self) -> Result<Option<(Token<'a>, Span)>> {
        if self.peek.is_none() {
            self.peek = match self.lexer.next() {
                Some(Ok(token)) => Some((token, self.lexer.span())),
                Some(Err(())) => {
                    let message = match self.lexer.extras.error.take() {
                        Some(message) => message,
                        None => format!("unexpected character '{}'", self.lexer.slice()),
                    };
                    return Err(self.error(self.lexer.span(), message));
                }
                None => None,
            };
        }
        Ok(self.peek.clone())
    }

    fn unexpected_token<T>(&mut self, expected: impl fmt::Display) -> Result<T> {
        match self.peek()? {
            Some((found, span)) => Err(self.error(
                span,
                format!("expected {}, but found '{}'", expected, found),
            )),
            None => Err(Unexpected {
                message: format!("expected {}, but reached end of file", expected),
                span: None,
            }),
        }
    }

    fn error(&self, span: Span, message: impl Into<String>) -> Unexpected {
        Unexpected {
            message: message.into(),
            span: Some(span),
        }
    }

    fn location(&self, span: &Span) -> Location {
        self.lines.location(&self.file, span.start)
    }
}

fn parse_int_literal(negative: bool, text: &str) -> Option<i32> {
    let magnitude = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(&text[1..], 8).ok()?
    } else {
        text.parse::<i64>().ok()?
    };

    let value = if negative { -magnitude } else { magnitude };
    value.try_into().ok()
}

fn entry_mut(entries: &mut Vec<(String, OptionValue)>, key: String) -> &mut OptionValue {
    let index = match entries.iter().position(|(k, _)| *k == key) {
        Some(index) => index,
        None => {
            entries.push((key, OptionValue::Map(Vec::new())));
            entries.len() - 1
        }
    };
    &mut entries[index].1
}

/// Adds a value to a text-format map, turning repeated keys into a list.
fn merge_map_value(entries: &mut Vec<(String, OptionValue)>, key: String, value: OptionValue) {
    let previous = match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, previous)) => previous,
        None => {
            entries.push((key, value));
            return;
        }
    };

    let mut list = match mem::replace(previous, OptionValue::List(Vec::new())) {
        OptionValue::List(list) => list,
        value => vec![value],
    };
    match value {
        OptionValue::List(values) => list.extend(values),
        value => list.push(value),
    }
    *previous = OptionValue::List(list);
}
