//! Canonical `.proto` rendering of elements.

use std::fmt;

use super::*;

impl ProtoFileElement {
    /// Renders this file as `.proto` source. Parsing the result yields an equal element.
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        if let Some(syntax) = self.syntax {
            out.push_str(&format!("syntax = \"{}\";\n", syntax));
        }
        if let Some(package_name) = &self.package_name {
            out.push_str(&format!("package {};\n", package_name));
        }
        if !self.imports.is_empty() || !self.public_imports.is_empty() {
            out.push('\n');
            for file in &self.imports {
                out.push_str(&format!("import \"{}\";\n", Escaped(file)));
            }
            for file in &self.public_imports {
                out.push_str(&format!("import public \"{}\";\n", Escaped(file)));
            }
        }
        if !self.options.is_empty() {
            out.push('\n');
            for option in &self.options {
                out.push_str(&option.to_schema_declaration());
            }
        }
        for ty in &self.types {
            out.push('\n');
            out.push_str(&ty.to_schema());
        }
        for extend in &self.extend_declarations {
            out.push('\n');
            out.push_str(&extend.to_schema());
        }
        for service in &self.services {
            out.push('\n');
            out.push_str(&service.to_schema());
        }
        out
    }
}

impl TypeElement {
    pub fn to_schema(&self) -> String {
        match self {
            TypeElement::Message(message) => message.to_schema(),
            TypeElement::Enum(enum_) => enum_.to_schema(),
        }
    }
}

impl MessageElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("message {} {{", self.name));
        append_section(&mut out, &self.reserveds, ReservedElement::to_schema);
        append_section(&mut out, &self.options, OptionElement::to_schema_declaration);
        append_section(&mut out, &self.fields, FieldElement::to_schema);
        append_section(&mut out, &self.one_ofs, OneOfElement::to_schema);
        append_section(&mut out, &self.groups, GroupElement::to_schema);
        append_section(&mut out, &self.extensions, ExtensionsElement::to_schema);
        append_section(&mut out, &self.nested_types, TypeElement::to_schema);
        append_section(&mut out, &self.extend_declarations, ExtendElement::to_schema);
        out.push_str("}\n");
        out
    }
}

impl EnumElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("enum {} {{", self.name));
        append_section(&mut out, &self.reserveds, ReservedElement::to_schema);
        append_section(&mut out, &self.options, OptionElement::to_schema_declaration);
        append_section(&mut out, &self.constants, EnumConstantElement::to_schema);
        out.push_str("}\n");
        out
    }
}

impl EnumConstantElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("{} = {}", self.name, self.tag));
        append_options(&mut out, &self.options);
        out.push_str(";\n");
        out
    }
}

impl FieldElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        append_label(&mut out, self.label);
        out.push_str(&format!("{} {} = {}", self.ty, self.name, self.tag));
        append_options(&mut out, &self.options);
        out.push_str(";\n");
        out
    }
}

impl OneOfElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("oneof {} {{", self.name));
        append_section(&mut out, &self.options, OptionElement::to_schema_declaration);
        append_section(&mut out, &self.fields, FieldElement::to_schema);
        append_section(&mut out, &self.groups, GroupElement::to_schema);
        out.push_str("}\n");
        out
    }
}

impl GroupElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        append_label(&mut out, self.label);
        out.push_str(&format!("group {} = {} {{", self.name, self.tag));
        append_section(&mut out, &self.fields, FieldElement::to_schema);
        out.push_str("}\n");
        out
    }
}

impl ExtendElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("extend {} {{", self.name));
        append_section(&mut out, &self.fields, FieldElement::to_schema);
        out.push_str("}\n");
        out
    }
}

impl ServiceElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("service {} {{", self.name));
        append_section(&mut out, &self.options, OptionElement::to_schema_declaration);
        append_section(&mut out, &self.rpcs, RpcElement::to_schema);
        out.push_str("}\n");
        out
    }
}

impl RpcElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str(&format!("rpc {} (", self.name));
        if self.request_streaming {
            out.push_str("stream ");
        }
        out.push_str(&format!("{}) returns (", self.request_type));
        if self.response_streaming {
            out.push_str("stream ");
        }
        out.push_str(&self.response_type);
        out.push(')');
        if self.options.is_empty() {
            out.push_str(";\n");
        } else {
            out.push_str(" {\n");
            for option in &self.options {
                append_indented(&mut out, &option.to_schema_declaration());
            }
            out.push_str("}\n");
        }
        out
    }
}

impl ExtensionsElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);
        out.push_str("extensions ");
        out.push_str(&format_range(self.start, self.end));
        out.push_str(";\n");
        out
    }
}

impl ReservedElement {
    pub fn to_schema(&self) -> String {
        let mut out = String::new();
        append_documentation(&mut out, &self.documentation);

        let values: Vec<String> = self
            .tags
            .iter()
            .map(|tag| tag.to_string())
            .chain(self.ranges.iter().map(|range| {
                format!("{} to {}", range.start(), format_tag(*range.end()))
            }))
            .chain(
                self.names
                    .iter()
                    .map(|name| format!("\"{}\"", Escaped(name))),
            )
            .collect();
        out.push_str(&format!("reserved {};\n", values.join(", ")));
        out
    }
}

impl OptionElement {
    /// Renders this option as it appears inside brackets, e.g. `(foo).bar = 1`.
    pub fn to_schema(&self) -> String {
        let name = if self.is_parenthesized {
            format!("({})", self.name)
        } else {
            self.name.clone()
        };

        match &self.value {
            OptionValue::Option(nested) => {
                let nested = OptionElement {
                    is_parenthesized: false,
                    ..(**nested).clone()
                };
                format!("{}.{}", name, nested.to_schema())
            }
            value => format!("{} = {}", name, format_value(value)),
        }
    }

    /// Renders this option as a standalone `option` statement.
    pub fn to_schema_declaration(&self) -> String {
        format!("option {};\n", self.to_schema())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(self))
    }
}

fn format_value(value: &OptionValue) -> String {
    match value {
        OptionValue::String(value) => format!("\"{}\"", Escaped(value)),
        OptionValue::Boolean(value) => value.to_string(),
        OptionValue::Number(value) | OptionValue::Enum(value) => value.clone(),
        OptionValue::Map(entries) => {
            let mut out = String::from("{\n");
            for (index, (key, value)) in entries.iter().enumerate() {
                let endl = if index + 1 != entries.len() { "," } else { "" };
                append_indented(&mut out, &format!("{}: {}{}", key, format_value(value), endl));
            }
            out.push('}');
            out
        }
        OptionValue::List(values) => {
            let mut out = String::from("[\n");
            for (index, value) in values.iter().enumerate() {
                let endl = if index + 1 != values.len() { "," } else { "" };
                append_indented(&mut out, &format!("{}{}", format_value(value), endl));
            }
            out.push(']');
            out
        }
        OptionValue::Option(nested) => {
            let mut out = String::from("{\n");
            append_indented(
                &mut out,
                &format!("{}: {}", nested.name, format_value(&nested.value)),
            );
            out.push('}');
            out
        }
    }
}

fn format_range(start: i32, end: i32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{} to {}", start, format_tag(end))
    }
}

fn format_tag(tag: i32) -> String {
    if tag == MAX_TAG_VALUE {
        "max".to_owned()
    } else {
        tag.to_string()
    }
}

fn append_label(out: &mut String, label: Option<Label>) {
    match label {
        Some(Label::OneOf) | None => {}
        Some(label) => {
            out.push_str(label.as_str());
            out.push(' ');
        }
    }
}

fn append_section<T>(out: &mut String, items: &[T], render: impl Fn(&T) -> String) {
    if items.is_empty() {
        return;
    }
    out.push('\n');
    for item in items {
        append_indented(out, &render(item));
    }
}

fn append_options(out: &mut String, options: &[OptionElement]) {
    match options {
        [] => {}
        [option] => {
            out.push_str(" [");
            out.push_str(&option.to_schema());
            out.push(']');
        }
        options => {
            out.push_str(" [\n");
            for (index, option) in options.iter().enumerate() {
                let endl = if index + 1 != options.len() { "," } else { "" };
                append_indented(out, &format!("{}{}", option.to_schema(), endl));
            }
            out.push(']');
        }
    }
}

fn append_documentation(out: &mut String, documentation: &str) {
    if documentation.is_empty() {
        return;
    }
    for line in documentation.strip_suffix('\n').unwrap_or(documentation).split('\n') {
        if line.is_empty() {
            out.push_str("//\n");
        } else {
            out.push_str("// ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn append_indented(out: &mut String, value: &str) {
    for line in value.strip_suffix('\n').unwrap_or(value).split('\n') {
        if !line.is_empty() {
            out.push_str("  ");
            out.push_str(line);
        }
        out.push('\n');
    }
}

/// Escapes a string for use inside a double-quoted literal.
pub(crate) struct Escaped<'a>(pub &'a str);

impl<'a> fmt::Display for Escaped<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use std::fmt::Write;

        for ch in self.0.chars() {
            match ch {
                '\t' => f.write_str("\\t")?,
                '\r' => f.write_str("\\r")?,
                '\n' => f.write_str("\\n")?,
                '\\' => f.write_str("\\\\")?,
                '"' => f.write_str("\\\"")?,
                '\x00'..='\x1f' | '\x7f' => write!(f, "\\{:03o}", ch as u32)?,
                _ => f.write_char(ch)?,
            }
        }

        Ok(())
    }
}
