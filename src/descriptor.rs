//! Field and method descriptor parsing (JVMS 4.3).

use crate::error::ClassFormatError;

/// Array types may have at most 255 dimensions (JVMS 4.3.2).
const MAX_ARRAY_DIMENSIONS: usize = 255;

/// A field type as written in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Base(char),
    /// Binary class name, dots as separators.
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    /// The Java source spelling: `int`, `java.lang.String`, `byte[][]`.
    pub fn java_name(&self) -> String {
        match self {
            FieldType::Base(c) => match c {
                'B' => "byte",
                'C' => "char",
                'D' => "double",
                'F' => "float",
                'I' => "int",
                'J' => "long",
                'S' => "short",
                'Z' => "boolean",
                _ => "void",
            }
            .to_string(),
            FieldType::Object(name) => name.clone(),
            FieldType::Array(component) => format!("{}[]", component.java_name()),
        }
    }

    /// The innermost class type of an object or array type.
    pub fn element_class(&self) -> Option<&str> {
        match self {
            FieldType::Base(_) => None,
            FieldType::Object(name) => Some(name),
            FieldType::Array(component) => component.element_class(),
        }
    }
}

/// Parameter and return types of a method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// The descriptor text up to and including `)`.
    pub fn parameter_part(descriptor: &str) -> Option<&str> {
        descriptor
            .find(')')
            .map(|end| &descriptor[..=end])
            .filter(|part| part.starts_with('('))
    }

    pub fn return_type_name(&self) -> String {
        self.return_type
            .as_ref()
            .map(FieldType::java_name)
            .unwrap_or_else(|| "void".to_string())
    }
}

struct DescriptorParser<'a> {
    bytes: &'a [u8],
    pos: usize,
    source: &'a str,
}

impl<'a> DescriptorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
            source,
        }
    }

    fn error(&self) -> ClassFormatError {
        ClassFormatError::InvalidDescriptor(self.source.to_string())
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<u8, ClassFormatError> {
        let byte = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), ClassFormatError> {
        if self.next()? == expected {
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn field_type(&mut self) -> Result<FieldType, ClassFormatError> {
        let mut dimensions = 0;
        while self.peek() == Some(b'[') {
            self.pos += 1;
            dimensions += 1;
            if dimensions > MAX_ARRAY_DIMENSIONS {
                return Err(self.error());
            }
        }
        let mut field_type = self.element_type()?;
        for _ in 0..dimensions {
            field_type = FieldType::Array(Box::new(field_type));
        }
        Ok(field_type)
    }

    fn element_type(&mut self) -> Result<FieldType, ClassFormatError> {
        match self.next()? {
            c @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => {
                Ok(FieldType::Base(c as char))
            }
            b'L' => {
                let start = self.pos;
                while self.next()? != b';' {}
                let internal = &self.source[start..self.pos - 1];
                if internal.is_empty() {
                    return Err(self.error());
                }
                Ok(FieldType::Object(internal.replace('/', ".")))
            }
            _ => Err(self.error()),
        }
    }
}

/// Parses a field descriptor such as `Ljava/lang/String;`.
pub fn parse_field_descriptor(descriptor: &str) -> Result<FieldType, ClassFormatError> {
    let mut parser = DescriptorParser::new(descriptor);
    let field_type = parser.field_type()?;
    if !parser.at_end() {
        return Err(parser.error());
    }
    Ok(field_type)
}

/// Parses a method descriptor such as `(ILjava/lang/String;)V`.
pub fn parse_method_descriptor(descriptor: &str) -> Result<MethodDescriptor, ClassFormatError> {
    let mut parser = DescriptorParser::new(descriptor);
    parser.expect(b'(')?;
    let mut parameters = Vec::new();
    while parser.peek() != Some(b')') {
        parameters.push(parser.field_type()?);
    }
    parser.expect(b')')?;
    let return_type = if parser.peek() == Some(b'V') {
        parser.pos += 1;
        None
    } else {
        Some(parser.field_type()?)
    };
    if !parser.at_end() {
        return Err(parser.error());
    }
    Ok(MethodDescriptor {
        parameters,
        return_type,
    })
}

/// Java spellings of a method descriptor's parameter types.
pub fn parameter_type_names(descriptor: &str) -> Result<Vec<String>, ClassFormatError> {
    Ok(parse_method_descriptor(descriptor)?
        .parameters
        .iter()
        .map(FieldType::java_name)
        .collect())
}

/// Converts an internal class name (`a/b/C$D`) or array descriptor to a binary name.
///
/// Array class names resolve to their element class; primitive arrays have none.
pub fn class_constant_binary_name(internal: &str) -> Option<String> {
    if internal.starts_with('[') {
        parse_field_descriptor(internal)
            .ok()
            .and_then(|field_type| field_type.element_class().map(str::to_string))
    } else {
        Some(internal.replace('/', "."))
    }
}
