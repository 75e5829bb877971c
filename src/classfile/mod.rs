//! Class file decoding (JVMS chapter 4).
//!
//! [`ClassInfo::parse`] reads everything the resolver needs from one class file:
//! - access flags, superclass and interfaces
//! - declared fields and methods, with `Code` presence and exception-table catch types
//! - `InnerClasses` entries (nesting and the real access flags of nested classes)
//! - every Class, Fieldref, Methodref and InterfaceMethodref constant
//! - which Class constants are actually used by code or structure

mod builder;
mod bytecode;
mod jdk;
mod reader;

pub use builder::ClassBuilder;
pub use jdk::{java_lang_object, jdk_class};

use crate::descriptor::class_constant_binary_name;
use crate::error::ClassFormatError;
use reader::{ClassReader, Constant, ConstantPool};
use std::collections::HashSet;
use std::ops::BitOr;

// ============================================================================
// Access flags
// ============================================================================

/// Access and property flags of a class, nested class, field or method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: AccessFlags = AccessFlags(0x0001);
    pub const PRIVATE: AccessFlags = AccessFlags(0x0002);
    pub const PROTECTED: AccessFlags = AccessFlags(0x0004);
    pub const STATIC: AccessFlags = AccessFlags(0x0008);
    pub const FINAL: AccessFlags = AccessFlags(0x0010);
    pub const SUPER: AccessFlags = AccessFlags(0x0020);
    pub const NATIVE: AccessFlags = AccessFlags(0x0100);
    pub const INTERFACE: AccessFlags = AccessFlags(0x0200);
    pub const ABSTRACT: AccessFlags = AccessFlags(0x0400);
    pub const SYNTHETIC: AccessFlags = AccessFlags(0x1000);

    pub const fn empty() -> Self {
        AccessFlags(0)
    }

    pub fn contains(self, other: AccessFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    pub fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }
}

impl BitOr for AccessFlags {
    type Output = AccessFlags;

    fn bitor(self, rhs: AccessFlags) -> AccessFlags {
        AccessFlags(self.0 | rhs.0)
    }
}

// ============================================================================
// Class model
// ============================================================================

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    /// True when the method carries a `Code` attribute.
    pub has_code: bool,
    /// Binary names of the exception types caught by handlers in this method.
    pub catch_types: Vec<String>,
}

impl MethodInfo {
    /// Abstract or otherwise body-less instance method that an implementing class must supply.
    pub fn needs_implementation(&self) -> bool {
        self.access.is_abstract() && !self.access.is_static()
    }
}

/// One entry of the `InnerClasses` attribute, with names in binary form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassInfo {
    pub inner: String,
    /// `None` for local and anonymous classes.
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access: AccessFlags,
}

/// A Fieldref, Methodref or InterfaceMethodref constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Field {
        class_name: String,
        name: String,
        descriptor: String,
    },
    Method {
        class_name: String,
        name: String,
        descriptor: String,
        interface: bool,
    },
}

/// A Class constant, with the binary name of the class it designates.
///
/// Array constants designate their element class; primitive arrays are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassConstant {
    pub index: u16,
    pub class_name: String,
}

/// Everything the linkage checker reads from one class file.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Binary name, for example `com.example.Outer$Inner`.
    pub name: String,
    pub access: AccessFlags,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub inner_classes: Vec<InnerClassInfo>,
    pub class_constants: Vec<ClassConstant>,
    pub member_refs: Vec<MemberRef>,
    used_class_indices: HashSet<u16>,
}

impl ClassInfo {
    /// Decodes a class file. Any malformation is an error for the whole file.
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFormatError> {
        let mut reader = ClassReader::new(bytes);
        reader.expect_magic()?;
        let _minor_version = reader.read_u2()?;
        let _major_version = reader.read_u2()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let access = AccessFlags(reader.read_u2()?);
        let this_index = reader.read_u2()?;
        let name = binary_name(pool.class_name(this_index)?);
        let mut used_class_indices = HashSet::from([this_index]);

        let super_index = reader.read_u2()?;
        let super_name = if super_index == 0 {
            None
        } else {
            used_class_indices.insert(super_index);
            Some(binary_name(pool.class_name(super_index)?))
        };

        let interface_count = reader.read_u2()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = reader.read_u2()?;
            used_class_indices.insert(index);
            interfaces.push(binary_name(pool.class_name(index)?));
        }

        let field_count = reader.read_u2()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let access = AccessFlags(reader.read_u2()?);
            let name = pool.utf8(reader.read_u2()?)?.to_string();
            let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
            let attribute_count = reader.read_u2()?;
            skip_attributes(&mut reader, attribute_count)?;
            fields.push(FieldInfo {
                name,
                descriptor,
                access,
            });
        }

        let method_count = reader.read_u2()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            methods.push(parse_method(&mut reader, &pool, &mut used_class_indices)?);
        }

        let mut inner_classes = Vec::new();
        let attribute_count = reader.read_u2()?;
        for _ in 0..attribute_count {
            let attribute_name = pool.utf8(reader.read_u2()?)?;
            let length = reader.read_u4()? as usize;
            let body = reader.read_slice(length)?;
            let mut attribute = ClassReader::new(body);
            match attribute_name {
                "InnerClasses" => {
                    let count = attribute.read_u2()?;
                    for _ in 0..count {
                        let inner_index = attribute.read_u2()?;
                        let outer_index = attribute.read_u2()?;
                        let name_index = attribute.read_u2()?;
                        let flags = AccessFlags(attribute.read_u2()?);
                        inner_classes.push(InnerClassInfo {
                            inner: binary_name(pool.class_name(inner_index)?),
                            outer: optional_class(&pool, outer_index)?,
                            simple_name: if name_index == 0 {
                                None
                            } else {
                                Some(pool.utf8(name_index)?.to_string())
                            },
                            access: flags,
                        });
                    }
                }
                "EnclosingMethod" => {
                    used_class_indices.insert(attribute.read_u2()?);
                }
                _ => {}
            }
        }

        let mut class_constants = Vec::new();
        let mut member_refs = Vec::new();
        for (index, constant) in pool.iter() {
            match constant {
                Constant::Class { name_index } => {
                    let internal = pool.utf8(*name_index)?;
                    if let Some(class_name) = class_constant_binary_name(internal) {
                        class_constants.push(ClassConstant { index, class_name });
                    }
                }
                Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                } => {
                    used_class_indices.insert(*class_index);
                    let (member_name, descriptor) = pool.name_and_type(*name_and_type_index)?;
                    member_refs.push(MemberRef::Field {
                        class_name: binary_name(pool.class_name(*class_index)?),
                        name: member_name.to_string(),
                        descriptor: descriptor.to_string(),
                    });
                }
                Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                } => {
                    used_class_indices.insert(*class_index);
                    let (member_name, descriptor) = pool.name_and_type(*name_and_type_index)?;
                    member_refs.push(MemberRef::Method {
                        class_name: binary_name(pool.class_name(*class_index)?),
                        name: member_name.to_string(),
                        descriptor: descriptor.to_string(),
                        interface: matches!(constant, Constant::InterfaceMethodRef { .. }),
                    });
                }
                _ => {}
            }
        }

        Ok(ClassInfo {
            name,
            access,
            super_name,
            interfaces,
            fields,
            methods,
            inner_classes,
            class_constants,
            member_refs,
            used_class_indices,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    /// Package part of the binary name; empty for the default package.
    pub fn package_name(&self) -> &str {
        package_of(&self.name)
    }

    /// This class's own `InnerClasses` entry, present when it is a nested class.
    fn own_inner_entry(&self) -> Option<&InnerClassInfo> {
        self.inner_classes.iter().find(|entry| entry.inner == self.name)
    }

    /// Access flags as declared in source. Nested classes record `private` and
    /// `protected` only in their `InnerClasses` entry.
    pub fn effective_access(&self) -> AccessFlags {
        self.own_inner_entry()
            .map(|entry| entry.access)
            .unwrap_or(self.access)
    }

    /// The immediately enclosing class of a member class.
    pub fn enclosing_class(&self) -> Option<&str> {
        self.own_inner_entry().and_then(|entry| entry.outer.as_deref())
    }

    /// Member classes declared directly inside this class.
    pub fn nested_class_names(&self) -> impl Iterator<Item = &str> {
        self.inner_classes
            .iter()
            .filter(|entry| entry.outer.as_deref() == Some(self.name.as_str()))
            .map(|entry| entry.inner.as_str())
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// True if any method has an exception handler for one of `exception_types`.
    pub fn catches_any(&self, exception_types: &[String]) -> bool {
        self.methods.iter().any(|method| {
            method
                .catch_types
                .iter()
                .any(|caught| exception_types.iter().any(|t| t == caught))
        })
    }

    /// True if some Class constant naming `class_name` is used by code or class structure.
    ///
    /// Constants referenced only from `InnerClasses` and nest attributes are not uses.
    pub fn uses_class(&self, class_name: &str) -> bool {
        self.class_constants.iter().any(|constant| {
            constant.class_name == class_name && self.used_class_indices.contains(&constant.index)
        })
    }
}

/// Package part of a binary class name.
pub fn package_of(class_name: &str) -> &str {
    class_name
        .rfind('.')
        .map(|dot| &class_name[..dot])
        .unwrap_or("")
}

fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

fn optional_class(pool: &ConstantPool, index: u16) -> Result<Option<String>, ClassFormatError> {
    if index == 0 {
        Ok(None)
    } else {
        Ok(Some(binary_name(pool.class_name(index)?)))
    }
}

fn skip_attributes(reader: &mut ClassReader<'_>, count: u16) -> Result<(), ClassFormatError> {
    for _ in 0..count {
        reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        reader.skip(length)?;
    }
    Ok(())
}

fn parse_method(
    reader: &mut ClassReader<'_>,
    pool: &ConstantPool,
    used_class_indices: &mut HashSet<u16>,
) -> Result<MethodInfo, ClassFormatError> {
    let access = AccessFlags(reader.read_u2()?);
    let name = pool.utf8(reader.read_u2()?)?.to_string();
    let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
    let mut has_code = false;
    let mut catch_types = Vec::new();

    let attribute_count = reader.read_u2()?;
    for _ in 0..attribute_count {
        let attribute_name = pool.utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        let body = reader.read_slice(length)?;
        let mut attribute = ClassReader::new(body);
        match attribute_name {
            "Code" => {
                has_code = true;
                let _max_stack = attribute.read_u2()?;
                let _max_locals = attribute.read_u2()?;
                let code_length = attribute.read_u4()? as usize;
                let code = attribute.read_slice(code_length)?;
                used_class_indices.extend(bytecode::class_operands(code)?);
                let handler_count = attribute.read_u2()?;
                for _ in 0..handler_count {
                    attribute.skip(6)?;
                    let catch_type = attribute.read_u2()?;
                    if catch_type != 0 {
                        used_class_indices.insert(catch_type);
                        catch_types.push(binary_name(pool.class_name(catch_type)?));
                    }
                }
            }
            "Exceptions" => {
                let count = attribute.read_u2()?;
                for _ in 0..count {
                    used_class_indices.insert(attribute.read_u2()?);
                }
            }
            _ => {}
        }
    }

    Ok(MethodInfo {
        name,
        descriptor,
        access,
        has_code,
        catch_types,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_built_class() {
        let bytes = ClassBuilder::new("com.example.Foo")
            .super_class("com.example.Base")
            .interface("com.example.Api")
            .field(AccessFlags::PRIVATE, "count", "I")
            .method(AccessFlags::PUBLIC, "run", "()V")
            .abstract_method("todo", "()V")
            .invokes("com.example.Bar", "call", "(I)Ljava/lang/String;")
            .invokes_interface("com.example.Api", "apply", "()V")
            .reads_field("com.example.Bar", "VALUE", "J")
            .build();
        let info = ClassInfo::parse(&bytes).unwrap();

        assert_eq!(info.name, "com.example.Foo");
        assert_eq!(info.package_name(), "com.example");
        assert_eq!(info.super_name.as_deref(), Some("com.example.Base"));
        assert_eq!(info.interfaces, vec!["com.example.Api".to_string()]);
        assert!(info.find_field("count").unwrap().access.is_private());
        assert!(info.find_method("run", "()V").unwrap().has_code);
        assert!(!info.find_method("todo", "()V").unwrap().has_code);
        assert!(info.member_refs.contains(&MemberRef::Method {
            class_name: "com.example.Bar".to_string(),
            name: "call".to_string(),
            descriptor: "(I)Ljava/lang/String;".to_string(),
            interface: false,
        }));
        assert!(info.member_refs.contains(&MemberRef::Method {
            class_name: "com.example.Api".to_string(),
            name: "apply".to_string(),
            descriptor: "()V".to_string(),
            interface: true,
        }));
        assert!(info.member_refs.contains(&MemberRef::Field {
            class_name: "com.example.Bar".to_string(),
            name: "VALUE".to_string(),
            descriptor: "J".to_string(),
        }));
    }

    #[test]
    fn nested_class_access_comes_from_inner_classes() {
        let bytes = ClassBuilder::new("a.Outer$Hidden")
            .access(AccessFlags::SUPER)
            .inner_class("a.Outer$Hidden", Some("a.Outer"), AccessFlags::PRIVATE)
            .build();
        let info = ClassInfo::parse(&bytes).unwrap();
        assert!(!info.access.is_private());
        assert!(info.effective_access().is_private());
        assert_eq!(info.enclosing_class(), Some("a.Outer"));

        let outer = ClassBuilder::new("a.Outer")
            .inner_class("a.Outer$Hidden", Some("a.Outer"), AccessFlags::PRIVATE)
            .inner_class("a.Outer$Hidden$Deeper", Some("a.Outer$Hidden"), AccessFlags::empty())
            .build();
        let outer = ClassInfo::parse(&outer).unwrap();
        assert_eq!(
            outer.nested_class_names().collect::<Vec<_>>(),
            vec!["a.Outer$Hidden"]
        );
        assert_eq!(outer.enclosing_class(), None);
    }

    #[test]
    fn class_used_only_by_inner_classes_is_unused() {
        let bytes = ClassBuilder::new("a.Foo")
            .inner_class("b.Gone$Entry", Some("b.Gone"), AccessFlags::PUBLIC)
            .references_class("b.Used")
            .build();
        let info = ClassInfo::parse(&bytes).unwrap();
        assert!(!info.uses_class("b.Gone"));
        assert!(!info.uses_class("b.Gone$Entry"));
        assert!(info.uses_class("b.Used"));
        assert!(info.uses_class("java.lang.Object"));
    }

    #[test]
    fn catch_types_are_recorded() {
        let bytes = ClassBuilder::new("a.Guarded")
            .catches("java.lang.NoClassDefFoundError")
            .build();
        let info = ClassInfo::parse(&bytes).unwrap();
        assert!(info.catches_any(&["java.lang.NoClassDefFoundError".to_string()]));
        assert!(!info.catches_any(&["java.lang.LinkageError".to_string()]));
        assert!(info.uses_class("java.lang.NoClassDefFoundError"));
    }

    #[test]
    fn array_class_constants_name_their_element() {
        let bytes = ClassBuilder::new("a.Foo")
            .references_class("[[Lb/Element;")
            .references_class("[I")
            .build();
        let info = ClassInfo::parse(&bytes).unwrap();
        let names: Vec<&str> = info
            .class_constants
            .iter()
            .map(|c| c.class_name.as_str())
            .collect();
        assert!(names.contains(&"b.Element"));
        assert!(!names.iter().any(|n| n.starts_with('[')));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            ClassInfo::parse(&[0, 1, 2, 3]),
            Err(ClassFormatError::InvalidMagic(0x0001_0203))
        ));
        assert!(matches!(
            ClassInfo::parse(&[0xCA, 0xFE, 0xBA, 0xBE]),
            Err(ClassFormatError::UnexpectedEof)
        ));
    }

    #[test]
    fn member_ref_with_bad_name_and_type_is_fatal() {
        let bytes = ClassBuilder::new("a.Foo")
            .invokes("b.Bar", "call", "()V")
            .corrupt_member_ref()
            .build();
        assert!(matches!(
            ClassInfo::parse(&bytes),
            Err(ClassFormatError::UnexpectedConstant {
                expected: "NameAndType",
                ..
            })
        ));
    }
}
