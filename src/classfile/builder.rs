//! Writes small but well-formed class files.
//!
//! Used by tests and benchmarks to produce fixtures without a Java compiler. Member and
//! class references are emitted as instructions in a synthetic `<clinit>` body so that
//! the reader sees them exactly as it would in compiled code.

use super::AccessFlags;
use super::reader::MAGIC;
use std::collections::HashMap;

const JAVA_8: u16 = 52;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolEntry {
    Utf8(String),
    Class(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
}

#[derive(Default)]
struct Pool {
    entries: Vec<PoolEntry>,
    lookup: HashMap<PoolEntry, u16>,
}

impl Pool {
    fn add(&mut self, entry: PoolEntry) -> u16 {
        if let Some(index) = self.lookup.get(&entry) {
            return *index;
        }
        self.entries.push(entry.clone());
        let index = self.entries.len() as u16;
        self.lookup.insert(entry, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.add(PoolEntry::Utf8(value.to_string()))
    }

    /// Accepts binary names (`a.b.C`) or array descriptors (`[La/b/C;`).
    fn class(&mut self, name: &str) -> u16 {
        let internal = if name.starts_with('[') {
            name.to_string()
        } else {
            name.replace('.', "/")
        };
        let name_index = self.utf8(&internal);
        self.add(PoolEntry::Class(name_index))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.add(PoolEntry::NameAndType(name_index, descriptor_index))
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            match entry {
                PoolEntry::Utf8(value) => {
                    out.push(1);
                    put_u2(out, value.len() as u16);
                    out.extend_from_slice(value.as_bytes());
                }
                PoolEntry::Class(name) => {
                    out.push(7);
                    put_u2(out, *name);
                }
                PoolEntry::NameAndType(name, descriptor) => {
                    out.push(12);
                    put_u2(out, *name);
                    put_u2(out, *descriptor);
                }
                PoolEntry::FieldRef(class, nat) => {
                    out.push(9);
                    put_u2(out, *class);
                    put_u2(out, *nat);
                }
                PoolEntry::MethodRef(class, nat) => {
                    out.push(10);
                    put_u2(out, *class);
                    put_u2(out, *nat);
                }
                PoolEntry::InterfaceMethodRef(class, nat) => {
                    out.push(11);
                    put_u2(out, *class);
                    put_u2(out, *nat);
                }
            }
        }
    }
}

struct Member {
    access: AccessFlags,
    name: u16,
    descriptor: u16,
}

/// Builder for a single class file.
///
/// ```
/// use linkage_checker::classfile::{AccessFlags, ClassBuilder, ClassInfo};
///
/// let bytes = ClassBuilder::new("com.example.App")
///     .method(AccessFlags::PUBLIC, "run", "()V")
///     .invokes("com.example.Lib", "call", "()V")
///     .build();
/// let info = ClassInfo::parse(&bytes).unwrap();
/// assert_eq!(info.name, "com.example.App");
/// ```
pub struct ClassBuilder {
    pool: Pool,
    access: AccessFlags,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    inner_classes: Vec<(u16, u16, u16, AccessFlags)>,
    init_code: Vec<u8>,
    catch_types: Vec<u16>,
}

impl ClassBuilder {
    /// A public class extending `java.lang.Object`.
    pub fn new(name: &str) -> Self {
        let mut pool = Pool::default();
        let this_class = pool.class(name);
        let super_class = pool.class("java.lang.Object");
        Self {
            pool,
            access: AccessFlags::PUBLIC | AccessFlags::SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
            init_code: Vec::new(),
            catch_types: Vec::new(),
        }
    }

    /// A public interface.
    pub fn interface_named(name: &str) -> Self {
        Self::new(name).access(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = self.pool.class(name);
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.pool.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn field(mut self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        let member = Member {
            access,
            name: self.pool.utf8(name),
            descriptor: self.pool.utf8(descriptor),
        };
        self.fields.push(member);
        self
    }

    /// Declares a method. Abstract and native methods get no `Code` attribute.
    pub fn method(mut self, access: AccessFlags, name: &str, descriptor: &str) -> Self {
        let member = Member {
            access,
            name: self.pool.utf8(name),
            descriptor: self.pool.utf8(descriptor),
        };
        self.methods.push(member);
        self
    }

    pub fn abstract_method(self, name: &str, descriptor: &str) -> Self {
        self.method(AccessFlags::PUBLIC | AccessFlags::ABSTRACT, name, descriptor)
    }

    /// Emits `invokestatic` against a Methodref.
    pub fn invokes(mut self, class_name: &str, name: &str, descriptor: &str) -> Self {
        let class = self.pool.class(class_name);
        let nat = self.pool.name_and_type(name, descriptor);
        let index = self.pool.add(PoolEntry::MethodRef(class, nat));
        self.init_code.push(0xb8);
        put_u2(&mut self.init_code, index);
        self
    }

    /// Emits `invokeinterface` against an InterfaceMethodref.
    pub fn invokes_interface(mut self, class_name: &str, name: &str, descriptor: &str) -> Self {
        let class = self.pool.class(class_name);
        let nat = self.pool.name_and_type(name, descriptor);
        let index = self.pool.add(PoolEntry::InterfaceMethodRef(class, nat));
        self.init_code.push(0xb9);
        put_u2(&mut self.init_code, index);
        self.init_code.extend_from_slice(&[1, 0]);
        self
    }

    /// Emits `getstatic` against a Fieldref.
    pub fn reads_field(mut self, class_name: &str, name: &str, descriptor: &str) -> Self {
        let class = self.pool.class(class_name);
        let nat = self.pool.name_and_type(name, descriptor);
        let index = self.pool.add(PoolEntry::FieldRef(class, nat));
        self.init_code.push(0xb2);
        put_u2(&mut self.init_code, index);
        self
    }

    /// Emits `checkcast` against a Class constant.
    pub fn references_class(mut self, name: &str) -> Self {
        let index = self.pool.class(name);
        self.init_code.push(0xc0);
        put_u2(&mut self.init_code, index);
        self
    }

    /// Adds an `InnerClasses` entry. Recording it alone does not count as a use.
    pub fn inner_class(mut self, inner: &str, outer: Option<&str>, access: AccessFlags) -> Self {
        let inner_index = self.pool.class(inner);
        let outer_index = outer.map(|outer| self.pool.class(outer)).unwrap_or(0);
        let simple_name = inner.rsplit('$').next().unwrap_or(inner).to_string();
        let name_index = self.pool.utf8(&simple_name);
        self.inner_classes
            .push((inner_index, outer_index, name_index, access));
        self
    }

    /// Adds an exception handler for `exception_type` to the `<clinit>` body.
    pub fn catches(mut self, exception_type: &str) -> Self {
        let index = self.pool.class(exception_type);
        self.catch_types.push(index);
        self
    }

    /// Points the most recent member reference at a non-NameAndType constant.
    pub fn corrupt_member_ref(mut self) -> Self {
        if let Some(entry) = self.pool.entries.iter_mut().rev().find(|entry| {
            matches!(
                entry,
                PoolEntry::FieldRef(..)
                    | PoolEntry::MethodRef(..)
                    | PoolEntry::InterfaceMethodRef(..)
            )
        }) {
            match entry {
                PoolEntry::FieldRef(_, nat)
                | PoolEntry::MethodRef(_, nat)
                | PoolEntry::InterfaceMethodRef(_, nat) => *nat = 1,
                _ => {}
            }
        }
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        let code_attribute = self.pool.utf8("Code");
        let has_init = !self.init_code.is_empty() || !self.catch_types.is_empty();
        let init = if has_init {
            let name = self.pool.utf8("<clinit>");
            let descriptor = self.pool.utf8("()V");
            Some((name, descriptor))
        } else {
            None
        };
        let inner_classes_attribute = if self.inner_classes.is_empty() {
            None
        } else {
            Some(self.pool.utf8("InnerClasses"))
        };

        let mut out = Vec::new();
        put_u4(&mut out, MAGIC);
        put_u2(&mut out, 0);
        put_u2(&mut out, JAVA_8);
        self.pool.write(&mut out);
        put_u2(&mut out, self.access.0);
        put_u2(&mut out, self.this_class);
        put_u2(&mut out, self.super_class);

        put_u2(&mut out, self.interfaces.len() as u16);
        for index in &self.interfaces {
            put_u2(&mut out, *index);
        }

        put_u2(&mut out, self.fields.len() as u16);
        for field in &self.fields {
            put_u2(&mut out, field.access.0);
            put_u2(&mut out, field.name);
            put_u2(&mut out, field.descriptor);
            put_u2(&mut out, 0);
        }

        put_u2(&mut out, (self.methods.len() + usize::from(has_init)) as u16);
        for method in &self.methods {
            put_u2(&mut out, method.access.0);
            put_u2(&mut out, method.name);
            put_u2(&mut out, method.descriptor);
            if method.access.is_abstract() || method.access.contains(AccessFlags::NATIVE) {
                put_u2(&mut out, 0);
            } else {
                put_u2(&mut out, 1);
                write_code(&mut out, code_attribute, &[], &[]);
            }
        }
        if let Some((name, descriptor)) = init {
            put_u2(&mut out, AccessFlags::STATIC.0);
            put_u2(&mut out, name);
            put_u2(&mut out, descriptor);
            put_u2(&mut out, 1);
            write_code(&mut out, code_attribute, &self.init_code, &self.catch_types);
        }

        match inner_classes_attribute {
            Some(attribute_name) => {
                put_u2(&mut out, 1);
                put_u2(&mut out, attribute_name);
                put_u4(&mut out, 2 + 8 * self.inner_classes.len() as u32);
                put_u2(&mut out, self.inner_classes.len() as u16);
                for (inner, outer, name, access) in &self.inner_classes {
                    put_u2(&mut out, *inner);
                    put_u2(&mut out, *outer);
                    put_u2(&mut out, *name);
                    put_u2(&mut out, access.0);
                }
            }
            None => put_u2(&mut out, 0),
        }
        out
    }
}

/// A `Code` attribute whose body is `instructions` followed by `return`.
fn write_code(out: &mut Vec<u8>, attribute_name: u16, instructions: &[u8], catch_types: &[u16]) {
    let code_length = instructions.len() as u32 + 1;
    let length = 2 + 2 + 4 + code_length + 2 + 8 * catch_types.len() as u32 + 2;
    put_u2(out, attribute_name);
    put_u4(out, length);
    put_u2(out, 8);
    put_u2(out, 8);
    put_u4(out, code_length);
    out.extend_from_slice(instructions);
    out.push(0xb1);
    put_u2(out, catch_types.len() as u16);
    for catch_type in catch_types {
        put_u2(out, 0);
        put_u2(out, code_length as u16);
        put_u2(out, 0);
        put_u2(out, *catch_type);
    }
    put_u2(out, 0);
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u4(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
