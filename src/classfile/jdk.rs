//! Hard-coded descriptions of the JDK types that library classes most often extend or
//! implement.
//!
//! Without a bootstrap classpath these stand in for the real classes, so a hierarchy that
//! passes through them can still prove a member absent. JDK classes missing from the
//! table stay opaque.

use super::{AccessFlags, ClassInfo, MethodInfo};
use std::collections::HashSet;

type Method = (u16, &'static str, &'static str);

const PUBLIC: u16 = AccessFlags::PUBLIC.0;
const PROTECTED: u16 = AccessFlags::PROTECTED.0;
const PUBLIC_FINAL: u16 = AccessFlags::PUBLIC.0 | AccessFlags::FINAL.0;
const PUBLIC_STATIC: u16 = AccessFlags::PUBLIC.0 | AccessFlags::STATIC.0;
const PUBLIC_ABSTRACT: u16 = AccessFlags::PUBLIC.0 | AccessFlags::ABSTRACT.0;
const FINAL_NATIVE: u16 = AccessFlags::PUBLIC.0 | AccessFlags::FINAL.0 | AccessFlags::NATIVE.0;
const BRIDGE: u16 = AccessFlags::PUBLIC.0 | 0x0040 | AccessFlags::SYNTHETIC.0;

const CLASS: u16 = AccessFlags::PUBLIC.0 | AccessFlags::SUPER.0;
const ABSTRACT_CLASS: u16 = CLASS | AccessFlags::ABSTRACT.0;
const INTERFACE: u16 = AccessFlags::PUBLIC.0 | AccessFlags::INTERFACE.0 | AccessFlags::ABSTRACT.0;

const OBJECT: &str = "java.lang.Object";
const SERIALIZABLE: &str = "java.io.Serializable";

struct Stub {
    name: &'static str,
    access: u16,
    super_name: Option<&'static str>,
    interfaces: &'static [&'static str],
    methods: &'static [&'static [Method]],
}

const OBJECT_METHODS: &[Method] = &[
    (PUBLIC, "<init>", "()V"),
    (PUBLIC, "equals", "(Ljava/lang/Object;)Z"),
    (PUBLIC, "hashCode", "()I"),
    (PUBLIC, "toString", "()Ljava/lang/String;"),
    (FINAL_NATIVE, "getClass", "()Ljava/lang/Class;"),
    (PROTECTED, "clone", "()Ljava/lang/Object;"),
    (PROTECTED, "finalize", "()V"),
    (FINAL_NATIVE, "notify", "()V"),
    (FINAL_NATIVE, "notifyAll", "()V"),
    (PUBLIC_FINAL, "wait", "()V"),
    (FINAL_NATIVE, "wait", "(J)V"),
    (PUBLIC_FINAL, "wait", "(JI)V"),
];

const THROWABLE_CONSTRUCTORS: &[Method] = &[
    (PUBLIC, "<init>", "()V"),
    (PUBLIC, "<init>", "(Ljava/lang/String;)V"),
    (PUBLIC, "<init>", "(Ljava/lang/String;Ljava/lang/Throwable;)V"),
    (PUBLIC, "<init>", "(Ljava/lang/Throwable;)V"),
];

const SUPPRESSION_CONSTRUCTOR: &[Method] =
    &[(PROTECTED, "<init>", "(Ljava/lang/String;Ljava/lang/Throwable;ZZ)V")];

const THROWABLE_METHODS: &[Method] = &[
    (PUBLIC, "getMessage", "()Ljava/lang/String;"),
    (PUBLIC, "getLocalizedMessage", "()Ljava/lang/String;"),
    (PUBLIC, "getCause", "()Ljava/lang/Throwable;"),
    (PUBLIC, "initCause", "(Ljava/lang/Throwable;)Ljava/lang/Throwable;"),
    (PUBLIC, "toString", "()Ljava/lang/String;"),
    (PUBLIC, "printStackTrace", "()V"),
    (PUBLIC, "printStackTrace", "(Ljava/io/PrintStream;)V"),
    (PUBLIC, "printStackTrace", "(Ljava/io/PrintWriter;)V"),
    (PUBLIC, "fillInStackTrace", "()Ljava/lang/Throwable;"),
    (PUBLIC, "getStackTrace", "()[Ljava/lang/StackTraceElement;"),
    (PUBLIC, "setStackTrace", "([Ljava/lang/StackTraceElement;)V"),
    (PUBLIC_FINAL, "addSuppressed", "(Ljava/lang/Throwable;)V"),
    (PUBLIC_FINAL, "getSuppressed", "()[Ljava/lang/Throwable;"),
];

const ENUM_METHODS: &[Method] = &[
    (PROTECTED, "<init>", "(Ljava/lang/String;I)V"),
    (PUBLIC_FINAL, "name", "()Ljava/lang/String;"),
    (PUBLIC_FINAL, "ordinal", "()I"),
    (PUBLIC, "toString", "()Ljava/lang/String;"),
    (PUBLIC_FINAL, "equals", "(Ljava/lang/Object;)Z"),
    (PUBLIC_FINAL, "hashCode", "()I"),
    (PROTECTED | AccessFlags::FINAL.0, "clone", "()Ljava/lang/Object;"),
    (PROTECTED | AccessFlags::FINAL.0, "finalize", "()V"),
    (PUBLIC_FINAL, "compareTo", "(Ljava/lang/Enum;)I"),
    (BRIDGE, "compareTo", "(Ljava/lang/Object;)I"),
    (PUBLIC_FINAL, "getDeclaringClass", "()Ljava/lang/Class;"),
    (PUBLIC_FINAL, "describeConstable", "()Ljava/util/Optional;"),
    (PUBLIC_STATIC, "valueOf", "(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;"),
];

/// An exception type that only declares the standard constructors.
const fn exception(name: &'static str, super_name: &'static str, suppression: bool) -> Stub {
    Stub {
        name,
        access: CLASS,
        super_name: Some(super_name),
        interfaces: &[],
        methods: if suppression {
            &[THROWABLE_CONSTRUCTORS, SUPPRESSION_CONSTRUCTOR]
        } else {
            &[THROWABLE_CONSTRUCTORS]
        },
    }
}

const fn interface(
    name: &'static str,
    interfaces: &'static [&'static str],
    methods: &'static [&'static [Method]],
) -> Stub {
    Stub {
        name,
        access: INTERFACE,
        super_name: Some(OBJECT),
        interfaces,
        methods,
    }
}

const STUBS: &[Stub] = &[
    Stub {
        name: OBJECT,
        access: CLASS,
        super_name: None,
        interfaces: &[],
        methods: &[OBJECT_METHODS],
    },
    interface(SERIALIZABLE, &[], &[]),
    interface("java.lang.Cloneable", &[], &[]),
    interface("java.util.EventListener", &[], &[]),
    interface(
        "java.lang.Comparable",
        &[],
        &[&[(PUBLIC_ABSTRACT, "compareTo", "(Ljava/lang/Object;)I")]],
    ),
    interface("java.lang.Runnable", &[], &[&[(PUBLIC_ABSTRACT, "run", "()V")]]),
    interface("java.lang.AutoCloseable", &[], &[&[(PUBLIC_ABSTRACT, "close", "()V")]]),
    interface(
        "java.io.Closeable",
        &["java.lang.AutoCloseable"],
        &[&[(PUBLIC_ABSTRACT, "close", "()V")]],
    ),
    interface("java.io.Flushable", &[], &[&[(PUBLIC_ABSTRACT, "flush", "()V")]]),
    interface(
        "java.lang.Iterable",
        &[],
        &[&[
            (PUBLIC_ABSTRACT, "iterator", "()Ljava/util/Iterator;"),
            (PUBLIC, "forEach", "(Ljava/util/function/Consumer;)V"),
            (PUBLIC, "spliterator", "()Ljava/util/Spliterator;"),
        ]],
    ),
    interface(
        "java.lang.annotation.Annotation",
        &[],
        &[&[
            (PUBLIC_ABSTRACT, "equals", "(Ljava/lang/Object;)Z"),
            (PUBLIC_ABSTRACT, "hashCode", "()I"),
            (PUBLIC_ABSTRACT, "toString", "()Ljava/lang/String;"),
            (PUBLIC_ABSTRACT, "annotationType", "()Ljava/lang/Class;"),
        ]],
    ),
    Stub {
        name: "java.lang.Throwable",
        access: CLASS,
        super_name: Some(OBJECT),
        interfaces: &[SERIALIZABLE],
        methods: &[THROWABLE_CONSTRUCTORS, SUPPRESSION_CONSTRUCTOR, THROWABLE_METHODS],
    },
    exception("java.lang.Exception", "java.lang.Throwable", true),
    exception("java.lang.Error", "java.lang.Throwable", true),
    exception("java.lang.RuntimeException", "java.lang.Exception", true),
    exception("java.io.IOException", "java.lang.Exception", false),
    exception("java.lang.IllegalArgumentException", "java.lang.RuntimeException", false),
    exception("java.lang.IllegalStateException", "java.lang.RuntimeException", false),
    exception("java.lang.UnsupportedOperationException", "java.lang.RuntimeException", false),
    Stub {
        name: "java.lang.Enum",
        access: ABSTRACT_CLASS,
        super_name: Some(OBJECT),
        interfaces: &["java.lang.Comparable", SERIALIZABLE],
        methods: &[ENUM_METHODS],
    },
    Stub {
        name: "java.lang.Record",
        access: ABSTRACT_CLASS,
        super_name: Some(OBJECT),
        interfaces: &[],
        methods: &[&[
            (PROTECTED, "<init>", "()V"),
            (PUBLIC_ABSTRACT, "equals", "(Ljava/lang/Object;)Z"),
            (PUBLIC_ABSTRACT, "hashCode", "()I"),
            (PUBLIC_ABSTRACT, "toString", "()Ljava/lang/String;"),
        ]],
    },
];

/// Hard-coded description of `java.lang.Object`, which every hierarchy search reaches.
pub fn java_lang_object() -> ClassInfo {
    build(&STUBS[0])
}

/// The hard-coded description of a JDK class, if it has one.
pub fn jdk_class(class_name: &str) -> Option<ClassInfo> {
    STUBS.iter().find(|stub| stub.name == class_name).map(build)
}

fn build(stub: &Stub) -> ClassInfo {
    let methods = stub
        .methods
        .iter()
        .flat_map(|group| group.iter())
        .map(|&(access, name, descriptor)| MethodInfo {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            access: AccessFlags(access),
            has_code: !AccessFlags(access).is_abstract(),
            catch_types: Vec::new(),
        })
        .collect();
    ClassInfo {
        name: stub.name.to_string(),
        access: AccessFlags(stub.access),
        super_name: stub.super_name.map(str::to_string),
        interfaces: stub.interfaces.iter().map(|name| name.to_string()).collect(),
        fields: Vec::new(),
        methods,
        inner_classes: Vec::new(),
        class_constants: Vec::new(),
        member_refs: Vec::new(),
        used_class_indices: HashSet::new(),
    }
}
