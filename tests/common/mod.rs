//! Class files assembled byte by byte, independent of the crate's own writer.

#![allow(dead_code)]

use std::collections::HashMap;

#[derive(Clone, PartialEq, Eq, Hash)]
enum Key {
    Utf8(String),
    Integer(i32),
    Class(String),
    String(String),
    NameAndType(String, String),
    Field(String, String, String),
    Method(String, String, String),
}

/// Builds a class file with a deduplicated constant pool.
pub struct ClassBuilder {
    pool: Vec<u8>,
    indexes: HashMap<Key, u16>,
    next: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
    inner_classes: Vec<[u16; 4]>,
    major_version: u16,
}

fn u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

impl ClassBuilder {
    pub fn new(name: &str, super_class: &str) -> ClassBuilder {
        let mut b = ClassBuilder {
            pool: Vec::new(),
            indexes: HashMap::new(),
            next: 1,
            access_flags: 0x21,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
            inner_classes: Vec::new(),
            major_version: 50,
        };
        b.this_class = b.class(name);
        b.super_class = b.class(super_class);
        return b;
    }

    fn entry(&mut self, key: Key, bytes: Vec<u8>) -> u16 {
        if let Some(i) = self.indexes.get(&key) {
            return *i;
        }
        let index = self.next;
        self.next += 1;
        self.pool.extend_from_slice(&bytes);
        self.indexes.insert(key, index);
        return index;
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        let mut bytes = vec![1];
        u2(&mut bytes, s.len() as u16);
        bytes.extend_from_slice(s.as_bytes());
        return self.entry(Key::Utf8(s.to_string()), bytes);
    }

    pub fn integer(&mut self, v: i32) -> u16 {
        let mut bytes = vec![3];
        u4(&mut bytes, v as u32);
        return self.entry(Key::Integer(v), bytes);
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        u2(&mut bytes, name_index);
        return self.entry(Key::Class(name.to_string()), bytes);
    }

    pub fn string(&mut self, s: &str) -> u16 {
        let utf8 = self.utf8(s);
        let mut bytes = vec![8];
        u2(&mut bytes, utf8);
        return self.entry(Key::String(s.to_string()), bytes);
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        let mut bytes = vec![12];
        u2(&mut bytes, n);
        u2(&mut bytes, d);
        return self.entry(Key::NameAndType(name.to_string(), descriptor.to_string()), bytes);
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let c = self.class(class);
        let nt = self.name_and_type(name, descriptor);
        let mut bytes = vec![9];
        u2(&mut bytes, c);
        u2(&mut bytes, nt);
        return self.entry(Key::Field(class.to_string(), name.to_string(), descriptor.to_string()), bytes);
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let c = self.class(class);
        let nt = self.name_and_type(name, descriptor);
        let mut bytes = vec![10];
        u2(&mut bytes, c);
        u2(&mut bytes, nt);
        return self.entry(Key::Method(class.to_string(), name.to_string(), descriptor.to_string()), bytes);
    }

    pub fn version(mut self, major: u16) -> ClassBuilder {
        self.major_version = major;
        return self;
    }

    pub fn interface(mut self, name: &str) -> ClassBuilder {
        let c = self.class(name);
        self.interfaces.push(c);
        return self;
    }

    pub fn field(mut self, access_flags: u16, name: &str, descriptor: &str) -> ClassBuilder {
        let mut out = Vec::new();
        u2(&mut out, access_flags);
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        u2(&mut out, n);
        u2(&mut out, d);
        u2(&mut out, 0);
        self.fields.push(out);
        return self;
    }

    /// A method with a `Code` attribute holding `code` and no handlers.
    pub fn method(mut self, access_flags: u16, name: &str, descriptor: &str, max_stack: u16, max_locals: u16, code: &[u8]) -> ClassBuilder {
        let mut out = Vec::new();
        u2(&mut out, access_flags);
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        let code_name = self.utf8("Code");
        u2(&mut out, n);
        u2(&mut out, d);
        u2(&mut out, 1);
        u2(&mut out, code_name);
        u4(&mut out, 12 + code.len() as u32);
        u2(&mut out, max_stack);
        u2(&mut out, max_locals);
        u4(&mut out, code.len() as u32);
        out.extend_from_slice(code);
        u2(&mut out, 0);
        u2(&mut out, 0);
        self.methods.push(out);
        return self;
    }

    /// A method without code, carrying the attributes `attributes` as given.
    pub fn abstract_method(mut self, access_flags: u16, name: &str, descriptor: &str, attributes: Vec<(&str, Vec<u8>)>) -> ClassBuilder {
        let mut out = Vec::new();
        u2(&mut out, access_flags);
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        u2(&mut out, n);
        u2(&mut out, d);
        u2(&mut out, attributes.len() as u16);
        for (name, info) in attributes {
            let name = self.utf8(name);
            u2(&mut out, name);
            u4(&mut out, info.len() as u32);
            out.extend_from_slice(&info);
        }
        self.methods.push(out);
        return self;
    }

    pub fn class_attribute(mut self, name: &str, info: Vec<u8>) -> ClassBuilder {
        let name = self.utf8(name);
        let mut out = Vec::new();
        u2(&mut out, name);
        u4(&mut out, info.len() as u32);
        out.extend_from_slice(&info);
        self.attributes.push(out);
        return self;
    }

    pub fn source_file(mut self, file: &str) -> ClassBuilder {
        let name = self.utf8("SourceFile");
        let value = self.utf8(file);
        let mut out = Vec::new();
        u2(&mut out, name);
        u4(&mut out, 2);
        u2(&mut out, value);
        self.attributes.push(out);
        return self;
    }

    pub fn inner_class(mut self, inner: &str, outer: Option<&str>, name: Option<&str>, flags: u16) -> ClassBuilder {
        let inner = self.class(inner);
        let outer = outer.map(|o| self.class(o)).unwrap_or(0);
        let name = name.map(|n| self.utf8(n)).unwrap_or(0);
        self.inner_classes.push([inner, outer, name, flags]);
        return self;
    }

    pub fn build(mut self) -> Vec<u8> {
        if !self.inner_classes.is_empty() {
            let name = self.utf8("InnerClasses");
            let mut out = Vec::new();
            u2(&mut out, name);
            u4(&mut out, 2 + 8 * self.inner_classes.len() as u32);
            u2(&mut out, self.inner_classes.len() as u16);
            for entry in &self.inner_classes {
                for v in entry {
                    u2(&mut out, *v);
                }
            }
            self.attributes.push(out);
        }
        let mut out = Vec::new();
        u4(&mut out, 0xCAFE_BABE);
        u2(&mut out, 0);
        u2(&mut out, self.major_version);
        u2(&mut out, self.next);
        out.extend_from_slice(&self.pool);
        u2(&mut out, self.access_flags);
        u2(&mut out, self.this_class);
        u2(&mut out, self.super_class);
        u2(&mut out, self.interfaces.len() as u16);
        for i in &self.interfaces {
            u2(&mut out, *i);
        }
        for members in [&self.fields, &self.methods] {
            u2(&mut out, members.len() as u16);
            for m in members {
                out.extend_from_slice(m);
            }
        }
        u2(&mut out, self.attributes.len() as u16);
        for a in &self.attributes {
            out.extend_from_slice(a);
        }
        return out;
    }
}

/// `Hello`, printing a greeting from `main`, with a default constructor and a source file.
pub fn hello() -> Vec<u8> {
    let mut b = ClassBuilder::new("Hello", "java/lang/Object");
    let init = b.method_ref("java/lang/Object", "<init>", "()V");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let greeting = b.string("hello");
    let println = b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let [init_hi, init_lo] = init.to_be_bytes();
    let [out_hi, out_lo] = out.to_be_bytes();
    let [println_hi, println_lo] = println.to_be_bytes();
    return b
        .method(0x01, "<init>", "()V", 1, 1, &[0x2A, 0xB7, init_hi, init_lo, 0xB1])
        .method(
            0x09,
            "main",
            "([Ljava/lang/String;)V",
            2,
            1,
            &[0xB2, out_hi, out_lo, 0x12, greeting as u8, 0xB6, println_hi, println_lo, 0xB1],
        )
        .source_file("Hello.java")
        .build();
}

/// `Outer`, holding a counter field and declaring its member class `Outer$Inner`.
pub fn outer() -> Vec<u8> {
    let mut b = ClassBuilder::new("Outer", "java/lang/Object");
    let field = b.field_ref("Outer", "count", "I");
    let [hi, lo] = field.to_be_bytes();
    return b
        .field(0x02, "count", "I")
        .method(0x01, "next", "()I", 3, 1, &[0x2A, 0x59, 0xB4, hi, lo, 0x04, 0x60, 0x5A, 0xB5, hi, lo, 0xAC])
        .inner_class("Outer$Inner", Some("Outer"), Some("Inner"), 0x09)
        .build();
}

/// `Outer$Inner`, a static member class with a constant.
pub fn inner() -> Vec<u8> {
    let mut b = ClassBuilder::new("Outer$Inner", "java/lang/Object");
    let big = b.integer(100_000);
    return b
        .method(0x09, "big", "()I", 1, 0, &[0x12, big as u8, 0xAC])
        .inner_class("Outer$Inner", Some("Outer"), Some("Inner"), 0x09)
        .build();
}

/// `Annotated`, with annotations on the class, a parameter and an annotation default.
///
/// The element values cover constants, strings, arrays and nested annotations.
pub fn annotated() -> Vec<u8> {
    let mut b = ClassBuilder::new("Annotated", "java/lang/Object");
    let marker = b.utf8("LMarker;");
    let count = b.utf8("count");
    let label = b.utf8("label");
    let values = b.utf8("values");
    let nested = b.utf8("nested");
    let hi = b.utf8("hi");
    let seven = b.integer(7);
    let one = b.integer(1);
    let two = b.integer(2);

    // @Marker(count = 7, label = "hi", values = {1, 2})
    let mut visible = Vec::new();
    u2(&mut visible, 1);
    u2(&mut visible, marker);
    u2(&mut visible, 3);
    u2(&mut visible, count);
    visible.push(b'I');
    u2(&mut visible, seven);
    u2(&mut visible, label);
    visible.push(b's');
    u2(&mut visible, hi);
    u2(&mut visible, values);
    visible.push(b'[');
    u2(&mut visible, 2);
    visible.push(b'I');
    u2(&mut visible, one);
    visible.push(b'I');
    u2(&mut visible, two);

    // @Marker(nested = @Marker)
    let mut invisible = Vec::new();
    u2(&mut invisible, 1);
    u2(&mut invisible, marker);
    u2(&mut invisible, 1);
    u2(&mut invisible, nested);
    invisible.push(b'@');
    u2(&mut invisible, marker);
    u2(&mut invisible, 0);

    let mut default = vec![b'I'];
    u2(&mut default, seven);

    // One parameter annotated @Marker.
    let mut parameters = vec![1];
    u2(&mut parameters, 1);
    u2(&mut parameters, marker);
    u2(&mut parameters, 0);

    return b
        .class_attribute("RuntimeVisibleAnnotations", visible)
        .class_attribute("RuntimeInvisibleAnnotations", invisible)
        .abstract_method(0x0401, "count", "()I", vec![("AnnotationDefault", default)])
        .abstract_method(
            0x0401,
            "take",
            "(I)V",
            vec![("RuntimeVisibleParameterAnnotations", parameters)],
        )
        .build();
}
