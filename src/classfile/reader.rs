//! Parsing class files into raw structures whose constants are resolved by value.

use super::*;

use nom::bytes::complete::take;
use nom::error::{ErrorKind, ParseError};
use nom::multi::count;
use nom::number::complete::{be_i32, be_i64, be_u16, be_u32, be_u8};
use nom::IResult;

impl<I> ParseError<I> for ClassFileError {
    fn from_error_kind(_: I, _: ErrorKind) -> Self {
        return ClassFileError::Truncated;
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

pub type ClassResult<'a, T> = IResult<&'a [u8], T, ClassFileError>;

fn fail<'a, T>(e: ClassFileError) -> ClassResult<'a, T> {
    return Err(nom::Err::Failure(e));
}

/// Turn a parser result into a plain one, insisting that all input was used.
pub fn finish<T>(res: ClassResult<'_, T>) -> Result<T, ClassFileError> {
    match res {
        Ok((rest, _)) if !rest.is_empty() => return Err(ClassFileError::TrailingBytes),
        Ok((_, v)) => return Ok(v),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(e),
        Err(nom::Err::Incomplete(_)) => return Err(ClassFileError::Truncated),
    }
}

/// One constant pool slot.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Constant(Constant),
    /// A tag the archive format cannot carry, e.g. `CONSTANT_MethodHandle`.
    Unsupported(u8),
    /// Slot 0, and the slot after a long or double.
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum RawEntry {
    Utf8(U16String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    Field(u16, u16),
    Method(u16, u16),
    InterfaceMethod(u16, u16),
    NameAndType(u16, u16),
    Unsupported(u8),
    Empty,
}

/// A class file's constant pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassPool {
    entries: Vec<PoolEntry>,
}

impl ClassPool {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&Constant, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(PoolEntry::Constant(c)) => return Ok(c),
            Some(PoolEntry::Unsupported(tag)) => {
                return Err(ClassFileError::Unsupported(format!("constant pool tag {}", tag)))
            }
            _ => return Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    /// `None` for index 0.
    pub fn get_optional(&self, index: u16) -> Result<Option<&Constant>, ClassFileError> {
        if index == 0 {
            return Ok(None);
        }
        return self.get(index).map(Some);
    }

    pub fn utf8(&self, index: u16) -> Result<String, ClassFileError> {
        match self.get(index)? {
            Constant::Utf8(s) => return s.to_string().map_err(|_| ClassFileError::BadUtf8),
            _ => return Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<String, ClassFileError> {
        match self.get(index)? {
            Constant::Class(name) => return Ok(name.clone()),
            _ => return Err(ClassFileError::BadConstantIndex(index)),
        }
    }

    /// The first tag in the pool that cannot be packed.
    pub fn unsupported_tag(&self) -> Option<u8> {
        return self.entries.iter().find_map(|e| match e {
            PoolEntry::Unsupported(tag) => Some(*tag),
            _ => None,
        });
    }

    pub fn constants(&self) -> impl Iterator<Item = &Constant> {
        return self.entries.iter().filter_map(|e| match e {
            PoolEntry::Constant(c) => Some(c),
            _ => None,
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute<'a> {
    pub name: String,
    pub info: &'a [u8],
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawMember<'a> {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<RawAttribute<'a>>,
}

/// A class file with its constants resolved, but attributes left as bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawClass<'a> {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ClassPool,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<RawMember<'a>>,
    pub methods: Vec<RawMember<'a>>,
    pub attributes: Vec<RawAttribute<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawHandler {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCode<'a> {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: &'a [u8],
    pub handlers: Vec<RawHandler>,
    pub attributes: Vec<RawAttribute<'a>>,
}

/// Decode modified UTF-8 into UTF-16 code units, keeping lone surrogates.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<U16String, ClassFileError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let cont = |b: Option<&u8>| match b {
        Some(b) if b & 0xC0 == 0x80 => Ok((*b & 0x3F) as u16),
        _ => Err(ClassFileError::BadUtf8),
    };
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 < 0x80 {
            units.push(b0 as u16);
            i += 1;
        } else if b0 & 0xE0 == 0xC0 {
            units.push(((b0 & 0x1F) as u16) << 6 | cont(bytes.get(i + 1))?);
            i += 2;
        } else if b0 & 0xF0 == 0xE0 {
            let hi = cont(bytes.get(i + 1))?;
            let lo = cont(bytes.get(i + 2))?;
            units.push(((b0 & 0x0F) as u16) << 12 | hi << 6 | lo);
            i += 3;
        } else {
            return Err(ClassFileError::BadUtf8);
        }
    }
    return Ok(U16String::from_vec(units));
}

fn pool_entry(input: &[u8]) -> ClassResult<'_, RawEntry> {
    let (input, tag) = be_u8(input)?;
    match tag {
        1 => {
            let (input, len) = be_u16(input)?;
            let (input, bytes) = take(len)(input)?;
            return match decode_modified_utf8(bytes) {
                Ok(s) => Ok((input, RawEntry::Utf8(s))),
                Err(e) => fail(e),
            };
        }
        3 => {
            let (input, v) = be_i32(input)?;
            return Ok((input, RawEntry::Integer(v)));
        }
        4 => {
            let (input, v) = be_u32(input)?;
            return Ok((input, RawEntry::Float(v)));
        }
        5 => {
            let (input, v) = be_i64(input)?;
            return Ok((input, RawEntry::Long(v)));
        }
        6 => {
            let (input, v) = be_i64(input)?;
            return Ok((input, RawEntry::Double(v as u64)));
        }
        7 => {
            let (input, v) = be_u16(input)?;
            return Ok((input, RawEntry::Class(v)));
        }
        8 => {
            let (input, v) = be_u16(input)?;
            return Ok((input, RawEntry::String(v)));
        }
        9..=12 => {
            let (input, a) = be_u16(input)?;
            let (input, b) = be_u16(input)?;
            let entry = match tag {
                9 => RawEntry::Field(a, b),
                10 => RawEntry::Method(a, b),
                11 => RawEntry::InterfaceMethod(a, b),
                _ => RawEntry::NameAndType(a, b),
            };
            return Ok((input, entry));
        }
        15 => {
            let (input, _) = take(3usize)(input)?;
            return Ok((input, RawEntry::Unsupported(tag)));
        }
        16 | 19 | 20 => {
            let (input, _) = take(2usize)(input)?;
            return Ok((input, RawEntry::Unsupported(tag)));
        }
        17 | 18 => {
            let (input, _) = take(4usize)(input)?;
            return Ok((input, RawEntry::Unsupported(tag)));
        }
        _ => return fail(ClassFileError::BadConstantTag(tag)),
    }
}

fn raw_pool(input: &[u8]) -> ClassResult<'_, Vec<RawEntry>> {
    let (mut input, n) = be_u16(input)?;
    let mut entries = vec![RawEntry::Empty];
    while entries.len() < n as usize {
        let (rest, entry) = pool_entry(input)?;
        input = rest;
        let wide = matches!(entry, RawEntry::Long(_) | RawEntry::Double(_));
        entries.push(entry);
        if wide {
            entries.push(RawEntry::Empty);
        }
    }
    if entries.len() > n as usize && n > 0 {
        return fail(ClassFileError::BadConstantIndex(n));
    }
    return Ok((input, entries));
}

fn resolve_pool(raw: &[RawEntry]) -> Result<ClassPool, ClassFileError> {
    let utf8 = |i: u16| -> Result<String, ClassFileError> {
        match raw.get(i as usize) {
            Some(RawEntry::Utf8(s)) => return s.to_string().map_err(|_| ClassFileError::BadUtf8),
            _ => return Err(ClassFileError::BadConstantIndex(i)),
        }
    };
    let name_and_type = |i: u16| -> Result<(String, String), ClassFileError> {
        match raw.get(i as usize) {
            Some(RawEntry::NameAndType(n, d)) => return Ok((utf8(*n)?, utf8(*d)?)),
            _ => return Err(ClassFileError::BadConstantIndex(i)),
        }
    };
    let member = |class: u16, nt: u16| -> Result<MemberRef, ClassFileError> {
        let class = match raw.get(class as usize) {
            Some(RawEntry::Class(name)) => utf8(*name)?,
            _ => return Err(ClassFileError::BadConstantIndex(class)),
        };
        let (name, descriptor) = name_and_type(nt)?;
        return Ok(MemberRef {
            class,
            name,
            descriptor,
        });
    };

    let mut entries = Vec::with_capacity(raw.len());
    for entry in raw {
        let constant = match entry {
            RawEntry::Utf8(s) => Constant::Utf8(s.clone()),
            RawEntry::Integer(v) => Constant::Integer(*v),
            RawEntry::Float(v) => Constant::Float(*v),
            RawEntry::Long(v) => Constant::Long(*v),
            RawEntry::Double(v) => Constant::Double(*v),
            RawEntry::Class(name) => Constant::Class(utf8(*name)?),
            RawEntry::String(s) => match raw.get(*s as usize) {
                Some(RawEntry::Utf8(s)) => Constant::String(s.clone()),
                _ => return Err(ClassFileError::BadConstantIndex(*s)),
            },
            RawEntry::Field(c, nt) => Constant::Field(member(*c, *nt)?),
            RawEntry::Method(c, nt) => Constant::Method(member(*c, *nt)?),
            RawEntry::InterfaceMethod(c, nt) => Constant::InterfaceMethod(member(*c, *nt)?),
            RawEntry::NameAndType(n, d) => {
                let (name, descriptor) = (utf8(*n)?, utf8(*d)?);
                Constant::NameAndType { name, descriptor }
            }
            RawEntry::Unsupported(tag) => {
                entries.push(PoolEntry::Unsupported(*tag));
                continue;
            }
            RawEntry::Empty => {
                entries.push(PoolEntry::Empty);
                continue;
            }
        };
        entries.push(PoolEntry::Constant(constant));
    }
    return Ok(ClassPool { entries });
}

fn raw_attribute<'a>(input: &'a [u8], pool: &ClassPool) -> ClassResult<'a, RawAttribute<'a>> {
    let (input, name) = be_u16(input)?;
    let (input, len) = be_u32(input)?;
    let (input, info) = take(len)(input)?;
    let name = match pool.utf8(name) {
        Ok(name) => name,
        Err(e) => return fail(e),
    };
    return Ok((input, RawAttribute { name, info }));
}

pub fn raw_attributes<'a>(input: &'a [u8], pool: &ClassPool) -> ClassResult<'a, Vec<RawAttribute<'a>>> {
    let (input, n) = be_u16(input)?;
    return count(|i| raw_attribute(i, pool), n as usize)(input);
}

fn raw_member<'a>(input: &'a [u8], pool: &ClassPool) -> ClassResult<'a, RawMember<'a>> {
    let (input, access_flags) = be_u16(input)?;
    let (input, name) = be_u16(input)?;
    let (input, descriptor) = be_u16(input)?;
    let (input, attributes) = raw_attributes(input, pool)?;
    let (name, descriptor) = match (pool.utf8(name), pool.utf8(descriptor)) {
        (Ok(n), Ok(d)) => (n, d),
        (Err(e), _) | (_, Err(e)) => return fail(e),
    };
    return Ok((
        input,
        RawMember {
            access_flags,
            name,
            descriptor,
            attributes,
        },
    ));
}

fn class_file(input: &[u8]) -> ClassResult<'_, RawClass<'_>> {
    let (input, magic) = be_u32(input)?;
    if magic != MAGIC {
        return fail(ClassFileError::BadMagic);
    }
    let (input, minor_version) = be_u16(input)?;
    let (input, major_version) = be_u16(input)?;
    let (input, raw) = raw_pool(input)?;
    let pool = match resolve_pool(&raw) {
        Ok(pool) => pool,
        Err(e) => return fail(e),
    };
    let (input, access_flags) = be_u16(input)?;
    let (input, this_class) = be_u16(input)?;
    let (input, super_class) = be_u16(input)?;
    let (input, n) = be_u16(input)?;
    let (input, interfaces) = count(be_u16, n as usize)(input)?;
    let (input, n) = be_u16(input)?;
    let (input, fields) = count(|i| raw_member(i, &pool), n as usize)(input)?;
    let (input, n) = be_u16(input)?;
    let (input, methods) = count(|i| raw_member(i, &pool), n as usize)(input)?;
    let (input, attributes) = raw_attributes(input, &pool)?;

    let names = (|| -> Result<_, ClassFileError> {
        let this_class = pool.class_name(this_class)?;
        let super_class = match super_class {
            0 => None,
            i => Some(pool.class_name(i)?),
        };
        let interfaces = interfaces
            .iter()
            .map(|i| pool.class_name(*i))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok((this_class, super_class, interfaces));
    })();
    let (this_class, super_class, interfaces) = match names {
        Ok(names) => names,
        Err(e) => return fail(e),
    };
    return Ok((
        input,
        RawClass {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        },
    ));
}

/// Parse a whole class file.
pub fn read_class(bytes: &[u8]) -> Result<RawClass<'_>, ClassFileError> {
    return finish(class_file(bytes));
}

fn code_attribute<'a>(input: &'a [u8], pool: &ClassPool) -> ClassResult<'a, RawCode<'a>> {
    let (input, max_stack) = be_u16(input)?;
    let (input, max_locals) = be_u16(input)?;
    let (input, len) = be_u32(input)?;
    let (input, code) = take(len)(input)?;
    let (mut input, n) = be_u16(input)?;
    let mut handlers = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let (rest, start_pc) = be_u16(input)?;
        let (rest, end_pc) = be_u16(rest)?;
        let (rest, handler_pc) = be_u16(rest)?;
        let (rest, catch) = be_u16(rest)?;
        input = rest;
        let catch_type = match catch {
            0 => None,
            i => match pool.class_name(i) {
                Ok(name) => Some(name),
                Err(e) => return fail(e),
            },
        };
        handlers.push(RawHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }
    let (input, attributes) = raw_attributes(input, pool)?;
    return Ok((
        input,
        RawCode {
            max_stack,
            max_locals,
            code,
            handlers,
            attributes,
        },
    ));
}

/// Parse the body of a `Code` attribute.
pub fn read_code<'a>(info: &'a [u8], pool: &ClassPool) -> Result<RawCode<'a>, ClassFileError> {
    return finish(code_attribute(info, pool));
}

fn inner_class<'a>(input: &'a [u8], pool: &ClassPool) -> ClassResult<'a, InnerClass> {
    let (input, inner) = be_u16(input)?;
    let (input, outer) = be_u16(input)?;
    let (input, name) = be_u16(input)?;
    let (input, flags) = be_u16(input)?;
    let resolved = (|| -> Result<InnerClass, ClassFileError> {
        return Ok(InnerClass {
            inner: pool.class_name(inner)?,
            outer: match outer {
                0 => None,
                i => Some(pool.class_name(i)?),
            },
            name: match name {
                0 => None,
                i => Some(pool.utf8(i)?),
            },
            flags,
        });
    })();
    return match resolved {
        Ok(ic) => Ok((input, ic)),
        Err(e) => fail(e),
    };
}

/// Parse the body of an `InnerClasses` attribute.
pub fn read_inner_classes(info: &[u8], pool: &ClassPool) -> Result<Vec<InnerClass>, ClassFileError> {
    let res = (|| -> ClassResult<'_, Vec<InnerClass>> {
        let (input, n) = be_u16(info)?;
        return count(|i| inner_class(i, pool), n as usize)(input);
    })();
    return finish(res);
}
