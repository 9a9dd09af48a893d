//! Archive members, as the packer takes them and the unpacker hands them out.

use alloc::string::String;
use alloc::vec::Vec;
use crc::{Crc, CRC_32_ISO_HDLC};

/// The checksum JAR files store for each member.
const JAR_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path within the archive, with `/` separators.
    pub name: String,
    pub contents: Vec<u8>,
    /// Seconds since the epoch.
    pub modtime: i32,
    /// Whether the member should be stored deflated.
    pub deflate_hint: bool,
}

impl Entry {
    pub fn new(name: &str, contents: Vec<u8>) -> Entry {
        return Entry {
            name: String::from(name),
            contents,
            modtime: 0,
            deflate_hint: false,
        };
    }

    pub fn is_class(&self) -> bool {
        return self.name.ends_with(".class");
    }

    /// CRC-32 of the contents.
    pub fn crc32(&self) -> u32 {
        let mut digest = JAR_CRC.digest();
        digest.update(&self.contents);
        return digest.finalize();
    }
}

/// Where unpacked members go.
pub trait EntrySink {
    /// Accept the next member. An error stops unpacking.
    fn accept(&mut self, entry: Entry) -> Result<(), String>;
}

impl EntrySink for Vec<Entry> {
    fn accept(&mut self, entry: Entry) -> Result<(), String> {
        self.push(entry);
        return Ok(());
    }
}
