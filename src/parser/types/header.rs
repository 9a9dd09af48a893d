use crate::layout::AttributeContext;

pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xD0, 0x0D];
pub const MINOR_VERSION: i32 = 7;
pub const MAJOR_VERSION: i32 = 150;

/// The `archive_options` bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ArchiveOptions(pub u32);

impl ArchiveOptions {
    pub const HAVE_SPECIAL_FORMATS: u32 = 1 << 0;
    pub const HAVE_CP_NUMBERS: u32 = 1 << 1;
    pub const HAVE_ALL_CODE_FLAGS: u32 = 1 << 2;
    pub const HAVE_FILE_HEADERS: u32 = 1 << 4;
    pub const DEFLATE_HINT: u32 = 1 << 5;
    pub const HAVE_FILE_MODTIME: u32 = 1 << 6;
    pub const HAVE_FILE_OPTIONS: u32 = 1 << 7;
    pub const HAVE_FILE_SIZE_HI: u32 = 1 << 8;
    pub const HAVE_CLASS_FLAGS_HI: u32 = 1 << 9;
    pub const HAVE_FIELD_FLAGS_HI: u32 = 1 << 10;
    pub const HAVE_METHOD_FLAGS_HI: u32 = 1 << 11;
    pub const HAVE_CODE_FLAGS_HI: u32 = 1 << 12;
    /// Bits that must be zero in this format version.
    pub const UNUSED: u32 = !((1 << 13) - 1) | (1 << 3);

    pub fn has(&self, bit: u32) -> bool {
        return self.0 & bit != 0;
    }

    pub fn with(self, bit: u32, on: bool) -> ArchiveOptions {
        if on {
            return ArchiveOptions(self.0 | bit);
        }
        return ArchiveOptions(self.0 & !bit);
    }

    /// Whether holders in `context` transmit high flag words.
    pub fn flags_hi(&self, context: AttributeContext) -> bool {
        return self.has(match context {
            AttributeContext::Class => Self::HAVE_CLASS_FLAGS_HI,
            AttributeContext::Field => Self::HAVE_FIELD_FLAGS_HI,
            AttributeContext::Method => Self::HAVE_METHOD_FLAGS_HI,
            AttributeContext::Code => Self::HAVE_CODE_FLAGS_HI,
        });
    }
}

/// Present when the segment carries file headers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileHeader {
    /// Bytes in the segment after the size fields.
    pub archive_size: u64,
    pub next_count: usize,
    /// Seconds since the epoch, the base of all file modtimes.
    pub modtime: i32,
    pub file_count: usize,
}

/// Numbers of entries in each constant pool partition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpCounts {
    pub utf8: usize,
    pub int: usize,
    pub float: usize,
    pub long: usize,
    pub double: usize,
    pub string: usize,
    pub class: usize,
    pub signature: usize,
    pub descr: usize,
    pub field: usize,
    pub method: usize,
    pub imethod: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHeader<'a> {
    pub minor_version: i32,
    pub major_version: i32,
    pub options: ArchiveOptions,
    pub file_header: Option<FileHeader>,
    pub attr_definition_count: usize,
    pub cp_counts: CpCounts,
    pub ic_count: usize,
    pub default_class_minor: u16,
    pub default_class_major: u16,
    pub class_count: usize,
    /// Extra bytes for codec specifiers of escaped bands.
    pub band_headers: &'a [u8],
}

impl<'a> SegmentHeader<'a> {
    pub fn file_count(&self) -> usize {
        self.file_header.as_ref().map(|h| h.file_count).unwrap_or(0)
    }

    pub fn modtime(&self) -> i32 {
        self.file_header.as_ref().map(|h| h.modtime).unwrap_or(0)
    }
}
