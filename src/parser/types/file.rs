/// `file_options` bit for the deflate hint.
pub const FILE_DEFLATE_HINT: u32 = 1 << 0;
/// `file_options` bit for a file whose contents are the next class.
pub const FILE_CLASS_STUB: u32 = 1 << 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBands<'a> {
    /// Utf8 index.
    pub name: usize,
    pub size: u64,
    /// Seconds relative to the archive modtime.
    pub modtime: i32,
    pub options: u32,
    pub bits: &'a [u8],
}

impl<'a> FileBands<'a> {
    pub fn is_class_stub(&self) -> bool {
        return self.options & FILE_CLASS_STUB != 0;
    }

    pub fn deflate_hint(&self) -> bool {
        return self.options & FILE_DEFLATE_HINT != 0;
    }
}
