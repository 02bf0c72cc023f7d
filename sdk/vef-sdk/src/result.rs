use vef_types::abi::{VefResult, VefResultKind};
use vef_types::VefError;

/// Safe wrapper over the host-allocated result slot.
///
/// The slot is the only channel back to the host, so every write path here
/// maintains the one invariant the ABI demands: `len <= capacity`, always.
/// Values that do not fit fail with [`VefError::ResultTooLarge`] instead of
/// overrunning; error messages are truncated to fit.
pub struct ResultSlot<'a> {
    raw: &'a mut VefResult,
}

impl<'a> ResultSlot<'a> {
    /// # Safety
    ///
    /// `raw` must point to a live `VefResult` whose `buf` is writable for
    /// `capacity` bytes, and the slot must not be aliased for the lifetime
    /// of the wrapper.
    pub unsafe fn from_raw(raw: *mut VefResult) -> Self {
        Self { raw: &mut *raw }
    }

    pub fn capacity(&self) -> usize {
        self.raw.capacity
    }

    /// Mark the slot as a successful text value.
    pub fn set_text(&mut self, text: &str) -> Result<(), VefError> {
        let bytes = text.as_bytes();
        if bytes.len() > self.raw.capacity {
            return Err(VefError::ResultTooLarge {
                len: bytes.len(),
                capacity: self.raw.capacity,
            });
        }
        self.write_bytes(bytes);
        self.raw.kind = VefResultKind::Value;
        Ok(())
    }

    /// Mark the slot as a successful integer value.
    pub fn set_integer(&mut self, value: i64) {
        self.raw.kind = VefResultKind::Value;
        self.raw.int_value = value;
        self.raw.len = 0;
    }

    /// Mark the slot as SQL NULL.
    pub fn set_null(&mut self) {
        self.raw.kind = VefResultKind::Null;
        self.raw.len = 0;
    }

    /// Mark the slot as an error. The message is truncated at a character
    /// boundary if it exceeds the buffer capacity.
    pub fn set_error(&mut self, message: &str) {
        let truncated = truncate_to_boundary(message, self.raw.capacity);
        self.write_bytes(truncated.as_bytes());
        self.raw.kind = VefResultKind::Error;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.raw.capacity);
        if !bytes.is_empty() {
            // Safety: length checked against capacity by the callers above,
            // and the host guarantees buf is writable for capacity bytes.
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.raw.buf, bytes.len());
            }
        }
        self.raw.len = bytes.len();
    }
}

/// Longest prefix of `text` that fits in `max` bytes without splitting a
/// UTF-8 character.
fn truncate_to_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
