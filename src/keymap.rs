//! XKB keymap loading
//!
//! Compositors share the keymap as a read-only descriptor holding a
//! NUL-terminated XKB v1 text keymap. Hosts call [`load_keymap`] from their
//! [`crate::display::DispatchSink::initialize_keymap`] implementation.

use memmap2::MmapOptions;
use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;
use thiserror::Error;
use xkbcommon::xkb;

#[derive(Debug, Error)]
pub enum KeymapError {
    #[error("failed to map keymap: {0}")]
    Map(#[from] io::Error),
    #[error("keymap is not valid UTF-8")]
    Encoding,
    #[error("failed to compile keymap")]
    Compile,
}

/// Maps `size` bytes of `fd` and compiles them as an XKB v1 text keymap.
pub fn load_keymap(
    context: &xkb::Context,
    fd: OwnedFd,
    size: u32,
) -> Result<xkb::Keymap, KeymapError> {
    if size == 0 {
        return Err(KeymapError::Map(io::Error::new(
            io::ErrorKind::InvalidData,
            "empty keymap",
        )));
    }
    let file = File::from(fd);
    // SAFETY: the compositor keeps the file at least `size` bytes long.
    let map = unsafe { MmapOptions::new().len(size as usize).map_copy_read_only(&file)? };

    let text = keymap_text(&map)?;
    xkb::Keymap::new_from_string(
        context,
        text.to_owned(),
        xkb::KEYMAP_FORMAT_TEXT_V1,
        xkb::KEYMAP_COMPILE_NO_FLAGS,
    )
    .ok_or(KeymapError::Compile)
}

/// Keymap text up to the first NUL.
fn keymap_text(bytes: &[u8]) -> Result<&str, KeymapError> {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end]).map_err(|_| KeymapError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn keymap_file(bytes: &[u8]) -> (OwnedFd, u32) {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(bytes).unwrap();
        (OwnedFd::from(file), bytes.len() as u32)
    }

    fn context() -> xkb::Context {
        xkb::Context::new(xkb::CONTEXT_NO_FLAGS)
    }

    #[test]
    fn test_keymap_text_stops_at_nul() {
        assert_eq!(keymap_text(b"xkb_keymap {};\0garbage").unwrap(), "xkb_keymap {};");
        assert_eq!(keymap_text(b"no terminator").unwrap(), "no terminator");
        assert!(matches!(keymap_text(&[0xff, 0xfe, 0]), Err(KeymapError::Encoding)));
    }

    #[test]
    fn test_empty_keymap_fails_to_map() {
        let (fd, _) = keymap_file(b"");
        assert!(matches!(load_keymap(&context(), fd, 0), Err(KeymapError::Map(_))));
    }

    #[test]
    fn test_invalid_encoding() {
        let (fd, size) = keymap_file(&[0xc3, 0x28, 0]);
        assert!(matches!(load_keymap(&context(), fd, size), Err(KeymapError::Encoding)));
    }

    #[test]
    fn test_garbage_fails_to_compile() {
        let (fd, size) = keymap_file(b"this is not a keymap\0");
        assert!(matches!(load_keymap(&context(), fd, size), Err(KeymapError::Compile)));
    }

    #[test]
    fn test_roundtrip_of_system_keymap() {
        let context = context();
        // Needs xkeyboard-config data on the test machine.
        let keymap = xkb::Keymap::new_from_names(
            &context,
            "",
            "",
            "",
            "",
            None,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        );
        let Some(keymap) = keymap else {
            return;
        };
        let mut text = keymap.get_as_string(xkb::KEYMAP_FORMAT_TEXT_V1).into_bytes();
        text.push(0);

        let (fd, size) = keymap_file(&text);
        let loaded = load_keymap(&context, fd, size).unwrap();
        assert_eq!(loaded.num_layouts(), keymap.num_layouts());
    }
}
