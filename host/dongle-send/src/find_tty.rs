use std::fs::DirEntry;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::FileTypeExt;
use std::path::PathBuf;

pub static PATTERNS: [&str; 6] = [
    "ttyUSB",
    "ttyACM",
    "tty.usbserial",
    "cu.usbserial",
    "tty.SLAB_USB",
    "cu.SLAB_USB",
];

fn matches_pattern(file_name: &[u8]) -> bool {
    PATTERNS
        .iter()
        .any(|pattern| file_name.starts_with(pattern.as_bytes()))
}

/// Picks the most recently modified character device in `/dev` that looks like a USB serial
/// bridge.
pub fn find_most_recent_tty() -> Option<PathBuf> {
    let dev = match std::fs::read_dir("/dev") {
        Ok(dev) => dev,
        Err(e) => {
            tracing::error!("failed to open /dev: {e}");
            return None;
        }
    };
    dev.filter_map(|entry| -> Option<(DirEntry, std::time::SystemTime)> {
        let e = entry.ok()?;
        if !e.file_type().ok()?.is_char_device() {
            return None;
        }
        if !matches_pattern(e.file_name().as_bytes()) {
            return None;
        }
        let modified = e.metadata().ok()?.modified().ok()?;
        Some((e, modified))
    })
    .max_by_key(|(_, modified)| *modified)
    .map(|(e, _)| e.path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns() {
        assert!(matches_pattern(b"ttyUSB0"));
        assert!(matches_pattern(b"ttyACM12"));
        assert!(matches_pattern(b"cu.usbserial-1420"));
        assert!(!matches_pattern(b"tty0"));
        assert!(!matches_pattern(b"hidraw3"));
    }
}
