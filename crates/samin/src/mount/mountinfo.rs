//! `/proc/self/mountinfo` parsing.

use std::path::{Path, PathBuf};

/// One line of a mountinfo table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Root of the mount within its filesystem.
    pub root: PathBuf,
    /// Where it is mounted.
    pub mountpoint: PathBuf,
    /// Filesystem type.
    pub fstype: String,
    /// Mount source (usually a device path).
    pub source: String,
    /// Per-superblock options.
    pub super_options: String,
}

impl MountEntry {
    /// Subvolume id from the `subvolid=` super option, if present.
    #[must_use]
    pub fn subvolume_id(&self) -> Option<u64> {
        self.super_options
            .split(',')
            .find_map(|opt| opt.strip_prefix("subvolid="))
            .and_then(|id| id.parse().ok())
    }

    /// Whether the mount source refers to `device`.
    ///
    /// Both sides are canonicalized so that `/dev/disk/by-uuid/...` links match
    /// the kernel's `/dev/sdX` names.
    #[must_use]
    pub fn is_from_device(&self, device: &Path) -> bool {
        let source = Path::new(&self.source);
        if source == device {
            return true;
        }
        match (source.canonicalize(), device.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Parse a mountinfo table, skipping lines that do not parse.
#[must_use]
pub fn parse(table: &str) -> Vec<MountEntry> {
    table.lines().filter_map(parse_line).collect()
}

/// Parse one mountinfo line.
///
/// Format: `id parent major:minor root mountpoint options [optional...] - fstype source super_options`
#[must_use]
pub fn parse_line(line: &str) -> Option<MountEntry> {
    let (left, right) = line.split_once(" - ")?;

    let mut left = left.split_whitespace();
    let root = left.nth(3)?;
    let mountpoint = left.next()?;

    let mut right = right.split_whitespace();
    let fstype = right.next()?;
    let source = right.next()?;
    let super_options = right.next().unwrap_or("");

    Some(MountEntry {
        root: PathBuf::from(unescape(root)),
        mountpoint: PathBuf::from(unescape(mountpoint)),
        fstype: fstype.to_string(),
        source: unescape(source),
        super_options: super_options.to_string(),
    })
}

/// Undo the kernel's octal escaping of space, tab, newline and backslash.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let octal = &bytes[i + 1..i + 4];
            if octal.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = octal
                    .iter()
                    .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
