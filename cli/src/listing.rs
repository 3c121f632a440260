//! Directory listings, as sent by the server for `ls` and built locally for `l_ls`.
//!
//! Records are `TYPE:SIZE:NAME`, one per line.

#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use anyhow::{bail, Context, Result};

use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryType {
    // ordered as the type strings sort
    Dir,
    File,
}

impl EntryType {
    fn tag(self) -> &'static str {
        match self {
            EntryType::Dir => "[D]",
            EntryType::File => "[F]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryType,
    pub size: u64,
    pub name: String,
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:>4} {}", self.kind.tag(), human_size(self.size), self.name)
    }
}

/// Parses listing records, stopping at the first empty line.
///
/// Entries are returned sorted by type, then largest first.
pub fn parse_listing(s: &str) -> Result<Vec<DirEntry>> {
    let mut entries = vec![];
    for line in s.split('\n') {
        if line.is_empty() {
            break;
        }
        // names may contain ':'
        let mut parts = line.splitn(3, ':');
        let (Some(tag), Some(size), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            bail!("Malformed listing record \"{line}\"");
        };
        let kind = match tag {
            "[D]" => EntryType::Dir,
            "[F]" => EntryType::File,
            _ => bail!("Unknown entry type \"{tag}\""),
        };
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            bail!("File size is not a number: \"{size}\"");
        }
        let size = size.parse::<u64>().with_context(|| format!("File size {size} too large"))?;
        entries.push(DirEntry { kind, size, name: name.into() });
    }
    entries.sort_by(|a, b| a.kind.cmp(&b.kind).then(b.size.cmp(&a.size)));
    Ok(entries)
}

/// One entry per line, as printed to the user
pub fn format_listing(entries: &[DirEntry]) -> String {
    entries.iter().map(|e| format!("{e}\n")).collect()
}

/// Size in binary units, rounded to a whole number, eg `3KiB`
pub fn human_size(size: u64) -> String {
    let mut s = size as f64;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if s < 1024.0 {
            return format!("{s:.0}{unit}B");
        }
        s /= 1024.0;
    }
    format!("{s:.0}YiB")
}

/// Lists a local directory in the server's record format.
///
/// Only regular files and directories are included.
pub fn local_listing(dir: &Path) -> Result<String> {
    let mut out = String::new();
    let rd = std::fs::read_dir(dir).with_context(|| format!("Can't list {}", dir.display()))?;
    for e in rd {
        let e = e?;
        let meta = e.metadata()?;
        let tag = if meta.is_file() {
            EntryType::File
        } else if meta.is_dir() {
            EntryType::Dir
        } else {
            trace!("skipping {:?}", e.path());
            continue;
        };
        out.push_str(&format!(
            "{}:{}:{}\n",
            tag.tag(),
            meta.len(),
            e.file_name().to_string_lossy()
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::listing::*;

    #[test]
    fn sizes() {
        assert_eq!(human_size(0), "0B");
        assert_eq!(human_size(1023), "1023B");
        assert_eq!(human_size(1024), "1KiB");
        assert_eq!(human_size(4096), "4KiB");
        assert_eq!(human_size(3 * 1024 * 1024), "3MiB");
        assert_eq!(human_size(5 << 30), "5GiB");
        assert_eq!(human_size(u64::MAX), "16EiB");
    }

    #[test]
    fn sorted() {
        let l = "[F]:10:small\n[D]:4096:sub\n[F]:2048:big\n[D]:8192:other\n";
        let e = parse_listing(l).unwrap();
        let names: Vec<_> = e.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["other", "sub", "big", "small"]);
        assert_eq!(e[2].to_string(), "[F] 2KiB big");
        assert_eq!(e[3].to_string(), "[F]  10B small");
        assert_eq!(format_listing(&e).lines().count(), 4);
    }

    #[test]
    fn stops_at_blank() {
        let e = parse_listing("[F]:1:a\n\n[F]:2:b\n").unwrap();
        assert_eq!(e.len(), 1);
        assert!(parse_listing("").unwrap().is_empty());
    }

    #[test]
    fn colon_in_name() {
        let e = parse_listing("[F]:5:a:b").unwrap();
        assert_eq!(e[0].name, "a:b");
    }

    #[test]
    fn bad_records() {
        assert!(parse_listing("[F]:x1:a\n").is_err());
        assert!(parse_listing("[F]:-1:a\n").is_err());
        assert!(parse_listing("[F]:12\n").is_err());
        assert!(parse_listing("[X]:12:a\n").is_err());
    }

    #[test]
    fn local() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), [0u8; 1500]).unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();

        let l = local_listing(dir.path()).unwrap();
        let e = parse_listing(&l).unwrap();
        assert_eq!(e.len(), 2);
        assert_eq!(e[0].kind, EntryType::Dir);
        assert_eq!(e[0].name, "d");
        assert_eq!(e[1], DirEntry { kind: EntryType::File, size: 1500, name: "f.txt".into() });

        assert!(local_listing(&dir.path().join("missing")).is_err());
    }
}
