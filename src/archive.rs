//! Naming conventions of route collector archives.
//!
//! Dumps are published as `<kind>.<YYYYMMDD>.<HHMM>.<compression>`, e.g.
//! `rib.20180901.0000.bz2` or `updates.20180901.0015.bz2`, with the dump time in UTC.
use crate::extractor::DumpKind;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static DUMP_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(rib|bview|updates)\.(\d{8})\.(\d{4})(\.|$)").expect("valid regex")
});

/// The last path component of `name`.
pub(crate) fn file_base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Dump kind and dump time encoded in an archive file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpFileName {
    pub kind: DumpKind,
    pub time: DateTime<Utc>,
}

/// Parses an archive file name; directories in front of it are ignored.
pub fn parse_dump_file_name(name: &str) -> Option<DumpFileName> {
    let caps = DUMP_FILE_NAME.captures(file_base_name(name))?;
    let kind = match &caps[1] {
        "updates" => DumpKind::Updates,
        _ => DumpKind::Rib,
    };
    let stamp = format!("{}{}", &caps[2], &caps[3]);
    let time = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M")
        .ok()?
        .and_utc();
    Some(DumpFileName { kind, time })
}
