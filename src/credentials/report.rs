// src/credentials/report.rs

//! Identity report text, as printed by `id <user>`:
//!
//! ```text
//! uid=1000(alice) gid=1000(alice) groups=1000(alice),27(sudo),999(docker)
//! ```
//!
//! Only the `groups=` section is parsed; uid and gid come from dedicated
//! lookups.

use crate::errors::{ProcwardenError, Result};

const GROUPS_MARKER: &str = "groups=";

/// Extract the numeric group ids from the `groups=` section of a report.
///
/// Each comma-separated entry must look like `<id>(<name>)`; only the id in
/// front of the first `(` is used. A report without a `groups=` section, or
/// with an empty one, yields no groups. Duplicate ids are dropped, keeping
/// the first occurrence.
pub fn parse_group_ids(report: &str) -> Result<Vec<u32>> {
    let Some(idx) = report.find(GROUPS_MARKER) else {
        return Ok(Vec::new());
    };

    let section = report[idx + GROUPS_MARKER.len()..].trim_end();
    if section.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    for entry in section.split(',') {
        let id = parse_entry(entry)?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn parse_entry(entry: &str) -> Result<u32> {
    let malformed = || ProcwardenError::MalformedGroups {
        entry: entry.trim().to_string(),
    };

    let open = entry.find('(').ok_or_else(malformed)?;
    entry[..open].trim().parse::<u32>().map_err(|_| malformed())
}

/// Render a report in the same shape `id <user>` prints.
///
/// `groups` pairs each id with a display name.
pub fn render_identity_report(
    user: &str,
    uid: u32,
    gid: (u32, &str),
    groups: &[(u32, String)],
) -> String {
    let entries = groups
        .iter()
        .map(|(id, name)| format!("{id}({name})"))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "uid={uid}({user}) gid={}({}) {GROUPS_MARKER}{entries}",
        gid.0, gid.1
    )
}
