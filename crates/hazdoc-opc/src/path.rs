//! Part-name arithmetic for relationship targets.

/// The `.rels` part that describes `part` (`word/document.xml` -> `word/_rels/document.xml.rels`).
pub fn rels_part_name(part: &str) -> String {
    let part = part.trim_start_matches('/');
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship `target` relative to the part that owns the relationship.
///
/// Absolute targets (`/xl/worksheets/sheet1.xml`) are taken from the package root; `..` and `.`
/// segments are folded; URI fragments are dropped.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or(target);
    if target.is_empty() {
        return normalize(source_part);
    }
    if let Some(target) = target.strip_prefix('/') {
        return normalize(target);
    }

    let base_dir = source_part
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    normalize(&format!("{base_dir}/{target}"))
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}
