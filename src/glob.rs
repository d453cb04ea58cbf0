//! Glob matcher (component E). Supports `*`, `?`, character classes `[…]`,
//! and `**` (segment-spanning). Expands the donor's `wildcard_match`
//! (`*`/`?` only) with class and double-star support.

use crate::error::EngineError;
use crate::sftp_client::SftpClient;

fn has_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '['])
}

/// Whether `pattern` contains any glob metacharacter, anywhere in the path.
/// Used by dispatch code to decide between a plain path op and a glob
/// expansion.
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn find_class_end(p: &[char]) -> Option<usize> {
    let mut i = 1;
    if i < p.len() && (p[i] == '!' || p[i] == '^') {
        i += 1;
    }
    if i < p.len() && p[i] == ']' {
        i += 1;
    }
    while i < p.len() && p[i] != ']' {
        i += 1;
    }
    if i < p.len() { Some(i) } else { None }
}

fn class_matches(class: &[char], c: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if c >= class[i] && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

/// Match a single path segment (no `/`) against a pattern segment containing
/// `*`, `?`, and/or `[…]` character classes.
fn match_segment(pattern: &[char], text: &[char]) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }
    match pattern[0] {
        '*' => {
            if match_segment(&pattern[1..], text) {
                return true;
            }
            !text.is_empty() && match_segment(pattern, &text[1..])
        }
        '?' => !text.is_empty() && match_segment(&pattern[1..], &text[1..]),
        '[' => {
            if text.is_empty() {
                return false;
            }
            match find_class_end(pattern) {
                Some(close) => {
                    let body = &pattern[1..close];
                    let (negate, body) =
                        if !body.is_empty() && (body[0] == '!' || body[0] == '^') {
                            (true, &body[1..])
                        } else {
                            (false, body)
                        };
                    let hit = class_matches(body, text[0]);
                    if hit != negate { match_segment(&pattern[close + 1..], &text[1..]) } else { false }
                }
                None => text[0] == '[' && match_segment(&pattern[1..], &text[1..]),
            }
        }
        c => !text.is_empty() && text[0] == c && match_segment(&pattern[1..], &text[1..]),
    }
}

fn segment_match(pattern: &str, text: &str) -> bool {
    match_segment(&pattern.chars().collect::<Vec<_>>(), &text.chars().collect::<Vec<_>>())
}

/// Match a full `/`-joined path against a full `/`-joined pattern, with `**`
/// matching zero or more entire segments.
pub fn match_path(pattern: &str, path: &str) -> bool {
    let pat_segs: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match_segments(&pat_segs, &path_segs)
}

fn match_segments(pat: &[&str], text: &[&str]) -> bool {
    if pat.is_empty() {
        return text.is_empty();
    }
    if pat[0] == "**" {
        if match_segments(&pat[1..], text) {
            return true;
        }
        return !text.is_empty() && match_segments(pat, &text[1..]);
    }
    if text.is_empty() {
        return false;
    }
    segment_match(pat[0], text[0]) && match_segments(&pat[1..], &text[1..])
}

fn split_base_and_meta(resolved_pattern: &str) -> (String, usize) {
    let segs: Vec<&str> = resolved_pattern.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    match segs.iter().position(|s| has_meta(s)) {
        Some(idx) => (format!("/{}", segs[..idx].join("/")), segs.len() - idx),
        None => (resolved_pattern.trim_end_matches('/').to_string(), 0),
    }
}

fn walk_remote(
    sftp: &dyn SftpClient,
    dir: &str,
    remaining_depth: Option<usize>,
    out: &mut Vec<String>,
) {
    // Unreadable subdirectories are swallowed (§4.E) — they cannot match.
    let entries = match sftp.read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries {
        let full = format!("{}/{}", dir.trim_end_matches('/'), entry.name);
        out.push(full.clone());
        if entry.metadata.is_dir {
            match remaining_depth {
                None => walk_remote(sftp, &full, None, out),
                Some(n) if n > 0 => walk_remote(sftp, &full, Some(n - 1), out),
                Some(_) => {}
            }
        }
    }
}

/// Remote glob expansion (§4.E). `pattern` is resolved against `cwd` first
/// if relative. Returns absolute remote paths of every match.
pub fn remote_glob(
    sftp: &dyn SftpClient,
    cwd: &str,
    pattern: &str,
) -> Result<Vec<String>, EngineError> {
    if pattern.is_empty() {
        return Err(EngineError::Pattern { pattern: pattern.to_string(), detail: "empty pattern".into() });
    }
    let resolved =
        if pattern.starts_with('/') { pattern.to_string() } else { format!("{}/{}", cwd.trim_end_matches('/'), pattern) };
    let (base, remaining_segments) = split_base_and_meta(&resolved);
    let recursive = pattern.contains("**");
    let depth = if recursive { None } else { Some(remaining_segments.saturating_sub(1)) };

    let mut collected = Vec::new();
    walk_remote(sftp, &base, depth, &mut collected);
    Ok(collected.into_iter().filter(|p| match_path(&resolved, p)).collect())
}

/// Local glob expansion (§4.E). `pattern` is resolved against `cwd`/`home`
/// via the same namespace rules as plain paths, then matched against every
/// entry found under the literal base directory.
pub fn local_glob(
    pattern: &str,
    cwd: &std::path::Path,
    home: &std::path::Path,
) -> Result<Vec<std::path::PathBuf>, EngineError> {
    if pattern.is_empty() {
        return Err(EngineError::Pattern { pattern: pattern.to_string(), detail: "empty pattern".into() });
    }
    let resolved = crate::path::resolve_local(pattern, cwd, home);
    let resolved_str = resolved.to_string_lossy().replace('\\', "/");
    let (base, remaining_segments) = split_base_and_meta(&resolved_str);
    let recursive = pattern.contains("**");
    let base_path = std::path::PathBuf::from(&base);
    if !base_path.exists() {
        return Ok(Vec::new());
    }

    let mut walker = walkdir::WalkDir::new(&base_path).min_depth(1);
    if !recursive {
        walker = walker.max_depth(remaining_segments.max(1));
    }

    let mut matches = Vec::new();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
        let path_str = entry.path().to_string_lossy().replace('\\', "/");
        if match_path(&resolved_str, &path_str) {
            matches.push(entry.into_path());
        }
    }
    Ok(matches)
}
