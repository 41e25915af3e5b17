/// Shortens a demangled Rust symbol for display, e.g.
/// `std::collections::hash::map::HashMap<K,V>::insert::h0123456789abcdef` becomes
/// `HashMap::insert`.
///
/// The symbol hash and generic arguments are removed and only the last two path segments are
/// kept.
pub fn shorten_function_name(name: &str) -> String {
    let name = strip_hash(name);
    let segments = split_path(name)
        .into_iter()
        .map(strip_generics)
        .collect::<Vec<_>>();
    let keep = segments.len().saturating_sub(2);
    segments[keep..].join("::")
}

fn strip_hash(name: &str) -> &str {
    match name.rsplit_once("::") {
        Some((prefix, hash))
            if hash.len() == 17
                && hash.starts_with('h')
                && hash[1..].chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            prefix
        }
        _ => name,
    }
}

/// Splits at `::` separators that are not nested in angle brackets.
fn split_path(name: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                segments.push(&name[start..i]);
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&name[start..]);
    segments
}

/// Removes generic arguments that follow an identifier, keeping qualified paths like
/// `<T as Trait>`.
fn strip_generics(segment: &str) -> String {
    let mut result = String::with_capacity(segment.len());
    let mut skipping = 0_usize;
    let mut previous = None;
    for c in segment.chars() {
        match c {
            '<' if skipping > 0 => skipping += 1,
            '<' if previous.is_some_and(|p: char| p.is_alphanumeric() || p == '_') => {
                skipping = 1;
            }
            '>' if skipping > 0 => skipping -= 1,
            _ if skipping > 0 => {}
            c => {
                result.push(c);
                previous = Some(c);
            }
        }
    }
    result
}
