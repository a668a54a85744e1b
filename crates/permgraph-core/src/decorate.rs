//! Permission-name decoration.
//!
//! Integration layers register permissions relative to their own namespace;
//! decoration expands those short fragments into fully qualified permission
//! strings. Given a base name (typically the registering component's name):
//!
//! - `""` → the base name itself (the root permission)
//! - `/x` → `x` (leading slash escapes decoration)
//! - `.x` → previous rewritten fragment (or the base) with `.x` appended
//! - `x` → `base.x`

/// Rewrite `fragments` relative to `base`, in order.
pub fn decorate<'a, I>(base: &str, fragments: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut result: Vec<String> = Vec::new();
    for fragment in fragments {
        let full = if fragment.is_empty() {
            base.to_string()
        } else if let Some(rest) = fragment.strip_prefix('/') {
            rest.to_string()
        } else if fragment.starts_with('.') {
            let prev = result.last().map(String::as_str).unwrap_or(base);
            format!("{prev}{fragment}")
        } else {
            format!("{base}.{fragment}")
        };
        result.push(full);
    }
    result
}

/// Rewrite a single fragment relative to `base`.
///
/// Dot-continuation resolves against the base name, since there is no
/// previous fragment.
pub fn decorate_one(base: &str, fragment: &str) -> String {
    decorate(base, [fragment])
        .pop()
        .unwrap_or_else(|| base.to_string())
}
