//! Deterministic collection naming.

/// Collection holding a user's personal uploads.
pub fn user_collection_name(user_id: &str) -> String {
    format!("user-{}", user_id)
}

/// Collection backing a knowledge base.
pub fn kb_collection_name(name: &str, kb_id: &str) -> String {
    format!("kb-{}-{}", slugify(name), kb_id)
}

/// Lowercase, collapse every run of non `[a-z0-9]` into `-`, trim dashes.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}
