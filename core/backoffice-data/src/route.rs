//! Admin API route naming.

/// Converts an entity or association name to its URL segment:
/// `flow_sequence` and `flowSequence` both become `flow-sequence`.
pub fn segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        match c {
            '_' => out.push('-'),
            c if c.is_ascii_uppercase() => {
                if i > 0 && !out.ends_with('-') {
                    out.push('-');
                }
                out.push(c.to_ascii_lowercase());
            }
            c => out.push(c),
        }
    }
    out
}

/// Base route of an entity, e.g. `/product-manufacturer`.
pub fn entity_route(entity_name: &str) -> String {
    format!("/{}", segment(entity_name))
}
