use std::collections::BTreeMap;

/// Maximum identifier length accepted by Postgres, in bytes.
const MAX_IDENTIFIER_BYTES: usize = 63;

/// Curated mappings for Source field names whose sanitized form is not the column we want.
const BUILTIN_FIELD_OVERRIDES: &[(&str, &str)] = &[
    ("Name (Korean)", "name_korean"),
    ("Name (English)", "name_english"),
    ("Name (Chinese)", "name_chinese"),
    ("DOB", "date_of_birth"),
    ("Date of Birth", "date_of_birth"),
    ("E-mail", "email"),
    ("Phone Number", "phone"),
    ("Mobile", "phone"),
    ("Bio", "biography"),
    ("Artist Statement", "statement"),
    ("Website URL", "website"),
    ("Instagram", "instagram_handle"),
];

/// Translates Source field names to Target column names.
///
/// An explicit override wins, otherwise the name is sanitized with [`sanitize_field_name`].
#[derive(Debug, Clone)]
pub struct FieldMapper {
    overrides: BTreeMap<String, String>,
}

impl FieldMapper {
    /// Creates a mapper from the built-in overrides merged with `overrides`.
    ///
    /// Entries in `overrides` replace built-in entries for the same field name.
    pub fn new(overrides: &BTreeMap<String, String>) -> Self {
        let mut merged: BTreeMap<String, String> = BUILTIN_FIELD_OVERRIDES
            .iter()
            .map(|(field, column)| (field.to_string(), column.to_string()))
            .collect();
        merged.extend(
            overrides
                .iter()
                .map(|(field, column)| (field.clone(), column.clone())),
        );

        Self { overrides: merged }
    }

    /// Returns the Target column name for `source_field_name`.
    pub fn map_field_name(&self, source_field_name: &str) -> String {
        match self.overrides.get(source_field_name) {
            Some(column) => column.clone(),
            None => sanitize_field_name(source_field_name),
        }
    }
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

/// Turns an arbitrary field name into a Postgres identifier.
///
/// The result is lowercase, consists of `[a-z0-9_]` only, has no repeated, leading or trailing
/// underscores and fits in 63 bytes. Names with nothing left after sanitizing are encoded as
/// `field_<hex of the utf-8 bytes>`. Sanitizing is idempotent.
pub fn sanitize_field_name(name: &str) -> String {
    let sanitized = collapse(&name.to_lowercase());
    if !sanitized.is_empty() {
        return sanitized;
    }

    let mut encoded = String::from("field_");
    for byte in name.as_bytes() {
        encoded.push_str(&format!("{byte:02x}"));
    }

    collapse(&encoded)
}

/// Replaces runs of characters outside `[a-z0-9_]` with a single underscore, trims underscores
/// and truncates to the identifier limit.
fn collapse(name: &str) -> String {
    let mut collapsed = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '_'
        };

        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }

    // Only ASCII is left, so byte truncation is safe.
    let trimmed = collapsed.trim_matches('_');
    let truncated = &trimmed[..trimmed.len().min(MAX_IDENTIFIER_BYTES)];

    truncated.trim_end_matches('_').to_string()
}
