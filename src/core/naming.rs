//! Name derivation helpers.

/// Derives an entity name from a Rust type name.
///
/// Module qualifiers and generic arguments are stripped; an unqualified
/// name is returned unchanged.
///
/// # Examples
///
/// ```
/// use recordkit::core::naming::entity_name_from_type;
///
/// assert_eq!(entity_name_from_type("app::model::Person"), "Person");
/// assert_eq!(entity_name_from_type("Person"), "Person");
/// ```
#[must_use]
pub fn entity_name_from_type(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

/// Converts `snake_case` to `lowerCamelCase`.
#[must_use]
pub fn lower_camel_case(s: &str) -> String {
    let upper = upper_camel_case(s);
    let mut chars = upper.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

/// Converts `snake_case` to `UpperCamelCase`.
#[must_use]
pub fn upper_camel_case(s: &str) -> String {
    s.split('_')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}
