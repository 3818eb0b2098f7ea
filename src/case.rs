//! Identifier case conversion: database names (snake_case) to model/field names and display titles.

/// Convert a single identifier from snake_case to camelCase.
/// e.g. "user_id" -> "userId", "created_at" -> "createdAt"
pub fn to_camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = !out.is_empty();
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert a single identifier from snake_case to PascalCase.
/// e.g. "blog_post" -> "BlogPost"
pub fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Convert a single identifier from camelCase to snake_case.
/// e.g. "userId" -> "user_id", "createdAt" -> "created_at"
pub fn to_snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Display title for a field or model name.
/// e.g. "authorId" -> "Author Id", "created_at" -> "Created At"
pub fn humanize(s: &str) -> String {
    to_snake_case(s)
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key used to compare CSV headers with field names and titles.
pub fn normalize_key(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_and_pascal() {
        assert_eq!(to_camel_case("author_id"), "authorId");
        assert_eq!(to_camel_case("_private"), "private");
        assert_eq!(to_pascal_case("blog_post"), "BlogPost");
        assert_eq!(to_snake_case("createdAt"), "created_at");
    }

    #[test]
    fn titles() {
        assert_eq!(humanize("authorId"), "Author Id");
        assert_eq!(humanize("created_at"), "Created At");
        assert_eq!(humanize("title"), "Title");
    }

    #[test]
    fn normalized_keys() {
        assert_eq!(normalize_key("Author Id"), "authorid");
        assert_eq!(normalize_key("author_id"), "authorid");
        assert_eq!(normalize_key("authorId"), "authorid");
    }
}
