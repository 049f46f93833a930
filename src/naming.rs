//! Eloquent naming conventions.
//!
//! Table names, foreign keys, and pivot tables all follow conventions the
//! framework applies at runtime; this module reproduces them so relationship
//! metadata can be completed without ever loading the audited code.

use convert_case::{Case, Casing};

/// Return the class basename of a fully-qualified PHP name
/// (`App\Models\User` → `User`).
pub fn class_basename(class: &str) -> &str {
    class.rsplit('\\').next().unwrap_or(class)
}

/// snake_case a StudlyCaps class name (`BlogPost` → `blog_post`).
pub fn snake(name: &str) -> String {
    name.to_case(Case::Snake)
}

/// Pluralize an English word the way conventional table names expect.
///
/// This covers the regular forms (`post` → `posts`, `category` →
/// `categories`, `status` → `statuses`). Models with irregular plurals
/// declare `$table` explicitly, so a full inflector is not needed here.
pub fn plural(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        let penultimate = stem.chars().last();
        if !matches!(penultimate, None | Some('a' | 'e' | 'i' | 'o' | 'u')) {
            return format!("{stem}ies");
        }
    }

    for suffix in ["s", "x", "z", "ch", "sh"] {
        if word.ends_with(suffix) {
            return format!("{word}es");
        }
    }

    format!("{word}s")
}

/// Default table name for a model basename (`BlogPost` → `blog_posts`).
pub fn default_table(basename: &str) -> String {
    snake(&plural(basename))
}

/// Default foreign-key column referencing a model (`User` → `user_id`).
pub fn foreign_key(basename: &str) -> String {
    format!("{}_id", snake(basename))
}

/// Default pivot table for a many-to-many pair: the two singular snake
/// names joined in alphabetical order (`User`/`Role` → `role_user`).
pub fn pivot_table(a: &str, b: &str) -> String {
    let mut names = [snake(a), snake(b)];
    names.sort();
    format!("{}_{}", names[0], names[1])
}

/// Lowercase the first character (`User` → `user`), used when suggesting
/// accessor method names.
pub fn lcfirst(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
