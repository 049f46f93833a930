//! Intended-schema reconstruction from migration files.
//!
//! Migration files are parsed statically — matched syntactically, never
//! executed — and folded, in filename order, into a cumulative
//! table → column → type map. Filename order is chronological order for
//! timestamp-prefixed migrations, so later `Schema::table` blocks correctly
//! modify columns accumulated from earlier `Schema::create` blocks.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::naming;
use crate::php::{extract_balanced, first_string_arg};

/// table → column → simplified type label. The same shape is produced by
/// live introspection, so the two views diff directly.
pub type SchemaSnapshot = BTreeMap<String, BTreeMap<String, String>>;

const SCHEMA_METHODS: &[&str] = &["create", "table", "drop", "dropIfExists", "rename"];

fn rename_pair_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"['"]([^'"]+)['"][^'",]*['"]([^'"]+)['"]"#).unwrap()
    })
}

fn quoted_string_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap())
}

fn class_const_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\w+)::class").unwrap())
}

/// Folds migration files into the intended [`SchemaSnapshot`].
#[derive(Debug, Default)]
pub struct MigrationScanner {
    tables: SchemaSnapshot,
}

impl MigrationScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the given directories and return the cumulative snapshot.
    /// Directories that do not exist are skipped; so are files that cannot
    /// be read or parsed.
    pub fn scan(mut self, paths: &[PathBuf]) -> SchemaSnapshot {
        for file in collect_files(paths) {
            if let Ok(src) = fs::read_to_string(&file) {
                self.process_file(&crate::php::strip_comments(&src));
            }
        }
        self.tables
    }

    fn process_file(&mut self, src: &str) {
        // Only the forward path counts: folding the whole file would let a
        // standard `down()` (`Schema::dropIfExists`) cancel the `up()` it
        // ships with.
        let src = up_body(src).unwrap_or(src);
        let mut offset = 0;

        while let Some(pos) = src[offset..].find("Schema::") {
            let name_start = offset + pos + "Schema::".len();
            let name_end = name_start
                + src[name_start..]
                    .find(|c: char| !c.is_ascii_alphabetic())
                    .unwrap_or(src.len() - name_start);
            let method = &src[name_start..name_end];
            offset = name_end;

            if !SCHEMA_METHODS.contains(&method) {
                continue;
            }

            let paren = name_end + skip_spaces(&src[name_end..]);
            if !src[paren..].starts_with('(') {
                continue;
            }
            let Some(args_span) = extract_balanced(src, paren, '(', ')') else {
                continue;
            };
            offset = paren + args_span.len();
            let args = &args_span[1..args_span.len() - 1];

            match method {
                "drop" | "dropIfExists" => {
                    if let Some(table) = first_string_arg(args) {
                        self.tables.remove(&table);
                    }
                }
                "rename" => {
                    if let Some(cap) = rename_pair_pattern().captures(args) {
                        let from = cap[1].to_string();
                        let to = cap[2].to_string();
                        if let Some(columns) = self.tables.remove(&from) {
                            self.tables.insert(to, columns);
                        }
                    }
                }
                _ => {
                    let Some(table) = first_string_arg(args) else {
                        continue;
                    };
                    let Some(body) = closure_body(args) else {
                        continue;
                    };

                    if method == "create" {
                        self.tables.entry(table.clone()).or_default();
                    }
                    // `Schema::table` against a table no earlier migration
                    // created has nothing to modify.
                    if self.tables.contains_key(&table) {
                        self.parse_columns(&table, body);
                    }
                }
            }
        }
    }

    fn parse_columns(&mut self, table: &str, body: &str) {
        let mut offset = 0;

        while let Some(pos) = body[offset..].find("$table->") {
            let name_start = offset + pos + "$table->".len();
            let name_end = name_start
                + body[name_start..]
                    .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                    .unwrap_or(body.len() - name_start);
            let method = &body[name_start..name_end];
            offset = name_end;

            let paren = name_end + skip_spaces(&body[name_end..]);
            if !body[paren..].starts_with('(') {
                continue;
            }
            let Some(args_span) = extract_balanced(body, paren, '(', ')') else {
                continue;
            };
            offset = paren + args_span.len();

            self.apply_method(table, method, &args_span[1..args_span.len() - 1]);
        }
    }

    fn apply_method(&mut self, table: &str, method: &str, args: &str) {
        let Some(columns) = self.tables.get_mut(table) else {
            return;
        };
        let col = first_string_arg(args);

        match method {
            // No-argument column helpers.
            "id" => {
                columns.insert("id".into(), "bigint unsigned".into());
            }
            "timestamps" | "nullableTimestamps" | "timestampsTz" => {
                columns.insert("created_at".into(), "timestamp".into());
                columns.insert("updated_at".into(), "timestamp".into());
            }
            "softDeletes" | "softDeletesTz" => {
                columns.insert("deleted_at".into(), "timestamp".into());
            }
            "rememberToken" => {
                columns.insert("remember_token".into(), "varchar".into());
            }

            // Polymorphic reference pair.
            "morphs" | "nullableMorphs" | "ulidMorphs" | "nullableUlidMorphs" | "uuidMorphs"
            | "nullableUuidMorphs" => {
                if let Some(name) = col {
                    columns.insert(format!("{name}_id"), "bigint unsigned".into());
                    columns.insert(format!("{name}_type"), "varchar".into());
                }
            }

            // foreignIdFor(User::class) → user_id
            "foreignIdFor" => {
                if let Some(cap) = class_const_pattern().captures(args) {
                    columns.insert(
                        format!("{}_id", naming::snake(&cap[1])),
                        "bigint unsigned".into(),
                    );
                } else if let Some(class) = col {
                    let basename = class.rsplit('\\').next().unwrap_or(&class);
                    columns.insert(
                        format!("{}_id", naming::snake(basename)),
                        "bigint unsigned".into(),
                    );
                }
            }

            // Removal; also accepts the array form dropColumn(['a', 'b']).
            "dropColumn" | "removeColumn" => {
                for cap in quoted_string_pattern().captures_iter(args) {
                    columns.remove(&cap[1]);
                }
            }

            // Rename keeps the previously inferred type.
            "renameColumn" => {
                if let Some(cap) = rename_pair_pattern().captures(args) {
                    if let Some(column_type) = columns.remove(&cap[1]) {
                        columns.insert(cap[2].to_string(), column_type);
                    }
                }
            }

            // Single-column definitions.
            _ => {
                if let (Some(col), Some(column_type)) = (col, resolve_type(method)) {
                    columns.insert(col, column_type.into());
                }
            }
        }
    }
}

/// Map a Blueprint column method to a simplified type label. `None` for
/// non-column methods (index, primary, foreign, ...).
fn resolve_type(method: &str) -> Option<&'static str> {
    let label = match method {
        // Auto-increment
        "increments" => "int unsigned",
        "bigIncrements" => "bigint unsigned",
        "smallIncrements" => "smallint unsigned",
        "tinyIncrements" => "tinyint unsigned",
        "mediumIncrements" => "mediumint unsigned",
        // Integers
        "integer" => "int",
        "bigInteger" => "bigint",
        "smallInteger" => "smallint",
        "tinyInteger" => "tinyint",
        "mediumInteger" => "mediumint",
        "unsignedInteger" => "int unsigned",
        "unsignedBigInteger" => "bigint unsigned",
        "unsignedSmallInteger" => "smallint unsigned",
        "unsignedTinyInteger" => "tinyint unsigned",
        "unsignedMediumInteger" => "mediumint unsigned",
        // Foreign-id helpers
        "foreignId" => "bigint unsigned",
        "foreignUuid" => "char",
        "foreignUlid" => "char",
        // Strings / text
        "string" => "varchar",
        "char" => "char",
        "text" => "text",
        "mediumText" => "mediumtext",
        "longText" => "longtext",
        "tinyText" => "tinytext",
        // Numerics
        "float" => "float",
        "double" => "double",
        "decimal" => "decimal",
        "unsignedDecimal" => "decimal unsigned",
        // Date / time
        "date" => "date",
        "time" | "timeTz" => "time",
        "dateTime" | "dateTimeTz" => "datetime",
        "timestamp" | "timestampTz" => "timestamp",
        "year" => "year",
        // Other
        "boolean" => "tinyint",
        "binary" => "blob",
        "json" | "jsonb" => "json",
        "uuid" | "ulid" => "char",
        "ipAddress" => "varchar",
        "macAddress" => "varchar",
        "enum" => "enum",
        "set" => "set",
        "geometry" => "geometry",
        "point" => "point",
        "lineString" => "linestring",
        "polygon" => "polygon",
        "geometryCollection" => "geometrycollection",
        "multiPoint" => "multipoint",
        "multiLineString" => "multilinestring",
        "multiPolygon" => "multipolygon",
        _ => return None,
    };
    Some(label)
}

/// Files under each path, recursively, sorted by filename within a path.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut all = Vec::new();

    for path in paths {
        if !path.is_dir() {
            continue;
        }
        let mut files = Vec::new();
        collect_dir(path, &mut files);
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        all.extend(files);
    }

    all
}

fn collect_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_dir(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "php") {
            files.push(path);
        }
    }
}

fn skip_spaces(src: &str) -> usize {
    src.len() - src.trim_start().len()
}

fn up_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"function\s+up\s*\(\s*\)[^{]*\{").unwrap())
}

/// Body of the migration's `up()` method, when the file declares one.
/// Plain scripts without a migration class fall back to the whole file.
fn up_body(src: &str) -> Option<&str> {
    let found = up_pattern().find(src)?;
    let span = extract_balanced(src, found.end() - 1, '{', '}')?;
    Some(&span[1..span.len() - 1])
}

/// The `function (Blueprint $table) { ... }` body inside a Schema call's
/// argument list, braces stripped.
fn closure_body(args: &str) -> Option<&str> {
    let brace = args.find('{')?;
    let span = extract_balanced(args, brace, '{', '}')?;
    Some(&span[1..span.len() - 1])
}
