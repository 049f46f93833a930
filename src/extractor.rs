//! Relationship extraction.
//!
//! Two tiers, in priority order, per zero-argument public accessor:
//!
//! 1. **Static pattern match** — the accessor body is searched for one of
//!    the relationship-builder calls (`$this->hasMany(...)` etc.); the
//!    argument list is split with full nesting/quoting awareness, the
//!    target token resolved through the file's import aliases, and missing
//!    key names filled in from the framework's conventions.
//! 2. **Constant probe** — when the target argument is not a plain class
//!    token (class constants, concatenated literals), it is evaluated
//!    against the class's parsed constant table. A target that still cannot
//!    be resolved is recorded as an extraction error and the accessor is
//!    skipped; it never fails the whole model.
//!
//! A declared return type naming anything outside the relation vocabulary
//! short-circuits an accessor to "not a relationship" before its body is
//! looked at.

use regex::Regex;
use std::sync::OnceLock;

use crate::model::{Relation, RelationKind, RelationTag};
use crate::naming;
use crate::php::{self, PhpClass, PhpMethod};
use crate::scanner::ClassRegistry;

/// Short names of the relation types, longest-prefix first so the
/// return-type check never mistakes `HasOneThrough` for `HasOne`.
const RELATION_TYPE_NAMES: &[&str] = &[
    "HasOneThrough",
    "HasManyThrough",
    "HasOne",
    "HasMany",
    "BelongsToMany",
    "BelongsTo",
    "MorphOne",
    "MorphMany",
    "MorphToMany",
    "MorphedByMany",
    "MorphTo",
];

fn relation_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\$this\s*->\s*(hasOneThrough|hasManyThrough|hasOne|hasMany|belongsToMany|belongsTo|morphToMany|morphedByMany|morphTo|morphOne|morphMany)\s*\(",
        )
        .unwrap()
    })
}

/// One accessor that could not be classified; surfaced by the orchestrator
/// as a `relationship_parse_error` warning.
#[derive(Debug, Clone)]
pub struct ExtractionError {
    pub model: String,
    pub method: String,
    pub message: String,
}

enum Outcome {
    Relation(Relation),
    NotARelation,
    Failed(String),
}

/// Extracts declared relationships from parsed model classes.
pub struct RelationshipExtractor<'a> {
    registry: &'a ClassRegistry,
    errors: Vec<ExtractionError>,
}

impl<'a> RelationshipExtractor<'a> {
    pub fn new(registry: &'a ClassRegistry) -> Self {
        Self {
            registry,
            errors: Vec::new(),
        }
    }

    /// Parse all relationship accessors of the given class, in declaration
    /// order. Never fails; unclassifiable accessors are recorded on the
    /// error side-channel instead.
    pub fn extract(&mut self, class: &PhpClass) -> Vec<Relation> {
        let mut relations = Vec::new();

        for method in &class.methods {
            // Only zero-argument public accessors declared on the model
            // itself participate; magic methods never do.
            if !method.is_public
                || method.is_static
                || method.has_required_params
                || method.name.starts_with("__")
            {
                continue;
            }

            if !Self::return_type_allows_relation(method) {
                continue;
            }

            match self.classify(class, method) {
                Outcome::Relation(relation) => relations.push(relation),
                Outcome::NotARelation => {}
                Outcome::Failed(message) => self.errors.push(ExtractionError {
                    model: class.fqcn.clone(),
                    method: method.name.clone(),
                    message,
                }),
            }
        }

        relations
    }

    /// Return and clear the errors accumulated since the last call.
    pub fn take_errors(&mut self) -> Vec<ExtractionError> {
        std::mem::take(&mut self.errors)
    }

    /// Cheap pre-filter on the declared return type: anything that names a
    /// known relation type (or the `Relation` base) may be a relationship;
    /// any other non-empty type rules the accessor out immediately.
    fn return_type_allows_relation(method: &PhpMethod) -> bool {
        let Some(return_type) = &method.return_type else {
            return true;
        };
        let trimmed = return_type.trim_start_matches('?').trim_start_matches('\\');
        if trimmed.is_empty() {
            return true;
        }

        let lower = trimmed.to_lowercase();
        if RELATION_TYPE_NAMES
            .iter()
            .any(|t| lower.contains(&t.to_lowercase()))
        {
            return true;
        }
        lower.contains("relation")
    }

    fn classify(&self, class: &PhpClass, method: &PhpMethod) -> Outcome {
        let Some(call) = relation_call_pattern().captures(&method.body) else {
            // No relationship-builder call in the body: not a relationship.
            // This is a silent skip even when the return type was
            // inconclusive.
            return Outcome::NotARelation;
        };

        let builder = call.get(1).unwrap().as_str();
        let paren = call.get(0).unwrap().end() - 1;
        let Some(args_span) = php::extract_balanced(&method.body, paren, '(', ')') else {
            return Outcome::Failed(format!("unbalanced argument list in {builder}() call"));
        };
        let args = php::split_args(&args_span[1..args_span.len() - 1]);

        let tag = match builder {
            "hasOne" => RelationTag::HasOne,
            "hasMany" => RelationTag::HasMany,
            "belongsTo" => RelationTag::BelongsTo,
            "belongsToMany" => RelationTag::BelongsToMany,
            "morphOne" => RelationTag::MorphOne,
            "morphMany" => RelationTag::MorphMany,
            "morphTo" => RelationTag::MorphTo,
            "morphToMany" => RelationTag::MorphToMany,
            "morphedByMany" => RelationTag::MorphedByMany,
            "hasOneThrough" => RelationTag::HasOneThrough,
            "hasManyThrough" => RelationTag::HasManyThrough,
            _ => unreachable!("pattern only matches known builders"),
        };

        // morphTo is the one kind with no compile-time target.
        if tag == RelationTag::MorphTo {
            let morph_name = key_arg(&args, 0).unwrap_or_else(|| method.name.clone());
            return Outcome::Relation(Relation {
                name: method.name.clone(),
                kind: RelationKind::MorphTo { morph_name },
                related: None,
                table: None,
                line: Some(method.line),
            });
        }

        let Some(target_token) = args.first() else {
            return Outcome::Failed(format!("{builder}() call without a target class"));
        };
        let related = match self.resolve_target(class, target_token) {
            Some(fqcn) => fqcn,
            None => {
                return Outcome::Failed(format!(
                    "cannot resolve relationship target `{target_token}`"
                ));
            }
        };
        let related_basename = naming::class_basename(&related).to_string();

        let kind = match tag {
            RelationTag::HasOne | RelationTag::HasMany => {
                let foreign_key =
                    key_arg(&args, 1).unwrap_or_else(|| naming::foreign_key(&class.name));
                let local_key = key_arg(&args, 2).unwrap_or_else(|| "id".to_string());
                if tag == RelationTag::HasOne {
                    RelationKind::HasOne {
                        foreign_key,
                        local_key,
                    }
                } else {
                    RelationKind::HasMany {
                        foreign_key,
                        local_key,
                    }
                }
            }
            RelationTag::BelongsTo => RelationKind::BelongsTo {
                foreign_key: key_arg(&args, 1)
                    .unwrap_or_else(|| naming::foreign_key(&related_basename)),
                owner_key: key_arg(&args, 2).unwrap_or_else(|| "id".to_string()),
            },
            RelationTag::BelongsToMany => RelationKind::BelongsToMany {
                pivot_table: key_arg(&args, 1)
                    .unwrap_or_else(|| naming::pivot_table(&class.name, &related_basename)),
                foreign_pivot_key: key_arg(&args, 2)
                    .unwrap_or_else(|| naming::foreign_key(&class.name)),
                related_pivot_key: key_arg(&args, 3)
                    .unwrap_or_else(|| naming::foreign_key(&related_basename)),
            },
            RelationTag::MorphOne | RelationTag::MorphMany => {
                let morph_name = key_arg(&args, 1).unwrap_or_else(|| method.name.clone());
                let foreign_key = format!("{morph_name}_id");
                if tag == RelationTag::MorphOne {
                    RelationKind::MorphOne {
                        morph_name,
                        foreign_key,
                    }
                } else {
                    RelationKind::MorphMany {
                        morph_name,
                        foreign_key,
                    }
                }
            }
            RelationTag::MorphToMany | RelationTag::MorphedByMany => {
                let morph_name = key_arg(&args, 1).unwrap_or_else(|| method.name.clone());
                let pivot_table =
                    key_arg(&args, 2).unwrap_or_else(|| naming::plural(&morph_name));
                let foreign_pivot_key = format!("{morph_name}_id");
                if tag == RelationTag::MorphToMany {
                    RelationKind::MorphToMany {
                        morph_name,
                        pivot_table,
                        foreign_pivot_key,
                    }
                } else {
                    RelationKind::MorphedByMany {
                        morph_name,
                        pivot_table,
                        foreign_pivot_key,
                    }
                }
            }
            RelationTag::HasOneThrough | RelationTag::HasManyThrough => {
                let through = args
                    .get(1)
                    .and_then(|token| self.resolve_target(class, token));
                if tag == RelationTag::HasOneThrough {
                    RelationKind::HasOneThrough { through }
                } else {
                    RelationKind::HasManyThrough { through }
                }
            }
            RelationTag::MorphTo => unreachable!("handled above"),
        };

        Outcome::Relation(Relation {
            name: method.name.clone(),
            kind,
            table: self.registry.table_of(&related),
            related: Some(related),
            line: Some(method.line),
        })
    }

    /// Resolve a target-class token to a fully-qualified name.
    ///
    /// Tier 1 handles `Foo::class`, `self::class`/`static::class`, quoted
    /// strings, and (partially) qualified names. Tier 2 — the probe —
    /// evaluates class constants and literal concatenations against the
    /// parsed class, without running anything.
    fn resolve_target(&self, class: &PhpClass, token: &str) -> Option<String> {
        let token = token.trim();

        if let Some(path) = token.strip_suffix("::class") {
            let path = path.trim();
            if path == "self" || path == "static" {
                return Some(class.fqcn.clone());
            }
            if is_class_path(path) {
                return Some(class.resolve(path));
            }
            return None;
        }

        if let Some(literal) = php::string_literal(token) {
            return Some(literal.trim_start_matches('\\').to_string());
        }

        if is_class_path(token) {
            return Some(class.resolve(token));
        }

        self.probe_expression(class, token)
    }

    /// Tier-2 probe: `self::CONST`, `static::CONST`, and `.`-concatenations
    /// of resolvable pieces.
    fn probe_expression(&self, class: &PhpClass, token: &str) -> Option<String> {
        let token = token.trim();

        if let Some(constant) = token
            .strip_prefix("self::")
            .or_else(|| token.strip_prefix("static::"))
        {
            let value = class.constants.get(constant.trim())?;
            return self.resolve_target(class, value);
        }

        let pieces = php::split_top_level(token, b'.');
        if pieces.len() > 1 {
            let mut joined = String::new();
            for piece in pieces {
                let resolved = php::string_literal(piece)
                    .or_else(|| self.probe_expression(class, piece))?;
                joined.push_str(&resolved);
            }
            return Some(joined.trim_start_matches('\\').to_string());
        }

        None
    }
}

/// A positional string argument; values containing a namespace separator
/// are type references picked up by over-eager splitting, not key or table
/// names, and are discarded.
fn key_arg(args: &[&str], index: usize) -> Option<String> {
    let value = php::string_literal(args.get(index)?)?;
    if value.contains('\\') {
        return None;
    }
    Some(value)
}

fn is_class_path(token: &str) -> bool {
    !token.is_empty()
        && token
            .trim_start_matches('\\')
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::php::parse_class;
    use std::path::Path;

    fn registry_with(sources: &[(&str, &str)]) -> ClassRegistry {
        let mut registry = ClassRegistry::default();
        for (name, src) in sources {
            let class = parse_class(Path::new(name), src).unwrap();
            registry.insert(class);
        }
        registry
    }

    const USER: &str = r#"<?php
namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class User extends Model
{
    public function posts()
    {
        return $this->hasMany(Post::class);
    }

    public function profile(): HasOne
    {
        return $this->hasOne(Profile::class, 'owner_id');
    }

    public function roles()
    {
        return $this->belongsToMany(Role::class);
    }

    public function comments()
    {
        return $this->morphMany(Comment::class, 'commentable');
    }

    public function fullName(): string
    {
        return $this->first_name . ' ' . $this->last_name;
    }

    public function latestPost()
    {
        return $this->posts()->latest()->first();
    }
}
"#;

    const POST: &str = r#"<?php
namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class Post extends Model
{
    public function user()
    {
        return $this->belongsTo(User::class);
    }
}
"#;

    const PROFILE: &str = r#"<?php
namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class Profile extends Model
{
    protected $table = 'profiles';
}
"#;

    const ROLE: &str = r#"<?php
namespace App\Models;

use Illuminate\Database\Eloquent\Model;

class Role extends Model
{
}
"#;

    fn user_relations() -> Vec<Relation> {
        let registry = registry_with(&[
            ("User.php", USER),
            ("Post.php", POST),
            ("Profile.php", PROFILE),
            ("Role.php", ROLE),
        ]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("User.php"), USER).unwrap();
        let relations = extractor.extract(&class);
        assert!(extractor.take_errors().is_empty());
        relations
    }

    #[test]
    fn test_extracts_all_declared_relationships() {
        let relations = user_relations();
        let names: Vec<&str> = relations.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["posts", "profile", "roles", "comments"]);
    }

    #[test]
    fn test_has_many_with_convention_defaults() {
        let relations = user_relations();
        let posts = &relations[0];
        assert_eq!(
            posts.kind,
            RelationKind::HasMany {
                foreign_key: "user_id".into(),
                local_key: "id".into(),
            }
        );
        assert_eq!(posts.related.as_deref(), Some("App\\Models\\Post"));
        assert_eq!(posts.table.as_deref(), Some("posts"));
    }

    #[test]
    fn test_explicit_foreign_key_wins() {
        let relations = user_relations();
        assert_eq!(
            relations[1].kind.foreign_key(),
            Some("owner_id"),
            "explicit key argument must override the convention"
        );
        assert_eq!(relations[1].table.as_deref(), Some("profiles"));
    }

    #[test]
    fn test_belongs_to_many_defaults() {
        let relations = user_relations();
        assert_eq!(
            relations[2].kind,
            RelationKind::BelongsToMany {
                pivot_table: "role_user".into(),
                foreign_pivot_key: "user_id".into(),
                related_pivot_key: "role_id".into(),
            }
        );
    }

    #[test]
    fn test_morph_many_key_from_morph_name() {
        let relations = user_relations();
        assert_eq!(relations[3].kind.foreign_key(), Some("commentable_id"));
    }

    #[test]
    fn test_return_type_short_circuit_and_plain_methods() {
        // fullName(): string is ruled out by its return type; latestPost()
        // has no builder call and is silently skipped.
        let relations = user_relations();
        assert!(!relations.iter().any(|r| r.name == "fullName"));
        assert!(!relations.iter().any(|r| r.name == "latestPost"));
    }

    #[test]
    fn test_morph_to_has_no_target() {
        let src = r#"<?php
namespace App\Models;
use Illuminate\Database\Eloquent\Model;
class Comment extends Model
{
    public function commentable()
    {
        return $this->morphTo();
    }
}
"#;
        let registry = registry_with(&[("Comment.php", src)]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("Comment.php"), src).unwrap();
        let relations = extractor.extract(&class);

        assert_eq!(relations.len(), 1);
        assert_eq!(
            relations[0].kind,
            RelationKind::MorphTo {
                morph_name: "commentable".into()
            }
        );
        assert_eq!(relations[0].related, None);
        assert_eq!(relations[0].table, None);
    }

    #[test]
    fn test_string_target_and_self_reference() {
        let src = r#"<?php
namespace App\Models;
use Illuminate\Database\Eloquent\Model;
class Category extends Model
{
    public function parent()
    {
        return $this->belongsTo(self::class, 'parent_id');
    }

    public function children()
    {
        return $this->hasMany('App\Models\Category', 'parent_id');
    }
}
"#;
        let registry = registry_with(&[("Category.php", src)]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("Category.php"), src).unwrap();
        let relations = extractor.extract(&class);

        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].related.as_deref(), Some("App\\Models\\Category"));
        assert_eq!(relations[1].related.as_deref(), Some("App\\Models\\Category"));
        assert_eq!(relations[1].table.as_deref(), Some("categories"));
    }

    #[test]
    fn test_probe_resolves_class_constant() {
        let src = r#"<?php
namespace App\Models;
use Illuminate\Database\Eloquent\Model;
class Order extends Model
{
    const ITEM_MODEL = OrderItem::class;

    public function items()
    {
        return $this->hasMany(self::ITEM_MODEL);
    }
}
"#;
        let registry = registry_with(&[("Order.php", src)]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("Order.php"), src).unwrap();
        let relations = extractor.extract(&class);

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].related.as_deref(), Some("App\\Models\\OrderItem"));
        assert!(extractor.take_errors().is_empty());
    }

    #[test]
    fn test_unresolvable_target_records_error() {
        let src = r#"<?php
namespace App\Models;
use Illuminate\Database\Eloquent\Model;
class Widget extends Model
{
    public function pieces()
    {
        return $this->hasMany($this->resolvePieceModel());
    }
}
"#;
        let registry = registry_with(&[("Widget.php", src)]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("Widget.php"), src).unwrap();
        let relations = extractor.extract(&class);

        assert!(relations.is_empty());
        let errors = extractor.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].method, "pieces");
    }

    #[test]
    fn test_type_reference_in_key_position_is_discarded() {
        // A stray FQCN string where a key belongs is a parse artifact, not
        // a column name; the convention default must be used instead.
        let src = r#"<?php
namespace App\Models;
use Illuminate\Database\Eloquent\Model;
class Invoice extends Model
{
    public function lines()
    {
        return $this->hasMany(InvoiceLine::class, 'App\Models\InvoiceLine');
    }
}
"#;
        let registry = registry_with(&[("Invoice.php", src)]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("Invoice.php"), src).unwrap();
        let relations = extractor.extract(&class);

        assert_eq!(relations[0].kind.foreign_key(), Some("invoice_id"));
    }

    #[test]
    fn test_unscanned_target_leaves_table_none() {
        let src = r#"<?php
namespace App\Models;
use Illuminate\Database\Eloquent\Model;
use Vendor\Billing\Subscription;
class Account extends Model
{
    public function subscriptions()
    {
        return $this->hasMany(Subscription::class);
    }
}
"#;
        let registry = registry_with(&[("Account.php", src)]);
        let mut extractor = RelationshipExtractor::new(&registry);
        let class = parse_class(Path::new("Account.php"), src).unwrap();
        let relations = extractor.extract(&class);

        assert_eq!(
            relations[0].related.as_deref(),
            Some("Vendor\\Billing\\Subscription")
        );
        assert_eq!(relations[0].table, None);
    }
}
