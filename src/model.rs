//! Model and relationship records produced by the extraction phase.
//!
//! Relationship kinds are a closed enum, with each variant carrying only the
//! fields that are meaningful for it — a `hasMany` has a foreign and a local
//! key, a `belongsToMany` has pivot keys and a pivot table, a `morphTo` has
//! nothing. Detector logic pattern-matches the variants instead of comparing
//! type-name strings.

use serde_json::{Value, json};

use crate::naming;

/// Discriminant-only view of [`RelationKind`], used wherever kinds are
/// compared without caring about key names (inverse maps, graph edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationTag {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
    MorphOne,
    MorphMany,
    MorphTo,
    MorphToMany,
    MorphedByMany,
    HasOneThrough,
    HasManyThrough,
}

impl RelationTag {
    /// The Eloquent builder method declaring this kind (`hasMany`, ...).
    pub fn method_name(self) -> &'static str {
        match self {
            Self::HasOne => "hasOne",
            Self::HasMany => "hasMany",
            Self::BelongsTo => "belongsTo",
            Self::BelongsToMany => "belongsToMany",
            Self::MorphOne => "morphOne",
            Self::MorphMany => "morphMany",
            Self::MorphTo => "morphTo",
            Self::MorphToMany => "morphToMany",
            Self::MorphedByMany => "morphedByMany",
            Self::HasOneThrough => "hasOneThrough",
            Self::HasManyThrough => "hasManyThrough",
        }
    }
}

/// A declared relationship kind with the fields that apply to it.
///
/// Key fields are always populated: when the declaration omits them, the
/// extractor fills in the same convention-derived names the framework would
/// use at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    HasOne {
        foreign_key: String,
        local_key: String,
    },
    HasMany {
        foreign_key: String,
        local_key: String,
    },
    BelongsTo {
        foreign_key: String,
        owner_key: String,
    },
    BelongsToMany {
        pivot_table: String,
        foreign_pivot_key: String,
        related_pivot_key: String,
    },
    MorphOne {
        morph_name: String,
        foreign_key: String,
    },
    MorphMany {
        morph_name: String,
        foreign_key: String,
    },
    /// Dynamic polymorphic owner; the target type is runtime data.
    MorphTo { morph_name: String },
    MorphToMany {
        morph_name: String,
        pivot_table: String,
        foreign_pivot_key: String,
    },
    MorphedByMany {
        morph_name: String,
        pivot_table: String,
        foreign_pivot_key: String,
    },
    HasOneThrough { through: Option<String> },
    HasManyThrough { through: Option<String> },
}

impl RelationKind {
    pub fn tag(&self) -> RelationTag {
        match self {
            Self::HasOne { .. } => RelationTag::HasOne,
            Self::HasMany { .. } => RelationTag::HasMany,
            Self::BelongsTo { .. } => RelationTag::BelongsTo,
            Self::BelongsToMany { .. } => RelationTag::BelongsToMany,
            Self::MorphOne { .. } => RelationTag::MorphOne,
            Self::MorphMany { .. } => RelationTag::MorphMany,
            Self::MorphTo { .. } => RelationTag::MorphTo,
            Self::MorphToMany { .. } => RelationTag::MorphToMany,
            Self::MorphedByMany { .. } => RelationTag::MorphedByMany,
            Self::HasOneThrough { .. } => RelationTag::HasOneThrough,
            Self::HasManyThrough { .. } => RelationTag::HasManyThrough,
        }
    }

    /// The Eloquent builder method declaring this kind.
    pub fn name(&self) -> &'static str {
        self.tag().method_name()
    }

    /// The foreign-key column this relationship reads, where one applies.
    pub fn foreign_key(&self) -> Option<&str> {
        match self {
            Self::HasOne { foreign_key, .. }
            | Self::HasMany { foreign_key, .. }
            | Self::BelongsTo { foreign_key, .. }
            | Self::MorphOne { foreign_key, .. }
            | Self::MorphMany { foreign_key, .. } => Some(foreign_key),
            Self::BelongsToMany {
                foreign_pivot_key, ..
            }
            | Self::MorphToMany {
                foreign_pivot_key, ..
            }
            | Self::MorphedByMany {
                foreign_pivot_key, ..
            } => Some(foreign_pivot_key),
            Self::MorphTo { .. } | Self::HasOneThrough { .. } | Self::HasManyThrough { .. } => {
                None
            }
        }
    }

    /// The owner/local-key column, where one applies.
    pub fn owner_key(&self) -> Option<&str> {
        match self {
            Self::BelongsTo { owner_key, .. } => Some(owner_key),
            Self::HasOne { local_key, .. } | Self::HasMany { local_key, .. } => Some(local_key),
            Self::BelongsToMany {
                related_pivot_key, ..
            } => Some(related_pivot_key),
            _ => None,
        }
    }

    /// The pivot/join table, for the many-to-many kinds.
    pub fn pivot_table(&self) -> Option<&str> {
        match self {
            Self::BelongsToMany { pivot_table, .. }
            | Self::MorphToMany { pivot_table, .. }
            | Self::MorphedByMany { pivot_table, .. } => Some(pivot_table),
            _ => None,
        }
    }

    /// Whether this kind places a foreign-key dependency on the related
    /// side. Only these kinds contribute edges to the cycle graph: the
    /// owning-reference kinds (`belongsTo`, `morphTo`) and the pivot-based
    /// kinds declare the inverse or lateral leg of an association, so a
    /// correctly paired declaration is one association, not a cycle.
    pub fn is_dependency_edge(&self) -> bool {
        matches!(
            self.tag(),
            RelationTag::HasOne
                | RelationTag::HasMany
                | RelationTag::MorphOne
                | RelationTag::MorphMany
                | RelationTag::HasOneThrough
                | RelationTag::HasManyThrough
        )
    }
}

/// One relationship accessor declared on a model.
#[derive(Debug, Clone)]
pub struct Relation {
    /// Accessor method name, e.g. `posts`.
    pub name: String,
    pub kind: RelationKind,
    /// Fully-qualified related class. `None` for `morphTo`, whose target
    /// is decided per row.
    pub related: Option<String>,
    /// Related table name, when the related class could be located.
    pub table: Option<String>,
    /// Source line of the accessor, for reporting.
    pub line: Option<usize>,
}

impl Relation {
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.kind.name(),
            "related": self.related,
            "foreign_key": self.kind.foreign_key(),
            "owner_key": self.kind.owner_key(),
            "table": self.table,
            "pivot_table": self.kind.pivot_table(),
            "method_line": self.line,
        })
    }
}

/// A scanned model with its declared relationships.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Fully-qualified class name.
    pub class: String,
    /// Class basename, used as the subject of issues.
    pub short_name: String,
    /// Backing table name.
    pub table: String,
    pub relationships: Vec<Relation>,
}

impl ModelInfo {
    pub fn new(class: impl Into<String>, table: impl Into<String>) -> Self {
        let class = class.into();
        let short_name = naming::class_basename(&class).to_string();
        Self {
            class,
            short_name,
            table: table.into(),
            relationships: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "class": self.class,
            "short_name": self.short_name,
            "table": self.table,
            "relationships": self.relationships.iter().map(Relation::to_json).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_field_accessors() {
        let kind = RelationKind::HasMany {
            foreign_key: "user_id".into(),
            local_key: "id".into(),
        };
        assert_eq!(kind.name(), "hasMany");
        assert_eq!(kind.foreign_key(), Some("user_id"));
        assert_eq!(kind.owner_key(), Some("id"));
        assert_eq!(kind.pivot_table(), None);

        let pivot = RelationKind::BelongsToMany {
            pivot_table: "role_user".into(),
            foreign_pivot_key: "user_id".into(),
            related_pivot_key: "role_id".into(),
        };
        assert_eq!(pivot.pivot_table(), Some("role_user"));
        assert_eq!(pivot.foreign_key(), Some("user_id"));

        let morph_to = RelationKind::MorphTo {
            morph_name: "commentable".into(),
        };
        assert_eq!(morph_to.foreign_key(), None);
        assert_eq!(morph_to.pivot_table(), None);
    }

    #[test]
    fn test_dependency_edges() {
        let has_one = RelationKind::HasOne {
            foreign_key: "user_id".into(),
            local_key: "id".into(),
        };
        let belongs_to = RelationKind::BelongsTo {
            foreign_key: "user_id".into(),
            owner_key: "id".into(),
        };
        let pivot = RelationKind::BelongsToMany {
            pivot_table: "role_user".into(),
            foreign_pivot_key: "user_id".into(),
            related_pivot_key: "role_id".into(),
        };
        assert!(has_one.is_dependency_edge());
        assert!(!belongs_to.is_dependency_edge());
        assert!(!pivot.is_dependency_edge());
    }

    #[test]
    fn test_relation_json_shape() {
        let rel = Relation {
            name: "posts".into(),
            kind: RelationKind::HasMany {
                foreign_key: "user_id".into(),
                local_key: "id".into(),
            },
            related: Some("App\\Models\\Post".into()),
            table: Some("posts".into()),
            line: Some(12),
        };
        let value = rel.to_json();
        assert_eq!(value["type"], "hasMany");
        assert_eq!(value["foreign_key"], "user_id");
        assert_eq!(value["pivot_table"], Value::Null);
    }
}
