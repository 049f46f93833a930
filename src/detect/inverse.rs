//! Missing-inverse detection.

use std::collections::HashMap;

use super::Detector;
use crate::error::AnalyzerResult;
use crate::issue::{AnalysisResult, Issue, IssueKind, Severity};
use crate::model::{ModelInfo, Relation, RelationTag};
use crate::naming;

/// Flags relationships whose target model declares no relationship of the
/// expected inverse kind pointing back. Targets outside the scanned set
/// cannot be verified and are skipped, as are kinds with no defined inverse
/// expectation (the through and many-to-many-polymorphic variants).
pub struct InverseDetector;

/// Expected inverse kind(s) for each relationship kind.
fn expected_inverses(tag: RelationTag) -> Option<&'static [RelationTag]> {
    use RelationTag::*;
    let expected: &[RelationTag] = match tag {
        HasOne => &[BelongsTo],
        HasMany => &[BelongsTo],
        BelongsTo => &[HasOne, HasMany],
        BelongsToMany => &[BelongsToMany],
        MorphOne => &[MorphTo],
        MorphMany => &[MorphTo],
        MorphTo => &[MorphOne, MorphMany],
        MorphToMany | MorphedByMany | HasOneThrough | HasManyThrough => return None,
    };
    Some(expected)
}

impl Detector for InverseDetector {
    const NAME: &'static str = "InverseDetector";

    async fn detect(&self, result: &mut AnalysisResult) -> AnalyzerResult<()> {
        let model_map: HashMap<&str, &ModelInfo> = result
            .models
            .iter()
            .map(|m| (m.class.as_str(), m))
            .collect();

        let mut issues = Vec::new();

        for model in &result.models {
            for rel in &model.relationships {
                let Some(expected) = expected_inverses(rel.kind.tag()) else {
                    continue;
                };
                let Some(related) = rel.related.as_deref() else {
                    continue;
                };
                let Some(related_model) = model_map.get(related) else {
                    continue;
                };

                if has_inverse(related_model, &model.class, rel, expected) {
                    continue;
                }

                let expected_names = expected
                    .iter()
                    .map(|t| t.method_name())
                    .collect::<Vec<_>>()
                    .join(" or ");

                issues.push(
                    Issue::new(
                        IssueKind::MissingInverse,
                        Severity::Warning,
                        &model.short_name,
                        format!(
                            "{}::{}() has no inverse {} in {}",
                            model.short_name, rel.name, expected_names, related_model.short_name
                        ),
                    )
                    .suggest(build_suggestion(model, rel, expected))
                    .context("model", model.class.as_str())
                    .context("relationship", rel.name.as_str())
                    .context("related_model", related),
                );
            }
        }

        result.issues.extend(issues);
        Ok(())
    }
}

/// Does the related model already declare an inverse pointing back?
///
/// The dynamic polymorphic owner (`morphTo`) names no class, so the
/// morph-one/-many side is matched against it by morph name instead.
fn has_inverse(
    related_model: &ModelInfo,
    origin_class: &str,
    origin_rel: &Relation,
    expected: &[RelationTag],
) -> bool {
    use crate::model::RelationKind;

    related_model.relationships.iter().any(|candidate| {
        if !expected.contains(&candidate.kind.tag()) {
            return false;
        }
        match (&origin_rel.kind, &candidate.kind) {
            (
                RelationKind::MorphOne { morph_name, .. }
                | RelationKind::MorphMany { morph_name, .. },
                RelationKind::MorphTo {
                    morph_name: candidate_name,
                },
            ) => morph_name == candidate_name,
            _ => candidate.related.as_deref() == Some(origin_class),
        }
    })
}

/// Code stub for the missing accessor.
fn build_suggestion(model: &ModelInfo, rel: &Relation, expected: &[RelationTag]) -> String {
    let related_basename = rel
        .related
        .as_deref()
        .map(naming::class_basename)
        .unwrap_or_default();

    format!(
        "Add to {} model:\npublic function {}()\n{{\n    return $this->{}({}::class);\n}}",
        related_basename,
        naming::lcfirst(&model.short_name),
        expected[0].method_name(),
        model.short_name
    )
}
