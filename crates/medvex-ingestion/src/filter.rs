//! Inclusion rules and payload normalization.
//!
//! `apply` is a pure function: the same RawRecord always produces the same
//! outcome, and exactly one exclusion reason is reported (first matching
//! rule). Order: retracted, then missing abstract, then language.

use serde::Serialize;

use crate::models::{ArticleRecord, RawRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Retracted,
    MissingAbstract,
    LanguageMismatch,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::Retracted => "retracted",
            ExclusionReason::MissingAbstract => "missing_abstract",
            ExclusionReason::LanguageMismatch => "language_mismatch",
        }
    }
}

#[derive(Debug, Clone)]
pub enum FilterOutcome {
    Included(ArticleRecord),
    Excluded { pmid: u64, reason: ExclusionReason },
}

/// Apply the inclusion rules and, for survivors, build the canonical
/// article record with its metadata payload.
pub fn apply(record: RawRecord, target_language: &str) -> FilterOutcome {
    if record.retracted {
        return FilterOutcome::Excluded {
            pmid: record.pmid,
            reason: ExclusionReason::Retracted,
        };
    }

    let abstract_text = match record.abstract_text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => {
            return FilterOutcome::Excluded {
                pmid: record.pmid,
                reason: ExclusionReason::MissingAbstract,
            }
        }
    };

    // A citation without a language code cannot match the target.
    let language_matches = record
        .language
        .as_deref()
        .is_some_and(|lang| lang.eq_ignore_ascii_case(target_language));
    if !language_matches {
        return FilterOutcome::Excluded {
            pmid: record.pmid,
            reason: ExclusionReason::LanguageMismatch,
        };
    }

    let payload = build_payload(&record, &abstract_text);
    FilterOutcome::Included(ArticleRecord {
        pmid: record.pmid,
        abstract_text,
        payload,
    })
}

/// Metadata payload stored alongside every point for this article. Pure
/// function of the record, so replaying an article after a crash writes a
/// byte-identical payload.
fn build_payload(record: &RawRecord, abstract_text: &str) -> serde_json::Value {
    let authors: Vec<serde_json::Value> = record
        .authors
        .iter()
        .map(|a| {
            serde_json::json!({
                "last_name": a.last_name,
                "fore_name": a.fore_name,
            })
        })
        .collect();

    serde_json::json!({
        "pmid": record.pmid.to_string(),
        "pmid_version": record.pmid_version.clone().unwrap_or_default(),
        "title": record.title,
        "abstract": abstract_text,
        "authors": authors,
        "authors_complete": record.authors_complete,
        "journal": {
            "title": record.journal_title.clone().unwrap_or_default(),
            "volume": record.journal_volume.clone().unwrap_or_default(),
            "pub_date": {
                "year": record.pub_year.clone().unwrap_or_default(),
                "month": record.pub_month.clone().unwrap_or_default(),
                "day": record.pub_day.clone().unwrap_or_default(),
            },
        },
        "keywords": record.keywords,
        "publication_identifiers": {
            "doi": record.doi.clone().unwrap_or_default(),
        },
        "language": record.language.clone().unwrap_or_default(),
    })
}
