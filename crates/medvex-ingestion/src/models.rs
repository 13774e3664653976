//! Data models for the ingestion pipeline.

use serde::{Deserialize, Serialize};

/// One author as it appears in the citation's `AuthorList`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAuthor {
    pub last_name: String,
    pub fore_name: String,
}

/// One article as decoded from a baseline archive, before filtering.
/// Transient: produced and consumed within a single archive pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub pmid: u64,
    pub pmid_version: Option<String>,
    pub title: String,
    /// All `AbstractText` segments joined with a single space.
    pub abstract_text: Option<String>,
    pub authors: Vec<RawAuthor>,
    /// `CompleteYN` attribute of the author list; defaults to complete.
    pub authors_complete: bool,
    pub journal_title: Option<String>,
    pub journal_volume: Option<String>,
    pub pub_year: Option<String>,
    pub pub_month: Option<String>,
    pub pub_day: Option<String>,
    pub keywords: Vec<String>,
    pub doi: Option<String>,
    pub language: Option<String>,
    /// Set when `CommentsCorrections` marks the citation as a retraction
    /// notice or as retracted.
    pub retracted: bool,
}

/// Filter-passed projection of a RawRecord: the identifier, the text to
/// embed, and the metadata payload that travels with every stored point.
/// The PMID is globally unique across the corpus, so upserting the same
/// article twice can never create a second logical entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub pmid: u64,
    pub abstract_text: String,
    pub payload: serde_json::Value,
}
