//! Streaming record extraction from baseline archives.
//!
//! [`RecordReader`] gunzips and parses `<MedlineCitation>` blocks one at a
//! time, holding a single record's state in memory regardless of archive
//! size — baseline files carry tens of thousands of articles. The reader is
//! pull-based: callers drain it with [`RecordReader::next_record`] and can
//! fast-forward past already-persisted articles with
//! [`RecordReader::skip_to`] without touching any downstream stage.
//!
//! Failure granularity: a citation with a missing or non-numeric PMID
//! yields a `RecordParse` error for that record only and the reader keeps
//! going; a broken gzip stream or malformed XML yields `ArchiveCorrupt`
//! and ends the archive.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use crate::error::{IngestError, Result};
use crate::models::{RawAuthor, RawRecord};

/// `CommentsCorrections` reference types that mark a citation as a
/// retraction notice or as retracted.
const RETRACTION_REF_TYPES: [&str; 2] = ["Retraction of", "Retraction in"];

/// Accumulates one citation's fields between `<MedlineCitation>` and its
/// closing tag.
struct RecordBuilder {
    pmid: Option<String>,
    pmid_version: Option<String>,
    title: String,
    abstract_segments: Vec<String>,
    authors: Vec<RawAuthor>,
    authors_complete: bool,
    journal_title: Option<String>,
    journal_volume: Option<String>,
    pub_year: Option<String>,
    pub_month: Option<String>,
    pub_day: Option<String>,
    keywords: Vec<String>,
    doi: Option<String>,
    language: Option<String>,
    retracted: bool,
    current_last: String,
    current_fore: String,
    current_keyword: String,
    current_language: String,
}

impl RecordBuilder {
    fn new() -> Self {
        Self {
            pmid: None,
            pmid_version: None,
            title: String::new(),
            abstract_segments: Vec::new(),
            authors: Vec::new(),
            authors_complete: true,
            journal_title: None,
            journal_volume: None,
            pub_year: None,
            pub_month: None,
            pub_day: None,
            keywords: Vec::new(),
            doi: None,
            language: None,
            retracted: false,
            current_last: String::new(),
            current_fore: String::new(),
            current_keyword: String::new(),
            current_language: String::new(),
        }
    }

    fn build(self) -> Result<RawRecord> {
        let pmid_text = self
            .pmid
            .ok_or_else(|| IngestError::RecordParse("citation has no PMID".to_string()))?;
        let pmid: u64 = pmid_text
            .trim()
            .parse()
            .map_err(|_| IngestError::RecordParse(format!("invalid PMID: {pmid_text}")))?;

        let joined: Vec<&str> = self
            .abstract_segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        let abstract_text = if joined.is_empty() {
            None
        } else {
            Some(joined.join(" "))
        };

        Ok(RawRecord {
            pmid,
            pmid_version: self.pmid_version,
            title: self.title.trim().to_string(),
            abstract_text,
            authors: self.authors,
            authors_complete: self.authors_complete,
            journal_title: self.journal_title,
            journal_volume: self.journal_volume,
            pub_year: self.pub_year,
            pub_month: self.pub_month,
            pub_day: self.pub_day,
            keywords: self.keywords,
            doi: self.doi,
            language: self.language,
            retracted: self.retracted,
        })
    }
}

pub struct RecordReader<R: BufRead> {
    reader: Reader<R>,
    file_name: String,
    buf: Vec<u8>,
    pending: Option<RawRecord>,
    finished: bool,
    record: Option<RecordBuilder>,
    in_pmid: bool,
    in_comments_corrections: bool,
    in_article_title: bool,
    in_abstract: bool,
    in_abstract_text: bool,
    in_author: bool,
    in_last_name: bool,
    in_fore_name: bool,
    in_journal: bool,
    in_journal_title: bool,
    in_volume: bool,
    in_pub_date: bool,
    in_year: bool,
    in_month: bool,
    in_day: bool,
    in_keyword: bool,
    in_language: bool,
    in_doi: bool,
}

impl RecordReader<BufReader<GzDecoder<File>>> {
    /// Open a gzipped archive on disk for streaming extraction.
    pub fn open_gzip(path: &Path, file_name: &str) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(
            BufReader::new(GzDecoder::new(file)),
            file_name,
        ))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn from_reader(inner: R, file_name: &str) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            file_name: file_name.to_string(),
            buf: Vec::new(),
            pending: None,
            finished: false,
            record: None,
            in_pmid: false,
            in_comments_corrections: false,
            in_article_title: false,
            in_abstract: false,
            in_abstract_text: false,
            in_author: false,
            in_last_name: false,
            in_fore_name: false,
            in_journal: false,
            in_journal_title: false,
            in_volume: false,
            in_pub_date: false,
            in_year: false,
            in_month: false,
            in_day: false,
            in_keyword: false,
            in_language: false,
            in_doi: false,
        }
    }

    /// Pull the next record from the archive, in traversal order.
    ///
    /// `Some(Err(RecordParse))` covers exactly one citation; the reader
    /// remains usable. `Some(Err(ArchiveCorrupt))` ends the stream.
    pub fn next_record(&mut self) -> Option<Result<RawRecord>> {
        if let Some(rec) = self.pending.take() {
            return Some(Ok(rec));
        }
        if self.finished {
            return None;
        }
        // The event buffer is moved out for the duration of the loop so the
        // borrowed events don't pin `self`.
        let mut buf = std::mem::take(&mut self.buf);
        let result = self.read_loop(&mut buf);
        buf.clear();
        self.buf = buf;
        result
    }

    fn read_loop(&mut self, buf: &mut Vec<u8>) -> Option<Result<RawRecord>> {
        loop {
            match self.reader.read_event_into(buf) {
                Ok(Event::Start(ref e)) => self.handle_start(e),
                Ok(Event::Empty(ref e)) => self.handle_empty(e),
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().unwrap_or_default().to_string();
                    self.handle_text(&text);
                }
                Ok(Event::End(ref e)) => {
                    if let Some(result) = self.handle_end(e.name().as_ref()) {
                        return Some(result);
                    }
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(IngestError::ArchiveCorrupt {
                        file: self.file_name.clone(),
                        reason: err.to_string(),
                    }));
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// Fast-forward through traversal order, consuming every record with
    /// `pmid <= resume_pmid` without handing it downstream. Baseline
    /// archives are PMID-ascending, so this bounds re-work to the records
    /// between the checkpoint and the first unfinished one. Returns the
    /// number of records skipped.
    pub fn skip_to(&mut self, resume_pmid: u64) -> Result<usize> {
        let mut skipped = 0usize;
        loop {
            match self.next_record() {
                None => return Ok(skipped),
                Some(Ok(rec)) => {
                    if rec.pmid > resume_pmid {
                        self.pending = Some(rec);
                        return Ok(skipped);
                    }
                    skipped += 1;
                }
                Some(Err(IngestError::RecordParse(msg))) => {
                    // Inside the completed range these would be skipped
                    // anyway; note them and move on.
                    warn!(file = %self.file_name, error = %msg, "malformed record during resume skip");
                    skipped += 1;
                }
                Some(Err(err)) => return Err(err),
            }
        }
    }

    fn handle_start(&mut self, e: &BytesStart) {
        match e.name().as_ref() {
            b"MedlineCitation" => self.record = Some(RecordBuilder::new()),
            b"PMID" if !self.in_comments_corrections => {
                if let Some(ref mut rec) = self.record {
                    if rec.pmid.is_none() {
                        self.in_pmid = true;
                        rec.pmid_version = attr_value(e, b"Version");
                    }
                }
            }
            b"CommentsCorrections" => {
                self.in_comments_corrections = true;
                self.note_comments_corrections(e);
            }
            b"ArticleTitle" => self.in_article_title = true,
            b"Abstract" => self.in_abstract = true,
            b"AbstractText" if self.in_abstract => {
                self.in_abstract_text = true;
                if let Some(ref mut rec) = self.record {
                    rec.abstract_segments.push(String::new());
                }
            }
            b"AuthorList" => {
                if let Some(ref mut rec) = self.record {
                    rec.authors_complete = attr_value(e, b"CompleteYN").as_deref() != Some("N");
                }
            }
            b"Author" => {
                self.in_author = true;
                if let Some(ref mut rec) = self.record {
                    rec.current_last.clear();
                    rec.current_fore.clear();
                }
            }
            b"LastName" if self.in_author => self.in_last_name = true,
            b"ForeName" if self.in_author => self.in_fore_name = true,
            b"Journal" => self.in_journal = true,
            b"Title" if self.in_journal => self.in_journal_title = true,
            b"Volume" if self.in_journal => self.in_volume = true,
            b"PubDate" if self.in_journal => self.in_pub_date = true,
            b"Year" if self.in_pub_date => self.in_year = true,
            b"Month" if self.in_pub_date => self.in_month = true,
            b"Day" if self.in_pub_date => self.in_day = true,
            b"Keyword" => {
                self.in_keyword = true;
                if let Some(ref mut rec) = self.record {
                    rec.current_keyword.clear();
                }
            }
            b"Language" => {
                self.in_language = true;
                if let Some(ref mut rec) = self.record {
                    rec.current_language.clear();
                }
            }
            b"ELocationID" => {
                if attr_value(e, b"EIdType").as_deref() == Some("doi") {
                    self.in_doi = true;
                }
            }
            _ => {}
        }
    }

    fn handle_empty(&mut self, e: &BytesStart) {
        // Self-closing elements carry no text; only the retraction marker
        // matters here.
        if e.name().as_ref() == b"CommentsCorrections" {
            self.note_comments_corrections(e);
        }
    }

    fn note_comments_corrections(&mut self, e: &BytesStart) {
        if let Some(ref mut rec) = self.record {
            if let Some(ref_type) = attr_value(e, b"RefType") {
                if RETRACTION_REF_TYPES.contains(&ref_type.as_str()) {
                    rec.retracted = true;
                }
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let Some(rec) = self.record.as_mut() else {
            return;
        };
        if self.in_pmid {
            rec.pmid.get_or_insert_with(String::new).push_str(text);
        }
        if self.in_article_title {
            push_text(&mut rec.title, text);
        }
        if self.in_abstract_text {
            if let Some(segment) = rec.abstract_segments.last_mut() {
                push_text(segment, text);
            }
        }
        if self.in_last_name {
            rec.current_last.push_str(text);
        }
        if self.in_fore_name {
            rec.current_fore.push_str(text);
        }
        if self.in_journal_title {
            push_text(rec.journal_title.get_or_insert_with(String::new), text);
        }
        if self.in_volume {
            rec.journal_volume.get_or_insert_with(String::new).push_str(text);
        }
        if self.in_year {
            rec.pub_year.get_or_insert_with(String::new).push_str(text);
        }
        if self.in_month {
            rec.pub_month.get_or_insert_with(String::new).push_str(text);
        }
        if self.in_day {
            rec.pub_day.get_or_insert_with(String::new).push_str(text);
        }
        if self.in_keyword {
            push_text(&mut rec.current_keyword, text);
        }
        if self.in_language {
            rec.current_language.push_str(text);
        }
        if self.in_doi {
            rec.doi.get_or_insert_with(String::new).push_str(text);
        }
    }

    fn handle_end(&mut self, name: &[u8]) -> Option<Result<RawRecord>> {
        match name {
            b"PMID" => self.in_pmid = false,
            b"CommentsCorrections" => self.in_comments_corrections = false,
            b"ArticleTitle" => self.in_article_title = false,
            b"Abstract" => self.in_abstract = false,
            b"AbstractText" => self.in_abstract_text = false,
            b"LastName" => self.in_last_name = false,
            b"ForeName" => self.in_fore_name = false,
            b"Author" => {
                if self.in_author {
                    if let Some(ref mut rec) = self.record {
                        if !rec.current_last.is_empty() || !rec.current_fore.is_empty() {
                            let author = RawAuthor {
                                last_name: rec.current_last.clone(),
                                fore_name: rec.current_fore.clone(),
                            };
                            rec.authors.push(author);
                        }
                    }
                    self.in_author = false;
                }
            }
            b"Journal" => self.in_journal = false,
            b"Title" => self.in_journal_title = false,
            b"Volume" => self.in_volume = false,
            b"PubDate" => self.in_pub_date = false,
            b"Year" => self.in_year = false,
            b"Month" => self.in_month = false,
            b"Day" => self.in_day = false,
            b"Keyword" => {
                self.in_keyword = false;
                if let Some(ref mut rec) = self.record {
                    if !rec.current_keyword.is_empty() {
                        let keyword = rec.current_keyword.clone();
                        rec.keywords.push(keyword);
                    }
                }
            }
            b"Language" => {
                self.in_language = false;
                if let Some(ref mut rec) = self.record {
                    if rec.language.is_none() && !rec.current_language.is_empty() {
                        rec.language = Some(rec.current_language.clone());
                    }
                }
            }
            b"ELocationID" => self.in_doi = false,
            b"MedlineCitation" => {
                return Some(match self.record.take() {
                    Some(builder) => builder.build(),
                    None => Err(IngestError::RecordParse(
                        "unmatched MedlineCitation close".to_string(),
                    )),
                });
            }
            _ => {}
        }
        None
    }
}

/// Append a text fragment, space-separating fragments split by child
/// markup (`<i>`, `<sup>`, …).
fn push_text(dst: &mut String, text: &str) {
    if !dst.is_empty() {
        dst.push(' ');
    }
    dst.push_str(text);
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(xml: &str) -> RecordReader<&[u8]> {
        RecordReader::from_reader(xml.as_bytes(), "test.xml.gz")
    }

    fn citation(pmid: &str, extra: &str) -> String {
        format!(
            r#"<PubmedArticle><MedlineCitation>
                 <PMID Version="1">{pmid}</PMID>
                 <Article>{extra}</Article>
               </MedlineCitation></PubmedArticle>"#
        )
    }

    fn wrap(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<PubmedArticleSet>{body}</PubmedArticleSet>"
        )
    }

    #[test]
    fn test_parse_full_citation() {
        let xml = wrap(
            r#"<PubmedArticle><MedlineCitation>
                 <PMID Version="2">12345678</PMID>
                 <Article>
                   <Journal>
                     <JournalIssue>
                       <Volume>42</Volume>
                       <PubDate><Year>2023</Year><Month>Jun</Month><Day>15</Day></PubDate>
                     </JournalIssue>
                     <Title>Nature Medicine</Title>
                   </Journal>
                   <ArticleTitle>KRAS G12D in pancreatic cancer</ArticleTitle>
                   <ELocationID EIdType="doi" ValidYN="Y">10.1000/xyz123</ELocationID>
                   <Abstract>
                     <AbstractText Label="BACKGROUND">First part.</AbstractText>
                     <AbstractText Label="RESULTS">Second part.</AbstractText>
                   </Abstract>
                   <AuthorList CompleteYN="N">
                     <Author><LastName>Smith</LastName><ForeName>John</ForeName></Author>
                     <Author><LastName>Doe</LastName></Author>
                   </AuthorList>
                   <Language>eng</Language>
                 </Article>
                 <KeywordList><Keyword>oncology</Keyword><Keyword>KRAS</Keyword></KeywordList>
               </MedlineCitation></PubmedArticle>"#,
        );
        let mut r = reader(&xml);
        let rec = r.next_record().unwrap().unwrap();
        assert_eq!(rec.pmid, 12345678);
        assert_eq!(rec.pmid_version.as_deref(), Some("2"));
        assert_eq!(rec.title, "KRAS G12D in pancreatic cancer");
        assert_eq!(rec.abstract_text.as_deref(), Some("First part. Second part."));
        assert_eq!(rec.authors.len(), 2);
        assert_eq!(rec.authors[0].last_name, "Smith");
        assert_eq!(rec.authors[0].fore_name, "John");
        assert!(!rec.authors_complete);
        assert_eq!(rec.journal_title.as_deref(), Some("Nature Medicine"));
        assert_eq!(rec.journal_volume.as_deref(), Some("42"));
        assert_eq!(rec.pub_year.as_deref(), Some("2023"));
        assert_eq!(rec.pub_month.as_deref(), Some("Jun"));
        assert_eq!(rec.pub_day.as_deref(), Some("15"));
        assert_eq!(rec.keywords, vec!["oncology", "KRAS"]);
        assert_eq!(rec.doi.as_deref(), Some("10.1000/xyz123"));
        assert_eq!(rec.language.as_deref(), Some("eng"));
        assert!(!rec.retracted);
        assert!(r.next_record().is_none());
    }

    #[test]
    fn test_streams_multiple_records() {
        let xml = wrap(&format!(
            "{}{}{}",
            citation("1", "<ArticleTitle>A</ArticleTitle>"),
            citation("2", "<ArticleTitle>B</ArticleTitle>"),
            citation("3", "<ArticleTitle>C</ArticleTitle>"),
        ));
        let mut r = reader(&xml);
        let pmids: Vec<u64> = std::iter::from_fn(|| r.next_record())
            .map(|res| res.unwrap().pmid)
            .collect();
        assert_eq!(pmids, vec![1, 2, 3]);
    }

    #[test]
    fn test_retraction_ref_types_set_flag() {
        let xml = wrap(
            r#"<PubmedArticle><MedlineCitation>
                 <PMID>77</PMID>
                 <Article><ArticleTitle>Withdrawn</ArticleTitle></Article>
                 <CommentsCorrectionsList>
                   <CommentsCorrections RefType="Retraction in">
                     <RefSource>Some J</RefSource>
                     <PMID Version="1">999999</PMID>
                   </CommentsCorrections>
                 </CommentsCorrectionsList>
               </MedlineCitation></PubmedArticle>"#,
        );
        let mut r = reader(&xml);
        let rec = r.next_record().unwrap().unwrap();
        assert!(rec.retracted);
        // The citation's own PMID wins over the referenced one.
        assert_eq!(rec.pmid, 77);
    }

    #[test]
    fn test_plain_comments_corrections_is_not_retraction() {
        let xml = wrap(
            r#"<PubmedArticle><MedlineCitation>
                 <PMID>78</PMID>
                 <CommentsCorrectionsList>
                   <CommentsCorrections RefType="Cites"><PMID>1</PMID></CommentsCorrections>
                 </CommentsCorrectionsList>
               </MedlineCitation></PubmedArticle>"#,
        );
        let rec = reader(&xml).next_record().unwrap().unwrap();
        assert!(!rec.retracted);
        assert_eq!(rec.pmid, 78);
    }

    #[test]
    fn test_missing_pmid_skips_one_record() {
        let xml = wrap(&format!(
            "{}{}",
            "<PubmedArticle><MedlineCitation><Article><ArticleTitle>No id</ArticleTitle></Article></MedlineCitation></PubmedArticle>",
            citation("5", "<ArticleTitle>Good</ArticleTitle>"),
        ));
        let mut r = reader(&xml);
        let first = r.next_record().unwrap();
        assert!(matches!(first, Err(IngestError::RecordParse(_))));
        let second = r.next_record().unwrap().unwrap();
        assert_eq!(second.pmid, 5);
        assert!(r.next_record().is_none());
    }

    #[test]
    fn test_non_numeric_pmid_is_record_parse_error() {
        let xml = wrap(&citation("not-a-number", ""));
        let err = reader(&xml).next_record().unwrap().unwrap_err();
        assert!(matches!(err, IngestError::RecordParse(_)));
    }

    #[test]
    fn test_skip_to_resumes_past_checkpoint() {
        let xml = wrap(&format!(
            "{}{}{}{}",
            citation("10", ""),
            citation("20", ""),
            citation("30", ""),
            citation("40", ""),
        ));
        let mut r = reader(&xml);
        let skipped = r.skip_to(20).unwrap();
        assert_eq!(skipped, 2);
        assert_eq!(r.next_record().unwrap().unwrap().pmid, 30);
        assert_eq!(r.next_record().unwrap().unwrap().pmid, 40);
        assert!(r.next_record().is_none());
    }

    #[test]
    fn test_skip_to_past_end_drains_reader() {
        let xml = wrap(&citation("10", ""));
        let mut r = reader(&xml);
        assert_eq!(r.skip_to(999).unwrap(), 1);
        assert!(r.next_record().is_none());
    }

    #[test]
    fn test_gzip_round_trip_and_corrupt_stream() {
        use std::io::Write;

        let xml = wrap(&citation("123", "<ArticleTitle>Gz</ArticleTitle>"));
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(xml.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.xml.gz");
        std::fs::write(&good, &gz).unwrap();
        let mut r = RecordReader::open_gzip(&good, "good.xml.gz").unwrap();
        assert_eq!(r.next_record().unwrap().unwrap().pmid, 123);

        let bad = dir.path().join("bad.xml.gz");
        std::fs::write(&bad, b"definitely not gzip").unwrap();
        let mut r = RecordReader::open_gzip(&bad, "bad.xml.gz").unwrap();
        let err = r.next_record().unwrap().unwrap_err();
        assert!(matches!(err, IngestError::ArchiveCorrupt { .. }));
        assert!(r.next_record().is_none());
    }
}
