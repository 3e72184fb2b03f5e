// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attribute dictionary: keyword → declared syntax.
//
// The dictionary is built once and then only read.  Callers construct it
// explicitly (usually `AttrDictionary::standard()`) and pass it by reference
// to whoever needs to know what syntax a keyword carries.

use std::collections::HashMap;

use crate::syntax::SyntaxKind;

// ---------------------------------------------------------------------------
// Keywords the request builder emits
// ---------------------------------------------------------------------------

pub const ATTRIBUTES_CHARSET: &str = "attributes-charset";
pub const ATTRIBUTES_NATURAL_LANGUAGE: &str = "attributes-natural-language";
pub const PRINTER_URI: &str = "printer-uri";
pub const REQUESTING_USER_NAME: &str = "requesting-user-name";
pub const JOB_NAME: &str = "job-name";
pub const DOCUMENT_NAME: &str = "document-name";
pub const DOCUMENT_FORMAT: &str = "document-format";
pub const JOB_K_OCTETS: &str = "job-k-octets";
pub const IPP_ATTRIBUTE_FIDELITY: &str = "ipp-attribute-fidelity";
pub const COMPRESSION: &str = "compression";
pub const STATUS_MESSAGE: &str = "status-message";

pub const COPIES: &str = "copies";
pub const MEDIA: &str = "media";
pub const MEDIA_SOURCE: &str = "media-source";
pub const MEDIA_COL: &str = "media-col";
pub const MEDIA_SIZE: &str = "media-size";
pub const MEDIA_SIZE_NAME: &str = "media-size-name";
pub const X_DIMENSION: &str = "x-dimension";
pub const Y_DIMENSION: &str = "y-dimension";
pub const ORIENTATION_REQUESTED: &str = "orientation-requested";
pub const NUMBER_UP: &str = "number-up";
pub const NUMBER_UP_LAYOUT: &str = "number-up-layout";
pub const PRINT_SCALING: &str = "print-scaling";
pub const SHEET_COLLATE: &str = "sheet-collate";
pub const FINISHINGS: &str = "finishings";

/// Vendor boolean understood by spoolers that predate `print-scaling`.
pub const FIT_TO_PAGE: &str = "fit-to-page";

/// A keyword together with its declared syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    keyword: String,
    syntax: SyntaxKind,
}

impl Attribute {
    pub fn new(keyword: impl Into<String>, syntax: SyntaxKind) -> Self {
        Self {
            keyword: keyword.into(),
            syntax,
        }
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn syntax(&self) -> SyntaxKind {
        self.syntax
    }
}

/// Immutable keyword → [`Attribute`] lookup table.
#[derive(Debug, Clone, Default)]
pub struct AttrDictionary {
    attributes: HashMap<String, Attribute>,
}

impl AttrDictionary {
    /// An empty dictionary; extend it with [`AttrDictionary::with`].
    pub fn empty() -> Self {
        Self::default()
    }

    /// Operation, job template and `media-col` member attributes used on the
    /// Print-Job / Validate-Job paths, plus the vendor `fit-to-page` flag.
    pub fn standard() -> Self {
        use SyntaxKind::*;

        const STANDARD: &[(&str, SyntaxKind)] = &[
            // Operation attributes (RFC 8011 §4.2.1.1)
            (ATTRIBUTES_CHARSET, Charset),
            (ATTRIBUTES_NATURAL_LANGUAGE, NaturalLanguage),
            (PRINTER_URI, Uri),
            (REQUESTING_USER_NAME, Name),
            (JOB_NAME, Name),
            (DOCUMENT_NAME, Name),
            (DOCUMENT_FORMAT, MimeMediaType),
            (JOB_K_OCTETS, Integer),
            (IPP_ATTRIBUTE_FIDELITY, Boolean),
            (COMPRESSION, Keyword),
            (STATUS_MESSAGE, Text),
            ("detailed-status-message", Text),
            ("requested-attributes", Keyword),
            // Job template attributes (RFC 8011 §5.2, PWG 5100.x)
            (COPIES, Integer),
            ("sides", Keyword),
            (MEDIA, Keyword),
            (MEDIA_SOURCE, Keyword),
            ("media-type", Keyword),
            (MEDIA_COL, Collection),
            (MEDIA_SIZE, Collection),
            (MEDIA_SIZE_NAME, Keyword),
            (X_DIMENSION, Integer),
            (Y_DIMENSION, Integer),
            (ORIENTATION_REQUESTED, Enum),
            (NUMBER_UP, Integer),
            (NUMBER_UP_LAYOUT, Keyword),
            (PRINT_SCALING, Keyword),
            ("print-color-mode", Keyword),
            ("print-quality", Enum),
            ("printer-resolution", Resolution),
            ("page-ranges", RangeOfInteger),
            (SHEET_COLLATE, Keyword),
            ("multiple-document-handling", Keyword),
            (FINISHINGS, Enum),
            ("output-bin", Keyword),
            ("job-priority", Integer),
            ("job-hold-until", Keyword),
            ("job-sheets", Keyword),
            // Job description / status attributes seen in responses
            ("job-id", Integer),
            ("job-uri", Uri),
            ("job-state", Enum),
            ("job-state-reasons", Keyword),
            ("job-state-message", Text),
            ("date-time-at-creation", DateTime),
            // Printer description attributes seen in responses
            ("printer-name", Name),
            ("printer-state", Enum),
            ("printer-state-reasons", Keyword),
            ("printer-is-accepting-jobs", Boolean),
            ("printer-up-time", Integer),
            ("printer-current-time", DateTime),
            ("printer-resolution-default", Resolution),
            ("copies-supported", RangeOfInteger),
            // Vendor extensions
            (FIT_TO_PAGE, Boolean),
        ];

        STANDARD
            .iter()
            .fold(Self::empty(), |dict, (keyword, syntax)| dict.with(keyword, *syntax))
    }

    /// Add (or redefine) one attribute, returning the extended dictionary.
    pub fn with(mut self, keyword: &str, syntax: SyntaxKind) -> Self {
        self.attributes
            .insert(keyword.to_string(), Attribute::new(keyword, syntax));
        self
    }

    pub fn get(&self, keyword: &str) -> Option<&Attribute> {
        self.attributes.get(keyword)
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.attributes.contains_key(keyword)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_declares_orientation_as_enum() {
        let dict = AttrDictionary::standard();
        let attr = dict.get(ORIENTATION_REQUESTED).unwrap();
        assert_eq!(attr.syntax(), SyntaxKind::Enum);
        assert_eq!(attr.keyword(), ORIENTATION_REQUESTED);
    }

    #[test]
    fn unknown_keyword_is_absent() {
        let dict = AttrDictionary::standard();
        assert!(dict.get("com.vendor-staple-mode").is_none());
    }

    #[test]
    fn with_extends_without_touching_original() {
        let base = AttrDictionary::standard();
        let extended = base.clone().with("com.vendor-staple-mode", SyntaxKind::Keyword);
        assert!(extended.contains("com.vendor-staple-mode"));
        assert!(!base.contains("com.vendor-staple-mode"));
        assert_eq!(extended.len(), base.len() + 1);
    }
}
