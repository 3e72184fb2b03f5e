// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pressgang print-dispatch core.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Requested IPP option values, keyed by IPP (or vendor) keyword.
///
/// Ordered so that the same request always produces the same attribute order.
pub type OptionMap = BTreeMap<String, String>;

/// Intrinsic page geometry of the PDF being printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOrientation {
    /// The first page is wider than it is tall.
    pub landscape: bool,
    /// The `/Rotate` of the first page, in degrees.
    pub rotation: i32,
    /// Rotation the user asked for on top of the PDF's own, in degrees.
    pub user_rotate: i32,
}

/// One slice of a job that was split by media or duplex boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobChunk {
    /// 1-based position of this chunk.
    pub index: u32,
    /// Number of chunks the job was split into.
    pub total: u32,
    /// Media for this chunk, overriding the requested `media` option.
    pub media: Option<String>,
    /// Tray for this chunk, overriding the requested `media-source` option.
    pub media_source: Option<String>,
}

/// A printer-agnostic print request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintRequest {
    pub copies: u32,
    /// `Some(true)` asks for scale-to-fit, `Some(false)` explicitly forbids it.
    pub fit_to_page: Option<bool>,
    pub options: OptionMap,
    pub orientation: PdfOrientation,
    pub chunk: Option<JobChunk>,
    /// Build a Validate-Job instead of a Print-Job.
    pub validate_only: bool,
}

impl Default for PrintRequest {
    fn default() -> Self {
        Self {
            copies: 1,
            fit_to_page: None,
            options: OptionMap::new(),
            orientation: PdfOrientation::default(),
            chunk: None,
            validate_only: false,
        }
    }
}

impl PrintRequest {
    /// Convenience for building requests option by option.
    pub fn with_option(mut self, keyword: &str, value: &str) -> Self {
        self.options.insert(keyword.to_string(), value.to_string());
        self
    }
}

/// What the builder needs to know about the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Size of the PDF in bytes.
    pub byte_len: u64,
    pub document_name: String,
    pub job_name: String,
    pub requesting_user: String,
}

impl DocumentMeta {
    /// Size in whole kilo-octets, rounded up, as `job-k-octets` expects.
    pub fn k_octets(&self) -> u64 {
        self.byte_len.div_ceil(1024)
    }
}

/// Physical media dimensions in hundredths of a millimetre (PWG 5101.1 units).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSize {
    pub x_dimension: i32,
    pub y_dimension: i32,
}

impl MediaSize {
    /// Parse a PWG self-describing media name such as `iso_a4_210x297mm` or
    /// `na_letter_8.5x11in`.
    ///
    /// Returns `None` for legacy names without a dimension suffix.
    pub fn from_pwg_name(name: &str) -> Option<Self> {
        let dims = name.rsplit('_').next()?;
        let (dims, per_unit) = if let Some(d) = dims.strip_suffix("mm") {
            (d, 100.0)
        } else if let Some(d) = dims.strip_suffix("in") {
            (d, 2540.0)
        } else {
            return None;
        };
        let (w, h) = dims.split_once('x')?;
        let w: f64 = w.parse().ok()?;
        let h: f64 = h.parse().ok()?;
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        Some(Self {
            x_dimension: (w * per_unit).round() as i32,
            y_dimension: (h * per_unit).round() as i32,
        })
    }
}
