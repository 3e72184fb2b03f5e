// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print-Job request builder.
//
// Turns a printer-agnostic print request into the Print-Job (or
// Validate-Job) message a particular spooler needs. Each stage may override
// what earlier stages wrote:
//
//   1. operation attributes
//   2. requested options → PPD keyword or native IPP attribute,
//      with substitution rules applied
//   3. media / media-source → deferred media-col (chunk overrides win)
//   4. copies
//   5. n-up orientation and layout
//   6. fit-to-page → print-scaling, or the vendor boolean
//   7. collation substitution
//   8. extra rules
//
// Options that cannot be placed are never fatal. They are logged and
// reported in `BuiltPrintJob::skipped` so the job still prints with
// whatever could be honoured.

use std::collections::HashSet;

use tracing::{debug, error, info, instrument, warn};

use pressgang_core::error::EncodeError;
use pressgang_core::printer::PrinterDescription;
use pressgang_core::rules::RuleTables;
use pressgang_core::types::{DocumentMeta, OptionMap, PrintRequest};
use pressgang_ipp::dictionary::*;
use pressgang_ipp::tag::{OP_PRINT_JOB, OP_VALIDATE_JOB};
use pressgang_ipp::{
    AttrDictionary, AttrGroup, AttrValue, Attribute, GroupTag, Message, MessageCharset, SyntaxKind,
};

use crate::media::MediaSelection;
use crate::rules::RuleChain;

/// Documents reach the spooler as PDF.
pub const DOCUMENT_FORMAT_PDF: &str = "application/pdf";

const NATURAL_LANGUAGE: &str = "en";

/// Why an option did not make it into the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither a PPD mapping nor a known IPP attribute.
    Unresolved,
    /// A finishing option explicitly set to `none`.
    NoFinishing,
    /// The printer does not advertise the attribute.
    Unsupported,
    /// An extra rule named a keyword this printer cannot take.
    UnknownExtra { rule: String },
    /// The value does not encode under the attribute's syntax.
    Malformed(EncodeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOption {
    pub keyword: String,
    pub value: String,
    pub reason: SkipReason,
}

/// A ready-to-send request plus what the builder decided along the way.
#[derive(Debug, Clone)]
pub struct BuiltPrintJob {
    pub message: Message,
    /// The job prints landscape, whether requested or implied by n-up.
    pub landscape: bool,
    pub skipped: Vec<SkippedOption>,
}

impl BuiltPrintJob {
    pub fn operation_attributes(&self) -> Option<&AttrGroup> {
        self.message.group(GroupTag::Operation)
    }

    pub fn job_attributes(&self) -> Option<&AttrGroup> {
        self.message.group(GroupTag::Job)
    }
}

/// Builds requests against one attribute dictionary and one set of shared
/// template rules.
#[derive(Debug, Clone, Copy)]
pub struct PrintJobBuilder<'a> {
    dictionary: &'a AttrDictionary,
    template: &'a RuleTables,
}

impl<'a> PrintJobBuilder<'a> {
    pub fn new(dictionary: &'a AttrDictionary, template: &'a RuleTables) -> Self {
        Self {
            dictionary,
            template,
        }
    }

    #[instrument(skip_all, fields(printer = %printer.name, copies = request.copies))]
    pub fn build(
        &self,
        request: &PrintRequest,
        printer: &PrinterDescription,
        document: &DocumentMeta,
    ) -> BuiltPrintJob {
        let rules = RuleChain::new(&printer.rules, self.template);
        let mut draft = Draft {
            dictionary: self.dictionary,
            printer,
            job: AttrGroup::new(GroupTag::Job),
            media: MediaSelection::default(),
            skipped: Vec::new(),
        };

        let operation = operation_attributes(request, printer, document);
        draft.apply_options(&request.options, rules);
        draft.apply_chunk_media(request);
        if request.copies > 1 {
            let copies = draft.native(COPIES, SyntaxKind::Integer);
            draft.put(copies, &request.copies.to_string());
        }
        let landscape = draft.apply_number_up(request, rules);
        draft.apply_fit_to_page(request.fit_to_page);
        draft.apply_collation(request, rules);
        draft.apply_extras(&request.options, rules);
        if let Some(media_col) = draft.media.to_collection() {
            draft.job.set_collection(media_col);
        }

        let code = if request.validate_only {
            OP_VALIDATE_JOB
        } else {
            OP_PRINT_JOB
        };
        let mut message = Message::new(code);
        message.groups.push(operation);
        if !draft.job.is_empty() {
            message.groups.push(draft.job);
        }

        info!(
            operation = code,
            landscape,
            skipped = draft.skipped.len(),
            "built print job request"
        );
        BuiltPrintJob {
            message,
            landscape,
            skipped: draft.skipped,
        }
    }
}

/// Build with no shared template rules, only the printer's own.
pub fn build_print_job_request(
    request: &PrintRequest,
    printer: &PrinterDescription,
    document: &DocumentMeta,
    dictionary: &AttrDictionary,
) -> BuiltPrintJob {
    let template = RuleTables::default();
    PrintJobBuilder::new(dictionary, &template).build(request, printer, document)
}

fn operation_attributes(
    request: &PrintRequest,
    printer: &PrinterDescription,
    document: &DocumentMeta,
) -> AttrGroup {
    let job_name = match &request.chunk {
        Some(chunk) if chunk.total > 1 => {
            format!("{} ({}/{})", document.job_name, chunk.index, chunk.total)
        }
        _ => document.job_name.clone(),
    };
    let k_octets = document.k_octets().min(i32::MAX as u64);

    let mut group = AttrGroup::new(GroupTag::Operation);
    group
        .add_value(AttrValue::of(ATTRIBUTES_CHARSET, SyntaxKind::Charset, MessageCharset::Utf8.name()))
        .add_value(AttrValue::of(ATTRIBUTES_NATURAL_LANGUAGE, SyntaxKind::NaturalLanguage, NATURAL_LANGUAGE))
        .add_value(AttrValue::of(PRINTER_URI, SyntaxKind::Uri, &printer.printer_uri))
        .add_value(AttrValue::of(REQUESTING_USER_NAME, SyntaxKind::Name, &document.requesting_user))
        .add_value(AttrValue::of(JOB_NAME, SyntaxKind::Name, job_name))
        .add_value(AttrValue::of(DOCUMENT_NAME, SyntaxKind::Name, &document.document_name))
        .add_value(AttrValue::of(JOB_K_OCTETS, SyntaxKind::Integer, k_octets.to_string()))
        .add_value(AttrValue::of(IPP_ATTRIBUTE_FIDELITY, SyntaxKind::Boolean, "true"))
        .add_value(AttrValue::of(COMPRESSION, SyntaxKind::Keyword, "none"))
        .add_value(AttrValue::of(DOCUMENT_FORMAT, SyntaxKind::MimeMediaType, DOCUMENT_FORMAT_PDF));
    group
}

/// `orientation-requested` 4 (landscape) or 5 (reverse-landscape).
fn is_landscape(orientation: Option<&str>) -> bool {
    matches!(orientation.map(str::trim), Some("4" | "5"))
}

fn is_finishing(keyword: &str) -> bool {
    keyword == FINISHINGS || keyword.starts_with("finishings-")
}

enum Resolution {
    Target(Attribute, String),
    Unsupported,
    Unresolved,
}

/// Job attributes under construction.
struct Draft<'a> {
    dictionary: &'a AttrDictionary,
    printer: &'a PrinterDescription,
    job: AttrGroup,
    media: MediaSelection,
    skipped: Vec<SkippedOption>,
}

impl<'a> Draft<'a> {
    /// Dictionary attribute for a keyword the builder emits itself.
    fn native(&self, keyword: &str, fallback: SyntaxKind) -> Attribute {
        self.dictionary
            .get(keyword)
            .cloned()
            .unwrap_or_else(|| Attribute::new(keyword, fallback))
    }

    /// Validate and set (replacing) one job attribute. Enum and keyword
    /// values may list several comma-separated values.
    fn put(&mut self, attribute: Attribute, value: &str) {
        let syntax = attribute.syntax();
        let mut values: Vec<&str> = if matches!(syntax, SyntaxKind::Enum | SyntaxKind::Keyword) {
            value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect()
        } else {
            vec![value]
        };
        if values.is_empty() {
            values.push(value);
        }

        for v in &values {
            if let Err(error) = syntax.encode(v, MessageCharset::Utf8) {
                warn!(keyword = attribute.keyword(), value, error = %error, "option value does not encode; skipped");
                self.skipped.push(SkippedOption {
                    keyword: attribute.keyword().to_string(),
                    value: value.to_string(),
                    reason: SkipReason::Malformed(error),
                });
                return;
            }
        }

        let mut attr_value = AttrValue::new(attribute);
        for v in values {
            attr_value.push(v);
        }
        self.job.set_value(attr_value);
    }

    fn skip(&mut self, keyword: &str, value: &str, reason: SkipReason) {
        match &reason {
            SkipReason::NoFinishing => debug!(keyword, "finishing set to none; nothing to send"),
            _ if is_finishing(keyword) => {
                error!(keyword, value, reason = ?reason, "finishing option cannot be honoured; printing without it")
            }
            _ => warn!(keyword, value, reason = ?reason, "option skipped"),
        }
        self.skipped.push(SkippedOption {
            keyword: keyword.to_string(),
            value: value.to_string(),
            reason,
        });
    }

    fn resolve(&self, keyword: &str, value: &str, options: &OptionMap, rules: RuleChain<'_>) -> Resolution {
        let printer = self.printer;
        let substitute = rules.substitution(keyword, value, options).map(|rule| {
            debug!(rule = %rule.name, keyword, from = value, to = %rule.substitute, "substitution rule applied");
            rule.substitute.as_str()
        });

        if let Some(ppd) = printer.ppd_option(keyword) {
            let choice = substitute.unwrap_or_else(|| ppd.choice_for(value));
            return Resolution::Target(
                Attribute::new(&ppd.ppd_keyword, SyntaxKind::Keyword),
                choice.to_string(),
            );
        }

        match self.dictionary.get(keyword) {
            Some(attr) if attr.syntax() == SyntaxKind::Collection => Resolution::Unresolved,
            Some(_) if !printer.supports(keyword) => Resolution::Unsupported,
            Some(attr) => Resolution::Target(attr.clone(), substitute.unwrap_or(value).to_string()),
            None => Resolution::Unresolved,
        }
    }

    fn apply_options(&mut self, options: &OptionMap, rules: RuleChain<'_>) {
        for (keyword, value) in options {
            if keyword == MEDIA || keyword == MEDIA_SOURCE {
                let value = rules
                    .substitution(keyword, value, options)
                    .map_or(value.as_str(), |rule| rule.substitute.as_str());
                self.media.set(keyword, value);
                continue;
            }

            match self.resolve(keyword, value, options, rules) {
                Resolution::Target(attribute, value) => self.put(attribute, &value),
                Resolution::Unsupported => self.skip(keyword, value, SkipReason::Unsupported),
                Resolution::Unresolved if is_finishing(keyword) && value == "none" => {
                    self.skip(keyword, value, SkipReason::NoFinishing)
                }
                Resolution::Unresolved => self.skip(keyword, value, SkipReason::Unresolved),
            }
        }
    }

    fn apply_chunk_media(&mut self, request: &PrintRequest) {
        let Some(chunk) = &request.chunk else {
            return;
        };
        if let Some(media) = &chunk.media {
            self.media.media = Some(media.clone());
        }
        if let Some(source) = &chunk.media_source {
            self.media.source = Some(source.clone());
        }
    }

    /// Returns whether the job is to be treated as landscape. A rule can
    /// add the flag but never clears a landscape orientation that ends up
    /// in the request.
    fn apply_number_up(&mut self, request: &PrintRequest, rules: RuleChain<'_>) -> bool {
        let requested = request.options.get(ORIENTATION_REQUESTED).map(String::as_str);
        let number_up = request.options.get(NUMBER_UP).map_or("1", String::as_str);
        let Some(rule) = rules.number_up(&request.orientation, number_up) else {
            return is_landscape(requested);
        };

        debug!(rule = %rule.name, number_up, "n-up rule applied");
        if let Some(orientation) = &rule.orientation_requested {
            let attribute = self.native(ORIENTATION_REQUESTED, SyntaxKind::Enum);
            self.put(attribute, orientation);
        }
        if let Some(layout) = &rule.number_up_layout {
            let attribute = self.native(NUMBER_UP_LAYOUT, SyntaxKind::Keyword);
            self.put(attribute, layout);
        }
        let orientation = rule.orientation_requested.as_deref().or(requested);
        rule.landscape_perceived || is_landscape(orientation)
    }

    fn apply_fit_to_page(&mut self, fit_to_page: Option<bool>) {
        let Some(fit) = fit_to_page else {
            return;
        };
        let printer = self.printer;
        if printer.supports(PRINT_SCALING) {
            let value = if fit { "fit" } else { "none" };
            match printer.ppd_option(PRINT_SCALING) {
                Some(ppd) => self.put(
                    Attribute::new(&ppd.ppd_keyword, SyntaxKind::Keyword),
                    ppd.choice_for(value),
                ),
                None => {
                    let attribute = self.native(PRINT_SCALING, SyntaxKind::Keyword);
                    self.put(attribute, value);
                }
            }
        } else {
            let attribute = self.native(FIT_TO_PAGE, SyntaxKind::Boolean);
            self.put(attribute, if fit { "true" } else { "false" });
        }
    }

    /// Spoolers that cannot collate in hardware get their substitute value
    /// even when collation was only implied by multiple copies.
    fn apply_collation(&mut self, request: &PrintRequest, rules: RuleChain<'_>) {
        if !rules.has_substitutions()
            || request.options.contains_key(SHEET_COLLATE)
            || request.copies <= 1
        {
            return;
        }
        let mut probe = request.options.clone();
        probe.insert(SHEET_COLLATE.to_string(), "collated".to_string());
        let Some(rule) = rules.substitution(SHEET_COLLATE, "collated", &probe) else {
            return;
        };
        if rule.substitute == "collated" {
            return;
        }

        debug!(rule = %rule.name, value = %rule.substitute, "collation substituted");
        let printer = self.printer;
        let attribute = match printer.ppd_option(SHEET_COLLATE) {
            Some(ppd) => Attribute::new(&ppd.ppd_keyword, SyntaxKind::Keyword),
            None => self.native(SHEET_COLLATE, SyntaxKind::Keyword),
        };
        self.put(attribute, &rule.substitute);
    }

    /// Every matching rule applies, but the first one to name a keyword
    /// owns it.
    fn apply_extras(&mut self, options: &OptionMap, rules: RuleChain<'_>) {
        let dictionary = self.dictionary;
        let printer = self.printer;
        let mut owned: HashSet<&str> = HashSet::new();

        for rule in rules.extras(options) {
            for extra in &rule.extras {
                if !owned.insert(extra.keyword.as_str()) {
                    debug!(rule = %rule.name, keyword = %extra.keyword, "keyword already set by an earlier extra rule");
                    continue;
                }
                debug!(rule = %rule.name, keyword = %extra.keyword, value = %extra.value, "extra rule applied");

                if self.media.set(&extra.keyword, &extra.value) {
                    continue;
                }
                if let Some(ppd) = printer.ppd_option(&extra.keyword) {
                    self.put(
                        Attribute::new(&ppd.ppd_keyword, SyntaxKind::Keyword),
                        ppd.choice_for(&extra.value),
                    );
                    continue;
                }
                match dictionary.get(&extra.keyword) {
                    Some(attr) if attr.syntax() != SyntaxKind::Collection => {
                        self.put(attr.clone(), &extra.value)
                    }
                    _ if printer.ppd_injection => self.put(
                        Attribute::new(&extra.keyword, SyntaxKind::Keyword),
                        &extra.value,
                    ),
                    _ => self.skip(
                        &extra.keyword,
                        &extra.value,
                        SkipReason::UnknownExtra {
                            rule: rule.name.clone(),
                        },
                    ),
                }
            }
        }
    }
}
