// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP wire constants: delimiter tags, value tags, operation ids, status codes.

// ---------------------------------------------------------------------------
// IPP delimiter tags (RFC 8010 §3.5.1)
// ---------------------------------------------------------------------------

/// Operation attributes group delimiter.
pub const TAG_OPERATION_ATTRIBUTES: u8 = 0x01;

/// Job attributes group delimiter.
pub const TAG_JOB_ATTRIBUTES: u8 = 0x02;

/// End-of-attributes-tag -- terminates the attribute section.
pub const TAG_END_OF_ATTRIBUTES: u8 = 0x03;

/// Printer attributes group delimiter.
pub const TAG_PRINTER_ATTRIBUTES: u8 = 0x04;

/// Unsupported attributes group delimiter.
pub const TAG_UNSUPPORTED_ATTRIBUTES: u8 = 0x05;

/// Subscription attributes group delimiter (RFC 3995).
pub const TAG_SUBSCRIPTION_ATTRIBUTES: u8 = 0x06;

/// Event notification attributes group delimiter (RFC 3995).
pub const TAG_EVENT_NOTIFICATION_ATTRIBUTES: u8 = 0x07;

/// Delimiter tags occupy `0x00..=0x0F`.
pub fn is_delimiter_tag(tag: u8) -> bool {
    tag <= 0x0F
}

// ---------------------------------------------------------------------------
// IPP value tags (RFC 8010 §3.5.2)
// ---------------------------------------------------------------------------

pub const VALUE_TAG_UNSUPPORTED: u8 = 0x10;
pub const VALUE_TAG_UNKNOWN: u8 = 0x12;
pub const VALUE_TAG_NO_VALUE: u8 = 0x13;
pub const VALUE_TAG_INTEGER: u8 = 0x21;
pub const VALUE_TAG_BOOLEAN: u8 = 0x22;
pub const VALUE_TAG_ENUM: u8 = 0x23;
pub const VALUE_TAG_OCTET_STRING: u8 = 0x30;
pub const VALUE_TAG_DATE_TIME: u8 = 0x31;
pub const VALUE_TAG_RESOLUTION: u8 = 0x32;
pub const VALUE_TAG_RANGE_OF_INTEGER: u8 = 0x33;
pub const VALUE_TAG_BEGIN_COLLECTION: u8 = 0x34;
pub const VALUE_TAG_TEXT_WITH_LANGUAGE: u8 = 0x35;
pub const VALUE_TAG_NAME_WITH_LANGUAGE: u8 = 0x36;
pub const VALUE_TAG_END_COLLECTION: u8 = 0x37;
pub const VALUE_TAG_TEXT: u8 = 0x41;
pub const VALUE_TAG_NAME: u8 = 0x42;
pub const VALUE_TAG_KEYWORD: u8 = 0x44;
pub const VALUE_TAG_URI: u8 = 0x45;
pub const VALUE_TAG_URI_SCHEME: u8 = 0x46;
pub const VALUE_TAG_CHARSET: u8 = 0x47;
pub const VALUE_TAG_NATURAL_LANGUAGE: u8 = 0x48;
pub const VALUE_TAG_MIME_MEDIA_TYPE: u8 = 0x49;
pub const VALUE_TAG_MEMBER_ATTR_NAME: u8 = 0x4A;

/// Out-of-band tags carry no value bytes.
pub fn is_out_of_band_tag(tag: u8) -> bool {
    (0x10..=0x1F).contains(&tag)
}

// ---------------------------------------------------------------------------
// IPP operation IDs (RFC 8011 §4)
// ---------------------------------------------------------------------------

/// Print-Job operation identifier.
pub const OP_PRINT_JOB: u16 = 0x0002;

/// Validate-Job operation identifier.
pub const OP_VALIDATE_JOB: u16 = 0x0004;

/// Get-Printer-Attributes operation identifier.
pub const OP_GET_PRINTER_ATTRIBUTES: u16 = 0x000B;

// ---------------------------------------------------------------------------
// IPP status codes (RFC 8011 §4.1.8)
// ---------------------------------------------------------------------------

/// Successful completion.
pub const STATUS_OK: u16 = 0x0000;

/// The request succeeded but some attributes were ignored or substituted.
pub const STATUS_OK_IGNORED_OR_SUBSTITUTED: u16 = 0x0001;

/// Client sent a malformed request.
pub const STATUS_CLIENT_ERROR_BAD_REQUEST: u16 = 0x0400;

/// The target object (printer, job) was not found.
pub const STATUS_CLIENT_ERROR_NOT_FOUND: u16 = 0x0406;

/// Internal server error.
pub const STATUS_SERVER_ERROR_INTERNAL: u16 = 0x0500;

/// Status codes `0x0000..=0x00FF` are the successful family.
pub fn is_successful(status: u16) -> bool {
    status <= 0x00FF
}
