// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP attribute syntax codec (RFC 8010 §3.9, RFC 8011 §5.1).
//
// Every attribute value travels in its string form through the model and is
// only turned into bytes here.  Each syntax fixes its own on-wire shape:
//
//   boolean            1 byte, 0x00 / 0x01
//   integer, enum      4 bytes, signed big-endian
//   keyword, uri, ...  US-ASCII, whatever the message charset
//   name, text         message charset
//   dateTime           11 bytes (RFC 2579 DateAndTime)
//   resolution         9 bytes: cross-feed, feed, unit
//   rangeOfInteger     8 bytes: lower, upper
//   octetString        raw bytes
//   out-of-band        no bytes at all

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike};

use pressgang_core::error::{DecodeError, EncodeError};

use crate::tag::*;

/// Canonical string form of an IPP dateTime value.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Resolution unit tag for dots per inch.
pub const UNITS_DPI: u8 = 3;

/// Resolution unit tag for dots per centimetre.
pub const UNITS_DPC: u8 = 4;

/// Largest value (or name) a single IPP length field can describe.
const MAX_VALUE_LEN: usize = u16::MAX as usize;

/// Language written for `*WithLanguage` values we encode.
const DEFAULT_LANGUAGE: &str = "en";

/// Character set of the message, as declared in `attributes-charset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageCharset {
    #[default]
    Utf8,
    UsAscii,
    Latin1,
}

impl MessageCharset {
    /// IANA name, as written into `attributes-charset`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::UsAscii => "us-ascii",
            Self::Latin1 => "iso-8859-1",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "us-ascii" | "ascii" => Some(Self::UsAscii),
            "iso-8859-1" | "latin1" => Some(Self::Latin1),
            _ => None,
        }
    }

    fn encode(&self, syntax: &'static str, value: &str) -> Result<Vec<u8>, EncodeError> {
        let unrepresentable = || EncodeError::Unrepresentable {
            syntax,
            value: value.to_string(),
            charset: self.name(),
        };
        match self {
            Self::Utf8 => Ok(value.as_bytes().to_vec()),
            Self::UsAscii => {
                if value.is_ascii() {
                    Ok(value.as_bytes().to_vec())
                } else {
                    Err(unrepresentable())
                }
            }
            Self::Latin1 => value
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| unrepresentable()))
                .collect(),
        }
    }

    fn decode(&self, syntax: &'static str, bytes: &[u8]) -> Result<String, DecodeError> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| DecodeError::InvalidValue {
                syntax,
                reason: e.to_string(),
            }),
            Self::UsAscii => decode_ascii(syntax, bytes),
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// The three out-of-band values RFC 8010 §3.8 defines for Print-Job paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfBand {
    Unsupported,
    Unknown,
    NoValue,
}

impl OutOfBand {
    pub fn value_tag(&self) -> u8 {
        match self {
            Self::Unsupported => VALUE_TAG_UNSUPPORTED,
            Self::Unknown => VALUE_TAG_UNKNOWN,
            Self::NoValue => VALUE_TAG_NO_VALUE,
        }
    }
}

/// An IPP attribute syntax together with its encoding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxKind {
    Boolean,
    Integer,
    Enum,
    Keyword,
    Uri,
    UriScheme,
    Charset,
    NaturalLanguage,
    MimeMediaType,
    MemberAttrName,
    Name,
    Text,
    NameWithLanguage,
    TextWithLanguage,
    DateTime,
    Resolution,
    RangeOfInteger,
    /// Raw bytes. The maximum length is documentation only; see
    /// [`SyntaxKind::exceeds_max_len`].
    OctetString { max_len: Option<u16> },
    OutOfBand(OutOfBand),
    Collection,
}

impl SyntaxKind {
    /// Construct an out-of-band syntax from its value tag.
    ///
    /// Only `unsupported`, `unknown` and `no-value` are accepted; any other
    /// tag is a construction error.
    pub fn out_of_band(tag: u8) -> Result<Self, EncodeError> {
        let oob = match tag {
            VALUE_TAG_UNSUPPORTED => OutOfBand::Unsupported,
            VALUE_TAG_UNKNOWN => OutOfBand::Unknown,
            VALUE_TAG_NO_VALUE => OutOfBand::NoValue,
            other => return Err(EncodeError::InvalidOutOfBandTag(other)),
        };
        Ok(Self::OutOfBand(oob))
    }

    /// The value tag written in front of every value of this syntax.
    pub fn value_tag(&self) -> u8 {
        match self {
            Self::Boolean => VALUE_TAG_BOOLEAN,
            Self::Integer => VALUE_TAG_INTEGER,
            Self::Enum => VALUE_TAG_ENUM,
            Self::Keyword => VALUE_TAG_KEYWORD,
            Self::Uri => VALUE_TAG_URI,
            Self::UriScheme => VALUE_TAG_URI_SCHEME,
            Self::Charset => VALUE_TAG_CHARSET,
            Self::NaturalLanguage => VALUE_TAG_NATURAL_LANGUAGE,
            Self::MimeMediaType => VALUE_TAG_MIME_MEDIA_TYPE,
            Self::MemberAttrName => VALUE_TAG_MEMBER_ATTR_NAME,
            Self::Name => VALUE_TAG_NAME,
            Self::Text => VALUE_TAG_TEXT,
            Self::NameWithLanguage => VALUE_TAG_NAME_WITH_LANGUAGE,
            Self::TextWithLanguage => VALUE_TAG_TEXT_WITH_LANGUAGE,
            Self::DateTime => VALUE_TAG_DATE_TIME,
            Self::Resolution => VALUE_TAG_RESOLUTION,
            Self::RangeOfInteger => VALUE_TAG_RANGE_OF_INTEGER,
            Self::OctetString { .. } => VALUE_TAG_OCTET_STRING,
            Self::OutOfBand(oob) => oob.value_tag(),
            Self::Collection => VALUE_TAG_BEGIN_COLLECTION,
        }
    }

    /// Map a value tag read off the wire back to a syntax.
    ///
    /// Out-of-band tags other than the three modeled ones read as `unknown`;
    /// unassigned tags return `None`.
    pub fn from_value_tag(tag: u8) -> Option<Self> {
        let kind = match tag {
            VALUE_TAG_BOOLEAN => Self::Boolean,
            VALUE_TAG_INTEGER => Self::Integer,
            VALUE_TAG_ENUM => Self::Enum,
            VALUE_TAG_KEYWORD => Self::Keyword,
            VALUE_TAG_URI => Self::Uri,
            VALUE_TAG_URI_SCHEME => Self::UriScheme,
            VALUE_TAG_CHARSET => Self::Charset,
            VALUE_TAG_NATURAL_LANGUAGE => Self::NaturalLanguage,
            VALUE_TAG_MIME_MEDIA_TYPE => Self::MimeMediaType,
            VALUE_TAG_MEMBER_ATTR_NAME => Self::MemberAttrName,
            VALUE_TAG_NAME => Self::Name,
            VALUE_TAG_TEXT => Self::Text,
            VALUE_TAG_NAME_WITH_LANGUAGE => Self::NameWithLanguage,
            VALUE_TAG_TEXT_WITH_LANGUAGE => Self::TextWithLanguage,
            VALUE_TAG_DATE_TIME => Self::DateTime,
            VALUE_TAG_RESOLUTION => Self::Resolution,
            VALUE_TAG_RANGE_OF_INTEGER => Self::RangeOfInteger,
            VALUE_TAG_OCTET_STRING => Self::OctetString { max_len: None },
            VALUE_TAG_BEGIN_COLLECTION => Self::Collection,
            t if is_out_of_band_tag(t) => {
                Self::out_of_band(t).unwrap_or(Self::OutOfBand(OutOfBand::Unknown))
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Syntax name as used in RFC 8011, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Enum => "enum",
            Self::Keyword => "keyword",
            Self::Uri => "uri",
            Self::UriScheme => "uriScheme",
            Self::Charset => "charset",
            Self::NaturalLanguage => "naturalLanguage",
            Self::MimeMediaType => "mimeMediaType",
            Self::MemberAttrName => "memberAttrName",
            Self::Name => "name",
            Self::Text => "text",
            Self::NameWithLanguage => "nameWithLanguage",
            Self::TextWithLanguage => "textWithLanguage",
            Self::DateTime => "dateTime",
            Self::Resolution => "resolution",
            Self::RangeOfInteger => "rangeOfInteger",
            Self::OctetString { .. } => "octetString",
            Self::OutOfBand(_) => "out-of-band",
            Self::Collection => "collection",
        }
    }

    /// Whether `value` is longer than the declared octetString maximum.
    ///
    /// Encoding never enforces this; callers that care check first.
    pub fn exceeds_max_len(&self, value: &str) -> bool {
        match self {
            Self::OctetString { max_len: Some(max) } => value.len() > usize::from(*max),
            _ => false,
        }
    }

    /// Encode one value from its string form.
    pub fn encode(&self, value: &str, charset: MessageCharset) -> Result<Vec<u8>, EncodeError> {
        let bytes = match self {
            Self::Boolean => match value.trim() {
                "true" | "1" => vec![0x01],
                "false" | "0" => vec![0x00],
                _ => return Err(self.malformed(value, "expected true or false")),
            },
            Self::Integer | Self::Enum => self.parse_int(value)?.to_be_bytes().to_vec(),
            Self::Keyword
            | Self::Uri
            | Self::UriScheme
            | Self::Charset
            | Self::NaturalLanguage
            | Self::MimeMediaType
            | Self::MemberAttrName => MessageCharset::UsAscii.encode(self.name(), value)?,
            Self::Name | Self::Text => charset.encode(self.name(), value)?,
            Self::NameWithLanguage | Self::TextWithLanguage => {
                let text = charset.encode(self.name(), value)?;
                let mut buf = Vec::with_capacity(4 + DEFAULT_LANGUAGE.len() + text.len());
                put_short_string(&mut buf, DEFAULT_LANGUAGE.as_bytes())?;
                put_short_string(&mut buf, &text)?;
                buf
            }
            Self::DateTime => encode_date_time(value)?,
            Self::Resolution => encode_resolution(value)?,
            Self::RangeOfInteger => encode_range(value)?,
            Self::OctetString { .. } => value.as_bytes().to_vec(),
            Self::OutOfBand(_) => Vec::new(),
            Self::Collection => return Err(EncodeError::CollectionValue),
        };
        if bytes.len() > MAX_VALUE_LEN {
            return Err(EncodeError::ValueTooLong { len: bytes.len() });
        }
        Ok(bytes)
    }

    /// Decode one value into its string form.
    pub fn decode(&self, bytes: &[u8], charset: MessageCharset) -> Result<String, DecodeError> {
        match self {
            Self::Boolean => match self.fixed::<1>(bytes)? {
                [0x00] => Ok("false".into()),
                [0x01] => Ok("true".into()),
                [b] => Err(DecodeError::InvalidValue {
                    syntax: self.name(),
                    reason: format!("byte 0x{b:02x} is not a boolean"),
                }),
            },
            Self::Integer | Self::Enum => Ok(i32::from_be_bytes(self.fixed::<4>(bytes)?).to_string()),
            Self::Keyword
            | Self::Uri
            | Self::UriScheme
            | Self::Charset
            | Self::NaturalLanguage
            | Self::MimeMediaType
            | Self::MemberAttrName => decode_ascii(self.name(), bytes),
            Self::Name | Self::Text => charset.decode(self.name(), bytes),
            Self::NameWithLanguage | Self::TextWithLanguage => {
                let (_language, rest) = take_short_string(self.name(), bytes)?;
                let (text, _) = take_short_string(self.name(), rest)?;
                charset.decode(self.name(), text)
            }
            Self::DateTime => decode_date_time(&self.fixed::<11>(bytes)?),
            Self::Resolution => {
                let raw = self.fixed::<9>(bytes)?;
                let x = i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
                let y = i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
                let unit = match raw[8] {
                    UNITS_DPI => "DPI",
                    UNITS_DPC => "DPC",
                    other => {
                        return Err(DecodeError::InvalidValue {
                            syntax: self.name(),
                            reason: format!("unknown resolution unit {other}"),
                        });
                    }
                };
                Ok(format!("{x}x{y} {unit}"))
            }
            Self::RangeOfInteger => {
                let raw = self.fixed::<8>(bytes)?;
                let lower = i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
                let upper = i32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]);
                Ok(format!("{lower}:{upper}"))
            }
            Self::OctetString { .. } => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Self::OutOfBand(_) | Self::Collection => Ok(String::new()),
        }
    }

    fn fixed<const N: usize>(&self, bytes: &[u8]) -> Result<[u8; N], DecodeError> {
        bytes.try_into().map_err(|_| DecodeError::InvalidLength {
            syntax: self.name(),
            expected: N,
            actual: bytes.len(),
        })
    }

    fn parse_int(&self, value: &str) -> Result<i32, EncodeError> {
        value
            .trim()
            .parse::<i32>()
            .map_err(|e| self.malformed(value, &e.to_string()))
    }

    fn malformed(&self, value: &str, reason: &str) -> EncodeError {
        EncodeError::MalformedValue {
            syntax: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn decode_ascii(syntax: &'static str, bytes: &[u8]) -> Result<String, DecodeError> {
    if !bytes.is_ascii() {
        return Err(DecodeError::InvalidValue {
            syntax,
            reason: "non-ASCII bytes".into(),
        });
    }
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}

fn put_short_string(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), EncodeError> {
    let len = u16::try_from(bytes.len()).map_err(|_| EncodeError::ValueTooLong { len: bytes.len() })?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

fn take_short_string<'a>(
    syntax: &'static str,
    bytes: &'a [u8],
) -> Result<(&'a [u8], &'a [u8]), DecodeError> {
    let truncated = || DecodeError::InvalidValue {
        syntax,
        reason: "truncated language/text pair".into(),
    };
    let (len, rest) = bytes.split_first_chunk::<2>().ok_or_else(truncated)?;
    let len = usize::from(u16::from_be_bytes(*len));
    if rest.len() < len {
        return Err(truncated());
    }
    Ok(rest.split_at(len))
}

// ---------------------------------------------------------------------------
// dateTime
// ---------------------------------------------------------------------------

fn encode_date_time(value: &str) -> Result<Vec<u8>, EncodeError> {
    let malformed = |reason: String| EncodeError::MalformedValue {
        syntax: "dateTime",
        value: value.to_string(),
        reason,
    };
    let dt = DateTime::parse_from_str(value.trim(), DATE_TIME_FORMAT)
        .map_err(|e| malformed(e.to_string()))?;
    let year = u16::try_from(dt.year()).map_err(|_| malformed("year out of range".into()))?;
    // Leap seconds report nanoseconds past one second; clamp to the last tenth.
    let deciseconds = (dt.nanosecond() / 100_000_000).min(9) as u8;
    let offset = dt.offset().local_minus_utc();
    let direction = if offset < 0 { b'-' } else { b'+' };
    let offset = offset.unsigned_abs();

    let mut buf = Vec::with_capacity(11);
    buf.extend_from_slice(&year.to_be_bytes());
    buf.push(dt.month() as u8);
    buf.push(dt.day() as u8);
    buf.push(dt.hour() as u8);
    buf.push(dt.minute() as u8);
    buf.push(dt.second() as u8);
    buf.push(deciseconds);
    buf.push(direction);
    buf.push((offset / 3600) as u8);
    buf.push((offset % 3600 / 60) as u8);
    Ok(buf)
}

fn decode_date_time(raw: &[u8; 11]) -> Result<String, DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidValue {
        syntax: "dateTime",
        reason: reason.to_string(),
    };
    let year = i32::from(u16::from_be_bytes([raw[0], raw[1]]));
    let [month, day, hour, minute, second, decisecond, direction, off_h, off_m] = [
        raw[2], raw[3], raw[4], raw[5], raw[6], raw[7], raw[8], raw[9], raw[10],
    ];
    if decisecond > 9 {
        return Err(invalid("decisecond out of range"));
    }
    let sign = match direction {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(invalid("UTC direction must be '+' or '-'")),
    };
    let naive = NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
        .and_then(|d| {
            d.and_hms_milli_opt(
                u32::from(hour),
                u32::from(minute),
                u32::from(second),
                u32::from(decisecond) * 100,
            )
        })
        .ok_or_else(|| invalid("calendar fields out of range"))?;
    let offset = FixedOffset::east_opt(sign * (i32::from(off_h) * 3600 + i32::from(off_m) * 60))
        .ok_or_else(|| invalid("UTC offset out of range"))?;
    let dt = offset
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| invalid("ambiguous local time"))?;
    Ok(dt.format(DATE_TIME_FORMAT).to_string())
}

// ---------------------------------------------------------------------------
// resolution / rangeOfInteger
// ---------------------------------------------------------------------------

fn encode_resolution(value: &str) -> Result<Vec<u8>, EncodeError> {
    let malformed = |reason: &str| EncodeError::MalformedValue {
        syntax: "resolution",
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let (dims, unit) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| malformed("expected '<x>x<y> DPI|DPC'"))?;
    let (x, y) = dims
        .split_once('x')
        .ok_or_else(|| malformed("expected '<x>x<y>'"))?;
    let x: i32 = x.parse().map_err(|_| malformed("cross-feed is not an integer"))?;
    let y: i32 = y.parse().map_err(|_| malformed("feed is not an integer"))?;
    let unit = match unit.trim().to_ascii_uppercase().as_str() {
        "DPI" => UNITS_DPI,
        "DPC" | "DPCM" => UNITS_DPC,
        _ => return Err(malformed("unit must be DPI or DPC")),
    };
    let mut buf = Vec::with_capacity(9);
    buf.extend_from_slice(&x.to_be_bytes());
    buf.extend_from_slice(&y.to_be_bytes());
    buf.push(unit);
    Ok(buf)
}

fn encode_range(value: &str) -> Result<Vec<u8>, EncodeError> {
    let parts: Vec<&str> = value.split(':').collect();
    let [lower, upper] = parts.as_slice() else {
        return Err(EncodeError::MalformedRange(value.to_string()));
    };
    let parse = |s: &str| {
        s.trim()
            .parse::<i32>()
            .map_err(|_| EncodeError::MalformedRange(value.to_string()))
    };
    let mut buf = Vec::with_capacity(8);
    buf.extend_from_slice(&parse(*lower)?.to_be_bytes());
    buf.extend_from_slice(&parse(*upper)?.to_be_bytes());
    Ok(buf)
}
