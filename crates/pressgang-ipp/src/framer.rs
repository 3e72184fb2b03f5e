// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP message framing (RFC 8010 §3).
//
// ```text
// version-number:  2 bytes (major, minor)
// operation-id:    2 bytes (status-code in responses)
// request-id:      4 bytes
// attribute-groups:
//   delimiter-tag: 1 byte
//   attributes:
//     value-tag:    1 byte
//     name-length:  2 bytes   (0 for additional values of a 1setOf)
//     name:         name-length bytes
//     value-length: 2 bytes
//     value:        value-length bytes
// end-of-attributes-tag: 1 byte (0x03)
// document-data: remainder
// ```
//
// Collections (RFC 8010 §3.1.6) are written as
//
// ```text
// begCollection(0x34)  name=<attr>  value=""
//   memberAttrName(0x4a) name=""    value=<member>
//   <member value>       name=""    value=...
//   ...
// endCollection(0x37)  name=""      value=""
// ```

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::Bytes;
use tracing::{debug, warn};

use pressgang_core::error::{DecodeError, EncodeError};

use crate::dictionary::ATTRIBUTES_CHARSET;
use crate::model::{AttrCollection, AttrContainer, AttrGroup, AttrValue, GroupTag, IppVersion, Message};
use crate::syntax::{MessageCharset, SyntaxKind};
use crate::tag::*;

// ---------------------------------------------------------------------------
// Request ids
// ---------------------------------------------------------------------------

/// Hands out request-ids for one client instance.
///
/// Pre-increments, so the first id is 1; 0 is skipped on wrap-around.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    last: AtomicU32,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator whose next id is `last + 1`.
    pub fn starting_after(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    pub fn next(&self) -> u32 {
        loop {
            let id = self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if id != 0 {
                return id;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// An attribute that was left out of a framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedAttribute {
    /// Keyword, or `collection/member` path for collection members.
    pub keyword: String,
    pub error: EncodeError,
}

/// Wire bytes of one message plus what had to be dropped to produce them.
#[derive(Debug, Clone)]
pub struct FramedMessage {
    pub bytes: Bytes,
    pub request_id: u32,
    pub rejected: Vec<RejectedAttribute>,
}

impl FramedMessage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Serialises attribute groups into the IPP binary encoding.
///
/// An attribute whose value cannot be encoded is dropped on its own; the
/// rest of the message is still written.
#[derive(Debug, Clone, Copy, Default)]
pub struct IppWriter {
    version: IppVersion,
}

impl IppWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: IppVersion) -> Self {
        Self { version }
    }

    /// Frame a request (operation-id) or response (status-code).
    pub fn write(
        &self,
        code: u16,
        request_id: u32,
        groups: &[AttrGroup],
        charset: MessageCharset,
    ) -> FramedMessage {
        let mut buf = Vec::with_capacity(512);
        buf.push(self.version.major);
        buf.push(self.version.minor);
        buf.extend_from_slice(&code.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());

        let mut rejected = Vec::new();
        for group in groups {
            buf.push(group.tag().tag());

            for value in group.values() {
                match encode_attribute(value, charset) {
                    Ok(bytes) => buf.extend_from_slice(&bytes),
                    Err(error) => reject(&mut rejected, value.keyword().to_string(), error),
                }
            }

            let mut previous: Option<&str> = None;
            for collection in group.collections() {
                // Consecutive collections with one name form a 1setOf.
                let name = if previous == Some(collection.name()) {
                    ""
                } else {
                    collection.name()
                };
                match encode_collection(name, collection, collection.name(), charset, &mut rejected) {
                    Ok(bytes) => buf.extend_from_slice(&bytes),
                    Err(error) => reject(&mut rejected, collection.name().to_string(), error),
                }
                previous = Some(collection.name());
            }
        }
        buf.push(TAG_END_OF_ATTRIBUTES);

        FramedMessage {
            bytes: Bytes::from(buf),
            request_id,
            rejected,
        }
    }

    /// Frame a whole [`Message`], keeping its own request-id.
    pub fn write_message(&self, message: &Message, charset: MessageCharset) -> FramedMessage {
        let mut framed = self.write(message.code, message.request_id, &message.groups, charset);
        if let Some(document) = &message.document {
            let mut buf = Vec::with_capacity(framed.bytes.len() + document.len());
            buf.extend_from_slice(&framed.bytes);
            buf.extend_from_slice(document);
            framed.bytes = Bytes::from(buf);
        }
        framed
    }
}

fn reject(rejected: &mut Vec<RejectedAttribute>, keyword: String, error: EncodeError) {
    warn!(keyword = %keyword, error = %error, "dropping attribute that failed to encode");
    rejected.push(RejectedAttribute { keyword, error });
}

/// Append one `value-tag name value` triple.
fn put_attr(buf: &mut Vec<u8>, value_tag: u8, name: &str, value: &[u8]) -> Result<(), EncodeError> {
    let name_len =
        u16::try_from(name.len()).map_err(|_| EncodeError::NameTooLong(name.to_string()))?;
    let value_len =
        u16::try_from(value.len()).map_err(|_| EncodeError::ValueTooLong { len: value.len() })?;
    buf.push(value_tag);
    buf.extend_from_slice(&name_len.to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(&value_len.to_be_bytes());
    buf.extend_from_slice(value);
    Ok(())
}

/// Encoded values of an attribute; an out-of-band attribute always has one.
fn encoded_values(value: &AttrValue, charset: MessageCharset) -> Result<Vec<Vec<u8>>, EncodeError> {
    let syntax = value.syntax();
    if syntax == SyntaxKind::Collection {
        return Err(EncodeError::CollectionValue);
    }
    if value.values().is_empty() {
        if matches!(syntax, SyntaxKind::OutOfBand(_)) {
            return Ok(vec![Vec::new()]);
        }
        debug!(keyword = value.keyword(), "attribute has no values; not written");
    }
    value
        .values()
        .iter()
        .map(|v| syntax.encode(v, charset))
        .collect()
}

fn encode_attribute(value: &AttrValue, charset: MessageCharset) -> Result<Vec<u8>, EncodeError> {
    let tag = value.syntax().value_tag();
    let mut buf = Vec::new();
    for (i, bytes) in encoded_values(value, charset)?.iter().enumerate() {
        let name = if i == 0 { value.keyword() } else { "" };
        put_attr(&mut buf, tag, name, bytes)?;
    }
    Ok(buf)
}

fn encode_member(value: &AttrValue, charset: MessageCharset) -> Result<Vec<u8>, EncodeError> {
    let tag = value.syntax().value_tag();
    let encoded = encoded_values(value, charset)?;
    let mut buf = Vec::new();
    if !encoded.is_empty() {
        put_attr(&mut buf, VALUE_TAG_MEMBER_ATTR_NAME, "", value.keyword().as_bytes())?;
    }
    for bytes in &encoded {
        put_attr(&mut buf, tag, "", bytes)?;
    }
    Ok(buf)
}

fn encode_collection(
    name: &str,
    collection: &AttrCollection,
    path: &str,
    charset: MessageCharset,
    rejected: &mut Vec<RejectedAttribute>,
) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    put_attr(&mut buf, VALUE_TAG_BEGIN_COLLECTION, name, b"")?;

    for value in collection.values() {
        match encode_member(value, charset) {
            Ok(bytes) => buf.extend_from_slice(&bytes),
            Err(error) => reject(rejected, format!("{path}/{}", value.keyword()), error),
        }
    }

    let mut previous: Option<&str> = None;
    for nested in collection.collections() {
        let nested_path = format!("{path}/{}", nested.name());
        let mut member = Vec::new();
        if previous != Some(nested.name()) {
            put_attr(&mut member, VALUE_TAG_MEMBER_ATTR_NAME, "", nested.name().as_bytes())?;
        }
        match encode_collection("", nested, &nested_path, charset, rejected) {
            Ok(bytes) => {
                buf.extend_from_slice(&member);
                buf.extend_from_slice(&bytes);
            }
            Err(error) => reject(rejected, nested_path, error),
        }
        previous = Some(nested.name());
    }

    put_attr(&mut buf, VALUE_TAG_END_COLLECTION, "", b"")?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Result of reading a message: whatever was parsed, plus the error that
/// stopped parsing early, if any.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub message: Message,
    pub error: Option<DecodeError>,
}

impl ReadOutcome {
    pub fn into_result(self) -> Result<Message, DecodeError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.message),
        }
    }
}

/// Parse an IPP message from its binary encoding.
///
/// Values are decoded into their string form. Out-of-band values are
/// accepted with zero length. Bytes after the end-of-attributes tag are kept
/// as the document.
pub fn read_message(data: &[u8]) -> ReadOutcome {
    if data.len() < 8 {
        return ReadOutcome {
            message: Message::new(0),
            error: Some(DecodeError::Truncated("message header")),
        };
    }

    let mut message = Message::new(u16::from_be_bytes([data[2], data[3]]));
    message.version = IppVersion {
        major: data[0],
        minor: data[1],
    };
    message.request_id = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

    let mut reader = Reader::new(data);
    let error = reader.run().err();
    if let Some(err) = &error {
        debug!(error = %err, offset = reader.pos, "IPP message parse stopped early");
    }

    let (groups, document) = reader.finish();
    message.groups = groups;
    message.document = document;
    ReadOutcome { message, error }
}

struct Frame {
    collection: AttrCollection,
    /// Set by a memberAttrName, consumed by the next value.
    member: Option<String>,
    /// Last member name, for additional values of a 1setOf member.
    last_member: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            collection: AttrCollection::new(name),
            member: None,
            last_member: String::new(),
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    charset: MessageCharset,
    groups: Vec<AttrGroup>,
    group: Option<AttrGroup>,
    stack: Vec<Frame>,
    last_name: String,
    end: bool,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 8,
            charset: MessageCharset::default(),
            groups: Vec::new(),
            group: None,
            stack: Vec::new(),
            last_name: String::new(),
            end: false,
        }
    }

    fn run(&mut self) -> Result<(), DecodeError> {
        while self.pos < self.data.len() {
            let tag = self.data[self.pos];
            self.pos += 1;

            if is_delimiter_tag(tag) {
                if let Some(frame) = self.stack.last() {
                    return Err(DecodeError::UnbalancedCollection(format!(
                        "'{}' not closed before group delimiter",
                        frame.collection.name()
                    )));
                }
                self.flush_group();
                if tag == TAG_END_OF_ATTRIBUTES {
                    self.end = true;
                    return Ok(());
                }
                let group = GroupTag::from_tag(tag).ok_or(DecodeError::UnexpectedTag(tag))?;
                self.group = Some(AttrGroup::new(group));
                self.last_name.clear();
                continue;
            }

            let name_len = usize::from(self.read_u16("name-length")?);
            let name = String::from_utf8_lossy(self.take(name_len, "attribute name")?).into_owned();
            let value_len = usize::from(self.read_u16("value-length")?);
            let raw = self.take(value_len, "attribute value")?;
            self.attribute(tag, name, raw)?;
        }
        Err(DecodeError::Truncated("end-of-attributes tag missing"))
    }

    fn read_u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let data: &'a [u8] = self.data;
        let slice = data
            .get(self.pos..self.pos + len)
            .ok_or(DecodeError::Truncated(what))?;
        self.pos += len;
        Ok(slice)
    }

    fn attribute(&mut self, tag: u8, name: String, raw: &[u8]) -> Result<(), DecodeError> {
        match tag {
            VALUE_TAG_BEGIN_COLLECTION => return self.open_collection(name),
            VALUE_TAG_END_COLLECTION => return self.close_collection(),
            VALUE_TAG_MEMBER_ATTR_NAME => return self.member_name(raw),
            _ => {}
        }

        let syntax = SyntaxKind::from_value_tag(tag).unwrap_or_else(|| {
            debug!(tag, "unassigned value tag; keeping raw bytes");
            SyntaxKind::OctetString { max_len: None }
        });
        let value = syntax.decode(raw, self.charset)?;

        if self.stack.is_empty() && name == ATTRIBUTES_CHARSET {
            match MessageCharset::from_name(&value) {
                Some(charset) => self.charset = charset,
                None => debug!(charset = %value, "unsupported charset; decoding as utf-8"),
            }
        }

        let (container, keyword, additional) = self.target(name)?;
        if additional {
            if let Some(last) = container.last_value_mut() {
                if last.keyword() == keyword && last.syntax() == syntax {
                    last.push(value);
                    return Ok(());
                }
            }
        }
        container.push_value(AttrValue::of(&keyword, syntax, value));
        Ok(())
    }

    /// Where the next value lands, under which keyword, and whether it is an
    /// additional value of the previous attribute.
    fn target(&mut self, name: String) -> Result<(&mut dyn AttrContainer, String, bool), DecodeError> {
        if let Some(frame) = self.stack.last_mut() {
            return Ok(match frame.member.take() {
                Some(member) => {
                    frame.last_member = member.clone();
                    (&mut frame.collection as &mut dyn AttrContainer, member, false)
                }
                None => {
                    let keyword = frame.last_member.clone();
                    (&mut frame.collection as &mut dyn AttrContainer, keyword, true)
                }
            });
        }

        let group = self
            .group
            .as_mut()
            .ok_or_else(|| DecodeError::OutsideGroup(name.clone()))?;
        if name.is_empty() {
            if self.last_name.is_empty() {
                return Err(DecodeError::InvalidValue {
                    syntax: "name",
                    reason: "additional value without a preceding attribute".into(),
                });
            }
            Ok((group as &mut dyn AttrContainer, self.last_name.clone(), true))
        } else {
            self.last_name = name.clone();
            Ok((group as &mut dyn AttrContainer, name, false))
        }
    }

    fn open_collection(&mut self, name: String) -> Result<(), DecodeError> {
        let (_, keyword, _) = self.target(name)?;
        self.stack.push(Frame::new(keyword));
        Ok(())
    }

    fn close_collection(&mut self) -> Result<(), DecodeError> {
        let frame = self.stack.pop().ok_or_else(|| {
            DecodeError::UnbalancedCollection("endCollection without begCollection".into())
        })?;
        match self.stack.last_mut() {
            Some(parent) => parent.collection.push_collection(frame.collection),
            None => match self.group.as_mut() {
                Some(group) => group.push_collection(frame.collection),
                None => return Err(DecodeError::OutsideGroup(frame.collection.name().to_string())),
            },
        }
        Ok(())
    }

    fn member_name(&mut self, raw: &[u8]) -> Result<(), DecodeError> {
        let frame = self
            .stack
            .last_mut()
            .ok_or(DecodeError::UnexpectedTag(VALUE_TAG_MEMBER_ATTR_NAME))?;
        frame.member = Some(SyntaxKind::MemberAttrName.decode(raw, MessageCharset::UsAscii)?);
        Ok(())
    }

    fn flush_group(&mut self) {
        if let Some(group) = self.group.take() {
            self.groups.push(group);
        }
    }

    /// Parsed groups and trailing document; unfinished collections are lost.
    fn finish(mut self) -> (Vec<AttrGroup>, Option<Bytes>) {
        self.flush_group();
        let document = if self.end && self.pos < self.data.len() {
            Some(Bytes::copy_from_slice(&self.data[self.pos..]))
        } else {
            None
        };
        (self.groups, document)
    }
}
