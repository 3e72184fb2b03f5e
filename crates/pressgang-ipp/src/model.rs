// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory IPP attribute model, independent of the wire format.
//
//   Message
//     └─ AttrGroup (operation / job / printer / ...)
//          ├─ AttrValue       keyword + syntax + ordered string values
//          └─ AttrCollection  named, nestable (media-col → media-size)
//
// Values are kept in their string form; the syntax codec turns them into
// bytes only when the message is framed.

use bytes::Bytes;

use crate::dictionary::Attribute;
use crate::syntax::SyntaxKind;
use crate::tag::*;

/// Attribute group delimiters a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupTag {
    Operation,
    Job,
    Printer,
    Unsupported,
    Subscription,
    EventNotification,
}

impl GroupTag {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Operation => TAG_OPERATION_ATTRIBUTES,
            Self::Job => TAG_JOB_ATTRIBUTES,
            Self::Printer => TAG_PRINTER_ATTRIBUTES,
            Self::Unsupported => TAG_UNSUPPORTED_ATTRIBUTES,
            Self::Subscription => TAG_SUBSCRIPTION_ATTRIBUTES,
            Self::EventNotification => TAG_EVENT_NOTIFICATION_ATTRIBUTES,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TAG_OPERATION_ATTRIBUTES => Some(Self::Operation),
            TAG_JOB_ATTRIBUTES => Some(Self::Job),
            TAG_PRINTER_ATTRIBUTES => Some(Self::Printer),
            TAG_UNSUPPORTED_ATTRIBUTES => Some(Self::Unsupported),
            TAG_SUBSCRIPTION_ATTRIBUTES => Some(Self::Subscription),
            TAG_EVENT_NOTIFICATION_ATTRIBUTES => Some(Self::EventNotification),
            _ => None,
        }
    }
}

/// IPP protocol version carried in the first two header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IppVersion {
    pub major: u8,
    pub minor: u8,
}

impl IppVersion {
    pub const V1_1: Self = Self { major: 1, minor: 1 };
    pub const V2_0: Self = Self { major: 2, minor: 0 };
}

impl Default for IppVersion {
    fn default() -> Self {
        Self::V1_1
    }
}

impl std::fmt::Display for IppVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// An attribute bound to one or more values, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrValue {
    attribute: Attribute,
    values: Vec<String>,
}

impl AttrValue {
    pub fn new(attribute: Attribute) -> Self {
        Self {
            attribute,
            values: Vec::new(),
        }
    }

    pub fn single(attribute: Attribute, value: impl Into<String>) -> Self {
        Self {
            attribute,
            values: vec![value.into()],
        }
    }

    /// Shorthand for an attribute not looked up in a dictionary.
    pub fn of(keyword: &str, syntax: SyntaxKind, value: impl Into<String>) -> Self {
        Self::single(Attribute::new(keyword, syntax), value)
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    pub fn keyword(&self) -> &str {
        self.attribute.keyword()
    }

    pub fn syntax(&self) -> SyntaxKind {
        self.attribute.syntax()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn first(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Shared accessors for anything holding values and nested collections.
macro_rules! impl_attr_container {
    ($ty:ty) => {
        impl $ty {
            pub fn values(&self) -> &[AttrValue] {
                &self.values
            }

            pub fn collections(&self) -> &[AttrCollection] {
                &self.collections
            }

            /// Append a value, even if one with the same keyword exists.
            pub fn add_value(&mut self, value: AttrValue) -> &mut Self {
                self.values.push(value);
                self
            }

            /// Replace every value with the same keyword, keeping the
            /// position of the first one (or appending).
            pub fn set_value(&mut self, value: AttrValue) -> &mut Self {
                match self.values.iter().position(|v| v.keyword() == value.keyword()) {
                    Some(pos) => {
                        let keyword = value.keyword().to_string();
                        self.values[pos] = value;
                        let mut index = 0;
                        self.values.retain(|v| {
                            let keep = index == pos || v.keyword() != keyword;
                            index += 1;
                            keep
                        });
                    }
                    None => self.values.push(value),
                }
                self
            }

            pub fn value(&self, keyword: &str) -> Option<&AttrValue> {
                self.values.iter().find(|v| v.keyword() == keyword)
            }

            /// First string value of the attribute, if present.
            pub fn first_value(&self, keyword: &str) -> Option<&str> {
                self.value(keyword).and_then(AttrValue::first)
            }

            pub fn remove_value(&mut self, keyword: &str) -> Option<AttrValue> {
                let pos = self.values.iter().position(|v| v.keyword() == keyword)?;
                Some(self.values.remove(pos))
            }

            pub fn add_collection(&mut self, collection: AttrCollection) -> &mut Self {
                self.collections.push(collection);
                self
            }

            /// Replace every collection with the same name (or append).
            pub fn set_collection(&mut self, collection: AttrCollection) -> &mut Self {
                match self.collections.iter().position(|c| c.name == collection.name) {
                    Some(pos) => {
                        let name = collection.name.clone();
                        self.collections[pos] = collection;
                        let mut index = 0;
                        self.collections.retain(|c| {
                            let keep = index == pos || c.name != name;
                            index += 1;
                            keep
                        });
                    }
                    None => self.collections.push(collection),
                }
                self
            }

            pub fn collection(&self, name: &str) -> Option<&AttrCollection> {
                self.collections.iter().find(|c| c.name == name)
            }

            pub fn collection_mut(&mut self, name: &str) -> Option<&mut AttrCollection> {
                self.collections.iter_mut().find(|c| c.name == name)
            }

            pub fn remove_collection(&mut self, name: &str) -> Option<AttrCollection> {
                let pos = self.collections.iter().position(|c| c.name == name)?;
                Some(self.collections.remove(pos))
            }

            /// Follow a `/`-separated path of collection names,
            /// e.g. `media-col/media-size`.
            pub fn find_collection(&self, path: &str) -> Option<&AttrCollection> {
                let mut parts = path.split('/');
                let mut current = self.collection(parts.next()?)?;
                for part in parts {
                    current = current.collection(part)?;
                }
                Some(current)
            }

            /// Number of collections with the given name.
            pub fn count_collections(&self, name: &str) -> usize {
                self.collections.iter().filter(|c| c.name == name).count()
            }

            pub fn is_empty(&self) -> bool {
                self.values.is_empty() && self.collections.is_empty()
            }
        }

        impl AttrContainer for $ty {
            fn push_value(&mut self, value: AttrValue) {
                self.values.push(value);
            }

            fn push_collection(&mut self, collection: AttrCollection) {
                self.collections.push(collection);
            }

            fn last_value_mut(&mut self) -> Option<&mut AttrValue> {
                self.values.last_mut()
            }
        }
    };
}

/// Append-only view used by the wire reader.
pub(crate) trait AttrContainer {
    fn push_value(&mut self, value: AttrValue);
    fn push_collection(&mut self, collection: AttrCollection);
    fn last_value_mut(&mut self) -> Option<&mut AttrValue>;
}

/// A named collection value (RFC 8010 §3.1.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrCollection {
    name: String,
    values: Vec<AttrValue>,
    collections: Vec<AttrCollection>,
}

impl AttrCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            collections: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl_attr_container!(AttrCollection);

/// A delimited top-level attribute section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrGroup {
    tag: GroupTag,
    values: Vec<AttrValue>,
    collections: Vec<AttrCollection>,
}

impl AttrGroup {
    pub fn new(tag: GroupTag) -> Self {
        Self {
            tag,
            values: Vec::new(),
            collections: Vec::new(),
        }
    }

    pub fn tag(&self) -> GroupTag {
        self.tag
    }
}

impl_attr_container!(AttrGroup);

/// A complete IPP request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub version: IppVersion,
    /// Operation-id for requests, status-code for responses.
    pub code: u16,
    /// As read off the wire. Outgoing requests get theirs when framed.
    pub request_id: u32,
    pub groups: Vec<AttrGroup>,
    /// Document data following the end-of-attributes tag.
    pub document: Option<Bytes>,
}

impl Message {
    pub fn new(code: u16) -> Self {
        Self {
            version: IppVersion::default(),
            code,
            request_id: 0,
            groups: Vec::new(),
            document: None,
        }
    }

    pub fn operation_id(&self) -> u16 {
        self.code
    }

    pub fn status_code(&self) -> u16 {
        self.code
    }

    /// First group with the given tag.
    pub fn group(&self, tag: GroupTag) -> Option<&AttrGroup> {
        self.groups.iter().find(|g| g.tag == tag)
    }

    pub fn group_mut(&mut self, tag: GroupTag) -> Option<&mut AttrGroup> {
        self.groups.iter_mut().find(|g| g.tag == tag)
    }

    /// First group with the given tag, appended if missing.
    pub fn group_or_insert(&mut self, tag: GroupTag) -> &mut AttrGroup {
        let pos = match self.groups.iter().position(|g| g.tag == tag) {
            Some(pos) => pos,
            None => {
                self.groups.push(AttrGroup::new(tag));
                self.groups.len() - 1
            }
        };
        &mut self.groups[pos]
    }

    /// All groups with the given tag, e.g. one job group per job in Get-Jobs.
    pub fn groups_of(&self, tag: GroupTag) -> impl Iterator<Item = &AttrGroup> {
        self.groups.iter().filter(move |g| g.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(name: &str, value: &str) -> AttrValue {
        AttrValue::of(name, SyntaxKind::Keyword, value)
    }

    #[test]
    fn multi_values_keep_insertion_order() {
        let value = keyword("job-state-reasons", "b").with_value("a").with_value("c");
        assert_eq!(value.values(), ["b", "a", "c"]);
        assert_eq!(value.first(), Some("b"));
    }

    #[test]
    fn set_value_replaces_in_place() {
        let mut group = AttrGroup::new(GroupTag::Job);
        group.add_value(keyword("sides", "one-sided"));
        group.add_value(keyword("media", "iso_a4_210x297mm"));
        group.add_value(keyword("sides", "two-sided-long-edge"));

        group.set_value(keyword("sides", "two-sided-short-edge"));
        let keywords: Vec<&str> = group.values().iter().map(AttrValue::keyword).collect();
        assert_eq!(keywords, ["sides", "media"]);
        assert_eq!(group.first_value("sides"), Some("two-sided-short-edge"));
    }

    #[test]
    fn nested_collection_lookup_by_path() {
        let mut size = AttrCollection::new("media-size");
        size.add_value(AttrValue::of("x-dimension", SyntaxKind::Integer, "21000"));
        let mut col = AttrCollection::new("media-col");
        col.add_collection(size);
        let mut group = AttrGroup::new(GroupTag::Job);
        group.add_collection(col);

        let found = group.find_collection("media-col/media-size").unwrap();
        assert_eq!(found.first_value("x-dimension"), Some("21000"));
        assert!(group.find_collection("media-col/media-margin").is_none());
    }

    #[test]
    fn set_collection_leaves_single_entry() {
        let mut col = AttrCollection::new("media-col");
        col.add_collection(AttrCollection::new("media-size"));
        col.add_collection(AttrCollection::new("media-size"));
        col.set_collection(AttrCollection::new("media-size"));
        assert_eq!(col.count_collections("media-size"), 1);
    }

    #[test]
    fn group_or_insert_reuses_existing() {
        let mut message = Message::new(OP_PRINT_JOB);
        message.group_or_insert(GroupTag::Operation);
        message.group_or_insert(GroupTag::Job);
        message.group_or_insert(GroupTag::Operation);
        assert_eq!(message.groups.len(), 2);
        assert_eq!(message.groups_of(GroupTag::Job).count(), 1);
    }

    #[test]
    fn group_tags_round_trip() {
        for tag in [GroupTag::Operation, GroupTag::Job, GroupTag::Printer, GroupTag::Unsupported] {
            assert_eq!(GroupTag::from_tag(tag.tag()), Some(tag));
        }
        assert_eq!(GroupTag::from_tag(TAG_END_OF_ATTRIBUTES), None);
    }
}
