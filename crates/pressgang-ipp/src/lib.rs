// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressgang IPP: attribute syntax codec, attribute dictionary, in-memory
// attribute model, and the binary message framer.

pub mod dictionary;
pub mod framer;
pub mod model;
pub mod syntax;
pub mod tag;

pub use dictionary::{AttrDictionary, Attribute};
pub use framer::{FramedMessage, IppWriter, ReadOutcome, RejectedAttribute, RequestIdGenerator, read_message};
pub use model::{AttrCollection, AttrGroup, AttrValue, GroupTag, IppVersion, Message};
pub use syntax::{MessageCharset, OutOfBand, SyntaxKind};
