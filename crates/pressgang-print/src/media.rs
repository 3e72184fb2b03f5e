// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Media selection, collected while building a job and emitted once at the
// end as a single `media-col` (PWG 5100.7).

use tracing::debug;

use pressgang_core::types::MediaSize;
use pressgang_ipp::dictionary::*;
use pressgang_ipp::{AttrCollection, AttrValue, SyntaxKind};

/// Media name and tray chosen for a job. Later writers win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSelection {
    pub media: Option<String>,
    pub source: Option<String>,
}

impl MediaSelection {
    pub fn is_empty(&self) -> bool {
        self.media.is_none() && self.source.is_none()
    }

    /// Set `media` or `media-source`; any other keyword is ignored.
    pub fn set(&mut self, keyword: &str, value: &str) -> bool {
        match keyword {
            MEDIA => self.media = Some(value.to_string()),
            MEDIA_SOURCE => self.source = Some(value.to_string()),
            _ => return false,
        }
        true
    }

    /// ```text
    /// media-col
    ///   media-size       { x-dimension, y-dimension }   (PWG names only)
    ///   media-size-name
    ///   media-source
    /// ```
    pub fn to_collection(&self) -> Option<AttrCollection> {
        if self.is_empty() {
            return None;
        }
        let mut col = AttrCollection::new(MEDIA_COL);

        if let Some(media) = &self.media {
            match MediaSize::from_pwg_name(media) {
                Some(size) => {
                    let mut dims = AttrCollection::new(MEDIA_SIZE);
                    dims.add_value(AttrValue::of(X_DIMENSION, SyntaxKind::Integer, size.x_dimension.to_string()))
                        .add_value(AttrValue::of(Y_DIMENSION, SyntaxKind::Integer, size.y_dimension.to_string()));
                    col.add_collection(dims);
                }
                None => debug!(media = %media, "media name carries no dimensions; sending name only"),
            }
            col.add_value(AttrValue::of(MEDIA_SIZE_NAME, SyntaxKind::Keyword, media.as_str()));
        }
        if let Some(source) = &self.source {
            col.add_value(AttrValue::of(MEDIA_SOURCE, SyntaxKind::Keyword, source.as_str()));
        }
        Some(col)
    }
}
