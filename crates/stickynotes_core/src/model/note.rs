//! Note record, insert shape and partial patch.
//!
//! # Invariants
//! - `color` written through the store is a CSS color token: hex (`#rgb`,
//!   `#rgba`, `#rrggbb`, `#rrggbbaa`), named (ASCII letters), or a color
//!   function such as `rgb(255, 0, 0)` or `hsl(120deg 50% 50% / 0.5)`.
//! - Stored colors are not re-validated on read.
//! - `id` never changes after insert; patches cannot carry one.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static COLOR_TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)^(
            \#([0-9a-fA-F]{3,4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})
            | [a-zA-Z]+
            | (?i:rgba?|hsla?|hwb|lab|lch|oklab|oklch) \( [0-9a-zA-Z.,%/+\-\s]* \)
        )$",
    )
    .expect("valid color token regex")
});

/// Primary key of a note record.
pub type NoteId = i64;

/// Persisted sticky note.
///
/// Serializes as `{id, color, content, x, y, zIndex}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    /// Header color token.
    pub color: String,
    /// Free text body.
    pub content: String,
    /// Left edge in pixels.
    pub x: i64,
    /// Top edge in pixels.
    pub y: i64,
    /// Stacking order, higher renders in front.
    pub z_index: i64,
}

/// Insert shape for [`Note`].
///
/// `id = None` lets the store assign the next key; `Some(id)` stores the
/// record under that exact key and fails if it is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub id: Option<NoteId>,
    pub color: String,
    pub content: String,
    pub x: i64,
    pub y: i64,
    pub z_index: i64,
}

impl NewNote {
    /// Creates an empty note at the origin.
    pub fn new(color: impl Into<String>, z_index: i64) -> Self {
        Self {
            id: None,
            color: color.into(),
            content: String::new(),
            x: 0,
            y: 0,
            z_index,
        }
    }

    /// Pins the record to a caller-allocated key.
    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        validate_color(&self.color)
    }

    /// Materializes the stored record once its key is known.
    pub fn into_note(self, id: NoteId) -> Note {
        Note {
            id,
            color: self.color,
            content: self.content,
            x: self.x,
            y: self.y,
            z_index: self.z_index,
        }
    }
}

/// Shallow partial update. `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub color: Option<String>,
    pub content: Option<String>,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub z_index: Option<i64>,
}

impl NotePatch {
    /// Patch written after a text edit.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Patch written when a drag gesture ends.
    pub fn position(x: i64, y: i64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Patch written when a note is brought to front.
    pub fn z_index(z_index: i64) -> Self {
        Self {
            z_index: Some(z_index),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        match self.color.as_deref() {
            Some(color) => validate_color(color),
            None => Ok(()),
        }
    }

    /// Merges this patch over `note` in place.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(color) = &self.color {
            note.color = color.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(x) = self.x {
            note.x = x;
        }
        if let Some(y) = self.y {
            note.y = y;
        }
        if let Some(z_index) = self.z_index {
            note.z_index = z_index;
        }
    }
}

/// Validation failure for note fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    InvalidColor(String),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidColor(value) => write!(f, "invalid color token: `{value}`"),
        }
    }
}

impl Error for NoteValidationError {}

/// Trims and validates a color token, returning the normalized value.
pub fn normalize_color(color: &str) -> Result<String, NoteValidationError> {
    let trimmed = color.trim();
    validate_color(trimmed)?;
    Ok(trimmed.to_string())
}

fn validate_color(color: &str) -> Result<(), NoteValidationError> {
    if COLOR_TOKEN_RE.is_match(color) {
        Ok(())
    } else {
        Err(NoteValidationError::InvalidColor(color.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_color, NewNote, Note, NotePatch, NoteValidationError};

    fn sample() -> Note {
        NewNote::new("red", 4).into_note(3)
    }

    #[test]
    fn color_tokens_accept_hex_named_and_function_values() {
        for token in [
            "red",
            "LightYellow",
            "#fff",
            "#ffcc00",
            "#ffcc0080",
            "rgb(255,0,0)",
            "rgba(255, 0, 0, 0.5)",
            "hsl(120deg 50% 50% / 0.5)",
            "oklch(70% 0.1 200)",
        ] {
            assert_eq!(normalize_color(token).unwrap(), token);
        }
        assert_eq!(normalize_color("  #abc ").unwrap(), "#abc");
    }

    #[test]
    fn color_tokens_reject_garbage() {
        for token in ["", "#ff", "#gggggg", "red; x", "rgb(1,2,3", "url(x)", "rgb(1);red"] {
            assert!(matches!(
                normalize_color(token),
                Err(NoteValidationError::InvalidColor(_))
            ));
        }
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let mut note = sample();
        NotePatch::position(120, 80).apply_to(&mut note);

        assert_eq!(note.x, 120);
        assert_eq!(note.y, 80);
        assert_eq!(note.z_index, 4);
        assert_eq!(note.color, "red");
        assert_eq!(note.content, "");
    }

    #[test]
    fn empty_patch_leaves_note_untouched() {
        let mut note = sample();
        let patch = NotePatch::default();
        assert!(patch.is_empty());
        patch.apply_to(&mut note);
        assert_eq!(note, sample());
    }

    #[test]
    fn new_note_starts_empty_at_origin() {
        let note = NewNote::new("#ffcc00", 1).with_id(0);
        assert_eq!(note.id, Some(0));
        assert_eq!(note.content, "");
        assert_eq!((note.x, note.y), (0, 0));
    }
}
