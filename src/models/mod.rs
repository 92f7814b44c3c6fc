use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Notes are listed 12 per page everywhere; the server computes
/// `totalPages` from the same constant.
pub(crate) const NOTES_PER_PAGE: u32 = 12;

pub(crate) const TITLE_MIN_CHARS: usize = 3;
pub(crate) const TITLE_MAX_CHARS: usize = 50;
pub(crate) const CONTENT_MAX_CHARS: usize = 500;

/// Tag values are fixed server-side; the wire format is the exact
/// PascalCase literal.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
pub(crate) enum NoteTag {
    #[default]
    Todo,
    Work,
    Personal,
    Meeting,
    Shopping,
}

impl NoteTag {
    /// Maps a URL path segment to a filter. The literal `all` (and any
    /// unknown segment) means "no tag filter".
    pub fn from_route_segment(segment: &str) -> Option<Self> {
        if segment.eq_ignore_ascii_case("all") {
            return None;
        }
        segment.parse().ok()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Note {
    pub id: String,
    pub title: String,
    /// Optional on the wire; absent means empty.
    #[serde(default)]
    pub content: String,
    pub tag: NoteTag,
    #[serde(default)]
    pub created_at: String,
}

/// One page of the notes listing as the server returns it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NoteList {
    pub notes: Vec<Note>,
    pub total_pages: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Client-side pre-validation of note fields, mirroring the server's
/// rules. The form runs this before submitting; the gateway runs it
/// again so an invalid payload never leaves the process.
pub(crate) fn validate_note_fields(title: &str, content: &str) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let title_len = title.chars().count();
    if title_len == 0 {
        errors.push(FieldError::new("title", "Title is required"));
    } else if title_len < TITLE_MIN_CHARS {
        errors.push(FieldError::new("title", "Minimum 3 characters"));
    } else if title_len > TITLE_MAX_CHARS {
        errors.push(FieldError::new("title", "Maximum 50 characters"));
    }

    if content.chars().count() > CONTENT_MAX_CHARS {
        errors.push(FieldError::new("content", "Maximum 500 characters"));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tag_wire_literals_round_trip() {
        for tag in NoteTag::iter() {
            let json = serde_json::to_string(&tag).expect("tag should serialize");
            assert_eq!(json, format!("\"{}\"", tag));
            let back: NoteTag = serde_json::from_str(&json).expect("tag should parse");
            assert_eq!(back, tag);
        }
    }

    #[test]
    fn test_tag_route_segment() {
        assert_eq!(NoteTag::from_route_segment("all"), None);
        assert_eq!(NoteTag::from_route_segment("Work"), Some(NoteTag::Work));
        // Unknown segments fall back to "no filter" rather than a 404.
        assert_eq!(NoteTag::from_route_segment("bogus"), None);
    }

    #[test]
    fn test_note_list_contract_deserialize() {
        // Contract based on GET /notes: camelCase keys, optional content.
        let json = r#"{
            "notes": [
                {"id": "n1", "title": "First", "tag": "Todo", "createdAt": "2026-01-01T00:00:00Z"},
                {"id": "n2", "title": "Second", "content": "body", "tag": "Work", "createdAt": ""}
            ],
            "totalPages": 2
        }"#;
        let parsed: NoteList = serde_json::from_str(json).expect("note list should parse");
        assert_eq!(parsed.total_pages, 2);
        assert_eq!(parsed.notes.len(), 2);
        assert_eq!(parsed.notes[0].content, "");
        assert_eq!(parsed.notes[1].tag, NoteTag::Work);
    }

    #[test]
    fn test_validate_title_boundaries() {
        assert_eq!(validate_note_fields("Hi", "")[0].message, "Minimum 3 characters");
        assert!(validate_note_fields("Hey", "").is_empty());
        assert!(validate_note_fields(&"a".repeat(50), "").is_empty());
        assert_eq!(
            validate_note_fields(&"a".repeat(51), "")[0].message,
            "Maximum 50 characters"
        );
        assert_eq!(validate_note_fields("", "")[0].message, "Title is required");
    }

    #[test]
    fn test_validate_content_boundary() {
        assert!(validate_note_fields("Title", &"c".repeat(500)).is_empty());
        let errors = validate_note_fields("Title", &"c".repeat(501));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "content");
    }
}
