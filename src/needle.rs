//! The needle aggregate and its JSON representation.
//!
//! A needle is stored as `{"area": [...], "tags": [...], "properties": [...]}`.
//! The suggested name travels next to the document, not inside it.

use serde::{Deserialize, Serialize};

use crate::error::{NeedleError, Result};
use crate::region::Region;

/// Property carrying an optional free-text value, e.g. `workaround`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Property {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }
}

pub const WORKAROUND_PROPERTY: &str = "workaround";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Needle {
    #[serde(default)]
    pub area: Vec<Region>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(skip)]
    pub name: String,
}

/// Borrowed view used to serialize regions held elsewhere.
#[derive(Serialize)]
struct Document<'a> {
    area: Vec<&'a Region>,
    tags: &'a [String],
    properties: &'a [Property],
}

/// Pretty-printed document text with two-space indentation.
pub fn to_pretty_json<'a>(
    area: impl IntoIterator<Item = &'a Region>,
    tags: &[String],
    properties: &[Property],
) -> Result<String> {
    let doc = Document {
        area: area.into_iter().collect(),
        tags,
        properties,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

impl Needle {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        to_pretty_json(&self.area, &self.tags, &self.properties)
    }

    /// Map a fetch response onto a needle. 404 means "does not exist yet".
    pub fn from_response(status: u16, body: &str) -> Result<Self> {
        match status {
            200..=299 => Self::parse(body),
            404 => Ok(Self::default()),
            code => Err(NeedleError::Status(code)),
        }
    }
}

// ── Tag and property edits ──────────────────────────────────────────────────

/// Insert keeping the list sorted, or remove. Returns true when the list changed.
pub fn change_tag(tags: &mut Vec<String>, name: &str, enabled: bool) -> bool {
    match (tags.iter().position(|t| t == name), enabled) {
        (None, true) => {
            let at = tags.partition_point(|t| t.as_str() < name);
            tags.insert(at, name.to_string());
            true
        }
        (Some(idx), false) => {
            tags.remove(idx);
            true
        }
        _ => false,
    }
}

pub fn change_property(properties: &mut Vec<Property>, name: &str, enabled: bool) -> bool {
    let existing = properties.iter().position(|p| p.name == name);
    match (existing, enabled) {
        (None, true) => {
            properties.push(Property::named(name));
            true
        }
        (Some(idx), false) => {
            properties.remove(idx);
            true
        }
        _ => false,
    }
}

/// Set the description of the workaround property if the needle has one.
pub fn set_workaround_desc(properties: &mut [Property], value: &str) -> bool {
    match properties.iter_mut().find(|p| p.name == WORKAROUND_PROPERTY) {
        Some(prop) => {
            prop.value = Some(value.to_string());
            true
        }
        None => false,
    }
}

// ── Candidates ──────────────────────────────────────────────────────────────

/// One entry of the editor's needle selection: an existing needle or the
/// screenshot itself, optionally with the areas found by the last match.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub suggested_name: String,
    #[serde(default, rename = "imageurl")]
    pub image_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub area: Vec<Region>,
    #[serde(default)]
    pub matches: Vec<Region>,
}

impl Candidate {
    /// Areas to edit: the stored areas, or the match results with the stored
    /// exclude areas appended once.
    pub fn display_areas(&self, take_matches: bool) -> Vec<Region> {
        if !take_matches {
            return self.area.clone();
        }
        let mut areas = self.matches.clone();
        areas.extend(self.area.iter().filter(|a| a.kind.is_exclude()).cloned());
        areas
    }

    pub fn workaround(&self) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == WORKAROUND_PROPERTY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{ClickPoint, Rect, RegionKind};

    fn sample() -> Needle {
        let mut first = Region::new(Rect::new(10, 20, 30, 40), RegionKind::Match);
        first.set_threshold(85.0);
        first.click_point = Some(ClickPoint { x: 15.0, y: 20.0 });
        let mut second = Region::new(Rect::new(0, 0, 50, 10), RegionKind::Exclude);
        second.margin = Some(20);
        Needle {
            area: vec![first, second],
            tags: vec!["ENV-VIDEOMODE-text".into(), "boot-menu".into()],
            properties: vec![Property {
                name: "workaround".into(),
                value: Some("bsc#1234".into()),
            }],
            name: "boot-menu-20240101".into(),
        }
    }

    #[test]
    fn serialized_needle_parses_back_identically() {
        let needle = sample();
        let text = needle.to_pretty_json().unwrap();
        let back = Needle::parse(&text).unwrap();
        assert_eq!(back.area, needle.area);
        assert_eq!(back.tags, needle.tags);
        assert_eq!(back.properties, needle.properties);
    }

    #[test]
    fn loaded_document_saves_back_verbatim() {
        let text = r#"{
  "area": [
    {
      "xpos": 10,
      "ypos": 20,
      "width": 30,
      "height": 40,
      "type": "ocr",
      "match": 80,
      "refstr": "Welcome"
    },
    {
      "xpos": 0,
      "ypos": 0,
      "width": 50,
      "height": 10,
      "type": "exclude",
      "match": 70
    },
    {
      "xpos": 5,
      "ypos": 5,
      "width": 9,
      "height": 9,
      "type": "match",
      "match": 95,
      "click_point": {
        "xpos": 4.5,
        "ypos": 4
      }
    }
  ],
  "tags": [
    "installer"
  ],
  "properties": []
}"#;
        let needle = Needle::parse(text).unwrap();
        assert_eq!(needle.to_pretty_json().unwrap(), text);
    }

    #[test]
    fn pretty_output_uses_two_space_indent() {
        let text = Needle::default().to_pretty_json().unwrap();
        assert_eq!(text, "{\n  \"area\": [],\n  \"tags\": [],\n  \"properties\": []\n}");
    }

    #[test]
    fn not_found_yields_empty_needle() {
        let needle = Needle::from_response(404, "<html>not found</html>").unwrap();
        assert!(needle.area.is_empty());
        assert!(needle.tags.is_empty());
        assert!(needle.properties.is_empty());
    }

    #[test]
    fn other_status_is_a_load_failure() {
        let err = Needle::from_response(500, "").unwrap_err();
        assert!(matches!(err, NeedleError::Status(500)));
        assert_eq!(err.canvas_message(), "Failed to load Needle, Code 500");
    }

    #[test]
    fn missing_document_keys_default_to_empty() {
        let needle = Needle::parse(r#"{"tags": ["a"]}"#).unwrap();
        assert!(needle.area.is_empty());
        assert_eq!(needle.tags, vec!["a".to_string()]);
    }

    #[test]
    fn tags_stay_sorted_and_unique() {
        let mut tags = vec!["b".to_string(), "d".to_string()];
        assert!(change_tag(&mut tags, "c", true));
        assert!(change_tag(&mut tags, "a", true));
        assert!(!change_tag(&mut tags, "c", true));
        assert_eq!(tags, vec!["a", "b", "c", "d"]);
        assert!(change_tag(&mut tags, "b", false));
        assert!(!change_tag(&mut tags, "zz", false));
        assert_eq!(tags, vec!["a", "c", "d"]);
    }

    #[test]
    fn property_toggle_and_workaround_description() {
        let mut props = Vec::new();
        assert!(!set_workaround_desc(&mut props, "ignored"));
        assert!(change_property(&mut props, WORKAROUND_PROPERTY, true));
        assert!(set_workaround_desc(&mut props, "poo#42"));
        assert_eq!(props[0].value.as_deref(), Some("poo#42"));
        assert!(change_property(&mut props, WORKAROUND_PROPERTY, false));
        assert!(props.is_empty());
    }

    #[test]
    fn take_matches_merges_exclude_areas_once() {
        let candidate = Candidate {
            area: vec![
                Region::new(Rect::new(0, 0, 10, 10), RegionKind::Match),
                Region::new(Rect::new(5, 5, 10, 10), RegionKind::Exclude),
            ],
            matches: vec![Region::new(Rect::new(2, 2, 10, 10), RegionKind::Match)],
            ..Default::default()
        };
        assert_eq!(candidate.display_areas(false).len(), 2);
        let merged = candidate.display_areas(true);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].rect, Rect::new(2, 2, 10, 10));
        assert!(merged[1].kind.is_exclude());
        assert_eq!(candidate.display_areas(true).len(), 2);
    }
}
