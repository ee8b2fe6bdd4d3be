//! Saving a needle: form assembly, client-side checks and the server's answer.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::editor::NeedleEditor;
use crate::error::{NeedleError, Result};
use crate::needle::WORKAROUND_PROPERTY;

pub const DEFAULT_ERROR: &str = "<strong>Fatal error when saving needle.</strong>";

pub const WORKAROUND_CONFIRMATION: &str = "You set the workaround property for this needle \
     without a description. Are you sure you want to save without a description?";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SaveForm {
    pub name: String,
    pub json: String,
    pub tags: Vec<String>,
    pub area_count: usize,
    pub overwrite: bool,
    pub workaround: bool,
    pub workaround_desc: String,
}

impl SaveForm {
    pub fn from_editor(editor: &NeedleEditor, overwrite: bool) -> Self {
        let workaround = editor
            .properties()
            .iter()
            .find(|p| p.name == WORKAROUND_PROPERTY);
        Self {
            name: editor.name().to_string(),
            json: editor.serialized().to_string(),
            tags: editor.tags().to_vec(),
            area_count: editor.regions().len(),
            overwrite,
            workaround: workaround.is_some(),
            workaround_desc: workaround
                .and_then(|p| p.value.clone())
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.tags.is_empty() {
            errors.push("No tags specified.".to_string());
        }
        if self.area_count == 0 {
            errors.push("No areas defined.".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            warn!(?errors, "needle not saved");
            Err(NeedleError::Validation(errors))
        }
    }

    /// The workaround property is set but has no description.
    pub fn needs_workaround_confirmation(&self) -> bool {
        self.workaround && self.workaround_desc.trim().is_empty()
    }

    /// Form fields in submission order; tags repeat.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("json", self.json.clone()), ("needlename", self.name.clone())];
        fields.extend(self.tags.iter().map(|t| ("tags", t.clone())));
        if self.overwrite {
            fields.push(("overwrite", "yes".to_string()));
        }
        fields
    }

    /// Write the document text verbatim.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.json)?;
        info!(path = %path.display(), "needle JSON written");
        Ok(())
    }

    /// Post the form and interpret the answer.
    pub fn submit(&self, url: &str) -> Result<SaveOutcome> {
        self.validate()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let response = client.post(url).form(&self.fields()).send()?;
        let status = response.status().as_u16();
        let body = response.text().ok();
        Ok(SaveOutcome::from_response(status, body.as_deref()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: Option<String>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    requires_overwrite: bool,
    #[serde(default)]
    needlename: Option<String>,
    #[serde(default)]
    developer_session_job_id: Option<Value>,
    #[serde(default)]
    restart: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FollowUp {
    LiveView { job_id: String },
    Restart { url: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved {
        message: String,
        follow_up: Option<FollowUp>,
    },
    Failed {
        message: String,
    },
    NeedsOverwrite {
        name: String,
    },
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SaveOutcome {
    pub fn from_response(status: u16, body: Option<&str>) -> Self {
        let parsed: Option<SaveResponse> = body.and_then(|b| serde_json::from_str(b).ok());
        let Some(resp) = parsed else {
            return SaveOutcome::Failed {
                message: DEFAULT_ERROR.to_string(),
            };
        };
        let success = resp.success.filter(|s| !s.is_empty());
        let error = resp.error.as_ref().and_then(Value::as_str).map(str::to_string);
        let failed = status != 200 || (success.is_none() && !resp.requires_overwrite);
        if failed && error.is_none() {
            return SaveOutcome::Failed {
                message: DEFAULT_ERROR.to_string(),
            };
        }

        if let Some(message) = success {
            let follow_up = match (resp.developer_session_job_id.as_ref().and_then(value_text), resp.restart) {
                (Some(job_id), _) => Some(FollowUp::LiveView { job_id }),
                (None, Some(url)) if !url.is_empty() => Some(FollowUp::Restart { url }),
                _ => None,
            };
            return SaveOutcome::Saved { message, follow_up };
        }
        if let Some(error) = error.filter(|e| !e.is_empty()) {
            // Messages starting with markup are already formatted.
            let message = if error.starts_with('<') {
                error
            } else {
                format!("{}<br>{}", DEFAULT_ERROR, error)
            };
            return SaveOutcome::Failed { message };
        }
        if resp.requires_overwrite {
            return SaveOutcome::NeedsOverwrite {
                name: resp.needlename.unwrap_or_default(),
            };
        }
        SaveOutcome::Failed {
            message: DEFAULT_ERROR.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SaveForm {
        SaveForm {
            name: "boot-menu".into(),
            json: "{}".into(),
            tags: vec!["boot".into()],
            area_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn validation_lists_every_problem() {
        let empty = SaveForm::default();
        match empty.validate() {
            Err(NeedleError::Validation(errors)) => {
                assert_eq!(errors, vec!["No tags specified.", "No areas defined."]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(form().validate().is_ok());
    }

    #[test]
    fn workaround_without_description_needs_confirmation() {
        let mut f = form();
        assert!(!f.needs_workaround_confirmation());
        f.workaround = true;
        assert!(f.needs_workaround_confirmation());
        f.workaround_desc = "bsc#1".into();
        assert!(!f.needs_workaround_confirmation());
    }

    #[test]
    fn fields_repeat_tags_and_flag_overwrite() {
        let mut f = form();
        f.tags.push("menu".into());
        f.overwrite = true;
        let names: Vec<_> = f.fields().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["json", "needlename", "tags", "tags", "overwrite"]);
    }

    #[test]
    fn json_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("needle.json");
        let f = SaveForm {
            json: "{\n  \"area\": []\n}".into(),
            ..form()
        };
        f.write_json(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), f.json);
    }

    #[test]
    fn success_with_live_view_link() {
        let outcome = SaveOutcome::from_response(
            200,
            Some(r#"{"success": "Needle saved", "developer_session_job_id": 42}"#),
        );
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                message: "Needle saved".into(),
                follow_up: Some(FollowUp::LiveView { job_id: "42".into() }),
            }
        );
    }

    #[test]
    fn plain_error_gets_default_prefix() {
        let outcome = SaveOutcome::from_response(200, Some(r#"{"error": "disk full"}"#));
        assert_eq!(
            outcome,
            SaveOutcome::Failed {
                message: format!("{}<br>disk full", DEFAULT_ERROR),
            }
        );
        let html = SaveOutcome::from_response(500, Some(r#"{"error": "<b>no</b>"}"#));
        assert_eq!(html, SaveOutcome::Failed { message: "<b>no</b>".into() });
    }

    #[test]
    fn unusable_responses_are_fatal() {
        let fatal = SaveOutcome::Failed {
            message: DEFAULT_ERROR.into(),
        };
        assert_eq!(SaveOutcome::from_response(502, None), fatal);
        assert_eq!(SaveOutcome::from_response(500, Some(r#"{"error": 3}"#)), fatal);
        assert_eq!(SaveOutcome::from_response(200, Some("not json")), fatal);
    }

    #[test]
    fn overwrite_request_carries_name() {
        let outcome = SaveOutcome::from_response(
            200,
            Some(r#"{"requires_overwrite": true, "needlename": "boot-menu"}"#),
        );
        assert_eq!(outcome, SaveOutcome::NeedsOverwrite { name: "boot-menu".into() });
    }
}
