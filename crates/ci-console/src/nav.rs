//! Page navigation and the state handed from one page to the next.

use ci_client::UploadOutcome;
use ci_protocol::ColumnMapping;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Credentials,
    Upload,
    Mapping,
    Results,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Credentials, Page::Upload, Page::Mapping, Page::Results];

    pub fn title(&self) -> &'static str {
        match self {
            Page::Credentials => "Credentials",
            Page::Upload => "Upload Log",
            Page::Mapping => "Map Columns",
            Page::Results => "Conformance Insights",
        }
    }

    pub fn next(self) -> Page {
        let i = Page::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Page::ALL[(i + 1) % Page::ALL.len()]
    }

    pub fn previous(self) -> Page {
        let i = Page::ALL.iter().position(|p| *p == self).unwrap_or(0);
        Page::ALL[(i + Page::ALL.len() - 1) % Page::ALL.len()]
    }
}

/// What the mapping page hands to the results page.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingOutcome {
    /// Backend response to the committed mapping.
    pub initial: Value,
}

/// Explicit state passed between pages. Nothing else is shared.
#[derive(Debug, Clone)]
pub struct NavState {
    page: Page,
    upload: Option<UploadOutcome>,
    mapping_form: Option<ColumnMapping>,
    mapping: Option<MappingOutcome>,
}

impl NavState {
    pub fn new() -> Self {
        Self {
            page: Page::Credentials,
            upload: None,
            mapping_form: None,
            mapping: None,
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn go(&mut self, page: Page) {
        self.page = page;
    }

    pub fn upload(&self) -> Option<&UploadOutcome> {
        self.upload.as_ref()
    }

    pub fn mapping_form(&self) -> Option<&ColumnMapping> {
        self.mapping_form.as_ref()
    }

    pub fn mapping_form_mut(&mut self) -> Option<&mut ColumnMapping> {
        self.mapping_form.as_mut()
    }

    pub fn mapping(&self) -> Option<&MappingOutcome> {
        self.mapping.as_ref()
    }

    /// A new log invalidates any previous mapping and moves on to mapping.
    pub fn complete_upload(&mut self, outcome: UploadOutcome) {
        self.mapping_form = Some(outcome.mapping());
        self.upload = Some(outcome);
        self.mapping = None;
        self.page = Page::Mapping;
    }

    pub fn complete_mapping(&mut self, outcome: MappingOutcome) {
        self.mapping = Some(outcome);
        self.page = Page::Results;
    }
}

impl Default for NavState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_protocol::{ColumnsResponse, LogType, Role};
    use serde_json::json;

    fn outcome(columns: &[&str]) -> UploadOutcome {
        UploadOutcome {
            file_name: "log.csv".into(),
            log_type: LogType::Tabular,
            columns: ColumnsResponse {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn upload_moves_to_mapping_with_fresh_form() {
        let mut nav = NavState::new();
        nav.complete_upload(outcome(&["a", "b"]));
        assert_eq!(nav.page(), Page::Mapping);
        assert_eq!(nav.mapping_form().unwrap().options(Role::CaseId), vec!["a", "b"]);
    }

    #[test]
    fn new_upload_clears_committed_mapping() {
        let mut nav = NavState::new();
        nav.complete_upload(outcome(&["a"]));
        nav.complete_mapping(MappingOutcome { initial: json!({"ok": true}) });
        assert_eq!(nav.page(), Page::Results);

        nav.complete_upload(outcome(&["x"]));
        assert!(nav.mapping().is_none());
    }

    #[test]
    fn page_cycle_wraps() {
        assert_eq!(Page::Results.next(), Page::Credentials);
        assert_eq!(Page::Credentials.previous(), Page::Results);
    }
}
