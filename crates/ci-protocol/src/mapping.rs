//! Column-to-role mapping for an uploaded event log.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACCEPTED_LOG_EXTENSIONS, XES_ACTIVITY_COLUMN, XES_CASE_ID_COLUMN, XES_TIMESTAMP_COLUMN,
};
use crate::ProtocolError;

/// Structural classification of an uploaded log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LogType {
    /// Delimited table (CSV); every role is chosen by the user.
    #[default]
    #[serde(rename = "csv")]
    Tabular,
    /// Self-describing XES log; case, activity and timestamp are fixed.
    #[serde(rename = "xes")]
    Xes,
}

impl LogType {
    /// Classify a log from its file name. Only `.csv` and `.xes` are accepted.
    pub fn from_file_name(name: &str) -> Result<Self, ProtocolError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_LOG_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ProtocolError::UnsupportedLogFile(name.to_string()));
        }
        Ok(if ext == "xes" { LogType::Xes } else { LogType::Tabular })
    }

    /// Prefer the backend's own classification, fall back to the file name.
    pub fn classify(server_hint: Option<&str>, file_name: &str) -> Result<Self, ProtocolError> {
        match server_hint.map(|h| h.trim().to_ascii_lowercase()) {
            Some(h) if h == "xes" => Ok(LogType::Xes),
            Some(h) if h == "csv" || h == "tabular" => Ok(LogType::Tabular),
            _ => LogType::from_file_name(file_name),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Tabular => "csv",
            LogType::Xes => "xes",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantic role a log column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CaseId,
    Activity,
    Timestamp,
    Resource1,
    Resource2,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::CaseId,
        Role::Activity,
        Role::Timestamp,
        Role::Resource1,
        Role::Resource2,
    ];

    pub fn is_required(&self) -> bool {
        matches!(self, Role::CaseId | Role::Activity | Role::Timestamp)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::CaseId => "Case ID Column",
            Role::Activity => "Activity Column",
            Role::Timestamp => "Timestamp Column",
            Role::Resource1 => "Resource Column (optional)",
            Role::Resource2 => "Resource 2 Column (optional)",
        }
    }

    fn index(&self) -> usize {
        match self {
            Role::CaseId => 0,
            Role::Activity => 1,
            Role::Timestamp => 2,
            Role::Resource1 => 3,
            Role::Resource2 => 4,
        }
    }

    fn xes_default(&self) -> Option<&'static str> {
        match self {
            Role::CaseId => Some(XES_CASE_ID_COLUMN),
            Role::Activity => Some(XES_ACTIVITY_COLUMN),
            Role::Timestamp => Some(XES_TIMESTAMP_COLUMN),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::CaseId => "case id",
            Role::Activity => "activity",
            Role::Timestamp => "timestamp",
            Role::Resource1 => "resource 1",
            Role::Resource2 => "resource 2",
        };
        f.write_str(s)
    }
}

/// Body of `GET /api/setup/get-column-names`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnsResponse {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub default_case_id: Option<String>,
    #[serde(default)]
    pub default_activity: Option<String>,
    #[serde(default)]
    pub default_timestamp: Option<String>,
    /// The backend's classification of the uploaded log, when it reports one.
    #[serde(default, alias = "file_type")]
    pub log_type: Option<String>,
}

/// Mapping form state: columns offered by the log and the role bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    log_type: LogType,
    columns: Vec<String>,
    bindings: [Option<String>; 5],
}

impl ColumnMapping {
    /// Start a mapping. XES logs get their reserved roles pre-bound.
    pub fn new(columns: Vec<String>, log_type: LogType) -> Self {
        let mut mapping = Self {
            log_type,
            columns,
            bindings: Default::default(),
        };
        if log_type == LogType::Xes {
            for role in Role::ALL {
                if let Some(name) = role.xes_default() {
                    mapping.bindings[role.index()] = Some(name.to_string());
                }
            }
        }
        mapping
    }

    /// Start a mapping from the backend's column response, honouring any
    /// reserved-role defaults it advertises for XES logs.
    pub fn from_response(response: &ColumnsResponse, log_type: LogType) -> Self {
        let mut mapping = Self::new(response.columns.clone(), log_type);
        if log_type == LogType::Xes {
            let overrides = [
                (Role::CaseId, &response.default_case_id),
                (Role::Activity, &response.default_activity),
                (Role::Timestamp, &response.default_timestamp),
            ];
            for (role, value) in overrides {
                if let Some(v) = value.as_ref().filter(|v| !v.is_empty()) {
                    mapping.bindings[role.index()] = Some(v.clone());
                }
            }
        }
        mapping
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.bindings[role.index()].as_deref()
    }

    /// Reserved roles of an XES log are shown but not editable.
    pub fn is_read_only(&self, role: Role) -> bool {
        self.log_type == LogType::Xes && role.xes_default().is_some()
    }

    /// Bind `column` to `role`.
    pub fn set(&mut self, role: Role, column: &str) -> Result<(), ProtocolError> {
        if self.is_read_only(role) {
            return Err(ProtocolError::ReservedRole(role));
        }
        if !self.columns.iter().any(|c| c == column) {
            return Err(ProtocolError::UnknownColumn {
                column: column.to_string(),
            });
        }
        if !role.is_required() {
            if let Some(other) = self.role_of(column).filter(|r| *r != role) {
                return Err(ProtocolError::DuplicateBinding {
                    column: column.to_string(),
                    first: other,
                    second: role,
                });
            }
        }
        self.bindings[role.index()] = Some(column.to_string());
        Ok(())
    }

    pub fn clear(&mut self, role: Role) -> Result<(), ProtocolError> {
        if self.is_read_only(role) {
            return Err(ProtocolError::ReservedRole(role));
        }
        self.bindings[role.index()] = None;
        Ok(())
    }

    fn role_of(&self, column: &str) -> Option<Role> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| self.get(*r) == Some(column))
    }

    /// Columns selectable for `role`. Resource roles never offer a column
    /// already bound to another role.
    pub fn options(&self, role: Role) -> Vec<&str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|c| {
                role.is_required()
                    || self.role_of(c).map(|bound| bound == role).unwrap_or(true)
            })
            .collect()
    }

    /// Required roles still unbound, in form order.
    pub fn missing_required(&self) -> Vec<Role> {
        Role::ALL
            .iter()
            .copied()
            .filter(|r| r.is_required() && self.get(*r).map_or(true, str::is_empty))
            .collect()
    }

    pub fn is_submittable(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Check every invariant and produce the payload that may be submitted.
    pub fn validate(&self) -> Result<ValidatedMapping, ProtocolError> {
        if let Some(role) = self.missing_required().first() {
            return Err(ProtocolError::MissingRole(*role));
        }
        for resource in [Role::Resource1, Role::Resource2] {
            let Some(column) = self.get(resource) else { continue };
            if let Some(other) = Role::ALL
                .iter()
                .copied()
                .find(|r| *r != resource && self.get(*r) == Some(column))
            {
                return Err(ProtocolError::DuplicateBinding {
                    column: column.to_string(),
                    first: other,
                    second: resource,
                });
            }
        }
        let required = |r: Role| self.get(r).unwrap_or_default().to_string();
        let optional = |r: Role| self.get(r).filter(|c| !c.is_empty()).map(str::to_string);
        Ok(ValidatedMapping {
            case_id_column: required(Role::CaseId),
            activity_column: required(Role::Activity),
            timestamp_column: required(Role::Timestamp),
            resource_1_column: optional(Role::Resource1),
            resource_2_column: optional(Role::Resource2),
            file_type: self.log_type,
        })
    }
}

/// A mapping whose required roles are known to be filled.
///
/// Only obtainable through [`ColumnMapping::validate`], so an incomplete
/// mapping can never be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedMapping {
    case_id_column: String,
    activity_column: String,
    timestamp_column: String,
    resource_1_column: Option<String>,
    resource_2_column: Option<String>,
    file_type: LogType,
}

impl ValidatedMapping {
    pub fn case_id(&self) -> &str {
        &self.case_id_column
    }

    pub fn activity(&self) -> &str {
        &self.activity_column
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp_column
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resource_1_column
            .iter()
            .chain(self.resource_2_column.iter())
            .map(String::as_str)
    }
}
