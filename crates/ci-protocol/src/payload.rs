//! Result payloads, job handles and other response bodies.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::analysis::AnalysisFamily;

/// A graph node. The backend sends `{ "id": ... }`; bare strings are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeDescriptor {
    pub id: String,
}

impl<'de> Deserialize<'de> for NodeDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Object {
                #[serde(deserialize_with = "scalar_string")]
                id: String,
            },
            Bare(#[serde(deserialize_with = "scalar_string")] String),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Object { id } | Repr::Bare(id) => NodeDescriptor { id },
        })
    }
}

/// A labelled edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescriptor {
    #[serde(deserialize_with = "scalar_string")]
    pub from: String,
    #[serde(deserialize_with = "scalar_string")]
    pub to: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub label: String,
}

impl EdgeDescriptor {
    pub fn new(from: impl Into<String>, to: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescriptor {
    #[serde(default)]
    pub nodes: Vec<NodeDescriptor>,
    #[serde(default)]
    pub edges: Vec<EdgeDescriptor>,
}

impl GraphDescriptor {
    pub fn new<I, S>(nodes: I, edges: Vec<EdgeDescriptor>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes
                .into_iter()
                .map(|id| NodeDescriptor { id: id.into() })
                .collect(),
            edges,
        }
    }
}

/// The two table shapes the backend produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableDescriptor {
    /// Header list plus positional rows.
    Rows {
        headers: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<Value>>,
    },
    /// Row objects; headers come from the first row's keys.
    Objects(Vec<Map<String, Value>>),
}

/// Graphs and tables returned by a result endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub graphs: Vec<GraphDescriptor>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tables: Vec<TableDescriptor>,
}

impl ResultPayload {
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty() && self.tables.is_empty()
    }

    /// Interpret any result body as graphs and tables.
    ///
    /// Besides the canonical `{graphs, tables}` object this understands the
    /// social-network shape `{values: [{source, target, value}], is_directed}`,
    /// arrays of arrays (positional table), arrays of objects (object table)
    /// and plain objects (key/value table).
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) if map.contains_key("graphs") || map.contains_key("tables") => {
                serde_json::from_value(Value::Object(map.clone()))
                    .unwrap_or_else(|_| key_value_table(map))
            }
            Value::Object(map) if map.get("values").map_or(false, Value::is_array) => {
                sna_graph(&map)
            }
            Value::Object(map) => key_value_table(map),
            Value::Array(items) => array_table(items),
            Value::Null => ResultPayload::default(),
            scalar => ResultPayload {
                graphs: Vec::new(),
                tables: vec![TableDescriptor::Rows {
                    headers: vec!["Value".to_string()],
                    rows: vec![vec![scalar]],
                }],
            },
        }
    }
}

/// What a results tab ends up showing.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    Payload(ResultPayload),
    Scalar(f64),
}

fn sna_graph(map: &Map<String, Value>) -> ResultPayload {
    let mut nodes: Vec<String> = Vec::new();
    let mut edges = Vec::new();
    let values = map.get("values").and_then(Value::as_array).cloned().unwrap_or_default();
    for entry in values {
        let (Some(source), Some(target)) = (
            entry.get("source").map(value_text),
            entry.get("target").map(value_text),
        ) else {
            continue;
        };
        for id in [&source, &target] {
            if !nodes.contains(id) {
                nodes.push(id.clone());
            }
        }
        let label = entry.get("value").map(value_text).unwrap_or_default();
        edges.push(EdgeDescriptor::new(source, target, label));
    }
    ResultPayload {
        graphs: vec![GraphDescriptor::new(nodes, edges)],
        tables: Vec::new(),
    }
}

fn array_table(items: Vec<Value>) -> ResultPayload {
    if items.is_empty() {
        return ResultPayload::default();
    }
    if items.iter().all(Value::is_object) {
        let rows = items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(m) => Some(m),
                _ => None,
            })
            .collect();
        return ResultPayload {
            graphs: Vec::new(),
            tables: vec![TableDescriptor::Objects(rows)],
        };
    }
    let rows: Vec<Vec<Value>> = items
        .into_iter()
        .map(|v| match v {
            Value::Array(cells) => cells,
            other => vec![other],
        })
        .collect();
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    ResultPayload {
        graphs: Vec::new(),
        tables: vec![TableDescriptor::Rows {
            headers: (1..=width).map(|i| format!("#{i}")).collect(),
            rows,
        }],
    }
}

fn key_value_table(map: Map<String, Value>) -> ResultPayload {
    let rows = map
        .into_iter()
        .map(|(k, v)| vec![Value::String(k), v])
        .collect();
    ResultPayload {
        graphs: Vec::new(),
        tables: vec![TableDescriptor::Rows {
            headers: vec!["Key".to_string(), "Value".to_string()],
            rows,
        }],
    }
}

/// Render a JSON scalar as display text; strings are unquoted, null is empty.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(_) | Value::Object(_) => Err(serde::de::Error::custom(
            "expected a string, number or boolean",
        )),
        other => Ok(value_text(&other)),
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body returned by a compute endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStartResponse {
    pub job_id: String,
}

/// An opaque server-side job, bound to the family that created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    id: String,
    family: AnalysisFamily,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, family: AnalysisFamily) -> Self {
        Self {
            id: id.into(),
            family,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn family(&self) -> AnalysisFamily {
        self.family
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    #[serde(alias = "completed")]
    Complete,
    Failed,
}

/// Body of `GET /api/jobs/{job_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    #[serde(default)]
    pub module: String,
    pub status: JobState,
    #[serde(default)]
    pub error: Option<String>,
}

/// Extract a human-readable error from a backend error body.
///
/// FastAPI wraps messages as `{"detail": ...}`; anything else is returned
/// trimmed as-is.
pub fn backend_error_text(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.trim().to_string(),
        },
        _ => body.trim().to_string(),
    }
}
