//! One-shot CLI commands. Each returns the text to print.

use std::fmt::Write as _;
use std::path::Path;

use ci_client::{BackendClient, CancellationToken, UploadOutcome};
use ci_protocol::{
    AnalysisFamily, AnalysisVariant, BackendCredentials, LogType, ProtocolError, ResourceMetric,
    ResultPayload, Role,
};
use ci_view::{GraphVariant, TableView, VisualGraph};

use crate::results::is_directed_relation;

/// Column choices for `map`. Unset roles keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct MapArgs {
    pub case_id: Option<String>,
    pub activity: Option<String>,
    pub timestamp: Option<String>,
    pub resource1: Option<String>,
    pub resource2: Option<String>,
    pub xes: bool,
}

impl MapArgs {
    fn bindings(&self) -> [(Role, Option<&str>); 5] {
        [
            (Role::CaseId, self.case_id.as_deref()),
            (Role::Activity, self.activity.as_deref()),
            (Role::Timestamp, self.timestamp.as_deref()),
            (Role::Resource1, self.resource1.as_deref()),
            (Role::Resource2, self.resource2.as_deref()),
        ]
    }
}

/// Parse a `key=value` metric parameter.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

/// Accept either a full tag (`log_skeleton.always_before`) or the part
/// after the family prefix.
pub fn resolve_variant(family: &str, variant: &str) -> Result<AnalysisVariant, ProtocolError> {
    let family: AnalysisFamily = family.parse()?;
    let tag = if variant.contains('.') {
        variant.to_string()
    } else {
        format!("{}.{}", family.tag(), variant)
    };
    let resolved: AnalysisVariant = tag.parse()?;
    if resolved.family() != family {
        return Err(ProtocolError::UnknownVariant(format!("{family}/{variant}")));
    }
    Ok(resolved)
}

pub async fn credentials(
    client: &BackendClient,
    credentials: BackendCredentials,
) -> anyhow::Result<String> {
    client.save_credentials(&credentials).await?;
    Ok(format!(
        "Credentials saved (pool '{}', model '{}', table '{}')",
        credentials.data_pool_name, credentials.data_model_name, credentials.data_table_name
    ))
}

pub async fn upload(
    client: &BackendClient,
    path: &Path,
    table: Option<&str>,
) -> anyhow::Result<String> {
    let outcome = client.upload_log(path, table).await?;
    Ok(format_upload(&outcome))
}

pub fn format_upload(outcome: &UploadOutcome) -> String {
    let mut out = format!(
        "Uploaded {} ({} log, {} columns)\n",
        outcome.file_name,
        outcome.log_type,
        outcome.columns.columns.len()
    );
    for column in &outcome.columns.columns {
        let _ = writeln!(out, "  {column}");
    }
    out
}

/// Fetch the uploaded log's columns, bind them and commit the mapping.
pub async fn map(client: &BackendClient, args: &MapArgs) -> anyhow::Result<String> {
    let columns = client.fetch_columns().await?;
    let log_type = if args.xes { LogType::Xes } else { LogType::Tabular };
    let mut form = ci_protocol::ColumnMapping::from_response(&columns, log_type);
    for (role, column) in args.bindings() {
        if let Some(column) = column {
            form.set(role, column)?;
        }
    }
    let validated = form.validate()?;
    let response = client.commit_mapping(&validated).await?;
    let mut out = String::from("Mapping committed\n");
    if !response.is_null() {
        out.push_str(&serde_json::to_string_pretty(&response)?);
        out.push('\n');
    }
    Ok(out)
}

pub async fn run(
    client: &BackendClient,
    variant: AnalysisVariant,
    zeta: Option<f64>,
    directed: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    let payload = client.run(variant, zeta, cancel).await?;
    Ok(format_payload(variant, &payload, directed))
}

pub async fn insights(client: &BackendClient, cancel: &CancellationToken) -> anyhow::Result<String> {
    run(client, AnalysisVariant::GeneralInformation, None, false, cancel).await
}

pub async fn metric(
    client: &BackendClient,
    metric: ResourceMetric,
    params: &[(String, String)],
) -> anyhow::Result<String> {
    let value = client.scalar_metric(metric, params).await?;
    Ok(format!("{metric} = {value}"))
}

pub async fn job_status(client: &BackendClient, job_id: &str) -> anyhow::Result<String> {
    let report = client.job_status(job_id).await?;
    let mut out = format!("{job_id}: {:?}", report.status);
    if !report.module.is_empty() {
        let _ = write!(out, " ({})", report.module);
    }
    if let Some(error) = &report.error {
        let _ = write!(out, "\n  error: {error}");
    }
    Ok(out)
}

pub fn variants() -> String {
    let mut out = String::new();
    for family in AnalysisFamily::ALL {
        let kind = if family.start_path().is_some() { "job" } else { "synchronous" };
        let _ = writeln!(out, "{} ({}, {kind})", family.label(), family.tag());
        for variant in family.variants() {
            let _ = writeln!(out, "  {:<48} {}", variant.tag(), variant.label());
        }
    }
    let _ = writeln!(out, "Resource metrics");
    for metric in ResourceMetric::ALL {
        let _ = writeln!(out, "  {metric}");
    }
    out
}

/// Graphs as edge lists, then tables.
pub fn format_payload(variant: AnalysisVariant, payload: &ResultPayload, directed: bool) -> String {
    if payload.is_empty() {
        return format!("{}: no data\n", variant.label());
    }
    let graph_variant = if directed && is_directed_relation(variant) {
        GraphVariant::Directed
    } else {
        GraphVariant::Plain
    };
    let mut out = format!("{}\n", variant.label());
    for (i, descriptor) in payload.graphs.iter().enumerate() {
        let graph = VisualGraph::from_descriptor(descriptor, graph_variant);
        let _ = writeln!(
            out,
            "\nGraph {} ({} nodes, {} edges)",
            i + 1,
            graph.nodes.len(),
            graph.edges.len()
        );
        out.push_str(&format_edge_list(&graph));
    }
    for (i, descriptor) in payload.tables.iter().enumerate() {
        let table = TableView::from_descriptor(descriptor);
        let _ = writeln!(out, "\nTable {} ({} rows)", i + 1, table.rows.len());
        out.push_str(&format_table(&table));
    }
    out
}

pub fn format_edge_list(graph: &VisualGraph) -> String {
    let arrow = match graph.variant {
        GraphVariant::Directed => "->",
        GraphVariant::Plain => "--",
    };
    let mut out = String::new();
    for edge in &graph.edges {
        let from = &graph.nodes[edge.source].id;
        let to = &graph.nodes[edge.target].id;
        let label = edge.label();
        if label.is_empty() {
            let _ = writeln!(out, "  {from} {arrow} {to}");
        } else {
            let _ = writeln!(out, "  {from} {arrow} {to}  [{label}]");
        }
    }
    out
}

/// Left-aligned columns separated by two spaces, with a rule under the header.
pub fn format_table(table: &TableView) -> String {
    let widths = table.column_widths();
    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}", w = *w))
            .collect();
        format!("  {}\n", padded.join("  ").trim_end())
    };
    let mut out = line(&table.headers);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(&rule));
    for row in &table.rows {
        out.push_str(&line(row));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ci_protocol::{EdgeDescriptor, GraphDescriptor, SkeletonRelation, TableDescriptor};
    use serde_json::json;

    #[test]
    fn params_split_on_first_equals() {
        assert_eq!(
            parse_param("start_time=2024-01-01T00:00=Z").unwrap(),
            ("start_time".to_string(), "2024-01-01T00:00=Z".to_string())
        );
        assert!(parse_param("resource").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn variant_resolves_with_or_without_prefix() {
        let v = resolve_variant("log_skeleton", "always_before").unwrap();
        assert_eq!(v, AnalysisVariant::LogSkeleton(SkeletonRelation::AlwaysBefore));
        assert_eq!(resolve_variant("log_skeleton", &v.tag()).unwrap(), v);
        assert!(resolve_variant("temporal", &v.tag()).is_err());
        assert!(resolve_variant("nope", "x").is_err());
    }

    #[test]
    fn edge_list_shows_merged_labels() {
        let descriptor = GraphDescriptor::new(
            ["A", "B"],
            vec![
                EdgeDescriptor::new("A", "B", "1"),
                EdgeDescriptor::new("A", "B", "2"),
                EdgeDescriptor::new("A", "Z", "dropped"),
            ],
        );
        let graph = VisualGraph::from_descriptor(&descriptor, GraphVariant::Directed);
        assert_eq!(format_edge_list(&graph), "  A -> B  [1, 2]\n");
    }

    #[test]
    fn table_columns_are_aligned() {
        let table = TableView::from_descriptor(&TableDescriptor::Rows {
            headers: vec!["Name".into(), "N".into()],
            rows: vec![vec![json!("a"), json!(10)], vec![json!("long"), json!(2)]],
        });
        assert_eq!(
            format_table(&table),
            "  Name  N\n  ----  --\n  a     10\n  long  2\n"
        );
    }

    #[test]
    fn empty_payload_says_so() {
        let text = format_payload(
            AnalysisVariant::TemporalConformance,
            &ResultPayload::default(),
            true,
        );
        assert_eq!(text, "Temporal Conformance: no data\n");
    }
}
