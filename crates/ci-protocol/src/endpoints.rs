//! Static mapping from logical operations to backend URLs.

use crate::analysis::{AnalysisFamily, AnalysisVariant, ResourceMetric};
use crate::constants::DEFAULT_API_BASE;

/// Resolves every backend operation against one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base: String,
}

impl ApiEndpoints {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn credentials(&self) -> String {
        self.url("/api/setup/celonis-credentials")
    }

    pub fn upload_log(&self) -> String {
        self.url("/api/logs/upload-log")
    }

    pub fn column_names(&self) -> String {
        self.url("/api/setup/get-column-names")
    }

    pub fn commit_mapping(&self) -> String {
        self.url("/api/logs/commit-log-to-celonis")
    }

    pub fn job_status(&self, job_id: &str) -> String {
        self.url(&format!("/api/jobs/{job_id}"))
    }

    /// Compute endpoint of a family; `None` for synchronous families.
    pub fn start(&self, family: AnalysisFamily) -> Option<String> {
        family.start_path().map(|p| self.url(p))
    }

    /// Result endpoint of a variant. Job-backed variants need the job id.
    pub fn result(&self, variant: AnalysisVariant, job_id: Option<&str>) -> String {
        match job_id {
            Some(id) => self.url(&format!("{}/{}", variant.result_path(), id)),
            None => self.url(&variant.result_path()),
        }
    }

    pub fn metric(&self, metric: ResourceMetric) -> String {
        self.url(&metric.path())
    }
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SkeletonRelation;

    #[test]
    fn trailing_slash_is_trimmed() {
        let ep = ApiEndpoints::new("http://backend:8000/");
        assert_eq!(ep.column_names(), "http://backend:8000/api/setup/get-column-names");
    }

    #[test]
    fn result_url_appends_job_id() {
        let ep = ApiEndpoints::default();
        let url = ep.result(
            AnalysisVariant::LogSkeleton(SkeletonRelation::AlwaysBefore),
            Some("job-1"),
        );
        assert_eq!(url, "http://localhost:8000/api/log-skeleton/get_always_before/job-1");
    }

    #[test]
    fn synchronous_family_has_no_start() {
        let ep = ApiEndpoints::default();
        assert!(ep.start(AnalysisFamily::GeneralInsights).is_none());
        assert_eq!(
            ep.start(AnalysisFamily::ResourceBased).as_deref(),
            Some("http://localhost:8000/api/resource-based/compute")
        );
    }
}
