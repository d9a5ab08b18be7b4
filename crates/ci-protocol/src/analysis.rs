//! Catalog of the analyses the backend offers.
//!
//! Every option a results tab can show is keyed by a stable tag
//! (`log_skeleton.always_before`, `declarative.response`, ...). The human
//! label is a separate display attribute and never used for routing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A family of analyses sharing one server-side job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFamily {
    GeneralInsights,
    LogSkeleton,
    TemporalProfile,
    DeclarativeConstraints,
    ResourceBased,
}

impl AnalysisFamily {
    pub const ALL: [AnalysisFamily; 5] = [
        AnalysisFamily::GeneralInsights,
        AnalysisFamily::LogSkeleton,
        AnalysisFamily::TemporalProfile,
        AnalysisFamily::DeclarativeConstraints,
        AnalysisFamily::ResourceBased,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            AnalysisFamily::GeneralInsights => "general",
            AnalysisFamily::LogSkeleton => "log_skeleton",
            AnalysisFamily::TemporalProfile => "temporal",
            AnalysisFamily::DeclarativeConstraints => "declarative",
            AnalysisFamily::ResourceBased => "resource",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisFamily::GeneralInsights => "General Insights",
            AnalysisFamily::LogSkeleton => "Log Skeleton",
            AnalysisFamily::TemporalProfile => "Temporal Profile",
            AnalysisFamily::DeclarativeConstraints => "Declarative Constraints",
            AnalysisFamily::ResourceBased => "Resource Based",
        }
    }

    /// Path of the endpoint that starts the family's job, or `None` when the
    /// family is served synchronously.
    pub fn start_path(&self) -> Option<&'static str> {
        match self {
            AnalysisFamily::GeneralInsights => None,
            AnalysisFamily::LogSkeleton => Some("/api/log-skeleton/compute-skeleton"),
            AnalysisFamily::TemporalProfile => Some("/api/temporal-profile/compute-result"),
            AnalysisFamily::DeclarativeConstraints => {
                Some("/api/declarative-constraints/compute-constraints")
            }
            AnalysisFamily::ResourceBased => Some("/api/resource-based/compute"),
        }
    }

    /// Variants offered in this family's dropdown, in display order.
    pub fn variants(&self) -> Vec<AnalysisVariant> {
        match self {
            AnalysisFamily::GeneralInsights => vec![AnalysisVariant::GeneralInformation],
            AnalysisFamily::LogSkeleton => SkeletonRelation::ALL
                .iter()
                .copied()
                .map(AnalysisVariant::LogSkeleton)
                .collect(),
            AnalysisFamily::TemporalProfile => vec![AnalysisVariant::TemporalConformance],
            AnalysisFamily::DeclarativeConstraints => ConstraintTemplate::ALL
                .iter()
                .copied()
                .map(AnalysisVariant::Declarative)
                .collect(),
            AnalysisFamily::ResourceBased => ResourceView::ALL
                .iter()
                .copied()
                .map(AnalysisVariant::Resource)
                .collect(),
        }
    }
}

impl fmt::Display for AnalysisFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for AnalysisFamily {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisFamily::ALL
            .iter()
            .copied()
            .find(|f| f.tag() == s)
            .ok_or_else(|| ProtocolError::UnknownFamily(s.to_string()))
    }
}

/// Behavioral relations of a log skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkeletonRelation {
    Equivalence,
    AlwaysBefore,
    AlwaysAfter,
    NeverTogether,
    DirectlyFollowsAndCount,
}

impl SkeletonRelation {
    pub const ALL: [SkeletonRelation; 5] = [
        SkeletonRelation::Equivalence,
        SkeletonRelation::AlwaysBefore,
        SkeletonRelation::AlwaysAfter,
        SkeletonRelation::NeverTogether,
        SkeletonRelation::DirectlyFollowsAndCount,
    ];

    fn key(&self) -> &'static str {
        match self {
            SkeletonRelation::Equivalence => "equivalence",
            SkeletonRelation::AlwaysBefore => "always_before",
            SkeletonRelation::AlwaysAfter => "always_after",
            SkeletonRelation::NeverTogether => "never_together",
            SkeletonRelation::DirectlyFollowsAndCount => "directly_follows_and_count",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            SkeletonRelation::Equivalence => "Equivalence",
            SkeletonRelation::AlwaysBefore => "Always Before",
            SkeletonRelation::AlwaysAfter => "Always After",
            SkeletonRelation::NeverTogether => "Never Together",
            SkeletonRelation::DirectlyFollowsAndCount => "Directly Follows",
        }
    }
}

/// Declarative constraint templates checked for violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintTemplate {
    Existence,
    Absence,
    ExactlyOne,
    Init,
    RespondedExistence,
    Coexistence,
    Response,
    Precedence,
    Succession,
    AltPrecedence,
    AltSuccession,
    ChainResponse,
    ChainPrecedence,
    ChainSuccession,
    NonCoexistence,
    NonSuccession,
    NonChainSuccession,
}

impl ConstraintTemplate {
    pub const ALL: [ConstraintTemplate; 17] = [
        ConstraintTemplate::Existence,
        ConstraintTemplate::Absence,
        ConstraintTemplate::ExactlyOne,
        ConstraintTemplate::Init,
        ConstraintTemplate::RespondedExistence,
        ConstraintTemplate::Coexistence,
        ConstraintTemplate::Response,
        ConstraintTemplate::Precedence,
        ConstraintTemplate::Succession,
        ConstraintTemplate::AltPrecedence,
        ConstraintTemplate::AltSuccession,
        ConstraintTemplate::ChainResponse,
        ConstraintTemplate::ChainPrecedence,
        ConstraintTemplate::ChainSuccession,
        ConstraintTemplate::NonCoexistence,
        ConstraintTemplate::NonSuccession,
        ConstraintTemplate::NonChainSuccession,
    ];

    fn key(&self) -> &'static str {
        match self {
            ConstraintTemplate::Existence => "existence",
            ConstraintTemplate::Absence => "absence",
            ConstraintTemplate::ExactlyOne => "exactly_one",
            ConstraintTemplate::Init => "init",
            ConstraintTemplate::RespondedExistence => "responded_existence",
            ConstraintTemplate::Coexistence => "coexistence",
            ConstraintTemplate::Response => "response",
            ConstraintTemplate::Precedence => "precedence",
            ConstraintTemplate::Succession => "succession",
            ConstraintTemplate::AltPrecedence => "altprecedence",
            ConstraintTemplate::AltSuccession => "altsuccession",
            ConstraintTemplate::ChainResponse => "chainresponse",
            ConstraintTemplate::ChainPrecedence => "chainprecedence",
            ConstraintTemplate::ChainSuccession => "chainsuccession",
            ConstraintTemplate::NonCoexistence => "noncoexistence",
            ConstraintTemplate::NonSuccession => "nonsuccession",
            ConstraintTemplate::NonChainSuccession => "nonchainsuccession",
        }
    }

    /// Segment used by the backend route. The existence route keeps the
    /// backend's historical spelling.
    fn route_key(&self) -> &'static str {
        match self {
            ConstraintTemplate::Existence => "existance",
            other => other.key(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConstraintTemplate::Existence => "Existence",
            ConstraintTemplate::Absence => "Absence",
            ConstraintTemplate::ExactlyOne => "Exactly One",
            ConstraintTemplate::Init => "Init",
            ConstraintTemplate::RespondedExistence => "Responded Existence",
            ConstraintTemplate::Coexistence => "Coexistence",
            ConstraintTemplate::Response => "Response",
            ConstraintTemplate::Precedence => "Precedence",
            ConstraintTemplate::Succession => "Succession",
            ConstraintTemplate::AltPrecedence => "Alternate Precedence",
            ConstraintTemplate::AltSuccession => "Alternate Succession",
            ConstraintTemplate::ChainResponse => "Chain Response",
            ConstraintTemplate::ChainPrecedence => "Chain Precedence",
            ConstraintTemplate::ChainSuccession => "Chain Succession",
            ConstraintTemplate::NonCoexistence => "Non Coexistence",
            ConstraintTemplate::NonSuccession => "Non Succession",
            ConstraintTemplate::NonChainSuccession => "Non Chain Succession",
        }
    }
}

/// Resource-based views backed by the resource job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceView {
    HandoverOfWork,
    Subcontracting,
    WorkingTogether,
    SimilarActivities,
    RoleDiscovery,
    GroupRelativeFocus,
    GroupRelativeStake,
    GroupCoverage,
    GroupMemberContribution,
}

impl ResourceView {
    pub const ALL: [ResourceView; 9] = [
        ResourceView::HandoverOfWork,
        ResourceView::Subcontracting,
        ResourceView::WorkingTogether,
        ResourceView::SimilarActivities,
        ResourceView::RoleDiscovery,
        ResourceView::GroupRelativeFocus,
        ResourceView::GroupRelativeStake,
        ResourceView::GroupCoverage,
        ResourceView::GroupMemberContribution,
    ];

    fn key(&self) -> &'static str {
        match self {
            ResourceView::HandoverOfWork => "handover_of_work",
            ResourceView::Subcontracting => "subcontracting",
            ResourceView::WorkingTogether => "working_together",
            ResourceView::SimilarActivities => "similar_activities",
            ResourceView::RoleDiscovery => "role_discovery",
            ResourceView::GroupRelativeFocus => "group_relative_focus",
            ResourceView::GroupRelativeStake => "group_relative_stake",
            ResourceView::GroupCoverage => "group_coverage",
            ResourceView::GroupMemberContribution => "group_member_contribution",
        }
    }

    fn path(&self) -> &'static str {
        match self {
            ResourceView::HandoverOfWork => "/api/resource-based/sna/handover-of-work",
            ResourceView::Subcontracting => "/api/resource-based/sna/subcontracting",
            ResourceView::WorkingTogether => "/api/resource-based/sna/working-together",
            ResourceView::SimilarActivities => "/api/resource-based/sna/similar-activities",
            ResourceView::RoleDiscovery => "/api/resource-based/role-discovery",
            ResourceView::GroupRelativeFocus => {
                "/api/resource-based/organizational-mining/group-relative-focus"
            }
            ResourceView::GroupRelativeStake => {
                "/api/resource-based/organizational-mining/group-relative-stake"
            }
            ResourceView::GroupCoverage => "/api/resource-based/organizational-mining/group-coverage",
            ResourceView::GroupMemberContribution => {
                "/api/resource-based/organizational-mining/group-member-contribution"
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ResourceView::HandoverOfWork => "Handover of Work",
            ResourceView::Subcontracting => "Subcontracting",
            ResourceView::WorkingTogether => "Working Together",
            ResourceView::SimilarActivities => "Similar Activities",
            ResourceView::RoleDiscovery => "Role Discovery",
            ResourceView::GroupRelativeFocus => "Group Relative Focus",
            ResourceView::GroupRelativeStake => "Group Relative Stake",
            ResourceView::GroupCoverage => "Group Coverage",
            ResourceView::GroupMemberContribution => "Group Member Contribution",
        }
    }

    /// Social-network views come back as weighted connection lists.
    pub fn is_social_network(&self) -> bool {
        matches!(
            self,
            ResourceView::HandoverOfWork
                | ResourceView::Subcontracting
                | ResourceView::WorkingTogether
                | ResourceView::SimilarActivities
        )
    }
}

/// One selectable option of a results tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisVariant {
    GeneralInformation,
    LogSkeleton(SkeletonRelation),
    TemporalConformance,
    Declarative(ConstraintTemplate),
    Resource(ResourceView),
}

impl AnalysisVariant {
    pub fn family(&self) -> AnalysisFamily {
        match self {
            AnalysisVariant::GeneralInformation => AnalysisFamily::GeneralInsights,
            AnalysisVariant::LogSkeleton(_) => AnalysisFamily::LogSkeleton,
            AnalysisVariant::TemporalConformance => AnalysisFamily::TemporalProfile,
            AnalysisVariant::Declarative(_) => AnalysisFamily::DeclarativeConstraints,
            AnalysisVariant::Resource(_) => AnalysisFamily::ResourceBased,
        }
    }

    /// Stable identifier, `<family>.<variant>`.
    pub fn tag(&self) -> String {
        let variant = match self {
            AnalysisVariant::GeneralInformation => "information",
            AnalysisVariant::LogSkeleton(r) => r.key(),
            AnalysisVariant::TemporalConformance => "conformance",
            AnalysisVariant::Declarative(t) => t.key(),
            AnalysisVariant::Resource(v) => v.key(),
        };
        format!("{}.{}", self.family().tag(), variant)
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisVariant::GeneralInformation => "General Information",
            AnalysisVariant::LogSkeleton(r) => r.label(),
            AnalysisVariant::TemporalConformance => "Temporal Conformance",
            AnalysisVariant::Declarative(t) => t.label(),
            AnalysisVariant::Resource(v) => v.label(),
        }
    }

    /// Path of the result endpoint. For job-backed variants the job id is
    /// appended as the last path segment.
    pub fn result_path(&self) -> String {
        match self {
            AnalysisVariant::GeneralInformation => {
                "/api/general/get-general-information".to_string()
            }
            AnalysisVariant::LogSkeleton(r) => format!("/api/log-skeleton/get_{}", r.key()),
            AnalysisVariant::TemporalConformance => "/api/temporal-profile/get-result".to_string(),
            AnalysisVariant::Declarative(t) => format!(
                "/api/declarative-constraints/get_{}_violations",
                t.route_key()
            ),
            AnalysisVariant::Resource(v) => v.path().to_string(),
        }
    }

    pub fn requires_job(&self) -> bool {
        self.family().start_path().is_some()
    }

    /// Every variant of every family.
    pub fn all() -> Vec<AnalysisVariant> {
        AnalysisFamily::ALL
            .iter()
            .flat_map(|f| f.variants())
            .collect()
    }
}

impl fmt::Display for AnalysisVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for AnalysisVariant {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisVariant::all()
            .into_iter()
            .find(|v| v.tag() == s)
            .ok_or_else(|| ProtocolError::UnknownVariant(s.to_string()))
    }
}

/// Scalar resource-profile metrics, answered synchronously as plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceMetric {
    DistinctActivities,
    ActivityFrequency,
    ActivityCompletions,
    CaseCompletions,
    FractionCaseCompletions,
    AverageWorkload,
    Multitasking,
    AverageActivityDuration,
    AverageCaseDuration,
    InteractionTwoResources,
    SocialPosition,
}

impl ResourceMetric {
    pub const ALL: [ResourceMetric; 11] = [
        ResourceMetric::DistinctActivities,
        ResourceMetric::ActivityFrequency,
        ResourceMetric::ActivityCompletions,
        ResourceMetric::CaseCompletions,
        ResourceMetric::FractionCaseCompletions,
        ResourceMetric::AverageWorkload,
        ResourceMetric::Multitasking,
        ResourceMetric::AverageActivityDuration,
        ResourceMetric::AverageCaseDuration,
        ResourceMetric::InteractionTwoResources,
        ResourceMetric::SocialPosition,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ResourceMetric::DistinctActivities => "distinct-activities",
            ResourceMetric::ActivityFrequency => "activity-frequency",
            ResourceMetric::ActivityCompletions => "activity-completions",
            ResourceMetric::CaseCompletions => "case-completions",
            ResourceMetric::FractionCaseCompletions => "fraction-case-completions",
            ResourceMetric::AverageWorkload => "average-workload",
            ResourceMetric::Multitasking => "multitasking",
            ResourceMetric::AverageActivityDuration => "average-activity-duration",
            ResourceMetric::AverageCaseDuration => "average-case-duration",
            ResourceMetric::InteractionTwoResources => "interaction-two-resources",
            ResourceMetric::SocialPosition => "social-position",
        }
    }

    pub fn path(&self) -> String {
        format!("/api/resource-based/resource-profile/{}", self.tag())
    }
}

impl fmt::Display for ResourceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ResourceMetric {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceMetric::ALL
            .iter()
            .copied()
            .find(|m| m.tag() == s)
            .ok_or_else(|| ProtocolError::UnknownMetric(s.to_string()))
    }
}
