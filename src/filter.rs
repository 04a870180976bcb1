//! Quality filter pipeline over merged articles.
//!
//! The pipeline is an ordered list of [`Stage`]s run over the whole
//! collection. Each stage either drops records or fills in a derived field
//! on the survivors; later stages only see what earlier ones kept. Nothing
//! is retried and nothing is reported per record: the [`FilterReport`]
//! stage counts are the only trace of what was dropped.
//!
//! # Configurations
//!
//! Two collection flows feed this pipeline and they disagree on one stage,
//! so both are kept as named presets:
//!
//! | Preset | Stages | Link column |
//! |--------|--------|-------------|
//! | [`PipelineConfig::onboarding`] | all seven | `found_link` |
//! | [`PipelineConfig::store_batch`] | all but the actual-word-count floor | `link` |

use crate::models::ArticleRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Default floor for both word counts; counts at or below it are dropped.
pub const DEFAULT_MIN_WORD_COUNT: i64 = 100;
/// Default ceiling for the percent difference; values at or above it are dropped.
pub const DEFAULT_MAX_PERCENT_DIFF: f64 = 300.0;

/// One step of the filter pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Drop records with no body text.
    RejectMissingText,
    /// Coerce the reported word count and drop records at or below the floor.
    ReportedWordCountFloor,
    /// Count whitespace-delimited tokens in the body text.
    DeriveActualWordCount,
    /// Drop records whose actual word count is at or below the floor.
    ActualWordCountFloor,
    /// Relative gap between the reported and actual counts, in percent.
    DerivePercentDiff,
    /// Drop records whose percent difference reaches the ceiling.
    ConsistencyCeiling,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::RejectMissingText => "reject_missing_text",
            Stage::ReportedWordCountFloor => "reported_word_count_floor",
            Stage::DeriveActualWordCount => "derive_actual_word_count",
            Stage::ActualWordCountFloor => "actual_word_count_floor",
            Stage::DerivePercentDiff => "derive_percent_diff",
            Stage::ConsistencyCeiling => "consistency_ceiling",
        }
    }
}

/// An output column of the articles table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    ResolvedId,
    WordCount,
    ActualWordCount,
    ResolvedTitle,
    ResolvedUrl,
    Text,
    IsArchived,
    Excerpt,
    Tags,
    Type,
    PercentDiff,
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::ResolvedId => "resolved_id",
            Column::WordCount => "word_count",
            Column::ActualWordCount => "actual_word_count",
            Column::ResolvedTitle => "resolved_title",
            Column::ResolvedUrl => "resolved_url",
            Column::Text => "text",
            Column::IsArchived => "is_archived",
            Column::Excerpt => "excerpt",
            Column::Tags => "tags",
            Column::Type => "type",
            Column::PercentDiff => "percent_diff",
        }
    }
}

/// Columns kept in the articles table by both presets.
pub const ARTICLE_COLUMNS: [Column; 9] = [
    Column::ResolvedId,
    Column::WordCount,
    Column::ActualWordCount,
    Column::ResolvedTitle,
    Column::ResolvedUrl,
    Column::Text,
    Column::IsArchived,
    Column::Excerpt,
    Column::Tags,
];

/// Name of the target column in the links table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkColumn {
    Link,
    FoundLink,
}

impl LinkColumn {
    pub fn name(self) -> &'static str {
        match self {
            LinkColumn::Link => "link",
            LinkColumn::FoundLink => "found_link",
        }
    }
}

/// Which preset a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Onboarding,
    StoreBatch,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Onboarding => f.write_str("onboarding"),
            PipelineKind::StoreBatch => f.write_str("store-batch"),
        }
    }
}

impl FromStr for PipelineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onboarding" => Ok(PipelineKind::Onboarding),
            "store-batch" | "store_batch" => Ok(PipelineKind::StoreBatch),
            other => Err(format!(
                "unknown pipeline '{other}' (expected 'onboarding' or 'store-batch')"
            )),
        }
    }
}

/// A named filter configuration: the stages to run, their thresholds, and
/// the shape of the two output tables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub kind: PipelineKind,
    pub stages: Vec<Stage>,
    pub min_word_count: i64,
    pub max_percent_diff: f64,
    pub fields: Vec<Column>,
    pub link_column: LinkColumn,
}

impl PipelineConfig {
    /// The scrape-everything flow: every stage, including the floor on the
    /// actual word count.
    pub fn onboarding() -> Self {
        Self {
            kind: PipelineKind::Onboarding,
            stages: vec![
                Stage::RejectMissingText,
                Stage::ReportedWordCountFloor,
                Stage::DeriveActualWordCount,
                Stage::ActualWordCountFloor,
                Stage::DerivePercentDiff,
                Stage::ConsistencyCeiling,
            ],
            min_word_count: DEFAULT_MIN_WORD_COUNT,
            max_percent_diff: DEFAULT_MAX_PERCENT_DIFF,
            fields: ARTICLE_COLUMNS.to_vec(),
            link_column: LinkColumn::FoundLink,
        }
    }

    /// The flow over stored, analysis-enriched bookmarks. It has no floor
    /// on the actual word count and also keeps the content type and the
    /// percent difference.
    pub fn store_batch() -> Self {
        let mut fields = ARTICLE_COLUMNS.to_vec();
        fields.extend([Column::Type, Column::PercentDiff]);
        Self {
            kind: PipelineKind::StoreBatch,
            stages: vec![
                Stage::RejectMissingText,
                Stage::ReportedWordCountFloor,
                Stage::DeriveActualWordCount,
                Stage::DerivePercentDiff,
                Stage::ConsistencyCeiling,
            ],
            min_word_count: DEFAULT_MIN_WORD_COUNT,
            max_percent_diff: DEFAULT_MAX_PERCENT_DIFF,
            fields,
            link_column: LinkColumn::Link,
        }
    }

    pub fn for_kind(kind: PipelineKind) -> Self {
        match kind {
            PipelineKind::Onboarding => Self::onboarding(),
            PipelineKind::StoreBatch => Self::store_batch(),
        }
    }
}

/// An article plus the fields derived while it moves through the stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArticle {
    pub record: ArticleRecord,
    /// Reported word count as an integer; set by the reported-count floor.
    pub word_count: Option<i64>,
    pub actual_word_count: Option<usize>,
    pub percent_diff: Option<f64>,
}

impl ScoredArticle {
    fn new(record: ArticleRecord) -> Self {
        Self {
            record,
            word_count: None,
            actual_word_count: None,
            percent_diff: None,
        }
    }

    /// Restrict this article to the given columns, in order.
    pub fn project(&self, fields: &[Column]) -> Map<String, Value> {
        let r = &self.record;
        fields
            .iter()
            .map(|&column| {
                let value = match column {
                    Column::ResolvedId => Value::from(r.resolved_id.clone()),
                    Column::WordCount => Value::from(self.word_count),
                    Column::ActualWordCount => Value::from(self.actual_word_count),
                    Column::ResolvedTitle => Value::from(r.resolved_title.clone()),
                    Column::ResolvedUrl => Value::from(r.resolved_url.clone()),
                    Column::Text => Value::from(r.text.clone()),
                    Column::IsArchived => Value::from(r.is_archived),
                    Column::Excerpt => Value::from(r.excerpt.clone()),
                    Column::Tags => r
                        .tags
                        .as_ref()
                        .map(|tags| Value::Object(tags.clone().into_iter().collect()))
                        .unwrap_or(Value::Null),
                    Column::Type => Value::from(r.kind.clone()),
                    Column::PercentDiff => Value::from(self.percent_diff),
                };
                (column.name().to_string(), value)
            })
            .collect()
    }
}

/// Record counts around one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: &'static str,
    pub before: usize,
    pub after: usize,
}

impl StageOutcome {
    pub fn dropped(&self) -> usize {
        self.before.saturating_sub(self.after)
    }
}

/// Per-stage counts for one run of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub pipeline: String,
    pub input: usize,
    pub output: usize,
    pub stages: Vec<StageOutcome>,
}

impl FilterReport {
    /// Stages that removed at least one record.
    pub fn dropping_stages(&self) -> impl Iterator<Item = &StageOutcome> {
        self.stages.iter().filter(|s| s.dropped() > 0)
    }
}

/// Whitespace-delimited token count.
pub fn actual_word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// `|actual - reported| * 100 / reported`.
///
/// Callers guarantee `reported` is positive; the reported-count floor runs
/// before this is ever computed.
pub fn percent_diff(actual: usize, reported: i64) -> f64 {
    let gap = (actual as f64 - reported as f64).abs();
    gap * 100.0 / reported as f64
}

fn apply_stage(stage: Stage, config: &PipelineConfig, articles: Vec<ScoredArticle>) -> Vec<ScoredArticle> {
    match stage {
        Stage::RejectMissingText => articles
            .into_iter()
            .filter(|a| a.record.text.as_deref().is_some_and(|t| !t.is_empty()))
            .collect(),
        Stage::ReportedWordCountFloor => articles
            .into_iter()
            .filter_map(|mut a| {
                let count = a.record.word_count.as_ref()?.as_i64()?;
                a.word_count = Some(count);
                (count > config.min_word_count).then_some(a)
            })
            .collect(),
        Stage::DeriveActualWordCount => articles
            .into_iter()
            .map(|mut a| {
                a.actual_word_count = Some(a.record.text.as_deref().map_or(0, actual_word_count));
                a
            })
            .collect(),
        Stage::ActualWordCountFloor => articles
            .into_iter()
            .filter(|a| {
                a.actual_word_count
                    .is_some_and(|n| n as i64 > config.min_word_count)
            })
            .collect(),
        Stage::DerivePercentDiff => articles
            .into_iter()
            .map(|mut a| {
                if let (Some(actual), Some(reported)) = (a.actual_word_count, a.word_count) {
                    if reported > 0 {
                        a.percent_diff = Some(percent_diff(actual, reported));
                    }
                }
                a
            })
            .collect(),
        Stage::ConsistencyCeiling => articles
            .into_iter()
            .filter(|a| a.percent_diff.is_some_and(|p| p < config.max_percent_diff))
            .collect(),
    }
}

/// Run every stage of `config` over `records` and return the survivors with
/// their derived fields, plus the per-stage counts.
#[instrument(level = "info", skip_all, fields(pipeline = %config.kind))]
pub fn filter(records: Vec<ArticleRecord>, config: &PipelineConfig) -> (Vec<ScoredArticle>, FilterReport) {
    let input = records.len();
    let mut articles: Vec<ScoredArticle> = records.into_iter().map(ScoredArticle::new).collect();
    let mut stages = Vec::with_capacity(config.stages.len());

    for &stage in &config.stages {
        let before = articles.len();
        articles = apply_stage(stage, config, articles);
        let outcome = StageOutcome {
            stage: stage.name(),
            before,
            after: articles.len(),
        };
        debug!(stage = outcome.stage, before, after = outcome.after, "Applied filter stage");
        stages.push(outcome);
    }

    let report = FilterReport {
        pipeline: config.kind.to_string(),
        input,
        output: articles.len(),
        stages,
    };
    info!(
        input = report.input,
        output = report.output,
        dropped = input - report.output,
        "Filtered articles"
    );
    (articles, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NumericField, RawAnalysisRecord, RawBookmarkRecord};
    use crate::normalize::normalize;

    fn words(n: usize) -> String {
        "word ".repeat(n)
    }

    fn article(id: &str, reported: Option<NumericField>, text: Option<String>) -> ArticleRecord {
        ArticleRecord {
            resolved_id: id.to_string(),
            resolved_title: Some(format!("Title {id}")),
            resolved_url: Some(format!("https://example.com/{id}")),
            excerpt: None,
            text,
            kind: Some("article".to_string()),
            word_count: reported,
            is_archived: false,
            tags: None,
        }
    }

    fn ids(articles: &[ScoredArticle]) -> Vec<&str> {
        articles.iter().map(|a| a.record.resolved_id.as_str()).collect()
    }

    #[test]
    fn test_missing_and_empty_text_rejected() {
        let records = vec![
            article("none", Some(200.into()), None),
            article("empty", Some(200.into()), Some(String::new())),
            article("ok", Some(200.into()), Some(words(200))),
        ];
        let (out, report) = filter(records, &PipelineConfig::onboarding());
        assert_eq!(ids(&out), vec!["ok"]);
        assert_eq!(report.stages[0].dropped(), 2);
    }

    #[test]
    fn test_word_count_floor_boundary() {
        let records = vec![
            article("at", Some("100".into()), Some(words(100))),
            article("above", Some("101".into()), Some(words(101))),
        ];
        let (out, _) = filter(records, &PipelineConfig::onboarding());
        assert_eq!(ids(&out), vec!["above"]);
        assert_eq!(out[0].word_count, Some(101));
        assert_eq!(out[0].actual_word_count, Some(101));
    }

    #[test]
    fn test_non_numeric_word_count_dropped() {
        let records = vec![
            article("text", Some("lots".into()), Some(words(300))),
            article("absent", None, Some(words(300))),
        ];
        let (out, report) = filter(records, &PipelineConfig::store_batch());
        assert!(out.is_empty());
        assert_eq!(report.stages[1].dropped(), 2);
    }

    #[test]
    fn test_actual_word_count_floor_only_in_onboarding() {
        // 150 reported, 60 scraped: 60% off, under the ceiling.
        let records = vec![article("short", Some(150.into()), Some(words(60)))];

        let (out, _) = filter(records.clone(), &PipelineConfig::onboarding());
        assert!(out.is_empty());

        let (out, _) = filter(records, &PipelineConfig::store_batch());
        assert_eq!(ids(&out), vec!["short"]);
        assert_eq!(out[0].actual_word_count, Some(60));
        assert_eq!(out[0].percent_diff, Some(60.0));
    }

    #[test]
    fn test_consistency_ceiling_boundary() {
        let records = vec![
            article("at", Some(200.into()), Some(words(800))),
            article("below", Some(200.into()), Some(words(799))),
        ];
        let (out, report) = filter(records, &PipelineConfig::onboarding());
        assert_eq!(ids(&out), vec!["below"]);
        assert_eq!(out[0].percent_diff, Some(299.5));
        assert_eq!(report.stages.last().unwrap().dropped(), 1);
    }

    #[test]
    fn test_percent_diff_is_symmetric_in_sign() {
        assert_eq!(percent_diff(150, 200), 25.0);
        assert_eq!(percent_diff(250, 200), 25.0);
        assert_eq!(percent_diff(200, 200), 0.0);
    }

    #[test]
    fn test_output_is_subset_and_idempotent() {
        let records = vec![
            article("a", Some(150.into()), Some(words(150))),
            article("b", Some(50.into()), Some(words(50))),
            article("c", Some(120.into()), None),
            article("d", Some(110.into()), Some(words(900))),
            article("e", Some("400".into()), Some(words(380))),
        ];
        let input_ids: Vec<String> = records.iter().map(|r| r.resolved_id.clone()).collect();

        for config in [PipelineConfig::onboarding(), PipelineConfig::store_batch()] {
            let (once, _) = filter(records.clone(), &config);
            assert!(once.iter().all(|a| input_ids.contains(&a.record.resolved_id)));

            let again_input = once.iter().map(|a| a.record.clone()).collect();
            let (twice, report) = filter(again_input, &config);
            assert_eq!(ids(&once), ids(&twice));
            assert_eq!(report.dropping_stages().count(), 0);
        }
    }

    #[test]
    fn test_projection_keeps_configured_columns_in_order() {
        let records = vec![article("a", Some(150.into()), Some(words(150)))];

        let config = PipelineConfig::onboarding();
        let (out, _) = filter(records.clone(), &config);
        let row = out[0].project(&config.fields);
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "resolved_id",
                "word_count",
                "actual_word_count",
                "resolved_title",
                "resolved_url",
                "text",
                "is_archived",
                "excerpt",
                "tags",
            ]
        );
        assert!(!row.contains_key("type"));
        assert_eq!(row["word_count"], 150);
        assert_eq!(row["actual_word_count"], 150);

        let config = PipelineConfig::store_batch();
        let (out, _) = filter(records, &config);
        let row = out[0].project(&config.fields);
        assert_eq!(row["type"], "article");
        assert_eq!(row["percent_diff"], 0.0);
        let tail: Vec<&str> = row.keys().skip(ARTICLE_COLUMNS.len()).map(String::as_str).collect();
        assert_eq!(tail, vec!["type", "percent_diff"]);
    }

    #[test]
    fn test_presets_differ_in_floor_and_shape() {
        let onboarding = PipelineConfig::onboarding();
        let batch = PipelineConfig::for_kind(PipelineKind::StoreBatch);

        assert!(onboarding.stages.contains(&Stage::ActualWordCountFloor));
        assert!(!batch.stages.contains(&Stage::ActualWordCountFloor));
        assert_eq!(batch.stages.len(), onboarding.stages.len() - 1);
        assert_eq!(onboarding.link_column, LinkColumn::FoundLink);
        assert_eq!(batch.link_column, LinkColumn::Link);
        assert!(batch.fields.contains(&Column::Type));
        assert!(!onboarding.fields.contains(&Column::Type));
    }

    #[test]
    fn test_pipeline_kind_parsing() {
        assert_eq!("onboarding".parse::<PipelineKind>(), Ok(PipelineKind::Onboarding));
        assert_eq!("store-batch".parse::<PipelineKind>(), Ok(PipelineKind::StoreBatch));
        assert!("nightly".parse::<PipelineKind>().is_err());
        assert_eq!(PipelineKind::StoreBatch.to_string(), "store-batch");
    }

    #[test]
    fn test_end_to_end_single_archived_article() {
        let bookmark: RawBookmarkRecord = serde_json::from_value(serde_json::json!({
            "resolved_id": "1",
            "resolved_title": "A",
            "status": "1",
            "word_count": "150"
        }))
        .unwrap();
        let analysis = RawAnalysisRecord {
            text: Some(words(150)),
            kind: Some("article".to_string()),
            excerpt: Some("e".to_string()),
            ..Default::default()
        };

        let record = normalize(&bookmark, Some(&analysis)).unwrap();
        let config = PipelineConfig::onboarding();
        let (out, report) = filter(vec![record], &config);

        assert_eq!(out.len(), 1);
        let article = &out[0];
        assert!(article.record.is_archived);
        assert_eq!(article.actual_word_count, Some(150));
        assert_eq!(article.percent_diff, Some(0.0));
        assert_eq!(report.dropping_stages().count(), 0);

        let row = article.project(&config.fields);
        assert_eq!(row["resolved_title"], "A");
        assert_eq!(row["excerpt"], "e");
        assert_eq!(row["is_archived"], true);
    }
}
