//! Validation engine: scores a validation point and appends result rows.

use crate::command::config::Flags;
use crate::error::NmtError;
use crate::eval::results::{ResultRow, ResultsStore};
use crate::eval::scoring::Scorer;
use crate::eval::valid_log::read_valid_log;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Metric name → scores in the order they were produced.
pub type ScoreMap = BTreeMap<String, Vec<f64>>;

/// Where the scores of a validation point come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationSource {
    /// Score a translation output file against a reference file.
    Translation { output: PathBuf, reference: PathBuf },
    /// Read scores the trainer already wrote to its validation log.
    Log(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ValidationRequest<'a> {
    pub model_name: String,
    /// Flags logged with each row.
    pub parameters: &'a Flags,
    /// Metrics to record. For log sources an empty list records all of them.
    pub metrics: &'a [String],
    pub source: ValidationSource,
    pub epoch: Option<u32>,
    pub duration: Duration,
    pub results_file: PathBuf,
}

/// Scores one validation point, appending one row per metric score.
pub trait Validator: Send + Sync {
    fn validate(&self, request: &ValidationRequest<'_>) -> Result<ScoreMap, NmtError>;
}

/// Built-in validator backed by [`Scorer`] and the trainer's validation log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceValidator;

impl Validator for ReferenceValidator {
    fn validate(&self, request: &ValidationRequest<'_>) -> Result<ScoreMap, NmtError> {
        let scored: Vec<(String, f64, Option<u32>)> = match &request.source {
            ValidationSource::Translation { output, reference } => {
                score_translation(output, reference, request.metrics)?
                    .into_iter()
                    .map(|(metric, score)| (metric, score, request.epoch))
                    .collect()
            }
            ValidationSource::Log(path) => read_valid_log(path)?
                .into_iter()
                .filter(|e| request.metrics.is_empty() || request.metrics.contains(&e.metric))
                .map(|e| (e.metric, e.score, Some(e.epoch)))
                .collect(),
        };

        let parameters = serde_json::to_string(request.parameters)?;
        let timestamp = chrono::Utc::now().to_rfc3339();
        let duration = request.duration.as_secs_f64();

        let mut scores = ScoreMap::new();
        let mut rows = Vec::with_capacity(scored.len());
        for (metric, score, epoch) in scored {
            scores.entry(metric.clone()).or_default().push(score);
            rows.push(ResultRow {
                model_name: request.model_name.clone(),
                metric,
                score,
                parameters: parameters.clone(),
                timestamp: timestamp.clone(),
                duration,
                epoch,
            });
        }

        ResultsStore::new(&request.results_file).append(&rows)?;
        info!(
            model = %request.model_name,
            epoch = ?request.epoch,
            rows = rows.len(),
            "Recorded validation scores"
        );
        Ok(scores)
    }
}

fn read_lines(path: &Path, role: &str) -> Result<Vec<String>, NmtError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        NmtError::validation(format!("cannot read {role} {}: {e}", path.display()))
    })?;
    Ok(content.lines().map(str::to_string).collect())
}

fn score_translation(
    output: &Path,
    reference: &Path,
    metrics: &[String],
) -> Result<Vec<(String, f64)>, NmtError> {
    let scorers = metrics
        .iter()
        .map(|name| {
            Scorer::from_name(name)
                .map(|scorer| (name.clone(), scorer))
                .ok_or_else(|| NmtError::validation(format!("unknown metric '{name}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let hypotheses = read_lines(output, "translation output")?;
    let references = read_lines(reference, "reference")?;
    if hypotheses.len() != references.len() {
        debug!(
            hypotheses = hypotheses.len(),
            references = references.len(),
            "Line count mismatch; scoring the common prefix"
        );
    }

    Ok(scorers
        .into_iter()
        .map(|(name, scorer)| (name, scorer.score(&hypotheses, &references)))
        .collect())
}

/// Expand `{E}` (epoch) and `{U}`/`{B}` (update/batch count) in a
/// validation output template.
pub fn render_output_path(template: &str, epoch: u32, batches: Option<&str>) -> PathBuf {
    let mut rendered = template.replace("{E}", &epoch.to_string());
    if let Some(batches) = batches {
        rendered = rendered.replace("{U}", batches).replace("{B}", batches);
    }
    PathBuf::from(rendered)
}
