//! Parser for the trainer's own validation log.
//!
//! Lines look like
//! `[2024-03-01 10:00:00] [valid] Ep. 3 : Up. 1500 : bleu : 21.37 : new best`.

use crate::error::NmtError;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidEntry {
    pub epoch: u32,
    pub updates: u64,
    pub metric: String,
    pub score: f64,
}

fn valid_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[valid\]\s+Ep\.\s*(\d+)\s*:\s*Up\.\s*(\d+)\s*:\s*([\w.-]+)\s*:\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)")
            .expect("static regex")
    })
}

pub fn parse_valid_log(content: &str) -> Vec<ValidEntry> {
    content
        .lines()
        .filter_map(|line| {
            let caps = valid_line().captures(line)?;
            Some(ValidEntry {
                epoch: caps[1].parse().ok()?,
                updates: caps[2].parse().ok()?,
                metric: caps[3].to_string(),
                score: caps[4].parse().ok()?,
            })
        })
        .collect()
}

pub fn read_valid_log(path: &Path) -> Result<Vec<ValidEntry>, NmtError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        NmtError::validation(format!("cannot read validation log {}: {e}", path.display()))
    })?;
    Ok(parse_valid_log(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_log() {
        let log = "\
[2024-03-01 10:00:00] [valid] Ep. 1 : Up. 500 : cross-entropy : 182.5 : new best
[2024-03-01 10:00:01] [valid] Ep. 1 : Up. 500 : bleu : 12.04 : new best
[2024-03-01 10:05:00] [training] Ep. 2 : Up. 600 : Sen. 12,000 : Cost 3.1
[2024-03-01 10:10:00] [valid] Ep. 2 : Up. 1000 : bleu : 14.5 : stalled 1 times
";
        let entries = parse_valid_log(log);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].metric, "cross-entropy");
        assert_eq!(entries[1].score, 12.04);
        assert_eq!(entries[2].epoch, 2);
        assert_eq!(entries[2].updates, 1000);
    }

    #[test]
    fn test_missing_log_is_validation_error() {
        let err = read_valid_log(Path::new("/nonexistent/valid.log")).unwrap_err();
        assert!(matches!(err, NmtError::Validation(_)));
    }
}
