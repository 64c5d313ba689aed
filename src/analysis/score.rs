use regex::Regex;
use std::sync::OnceLock;

fn score_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)score\s*:\s*\**\s*(\d+(?:\.\d+)?)\s*/\s*10").ok())
        .as_ref()
}

/// Pull a 0-10 score out of a model response.
///
/// A JSON body with a positive `score` wins. Otherwise the last
/// `Score: X/10` occurrence is used (decimals allowed), which also matches
/// `**Security Score: 8/10**`. Either way the score is clamped to 10.
/// No match scores 0.
pub fn extract_score(response: &str) -> f64 {
    #[derive(serde::Deserialize)]
    struct Scored {
        score: f64,
    }

    if let Ok(parsed) = serde_json::from_str::<Scored>(response.trim()) {
        if parsed.score > 0.0 {
            return parsed.score.min(10.0);
        }
    }

    score_pattern()
        .and_then(|re| re.captures_iter(response).last())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|s| s.min(10.0))
        .unwrap_or(0.0)
}
