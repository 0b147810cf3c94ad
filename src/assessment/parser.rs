use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::trace;

use crate::api::value_text;

use super::{clean, clean_line, AssessedFeature, StructuredAssessment};

const FENCE: &str = "```";

/// Patterns compiled once; a pattern that failed to compile matches nothing.
fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"(?s)```[A-Za-z0-9_+-]*(.*?)```")
}

fn rule_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"━{3,}")
}

fn bullet_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&RE, r"^[•*-]\s+(.+?)(?:\s+\(([^()]*)\))?\s*$")
}

/// Parse raw assessment text. The first strategy that yields a non-empty
/// result wins: fenced JSON blocks, then the whole text as JSON, then the
/// heavy-rule section layout.
pub fn parse(text: &str) -> Option<StructuredAssessment> {
    if text.contains(FENCE) {
        if let Some(best) = best_fenced(text) {
            return Some(best);
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        if let Some(parsed) = from_json(&value).filter(|a| !a.is_empty()) {
            return Some(parsed);
        }
    }

    if let Some(rule) = rule_re().filter(|re| re.is_match(text)) {
        return from_sections(rule, text).filter(|a| !a.is_empty());
    }

    None
}

fn best_fenced(text: &str) -> Option<StructuredAssessment> {
    let fence = fence_re()?;
    let mut best: Option<StructuredAssessment> = None;
    for caps in fence.captures_iter(text) {
        let body = caps.get(1).map_or("", |m| m.as_str()).trim();
        let value = match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(e) => {
                trace!(error = %e, "fenced block is not JSON");
                continue;
            }
        };
        let Some(candidate) = from_json(&value).filter(|a| !a.is_empty()) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| candidate.score() > b.score()) {
            best = Some(candidate);
        }
    }
    best
}

fn text_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(value_text).map(|s| clean(&s))
}

fn line_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(value_text).map(|s| clean_line(&s))
}

fn feature_from_json(value: &Value) -> Option<AssessedFeature> {
    match value {
        Value::String(name) => {
            let name = clean_line(name);
            (!name.is_empty()).then(|| AssessedFeature::new("", name, ""))
        }
        Value::Object(obj) => {
            let id = line_field(obj, "id").unwrap_or_default();
            let name = line_field(obj, "name")
                .or_else(|| line_field(obj, "title"))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| id.clone());
            if name.is_empty() {
                return None;
            }
            let description = text_field(obj, "description").unwrap_or_default();
            Some(AssessedFeature::new(id, name, description))
        }
        _ => None,
    }
}

fn features_from_json(items: &[Value]) -> Vec<AssessedFeature> {
    items.iter().filter_map(feature_from_json).collect()
}

fn from_json(value: &Value) -> Option<StructuredAssessment> {
    match value {
        Value::Array(items) => Some(StructuredAssessment {
            features: features_from_json(items),
            ..StructuredAssessment::default()
        }),
        Value::Object(obj) => {
            let overview = text_field(obj, "description")
                .filter(|s| !s.is_empty())
                .or_else(|| text_field(obj, "overview"))
                .unwrap_or_default();
            let analysis = text_field(obj, "analysis").unwrap_or_default();
            let features = obj
                .get("features")
                .and_then(Value::as_array)
                .map(|items| features_from_json(items))
                .unwrap_or_default();
            Some(StructuredAssessment {
                overview,
                analysis,
                features,
            })
        }
        _ => None,
    }
}

fn from_sections(rule: &Regex, text: &str) -> Option<StructuredAssessment> {
    let segments: Vec<&str> = rule.split(text).collect();
    let mut result = StructuredAssessment::default();

    // segments[0] is whatever precedes the first rule.
    let mut i = 1;
    while i + 1 < segments.len() {
        let title = segments[i].trim().to_lowercase();
        let body = segments[i + 1];
        if title.contains("overview") {
            result.overview = clean(body);
        } else if title.contains("analysis") {
            result.analysis = clean(body);
        } else if title.contains("features") {
            result.features = features_from_bullets(body);
        }
        i += 2;
    }

    Some(result)
}

fn features_from_bullets(body: &str) -> Vec<AssessedFeature> {
    let Some(bullet) = bullet_re() else {
        return Vec::new();
    };
    let mut features = Vec::new();
    let mut current: Option<(String, String, Vec<&str>)> = None;

    for line in body.lines() {
        if let Some(caps) = bullet.captures(line) {
            if let Some(done) = current.take() {
                features.push(finish_feature(done));
            }
            let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let id = caps.get(2).map_or("", |m| m.as_str()).to_string();
            current = Some((name, id, Vec::new()));
        } else if let Some((_, _, lines)) = current.as_mut() {
            lines.push(line.strip_prefix("  ").unwrap_or(line));
        }
    }
    if let Some(done) = current.take() {
        features.push(finish_feature(done));
    }

    features.retain(|f| !f.name.is_empty());
    features
}

fn finish_feature((name, id, lines): (String, String, Vec<&str>)) -> AssessedFeature {
    AssessedFeature::new(clean_line(&id), clean_line(&name), clean(&lines.join("\n")))
}
