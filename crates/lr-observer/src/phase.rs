// phase.rs — Declared-phase parsing and design-execution drift.
//
// STATE.md declares the current research phase; the action log shows what
// the agent actually does. When the dominant recent action type is not
// something the declared phase would produce, the two have drifted apart
// and one of them needs updating.

use std::sync::LazyLock;

use regex::Regex;

use lr_action::ActionType;

static PHASE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^#*\s*(?:phase|stage|step)\s*:\s*(\w[\w\s-]*)").unwrap()
});

/// Parse the declared phase out of STATE.md content, normalized through
/// the alias table ("MODEL_TRAINING" and "TRAINING" are the same phase).
pub fn extract_phase(state_content: &str) -> Option<String> {
    let caps = PHASE_TOKEN.captures(state_content)?;
    let raw = caps[1].trim().to_uppercase().replace(char::is_whitespace, "_");

    let normalized = match raw.as_str() {
        "EXPLORATION" => "EXPLORATION",
        "DIRECTION" => "DIRECTION",
        "DATA" | "DATA_COLLECTION" | "DATA_LOADING" => "DATA",
        "FEATURES" | "FEATURE_EXTRACTION" | "PREPROCESSING" => "FEATURES",
        "TRAINING" | "MODEL_TRAINING" => "TRAINING",
        "CALIBRATION" => "CALIBRATION",
        "EVALUATION" | "ANALYSIS" => "EVALUATION",
        "WRITING" | "DOCUMENTATION" => "WRITING",
        other => return Some(other.to_string()),
    };
    Some(normalized.to_string())
}

/// The action types a phase is expected to produce. Unknown phases have
/// no expectations and never drift.
pub fn expected_actions(phase: &str) -> Option<&'static [ActionType]> {
    use ActionType::*;
    Some(match phase {
        "EXPLORATION" => &[Search, LiteratureSearch, FileRead, DataInspect],
        "DIRECTION" => &[LiteratureSearch, Documentation, Search],
        "DATA" => &[DataLoad, DataInspect, Configuration],
        "FEATURES" => &[FeatureExtraction, CodeWrite, DataInspect],
        "TRAINING" => &[ModelTrain, CodeWrite, Evaluation],
        "CALIBRATION" => &[Calibration, CodeWrite, Evaluation],
        "EVALUATION" => &[Evaluation, Visualization, Documentation],
        "WRITING" => &[Documentation, Visualization, Review],
        _ => return None,
    })
}

/// Compare the declared phase against grouped recent action counts
/// (most frequent first). Returns a warning message when the dominant
/// action type is outside the phase's expected set AND constitutes a
/// majority of recent actions.
pub fn detect_drift(declared_phase: &str, recent: &[(String, u64)]) -> Option<String> {
    let expected = expected_actions(declared_phase)?;
    let (top_type, top_count) = recent.first()?;
    let total: u64 = recent.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return None;
    }

    let is_expected = expected.iter().any(|action| action.as_str() == top_type);
    if is_expected || *top_count * 2 <= total {
        return None;
    }

    let share = (*top_count as f64 / total as f64 * 100.0).round();
    Some(format!(
        "Design-execution drift: declared phase is \"{declared_phase}\" but {share}% of recent \
         actions are \"{top_type}\". Update STATE.md to reflect actual work, or realign work \
         to the declared phase."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parses_from_heading_forms() {
        assert_eq!(extract_phase("## Phase: EXPLORATION\n"), Some("EXPLORATION".to_string()));
        assert_eq!(extract_phase("phase: training"), Some("TRAINING".to_string()));
        assert_eq!(extract_phase("# Stage: Model Training"), Some("TRAINING".to_string()));
        assert_eq!(extract_phase("step: analysis"), Some("EVALUATION".to_string()));
    }

    #[test]
    fn unknown_phases_pass_through_normalized() {
        assert_eq!(extract_phase("phase: field work"), Some("FIELD_WORK".to_string()));
    }

    #[test]
    fn no_phase_token_is_none() {
        assert_eq!(extract_phase("# Project notes\nnothing declared"), None);
    }

    #[test]
    fn drift_fires_on_unexpected_majority() {
        let recent = vec![
            ("MODEL_TRAIN".to_string(), 8),
            ("SEARCH".to_string(), 2),
        ];
        let message = detect_drift("WRITING", &recent).unwrap();
        assert!(message.contains("WRITING"));
        assert!(message.contains("MODEL_TRAIN"));
        assert!(message.contains("80%"));
    }

    #[test]
    fn no_drift_when_dominant_action_is_expected() {
        let recent = vec![
            ("DOCUMENTATION".to_string(), 8),
            ("MODEL_TRAIN".to_string(), 2),
        ];
        assert!(detect_drift("WRITING", &recent).is_none());
    }

    #[test]
    fn no_drift_without_a_majority() {
        let recent = vec![
            ("MODEL_TRAIN".to_string(), 3),
            ("DOCUMENTATION".to_string(), 3),
            ("SEARCH".to_string(), 2),
        ];
        assert!(detect_drift("WRITING", &recent).is_none());
    }

    #[test]
    fn unknown_phase_never_drifts() {
        let recent = vec![("MODEL_TRAIN".to_string(), 10)];
        assert!(detect_drift("FIELD_WORK", &recent).is_none());
    }

    #[test]
    fn empty_history_never_drifts() {
        assert!(detect_drift("WRITING", &[]).is_none());
    }
}
