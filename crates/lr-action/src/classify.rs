// classify.rs — Tool-action classification.
//
// Maps a raw tool invocation to a semantic action-type tag for the action
// log. The tree is keyed first on the tool, then on ordered pattern-rule
// tables evaluated top to bottom — first hit wins, so rule order is part
// of the contract. Each table is a plain (regex, tag) slice, testable
// without the dispatcher.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event::{ToolInput, ToolKind};
use crate::literature;

/// Semantic tag for one agent action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    DataLoad,
    DataInspect,
    FeatureExtraction,
    ModelTrain,
    Calibration,
    Evaluation,
    Visualization,
    LiteratureSearch,
    CodeWrite,
    Documentation,
    BugFix,
    Configuration,
    FileRead,
    Search,
    Review,
    Other,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::DataLoad => "DATA_LOAD",
            ActionType::DataInspect => "DATA_INSPECT",
            ActionType::FeatureExtraction => "FEATURE_EXTRACTION",
            ActionType::ModelTrain => "MODEL_TRAIN",
            ActionType::Calibration => "CALIBRATION",
            ActionType::Evaluation => "EVALUATION",
            ActionType::Visualization => "VISUALIZATION",
            ActionType::LiteratureSearch => "LITERATURE_SEARCH",
            ActionType::CodeWrite => "CODE_WRITE",
            ActionType::Documentation => "DOCUMENTATION",
            ActionType::BugFix => "BUG_FIX",
            ActionType::Configuration => "CONFIGURATION",
            ActionType::FileRead => "FILE_READ",
            ActionType::Search => "SEARCH",
            ActionType::Review => "REVIEW",
            ActionType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DATA_LOAD" => Some(ActionType::DataLoad),
            "DATA_INSPECT" => Some(ActionType::DataInspect),
            "FEATURE_EXTRACTION" => Some(ActionType::FeatureExtraction),
            "MODEL_TRAIN" => Some(ActionType::ModelTrain),
            "CALIBRATION" => Some(ActionType::Calibration),
            "EVALUATION" => Some(ActionType::Evaluation),
            "VISUALIZATION" => Some(ActionType::Visualization),
            "LITERATURE_SEARCH" => Some(ActionType::LiteratureSearch),
            "CODE_WRITE" => Some(ActionType::CodeWrite),
            "DOCUMENTATION" => Some(ActionType::Documentation),
            "BUG_FIX" => Some(ActionType::BugFix),
            "CONFIGURATION" => Some(ActionType::Configuration),
            "FILE_READ" => Some(ActionType::FileRead),
            "SEARCH" => Some(ActionType::Search),
            "REVIEW" => Some(ActionType::Review),
            "OTHER" => Some(ActionType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered classification rule: first matching pattern assigns the tag.
struct Rule {
    pattern: Regex,
    action: ActionType,
}

fn rules(table: &[(&str, ActionType)]) -> Vec<Rule> {
    table
        .iter()
        .map(|(pattern, action)| Rule {
            // Patterns are static and known-good; a typo here is a bug
            // caught by the table tests below, not a runtime condition.
            pattern: Regex::new(pattern).unwrap(),
            action: *action,
        })
        .collect()
}

/// Bash commands, checked before the interpreter rules.
static BASH_COMMAND_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(&[
        (r"(?i)\b(wget|curl|download|fetch|git\s+clone)\b", ActionType::DataLoad),
        (r"(?i)\b(pip|npm|conda|apt|brew)\s+(install|update)\b", ActionType::Configuration),
        (r"(?i)\b(python|python3|node)\b.*\b(train|fit|model)\b", ActionType::ModelTrain),
        (r"(?i)\b(python|python3|node)\b.*\b(calibrat|conformal)", ActionType::Calibration),
        (r"(?i)\b(python|python3|node)\b.*\b(feature|extract|preprocess)", ActionType::FeatureExtraction),
        (r"(?i)\b(python|python3|node)\b.*\b(eval|test|benchmark|metric)", ActionType::Evaluation),
        (r"(?i)\b(python|python3|node)\b.*\b(plot|fig|visual|chart)", ActionType::Visualization),
        (r"(?i)\b(python|python3|node)\b", ActionType::CodeWrite),
        (r"(?i)\bgit\b", ActionType::Configuration),
    ])
});

/// Write/Edit target paths, checked before extension rules.
static WRITE_PATH_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(&[
        (r"(?i)findings|claim|ledger", ActionType::Documentation),
        (r"(?i)review|r2|report", ActionType::Review),
    ])
});

/// Contents of written code files (.py/.r/.jl/.ipynb).
static CODE_CONTENT_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    rules(&[
        (r"(?i)train|fit|model", ActionType::ModelTrain),
        (r"(?i)calibrat|conformal", ActionType::Calibration),
        (r"(?i)feature|extract|preprocess", ActionType::FeatureExtraction),
        (r"(?i)eval|test|benchmark|metric", ActionType::Evaluation),
        (r"(?i)plot|fig|visual|chart|matplotlib|seaborn|plotly", ActionType::Visualization),
    ])
});

static CODE_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(py|r|jl|ipynb)$").unwrap());
static CONFIG_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(json|yaml|yml|toml|cfg|ini|env)$").unwrap());
static DOC_EXT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.(md|txt|rst)$").unwrap());
static DATA_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(csv|tsv|parquet|h5|hdf5)$").unwrap());
static READ_DATA_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(csv|tsv|parquet|h5|json)$").unwrap());
static ERROR_OUTPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|fix|debug|traceback)\b").unwrap());

fn first_match(table: &[Rule], haystack: &str) -> Option<ActionType> {
    table
        .iter()
        .find(|rule| rule.pattern.is_match(haystack))
        .map(|rule| rule.action)
}

/// Classify a tool invocation into an action type.
///
/// Total over all inputs: returns `None` only for tool names outside the
/// known vocabulary ("skip logging", not an error). Never touches the
/// store or the filesystem.
pub fn classify(tool_name: &str, input: &ToolInput, output: &str) -> Option<ActionType> {
    let path = input.path_lower();

    match ToolKind::from_name(tool_name) {
        ToolKind::Bash => {
            let command = input.command.as_deref().unwrap_or("");
            if let Some(action) = first_match(&BASH_COMMAND_RULES, command) {
                return Some(action);
            }
            // No command signal — a failing run still deserves a tag.
            let head: String = output.chars().take(500).collect();
            if ERROR_OUTPUT.is_match(&head) {
                return Some(ActionType::BugFix);
            }
            Some(ActionType::Other)
        }

        ToolKind::Write | ToolKind::Edit => {
            if let Some(action) = first_match(&WRITE_PATH_RULES, &path) {
                return Some(action);
            }
            if CODE_EXT.is_match(&path) {
                return Some(
                    first_match(&CODE_CONTENT_RULES, input.written_text())
                        .unwrap_or(ActionType::CodeWrite),
                );
            }
            if CONFIG_EXT.is_match(&path) {
                return Some(ActionType::Configuration);
            }
            if DOC_EXT.is_match(&path) {
                return Some(ActionType::Documentation);
            }
            if DATA_EXT.is_match(&path) {
                return Some(ActionType::DataLoad);
            }
            Some(ActionType::CodeWrite)
        }

        ToolKind::Read => {
            if READ_DATA_EXT.is_match(&path) {
                Some(ActionType::DataInspect)
            } else {
                Some(ActionType::FileRead)
            }
        }

        ToolKind::WebSearch | ToolKind::WebFetch => {
            let query = input.query.as_deref().unwrap_or("");
            let url = input.url.as_deref().unwrap_or("");
            if literature::is_scientific_text(query) || literature::is_scientific_text(url) {
                Some(ActionType::LiteratureSearch)
            } else {
                Some(ActionType::Search)
            }
        }

        ToolKind::Grep | ToolKind::Glob => Some(ActionType::Search),
        ToolKind::Task => Some(ActionType::Other),
        ToolKind::Other => None,
    }
}
