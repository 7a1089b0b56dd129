//! Editing FreeThaw `.sim` simulation scripts
//!
//! Scripts are handled line by line. Each line is classified once when read;
//! edits rewrite the text of a single line and leave the rest of the file
//! byte-for-byte intact.

use crate::errors::{FtuError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Classification of a script line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    /// `def key = value`
    Definition,
    /// `/* ...`
    MultiLineCommentStart,
    /// `* ...`
    MultiLineCommentBody,
    /// `... */`
    MultiLineCommentEnd,
    /// `import ...`
    Import,
    /// `// "from" "to"`
    HiddenFromTo,
    /// `"from" "to"`
    FromTo,
    /// `// ...`
    Comment,
    Whitespace,
    Unknown,
}

impl LineKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::MultiLineCommentStart => "multi-line comment start",
            Self::MultiLineCommentBody => "multi-line comment body",
            Self::MultiLineCommentEnd => "multi-line comment end",
            Self::Import => "import",
            Self::HiddenFromTo => "hidden from-to",
            Self::FromTo => "from-to",
            Self::Comment => "comment",
            Self::Whitespace => "whitespace only",
            Self::Unknown => "unknown",
        }
    }

    const fn is_commented(self) -> bool {
        matches!(
            self,
            Self::MultiLineCommentStart
                | Self::MultiLineCommentBody
                | Self::MultiLineCommentEnd
                | Self::Comment
                | Self::HiddenFromTo
        )
    }
}

// Tried in order; the first match wins.
static PATTERNS: LazyLock<Vec<(LineKind, Regex)>> = LazyLock::new(|| {
    [
        (LineKind::Definition, r"^\s*def\s*(?P<key>.*)\s*=\s*(?P<value>.*)"),
        (LineKind::MultiLineCommentStart, r"^\s*/\*(?P<comment>.*)"),
        (LineKind::MultiLineCommentBody, r"^\s*\*(?P<comment>.*)"),
        (LineKind::MultiLineCommentEnd, r"^\s*(?P<comment>.*)\*/"),
        (LineKind::Import, r"^import\s*(?P<import>.*)"),
        (
            LineKind::HiddenFromTo,
            r#"^\s*//\s*"(?P<from>[^"]*)"\s*"(?P<to>[^"]*)"\s*$"#,
        ),
        (LineKind::FromTo, r#"^\s*"(?P<from>[^"]*)"\s*"(?P<to>[^"]*)"\s*$"#),
        (LineKind::Comment, r"^\s*//(?P<comment>.*)"),
        (LineKind::Whitespace, r"^\s*$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// New value for a definition
#[derive(Debug, Clone, PartialEq)]
pub enum SimValue {
    /// Written in double quotes
    Text(String),
    /// Written verbatim
    Literal(String),
}

impl fmt::Display for SimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimValue::Text(s) => write!(f, "\"{}\"", s),
            SimValue::Literal(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for SimValue {
    fn from(s: &str) -> Self {
        SimValue::Text(s.to_string())
    }
}

impl From<String> for SimValue {
    fn from(s: String) -> Self {
        SimValue::Text(s)
    }
}

impl From<f64> for SimValue {
    fn from(v: f64) -> Self {
        SimValue::Literal(v.to_string())
    }
}

impl From<i64> for SimValue {
    fn from(v: i64) -> Self {
        SimValue::Literal(v.to_string())
    }
}

impl From<bool> for SimValue {
    fn from(v: bool) -> Self {
        SimValue::Literal(v.to_string())
    }
}

impl SimValue {
    /// Interprets command-line text: numbers and booleans verbatim, anything
    /// else (or text already in quotes) as a string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
            return SimValue::Text(inner.to_string());
        }
        if raw.parse::<f64>().is_ok() || raw == "true" || raw == "false" {
            SimValue::Literal(raw.to_string())
        } else {
            SimValue::Text(raw.to_string())
        }
    }
}

/// One line of a script, with its terminator
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    text: String,
    kind: LineKind,
    commented: Option<bool>,
    fields: HashMap<String, String>,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Line ({}): {}>", self.kind.as_str(), self.text.trim_end())
    }
}

impl Line {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let body = text.trim_end_matches(['\n', '\r']);

        for (kind, pattern) in PATTERNS.iter() {
            if let Some(caps) = pattern.captures(body) {
                let fields = pattern
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        caps.name(name)
                            .map(|m| (name.to_string(), m.as_str().trim().to_string()))
                    })
                    .collect();
                return Self {
                    text,
                    kind: *kind,
                    commented: Some(kind.is_commented()),
                    fields,
                };
            }
        }

        Self {
            text,
            kind: LineKind::Unknown,
            commented: None,
            fields: HashMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> LineKind {
        self.kind
    }

    /// `None` for lines that could not be classified
    pub fn is_commented(&self) -> Option<bool> {
        self.commented
    }

    /// A captured field (`key`, `value`, `from`, `to`, `comment`, `import`).
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Prefixes `//` to an uncommented line.
    pub fn comment(&mut self) {
        if self.commented != Some(false) {
            return;
        }
        self.text.insert_str(0, "//");
        self.commented = Some(true);
    }

    /// Removes the first `//` of a commented line.
    pub fn uncomment(&mut self) {
        if self.commented != Some(true) {
            return;
        }
        if let Some(pos) = self.text.find("//") {
            self.text.replace_range(pos..pos + 2, "");
        }
        self.commented = Some(false);
    }

    /// Rewrites a definition line as `def <key> = <value>`; other kinds are left alone.
    pub fn set_variable(&mut self, value: &SimValue) {
        if self.kind != LineKind::Definition {
            return;
        }
        let key = self.get("key").unwrap_or_default().to_string();
        self.text = format!("def {} = {}\n", key, value);
        let raw = match value {
            SimValue::Text(s) | SimValue::Literal(s) => s.clone(),
        };
        self.fields.insert("value".to_string(), raw);
    }
}

/// A `.sim` script loaded for editing
#[derive(Debug, Clone)]
pub struct FreeThawSim {
    path: PathBuf,
    lines: Vec<Line>,
}

impl FreeThawSim {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path)?;
        Ok(Self::from_text(path, &text))
    }

    fn from_text(path: PathBuf, text: &str) -> Self {
        let lines = text.split_inclusive('\n').map(Line::parse).collect();
        Self { path, lines }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// The script text after edits.
    pub fn text(&self) -> String {
        self.lines.iter().map(Line::text).collect()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.text())?;
        Ok(())
    }

    pub fn get_variable_line(&self, key: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.get("key") == Some(key))
    }

    pub fn get_fromto_line(&self, from: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.get("from") == Some(from))
    }

    /// Sets the value of the first definition of `key`.
    pub fn set_variable(&mut self, key: &str, value: impl Into<SimValue>) -> Result<()> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.get("key") == Some(key))
            .ok_or_else(|| FtuError::SimKeyNotFound {
                key: key.to_string(),
            })?;
        line.set_variable(&value.into());
        log::debug!("set {} in {}", key, self.path.display());
        Ok(())
    }

    /// Comments out the first from-to line whose source is `parameter`.
    pub fn comment(&mut self, parameter: &str) -> bool {
        self.edit_fromto(parameter, Line::comment)
    }

    /// Re-enables the first from-to line whose source is `parameter`.
    pub fn uncomment(&mut self, parameter: &str) -> bool {
        self.edit_fromto(parameter, Line::uncomment)
    }

    fn edit_fromto(&mut self, parameter: &str, edit: fn(&mut Line)) -> bool {
        match self.lines.iter_mut().find(|l| l.get("from") == Some(parameter)) {
            Some(line) => {
                edit(line);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"import static oms3.SimBuilder.instance as OMS3
def home = oms_prj
def aMin = 0.01
/*
 * solver options
 */
// a plain comment
	"solver.waterDensity" "buffer.waterDensity"
// "solver.iceDensity" "buffer.iceDensity"

sim(name: "run") {
"#;

    fn script() -> FreeThawSim {
        FreeThawSim::from_text(PathBuf::from("test.sim"), SCRIPT)
    }

    #[test]
    fn classifies_lines() {
        let kinds: Vec<LineKind> = script().lines().iter().map(Line::kind).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Import,
                LineKind::Definition,
                LineKind::Definition,
                LineKind::MultiLineCommentStart,
                LineKind::MultiLineCommentBody,
                LineKind::MultiLineCommentBody,
                LineKind::Comment,
                LineKind::FromTo,
                LineKind::HiddenFromTo,
                LineKind::Whitespace,
                LineKind::Unknown,
            ]
        );
    }

    #[test]
    fn unedited_script_round_trips() {
        assert_eq!(script().text(), SCRIPT);
    }

    #[test]
    fn definition_fields_are_trimmed() {
        let sim = script();
        let line = sim.get_variable_line("aMin").unwrap();
        assert_eq!(line.get("value"), Some("0.01"));
        assert_eq!(line.is_commented(), Some(false));
    }

    #[test]
    fn set_variable_rewrites_definition() {
        let mut sim = script();
        sim.set_variable("aMin", 0.04).unwrap();
        sim.set_variable("home", "/data/run").unwrap();
        let text = sim.text();
        assert!(text.contains("def aMin = 0.04\n"));
        assert!(text.contains("def home = \"/data/run\"\n"));
        assert_eq!(sim.get_variable_line("aMin").unwrap().get("value"), Some("0.04"));
    }

    #[test]
    fn set_variable_on_missing_key_fails() {
        let mut sim = script();
        assert!(matches!(
            sim.set_variable("nope", 1i64),
            Err(FtuError::SimKeyNotFound { .. })
        ));
    }

    #[test]
    fn comment_and_uncomment_fromto() {
        let mut sim = script();
        assert!(sim.comment("solver.waterDensity"));
        assert!(sim
            .text()
            .contains("//\t\"solver.waterDensity\" \"buffer.waterDensity\"\n"));

        assert!(sim.uncomment("solver.iceDensity"));
        assert!(sim
            .text()
            .contains("\n \"solver.iceDensity\" \"buffer.iceDensity\"\n"));

        assert!(!sim.comment("missing.parameter"));
    }

    #[test]
    fn commenting_twice_is_a_no_op() {
        let mut line = Line::parse("\"a\" \"b\"\n");
        line.comment();
        line.comment();
        assert_eq!(line.text(), "//\"a\" \"b\"\n");
        line.uncomment();
        assert_eq!(line.text(), "\"a\" \"b\"\n");
    }

    #[test]
    fn unknown_lines_are_never_toggled() {
        let mut line = Line::parse("sim(name: \"run\") {\n");
        line.comment();
        assert_eq!(line.kind(), LineKind::Unknown);
        assert_eq!(line.text(), "sim(name: \"run\") {\n");
    }

    #[test]
    fn parses_cli_values() {
        assert_eq!(SimValue::parse("0.5"), SimValue::Literal("0.5".into()));
        assert_eq!(SimValue::parse("true"), SimValue::Literal("true".into()));
        assert_eq!(SimValue::parse("abc"), SimValue::Text("abc".into()));
        assert_eq!(SimValue::parse("\"12\""), SimValue::Text("12".into()));
    }
}
