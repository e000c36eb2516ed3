//! Typed, declared parameter tables loaded from `name value...` text files.
//!
//! Engines declare every parameter they understand (with a default and a
//! help string) before loading a file, so unknown names and type errors are
//! caught at load time rather than at first use.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("parameter '{0}' is already declared")]
    Duplicate(String),
    #[error("unknown parameter '{0}'")]
    Unknown(String),
    #[error("parameter '{name}' holds {actual}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("invalid value for '{name}': {reason}")]
    Invalid { name: String, reason: String },
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "an integer",
            ParamValue::Float(_) => "a float",
            ParamValue::Str(_) => "a string",
            ParamValue::IntArray(_) => "an integer array",
            ParamValue::FloatArray(_) => "a float array",
        }
    }

    /// Parses `tokens` into a value of the same type as `self`.
    fn parse_like(&self, tokens: &[&str]) -> Result<ParamValue, String> {
        if tokens.is_empty() {
            return Err("missing value".to_string());
        }
        let single = |tokens: &[&str]| -> Result<String, String> {
            match tokens {
                [one] => Ok((*one).to_string()),
                _ => Err(format!("expected one value, found {}", tokens.len())),
            }
        };
        match self {
            ParamValue::Int(_) => {
                let raw = single(tokens)?;
                raw.parse::<i64>()
                    .map(ParamValue::Int)
                    .map_err(|_| format!("'{raw}' is not an integer"))
            }
            ParamValue::Float(_) => {
                let raw = single(tokens)?;
                raw.parse::<f64>()
                    .map(ParamValue::Float)
                    .map_err(|_| format!("'{raw}' is not a number"))
            }
            ParamValue::Str(_) => Ok(ParamValue::Str(tokens.join(" "))),
            ParamValue::IntArray(_) => tokens
                .iter()
                .map(|t| t.parse::<i64>().map_err(|_| format!("'{t}' is not an integer")))
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::IntArray),
            ParamValue::FloatArray(_) => tokens
                .iter()
                .map(|t| t.parse::<f64>().map_err(|_| format!("'{t}' is not a number")))
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::FloatArray),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(values: &[T]) -> String {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        }
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(v) => write!(f, "{v}"),
            ParamValue::IntArray(v) => write!(f, "{}", join(v)),
            ParamValue::FloatArray(v) => write!(f, "{}", join(v)),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    name: String,
    value: ParamValue,
    help: String,
}

/// An ordered collection of named, typed parameters.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet {
    entries: Vec<Entry>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn add_int(&mut self, name: &str, default: i64, help: &str) -> Result<(), ParameterError> {
        self.declare(name, ParamValue::Int(default), help)
    }

    pub fn add_float(&mut self, name: &str, default: f64, help: &str) -> Result<(), ParameterError> {
        self.declare(name, ParamValue::Float(default), help)
    }

    pub fn add_str(&mut self, name: &str, default: &str, help: &str) -> Result<(), ParameterError> {
        self.declare(name, ParamValue::Str(default.to_string()), help)
    }

    pub fn add_int_array(
        &mut self,
        name: &str,
        default: &[i64],
        help: &str,
    ) -> Result<(), ParameterError> {
        self.declare(name, ParamValue::IntArray(default.to_vec()), help)
    }

    pub fn add_float_array(
        &mut self,
        name: &str,
        default: &[f64],
        help: &str,
    ) -> Result<(), ParameterError> {
        self.declare(name, ParamValue::FloatArray(default.to_vec()), help)
    }

    pub fn set_int(&mut self, name: &str, value: i64) -> Result<(), ParameterError> {
        self.assign(name, ParamValue::Int(value))
    }

    pub fn set_float(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.assign(name, ParamValue::Float(value))
    }

    pub fn set_str(&mut self, name: &str, value: &str) -> Result<(), ParameterError> {
        self.assign(name, ParamValue::Str(value.to_string()))
    }

    pub fn set_int_array(&mut self, name: &str, value: &[i64]) -> Result<(), ParameterError> {
        self.assign(name, ParamValue::IntArray(value.to_vec()))
    }

    pub fn set_float_array(&mut self, name: &str, value: &[f64]) -> Result<(), ParameterError> {
        self.assign(name, ParamValue::FloatArray(value.to_vec()))
    }

    pub fn get_int(&self, name: &str) -> Result<i64, ParameterError> {
        match self.lookup(name)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(mismatch(name, "an integer", other)),
        }
    }

    /// Integer-typed parameters are widened, so `scale_dist 64` reads fine.
    pub fn get_float(&self, name: &str) -> Result<f64, ParameterError> {
        match self.lookup(name)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(name, "a float", other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ParameterError> {
        match self.lookup(name)? {
            ParamValue::Str(v) => Ok(v),
            other => Err(mismatch(name, "a string", other)),
        }
    }

    pub fn get_int_array(&self, name: &str) -> Result<&[i64], ParameterError> {
        match self.lookup(name)? {
            ParamValue::IntArray(v) => Ok(v),
            other => Err(mismatch(name, "an integer array", other)),
        }
    }

    pub fn get_float_array(&self, name: &str) -> Result<&[f64], ParameterError> {
        match self.lookup(name)? {
            ParamValue::FloatArray(v) => Ok(v),
            other => Err(mismatch(name, "a float array", other)),
        }
    }

    /// Reads a parameter file and assigns every entry it contains.
    pub fn load(&mut self, path: &Path) -> Result<(), ParameterError> {
        let text = fs::read_to_string(path).map_err(|e| ParameterError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.load_str(&text)
    }

    /// Parses parameter text. Names may appear at most once.
    pub fn load_str(&mut self, text: &str) -> Result<(), ParameterError> {
        let mut seen: Vec<&str> = Vec::new();
        for (i, raw_line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let name = tokens[0];
            if seen.contains(&name) {
                return Err(ParameterError::Syntax {
                    line: line_no,
                    message: format!("parameter '{name}' appears more than once"),
                });
            }
            seen.push(name);

            let entry = self
                .entries
                .iter_mut()
                .find(|e| e.name == name)
                .ok_or_else(|| ParameterError::Syntax {
                    line: line_no,
                    message: format!("unknown parameter '{name}'"),
                })?;
            entry.value = entry
                .value
                .parse_like(&tokens[1..])
                .map_err(|message| ParameterError::Syntax {
                    line: line_no,
                    message: format!("{name}: {message}"),
                })?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ParameterError> {
        fs::write(path, self.to_string()).map_err(|e| ParameterError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn declare(&mut self, name: &str, value: ParamValue, help: &str) -> Result<(), ParameterError> {
        if self.contains(name) {
            return Err(ParameterError::Duplicate(name.to_string()));
        }
        self.entries.push(Entry {
            name: name.to_string(),
            value,
            help: help.to_string(),
        });
        Ok(())
    }

    fn assign(&mut self, name: &str, value: ParamValue) -> Result<(), ParameterError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| ParameterError::Unknown(name.to_string()))?;
        if std::mem::discriminant(&entry.value) != std::mem::discriminant(&value) {
            return Err(mismatch(name, value.type_name(), &entry.value));
        }
        entry.value = value;
        Ok(())
    }

    fn find(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn lookup(&self, name: &str) -> Result<&ParamValue, ParameterError> {
        self.find(name)
            .map(|e| &e.value)
            .ok_or_else(|| ParameterError::Unknown(name.to_string()))
    }
}

fn mismatch(name: &str, expected: &'static str, actual: &ParamValue) -> ParameterError {
    ParameterError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            if !entry.help.is_empty() {
                writeln!(f, "# {}", entry.help)?;
            }
            // An empty string cannot be expressed as a value; leave it at its default.
            if matches!(&entry.value, ParamValue::Str(s) if s.is_empty()) {
                writeln!(f, "# {}", entry.name)?;
            } else {
                writeln!(f, "{} {}", entry.name, entry.value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn sample() -> ParameterSet {
        let mut params = ParameterSet::new();
        params.add_int("step", 4, "scan step").unwrap();
        params.add_float("factor", 0.8, "pyramid factor").unwrap();
        params.add_str("model", "", "model path").unwrap();
        params.add_int_array("points", &[0, 1], "point indices").unwrap();
        params.add_float_array("roi", &[0.0, 0.0, 1.0, 1.0], "").unwrap();
        params
    }

    #[test]
    fn test_defaults_are_readable() {
        let params = sample();
        assert_eq!(params.len(), 5);
        assert_eq!(params.get_int("step").unwrap(), 4);
        assert_relative_eq!(params.get_float("factor").unwrap(), 0.8);
        assert_eq!(params.get_str("model").unwrap(), "");
        assert_eq!(params.get_int_array("points").unwrap(), &[0, 1]);
        assert_eq!(params.get_float_array("roi").unwrap(), &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut params = sample();
        assert!(matches!(
            params.add_int("step", 1, ""),
            Err(ParameterError::Duplicate(name)) if name == "step"
        ));
    }

    #[test]
    fn test_set_unknown_and_wrong_type() {
        let mut params = sample();
        assert!(matches!(params.set_int("nope", 1), Err(ParameterError::Unknown(_))));
        assert!(matches!(
            params.set_float("step", 1.5),
            Err(ParameterError::TypeMismatch { .. })
        ));
        params.set_int("step", 8).unwrap();
        assert_eq!(params.get_int("step").unwrap(), 8);
    }

    #[test]
    fn test_get_float_widens_int() {
        assert_relative_eq!(sample().get_float("step").unwrap(), 4.0);
    }

    #[test]
    fn test_get_int_on_float_is_mismatch() {
        assert!(matches!(
            sample().get_int("factor"),
            Err(ParameterError::TypeMismatch { expected: "an integer", actual: "a float", .. })
        ));
    }

    #[test]
    fn test_load_str_assigns_values_and_skips_comments() {
        let mut params = sample();
        params
            .load_str(
                "# finder settings\n\
                 step 2\n\
                 \n\
                 factor 0.5   # coarser pyramid\n\
                 model models/seeta fd.bin\n\
                 roi 0.1 0.1 0.8 0.8\n",
            )
            .unwrap();
        assert_eq!(params.get_int("step").unwrap(), 2);
        assert_relative_eq!(params.get_float("factor").unwrap(), 0.5);
        assert_eq!(params.get_str("model").unwrap(), "models/seeta fd.bin");
        assert_eq!(params.get_float_array("roi").unwrap(), &[0.1, 0.1, 0.8, 0.8]);
        assert_eq!(params.get_int_array("points").unwrap(), &[0, 1]);
    }

    #[rstest]
    #[case::unknown_name("colour 3\n", 1)]
    #[case::bad_int("step\nstep four\n", 1)]
    #[case::too_many_values("step 1 2\n", 1)]
    #[case::repeated("step 1\nstep 2\n", 2)]
    #[case::bad_array("\n\npoints 0 x\n", 3)]
    fn test_load_str_errors_carry_line(#[case] text: &str, #[case] expected_line: usize) {
        let mut params = sample();
        match params.load_str(text) {
            Err(ParameterError::Syntax { line, .. }) => assert_eq!(line, expected_line),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finder.params");

        let mut original = sample();
        original.set_float("factor", 0.75).unwrap();
        original.set_int_array("points", &[2, 3]).unwrap();
        original.save(&path).unwrap();

        let mut reloaded = sample();
        reloaded.load(&path).unwrap();
        assert_relative_eq!(reloaded.get_float("factor").unwrap(), 0.75);
        assert_eq!(reloaded.get_int_array("points").unwrap(), &[2, 3]);
        assert_eq!(reloaded.get_str("model").unwrap(), "");
    }

    #[test]
    fn test_display_includes_help_comments() {
        let text = sample().to_string();
        assert!(text.contains("# scan step\nstep 4\n"));
        assert!(text.contains("# model\n"));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut params = sample();
        assert!(matches!(
            params.load(Path::new("/nonexistent/finder.params")),
            Err(ParameterError::Io { .. })
        ));
    }
}
