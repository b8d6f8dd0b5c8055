use std::fmt;
use std::path::PathBuf;

mod creation;
pub use creation::{create_value, interpolate, Globals};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reference to undefined variable: ${0}")]
    UndefinedVariable(String),
    #[error("Can't interpolate list variable ${0} into a string")]
    ExpectedScalar(String),
    #[error("Expected a single value for {0}, got a list")]
    UnexpectedList(String),
}

/// A reference to a file under one of the run's root directories,
/// written `"name:role"` in a recipe (e.g. `"3C286.G0:output"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathRef {
    /// File name (or relative path) under the root.
    pub name: String,
    /// Root the name is relative to: "input", "output" or "msdir".
    pub role: String,
}

impl PathRef {
    /// Parse `text` as a path reference.
    ///
    /// The part after the last ':' must be a non-empty run of lowercase
    /// ascii letters and underscores, and the part before it must be non-empty.
    /// Strings like `"0:50~206"` (a channel selection) or `"RR:LL"` are not references.
    pub fn parse(text: &str) -> Option<Self> {
        let (name, role) = text.rsplit_once(':')?;
        let role_ok = !role.is_empty()
            && role.chars().all(|c| c.is_ascii_lowercase() || c == '_');
        if name.is_empty() || !role_ok {
            return None;
        }
        Some(Self {
            name: name.to_owned(),
            role: role.to_owned(),
        })
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.role)
    }
}

/// Value of a single task parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Unresolved path reference.
    Ref(PathRef),
    /// Path produced by resolving a [`PathRef`].
    Path(PathBuf),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Create a string value, turning `"name:role"` strings into references.
    pub fn from_text(text: &str) -> Self {
        match PathRef::parse(text) {
            Some(path_ref) => Self::Ref(path_ref),
            None => Self::Str(text.to_owned()),
        }
    }

    /// Create a value from an unquoted word, e.g. `true`, `30`, `30.0` or `quack`.
    pub fn from_bare(word: &str) -> Self {
        match word {
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => (),
        }
        // numbers are only typed when they'd be passed on exactly as written,
        // so "007", "+5" or "1.50" reach the tool unchanged:
        if let Ok(i) = word.parse::<i64>() {
            if i.to_string() == word {
                return Self::Int(i);
            }
        }
        // f64 parses "inf" and "nan" too, but those are plain words here:
        if looks_numeric(word) {
            if let Ok(f) = word.parse::<f64>() {
                if format!("{f:?}") == word {
                    return Self::Float(f);
                }
            }
        }
        Self::from_text(word)
    }

    /// True if this value, or anything nested in it, is an unresolved reference.
    pub fn has_refs(&self) -> bool {
        match self {
            Self::Ref(_) => true,
            Self::List(vals) => vals.iter().any(Self::has_refs),
            _ => false,
        }
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(vals) => {
                f.write_str("[")?;
                fmt_list(vals, f)?;
                f.write_str("]")
            }
            other => fmt::Display::fmt(other, f),
        }
    }
}

fn looks_numeric(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
        && word
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

fn fmt_list(vals: &[ParamValue], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, val) in vals.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        val.fmt_nested(f)?;
    }
    Ok(())
}

/// Formats values the way they're passed to tools on the command line:
/// lists are comma-joined, and nested lists are bracketed (`[a,b],[c]`).
impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            // Debug keeps the decimal point on round numbers ("30.0", not "30"):
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Ref(r) => write!(f, "{r}"),
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::List(vals) => fmt_list(vals, f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_path_ref_parse() {
        assert_eq!(
            Some(PathRef {
                name: "mytable".to_owned(),
                role: "output".to_owned()
            }),
            PathRef::parse("mytable:output")
        );
        // last colon wins:
        assert_eq!(
            "a:b.G0",
            PathRef::parse("a:b.G0:output").unwrap().name
        );
        assert_eq!(None, PathRef::parse("0:50~206"));
        assert_eq!(None, PathRef::parse("RR:LL"));
        assert_eq!(None, PathRef::parse(":output"));
        assert_eq!(None, PathRef::parse("table:"));
        assert_eq!(None, PathRef::parse("no_colon"));
        assert_eq!(None, PathRef::parse(""));
    }

    #[test]
    fn test_from_bare() {
        assert_eq!(ParamValue::Bool(true), ParamValue::from_bare("true"));
        assert_eq!(ParamValue::Int(-7), ParamValue::from_bare("-7"));
        assert_eq!(ParamValue::Float(30.0), ParamValue::from_bare("30.0"));
        assert_eq!(ParamValue::Float(0.05), ParamValue::from_bare("0.05"));
        assert_eq!(ParamValue::Str("inf".to_owned()), ParamValue::from_bare("inf"));
        assert_eq!(ParamValue::Str("0:50~206".to_owned()), ParamValue::from_bare("0:50~206"));
        assert_eq!(ParamValue::Str("2.3.4".to_owned()), ParamValue::from_bare("2.3.4"));
        assert!(matches!(ParamValue::from_bare("x.B0:output"), ParamValue::Ref(_)));
    }

    #[test]
    fn test_from_bare_keeps_text() {
        for word in ["007", "+5", "1.50", "1.5e-3", "99999999999999999999", "-0"] {
            assert_eq!(ParamValue::Str(word.to_owned()), ParamValue::from_bare(word));
            assert_eq!(word, ParamValue::from_bare(word).to_string());
        }
    }

    #[test]
    fn test_display() {
        let val = ParamValue::List(vec![
            ParamValue::List(vec![ParamValue::Int(0), ParamValue::Int(1)]),
            ParamValue::List(vec![ParamValue::Str("G".to_owned())]),
        ]);
        assert_eq!("[0,1],[G]", val.to_string());
        let val = ParamValue::List(vec![
            ParamValue::Path(PathBuf::from("/out/a.G0")),
            ParamValue::Float(30.0),
            ParamValue::Bool(false),
        ]);
        assert_eq!("/out/a.G0,30.0,false", val.to_string());
        assert_eq!("", ParamValue::Str(String::new()).to_string());
    }

    #[test]
    fn test_has_refs() {
        let nested = ParamValue::List(vec![ParamValue::List(vec![ParamValue::from_text(
            "x:output",
        )])]);
        assert!(nested.has_refs());
        assert!(!ParamValue::from_text("x").has_refs());
    }
}
