use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Pinned library version, written `name==version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pin {
    pub name: String,
    pub version: String,
}

impl Pin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Canonical package name: lowercase, with `_` and `.` folded into `-`.
    pub fn normalized_name(&self) -> String {
        normalize(&self.name)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(['_', '.'], "-")
}

impl FromStr for Pin {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = s
            .trim()
            .split_once("==")
            .ok_or_else(|| ModelError::InvalidPin(s.to_string()))?;
        let (name, version) = (name.trim(), version.trim());
        if name.is_empty() || version.is_empty() || version.contains(char::is_whitespace) {
            return Err(ModelError::InvalidPin(s.to_string()));
        }
        Ok(Pin::new(name, version))
    }
}

impl TryFrom<String> for Pin {
    type Error = ModelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Pin> for String {
    fn from(p: Pin) -> Self {
        p.to_string()
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}

/// Difference between the pinned manifest and what is installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    Missing { name: String, want: String },
    Mismatch { name: String, want: String, have: String },
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::Missing { name, want } => write!(f, "{name}: missing (want {want})"),
            Drift::Mismatch { name, want, have } => {
                write!(f, "{name}: installed {have}, want {want}")
            }
        }
    }
}

/// Pinned set of libraries installed into the isolated environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(pub Vec<Pin>);

impl Manifest {
    /// Parse requirements-style text: one pin per line, `#` comments and blank lines ignored.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        text.lines()
            .map(|line| line.split('#').next().unwrap_or_default().trim())
            .filter(|line| !line.is_empty())
            .map(Pin::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Manifest)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pin> {
        self.0.iter()
    }

    /// Pins as installer arguments (`name==version`).
    pub fn to_args(&self) -> Vec<String> {
        self.0.iter().map(Pin::to_string).collect()
    }

    /// Compare against `pip freeze` output.
    ///
    /// Lines without `==` (editable or URL installs) are ignored; extra installed packages are not drift.
    pub fn drift(&self, freeze: &str) -> Vec<Drift> {
        let installed: HashMap<String, &str> = freeze
            .lines()
            .filter_map(|line| line.trim().split_once("=="))
            .map(|(name, version)| (normalize(name), version.trim()))
            .collect();

        self.0
            .iter()
            .filter_map(|pin| match installed.get(&pin.normalized_name()) {
                None => Some(Drift::Missing {
                    name: pin.name.clone(),
                    want: pin.version.clone(),
                }),
                Some(have) if *have != pin.version => Some(Drift::Mismatch {
                    name: pin.name.clone(),
                    want: pin.version.clone(),
                    have: (*have).to_string(),
                }),
                Some(_) => None,
            })
            .collect()
    }
}

/// Language runtime shipped as a tarball and unpacked to a fixed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeArchive {
    pub url: String,
    /// Where the downloaded archive is stored.
    pub archive: PathBuf,
    /// Directory the archive is unpacked into (its top-level folder is stripped).
    pub install_dir: PathBuf,
    /// Variable that receives `install_dir`, e.g. `JAVA_HOME`.
    pub home_var: String,
}

impl RuntimeArchive {
    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_parses_and_displays() {
        let pin: Pin = "pandas==1.1.5".parse().unwrap();
        assert_eq!(pin.name, "pandas");
        assert_eq!(pin.version, "1.1.5");
        assert_eq!(pin.to_string(), "pandas==1.1.5");
    }

    #[test]
    fn pin_rejects_unpinned_specs() {
        assert!("pandas".parse::<Pin>().is_err());
        assert!("pandas>=1.0".parse::<Pin>().is_err());
        assert!("==1.0".parse::<Pin>().is_err());
        assert!("pandas==".parse::<Pin>().is_err());
    }

    #[test]
    fn manifest_parse_skips_comments_and_blanks() {
        let text = "# experiments\nnumpy==1.19.5\n\npulp==2.4  # solver\n";
        let m = Manifest::parse(text).unwrap();
        assert_eq!(m.to_args(), vec!["numpy==1.19.5", "pulp==2.4"]);
    }

    #[test]
    fn manifest_parse_fails_on_bad_line() {
        assert!(Manifest::parse("numpy==1.19.5\nprettytable\n").is_err());
    }

    #[test]
    fn drift_is_empty_when_freeze_matches() {
        let m = Manifest::parse("pulp==2.4\nprettytable==2.1.0").unwrap();
        let freeze = "PuLP==2.4\nprettytable==2.1.0\nsix==1.16.0\n";
        assert!(m.drift(freeze).is_empty());
    }

    #[test]
    fn drift_reports_missing_and_mismatch() {
        let m = Manifest::parse("numpy==1.19.5\npandas==1.1.5").unwrap();
        let freeze = "numpy==1.20.0\n-e git+https://example.invalid/x#egg=x\n";
        let drift = m.drift(freeze);
        assert_eq!(
            drift,
            vec![
                Drift::Mismatch {
                    name: "numpy".into(),
                    want: "1.19.5".into(),
                    have: "1.20.0".into(),
                },
                Drift::Missing {
                    name: "pandas".into(),
                    want: "1.1.5".into(),
                },
            ]
        );
    }

    #[test]
    fn names_are_normalized() {
        let m = Manifest::parse("typing_extensions==3.7.4").unwrap();
        assert!(m.drift("typing-extensions==3.7.4").is_empty());
    }

    #[test]
    fn manifest_serde_as_strings() {
        let m = Manifest::parse("pkbar==0.5").unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, r#"["pkbar==0.5"]"#);
        let back: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
