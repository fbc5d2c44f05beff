use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// External experiment programs this tool knows how to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Program {
    ValueModels,
    GenerateMarkets,
    ExperimentsPyspark,
}

impl Program {
    /// Script file name of the program.
    pub fn script(&self) -> &'static str {
        match self {
            Program::ValueModels => "value_models.py",
            Program::GenerateMarkets => "generate_markets.py",
            Program::ExperimentsPyspark => "experiments_pyspark.py",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Program::ValueModels => "value-models",
            Program::GenerateMarkets => "generate-markets",
            Program::ExperimentsPyspark => "experiments",
        }
    }
}

impl FromStr for Program {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "value-models" | "value_models" => Ok(Program::ValueModels),
            "generate-markets" | "generate_markets" => Ok(Program::GenerateMarkets),
            "experiments" | "experiments-pyspark" | "experiments_pyspark" => {
                Ok(Program::ExperimentsPyspark)
            }
            _ => Err(ModelError::InvalidProgram(s.to_string())),
        }
    }
}

/// Value-model family understood by `value_models.py`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelVariant {
    Lsvm,
    Lsvm2,
    Gsvm,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Lsvm => "LSVM",
            ModelVariant::Lsvm2 => "LSVM2",
            ModelVariant::Gsvm => "GSVM",
        }
    }
}

impl FromStr for ModelVariant {
    type Err = ModelError;

    // Case-sensitive: the program itself only accepts the upper-case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LSVM" => Ok(ModelVariant::Lsvm),
            "LSVM2" => Ok(ModelVariant::Lsvm2),
            "GSVM" => Ok(ModelVariant::Gsvm),
            _ => Err(ModelError::InvalidVariant(s.to_string())),
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments shared by the market generation and market experiment programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketJob {
    pub variant: String,
    /// Input location (bucket URI or path).
    pub input: String,
    /// Output location (bucket URI or path).
    pub output: String,
    pub dim1: u32,
    pub dim2: u32,
}

/// One invocation of an external program with its positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "camelCase")]
pub enum Job {
    /// `value_models.py <variant> <output_dir>/`
    #[serde(rename_all = "camelCase")]
    ValueModels {
        variant: ModelVariant,
        output_dir: String,
    },
    /// `generate_markets.py <variant> <input> <output> <dim1> <dim2>`
    GenerateMarkets(MarketJob),
    /// `experiments_pyspark.py <variant> <input> <output> <dim1> <dim2>`
    ExperimentsPyspark(MarketJob),
}

impl Job {
    pub fn program(&self) -> Program {
        match self {
            Job::ValueModels { .. } => Program::ValueModels,
            Job::GenerateMarkets(_) => Program::GenerateMarkets,
            Job::ExperimentsPyspark(_) => Program::ExperimentsPyspark,
        }
    }

    /// Build a market job for `program`; fails for [`Program::ValueModels`].
    pub fn market(program: Program, args: MarketJob) -> Result<Self, ModelError> {
        match program {
            Program::GenerateMarkets => Ok(Job::GenerateMarkets(args)),
            Program::ExperimentsPyspark => Ok(Job::ExperimentsPyspark(args)),
            Program::ValueModels => Err(ModelError::InvalidJob(
                "value-models does not take market arguments".into(),
            )),
        }
    }

    /// Positional arguments in the order the program expects them.
    pub fn argv(&self) -> Vec<String> {
        match self {
            Job::ValueModels {
                variant,
                output_dir,
            } => vec![variant.to_string(), with_trailing_slash(output_dir)],
            Job::GenerateMarkets(m) | Job::ExperimentsPyspark(m) => vec![
                m.variant.clone(),
                m.input.clone(),
                m.output.clone(),
                m.dim1.to_string(),
                m.dim2.to_string(),
            ],
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            Job::ValueModels { output_dir, .. } if output_dir.trim().is_empty() => {
                Err(ModelError::InvalidJob("empty output directory".into()))
            }
            Job::GenerateMarkets(m) | Job::ExperimentsPyspark(m) => {
                if m.variant.trim().is_empty() {
                    return Err(ModelError::InvalidJob("empty variant".into()));
                }
                if m.input.trim().is_empty() || m.output.trim().is_empty() {
                    return Err(ModelError::InvalidJob("empty input or output location".into()));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// The value-model program concatenates paths, so the directory must end with `/`.
fn with_trailing_slash(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    }
}

/// How a detached local job is kept alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocalMode {
    /// Detached terminal multiplexer session.
    #[default]
    Tmux,
    /// Background shell process with output redirected to a log file.
    Nohup,
}

/// Where a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "launch", rename_all = "camelCase")]
pub enum Launch {
    #[serde(rename_all = "camelCase")]
    Local {
        session: String,
        #[serde(default)]
        mode: LocalMode,
        /// Interpreter used to run the script.
        python: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<PathBuf>,
        /// Log file for [`LocalMode::Nohup`]; defaults to `<session>.log`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        log: Option<PathBuf>,
    },
    #[serde(rename_all = "camelCase")]
    Remote {
        cluster: String,
        region: String,
        /// Object-storage URI of the program script.
        main_uri: String,
        /// Packaged code bundle shipped alongside the script.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bundle_uri: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub job: Job,
    pub launch: Launch,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(variant: &str) -> MarketJob {
        MarketJob {
            variant: variant.into(),
            input: "gs://bucket/in/".into(),
            output: "gs://bucket/out/".into(),
            dim1: 7,
            dim2: 10,
        }
    }

    #[test]
    fn value_models_argv_is_variant_then_dir() {
        let job = Job::ValueModels {
            variant: ModelVariant::Gsvm,
            output_dir: "results".into(),
        };
        assert_eq!(job.argv(), vec!["GSVM", "results/"]);
    }

    #[test]
    fn value_models_keeps_existing_slash() {
        let job = Job::ValueModels {
            variant: ModelVariant::Lsvm2,
            output_dir: "results/".into(),
        };
        assert_eq!(job.argv(), vec!["LSVM2", "results/"]);
    }

    #[test]
    fn market_argv_order() {
        let expected = vec!["SM", "gs://bucket/in/", "gs://bucket/out/", "7", "10"];
        assert_eq!(Job::GenerateMarkets(market("SM")).argv(), expected);
        assert_eq!(Job::ExperimentsPyspark(market("SM")).argv(), expected);
    }

    #[test]
    fn variant_is_case_sensitive() {
        assert_eq!("GSVM".parse::<ModelVariant>().unwrap(), ModelVariant::Gsvm);
        assert!("gsvm".parse::<ModelVariant>().is_err());
        assert!("MRVM".parse::<ModelVariant>().is_err());
    }

    #[test]
    fn market_constructor_rejects_value_models() {
        assert!(Job::market(Program::ValueModels, market("x")).is_err());
        assert_eq!(
            Job::market(Program::ExperimentsPyspark, market("x")).unwrap().program(),
            Program::ExperimentsPyspark
        );
    }

    #[test]
    fn validate_rejects_empty_locations() {
        let mut m = market("SM");
        m.output = " ".into();
        assert!(Job::GenerateMarkets(m).validate().is_err());
        assert!(Job::GenerateMarkets(market("SM")).validate().is_ok());
    }

    #[test]
    fn program_parse_and_script() {
        assert_eq!("experiments".parse::<Program>().unwrap().script(), "experiments_pyspark.py");
        assert_eq!("generate-markets".parse::<Program>().unwrap().script(), "generate_markets.py");
        assert!("spark".parse::<Program>().is_err());
    }

    #[test]
    fn job_serde_tagged_by_program() {
        let job = Job::ValueModels {
            variant: ModelVariant::Lsvm,
            output_dir: "out/".into(),
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["program"], "valueModels");
        assert_eq!(json["variant"], "LSVM");
        assert_eq!(json["outputDir"], "out/");

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back, job);
    }

    #[test]
    fn launch_local_defaults_to_tmux() {
        let json = r#"{"launch":"local","session":"gsvm","python":".venv/bin/python"}"#;
        let launch: Launch = serde_json::from_str(json).unwrap();
        match launch {
            Launch::Local { mode, workdir, .. } => {
                assert_eq!(mode, LocalMode::Tmux);
                assert!(workdir.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
