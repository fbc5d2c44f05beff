use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid pin: {0} (expected name==version)")]
    InvalidPin(String),
    #[error("invalid model variant: {0} (expected LSVM|LSVM2|GSVM)")]
    InvalidVariant(String),
    #[error("invalid program: {0} (expected value-models|generate-markets|experiments)")]
    InvalidProgram(String),
    #[error("invalid job: {0}")]
    InvalidJob(String),
}
