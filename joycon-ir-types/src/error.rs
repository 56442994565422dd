pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    pub(crate) fn too_short(what: &str, expected: usize, actual: usize) -> Self {
        Error::Parse(format!(
            "{} needs {} bytes, got {}",
            what, expected, actual
        ))
    }
}
