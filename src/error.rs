//! The error type used across the autoscaler

/// An error from the autoscaler
#[derive(Debug)]
pub enum Error {
    /// An error reported by one of our external collaborators (`AgentManagement`,
    /// `SchedulingService`, `JobOperations`)
    Collaborator(String),
    /// A generic error with a message
    Generic(String),
    /// An error from sending or receiving an HTTP request
    Reqwest(reqwest::Error),
    /// An IO error
    Io(std::io::Error),
    /// An error from loading our config
    Config(config::ConfigError),
    /// An error from converting a value with serde
    Serde(serde_json::Error),
    /// An error from joining a tokio task
    Join(tokio::task::JoinError),
    /// An evaluation exceeded its deadline
    Timeout(tokio::time::error::Elapsed),
}

impl Error {
    /// Create a new generic error
    ///
    /// # Arguments
    ///
    /// * `msg` - The error message to set
    pub fn new<T: Into<String>>(msg: T) -> Self {
        Error::Generic(msg.into())
    }

    /// Create a new error reported by a collaborator
    ///
    /// # Arguments
    ///
    /// * `msg` - The error message to set
    pub fn collaborator<T: Into<String>>(msg: T) -> Self {
        Error::Collaborator(msg.into())
    }

    /// Get the error message for this error if one exists
    pub fn msg(&self) -> String {
        match self {
            Error::Collaborator(msg) => msg.clone(),
            Error::Generic(msg) => msg.clone(),
            Error::Reqwest(err) => err.to_string(),
            Error::Io(err) => err.to_string(),
            Error::Config(err) => err.to_string(),
            Error::Serde(err) => err.to_string(),
            Error::Join(err) => err.to_string(),
            Error::Timeout(err) => err.to_string(),
        }
    }

    /// Get the kind of error as a str
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Collaborator(_) => "Collaborator",
            Error::Generic(_) => "Generic",
            Error::Reqwest(_) => "Reqwest",
            Error::Io(_) => "Io",
            Error::Config(_) => "Config",
            Error::Serde(_) => "Serde",
            Error::Join(_) => "Join",
            Error::Timeout(_) => "Timeout",
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.msg())
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Reqwest(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serde(error)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Error::Join(error)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(error)
    }
}
