use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Config,
    Remote,
    Timeout,
    Decode,
    Io,
}

impl ErrorKind {
    /// Stable classification label, recorded as `error_type` in failure files.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Internal => "Internal",
            ErrorKind::Usage => "Usage",
            ErrorKind::Config => "Config",
            ErrorKind::Remote => "Remote",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::Decode => "Decode",
            ErrorKind::Io => "Io",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Internal" => Some(ErrorKind::Internal),
            "Usage" => Some(ErrorKind::Usage),
            "Config" => Some(ErrorKind::Config),
            "Remote" => Some(ErrorKind::Remote),
            "Timeout" => Some(ErrorKind::Timeout),
            "Decode" => Some(ErrorKind::Decode),
            "Io" => Some(ErrorKind::Io),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Message followed by the source chain, e.g. `request failed: connection refused`.
    pub fn detailed_message(&self) -> String {
        let mut text = self
            .message
            .clone()
            .unwrap_or_else(|| default_message(self.kind).to_string());
        let mut cur = StdError::source(self);
        while let Some(source) = cur {
            text.push_str(": ");
            text.push_str(&source.to_string());
            cur = source.source();
        }
        text
    }
}

fn default_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Internal => "internal error",
        ErrorKind::Usage => "usage error",
        ErrorKind::Config => "configuration error",
        ErrorKind::Remote => "remote service error",
        ErrorKind::Timeout => "timed out",
        ErrorKind::Decode => "could not decode response",
        ErrorKind::Io => "i/o error",
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Config => 3,
        ErrorKind::Remote => 4,
        ErrorKind::Timeout => 5,
        ErrorKind::Decode => 6,
        ErrorKind::Io => 7,
    }
}
