mod client_error;
mod krb5_error;

pub type ErrorCode = i32;

#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub code: ErrorCode,
    pub message: &'static str,
}

impl Error {
    /// Whether `err`, or any error it wraps, is this error.
    pub fn matches(&self, err: &anyhow::Error) -> bool {
        let is_self = |e: &&Error| e.code == self.code;
        err.downcast_ref::<&'static Error>().is_some_and(is_self)
            || err
                .chain()
                .any(|cause| cause.downcast_ref::<&'static Error>().is_some_and(is_self))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

macro_rules! error {
    ($error:ident, $code:expr, $message:expr) => {
        pub const $error: &'static Error = &Error {
            code: $code,
            message: $message,
        };
    };
}

pub(self) use error;
