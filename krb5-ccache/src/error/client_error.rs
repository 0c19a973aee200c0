use super::{error, Error};

impl Error {
    error!(
        RENEWAL_INTERVAL_TOO_SHORT,
        1, "Renewal interval must be at least 1000 milliseconds"
    );
    error!(NOT_LOGGED_IN, 2, "Must login first");
}
