use std::fmt::Display;

use http::StatusCode;

/// Local outcome of a single inbound scrape request.
///
/// This is what the caller receives as the response status. It says nothing
/// about the status the remote target answered with; see
/// [`FetchResult`](crate::FetchResult) for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The outbound GET completed a round trip, whatever the remote status
    Ok,
    /// The outbound GET failed (bad URL, unreachable host, TLS failure, ...)
    BadRequest,
    /// No slot became available within the admission timeout
    RequestTimeout,
    /// The inbound payload could not be read
    InternalServerError,
    /// The inbound request used a method other than `POST`
    NotImplemented,
}

impl Outcome {
    /// The HTTP status code reported to the caller and to telemetry
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Outcome::Ok => StatusCode::OK,
            Outcome::BadRequest => StatusCode::BAD_REQUEST,
            Outcome::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Outcome::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Outcome::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Returns `true` if the local operation succeeded
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

impl From<Outcome> for StatusCode {
    fn from(outcome: Outcome) -> Self {
        outcome.status_code()
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.status_code())
    }
}
