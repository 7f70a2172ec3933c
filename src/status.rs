//! Status classification.
//!
//! Maps a numeric HTTP status to a symbolic [`StatusCode`]. The mapping is total: any code that
//! is not in the well-known table (100-599) classifies as [`StatusCode::Unknown`], whose numeric
//! value is `0`.
//!
//! ```rust
//! use apiresponse::StatusCode;
//!
//! assert_eq!(StatusCode::from_code(404), StatusCode::NotFound);
//! assert_eq!(StatusCode::from_code(404).code(), 404);
//! assert_eq!(StatusCode::from_code(799), StatusCode::Unknown);
//! assert_eq!(StatusCode::Unknown.code(), 0);
//! ```

use std::fmt;

macro_rules! status_codes {
    ($($(#[$doc:meta])* $name:ident = $code:literal,)+) => {
        /// Symbolic name of a well-known HTTP status code.
        #[non_exhaustive]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            $($(#[$doc])* $name,)+
            /// Any code outside the known table.
            Unknown,
        }

        impl StatusCode {
            /// Classify a numeric status. Never fails.
            pub const fn from_code(code: u16) -> Self {
                match code {
                    $($code => StatusCode::$name,)+
                    _ => StatusCode::Unknown,
                }
            }

            /// Numeric value; `0` for [`StatusCode::Unknown`].
            pub const fn code(self) -> u16 {
                match self {
                    $(StatusCode::$name => $code,)+
                    StatusCode::Unknown => 0,
                }
            }

            /// Symbolic name, e.g. `"NotFound"`.
            pub const fn name(self) -> &'static str {
                match self {
                    $(StatusCode::$name => stringify!($name),)+
                    StatusCode::Unknown => "Unknown",
                }
            }
        }
    };
}

status_codes! {
    Continue = 100,
    SwitchingProtocols = 101,
    Processing = 102,
    EarlyHints = 103,
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NonAuthoritativeInformation = 203,
    /// Success without a body; accessing data yields `NoContentError`.
    NoContent = 204,
    ResetContent = 205,
    PartialContent = 206,
    MultiStatus = 207,
    AlreadyReported = 208,
    ImUsed = 226,
    MultipleChoices = 300,
    MovedPermanently = 301,
    Found = 302,
    SeeOther = 303,
    NotModified = 304,
    UseProxy = 305,
    TemporaryRedirect = 307,
    PermanentRedirect = 308,
    BadRequest = 400,
    Unauthorized = 401,
    PaymentRequired = 402,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    ProxyAuthenticationRequired = 407,
    RequestTimeout = 408,
    Conflict = 409,
    Gone = 410,
    LengthRequired = 411,
    PreconditionFailed = 412,
    PayloadTooLarge = 413,
    UriTooLong = 414,
    UnsupportedMediaType = 415,
    RangeNotSatisfiable = 416,
    ExpectationFailed = 417,
    ImATeapot = 418,
    MisdirectedRequest = 421,
    UnprocessableEntity = 422,
    Locked = 423,
    FailedDependency = 424,
    TooEarly = 425,
    UpgradeRequired = 426,
    PreconditionRequired = 428,
    TooManyRequests = 429,
    RequestHeaderFieldsTooLarge = 431,
    UnavailableForLegalReasons = 451,
    InternalServerError = 500,
    NotImplemented = 501,
    BadGateway = 502,
    ServiceUnavailable = 503,
    GatewayTimeout = 504,
    HttpVersionNotSupported = 505,
    VariantAlsoNegotiates = 506,
    InsufficientStorage = 507,
    LoopDetected = 508,
    NotExtended = 510,
    NetworkAuthenticationRequired = 511,
}

impl StatusCode {
    /// `true` for 1xx codes.
    pub const fn is_informational(self) -> bool {
        matches!(self.code(), 100..=199)
    }

    /// `true` for 2xx codes.
    pub const fn is_success(self) -> bool {
        matches!(self.code(), 200..=299)
    }

    /// `true` for 3xx codes.
    pub const fn is_redirection(self) -> bool {
        matches!(self.code(), 300..=399)
    }

    /// `true` for 4xx codes.
    pub const fn is_client_error(self) -> bool {
        matches!(self.code(), 400..=499)
    }

    /// `true` for 5xx codes.
    pub const fn is_server_error(self) -> bool {
        matches!(self.code(), 500..=599)
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode::from_code(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}
