use std::fmt;

/// A numeric error code reported by a projection engine.
///
/// Codes are grouped in families by their high bits: `0x400` for invalid
/// operation definitions, `0x800` for coordinate transformation failures and
/// `0x1000` for everything else. Zero means no error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Errno(pub i32);

impl Errno {
    pub const NONE: Errno = Errno(0);

    pub const INVALID_OP: Errno = Errno(1024);
    pub const INVALID_OP_WRONG_SYNTAX: Errno = Errno(1025);
    pub const INVALID_OP_MISSING_ARG: Errno = Errno(1026);
    pub const INVALID_OP_ILLEGAL_ARG_VALUE: Errno = Errno(1027);
    pub const INVALID_OP_MUTUALLY_EXCLUSIVE_ARGS: Errno = Errno(1028);
    pub const INVALID_OP_FILE_NOT_FOUND_OR_INVALID: Errno = Errno(1029);

    pub const COORD_TRANSFM: Errno = Errno(2048);
    pub const COORD_TRANSFM_INVALID_COORD: Errno = Errno(2049);
    pub const COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN: Errno = Errno(2050);
    pub const COORD_TRANSFM_NO_OPERATION: Errno = Errno(2051);
    pub const COORD_TRANSFM_OUTSIDE_GRID: Errno = Errno(2052);
    pub const COORD_TRANSFM_GRID_AT_NODATA: Errno = Errno(2053);
    pub const COORD_TRANSFM_NO_CONVERGENCE: Errno = Errno(2054);
    pub const COORD_TRANSFM_MISSING_TIME: Errno = Errno(2055);

    pub const OTHER: Errno = Errno(4096);
    pub const OTHER_API_MISUSE: Errno = Errno(4097);
    pub const OTHER_NO_INVERSE_OP: Errno = Errno(4098);
    pub const OTHER_NETWORK_ERROR: Errno = Errno(4099);

    pub const fn is_err(self) -> bool {
        self.0 != 0
    }

    /// The human-readable description of this code.
    pub fn message(self) -> String {
        let known = match self {
            Errno::NONE => "No error",
            Errno::INVALID_OP_WRONG_SYNTAX => "Invalid PROJ string syntax",
            Errno::INVALID_OP_MISSING_ARG => "Missing argument",
            Errno::INVALID_OP_ILLEGAL_ARG_VALUE => "Invalid value for an argument",
            Errno::INVALID_OP_MUTUALLY_EXCLUSIVE_ARGS => "Mutually exclusive arguments",
            Errno::INVALID_OP_FILE_NOT_FOUND_OR_INVALID => "File not found or invalid",
            Errno::COORD_TRANSFM_INVALID_COORD => "Invalid coordinate",
            Errno::COORD_TRANSFM_OUTSIDE_PROJECTION_DOMAIN => {
                "Coordinate is outside of the projection domain"
            }
            Errno::COORD_TRANSFM_NO_OPERATION => {
                "No operation matching criteria found for coordinate"
            }
            Errno::COORD_TRANSFM_OUTSIDE_GRID => "Coordinate to transform falls outside grid",
            Errno::COORD_TRANSFM_GRID_AT_NODATA => {
                "Coordinate to transform falls into a grid cell that evaluates to nodata"
            }
            Errno::COORD_TRANSFM_NO_CONVERGENCE => {
                "Iterative method fails to converge on coordinate to transform"
            }
            Errno::COORD_TRANSFM_MISSING_TIME => "Coordinate to transform lacks time",
            Errno::OTHER_API_MISUSE => "API misuse",
            Errno::OTHER_NO_INVERSE_OP => "No inverse operation",
            Errno::OTHER_NETWORK_ERROR => "Network error when accessing a remote resource",
            _ if self.0 < 0 => return format!("Unknown error (code {})", self.0),
            _ if self.0 & Errno::INVALID_OP.0 != 0 => {
                "Unspecified error related to coordinate operation initialization"
            }
            _ if self.0 & Errno::COORD_TRANSFM.0 != 0 => {
                "Unspecified error related to coordinate transformation"
            }
            _ if self.0 & Errno::OTHER.0 != 0 => "Unspecified error",
            _ => return format!("Unknown error (code {})", self.0),
        };
        known.to_string()
    }
}

impl From<i32> for Errno {
    fn from(code: i32) -> Self {
        Errno(code)
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.message(), self.0)
    }
}
