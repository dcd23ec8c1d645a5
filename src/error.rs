use std::ffi::NulError;

use thiserror::Error;

use crate::errno::Errno;

#[derive(Error, Debug)]
pub enum ProjError {
    /// The engine reported `errno`; `message` is its description as given by the owning context.
    #[error("{message}")]
    Engine { errno: Errno, message: String },
    #[error("A nul byte was found in a definition, CRS or option argument: {0}")]
    ArgumentNul(#[from] NulError),
    #[error("Transformed {transformed} of {expected} coordinates")]
    Incomplete { expected: usize, transformed: usize },
    #[error("Invalid coordinate layout: {0}")]
    InvalidLayout(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("The transformation object has been released")]
    Released,
    #[error("Couldn't convert a coordinate to or from f64")]
    FloatConversion,
}

impl ProjError {
    /// The engine error code, if this error came from the engine.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            ProjError::Engine { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_display() {
        let err = ProjError::Engine {
            errno: Errno::COORD_TRANSFM_INVALID_COORD,
            message: Errno::COORD_TRANSFM_INVALID_COORD.message(),
        };
        assert_eq!(err.to_string(), "Invalid coordinate");
        assert_eq!(err.errno(), Some(Errno(2049)));

        let nul = CString::new("EPSG:\04326").unwrap_err();
        let err = ProjError::from(nul);
        assert!(matches!(err, ProjError::ArgumentNul(_)));
        assert_eq!(err.errno(), None);

        let err = ProjError::Incomplete {
            expected: 3,
            transformed: 1,
        };
        assert_eq!(err.to_string(), "Transformed 1 of 3 coordinates");
    }
}
