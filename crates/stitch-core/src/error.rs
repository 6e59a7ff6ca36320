use std::fmt;

/// Machine-readable error codes shared by every resolver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingBinding,
    DependencyCycle,
    UnknownRoot,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingBinding => "E2001",
            Self::DependencyCycle => "E2003",
            Self::UnknownRoot => "E2004",
        }
    }

    /// Short human-facing summary.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingBinding => "Missing binding",
            Self::DependencyCycle => "Dependency cycle cannot be broken",
            Self::UnknownRoot => "Requested key has no binding",
        }
    }

    /// Optional remediation hint for diagnostics.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingBinding => {
                Some("Declare a binding for the key, or mark the dependency optional.")
            }
            Self::DependencyCycle => Some(
                "Request one of the cycle's dependencies through a Provider or Lazy to break it.",
            ),
            Self::UnknownRoot => Some("Only keys with a binding can be exposed or kept."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 3] = [
        ErrorCode::MissingBinding,
        ErrorCode::DependencyCycle,
        ErrorCode::UnknownRoot,
    ];

    #[test]
    fn all_codes_are_unique() {
        let codes: HashSet<&str> = ALL.iter().map(|c| c.code()).collect();
        assert_eq!(codes.len(), ALL.len());
    }

    #[test]
    fn codes_follow_e_prefix_format() {
        for code in ALL {
            let s = code.code();
            assert!(s.starts_with('E'), "{s} missing E prefix");
            assert_eq!(s.len(), 5, "{s} is not E####");
            assert!(s[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_is_the_code() {
        assert_eq!(ErrorCode::DependencyCycle.to_string(), "E2003");
    }
}
