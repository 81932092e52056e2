use serde::{Deserialize, Serialize};

use crate::PermissionCode;

/// A permission argument: one code, or a list meaning "any of these".
///
/// There is no conjunction. An empty list is satisfied by nothing except the
/// admin role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Requirement {
    Single(PermissionCode),
    AnyOf(Vec<PermissionCode>),
}

impl Requirement {
    pub fn single(code: impl Into<PermissionCode>) -> Self {
        Self::Single(code.into())
    }

    pub fn any_of<I, C>(codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<PermissionCode>,
    {
        Self::AnyOf(codes.into_iter().map(Into::into).collect())
    }

    pub fn codes(&self) -> &[PermissionCode] {
        match self {
            Self::Single(code) => std::slice::from_ref(code),
            Self::AnyOf(codes) => codes,
        }
    }
}

impl From<&'static str> for Requirement {
    fn from(code: &'static str) -> Self {
        Self::single(code)
    }
}

impl From<PermissionCode> for Requirement {
    fn from(code: PermissionCode) -> Self {
        Self::Single(code)
    }
}

impl From<Vec<PermissionCode>> for Requirement {
    fn from(codes: Vec<PermissionCode>) -> Self {
        Self::AnyOf(codes)
    }
}

impl core::fmt::Display for Requirement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Single(code) => write!(f, "{code}"),
            Self::AnyOf(codes) => {
                f.write_str("any of [")?;
                for (i, code) in codes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{code}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_string_or_array() {
        let single: Requirement = serde_json::from_str(r#""project:read""#).unwrap();
        assert_eq!(single, Requirement::single("project:read"));

        let any: Requirement = serde_json::from_str(r#"["user:read","permission:manage"]"#).unwrap();
        assert_eq!(any, Requirement::any_of(["user:read", "permission:manage"]));
        assert_eq!(any.codes().len(), 2);
    }

    #[test]
    fn displays_for_logs() {
        assert_eq!(Requirement::single("task:read").to_string(), "task:read");
        assert_eq!(Requirement::any_of(["a", "b"]).to_string(), "any of [a, b]");
    }
}
