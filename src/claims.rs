use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Claim keys consumed from a verified Firebase ID token.
pub mod keys {
    /// Provider-assigned subject identifier.
    pub const SUB: &str = "sub";
    /// User's email address.
    pub const EMAIL: &str = "email";
    /// User's display name.
    pub const NAME: &str = "name";
    /// URL to the user's profile picture.
    pub const PICTURE: &str = "picture";
}

/// The subset of verified Firebase ID token claims used to resolve a user.
///
/// Any other key in the token payload (`iss`, `aud`, `firebase`, ...) is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, the stable Firebase UID of the user.
    pub sub: String,

    /// User's email address.
    pub email: String,

    /// User's display name (if available)
    pub name: Option<String>,

    /// URL to the user's profile picture (if available)
    pub picture: Option<String>,
}

impl Claims {
    /// Extracts the consumed claims from a verified claims map.
    ///
    /// Scalar values are coerced to strings. `sub` and `email` are required;
    /// an absent or `null` value fails with [`Error::MissingClaim`].
    /// Blank `name` and `picture` values (`""`, `"0"`, `0`, `false`) are dropped.
    pub fn from_map(claims: &Map<String, Value>) -> Result<Claims> {
        Ok(Claims {
            sub: required(claims, keys::SUB)?,
            email: required(claims, keys::EMAIL)?,
            name: profile(claims, keys::NAME)?,
            picture: profile(claims, keys::PICTURE)?,
        })
    }
}

impl TryFrom<&Map<String, Value>> for Claims {
    type Error = Error;

    fn try_from(claims: &Map<String, Value>) -> Result<Self> {
        Claims::from_map(claims)
    }
}

/// User attributes derived from [`Claims`].
///
/// `name` and `picture` are `None` when the claim was absent or blank, in which
/// case any value already stored on the user is left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    /// Email address, always present.
    pub email: String,

    /// Display name, only set for a non-empty claim.
    pub name: Option<String>,

    /// Picture URL, only set for a non-empty claim.
    pub picture: Option<String>,
}

/// Transforms claims into the attributes written onto a user record.
///
/// No validation of the email address or picture URL takes place.
pub fn transform_claims(claims: &Claims) -> Attributes {
    Attributes {
        email: claims.email.clone(),
        name: non_empty(claims.name.as_deref()),
        picture: non_empty(claims.picture.as_deref()),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !is_blank(v)).map(str::to_owned)
}

fn is_blank(value: &str) -> bool {
    value.is_empty() || value == "0"
}

/// Reads an optional profile claim, treating falsy scalars as absent.
fn profile(claims: &Map<String, Value>, key: &'static str) -> Result<Option<String>> {
    let blank = match claims.get(key) {
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        _ => false,
    };

    if blank {
        return Ok(None);
    }
    Ok(optional(claims, key)?.filter(|v| !is_blank(v)))
}

fn required(claims: &Map<String, Value>, key: &'static str) -> Result<String> {
    optional(claims, key)?.ok_or(Error::MissingClaim(key))
}

fn optional(claims: &Map<String, Value>, key: &'static str) -> Result<Option<String>> {
    match claims.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(Value::Array(_) | Value::Object(_)) => Err(Error::InvalidClaim(key)),
    }
}
