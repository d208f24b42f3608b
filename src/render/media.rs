//! Media type parsing and response format negotiation
//!
//! ```text
//! media-type = type "/" subtype *( OWS ";" OWS parameter )
//! parameter  = token "=" ( token / quoted-string )
//! ```

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{anychar, char, none_of, space0},
    combinator::{all_consuming, map},
    multi::many0,
    sequence::{delimited, preceded, separated_pair, tuple},
    IResult,
};
use thiserror::Error;

/// Media type parse failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid media type: '{0}'")]
pub struct MediaTypeError(pub String);

/// A parsed media type
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    /// Top-level type, lowercased
    pub kind: String,
    /// Subtype, lowercased
    pub subtype: String,
    /// Parameters in order of appearance, names lowercased
    pub params: Vec<(String, String)>,
}

impl MediaType {
    /// `type/subtype` without parameters
    pub fn essence(&self) -> String {
        format!("{}/{}", self.kind, self.subtype)
    }

    /// Value of a parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response body formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// `application/json`
    #[default]
    Json,
    /// `text/csv`
    Csv,
}

impl ResponseFormat {
    /// Content type sent with the body
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

/// Pick the response format for an `Accept` header value.
///
/// Absent, empty, unparsable or unrecognized values all select JSON.
pub fn negotiate_format(accept: Option<&str>) -> ResponseFormat {
    let accept = match accept.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return ResponseFormat::Json,
    };

    match parse_media_type(accept) {
        Ok(media) if media.essence() == "text/csv" => ResponseFormat::Csv,
        Ok(_) => ResponseFormat::Json,
        Err(e) => {
            tracing::debug!(error = %e, "Invalid media type, defaulting to JSON");
            ResponseFormat::Json
        }
    }
}

/// Parse a single media type with optional parameters
pub fn parse_media_type(input: &str) -> Result<MediaType, MediaTypeError> {
    match all_consuming(media_type)(input.trim()) {
        Ok((_, media)) => Ok(media),
        Err(_) => Err(MediaTypeError(input.to_string())),
    }
}

fn media_type(input: &str) -> IResult<&str, MediaType> {
    let (input, (kind, _, subtype)) = tuple((token, char('/'), token))(input)?;
    let (input, params) = many0(parameter)(input)?;
    let (input, _) = space0(input)?;

    Ok((
        input,
        MediaType {
            kind: kind.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        },
    ))
}

fn parameter(input: &str) -> IResult<&str, (String, String)> {
    let (input, (name, value)) = preceded(
        tuple((space0, char(';'), space0)),
        separated_pair(token, char('='), alt((map(token, str::to_string), quoted_string))),
    )(input)?;
    Ok((input, (name.to_ascii_lowercase(), value)))
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(is_token_char)(input)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    map(
        delimited(
            char('"'),
            many0(alt((preceded(char('\\'), anychar), none_of("\\\"")))),
            char('"'),
        ),
        |chars: Vec<char>| chars.into_iter().collect(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let media = parse_media_type("text/csv").unwrap();
        assert_eq!(media.essence(), "text/csv");
        assert!(media.params.is_empty());
    }

    #[test]
    fn test_parse_params() {
        let media = parse_media_type(r#"Text/CSV; charset=UTF-8 ; header="present""#).unwrap();
        assert_eq!(media.essence(), "text/csv");
        assert_eq!(media.param("charset"), Some("UTF-8"));
        assert_eq!(media.param("header"), Some("present"));
    }

    #[test]
    fn test_parse_quoted_escape() {
        let media = parse_media_type(r#"text/plain; note="a \"b\"""#).unwrap();
        assert_eq!(media.param("note"), Some(r#"a "b""#));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_media_type("text").is_err());
        assert!(parse_media_type("text/").is_err());
        assert!(parse_media_type("text/csv, application/json").is_err());
        assert!(parse_media_type("text/csv; charset").is_err());
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(negotiate_format(None), ResponseFormat::Json);
        assert_eq!(negotiate_format(Some("")), ResponseFormat::Json);
        assert_eq!(negotiate_format(Some("text/csv")), ResponseFormat::Csv);
        assert_eq!(
            negotiate_format(Some("text/csv; charset=utf-8")),
            ResponseFormat::Csv
        );
        assert_eq!(negotiate_format(Some("application/json")), ResponseFormat::Json);
        assert_eq!(negotiate_format(Some("*/*")), ResponseFormat::Json);
        assert_eq!(negotiate_format(Some("not a media type")), ResponseFormat::Json);
        assert_eq!(
            negotiate_format(Some("text/html,application/xhtml+xml")),
            ResponseFormat::Json
        );
    }
}
