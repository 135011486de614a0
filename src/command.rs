//! Runtime command parsing.
//!
//! The partitioner accepts a small string protocol at runtime; the only
//! command today is `mu = <float>`, which tunes the corner displacement
//! step size. The float literal must carry a decimal point (`1.`, `.5`,
//! `1.5`); anything else is not a command and is ignored.

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit0, digit1, space0};
use nom::combinator::recognize;
use nom::sequence::{pair, tuple};
use nom::IResult;

/// Parse a `mu = <float>` command, returning the new step size.
pub fn parse_mu(input: &str) -> Option<f64> {
    match mu_command(input) {
        Ok((rest, value)) if rest.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn float_literal(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(tuple((digit1, char('.'), digit0))),
        recognize(pair(char('.'), digit1)),
    ))(input)
}

fn mu_command(input: &str) -> IResult<&str, f64> {
    let (rest, _) = space0(input)?;
    let (rest, _) = tag("mu")(rest)?;
    let (rest, _) = space0(rest)?;
    let (rest, _) = char('=')(rest)?;
    let (rest, _) = space0(rest)?;
    let (rest, lit) = float_literal(rest)?;
    let value = lit.parse().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
    })?;
    Ok((rest, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_three_float_forms() {
        assert_eq!(parse_mu("mu = 0.5"), Some(0.5));
        assert_eq!(parse_mu("mu = 1."), Some(1.0));
        assert_eq!(parse_mu("mu = .25"), Some(0.25));
    }

    #[test]
    fn whitespace_is_flexible() {
        assert_eq!(parse_mu("  mu=0.5"), Some(0.5));
        assert_eq!(parse_mu("mu   =   2.0"), Some(2.0));
    }

    #[test]
    fn rejects_integer_literals() {
        assert_eq!(parse_mu("mu = 1"), None);
    }

    #[test]
    fn rejects_unknown_commands_and_garbage() {
        assert_eq!(parse_mu("nu = 1.0"), None);
        assert_eq!(parse_mu("mu 0.5"), None);
        assert_eq!(parse_mu("mu = 0.5 and more"), None);
        assert_eq!(parse_mu(""), None);
    }

    #[test]
    fn rejects_exponent_notation() {
        assert_eq!(parse_mu("mu = 1.5e3"), None);
    }
}
