//! Declared PL/SQL types: `NUMBER(10,2)`, `VARCHAR2(30 BYTE)`,
//! `emp.sal%TYPE`, `pkg.t_rec%ROWTYPE`, `TIMESTAMP WITH TIME ZONE`.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{all_consuming, opt, recognize, value},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeAttribute {
    /// `%TYPE`
    Type,
    /// `%ROWTYPE`
    RowType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredType {
    /// Type name; may be qualified (`pkg.t_rec`) or multi-word
    /// (`TIMESTAMP WITH TIME ZONE`).
    pub name: String,
    /// Parenthesized precision / length arguments, trimmed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<TypeAttribute>,
}

impl DeclaredType {
    /// Parse a rendered type specification. `None` if it is not a type.
    pub fn parse(input: &str) -> Option<Self> {
        match all_consuming(declared_type)(input.trim()) {
            Ok((_, ty)) => Some(ty),
            Err(_) => None,
        }
    }

    /// Upper-cased name used as the mapping key.
    pub fn key(&self) -> String {
        self.name.to_ascii_uppercase()
    }

    /// `%TYPE` / `%ROWTYPE` anchored types are resolved by the database.
    pub fn is_anchored(&self) -> bool {
        self.attribute.is_some()
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.modifiers.is_empty() {
            write!(f, "({})", self.modifiers.join(", "))?;
        }
        match self.attribute {
            Some(TypeAttribute::Type) => write!(f, "%TYPE"),
            Some(TypeAttribute::RowType) => write!(f, "%ROWTYPE"),
            None => Ok(()),
        }
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(delimited(char('"'), take_while(|c| c != '"'), char('"'))),
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '$' | '#')),
        )),
    ))(input)
}

fn qualified_name(input: &str) -> IResult<&str, &str> {
    recognize(pair(identifier, many0(pair(char('.'), identifier))))(input)
}

fn modifiers(input: &str) -> IResult<&str, Vec<&str>> {
    delimited(
        pair(char('('), multispace0),
        separated_list1(
            tuple((multispace0, char(','), multispace0)),
            take_while1(|c| c != ',' && c != ')'),
        ),
        pair(multispace0, char(')')),
    )(input)
}

fn attribute(input: &str) -> IResult<&str, TypeAttribute> {
    preceded(
        pair(multispace0, char('%')),
        alt((
            value(TypeAttribute::RowType, tag_no_case("ROWTYPE")),
            value(TypeAttribute::Type, tag_no_case("TYPE")),
        )),
    )(input)
}

fn declared_type(input: &str) -> IResult<&str, DeclaredType> {
    let (input, head) = qualified_name(input)?;
    let (input, lead_words) = many0(preceded(multispace1, identifier))(input)?;
    let (input, mods) = opt(preceded(multispace0, modifiers))(input)?;
    let (input, tail_words) = many0(preceded(multispace1, identifier))(input)?;
    let (input, attribute) = opt(attribute)(input)?;
    let (input, _) = multispace0(input)?;

    let mut name = head.to_string();
    for word in lead_words.iter().chain(tail_words.iter()) {
        name.push(' ');
        name.push_str(word);
    }

    Ok((
        input,
        DeclaredType {
            name,
            modifiers: mods
                .unwrap_or_default()
                .into_iter()
                .map(|m| m.trim().to_string())
                .collect(),
            attribute,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_type() {
        let ty = DeclaredType::parse("NUMBER").unwrap();
        assert_eq!(ty.name, "NUMBER");
        assert!(ty.modifiers.is_empty());
        assert_eq!(ty.attribute, None);
    }

    #[test]
    fn test_precision() {
        let ty = DeclaredType::parse("NUMBER(10, 2)").unwrap();
        assert_eq!(ty.modifiers, vec!["10", "2"]);
        assert_eq!(ty.to_string(), "NUMBER(10, 2)");

        let ty = DeclaredType::parse("VARCHAR2(100 BYTE)").unwrap();
        assert_eq!(ty.modifiers, vec!["100 BYTE"]);
    }

    #[test]
    fn test_anchored_types() {
        let ty = DeclaredType::parse("emp.sal%TYPE").unwrap();
        assert_eq!(ty.name, "emp.sal");
        assert_eq!(ty.attribute, Some(TypeAttribute::Type));
        assert!(ty.is_anchored());

        let ty = DeclaredType::parse("hr.pkg.t_rec%ROWTYPE").unwrap();
        assert_eq!(ty.name, "hr.pkg.t_rec");
        assert_eq!(ty.attribute, Some(TypeAttribute::RowType));
    }

    #[test]
    fn test_multi_word_types() {
        let ty = DeclaredType::parse("TIMESTAMP(6) WITH TIME ZONE").unwrap();
        assert_eq!(ty.name, "TIMESTAMP WITH TIME ZONE");
        assert_eq!(ty.modifiers, vec!["6"]);
        assert_eq!(ty.key(), "TIMESTAMP WITH TIME ZONE");

        let ty = DeclaredType::parse("DOUBLE PRECISION").unwrap();
        assert_eq!(ty.name, "DOUBLE PRECISION");
    }

    #[test]
    fn test_rejects_expressions() {
        assert!(DeclaredType::parse("a + b").is_none());
        assert!(DeclaredType::parse("NVL(a, 0)").is_some()); // syntactically a type
        assert!(DeclaredType::parse("").is_none());
        assert!(DeclaredType::parse("'text'").is_none());
    }
}
