//! Bracketed token scanning and classification

use crate::error::{BamError, Result};
use crate::models::ServiceState;

/// `IS` / `NOT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Is,
    Not,
}

impl Comparison {
    pub fn operator(self) -> &'static str {
        match self {
            Comparison::Is => "==",
            Comparison::Not => "!=",
        }
    }
}

/// `AND` / `OR` / `XOR`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

impl LogicalOp {
    pub fn operator(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Xor => "^",
        }
    }
}

/// A `{...}` token after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenClass {
    Status(ServiceState),
    Comparison(Comparison),
    Logical(LogicalOp),
    /// Anything else; only a valid resource if it parses as `host service`
    Resource(String),
}

/// Piece of a normalized expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Token(TokenClass),
}

/// `host service description` reference inside a token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub host_name: String,
    pub description: String,
}

impl ResourceRef {
    /// Split a resource token on its first space.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.split_once(' ') {
            Some((host, service)) if !host.is_empty() && !service.trim().is_empty() => Ok(Self {
                host_name: host.to_string(),
                description: service.trim().to_string(),
            }),
            _ => Err(BamError::InvalidExpression(format!(
                "Service not specified for {}",
                raw
            ))),
        }
    }

    /// Host part of a resource token, without requiring a service part
    pub fn host_of(raw: &str) -> &str {
        raw.trim().split(' ').next().unwrap_or("").trim()
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.host_name, self.description)
    }
}

/// Uppercase and fold every whitespace character (newlines included) to a space.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect::<String>()
        .to_uppercase()
}

/// Classify the content of one token. `raw` must already be normalized.
pub fn classify(raw: &str) -> TokenClass {
    let raw = raw.trim();
    match raw {
        "OK" => TokenClass::Status(ServiceState::Ok),
        "WARNING" => TokenClass::Status(ServiceState::Warning),
        "CRITICAL" => TokenClass::Status(ServiceState::Critical),
        "UNKNOWN" => TokenClass::Status(ServiceState::Unknown),
        "IS" => TokenClass::Comparison(Comparison::Is),
        "NOT" => TokenClass::Comparison(Comparison::Not),
        "AND" => TokenClass::Logical(LogicalOp::And),
        "OR" => TokenClass::Logical(LogicalOp::Or),
        "XOR" => TokenClass::Logical(LogicalOp::Xor),
        other => TokenClass::Resource(collapse_spaces(other)),
    }
}

fn collapse_spaces(raw: &str) -> String {
    raw.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a normalized expression into free text and classified tokens in one pass.
pub fn scan(normalized: &str) -> Result<Vec<Segment>> {
    if normalized.trim().is_empty() {
        return Err(BamError::InvalidExpression("Expecting expression".into()));
    }

    let mut segments = Vec::new();
    let mut rest = normalized;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            segments.push(Segment::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            BamError::InvalidExpression(format!("Unterminated token: {{{}", after))
        })?;
        let content = &after[..close];
        if content.trim().is_empty() {
            return Err(BamError::InvalidExpression("Empty token".into()));
        }
        segments.push(Segment::Token(classify(content)));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("OK"), TokenClass::Status(ServiceState::Ok));
        assert_eq!(classify(" UNKNOWN "), TokenClass::Status(ServiceState::Unknown));
        assert_eq!(classify("NOT"), TokenClass::Comparison(Comparison::Not));
        assert_eq!(classify("XOR"), TokenClass::Logical(LogicalOp::Xor));
        assert_eq!(
            classify("HOST  DISK  ROOT"),
            TokenClass::Resource("HOST DISK ROOT".into())
        );
    }

    #[test]
    fn test_scan_is_case_and_newline_tolerant() {
        let segments = scan(&normalize("({web http}\r\n{is} {ok})")).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("(".into()),
                Segment::Token(TokenClass::Resource("WEB HTTP".into())),
                Segment::Text(" ".into()),
                Segment::Token(TokenClass::Comparison(Comparison::Is)),
                Segment::Text(" ".into()),
                Segment::Token(TokenClass::Status(ServiceState::Ok)),
                Segment::Text(")".into()),
            ]
        );
    }

    #[test]
    fn test_scan_rejects_unterminated_and_empty() {
        assert!(matches!(
            scan("{A B} {IS"),
            Err(BamError::InvalidExpression(_))
        ));
        assert!(matches!(scan("{ }"), Err(BamError::InvalidExpression(_))));
        assert!(matches!(scan("   "), Err(BamError::InvalidExpression(_))));
    }

    #[test]
    fn test_resource_ref_parse() {
        let resource = ResourceRef::parse("DB-01 DISK /VAR").unwrap();
        assert_eq!(resource.host_name, "DB-01");
        assert_eq!(resource.description, "DISK /VAR");
        assert!(ResourceRef::parse("LONELY").is_err());
        assert_eq!(ResourceRef::host_of("LONELY"), "LONELY");
    }
}
