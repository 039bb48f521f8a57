//! Recursive-descent parser for Indri prefix queries.
//!
//! ```text
//! Query := Term | "#" OpName ["/" N] "(" Arg+ ")"
//! Arg   := [Weight] (Term | Query)
//! Term  := token ["." field]
//! ```

use tracing::{debug, warn};

use super::tokenizer::{
    matching_paren, operator_head, split_field, split_trailing_number, term_token,
    unbalanced_at, weight,
};
use crate::analysis::Analyzer;
use crate::query::ast::{Clause, OperatorKind, QueryNode, QueryTree, Requirement, Term};
use crate::query::{QueryError, Result};

/// Field used by terms written without `.field`.
pub const DEFAULT_FIELD: &str = "text";

/// Parses query strings into [`QueryTree`]s, analyzing term tokens on the way.
#[derive(Debug, Clone)]
pub struct IndriParser<'a> {
    analyzer: &'a Analyzer,
    default_field: String,
}

impl<'a> IndriParser<'a> {
    pub fn new(analyzer: &'a Analyzer) -> Self {
        Self {
            analyzer,
            default_field: DEFAULT_FIELD.to_string(),
        }
    }

    pub fn with_default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = field.into().to_lowercase();
        self
    }

    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    pub fn parse(&self, query: &str) -> Result<QueryTree> {
        let normalized = normalize(query);
        let trimmed = normalized.trim();
        if trimmed.is_empty() {
            return Err(QueryError::parse("empty query", query));
        }
        if let Some(offset) = unbalanced_at(trimmed) {
            return Err(QueryError::parse(
                "unbalanced parentheses",
                &trimmed[offset..],
            ));
        }

        let root = if is_single_operator(trimmed) {
            self.parse_operator(trimmed)?
        } else {
            // bare argument lists are an implicit #and
            QueryNode::operator(
                OperatorKind::And,
                self.parse_arguments(OperatorKind::And, trimmed)?,
            )
        };

        debug!(query = %query, tree = %root, "parsed query");
        Ok(QueryTree::new(root))
    }

    /// Parse `#op(...)`. The input spans exactly one operator.
    fn parse_operator(&self, input: &str) -> Result<QueryNode> {
        let (rest, head) = operator_head(input)
            .map_err(|_| QueryError::parse("malformed operator", input))?;
        let kind = resolve_operator(head.name, head.distance, input)?;
        // rest ends with the operator's own closing paren
        let arguments = rest.strip_suffix(')').unwrap_or(rest);
        let clauses = self.parse_arguments(kind, arguments)?;
        Ok(QueryNode::operator(kind, clauses))
    }

    fn parse_arguments(&self, kind: OperatorKind, input: &str) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        let mut arguments = 0usize;
        let mut rest = input.trim_start();

        while !rest.is_empty() {
            let weight = if kind.takes_weights() {
                let (remaining, weight) = weight(rest)
                    .map_err(|_| QueryError::parse(format!("#{} argument needs a weight", kind), rest))?;
                if !weight.is_finite() {
                    return Err(QueryError::parse("weight must be finite", rest));
                }
                if weight < 0.0 {
                    return Err(QueryError::parse("weight must not be negative", rest));
                }
                rest = remaining.trim_start();
                if rest.is_empty() {
                    return Err(QueryError::parse("weight without an argument", input));
                }
                weight
            } else {
                1.0
            };

            let requirement = if arguments == 0 {
                kind.first_requirement()
            } else {
                Requirement::Should
            };

            if rest.starts_with('#') {
                let open = rest
                    .find('(')
                    .ok_or_else(|| QueryError::parse("operator without arguments", rest))?;
                let close = matching_paren(rest, open)
                    .ok_or_else(|| QueryError::parse("unbalanced parentheses", rest))?;
                let node = self.parse_operator(&rest[..=close])?;
                clauses.push(
                    Clause::new(node)
                        .weighted(weight)
                        .with_requirement(requirement),
                );
                rest = rest[close + 1..].trim_start();
            } else {
                let (remaining, token) = term_token(rest)
                    .map_err(|_| QueryError::parse("expected a term", rest))?;
                for term in self.analyze_token(token) {
                    clauses.push(
                        Clause::new(QueryNode::Term(term))
                            .weighted(weight)
                            .with_requirement(requirement),
                    );
                }
                rest = remaining.trim_start();
            }
            arguments += 1;
        }

        check_arity(kind, arguments, input)?;
        Ok(clauses)
    }

    /// Analyze one token into zero or more leaves of the same field.
    fn analyze_token(&self, token: &str) -> Vec<Term> {
        let (text, field) = split_field(token);
        let field = match field {
            Some(field) => field.to_lowercase(),
            None => self.default_field.clone(),
        };
        self.analyzer
            .terms(text)
            .into_iter()
            .map(|text| Term::new(field.clone(), text))
            .collect()
    }
}

fn normalize(query: &str) -> String {
    query
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .map(|c| if c == ':' { '.' } else { c })
        .collect()
}

fn is_single_operator(input: &str) -> bool {
    if !input.starts_with('#') {
        return false;
    }
    match input.find('(') {
        Some(open) => matching_paren(input, open) == Some(input.len() - 1),
        None => false,
    }
}

fn resolve_operator(name: &str, suffix: Option<u32>, fragment: &str) -> Result<OperatorKind> {
    let lower = name.to_ascii_lowercase();
    let (prefix, digits) = split_trailing_number(&lower);
    let distance = suffix.or(digits);

    let require_distance = |operator: &str| {
        distance.ok_or_else(|| {
            QueryError::parse(format!("#{} needs a /distance suffix", operator), fragment)
        })
    };

    let kind = match prefix {
        "" => OperatorKind::Near(require_distance("N")?),
        "od" | "near" => OperatorKind::Near(require_distance(prefix)?),
        "uw" | "window" => OperatorKind::Window(require_distance(prefix)?),
        _ if digits.is_some() || suffix.is_some() => {
            return Err(QueryError::parse(
                format!("#{} does not take a distance", prefix),
                fragment,
            ))
        }
        "and" | "combine" => OperatorKind::And,
        "or" => OperatorKind::Or,
        "wsum" => OperatorKind::WSum,
        "wand" | "weight" => OperatorKind::WAnd,
        "max" => OperatorKind::Max,
        "not" => OperatorKind::Not,
        "band" => OperatorKind::Band,
        "syn" => OperatorKind::Synonym,
        "scoreif" => OperatorKind::ScoreIf,
        "scoreifnot" => OperatorKind::ScoreIfNot,
        unknown => {
            warn!(operator = %unknown, "unknown query operator, evaluating as #and");
            OperatorKind::And
        }
    };
    Ok(kind)
}

fn check_arity(kind: OperatorKind, arguments: usize, fragment: &str) -> Result<()> {
    match kind {
        OperatorKind::Not if arguments > 1 => Err(QueryError::parse(
            "#not takes a single argument",
            fragment,
        )),
        OperatorKind::ScoreIf | OperatorKind::ScoreIfNot if arguments < 2 => {
            Err(QueryError::parse(
                format!("#{} needs a condition and a scored query", kind),
                fragment,
            ))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalyzerConfig;

    fn parse(query: &str) -> Result<QueryTree> {
        let analyzer = Analyzer::plain();
        IndriParser::new(&analyzer).parse(query)
    }

    fn leaf(clause: &Clause) -> &Term {
        match &clause.node {
            QueryNode::Term(term) => term,
            other => panic!("Expected Term, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_and() {
        let tree = parse("#and(a b)").unwrap();
        match tree.root() {
            QueryNode::Operator { kind, clauses } => {
                assert_eq!(*kind, OperatorKind::And);
                assert_eq!(clauses.len(), 2);
                for (clause, text) in clauses.iter().zip(["a", "b"]) {
                    assert_eq!(leaf(clause), &Term::new("text", text));
                    assert_eq!(clause.weight, 1.0);
                    assert_eq!(clause.requirement, Requirement::Should);
                }
            }
            _ => panic!("Expected operator"),
        }
    }

    #[test]
    fn test_parse_operator_names() {
        let cases = [
            ("#combine(a)", OperatorKind::And),
            ("#or(a)", OperatorKind::Or),
            ("#wsum(1 a)", OperatorKind::WSum),
            ("#wand(1 a)", OperatorKind::WAnd),
            ("#weight(1 a)", OperatorKind::WAnd),
            ("#max(a)", OperatorKind::Max),
            ("#not(a)", OperatorKind::Not),
            ("#band(a b)", OperatorKind::Band),
            ("#syn(a b)", OperatorKind::Synonym),
            ("#3(a b)", OperatorKind::Near(3)),
            ("#od4(a b)", OperatorKind::Near(4)),
            ("#near/2(a b)", OperatorKind::Near(2)),
            ("#uw8(a b)", OperatorKind::Window(8)),
            ("#uw/5(a b)", OperatorKind::Window(5)),
            ("#window/6(a b)", OperatorKind::Window(6)),
            ("#AND(a)", OperatorKind::And),
        ];
        for (query, expected) in cases {
            assert_eq!(
                parse(query).unwrap().root().kind(),
                Some(expected),
                "query {}",
                query
            );
        }
    }

    #[test]
    fn test_parse_weights() {
        let tree = parse("#wsum(2.0 cat 1.0 dog)").unwrap();
        let clauses = tree.root().clauses();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].weight, 2.0);
        assert_eq!(leaf(&clauses[0]).text, "cat");
        assert_eq!(clauses[1].weight, 1.0);
        assert_eq!(leaf(&clauses[1]).text, "dog");
    }

    #[test]
    fn test_missing_weight_is_error() {
        match parse("#wsum(2.0 cat dog)") {
            Err(QueryError::Parse { fragment, .. }) => assert_eq!(fragment, "dog"),
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(parse("#wand(cat)").is_err());
        assert!(parse("#wsum(2.0)").is_err());
    }

    #[test]
    fn test_negative_weight_is_error() {
        match parse("#wand(2 a -1 b)") {
            Err(QueryError::Parse { message, fragment }) => {
                assert!(message.contains("negative"));
                assert_eq!(fragment, "-1 b");
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(parse("#wsum(1 a -0.5 #or(b c))").is_err());
        assert!(parse("#wsum(0 a 1 b)").is_ok());
    }

    #[test]
    fn test_missing_distance_is_error() {
        for query in ["#near(a b)", "#uw(a b)", "#window(a b)", "#od(a b)"] {
            assert!(
                matches!(parse(query), Err(QueryError::Parse { .. })),
                "query {}",
                query
            );
        }
        assert!(parse("#and/3(a b)").is_err());
    }

    #[test]
    fn test_unbalanced_parentheses() {
        match parse("#and(a #or(b c)") {
            Err(QueryError::Parse { message, fragment }) => {
                assert!(message.contains("unbalanced"));
                assert_eq!(fragment, "(a #or(b c)");
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(parse("#and(a b))").is_err());
    }

    #[test]
    fn test_empty_query() {
        assert!(matches!(parse("   "), Err(QueryError::Parse { .. })));
    }

    #[test]
    fn test_nested_operators() {
        let tree = parse("#or(#near/1(white house) #syn(car automobile))").unwrap();
        let clauses = tree.root().clauses();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].node.kind(), Some(OperatorKind::Near(1)));
        assert_eq!(clauses[1].node.kind(), Some(OperatorKind::Synonym));
        assert_eq!(clauses[1].node.clauses().len(), 2);
    }

    #[test]
    fn test_field_qualified_terms() {
        let tree = parse("#and(Cat.TITLE dog:body fish)").unwrap();
        let terms = tree.terms();
        assert_eq!(terms[0], &Term::new("title", "cat"));
        assert_eq!(terms[1], &Term::new("body", "dog"));
        assert_eq!(terms[2], &Term::new("text", "fish"));
    }

    #[test]
    fn test_default_field_override() {
        let analyzer = Analyzer::plain();
        let tree = IndriParser::new(&analyzer)
            .with_default_field("Body")
            .parse("cat")
            .unwrap();
        assert_eq!(tree.terms()[0], &Term::new("body", "cat"));
    }

    #[test]
    fn test_implicit_and() {
        let tree = parse("cat #syn(dog hound)").unwrap();
        assert_eq!(tree.root().kind(), Some(OperatorKind::And));
        assert_eq!(tree.root().clauses().len(), 2);
    }

    #[test]
    fn test_multi_token_expansion() {
        let tree = parse("#wsum(2.0 white-house 1.0 x)").unwrap();
        let clauses = tree.root().clauses();
        assert_eq!(clauses.len(), 3);
        assert_eq!(leaf(&clauses[0]).text, "white");
        assert_eq!(leaf(&clauses[1]).text, "house");
        assert_eq!(clauses[1].weight, 2.0);
    }

    #[test]
    fn test_stopwords_expand_to_nothing() {
        let analyzer = Analyzer::new(AnalyzerConfig::default()).unwrap();
        let tree = IndriParser::new(&analyzer)
            .parse("#and(the running dogs)")
            .unwrap();
        let texts: Vec<&str> = tree.terms().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["run", "dog"]);
    }

    #[test]
    fn test_scoreif_requirements() {
        let tree = parse("#scoreif(#and(required) #term(optional))").unwrap();
        let clauses = tree.root().clauses();
        assert_eq!(tree.root().kind(), Some(OperatorKind::ScoreIf));
        assert_eq!(clauses[0].requirement, Requirement::Must);
        assert_eq!(clauses[1].requirement, Requirement::Should);
        // unknown operator names evaluate as #and
        assert_eq!(clauses[1].node.kind(), Some(OperatorKind::And));

        let tree = parse("#scoreifnot(spam ham)").unwrap();
        let clauses = tree.root().clauses();
        assert_eq!(clauses[0].requirement, Requirement::MustNot);
        assert_eq!(clauses[1].requirement, Requirement::Should);
    }

    #[test]
    fn test_arity_errors() {
        assert!(parse("#not(a b)").is_err());
        assert!(parse("#scoreif(a)").is_err());
        assert!(parse("#scoreifnot(#and(a b))").is_err());
    }

    #[test]
    fn test_quotes_are_stripped() {
        let tree = parse("#and(\"cat\" 'dog')").unwrap();
        let texts: Vec<&str> = tree.terms().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["cat", "dog"]);
    }

    #[test]
    fn test_display_reparses_to_same_tree() {
        let query = "#wsum(2 #near/3(quick.title brown.title) 0.5 #uw8(pay attention) 1 #not(#max(a b)))";
        let tree = parse(query).unwrap();
        let reparsed = parse(&tree.to_string()).unwrap();
        assert_eq!(reparsed, tree);
    }
}
