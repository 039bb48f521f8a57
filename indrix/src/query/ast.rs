use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A field-qualified index term, already analyzed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.text, self.field)
    }
}

/// Boolean occurrence of a clause. Only SCOREIF and SCOREIFNOT give it meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    #[default]
    Should,
    Must,
    MustNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    And,
    Or,
    WSum,
    WAnd,
    Max,
    Not,
    /// Ordered window: each term follows the previous within the distance.
    Near(u32),
    /// Unordered window: all terms inside a span of at most the distance.
    Window(u32),
    Band,
    Synonym,
    ScoreIf,
    ScoreIfNot,
}

impl OperatorKind {
    /// Arguments are preceded by a weight.
    pub fn takes_weights(&self) -> bool {
        matches!(self, OperatorKind::WSum | OperatorKind::WAnd)
    }

    /// Evaluated over a synthesized positional posting list.
    pub fn is_proximity(&self) -> bool {
        matches!(
            self,
            OperatorKind::Near(_)
                | OperatorKind::Window(_)
                | OperatorKind::Band
                | OperatorKind::Synonym
        )
    }

    /// Requirement of the first argument; later arguments are SHOULD.
    pub fn first_requirement(&self) -> Requirement {
        match self {
            OperatorKind::ScoreIf => Requirement::Must,
            OperatorKind::ScoreIfNot => Requirement::MustNot,
            _ => Requirement::Should,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::And => write!(f, "and"),
            OperatorKind::Or => write!(f, "or"),
            OperatorKind::WSum => write!(f, "wsum"),
            OperatorKind::WAnd => write!(f, "wand"),
            OperatorKind::Max => write!(f, "max"),
            OperatorKind::Not => write!(f, "not"),
            OperatorKind::Near(distance) => write!(f, "near/{}", distance),
            OperatorKind::Window(distance) => write!(f, "uw{}", distance),
            OperatorKind::Band => write!(f, "band"),
            OperatorKind::Synonym => write!(f, "syn"),
            OperatorKind::ScoreIf => write!(f, "scoreif"),
            OperatorKind::ScoreIfNot => write!(f, "scoreifnot"),
        }
    }
}

/// An operator argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub node: QueryNode,
    pub weight: f64,
    pub requirement: Requirement,
}

impl Clause {
    pub fn new(node: QueryNode) -> Self {
        Self {
            node,
            weight: 1.0,
            requirement: Requirement::Should,
        }
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }
}

impl From<QueryNode> for Clause {
    fn from(node: QueryNode) -> Self {
        Clause::new(node)
    }
}

/// Query tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryNode {
    Term(Term),
    Operator {
        kind: OperatorKind,
        clauses: Vec<Clause>,
    },
}

impl QueryNode {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        QueryNode::Term(Term::new(field, text))
    }

    pub fn operator(kind: OperatorKind, clauses: Vec<Clause>) -> Self {
        QueryNode::Operator { kind, clauses }
    }

    /// Operator over unweighted SHOULD arguments
    pub fn combine(kind: OperatorKind, nodes: impl IntoIterator<Item = QueryNode>) -> Self {
        QueryNode::Operator {
            kind,
            clauses: nodes.into_iter().map(Clause::new).collect(),
        }
    }

    pub fn kind(&self) -> Option<OperatorKind> {
        match self {
            QueryNode::Term(_) => None,
            QueryNode::Operator { kind, .. } => Some(*kind),
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        match self {
            QueryNode::Term(_) => &[],
            QueryNode::Operator { clauses, .. } => clauses,
        }
    }

    /// Term leaves in left-to-right order
    pub fn terms(&self) -> Vec<&Term> {
        let mut terms = Vec::new();
        self.collect_terms(&mut terms);
        terms
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a Term>) {
        match self {
            QueryNode::Term(term) => out.push(term),
            QueryNode::Operator { clauses, .. } => {
                for clause in clauses {
                    clause.node.collect_terms(out);
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            QueryNode::Term(_) => 1,
            QueryNode::Operator { clauses, .. } => {
                1 + clauses.iter().map(|c| c.node.depth()).max().unwrap_or(0)
            }
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term(term) => write!(f, "{}", term),
            QueryNode::Operator { kind, clauses } => {
                write!(f, "#{}(", kind)?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    if kind.takes_weights() {
                        write!(f, "{} ", clause.weight)?;
                    }
                    write!(f, "{}", clause.node)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A parsed query. Segment independent and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTree {
    pub root: QueryNode,
}

impl QueryTree {
    pub fn new(root: QueryNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &QueryNode {
        &self.root
    }

    pub fn terms(&self) -> Vec<&Term> {
        self.root.terms()
    }

    /// Distinct fields referenced by the leaves
    pub fn fields(&self) -> BTreeSet<&str> {
        self.terms().into_iter().map(|t| t.field.as_str()).collect()
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
