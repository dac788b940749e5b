// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! Recursive-descent / precedence-climbing parser (§4.2).
//!
//! Precedence, low to high: `OR` (`|`) < implicit AND (juxtaposition) <
//! unary `NOT` (`!`) < atomic. Parentheses group at the `OR` level. This
//! ordering is locked in here (per §9's open question on NOT-vs-AND
//! precedence) and exercised by the grammar scenario tests.
//!

use crate::ast::{
    Agg, AggSource, Assignment, CompareOp, ElementPredicate, HierarchyDir, Kind, NavFn, NavTarget,
    Pipeline, PipelineStage, Predicate, Query, Quantifier, Rhs, SortDir, StringFn,
};
use crate::error::{Position, QueryError};
use crate::lexer::lex;
use crate::token::{OpToken, Token, TokenKind};
use crate::value::Value;

/// Parse a full query string into a [`Query`].
pub fn parse(src: &str) -> Result<Query, QueryError> {
    let tokens = lex(src)?;
    let mut parser = Parser::new(tokens);
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn literal_from_ident(s: &str) -> Value {
    if s == "true" {
        Value::Bool(true)
    } else if s == "false" {
        Value::Bool(false)
    } else if let Ok(n) = s.parse::<f64>() {
        Value::Num(n)
    } else {
        Value::Str(s.to_string())
    }
}

fn starts_atom(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Dot | TokenKind::Ident(_) | TokenKind::LParen | TokenKind::Bang
    )
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_pos(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err_expected(&self, expected: &str) -> QueryError {
        QueryError::Parse {
            pos: Position(self.peek_pos()),
            expected: expected.to_string(),
            found: self.peek().to_string(),
        }
    }

    fn expect_eof(&mut self) -> Result<(), QueryError> {
        if matches!(self.peek(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.err_expected("end of input"))
        }
    }

    fn expect_ident(&mut self) -> Result<String, QueryError> {
        match self.peek().clone() {
            TokenKind::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err_expected("identifier")),
        }
    }

    fn expect_punct(&mut self, kind: TokenKind, name: &str) -> Result<(), QueryError> {
        if *self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.err_expected(name))
        }
    }

    fn expect_dot(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::Dot, "'.'")
    }

    fn expect_lparen(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::LParen, "'('")
    }

    fn expect_rparen(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::RParen, "')'")
    }

    fn expect_comma(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::Comma, "','")
    }

    fn expect_colon(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::Colon, "':'")
    }

    fn expect_lbracket(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::LBracket, "'['")
    }

    fn expect_rbracket(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::RBracket, "']'")
    }

    fn expect_lbrace(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::LBrace, "'{'")
    }

    fn expect_rbrace(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::RBrace, "'}'")
    }

    fn expect_assign(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::Assign, "'='")
    }

    fn expect_underscore(&mut self) -> Result<(), QueryError> {
        self.expect_punct(TokenKind::Underscore, "'_'")
    }

    fn expect_field_name(&mut self) -> Result<String, QueryError> {
        self.expect_dot()?;
        self.expect_ident()
    }

    fn expect_string(&mut self) -> Result<String, QueryError> {
        match self.peek().clone() {
            TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err_expected("string literal")),
        }
    }

    fn expect_pattern(&mut self) -> Result<String, QueryError> {
        match self.peek().clone() {
            TokenKind::Str(s) | TokenKind::Regex(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err_expected("string or regex literal")),
        }
    }

    fn expect_number(&mut self) -> Result<f64, QueryError> {
        match self.peek().clone() {
            TokenKind::Ident(s) => {
                let n = s.parse::<f64>().map_err(|_| self.err_expected("number"))?;
                self.advance();
                Ok(n)
            }
            _ => Err(self.err_expected("number")),
        }
    }

    fn expect_bool(&mut self) -> Result<bool, QueryError> {
        match self.peek().clone() {
            TokenKind::Ident(s) if s == "true" => {
                self.advance();
                Ok(true)
            }
            TokenKind::Ident(s) if s == "false" => {
                self.advance();
                Ok(false)
            }
            _ => Err(self.err_expected("'true' or 'false'")),
        }
    }

    // ===== top-level query ==============================================

    fn parse_query(&mut self) -> Result<Query, QueryError> {
        let (kind, type_name) = self.parse_kind_and_type()?;
        let predicate = if starts_atom(self.peek()) {
            Some(self.parse_or()?)
        } else {
            None
        };
        let pipeline = if matches!(self.peek(), TokenKind::PipeArrow) {
            Some(self.parse_pipeline()?)
        } else {
            None
        };
        Ok(Query {
            kind,
            type_name,
            predicate,
            pipeline,
        })
    }

    /// A nested sub-query: `kind ":" ident pred?`, no pipeline.
    fn parse_subquery(&mut self) -> Result<Query, QueryError> {
        let (kind, type_name) = self.parse_kind_and_type()?;
        let predicate = if starts_atom(self.peek()) {
            Some(self.parse_or()?)
        } else {
            None
        };
        Ok(Query {
            kind,
            type_name,
            predicate,
            pipeline: None,
        })
    }

    fn parse_kind_and_type(&mut self) -> Result<(Kind, String), QueryError> {
        let kind_name = self.expect_ident()?;
        let kind = match kind_name.as_str() {
            "object" => Kind::Object,
            "trait" => Kind::Trait,
            _ => {
                return Err(QueryError::Parse {
                    pos: Position(self.peek_pos()),
                    expected: "'object' or 'trait'".to_string(),
                    found: kind_name,
                });
            }
        };
        self.expect_colon()?;
        let type_name = self.expect_ident()?;
        Ok((kind, type_name))
    }

    // ===== predicate precedence chain ===================================

    fn parse_or(&mut self) -> Result<Predicate, QueryError> {
        let first = self.parse_and()?;
        let mut items = vec![first];
        while matches!(self.peek(), TokenKind::Pipe) {
            self.advance();
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 {
            items.pop().unwrap()
        } else {
            Predicate::Or(items)
        })
    }

    fn parse_and(&mut self) -> Result<Predicate, QueryError> {
        let first = self.parse_not()?;
        let mut items = vec![first];
        while starts_atom(self.peek()) {
            items.push(self.parse_not()?);
        }
        Ok(if items.len() == 1 {
            items.pop().unwrap()
        } else {
            Predicate::And(items)
        })
    }

    fn parse_not(&mut self) -> Result<Predicate, QueryError> {
        if matches!(self.peek(), TokenKind::Bang) {
            self.advance();
            let inner = self.parse_not()?;
            Ok(Predicate::Not(Box::new(inner)))
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Result<Predicate, QueryError> {
        match self.peek().clone() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            TokenKind::Dot => self.parse_field_predicate(),
            TokenKind::Ident(name) => {
                self.advance();
                self.parse_func_predicate(&name)
            }
            _ => Err(self.err_expected("predicate")),
        }
    }

    // ===== field predicates, including operator-form string functions ===

    fn parse_field_predicate(&mut self) -> Result<Predicate, QueryError> {
        let field = self.expect_field_name()?;
        let op_tok = match self.peek().clone() {
            TokenKind::Op(op) => {
                self.advance();
                op
            }
            _ => return Err(self.err_expected("comparison operator")),
        };
        match op_tok {
            OpToken::Eq | OpToken::Neq | OpToken::Lt | OpToken::Lte | OpToken::Gt | OpToken::Gte => {
                let op = compare_op_of(op_tok);
                let rhs = self.parse_rhs()?;
                Ok(field_or_value_predicate(field, op, rhs))
            }
            OpToken::TildeEq | OpToken::EqTilde => {
                let pattern = self.expect_pattern()?;
                Ok(Predicate::StringFn {
                    func: StringFn::Matches,
                    field,
                    arg: pattern,
                    case_sensitive: false,
                })
            }
            OpToken::CaretEq => {
                let arg = self.expect_string()?;
                Ok(Predicate::StringFn {
                    func: StringFn::StartsWith,
                    field,
                    arg,
                    case_sensitive: false,
                })
            }
            OpToken::DollarEq => {
                let arg = self.expect_string()?;
                Ok(Predicate::StringFn {
                    func: StringFn::EndsWith,
                    field,
                    arg,
                    case_sensitive: false,
                })
            }
        }
    }

    fn parse_rhs(&mut self) -> Result<Rhs, QueryError> {
        match self.peek().clone() {
            TokenKind::Ref { target, .. } => {
                self.advance();
                Ok(Rhs::Ref(target))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Rhs::Literal(Value::Str(s)))
            }
            TokenKind::Ident(s) => {
                self.advance();
                Ok(Rhs::Literal(literal_from_ident(&s)))
            }
            TokenKind::Star => {
                self.advance();
                Ok(Rhs::Literal(Value::Str("*".to_string())))
            }
            _ => Err(self.err_expected("value")),
        }
    }

    fn parse_literal(&mut self) -> Result<Value, QueryError> {
        match self.parse_rhs()? {
            Rhs::Literal(v) => Ok(v),
            Rhs::Ref(r) => Ok(Value::Str(r)),
        }
    }

    // ===== function-call predicates ======================================

    fn parse_func_predicate(&mut self, name: &str) -> Result<Predicate, QueryError> {
        self.expect_lparen()?;
        let pred = match name {
            "exists" => {
                let field = self.expect_field_name()?;
                Predicate::Exists { field }
            }
            "contains" | "startswith" | "endswith" | "matches" => {
                let func = string_fn_of(name);
                let field = self.expect_field_name()?;
                self.expect_comma()?;
                let arg = if func == StringFn::Matches {
                    self.expect_pattern()?
                } else {
                    self.expect_string()?
                };
                let case_sensitive = if matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    self.expect_bool()?
                } else {
                    false
                };
                Predicate::StringFn {
                    func,
                    field,
                    arg,
                    case_sensitive,
                }
            }
            "in" => {
                let field = self.expect_field_name()?;
                self.expect_comma()?;
                self.expect_lbracket()?;
                let mut values = vec![self.parse_rhs()?];
                while matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    values.push(self.parse_rhs()?);
                }
                self.expect_rbracket()?;
                if values.is_empty() {
                    return Err(QueryError::Parse {
                        pos: Position(self.peek_pos()),
                        expected: "at least one value in in(...)".to_string(),
                        found: "empty list".to_string(),
                    });
                }
                let alts: Vec<Predicate> = values
                    .into_iter()
                    .map(|rhs| field_or_value_predicate(field.clone(), CompareOp::Eq, rhs))
                    .collect();
                if alts.len() == 1 {
                    alts.into_iter().next().unwrap()
                } else {
                    Predicate::Or(alts)
                }
            }
            "any" | "all" | "none" => {
                let kind = match name {
                    "any" => Quantifier::Any,
                    "all" => Quantifier::All,
                    _ => Quantifier::None,
                };
                let field = self.expect_field_name()?;
                self.expect_comma()?;
                let elt = self.parse_element_predicate()?;
                Predicate::Quantifier { kind, field, elt }
            }
            "content" => {
                let terms = self.expect_string()?;
                Predicate::Content { terms }
            }
            "has" => Predicate::Has {
                sub_query: Box::new(self.parse_subquery()?),
            },
            "encloses" => Predicate::Encloses {
                sub_query: Box::new(self.parse_subquery()?),
            },
            "parent" | "ancestor" | "child" | "descendant" => {
                let dir = match name {
                    "parent" => HierarchyDir::Parent,
                    "ancestor" => HierarchyDir::Ancestor,
                    "child" => HierarchyDir::Child,
                    _ => HierarchyDir::Descendant,
                };
                let target = self.parse_nav_target()?;
                Predicate::Hierarchy { dir, target }
            }
            "refs" => Predicate::Refs {
                target: self.parse_nav_target()?,
            },
            "refd" => Predicate::Refd {
                target: self.parse_nav_target()?,
            },
            "on" => Predicate::On {
                target: self.parse_nav_target()?,
            },
            "within" => Predicate::Within {
                target: self.parse_nav_target()?,
            },
            "at" => Predicate::At {
                target: self.parse_nav_target()?,
            },
            other => {
                return Err(QueryError::Parse {
                    pos: Position(self.peek_pos()),
                    expected: "a known predicate function".to_string(),
                    found: other.to_string(),
                });
            }
        };
        self.expect_rparen()?;
        Ok(pred)
    }

    fn parse_nav_target(&mut self) -> Result<NavTarget, QueryError> {
        match self.peek().clone() {
            TokenKind::Ref { target, .. } => {
                self.advance();
                Ok(NavTarget::Ref(target))
            }
            TokenKind::Underscore => {
                self.advance();
                Ok(NavTarget::SelfBinding)
            }
            TokenKind::Ident(s) if s == "object" || s == "trait" => {
                Ok(NavTarget::SubQuery(Box::new(self.parse_subquery()?)))
            }
            _ => Err(self.err_expected("'[[target]]', '_', or a sub-query")),
        }
    }

    fn parse_element_predicate(&mut self) -> Result<ElementPredicate, QueryError> {
        match self.peek().clone() {
            TokenKind::Underscore => {
                self.advance();
                let op = match self.peek().clone() {
                    TokenKind::Op(op @ (OpToken::Eq | OpToken::Neq | OpToken::Lt | OpToken::Lte | OpToken::Gt | OpToken::Gte)) => {
                        self.advance();
                        compare_op_of(op)
                    }
                    _ => return Err(self.err_expected("comparison operator")),
                };
                let value = self.parse_literal()?;
                Ok(ElementPredicate::Compare(op, value))
            }
            TokenKind::Ident(name) if matches!(name.as_str(), "contains" | "startswith" | "endswith" | "matches") => {
                self.advance();
                self.expect_lparen()?;
                self.expect_underscore()?;
                self.expect_comma()?;
                let func = string_fn_of(&name);
                let arg = if func == StringFn::Matches {
                    self.expect_pattern()?
                } else {
                    self.expect_string()?
                };
                let case_sensitive = if matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    self.expect_bool()?
                } else {
                    false
                };
                self.expect_rparen()?;
                Ok(ElementPredicate::StringFn {
                    func,
                    arg,
                    case_sensitive,
                })
            }
            _ => Err(self.err_expected("element predicate")),
        }
    }

    // ===== pipeline =======================================================

    fn parse_pipeline(&mut self) -> Result<Pipeline, QueryError> {
        self.expect_punct(TokenKind::PipeArrow, "'|>'")?;
        let mut stages = Vec::new();
        while !matches!(self.peek(), TokenKind::Eof) {
            stages.push(self.parse_stage()?);
        }
        if stages.is_empty() {
            return Err(self.err_expected("at least one pipeline stage"));
        }
        Ok(Pipeline { stages })
    }

    fn parse_left_name(&mut self) -> Result<String, QueryError> {
        if matches!(self.peek(), TokenKind::Dot) {
            self.advance();
        }
        self.expect_ident()
    }

    fn parse_stage(&mut self) -> Result<PipelineStage, QueryError> {
        let name = self.expect_ident()?;
        match name.as_str() {
            "filter" => {
                self.expect_lparen()?;
                let left = self.parse_left_name()?;
                let op = self.expect_compare_op()?;
                let right = self.parse_literal()?;
                self.expect_rparen()?;
                Ok(PipelineStage::Filter { left, op, right })
            }
            "sort" => {
                self.expect_lparen()?;
                let left = self.parse_left_name()?;
                let dir = if matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                    match self.expect_ident()?.as_str() {
                        "desc" => SortDir::Desc,
                        _ => SortDir::Asc,
                    }
                } else {
                    SortDir::Asc
                };
                self.expect_rparen()?;
                Ok(PipelineStage::Sort { left, dir })
            }
            "limit" => {
                self.expect_lparen()?;
                let n = self.expect_number()?;
                self.expect_rparen()?;
                if n <= 0.0 {
                    return Err(QueryError::Parse {
                        pos: Position(self.peek_pos()),
                        expected: "a positive integer".to_string(),
                        found: n.to_string(),
                    });
                }
                Ok(PipelineStage::Limit(n as u64))
            }
            _ => self.parse_assignment(name),
        }
    }

    fn expect_compare_op(&mut self) -> Result<CompareOp, QueryError> {
        match self.peek().clone() {
            TokenKind::Op(op @ (OpToken::Eq | OpToken::Neq | OpToken::Lt | OpToken::Lte | OpToken::Gt | OpToken::Gte)) => {
                self.advance();
                Ok(compare_op_of(op))
            }
            _ => Err(self.err_expected("comparison operator")),
        }
    }

    fn parse_assignment(&mut self, name: String) -> Result<PipelineStage, QueryError> {
        self.expect_assign()?;
        let agg_name = self.expect_ident()?;
        let agg = match agg_name.as_str() {
            "count" => Agg::Count,
            "min" => Agg::Min,
            "max" => Agg::Max,
            "sum" => Agg::Sum,
            other => {
                return Err(QueryError::Parse {
                    pos: Position(self.peek_pos()),
                    expected: "'count', 'min', 'max', or 'sum'".to_string(),
                    found: other.to_string(),
                });
            }
        };
        self.expect_lparen()?;
        let field = if agg == Agg::Count {
            None
        } else {
            let f = self.expect_field_name()?;
            self.expect_comma()?;
            Some(f)
        };
        let source = self.parse_agg_source()?;
        self.expect_rparen()?;
        Ok(PipelineStage::Assign(Assignment {
            name,
            agg,
            field,
            source,
        }))
    }

    fn parse_agg_source(&mut self) -> Result<AggSource, QueryError> {
        match self.peek().clone() {
            TokenKind::Ident(s) if matches!(s.as_str(), "refs" | "refd" | "child" | "descendants") => {
                self.advance();
                self.expect_lparen()?;
                self.expect_underscore()?;
                self.expect_rparen()?;
                let nav = match s.as_str() {
                    "refs" => NavFn::Refs,
                    "refd" => NavFn::Refd,
                    "child" => NavFn::Child,
                    _ => NavFn::Descendants,
                };
                Ok(AggSource::Nav(nav))
            }
            TokenKind::LBrace => {
                self.advance();
                let sub_query = self.parse_subquery()?;
                self.expect_rbrace()?;
                Ok(AggSource::SubQuery(Box::new(sub_query)))
            }
            _ => Err(self.err_expected("'{sub-query}' or a nav(_) function")),
        }
    }
}

fn compare_op_of(op: OpToken) -> CompareOp {
    match op {
        OpToken::Eq => CompareOp::Eq,
        OpToken::Neq => CompareOp::Neq,
        OpToken::Lt => CompareOp::Lt,
        OpToken::Lte => CompareOp::Lte,
        OpToken::Gt => CompareOp::Gt,
        OpToken::Gte => CompareOp::Gte,
        _ => unreachable!("filtered to comparison operators by caller"),
    }
}

fn string_fn_of(name: &str) -> StringFn {
    match name {
        "contains" => StringFn::Contains,
        "startswith" => StringFn::StartsWith,
        "endswith" => StringFn::EndsWith,
        _ => StringFn::Matches,
    }
}

/// `.value` is the trait-query special field; every other name is a plain
/// field predicate. Kind-appropriateness (only valid on the right query
/// kind) is enforced later by the validator, not here.
fn field_or_value_predicate(field: String, op: CompareOp, rhs: Rhs) -> Predicate {
    if field == "value" {
        Predicate::Value { op, rhs }
    } else {
        Predicate::Field { field, op, rhs }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_type_and_field() {
        let q = parse("object:project .status==active").unwrap();
        assert_eq!(q.type_name, "project");
        assert!(matches!(q.kind, Kind::Object));
        assert!(matches!(q.predicate, Some(Predicate::Field { .. })));
    }

    #[test]
    fn parses_implicit_and() {
        let q = parse("object:project .status==active .owner==bob").unwrap();
        match q.predicate {
            Some(Predicate::And(items)) => assert_eq!(items.len(), 2),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn or_binds_looser_than_and() {
        let q = parse("object:project .a==1 .b==2 | .c==3").unwrap();
        match q.predicate {
            Some(Predicate::Or(items)) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[0], Predicate::And(_)));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let q = parse("object:project !.a==1 .b==2").unwrap();
        match q.predicate {
            Some(Predicate::And(items)) => {
                assert!(matches!(items[0], Predicate::Not(_)));
                assert!(matches!(items[1], Predicate::Field { .. }));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parses_parens_grouping() {
        let q = parse("object:project (.a==1 | .b==2) .c==3").unwrap();
        match q.predicate {
            Some(Predicate::And(items)) => {
                assert!(matches!(items[0], Predicate::Or(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn parses_value_predicate_on_trait() {
        let q = parse("trait:todo .value==high").unwrap();
        assert!(matches!(q.predicate, Some(Predicate::Value { .. })));
    }

    #[test]
    fn parses_operator_form_startswith() {
        let q = parse(r#"object:project .name^="web""#).unwrap();
        match q.predicate {
            Some(Predicate::StringFn { func, .. }) => assert_eq!(func, StringFn::StartsWith),
            other => panic!("expected StringFn, got {other:?}"),
        }
    }

    #[test]
    fn parses_in_desugars_to_or() {
        let q = parse("object:project in(.status,[active,paused])").unwrap();
        assert!(matches!(q.predicate, Some(Predicate::Or(_))));
    }

    #[test]
    fn rejects_empty_in_list() {
        assert!(parse("object:project in(.status,[])").is_err());
    }

    #[test]
    fn parses_descendant_has() {
        let q = parse("object:date descendant(object:meeting has(trait:due))").unwrap();
        assert!(matches!(q.predicate, Some(Predicate::Hierarchy { .. })));
    }

    #[test]
    fn parses_pipeline_with_braced_subquery() {
        let q = parse(
            "object:project |> todos = count({trait:todo within(_)}) filter(todos>0) sort(todos, desc) limit(10)",
        )
        .unwrap();
        let pipeline = q.pipeline.unwrap();
        assert_eq!(pipeline.stages.len(), 4);
        assert!(matches!(pipeline.stages[0], PipelineStage::Assign(_)));
        assert!(matches!(pipeline.stages[3], PipelineStage::Limit(10)));
    }

    #[test]
    fn rejects_zero_limit() {
        assert!(parse("object:project |> limit(0)").is_err());
    }

    #[test]
    fn parse_is_idempotent_over_pretty_print() {
        let sources = [
            "object:project .status==active",
            "object:project .a==1 .b==2 | .c==3",
            "object:date descendant(object:meeting has(trait:due))",
            "trait:todo refs([[projects/website]])",
            r#"object:project any(.scores, _>1)"#,
        ];
        for src in sources {
            let first = parse(src).unwrap();
            let printed = first.to_string();
            let second = parse(&printed).unwrap();
            assert_eq!(first.to_string(), second.to_string());
        }
    }
}
