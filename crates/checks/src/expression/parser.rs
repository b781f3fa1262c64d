//! Expression Parser
//!
//! Precedence, loosest first: `or`/`|`, `and`/`&`, `not`/`~`, comparison,
//! `+ -`, `* /`, unary `-`.

use super::lexer::{tokenize, Token, TokenKind};
use super::MAX_DEPTH;
use crate::EvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Min,
    Max,
    Abs,
    Sqrt,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "min" | "np.minimum" => Some(Function::Min),
            "max" | "np.maximum" => Some(Function::Max),
            "abs" | "np.abs" => Some(Function::Abs),
            "sqrt" | "np.sqrt" => Some(Function::Sqrt),
            _ => None,
        }
    }

    fn arity(self) -> usize {
        match self {
            Function::Min | Function::Max => 2,
            Function::Abs | Function::Sqrt => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(f64),
    Variable(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

/// Expression plus the height of its tree
type Node = (Expr, usize);

pub(crate) fn parse(source: &str) -> Result<Expr, EvaluationError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
        depth: 0,
    };
    let (expr, _) = parser.or()?;
    match parser.peek() {
        TokenKind::End => Ok(expr),
        other => Err(parser.error(format!("unexpected {other:?} after expression"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> EvaluationError {
        EvaluationError::Parse {
            position: self.position(),
            message: message.into(),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), EvaluationError> {
        if *self.peek() == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {kind:?}, found {:?}", self.peek())))
        }
    }

    fn nested<F>(&mut self, parse: F) -> Result<Node, EvaluationError>
    where
        F: FnOnce(&mut Self) -> Result<Node, EvaluationError>,
    {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("expression nests deeper than {MAX_DEPTH}")));
        }
        let node = parse(self);
        self.depth -= 1;
        node
    }

    fn check_height(&self, height: usize) -> Result<usize, EvaluationError> {
        if height > MAX_DEPTH {
            return Err(self.error(format!("expression nests deeper than {MAX_DEPTH}")));
        }
        Ok(height)
    }

    fn binary(&self, op: BinaryOp, lhs: Node, rhs: Node) -> Result<Node, EvaluationError> {
        let height = self.check_height(lhs.1.max(rhs.1) + 1)?;
        Ok((
            Expr::Binary {
                op,
                lhs: Box::new(lhs.0),
                rhs: Box::new(rhs.0),
            },
            height,
        ))
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(name) if name == word)
    }

    fn or(&mut self) -> Result<Node, EvaluationError> {
        let mut lhs = self.and()?;
        while matches!(self.peek(), TokenKind::Pipe) || self.keyword("or") {
            self.advance();
            let rhs = self.and()?;
            lhs = self.binary(BinaryOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node, EvaluationError> {
        let mut lhs = self.not()?;
        while matches!(self.peek(), TokenKind::Amp) || self.keyword("and") {
            self.advance();
            let rhs = self.not()?;
            lhs = self.binary(BinaryOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Node, EvaluationError> {
        if matches!(self.peek(), TokenKind::Tilde) || self.keyword("not") {
            self.advance();
            let (inner, height) = self.nested(Self::not)?;
            let height = self.check_height(height + 1)?;
            return Ok((Expr::Not(Box::new(inner)), height));
        }
        self.comparison()
    }

    fn comparison_op(&self) -> Option<BinaryOp> {
        Some(match self.peek() {
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            _ => return None,
        })
    }

    fn comparison(&mut self) -> Result<Node, EvaluationError> {
        let lhs = self.additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(lhs);
        };
        self.advance();
        let rhs = self.additive()?;
        if self.comparison_op().is_some() {
            return Err(self.error("chained comparisons need parentheses"));
        }
        self.binary(op, lhs, rhs)
    }

    fn additive(&mut self) -> Result<Node, EvaluationError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn term(&mut self) -> Result<Node, EvaluationError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = self.binary(op, lhs, rhs)?;
        }
    }

    fn unary(&mut self) -> Result<Node, EvaluationError> {
        if matches!(self.peek(), TokenKind::Minus) {
            self.advance();
            let (inner, height) = self.nested(Self::unary)?;
            let height = self.check_height(height + 1)?;
            return Ok((Expr::Neg(Box::new(inner)), height));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, EvaluationError> {
        match self.advance() {
            TokenKind::Number(value) => Ok((Expr::Literal(value), 1)),
            TokenKind::LParen => {
                let node = self.nested(Self::or)?;
                self.expect(TokenKind::RParen)?;
                Ok(node)
            }
            TokenKind::Ident(name) => {
                match name.as_str() {
                    "true" | "True" => return Ok((Expr::Literal(1.0), 1)),
                    "false" | "False" => return Ok((Expr::Literal(0.0), 1)),
                    "and" | "or" | "not" => {
                        return Err(self.error(format!("unexpected keyword '{name}'")))
                    }
                    _ => {}
                }
                if matches!(self.peek(), TokenKind::LParen) {
                    self.call(name)
                } else {
                    Ok((Expr::Variable(name), 1))
                }
            }
            other => Err(self.error(format!("unexpected {other:?}"))),
        }
    }

    fn call(&mut self, name: String) -> Result<Node, EvaluationError> {
        let Some(function) = Function::lookup(&name) else {
            return Err(EvaluationError::UnknownFunction(name));
        };
        self.expect(TokenKind::LParen)?;

        let mut args = Vec::new();
        let mut height = 0;
        if !matches!(self.peek(), TokenKind::RParen) {
            loop {
                let (arg, arg_height) = self.nested(Self::or)?;
                height = height.max(arg_height);
                args.push(arg);
                if matches!(self.peek(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        if args.len() != function.arity() {
            return Err(EvaluationError::Arity {
                function: name,
                expected: function.arity(),
                actual: args.len(),
            });
        }
        let height = self.check_height(height + 1)?;
        Ok((Expr::Call { function, args }, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Variable(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2 > c & ~d").unwrap();
        let Expr::Binary { op: BinaryOp::And, lhs, rhs } = expr else {
            panic!("expected and at the root");
        };
        assert_eq!(*rhs, Expr::Not(var("d")));
        let Expr::Binary { op: BinaryOp::Gt, lhs: sum, rhs: c } = *lhs else {
            panic!("expected comparison");
        };
        assert_eq!(c, var("c"));
        assert!(matches!(*sum, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_keywords_match_symbols() {
        assert_eq!(
            parse("(a > 1) and not (b < 2) or c").unwrap(),
            parse("(a > 1) & ~(b < 2) | c").unwrap()
        );
    }

    #[test]
    fn test_function_aliases() {
        assert_eq!(parse("np.maximum(a, b)").unwrap(), parse("max(a, b)").unwrap());
        assert!(matches!(
            parse("exp(a)"),
            Err(EvaluationError::UnknownFunction(name)) if name == "exp"
        ));
        assert!(matches!(
            parse("abs(a, b)"),
            Err(EvaluationError::Arity { expected: 1, actual: 2, .. })
        ));
    }

    #[test]
    fn test_chained_comparison_rejected() {
        assert!(matches!(parse("1 < a < 3"), Err(EvaluationError::Parse { .. })));
        assert!(parse("(1 < a) & (a < 3)").is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let nested = format!("{}a{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(parse(&nested).is_err());

        let long_chain = vec!["a"; MAX_DEPTH + 2].join(" + ");
        assert!(parse(&long_chain).is_err());

        let shallow = format!("{}a{}", "(".repeat(10), ")".repeat(10));
        assert!(parse(&shallow).is_ok());
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse("a b").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("a ** b").is_err());
        assert!(parse("").is_err());
    }
}
