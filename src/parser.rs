use std::collections::VecDeque;

use crate::ast::*;
use crate::config::Config;
use crate::error::{ParseError, Position};
use crate::lexer::{Spanned, Token, Tokenizer};

pub struct Parser<'a> {
    lexer: Tokenizer<'a>,
    buffer: VecDeque<Spanned>,
    input_len: usize,
    depth: usize,
    max_depth: usize,
    expr_depth: usize,
    max_expr_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, config: &Config) -> Self {
        Self {
            lexer: Tokenizer::new(input, config.trim_blocks),
            buffer: VecDeque::new(),
            input_len: input.len(),
            depth: 0,
            max_depth: config.max_depth,
            expr_depth: 0,
            max_expr_depth: config.max_expr_depth,
        }
    }

    /// Count one more level of expression nesting, failing past the limit.
    fn descend(&mut self) -> Result<(), ParseError> {
        self.expr_depth += 1;
        if self.expr_depth > self.max_expr_depth {
            let offset = self
                .buffer
                .front()
                .map(|s| s.offset)
                .unwrap_or(self.input_len);
            return Err(ParseError::NestingTooDeep {
                max_depth: self.max_expr_depth,
                position: self.position(offset),
            });
        }
        Ok(())
    }

    fn fill(&mut self, n: usize) -> Result<(), ParseError> {
        while self.buffer.len() <= n {
            match self.lexer.next_token()? {
                Some(token) => self.buffer.push_back(token),
                None => break,
            }
        }
        Ok(())
    }

    fn peek(&mut self, n: usize) -> Result<Option<Token>, ParseError> {
        self.fill(n)?;
        Ok(self.buffer.get(n).map(|s| s.token.clone()))
    }

    /// Whether the next two tokens open an `[% END` directive.
    fn at_end_directive(&mut self) -> Result<bool, ParseError> {
        self.fill(1)?;
        Ok(matches!(
            (
                self.buffer.front().map(|s| &s.token),
                self.buffer.get(1).map(|s| &s.token)
            ),
            (Some(Token::DirectiveStart { .. }), Some(Token::End))
        ))
    }

    fn consume(&mut self) -> Result<Option<Spanned>, ParseError> {
        self.fill(0)?;
        Ok(self.buffer.pop_front())
    }

    fn position(&self, offset: usize) -> Position {
        self.lexer.position(offset)
    }

    fn invalid(&self, found: Option<&Spanned>, message: &str) -> ParseError {
        let (found, offset) = match found {
            Some(s) => (describe(&s.token), s.offset),
            None => ("end of input".to_string(), self.input_len),
        };
        ParseError::InvalidExpression {
            found,
            message: message.to_string(),
            position: self.position(offset),
        }
    }

    fn expect(&mut self, token: Token, message: &str) -> Result<Spanned, ParseError> {
        match self.consume()? {
            Some(s) if s.token == token => Ok(s),
            other => Err(self.invalid(other.as_ref(), message)),
        }
    }

    /// Parse the whole input into a template.
    pub fn parse(&mut self) -> Result<Template, ParseError> {
        let nodes = self.parse_block()?;
        // parse_block only stops early in front of an END.
        if let Some(s) = self.consume()? {
            return Err(ParseError::UnmatchedEnd {
                position: self.position(s.offset),
            });
        }
        Ok(Template::from_nodes(nodes))
    }

    /// Parse nodes up to end of input or up to (not including) an `[% END %]`.
    fn parse_block(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            if self.at_end_directive()? {
                break;
            }

            let Some(spanned) = self.consume()? else {
                break;
            };
            match spanned.token {
                Token::Text(s) => nodes.push(Node::Literal(s)),
                Token::DirectiveStart { trim } => {
                    let node = if let Some(Token::If) = self.peek(0)? {
                        self.parse_if(trim, spanned.offset)?
                    } else {
                        self.parse_output(trim, spanned.offset)?
                    };
                    nodes.push(node);
                }
                _ => return Err(self.invalid(Some(&spanned), "expected text or `[%`")),
            }
        }
        Ok(nodes)
    }

    fn expect_directive_end(&mut self) -> Result<bool, ParseError> {
        match self.consume()? {
            Some(Spanned {
                token: Token::DirectiveEnd { trim },
                ..
            }) => Ok(trim),
            other => Err(self.invalid(other.as_ref(), "expected `%]`")),
        }
    }

    fn parse_output(&mut self, leading: bool, offset: usize) -> Result<Node, ParseError> {
        let expr = self.parse_expr()?;
        let trailing = self.expect_directive_end()?;
        Ok(Node::Output {
            expr,
            trim: Trim { leading, trailing },
            position: self.position(offset),
        })
    }

    fn parse_if(&mut self, leading: bool, offset: usize) -> Result<Node, ParseError> {
        let position = self.position(offset);
        self.expect(Token::If, "expected IF")?;
        if self.depth >= self.max_depth {
            return Err(ParseError::NestingTooDeep {
                max_depth: self.max_depth,
                position,
            });
        }
        let cond = self.parse_expr()?;
        let trailing = self.expect_directive_end()?;

        self.depth += 1;
        let body = self.parse_block()?;
        self.depth -= 1;

        // parse_block stopped either at EOF or in front of `[% END`.
        let close_leading = match self.consume()? {
            Some(Spanned {
                token: Token::DirectiveStart { trim },
                ..
            }) => trim,
            _ => return Err(ParseError::UnterminatedIf { position }),
        };
        self.expect(Token::End, "expected END")?;
        let close_trailing = self.expect_directive_end()?;

        Ok(Node::If {
            cond,
            body: Template::from_nodes(body),
            open: Trim { leading, trailing },
            close: Trim {
                leading: close_leading,
                trailing: close_trailing,
            },
            position,
        })
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if !matches!(self.peek(0)?, Some(Token::Question)) {
            return Ok(cond);
        }
        self.consume()?;
        self.descend()?;
        let then = self.parse_ternary()?;
        self.expect(Token::Colon, "expected `:` in conditional expression")?;
        let otherwise = self.parse_ternary()?;
        self.expr_depth -= 1;

        // `a ? a : b` is the long spelling of `a || b`.
        if cond == then {
            return Ok(Expr::DefaultOr {
                primary: Box::new(cond),
                fallback: Box::new(otherwise),
            });
        }
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        let base = self.expr_depth;
        while let Some(Token::Or | Token::OrOr) = self.peek(0)? {
            self.consume()?;
            self.descend()?;
            let rhs = self.parse_and()?;
            lhs = Expr::DefaultOr {
                primary: Box::new(lhs),
                fallback: Box::new(rhs),
            };
        }
        self.expr_depth = base;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_eq()?;
        let base = self.expr_depth;
        while let Some(Token::And | Token::AndAnd) = self.peek(0)? {
            self.consume()?;
            self.descend()?;
            let rhs = self.parse_eq()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.expr_depth = base;
        Ok(lhs)
    }

    fn parse_eq(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        let base = self.expr_depth;
        loop {
            let op = match self.peek(0)? {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => break,
            };
            self.consume()?;
            self.descend()?;
            let rhs = self.parse_unary()?;
            lhs = Expr::Compare(Box::new(lhs), op, Box::new(rhs));
        }
        self.expr_depth = base;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if let Some(Token::Not | Token::Bang) = self.peek(0)? {
            self.consume()?;
            self.descend()?;
            let inner = self.parse_unary()?;
            self.expr_depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        let base = self.expr_depth;

        // Handle suffixes: .segment, .method(args)
        while let Some(Token::Dot) = self.peek(0)? {
            self.consume()?; // .
            let (name, offset) = match self.consume()? {
                Some(Spanned {
                    token: Token::Ident(name),
                    offset,
                }) => (name, offset),
                // Keys may be spelled like keywords: `flags.END`, `settings.true`.
                Some(Spanned {
                    token:
                        token @ (Token::If
                        | Token::End
                        | Token::And
                        | Token::Or
                        | Token::Not
                        | Token::True
                        | Token::False),
                    offset,
                }) => (describe(&token), offset),
                other => {
                    return Err(self.invalid(other.as_ref(), "expected identifier after `.`"))
                }
            };

            if let Some(Token::LParen) = self.peek(0)? {
                self.descend()?;
                expr = self.parse_call(expr, &name, offset)?;
                continue;
            }

            match &mut expr {
                Expr::Path(segments) => segments.push(name),
                _ => {
                    return Err(ParseError::InvalidExpression {
                        found: name,
                        message: "only paths support `.segment` lookup".to_string(),
                        position: self.position(offset),
                    })
                }
            }
        }

        self.expr_depth = base;
        Ok(expr)
    }

    fn parse_call(&mut self, receiver: Expr, name: &str, offset: usize) -> Result<Expr, ParseError> {
        let position = self.position(offset);
        let method = Method::from_name(name).ok_or_else(|| ParseError::InvalidExpression {
            found: name.to_string(),
            message: "unknown method".to_string(),
            position,
        })?;

        self.expect(Token::LParen, "expected `(`")?;
        let mut args = Vec::new();
        if !matches!(self.peek(0)?, Some(Token::RParen)) {
            loop {
                args.push(self.parse_expr()?);
                if let Some(Token::Comma) = self.peek(0)? {
                    self.consume()?;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "expected `)` after arguments")?;

        match method {
            Method::Join if args.len() > 1 => {
                return Err(ParseError::InvalidExpression {
                    found: name.to_string(),
                    message: format!("join takes at most one argument, got {}", args.len()),
                    position,
                })
            }
            Method::Join => {}
        }

        Ok(Expr::MethodCall {
            receiver: Box::new(receiver),
            method,
            args,
            position,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let spanned = self.consume()?;
        let expr = match spanned.as_ref().map(|s| &s.token) {
            Some(Token::StringLit(s)) => Expr::Literal(Literal::String(s.clone())),
            Some(Token::Integer(n)) => Expr::Literal(Literal::Integer(*n)),
            Some(Token::Float(n)) => Expr::Literal(Literal::Float(*n)),
            Some(Token::True) => Expr::Literal(Literal::Bool(true)),
            Some(Token::False) => Expr::Literal(Literal::Bool(false)),
            Some(Token::Ident(s)) => Expr::Path(vec![s.clone()]),
            Some(Token::LParen) => {
                self.descend()?;
                let e = self.parse_expr()?;
                self.expect(Token::RParen, "expected `)`")?;
                self.expr_depth -= 1;
                e
            }
            _ => return Err(self.invalid(spanned.as_ref(), "expected expression")),
        };
        Ok(expr)
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Text(s) => s.clone(),
        Token::DirectiveStart { trim: false } => "[%".into(),
        Token::DirectiveStart { trim: true } => "[%-".into(),
        Token::DirectiveEnd { trim: false } => "%]".into(),
        Token::DirectiveEnd { trim: true } => "-%]".into(),
        Token::If => "IF".into(),
        Token::End => "END".into(),
        Token::And => "AND".into(),
        Token::Or => "OR".into(),
        Token::Not => "NOT".into(),
        Token::True => "true".into(),
        Token::False => "false".into(),
        Token::EqEq => "==".into(),
        Token::NotEq => "!=".into(),
        Token::Bang => "!".into(),
        Token::AndAnd => "&&".into(),
        Token::OrOr => "||".into(),
        Token::Question => "?".into(),
        Token::Colon => ":".into(),
        Token::Dot => ".".into(),
        Token::Comma => ",".into(),
        Token::LParen => "(".into(),
        Token::RParen => ")".into(),
        Token::Ident(s) => s.clone(),
        Token::StringLit(s) => format!("'{}'", s),
        Token::Integer(n) => n.to_string(),
        Token::Float(n) => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Template, ParseError> {
        Parser::new(input, &Config::default()).parse()
    }

    fn expr(input: &str) -> Expr {
        let template = parse(&format!("[% {} %]", input)).unwrap();
        match &template.nodes()[0] {
            Node::Output { expr, .. } => expr.clone(),
            other => panic!("expected output node, got {:?}", other),
        }
    }

    fn path(s: &str) -> Expr {
        Expr::Path(s.split('.').map(String::from).collect())
    }

    #[test]
    fn literal_only_template() {
        let t = parse("just text\n").unwrap();
        assert_eq!(t.nodes(), &[Node::Literal("just text\n".into())]);
    }

    #[test]
    fn empty_input_is_empty_template() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn dotted_path() {
        assert_eq!(expr("wordpress.multisite.enabled"), path("wordpress.multisite.enabled"));
    }

    #[test]
    fn keyword_spellings_are_valid_path_segments() {
        assert_eq!(expr("settings.true"), path("settings.true"));
        assert_eq!(expr("flags.END.IF"), path("flags.END.IF"));
        assert_eq!(expr("a.NOT AND b.OR"), Expr::And(Box::new(path("a.NOT")), Box::new(path("b.OR"))));
        assert!(matches!(
            parse("[% a.'x' %]"),
            Err(ParseError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn expression_nesting_is_bounded() {
        let config = Config {
            max_expr_depth: 3,
            ..Config::default()
        };
        let parse_with = |input: &str| Parser::new(input, &config).parse();
        assert!(parse_with("[% !!!a %]").is_ok());
        assert!(parse_with("[% (((a))) %]").is_ok());
        assert!(parse_with("[% a || b || c || d %]").is_ok());
        for input in [
            "[% !!!!a %]",
            "[% ((((a)))) %]",
            "[% a || b || c || d || e %]",
            "[% a == b == c == d == e %]",
            "[% a ? b : c ? d : e ? f : g ? h : i %]",
        ] {
            assert!(
                matches!(
                    parse_with(input),
                    Err(ParseError::NestingTooDeep { max_depth: 3, .. })
                ),
                "{}",
                input
            );
        }
        // Siblings do not accumulate depth.
        assert!(parse_with("[% (a) && (b) && !c %][% !!!d %]").is_ok());
    }

    #[test]
    fn both_default_spellings_desugar_identically() {
        let long = expr("database.table_prefix ? database.table_prefix : 'wp_'");
        let short = expr("database.table_prefix || 'wp_'");
        assert_eq!(long, short);
        assert!(matches!(long, Expr::DefaultOr { .. }));
    }

    #[test]
    fn ternary_with_distinct_branches() {
        assert_eq!(
            expr("wordpress.debug ? 'true' : 'false'"),
            Expr::Ternary {
                cond: Box::new(path("wordpress.debug")),
                then: Box::new(Expr::Literal(Literal::String("true".into()))),
                otherwise: Box::new(Expr::Literal(Literal::String("false".into()))),
            }
        );
    }

    #[test]
    fn join_call_with_double_quoted_separator() {
        match expr(r#"wordpress.wp_cache.acceptable_files.join("', '")"#) {
            Expr::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                assert_eq!(*receiver, path("wordpress.wp_cache.acceptable_files"));
                assert_eq!(method, Method::Join);
                assert_eq!(args, vec![Expr::Literal(Literal::String("', '".into()))]);
            }
            other => panic!("expected method call, got {:?}", other),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            expr("a OR b AND c"),
            Expr::DefaultOr {
                primary: Box::new(path("a")),
                fallback: Box::new(Expr::And(Box::new(path("b")), Box::new(path("c")))),
            }
        );
    }

    #[test]
    fn if_body_nests_and_records_trim_flags() {
        let t = parse("[%- IF a -%]x[% IF b %]y[% END %][%- END -%]").unwrap();
        match &t.nodes()[0] {
            Node::If {
                body, open, close, ..
            } => {
                assert_eq!(*open, Trim { leading: true, trailing: true });
                assert_eq!(*close, Trim { leading: true, trailing: true });
                assert_eq!(body.len(), 2);
                assert!(matches!(body.nodes()[1], Node::If { .. }));
            }
            other => panic!("expected IF, got {:?}", other),
        }
    }

    #[test]
    fn unmatched_end() {
        let err = parse("a\n[% END %]").unwrap_err();
        match err {
            ParseError::UnmatchedEnd { position } => assert_eq!(position.line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unterminated_if() {
        let err = parse("x [% IF a %] y [% IF b %] [% END %]").unwrap_err();
        match err {
            ParseError::UnterminatedIf { position } => assert_eq!(position.offset, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unterminated_directive() {
        assert!(matches!(
            parse("[% IF a %]x[% END"),
            Err(ParseError::UnterminatedDirective { .. })
        ));
    }

    #[test]
    fn empty_directive_is_invalid() {
        match parse("[% %]").unwrap_err() {
            ParseError::InvalidExpression { found, .. } => assert_eq!(found, "%]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_method_is_rejected_at_parse_time() {
        match parse("[% list.explode(',') %]").unwrap_err() {
            ParseError::InvalidExpression { found, message, .. } => {
                assert_eq!(found, "explode");
                assert_eq!(message, "unknown method");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn end_with_trailing_tokens_is_invalid() {
        assert!(matches!(
            parse("[% IF a %][% END a %]"),
            Err(ParseError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn nesting_limit() {
        let config = Config {
            max_depth: 1,
            ..Config::default()
        };
        let err = Parser::new("[% IF a %][% IF b %][% END %][% END %]", &config)
            .parse()
            .unwrap_err();
        assert!(matches!(err, ParseError::NestingTooDeep { max_depth: 1, .. }));
    }
}
