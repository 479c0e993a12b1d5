use crate::{
    Lexer, Token,
    ast::{
        AssignmentExpression, AssignmentOperator, AssignmentTarget, BinaryExpression,
        BinaryOperator, CallExpression, ConditionalExpression, DeclarationKind, Declarator,
        Expression, ForInStatement, ForInit, ForOfStatement, ForStatement, ForTarget, Function,
        IfStatement, Literal, LogicalExpression, LogicalOperator, MemberExpression,
        MemberProperty, NewExpression, ObjectProperty, Program, PropertyName, Statement,
        TryStatement, UnaryExpression, UnaryOperator, UpdateExpression, VariableDeclaration,
        WhileStatement,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Invalid token at source position. Fatal to the compilation unit.
    Lex,
    /// Grammar violation at source position. Fatal to the compilation unit.
    Syntax,
}

#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            ParseErrorKind::Lex => "LexError",
            ParseErrorKind::Syntax => "SyntaxError",
        };
        write!(
            f,
            "{}: {} (line {}, column {})",
            kind, self.message, self.line, self.column
        )
    }
}

impl std::error::Error for ParseError {}

type Result<T> = std::result::Result<T, ParseError>;

/// Parses a source text into a [`Program`].
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source).parse_program()
}

pub struct Parser<'a> {
    lex: Lexer<'a>,
    in_async: bool,
    in_generator: bool,
    loop_depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lex = Lexer::new(source);
        lex.next();
        Self {
            lex,
            in_async: false,
            in_generator: false,
            loop_depth: 0,
        }
    }

    pub fn parse_program(mut self) -> Result<Program> {
        let mut body = Vec::new();
        while self.lex.token != Token::Eof {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            line: self.lex.line,
            column: self.lex.column,
        }
    }

    fn error_unexpected(&self) -> ParseError {
        let (kind, message) = match self.lex.token {
            Token::Invalid => (ParseErrorKind::Lex, "unexpected character".to_string()),
            Token::InvalidString => (ParseErrorKind::Lex, "malformed string literal".to_string()),
            Token::InvalidNumber => (ParseErrorKind::Lex, "malformed number literal".to_string()),
            Token::InvalidComment => (ParseErrorKind::Lex, "unterminated comment".to_string()),
            Token::Eof => (
                ParseErrorKind::Syntax,
                "unexpected end of input".to_string(),
            ),
            _ => (
                ParseErrorKind::Syntax,
                format!("unexpected token `{}`", self.lex.slice()),
            ),
        };
        ParseError {
            kind,
            message,
            line: self.lex.line,
            column: self.lex.column,
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.lex.token != token {
            return Err(self.error_unexpected());
        }
        self.lex.next();
        Ok(())
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.lex.token == token {
            self.lex.next();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Token {
        let mut lookahead = self.lex.clone();
        lookahead.next();
        lookahead.token
    }

    /// Consumes an identifier token and returns its text.
    fn ident(&mut self) -> Result<Box<str>> {
        if self.lex.token != Token::Ident {
            return Err(self.error_unexpected());
        }
        let name = self.lex.slice().into();
        self.lex.next();
        Ok(name)
    }

    /// Property names after `.` also admit keywords (`promise.catch`).
    fn property_name(&mut self) -> Result<Box<str>> {
        let is_word = self.lex.token == Token::Ident
            || self
                .lex
                .slice()
                .chars()
                .next()
                .is_some_and(|ch| ch.is_alphabetic() || ch == '_' || ch == '$');
        if !is_word || self.lex.slice().is_empty() {
            return Err(self.error_unexpected());
        }
        let name = self.lex.slice().into();
        self.lex.next();
        Ok(name)
    }

    /// Statement terminator with automatic semicolon insertion: an explicit
    /// `;`, a closing brace, end of input, or a preceding line break.
    fn semicolon(&mut self) -> Result<()> {
        if self.eat(Token::Semi) {
            return Ok(());
        }
        if self.lex.token == Token::RBrace
            || self.lex.token == Token::Eof
            || self.lex.has_newline_before
        {
            return Ok(());
        }
        Err(self.error_unexpected())
    }

    // ### Statements

    fn parse_statement(&mut self) -> Result<Statement> {
        match self.lex.token {
            Token::Semi => {
                self.lex.next();
                Ok(Statement::Empty)
            }
            Token::LBrace => {
                self.lex.next();
                let body = self.parse_block_body()?;
                Ok(Statement::Block(body))
            }
            Token::KeywordVar | Token::KeywordLet | Token::KeywordConst => {
                let decl = self.parse_variable_declaration()?;
                self.semicolon()?;
                Ok(Statement::VariableDeclaration(decl))
            }
            Token::KeywordFunction => {
                self.lex.next();
                let function = self.parse_function_tail(false, true)?;
                Ok(Statement::FunctionDeclaration(function))
            }
            Token::KeywordAsync if self.peek() == Token::KeywordFunction => {
                self.lex.next();
                self.lex.next();
                let function = self.parse_function_tail(true, true)?;
                Ok(Statement::FunctionDeclaration(function))
            }
            Token::KeywordIf => self.parse_if(),
            Token::KeywordWhile => self.parse_while(),
            Token::KeywordFor => self.parse_for(),
            Token::KeywordReturn => {
                self.lex.next();
                let argument = if self.lex.token == Token::Semi
                    || self.lex.token == Token::RBrace
                    || self.lex.token == Token::Eof
                    || self.lex.has_newline_before
                {
                    None
                } else {
                    Some(self.parse_expr(1)?)
                };
                self.semicolon()?;
                Ok(Statement::Return(argument))
            }
            Token::KeywordBreak => {
                if self.loop_depth == 0 {
                    return Err(self.error("illegal break statement"));
                }
                self.lex.next();
                self.semicolon()?;
                Ok(Statement::Break)
            }
            Token::KeywordContinue => {
                if self.loop_depth == 0 {
                    return Err(self.error("illegal continue statement"));
                }
                self.lex.next();
                self.semicolon()?;
                Ok(Statement::Continue)
            }
            Token::KeywordThrow => {
                self.lex.next();
                if self.lex.has_newline_before {
                    return Err(self.error("illegal newline after throw"));
                }
                let argument = self.parse_expr(1)?;
                self.semicolon()?;
                Ok(Statement::Throw(argument))
            }
            Token::KeywordTry => self.parse_try(),
            _ => {
                let expression = self.parse_expr(1)?;
                self.semicolon()?;
                Ok(Statement::Expression(expression))
            }
        }
    }

    fn parse_block_body(&mut self) -> Result<Vec<Statement>> {
        let mut body = Vec::new();
        while self.lex.token != Token::RBrace {
            if self.lex.token == Token::Eof {
                return Err(self.error_unexpected());
            }
            body.push(self.parse_statement()?);
        }
        self.lex.next();
        Ok(body)
    }

    fn declaration_kind(&mut self) -> DeclarationKind {
        let kind = match self.lex.token {
            Token::KeywordVar => DeclarationKind::Var,
            Token::KeywordLet => DeclarationKind::Let,
            Token::KeywordConst => DeclarationKind::Const,
            _ => unreachable!(),
        };
        self.lex.next();
        kind
    }

    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration> {
        let kind = self.declaration_kind();
        let mut declarators = Vec::new();
        loop {
            let name = self.ident()?;
            let init = if self.eat(Token::Equal) {
                Some(self.parse_expr(1)?)
            } else {
                None
            };
            if kind == DeclarationKind::Const && declarators.is_empty() && init.is_none() {
                return Err(self.error("missing initializer in const declaration"));
            }
            declarators.push(Declarator { name, init });
            if !self.eat(Token::Comma) {
                break;
            }
        }
        Ok(VariableDeclaration { kind, declarators })
    }

    fn parse_if(&mut self) -> Result<Statement> {
        self.lex.next();
        self.expect(Token::LParen)?;
        let test = self.parse_expr(1)?;
        self.expect(Token::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(Token::KeywordElse) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_while(&mut self) -> Result<Statement> {
        self.lex.next();
        self.expect(Token::LParen)?;
        let test = self.parse_expr(1)?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_loop_body(&mut self) -> Result<Statement> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    fn parse_for(&mut self) -> Result<Statement> {
        self.lex.next();
        let is_await = if self.lex.token == Token::KeywordAwait {
            if !self.in_async {
                return Err(self.error("`for await` is only valid in async functions"));
            }
            self.lex.next();
            true
        } else {
            false
        };
        self.expect(Token::LParen)?;

        // Declaration head: `for (var x …`, `for (let x …`, `for (const x …`.
        if matches!(
            self.lex.token,
            Token::KeywordVar | Token::KeywordLet | Token::KeywordConst
        ) {
            let kind = self.declaration_kind();
            let name = self.ident()?;
            match self.lex.token {
                Token::KeywordIn if !is_await => {
                    self.lex.next();
                    let target = ForTarget::Declaration { kind, name };
                    return self.parse_for_in_tail(target);
                }
                Token::KeywordOf => {
                    self.lex.next();
                    let target = ForTarget::Declaration { kind, name };
                    return self.parse_for_of_tail(target, is_await);
                }
                _ if is_await => return Err(self.error("expected `of` in for await")),
                _ => {
                    let init = if self.eat(Token::Equal) {
                        Some(self.parse_expr(1)?)
                    } else if kind == DeclarationKind::Const {
                        return Err(self.error("missing initializer in const declaration"));
                    } else {
                        None
                    };
                    let mut declarators = vec![Declarator { name, init }];
                    while self.eat(Token::Comma) {
                        let name = self.ident()?;
                        let init = if self.eat(Token::Equal) {
                            Some(self.parse_expr(1)?)
                        } else {
                            None
                        };
                        declarators.push(Declarator { name, init });
                    }
                    self.expect(Token::Semi)?;
                    let declaration = VariableDeclaration { kind, declarators };
                    return self.parse_classic_for_tail(Some(ForInit::Declaration(declaration)));
                }
            }
        }

        // Expression or empty head.
        if self.lex.token == Token::Semi && !is_await {
            self.lex.next();
            return self.parse_classic_for_tail(None);
        }

        let expression = self.parse_expr(1)?;
        match self.lex.token {
            Token::KeywordIn if !is_await => {
                self.lex.next();
                let target = Self::for_target_from_expression(expression)
                    .ok_or_else(|| self.error("invalid left-hand side in for-in"))?;
                self.parse_for_in_tail(target)
            }
            Token::KeywordOf => {
                self.lex.next();
                let target = Self::for_target_from_expression(expression)
                    .ok_or_else(|| self.error("invalid left-hand side in for-of"))?;
                self.parse_for_of_tail(target, is_await)
            }
            _ if is_await => Err(self.error("expected `of` in for await")),
            _ => {
                self.expect(Token::Semi)?;
                self.parse_classic_for_tail(Some(ForInit::Expression(expression)))
            }
        }
    }

    fn for_target_from_expression(expression: Expression) -> Option<ForTarget> {
        match expression {
            Expression::Identifier(name) => Some(ForTarget::Identifier(name)),
            _ => None,
        }
    }

    fn parse_classic_for_tail(&mut self, init: Option<ForInit>) -> Result<Statement> {
        let test = if self.lex.token == Token::Semi {
            None
        } else {
            Some(self.parse_expr(1)?)
        };
        self.expect(Token::Semi)?;
        let update = if self.lex.token == Token::RParen {
            None
        } else {
            Some(self.parse_expr(1)?)
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
        }))
    }

    fn parse_for_in_tail(&mut self, left: ForTarget) -> Result<Statement> {
        let object = self.parse_expr(1)?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::ForIn(ForInStatement { left, object, body }))
    }

    fn parse_for_of_tail(&mut self, left: ForTarget, is_await: bool) -> Result<Statement> {
        let iterable = self.parse_expr(1)?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::ForOf(ForOfStatement {
            left,
            iterable,
            body,
            is_await,
        }))
    }

    fn parse_try(&mut self) -> Result<Statement> {
        self.lex.next();
        self.expect(Token::LBrace)?;
        let block = self.parse_block_body()?;
        if self.lex.token != Token::KeywordCatch {
            return Err(self.error("missing catch after try"));
        }
        self.lex.next();
        let catch_binding = if self.eat(Token::LParen) {
            let name = self.ident()?;
            self.expect(Token::RParen)?;
            Some(name)
        } else {
            None
        };
        self.expect(Token::LBrace)?;
        let catch_block = self.parse_block_body()?;
        Ok(Statement::Try(TryStatement {
            block,
            catch_binding,
            catch_block,
        }))
    }

    // ### Functions

    /// Parses everything after the `function` keyword (and after `async`).
    fn parse_function_tail(&mut self, is_async: bool, need_name: bool) -> Result<Function> {
        let is_generator = self.eat(Token::Mul);
        if is_async && is_generator {
            return Err(self.error("async generators are not supported"));
        }
        let name = if self.lex.token == Token::Ident {
            Some(self.ident()?)
        } else if need_name {
            return Err(self.error("function declarations require a name"));
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_function_body(is_async, is_generator)?;
        Ok(Function {
            name,
            params,
            body,
            is_async,
            is_generator,
            is_arrow: false,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Box<str>>> {
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        while self.lex.token != Token::RParen {
            params.push(self.ident()?);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_function_body(&mut self, is_async: bool, is_generator: bool) -> Result<Vec<Statement>> {
        self.expect(Token::LBrace)?;
        let saved_async = std::mem::replace(&mut self.in_async, is_async);
        let saved_generator = std::mem::replace(&mut self.in_generator, is_generator);
        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_block_body();
        self.in_async = saved_async;
        self.in_generator = saved_generator;
        self.loop_depth = saved_loop_depth;
        body
    }

    /// Arrow body: either a block or a single expression normalized into a
    /// `return` statement.
    fn parse_arrow(&mut self, params: Vec<Box<str>>, is_async: bool) -> Result<Expression> {
        let body = if self.lex.token == Token::LBrace {
            self.lex.next();
            let saved_async = std::mem::replace(&mut self.in_async, is_async);
            let saved_generator = std::mem::replace(&mut self.in_generator, false);
            let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
            let body = self.parse_block_body();
            self.in_async = saved_async;
            self.in_generator = saved_generator;
            self.loop_depth = saved_loop_depth;
            body?
        } else {
            let saved_async = std::mem::replace(&mut self.in_async, is_async);
            let expression = self.parse_expr(1);
            self.in_async = saved_async;
            vec![Statement::Return(Some(expression?))]
        };
        Ok(Expression::Function(Function {
            name: None,
            params,
            body,
            is_async,
            is_generator: false,
            is_arrow: true,
        }))
    }

    /// Checks whether the lexer sits on an arrow parameter list:
    /// `( ident, … ) =>`. Pure lookahead; does not consume.
    fn is_arrow_params_ahead(&self) -> bool {
        let mut lookahead = self.lex.clone();
        debug_assert_eq!(lookahead.token, Token::LParen);
        lookahead.next();
        loop {
            match lookahead.token {
                Token::RParen => {
                    lookahead.next();
                    return lookahead.token == Token::Arrow;
                }
                Token::Ident => {
                    lookahead.next();
                    match lookahead.token {
                        Token::Comma => lookahead.next(),
                        Token::RParen => {}
                        _ => return false,
                    }
                }
                _ => return false,
            }
        }
    }

    // ### Expressions

    /// Takes in the highest binding power of the expression before.
    pub fn parse_expr(&mut self, min_bp: u8) -> Result<Expression> {
        let mut lhs = self.parse_primary()?;

        loop {
            let token = self.lex.token;
            let bp = token.lbp();
            if bp == 0 || bp < min_bp || (bp == min_bp && !token.is_right_assoc()) {
                break;
            }

            match token {
                Token::Dot => {
                    self.lex.next();
                    let name = self.property_name()?;
                    lhs = Expression::Member(MemberExpression {
                        object: Box::new(lhs),
                        property: MemberProperty::Dot(name),
                    });
                }
                Token::LBrack => {
                    self.lex.next();
                    let index = self.parse_expr(1)?;
                    self.expect(Token::RBrack)?;
                    lhs = Expression::Member(MemberExpression {
                        object: Box::new(lhs),
                        property: MemberProperty::Computed(Box::new(index)),
                    });
                }
                Token::LParen => {
                    self.lex.next();
                    let arguments = self.parse_call_args()?;
                    lhs = Expression::Call(CallExpression {
                        callee: Box::new(lhs),
                        arguments,
                    });
                }
                Token::Inc | Token::Dec => {
                    // `a\n++b` is two statements, not a postfix update.
                    if self.lex.has_newline_before {
                        break;
                    }
                    self.lex.next();
                    let target = Self::assignment_target(lhs)
                        .ok_or_else(|| self.error("invalid update target"))?;
                    lhs = Expression::Update(UpdateExpression {
                        target,
                        is_increment: token == Token::Inc,
                        is_prefix: false,
                    });
                }
                Token::And | Token::Or => {
                    self.lex.next();
                    let right = self.parse_expr(bp)?;
                    lhs = Expression::Logical(LogicalExpression {
                        operator: if token == Token::And {
                            LogicalOperator::And
                        } else {
                            LogicalOperator::Or
                        },
                        left: Box::new(lhs),
                        right: Box::new(right),
                    });
                }
                Token::Ternary => {
                    self.lex.next();
                    let consequent = self.parse_expr(1)?;
                    self.expect(Token::Colon)?;
                    let alternate = self.parse_expr(1)?;
                    lhs = Expression::Conditional(ConditionalExpression {
                        test: Box::new(lhs),
                        consequent: Box::new(consequent),
                        alternate: Box::new(alternate),
                    });
                }
                Token::Arrow => {
                    self.lex.next();
                    let Expression::Identifier(name) = lhs else {
                        return Err(self.error("invalid arrow function parameter list"));
                    };
                    lhs = self.parse_arrow(vec![name], false)?;
                }
                Token::Equal
                | Token::AddAssign
                | Token::SubAssign
                | Token::MulAssign
                | Token::DivAssign
                | Token::ModAssign => {
                    self.lex.next();
                    let operator = match token {
                        Token::Equal => AssignmentOperator::Assign,
                        Token::AddAssign => AssignmentOperator::Add,
                        Token::SubAssign => AssignmentOperator::Sub,
                        Token::MulAssign => AssignmentOperator::Mul,
                        Token::DivAssign => AssignmentOperator::Div,
                        _ => AssignmentOperator::Mod,
                    };
                    let target = Self::assignment_target(lhs)
                        .ok_or_else(|| self.error("invalid assignment target"))?;
                    let value = self.parse_expr(1)?;
                    lhs = Expression::Assignment(AssignmentExpression {
                        operator,
                        target,
                        value: Box::new(value),
                    });
                }
                _ => {
                    self.lex.next();
                    let operator = match token {
                        Token::Add => BinaryOperator::Add,
                        Token::Sub => BinaryOperator::Sub,
                        Token::Mul => BinaryOperator::Mul,
                        Token::Div => BinaryOperator::Div,
                        Token::Mod => BinaryOperator::Mod,
                        Token::Lt => BinaryOperator::Lt,
                        Token::Lte => BinaryOperator::Le,
                        Token::Gt => BinaryOperator::Gt,
                        Token::Gte => BinaryOperator::Ge,
                        Token::Equality => BinaryOperator::Eq,
                        Token::Inequality => BinaryOperator::Ne,
                        Token::StrictEquality => BinaryOperator::StrictEq,
                        Token::StrictInequality => BinaryOperator::StrictNe,
                        _ => return Err(self.error_unexpected()),
                    };
                    let right = self.parse_expr(bp)?;
                    lhs = Expression::Binary(BinaryExpression {
                        operator,
                        left: Box::new(lhs),
                        right: Box::new(right),
                    });
                }
            }
        }

        Ok(lhs)
    }

    fn assignment_target(expression: Expression) -> Option<AssignmentTarget> {
        match expression {
            Expression::Identifier(name) => Some(AssignmentTarget::Identifier(name)),
            Expression::Member(member) => Some(AssignmentTarget::Member(member)),
            _ => None,
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>> {
        let mut arguments = Vec::new();
        while self.lex.token != Token::RParen {
            arguments.push(self.parse_expr(1)?);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        match self.lex.token {
            Token::KeywordTrue => {
                self.lex.next();
                Ok(Expression::Literal(Literal::Boolean(true)))
            }
            Token::KeywordFalse => {
                self.lex.next();
                Ok(Expression::Literal(Literal::Boolean(false)))
            }
            Token::KeywordNull => {
                self.lex.next();
                Ok(Expression::Literal(Literal::Null))
            }
            Token::KeywordThis => {
                self.lex.next();
                Ok(Expression::This)
            }
            Token::Number => {
                let value = self.lex.number_value;
                self.lex.next();
                Ok(Expression::Literal(Literal::Number(value)))
            }
            Token::String => {
                let value = self.lex.string_value.clone();
                self.lex.next();
                Ok(Expression::Literal(Literal::String(value)))
            }
            Token::Ident => {
                let name = self.ident()?;
                Ok(Expression::Identifier(name))
            }
            Token::LParen => {
                if self.is_arrow_params_ahead() {
                    self.lex.next();
                    let params = self.parse_arrow_params()?;
                    self.expect(Token::Arrow)?;
                    return self.parse_arrow(params, false);
                }
                self.lex.next();
                let expression = self.parse_expr(1)?;
                self.expect(Token::RParen)?;
                Ok(expression)
            }
            Token::LBrack => self.parse_array_literal(),
            Token::LBrace => self.parse_object_literal(),
            Token::KeywordFunction => {
                self.lex.next();
                let function = self.parse_function_tail(false, false)?;
                Ok(Expression::Function(function))
            }
            Token::KeywordAsync => self.parse_async_expression(),
            Token::Not => self.parse_unary(UnaryOperator::Not),
            Token::Sub => self.parse_unary(UnaryOperator::Neg),
            Token::Add => self.parse_unary(UnaryOperator::Plus),
            Token::KeywordTypeOf => self.parse_unary(UnaryOperator::TypeOf),
            Token::KeywordDelete => {
                self.lex.next();
                let operand = self.parse_expr(14)?;
                let Expression::Member(member) = operand else {
                    return Err(self.error("delete target must be a property reference"));
                };
                Ok(Expression::Delete(member))
            }
            Token::Inc | Token::Dec => {
                let is_increment = self.lex.token == Token::Inc;
                self.lex.next();
                let operand = self.parse_expr(14)?;
                let target = Self::assignment_target(operand)
                    .ok_or_else(|| self.error("invalid update target"))?;
                Ok(Expression::Update(UpdateExpression {
                    target,
                    is_increment,
                    is_prefix: true,
                }))
            }
            Token::KeywordAwait => {
                if !self.in_async {
                    return Err(self.error("await is only valid in async functions"));
                }
                self.lex.next();
                let operand = self.parse_expr(14)?;
                Ok(Expression::Await(Box::new(operand)))
            }
            Token::KeywordYield => {
                if !self.in_generator {
                    return Err(self.error("yield is only valid in generator functions"));
                }
                self.lex.next();
                let argument = if self.lex.token == Token::Semi
                    || self.lex.token == Token::RParen
                    || self.lex.token == Token::RBrace
                    || self.lex.token == Token::RBrack
                    || self.lex.token == Token::Comma
                    || self.lex.token == Token::Eof
                    || self.lex.has_newline_before
                {
                    None
                } else {
                    Some(Box::new(self.parse_expr(1)?))
                };
                Ok(Expression::Yield(argument))
            }
            Token::KeywordNew => self.parse_new(),
            _ => Err(self.error_unexpected()),
        }
    }

    fn parse_unary(&mut self, operator: UnaryOperator) -> Result<Expression> {
        self.lex.next();
        let operand = self.parse_expr(14)?;
        Ok(Expression::Unary(UnaryExpression {
            operator,
            operand: Box::new(operand),
        }))
    }

    fn parse_arrow_params(&mut self) -> Result<Vec<Box<str>>> {
        let mut params = Vec::new();
        while self.lex.token != Token::RParen {
            params.push(self.ident()?);
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(params)
    }

    fn parse_async_expression(&mut self) -> Result<Expression> {
        match self.peek() {
            Token::KeywordFunction => {
                self.lex.next();
                self.lex.next();
                let function = self.parse_function_tail(true, false)?;
                Ok(Expression::Function(function))
            }
            Token::Ident => {
                // `async x => …`
                self.lex.next();
                let name = self.ident()?;
                self.expect(Token::Arrow)?;
                self.parse_arrow(vec![name], true)
            }
            Token::LParen => {
                self.lex.next();
                if !self.is_arrow_params_ahead() {
                    return Err(self.error("expected arrow function after async"));
                }
                self.lex.next();
                let params = self.parse_arrow_params()?;
                self.expect(Token::Arrow)?;
                self.parse_arrow(params, true)
            }
            _ => Err(self.error("unexpected `async`")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression> {
        self.lex.next();
        let mut elements = Vec::new();
        loop {
            match self.lex.token {
                Token::RBrack => break,
                Token::Comma => {
                    self.lex.next();
                    elements.push(None);
                }
                _ => {
                    elements.push(Some(self.parse_expr(1)?));
                    if !self.eat(Token::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect(Token::RBrack)?;
        Ok(Expression::Array(elements))
    }

    fn parse_object_literal(&mut self) -> Result<Expression> {
        self.lex.next();
        let mut properties = Vec::new();
        while self.lex.token != Token::RBrace {
            let key = match self.lex.token {
                Token::String => {
                    let value = self.lex.string_value.clone();
                    self.lex.next();
                    PropertyName::String(value)
                }
                Token::Number => {
                    let value = self.lex.number_value;
                    self.lex.next();
                    PropertyName::Number(value)
                }
                Token::LBrack => {
                    self.lex.next();
                    let key = self.parse_expr(1)?;
                    self.expect(Token::RBrack)?;
                    PropertyName::Computed(Box::new(key))
                }
                _ => PropertyName::Identifier(self.property_name()?),
            };
            let value = if self.eat(Token::Colon) {
                self.parse_expr(1)?
            } else {
                // Shorthand `{ foo }`.
                match &key {
                    PropertyName::Identifier(name) => Expression::Identifier(name.clone()),
                    _ => return Err(self.error("expected `:` after property name")),
                }
            };
            properties.push(ObjectProperty { key, value });
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expression::Object(properties))
    }

    /// `new F(args)`. Member accesses bind to the callee before the argument
    /// list does: `new a.b.C(x)` constructs `a.b.C`.
    fn parse_new(&mut self) -> Result<Expression> {
        self.lex.next();
        let mut callee = self.parse_primary()?;
        loop {
            match self.lex.token {
                Token::Dot => {
                    self.lex.next();
                    let name = self.property_name()?;
                    callee = Expression::Member(MemberExpression {
                        object: Box::new(callee),
                        property: MemberProperty::Dot(name),
                    });
                }
                Token::LBrack => {
                    self.lex.next();
                    let index = self.parse_expr(1)?;
                    self.expect(Token::RBrack)?;
                    callee = Expression::Member(MemberExpression {
                        object: Box::new(callee),
                        property: MemberProperty::Computed(Box::new(index)),
                    });
                }
                _ => break,
            }
        }
        let arguments = if self.eat(Token::LParen) {
            self.parse_call_args()?
        } else {
            Vec::new()
        };
        Ok(Expression::New(NewExpression {
            callee: Box::new(callee),
            arguments,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        match parse(source) {
            Ok(program) => program,
            Err(error) => panic!("parse of {source:?} failed: {error}"),
        }
    }

    #[test]
    fn variable_declarations() {
        let program = parse_ok("var a = 1, b; let c = 2; const d = 3;");
        assert_eq!(program.body.len(), 3);
        let Statement::VariableDeclaration(decl) = &program.body[0] else {
            panic!("expected declaration");
        };
        assert_eq!(decl.kind, DeclarationKind::Var);
        assert_eq!(decl.declarators.len(), 2);
        assert_eq!(&*decl.declarators[0].name, "a");
        assert!(decl.declarators[1].init.is_none());
    }

    #[test]
    fn const_requires_initializer() {
        assert!(parse("const x;").is_err());
    }

    #[test]
    fn precedence() {
        let program = parse_ok("1 + 2 * 3;");
        let Statement::Expression(Expression::Binary(add)) = &program.body[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(add.operator, BinaryOperator::Add);
        let Expression::Binary(mul) = &*add.right else {
            panic!("expected nested multiplication");
        };
        assert_eq!(mul.operator, BinaryOperator::Mul);
    }

    #[test]
    fn assignment_is_right_associative() {
        let program = parse_ok("a = b = 1;");
        let Statement::Expression(Expression::Assignment(outer)) = &program.body[0] else {
            panic!("expected assignment");
        };
        assert!(matches!(&*outer.value, Expression::Assignment(_)));
    }

    #[test]
    fn for_variants() {
        let program = parse_ok(
            "for (var i = 0; i < 3; i = i + 1) {} for (var k in o) {} for (const v of xs) {}",
        );
        assert!(matches!(program.body[0], Statement::For(_)));
        assert!(matches!(program.body[1], Statement::ForIn(_)));
        assert!(matches!(program.body[2], Statement::ForOf(_)));
    }

    #[test]
    fn for_await_requires_async() {
        assert!(parse("for await (const v of xs) {}").is_err());
        let program = parse_ok("async function f() { for await (const v of xs) {} }");
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function");
        };
        let Statement::ForOf(for_of) = &function.body[0] else {
            panic!("expected for-of");
        };
        assert!(for_of.is_await);
    }

    #[test]
    fn arrow_functions() {
        let program = parse_ok("var f = x => x + 1; var g = (a, b) => { return a; };");
        let Statement::VariableDeclaration(decl) = &program.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::Function(f)) = &decl.declarators[0].init else {
            panic!("expected arrow function");
        };
        assert!(f.is_arrow);
        assert_eq!(f.body.len(), 1);
        assert!(matches!(f.body[0], Statement::Return(Some(_))));
    }

    #[test]
    fn async_functions_and_await() {
        let program = parse_ok("async function f() { var a = await g(); return a; }");
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(function.is_async);
        assert!(parse("var a = await g();").is_err());
    }

    #[test]
    fn generators_and_yield() {
        let program = parse_ok("function* g() { yield 1; yield; }");
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(function.is_generator);
        assert!(parse("function f() { yield 1; }").is_err());
    }

    #[test]
    fn keyword_property_names() {
        parse_ok("p.catch(onError); p.finally; o.delete;");
    }

    #[test]
    fn new_expressions() {
        let program = parse_ok("new Promise(executor); new ns.Thing(1, 2);");
        assert!(matches!(
            program.body[0],
            Statement::Expression(Expression::New(_))
        ));
    }

    #[test]
    fn object_literals() {
        let program = parse_ok("var o = { a: 1, 'b c': 2, 3: 4, [k]: 5, short };");
        let Statement::VariableDeclaration(decl) = &program.body[0] else {
            panic!("expected declaration");
        };
        let Some(Expression::Object(properties)) = &decl.declarators[0].init else {
            panic!("expected object literal");
        };
        assert_eq!(properties.len(), 5);
    }

    #[test]
    fn asi_newline_terminates_statements() {
        parse_ok("var a = 1\nvar b = 2\na + b");
        assert!(parse("var a = 1 var b = 2").is_err());
    }

    #[test]
    fn syntax_error_carries_position() {
        let error = parse("var a = ;").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::Syntax);
        assert_eq!(error.line, 1);
        assert_eq!(error.column, 9);
    }

    #[test]
    fn lex_error_kind() {
        let error = parse("var a = 1 # 2;").unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::Lex);
    }

    #[test]
    fn try_catch() {
        let program = parse_ok("try { f(); } catch (e) { g(e); }");
        let Statement::Try(try_statement) = &program.body[0] else {
            panic!("expected try statement");
        };
        assert_eq!(try_statement.catch_binding.as_deref(), Some("e"));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert!(parse("break;").is_err());
        parse_ok("while (true) { break; }");
    }
}
