// Sable Parser
// Recursive descent parser that converts tokens into an AST

use std::sync::Arc;

use crate::ast::*;
use crate::error::{SableError, SableResult, Span};
use crate::lexer::{Scanner, Token, TokenKind};

/// Scan and parse a whole source file
pub fn parse_source(source: &str, file: &str) -> SableResult<Program> {
    let tokens = Scanner::new(source, file)
        .scan_tokens()
        .map_err(|e| e.with_source(source))?;
    Parser::new(tokens, file, source).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    file: String,
    source: String,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, file: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            tokens,
            current: 0,
            file: file.into(),
            source: source.into(),
        }
    }

    pub fn parse(&mut self) -> SableResult<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        Ok(Program::new(statements))
    }

    // ==================== Declarations ====================

    fn declaration(&mut self) -> SableResult<Stmt> {
        if self.check(&TokenKind::Local) {
            self.local_declaration()
        } else if self.check(&TokenKind::Fun) && self.check_identifier_ahead(1) {
            let decl = self.function_declaration()?;
            Ok(Stmt::Function { decl })
        } else if self.check(&TokenKind::Class) {
            self.class_declaration()
        } else if self.check(&TokenKind::Enum) {
            self.enum_declaration()
        } else if self.check(&TokenKind::Interface) {
            self.interface_declaration()
        } else if self.check(&TokenKind::Import) {
            self.import_statement()
        } else {
            self.statement()
        }
    }

    fn local_declaration(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'local'

        let name = self
            .consume_identifier("Expected variable name after 'local'")?
            .lexeme
            .clone();

        let hint = if self.match_token(&TokenKind::Colon) {
            Some(self.type_hint()?)
        } else {
            None
        };

        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after variable declaration")?
            .span;

        Ok(Stmt::Local {
            name,
            hint,
            initializer,
            span: start_span.to(end_span),
        })
    }

    fn function_declaration(&mut self) -> SableResult<Arc<FunctionDecl>> {
        let start_span = self.advance().span; // consume 'fun'

        let name = self
            .consume_identifier("Expected function name")?
            .lexeme
            .clone();

        self.function_rest(name, start_span)
    }

    /// Parameters, optional return hint and body, after the name
    fn function_rest(&mut self, name: String, start_span: Span) -> SableResult<Arc<FunctionDecl>> {
        let (params, variadic) = self.parse_parameters()?;

        let return_type = if self.match_token(&TokenKind::ThinArrow) {
            Some(self.type_hint()?)
        } else {
            None
        };

        self.consume(&TokenKind::LeftBrace, "Expected '{' before function body")?;
        let body = self.block_statements()?;
        let end_span = self.previous().span;

        Ok(Arc::new(FunctionDecl {
            name,
            params,
            variadic,
            return_type,
            body,
            delegate: None,
            span: start_span.to(end_span),
        }))
    }

    fn parse_parameters(&mut self) -> SableResult<(Vec<Param>, bool)> {
        self.consume(&TokenKind::LeftParen, "Expected '(' before parameters")?;

        let mut params = Vec::new();
        let mut variadic = false;

        if !self.check(&TokenKind::RightParen) {
            loop {
                if variadic {
                    return Err(self
                        .error("A variadic parameter must be the only parameter")
                        .with_help("Declare the function as 'fun f(args...)'"));
                }

                let token = self.consume_identifier("Expected parameter name")?;
                let (name, span) = (token.lexeme.clone(), token.span);

                if self.match_token(&TokenKind::DotDotDot) {
                    if !params.is_empty() {
                        return Err(self
                            .error("A variadic parameter must be the only parameter")
                            .with_help("Declare the function as 'fun f(args...)'"));
                    }
                    variadic = true;
                }

                let hint = if self.match_token(&TokenKind::Colon) {
                    Some(self.type_hint()?)
                } else {
                    None
                };

                params.push(Param { name, hint, span });

                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(&TokenKind::RightParen, "Expected ')' after parameters")?;
        Ok((params, variadic))
    }

    fn type_ref(&mut self) -> SableResult<TypeRef> {
        let token = self.consume_identifier("Expected type name")?;
        Ok(TypeRef {
            id: NodeId::next(),
            name: token.lexeme.clone(),
            span: token.span,
        })
    }

    fn type_hint(&mut self) -> SableResult<TypeHint> {
        let first = self.type_ref()?;
        let mut span = first.span;
        let mut options = vec![first];

        while self.match_token(&TokenKind::Pipe) {
            let next = self.type_ref()?;
            span = span.to(next.span);
            options.push(next);
        }

        Ok(TypeHint { options, span })
    }

    fn parent_list(&mut self) -> SableResult<Vec<TypeRef>> {
        let mut parents = Vec::new();
        if self.match_token(&TokenKind::Colon) {
            loop {
                parents.push(self.type_ref()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        Ok(parents)
    }

    fn class_declaration(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'class'

        let name = self.consume_identifier("Expected class name")?.lexeme.clone();
        let parents = self.parent_list()?;

        self.consume(&TokenKind::LeftBrace, "Expected '{' before class body")?;
        let mut decl = ClassDecl {
            id: NodeId::next(),
            name,
            kind: ClassKind::Class,
            parents,
            fields: Vec::new(),
            static_fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            operators: Vec::new(),
            constants: Vec::new(),
            span: start_span,
        };

        self.class_members(&mut decl)?;
        decl.span = start_span.to(self.previous().span);

        Ok(Stmt::Class {
            decl: Arc::new(decl),
        })
    }

    fn enum_declaration(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'enum'

        let name = self.consume_identifier("Expected enum name")?.lexeme.clone();
        let parents = self.parent_list()?;

        self.consume(&TokenKind::LeftBrace, "Expected '{' before enum body")?;

        let mut constants = Vec::new();
        while let TokenKind::Identifier(constant) = &self.peek().kind {
            let constant = constant.clone();
            let span = self.advance().span;
            let args = if self.match_token(&TokenKind::LeftParen) {
                self.arguments()?
            } else {
                Vec::new()
            };
            constants.push(EnumConstant {
                name: constant,
                args,
                span,
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        if !self.check(&TokenKind::RightBrace) {
            self.consume(&TokenKind::Semicolon, "Expected ';' after enum constants")?;
        }

        let mut decl = ClassDecl {
            id: NodeId::next(),
            name,
            kind: ClassKind::Enum,
            parents,
            fields: Vec::new(),
            static_fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            static_methods: Vec::new(),
            operators: Vec::new(),
            constants,
            span: start_span,
        };

        self.class_members(&mut decl)?;
        decl.span = start_span.to(self.previous().span);

        Ok(Stmt::Class {
            decl: Arc::new(decl),
        })
    }

    /// Members up to and including the closing brace
    fn class_members(&mut self, decl: &mut ClassDecl) -> SableResult<()> {
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Static) {
                if self.check(&TokenKind::Var) {
                    let field = self.field_declaration()?;
                    decl.static_fields.push(field);
                } else if self.check(&TokenKind::Fun) {
                    let method = self.function_declaration()?;
                    decl.static_methods.push(method);
                } else {
                    return Err(self
                        .error("Expected 'var' or 'fun' after 'static'")
                        .with_help("Declare 'static var name = value;' or 'static fun name() { }'"));
                }
            } else if self.check(&TokenKind::Var) {
                let field = self.field_declaration()?;
                decl.fields.push(field);
            } else if self.check(&TokenKind::Fun) {
                let method = self.function_declaration()?;
                decl.methods.push(method);
            } else if self.check(&TokenKind::Operator) {
                let overload = self.operator_declaration()?;
                decl.operators.push(overload);
            } else if self.check_identifier() && self.peek().lexeme == decl.name {
                let constructor = self.constructor_declaration()?;
                decl.constructors.push(constructor);
            } else {
                return Err(self
                    .error("Expected a class member")
                    .with_help("Class bodies contain 'var', 'fun', 'operator' and constructor declarations"));
            }
        }

        self.consume(&TokenKind::RightBrace, "Expected '}' after class body")?;
        Ok(())
    }

    fn field_declaration(&mut self) -> SableResult<FieldDecl> {
        let start_span = self.advance().span; // consume 'var'

        let name = self.consume_identifier("Expected field name")?.lexeme.clone();

        let hint = if self.match_token(&TokenKind::Colon) {
            Some(self.type_hint()?)
        } else {
            None
        };

        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after field declaration")?
            .span;

        Ok(FieldDecl {
            name,
            hint,
            initializer,
            span: start_span.to(end_span),
        })
    }

    fn operator_declaration(&mut self) -> SableResult<(Operator, Arc<FunctionDecl>)> {
        let start_span = self.advance().span; // consume 'operator'

        let op = if self.match_token(&TokenKind::LeftBracket) {
            self.consume(&TokenKind::RightBracket, "Expected ']' in operator '[]'")?;
            if self.match_token(&TokenKind::Equal) {
                Operator::IndexSet
            } else {
                Operator::Index
            }
        } else {
            match Operator::binary_from_token(&self.peek().kind) {
                Some(op) => {
                    self.advance();
                    op
                }
                None => {
                    return Err(self
                        .error(&format!("'{}' is not an overloadable operator", self.peek().kind))
                        .with_help("Overloadable: + - * / ^ & | ~ << >> == != < <= > >= ! [] []="));
                }
            }
        };

        let decl = self.function_rest(format!("operator {}", op), start_span)?;
        Ok((op, decl))
    }

    fn constructor_declaration(&mut self) -> SableResult<Arc<FunctionDecl>> {
        let token = self.advance();
        let (name, start_span) = (token.lexeme.clone(), token.span);

        let (params, variadic) = self.parse_parameters()?;

        let delegate = if self.match_token(&TokenKind::Colon) {
            let kind_span = self.peek().span;
            let kind = if self.match_token(&TokenKind::Super) {
                DelegateKind::Super
            } else if self.match_token(&TokenKind::This) {
                DelegateKind::This
            } else {
                return Err(self
                    .error("Expected 'super' or 'this' after ':' in constructor")
                    .with_help("Delegate with 'Name(a) : super(a) { }' or ': this(a, 0)'"));
            };
            self.consume(&TokenKind::LeftParen, "Expected '(' after constructor delegate")?;
            let args = self.arguments()?;
            Some(Delegate {
                kind,
                args,
                span: kind_span.to(self.previous().span),
            })
        } else {
            None
        };

        // `Name(): super();` declares a constructor with an empty body
        let body = if self.match_token(&TokenKind::Semicolon) {
            Vec::new()
        } else {
            self.consume(&TokenKind::LeftBrace, "Expected '{' before constructor body")?;
            self.block_statements()?
        };

        Ok(Arc::new(FunctionDecl {
            name,
            params,
            variadic,
            return_type: None,
            body,
            delegate,
            span: start_span.to(self.previous().span),
        }))
    }

    fn interface_declaration(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'interface'

        let name = self
            .consume_identifier("Expected interface name")?
            .lexeme
            .clone();
        let parents = self.parent_list()?;

        self.consume(&TokenKind::LeftBrace, "Expected '{' before interface body")?;

        let mut methods = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let fun_span = self
                .consume(&TokenKind::Fun, "Expected 'fun' in interface body")?
                .span;
            let method_name = self
                .consume_identifier("Expected method name")?
                .lexeme
                .clone();
            let (params, variadic) = self.parse_parameters()?;
            if self.match_token(&TokenKind::ThinArrow) {
                self.type_hint()?;
            }
            let end_span = self
                .consume(&TokenKind::Semicolon, "Expected ';' after interface method")?
                .span;
            methods.push(InterfaceMethod {
                name: method_name,
                arity: if variadic { -1 } else { params.len() as i32 },
                span: fun_span.to(end_span),
            });
        }

        let end_span = self
            .consume(&TokenKind::RightBrace, "Expected '}' after interface body")?
            .span;

        Ok(Stmt::Interface {
            decl: Arc::new(InterfaceDecl {
                name,
                parents,
                methods,
                span: start_span.to(end_span),
            }),
        })
    }

    /// `import A, B from a.b;` or `import * from a.b;`
    fn import_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'import'

        let names = if self.match_token(&TokenKind::Star) {
            ImportNames::All
        } else {
            let mut names = Vec::new();
            loop {
                names.push(
                    self.consume_identifier("Expected class name to import")?
                        .lexeme
                        .clone(),
                );
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            ImportNames::Names(names)
        };

        self.consume(&TokenKind::From, "Expected 'from' after imported names")?;

        let mut path = Vec::new();
        loop {
            path.push(
                self.consume_identifier("Expected import path segment")?
                    .lexeme
                    .clone(),
            );
            if !self.match_token(&TokenKind::Dot) {
                break;
            }
        }

        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after import")?
            .span;

        Ok(Stmt::Import {
            names,
            path,
            span: start_span.to(end_span),
        })
    }

    // ==================== Statements ====================

    fn statement(&mut self) -> SableResult<Stmt> {
        match self.peek().kind {
            TokenKind::LeftBrace => self.block(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Do => self.do_while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Foreach => self.foreach_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Break => {
                let start = self.advance().span;
                let end = self.consume(&TokenKind::Semicolon, "Expected ';' after 'break'")?.span;
                Ok(Stmt::Break { span: start.to(end) })
            }
            TokenKind::Continue => {
                let start = self.advance().span;
                let end = self
                    .consume(&TokenKind::Semicolon, "Expected ';' after 'continue'")?
                    .span;
                Ok(Stmt::Continue { span: start.to(end) })
            }
            TokenKind::Throw => self.throw_statement(),
            TokenKind::Try => self.try_statement(),
            _ => self.expression_statement(),
        }
    }

    fn block(&mut self) -> SableResult<Stmt> {
        let start_span = self
            .consume(&TokenKind::LeftBrace, "Expected '{'")?
            .span;
        let statements = self.block_statements()?;
        Ok(Stmt::Block {
            statements,
            span: start_span.to(self.previous().span),
        })
    }

    fn block_statements(&mut self) -> SableResult<Vec<Stmt>> {
        let mut statements = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(&TokenKind::RightBrace, "Expected '}' after block")?;
        Ok(statements)
    }

    fn parenthesized(&mut self, what: &str) -> SableResult<Expr> {
        self.consume(&TokenKind::LeftParen, &format!("Expected '(' after '{}'", what))?;
        let expr = self.expression()?;
        self.consume(&TokenKind::RightParen, &format!("Expected ')' after {} condition", what))?;
        Ok(expr)
    }

    fn if_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'if'

        let condition = self.parenthesized("if")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: start_span.to(self.previous().span),
        })
    }

    fn while_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'while'

        let condition = self.parenthesized("while")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While {
            condition,
            body,
            span: start_span.to(self.previous().span),
        })
    }

    fn do_while_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'do'

        let body = Box::new(self.statement()?);
        self.consume(&TokenKind::While, "Expected 'while' after do body")?;
        let condition = self.parenthesized("while")?;
        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after do-while")?
            .span;

        Ok(Stmt::DoWhile {
            body,
            condition,
            span: start_span.to(end_span),
        })
    }

    fn for_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'for'
        self.consume(&TokenKind::LeftParen, "Expected '(' after 'for'")?;

        let init = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Local) {
            Some(Box::new(self.local_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenKind::Semicolon, "Expected ';' after loop condition")?;

        let step = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenKind::RightParen, "Expected ')' after for clauses")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            init,
            condition,
            step,
            body,
            span: start_span.to(self.previous().span),
        })
    }

    /// `foreach (item : iterable) body`
    fn foreach_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'foreach'
        self.consume(&TokenKind::LeftParen, "Expected '(' after 'foreach'")?;
        self.match_token(&TokenKind::Local);

        let variable = self
            .consume_identifier("Expected loop variable name")?
            .lexeme
            .clone();
        self.consume(&TokenKind::Colon, "Expected ':' after loop variable")?;
        let iterable = self.expression()?;
        self.consume(&TokenKind::RightParen, "Expected ')' after foreach clause")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::Foreach {
            variable,
            iterable,
            body,
            span: start_span.to(self.previous().span),
        })
    }

    fn return_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'return'

        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after return value")?
            .span;

        Ok(Stmt::Return {
            value,
            span: start_span.to(end_span),
        })
    }

    fn throw_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'throw'

        let value = self.expression()?;
        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after thrown value")?
            .span;

        Ok(Stmt::Throw {
            value,
            span: start_span.to(end_span),
        })
    }

    fn try_statement(&mut self) -> SableResult<Stmt> {
        let start_span = self.advance().span; // consume 'try'

        let body = Box::new(self.block()?);

        let catch = if self.check(&TokenKind::Catch) {
            let catch_span = self.advance().span;
            self.consume(&TokenKind::LeftParen, "Expected '(' after 'catch'")?;
            let name = self
                .consume_identifier("Expected error variable name in catch")?
                .lexeme
                .clone();
            let types = if self.match_token(&TokenKind::Colon) {
                self.type_hint()?.options
            } else {
                Vec::new()
            };
            self.consume(&TokenKind::RightParen, "Expected ')' after catch clause")?;
            self.consume(&TokenKind::LeftBrace, "Expected '{' before catch block")?;
            let body = self.block_statements()?;
            Some(CatchClause {
                name,
                types,
                body,
                span: catch_span.to(self.previous().span),
            })
        } else {
            None
        };

        let finally = if self.match_token(&TokenKind::Finally) {
            Some(Box::new(self.block()?))
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            return Err(self
                .error("Expected 'catch' or 'finally' after try block")
                .with_help("A try block needs a catch clause, a finally block, or both"));
        }

        Ok(Stmt::Try {
            body,
            catch,
            finally,
            span: start_span.to(self.previous().span),
        })
    }

    fn expression_statement(&mut self) -> SableResult<Stmt> {
        let expr = self.expression()?;
        let end_span = self
            .consume(&TokenKind::Semicolon, "Expected ';' after expression")?
            .span;
        let span = expr.span().to(end_span);
        Ok(Stmt::Expression { expr, span })
    }

    // ==================== Expressions ====================

    pub fn expression(&mut self) -> SableResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> SableResult<Expr> {
        let expr = self.or()?;

        let op = if self.check(&TokenKind::Equal) {
            None
        } else if let Some(op) = Operator::compound_from_token(&self.peek().kind) {
            Some(op)
        } else {
            return Ok(expr);
        };
        self.advance();

        let value = Box::new(self.assignment()?);
        let span = expr.span().to(value.span());

        match expr {
            Expr::Access { id, name, .. } => Ok(Expr::Assign {
                id,
                name,
                op,
                value,
                span,
            }),
            Expr::Member { object, name, .. } => Ok(Expr::MemberAssign {
                object,
                name,
                op,
                value,
                span,
            }),
            Expr::Bracket { object, index, .. } => Ok(Expr::BracketAssign {
                object,
                index,
                op,
                value,
                span,
            }),
            other => Err(SableError::syntax_error("Invalid assignment target", other.span(), &self.file)
                .with_source(&self.source)
                .with_help("Only names, members and indexed elements can be assigned")),
        }
    }

    fn binary_level(
        &mut self,
        operators: &[TokenKind],
        next: fn(&mut Self) -> SableResult<Expr>,
    ) -> SableResult<Expr> {
        let mut expr = next(self)?;

        while operators.iter().any(|kind| self.check(kind)) {
            let token = self.advance().kind.clone();
            let Some(op) = Operator::binary_from_token(&token) else {
                break;
            };
            let right = next(self)?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::Or], Self::and)
    }

    fn and(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::And], Self::bit_or)
    }

    fn bit_or(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::Pipe], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::Tilde], Self::bit_and)
    }

    fn bit_and(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::Ampersand], Self::equality)
    }

    fn equality(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::EqualEqual, TokenKind::BangEqual], Self::comparison)
    }

    fn comparison(&mut self) -> SableResult<Expr> {
        self.binary_level(
            &[
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
            ],
            Self::shift,
        )
    }

    fn shift(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::LessLess, TokenKind::GreaterGreater], Self::term)
    }

    fn term(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::Plus, TokenKind::Minus], Self::factor)
    }

    fn factor(&mut self) -> SableResult<Expr> {
        self.binary_level(&[TokenKind::Star, TokenKind::Slash], Self::unary)
    }

    fn unary(&mut self) -> SableResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => Operator::Minus,
            TokenKind::Bang => Operator::Bang,
            TokenKind::Tilde => Operator::Tilde,
            _ => return self.power(),
        };
        let start_span = self.advance().span;
        let operand = self.unary()?;
        let span = start_span.to(operand.span());
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    /// `^` binds tighter than unary minus and associates to the right
    fn power(&mut self) -> SableResult<Expr> {
        let base = self.call()?;

        if self.match_token(&TokenKind::Caret) {
            let exponent = self.unary()?;
            let span = base.span().to(exponent.span());
            return Ok(Expr::Binary {
                left: Box::new(base),
                op: Operator::Caret,
                right: Box::new(exponent),
                span,
            });
        }

        Ok(base)
    }

    fn call(&mut self) -> SableResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenKind::LeftParen) {
                let args = self.arguments()?;
                let span = expr.span().to(self.previous().span);
                expr = match expr {
                    Expr::Access { id, name, .. } => Expr::FunctionCall {
                        id,
                        name,
                        args,
                        span,
                    },
                    callee => Expr::Call {
                        callee: Box::new(callee),
                        args,
                        span,
                    },
                };
            } else if self.match_token(&TokenKind::Dot) {
                let token = self.consume_identifier("Expected member name after '.'")?;
                let (name, name_span) = (token.lexeme.clone(), token.span);

                if self.match_token(&TokenKind::LeftParen) {
                    let args = self.arguments()?;
                    let span = expr.span().to(self.previous().span);
                    expr = Expr::MemberCall {
                        object: Box::new(expr),
                        name,
                        args,
                        span,
                    };
                } else {
                    let span = expr.span().to(name_span);
                    expr = Expr::Member {
                        object: Box::new(expr),
                        name,
                        span,
                    };
                }
            } else if self.match_token(&TokenKind::LeftBracket) {
                let index = self.expression()?;
                let end_span = self
                    .consume(&TokenKind::RightBracket, "Expected ']' after index")?
                    .span;
                let span = expr.span().to(end_span);
                expr = Expr::Bracket {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Arguments after an already consumed '('
    fn arguments(&mut self) -> SableResult<Vec<Expr>> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.consume(&TokenKind::RightParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn primary(&mut self) -> SableResult<Expr> {
        let token = self.peek().clone();
        let span = token.span;

        let literal = |value| Expr::Literal { value, span };

        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(literal(Literal::Number(n)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(literal(Literal::String(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(literal(Literal::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(literal(Literal::Boolean(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(literal(Literal::Null))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Access {
                    id: NodeId::next(),
                    name,
                    span,
                })
            }
            TokenKind::This => {
                self.advance();
                Ok(Expr::This {
                    id: NodeId::next(),
                    span,
                })
            }
            TokenKind::Super => {
                self.advance();
                self.consume(&TokenKind::Dot, "Expected '.' after 'super'")
                    .map_err(|e| e.with_help("Call a parent method with 'super.method(args)'"))?;
                let method = self
                    .consume_identifier("Expected method name after 'super.'")?
                    .lexeme
                    .clone();
                self.consume(&TokenKind::LeftParen, "Expected '(' after super method name")?;
                let args = self.arguments()?;
                Ok(Expr::SuperCall {
                    id: NodeId::next(),
                    method,
                    args,
                    span: span.to(self.previous().span),
                })
            }
            TokenKind::New => {
                self.advance();
                let class = self
                    .consume_identifier("Expected class name after 'new'")?
                    .lexeme
                    .clone();
                self.consume(&TokenKind::LeftParen, "Expected '(' after class name")?;
                let args = self.arguments()?;
                Ok(Expr::New {
                    id: NodeId::next(),
                    class,
                    args,
                    span: span.to(self.previous().span),
                })
            }
            TokenKind::Fun => {
                self.advance();
                let decl = self.function_rest("lambda".to_string(), span)?;
                let span = decl.span;
                Ok(Expr::Function { decl, span })
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RightBracket) {
                    loop {
                        elements.push(self.expression()?);
                        if !self.match_token(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end_span = self
                    .consume(&TokenKind::RightBracket, "Expected ']' after list elements")?
                    .span;
                Ok(Expr::List {
                    elements,
                    span: span.to(end_span),
                })
            }
            TokenKind::LeftBrace => {
                self.advance();
                self.map_literal(span)
            }
            _ => Err(self
                .error(&format!("Expected expression, found '{}'", token.kind))
                .with_help("Check for a missing operand or a stray token")),
        }
    }

    /// `{key: value, ...}`; a bare identifier key is taken as a string
    fn map_literal(&mut self, start_span: Span) -> SableResult<Expr> {
        let mut entries = Vec::new();

        if !self.check(&TokenKind::RightBrace) {
            loop {
                let key = if self.check_identifier() && self.check_ahead(1, &TokenKind::Colon) {
                    let token = self.advance();
                    Expr::Literal {
                        value: Literal::String(token.lexeme.clone()),
                        span: token.span,
                    }
                } else {
                    self.expression()?
                };
                self.consume(&TokenKind::Colon, "Expected ':' after map key")?;
                let value = self.expression()?;
                entries.push((key, value));
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        let end_span = self
            .consume(&TokenKind::RightBrace, "Expected '}' after map entries")?
            .span;

        Ok(Expr::Map {
            entries,
            span: start_span.to(end_span),
        })
    }

    // ==================== Helpers ====================

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Identifier(_))
    }

    fn check_identifier_ahead(&self, n: usize) -> bool {
        matches!(
            self.tokens.get(self.current + n).map(|t| &t.kind),
            Some(TokenKind::Identifier(_))
        )
    }

    fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        match self.tokens.get(self.current + n) {
            Some(token) => std::mem::discriminant(&token.kind) == std::mem::discriminant(kind),
            None => false,
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: &TokenKind, message: &str) -> SableResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> SableResult<&Token> {
        if self.check_identifier() {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> SableError {
        let token = self.peek();
        SableError::syntax_error(message, token.span, &self.file).with_source(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        parse_source(source, "test.sbl").unwrap()
    }

    #[test]
    fn test_power_is_right_associative_and_binds_tighter_than_negation() {
        let program = parse("-2 ^ 3 ^ 2;");
        let Stmt::Expression { expr, .. } = &program.statements[0] else {
            panic!("expected expression statement");
        };
        let Expr::Unary { op: Operator::Minus, operand, .. } = expr else {
            panic!("expected unary minus, got {:?}", expr);
        };
        let Expr::Binary { op: Operator::Caret, right, .. } = operand.as_ref() else {
            panic!("expected power");
        };
        assert!(matches!(right.as_ref(), Expr::Binary { op: Operator::Caret, .. }));
    }

    #[test]
    fn test_call_by_name_and_member_call() {
        let program = parse("f(1, 2); a.b(3); g()(4);");
        assert!(matches!(
            &program.statements[0],
            Stmt::Expression { expr: Expr::FunctionCall { name, args, .. }, .. } if name == "f" && args.len() == 2
        ));
        assert!(matches!(
            &program.statements[1],
            Stmt::Expression { expr: Expr::MemberCall { name, .. }, .. } if name == "b"
        ));
        assert!(matches!(
            &program.statements[2],
            Stmt::Expression { expr: Expr::Call { .. }, .. }
        ));
    }

    #[test]
    fn test_compound_assignment_targets() {
        let program = parse("x += 1; o.f -= 2; l[0] *= 3;");
        assert!(matches!(
            &program.statements[0],
            Stmt::Expression { expr: Expr::Assign { op: Some(Operator::Plus), .. }, .. }
        ));
        assert!(matches!(
            &program.statements[1],
            Stmt::Expression { expr: Expr::MemberAssign { op: Some(Operator::Minus), .. }, .. }
        ));
        assert!(matches!(
            &program.statements[2],
            Stmt::Expression { expr: Expr::BracketAssign { op: Some(Operator::Star), .. }, .. }
        ));
    }

    #[test]
    fn test_class_members() {
        let program = parse(
            "class B: A, I {
                var x = 1;
                static var count = 0;
                B(): super();
                B(a) : this() { x = a; }
                fun get() -> Number { return x; }
                static fun make() { return new B(); }
                operator + (other) { return x; }
                operator [] (i) { return i; }
            }",
        );
        let Stmt::Class { decl } = &program.statements[0] else {
            panic!("expected class");
        };
        assert_eq!(decl.parents.len(), 2);
        assert_eq!(decl.fields.len(), 1);
        assert_eq!(decl.static_fields.len(), 1);
        assert_eq!(decl.constructors.len(), 2);
        assert_eq!(decl.constructors[0].delegate.as_ref().map(|d| d.kind), Some(DelegateKind::Super));
        assert!(decl.constructors[0].body.is_empty());
        assert_eq!(decl.methods.len(), 1);
        assert!(decl.methods[0].return_type.is_some());
        assert_eq!(decl.static_methods.len(), 1);
        assert_eq!(decl.operators[0].0, Operator::Plus);
        assert_eq!(decl.operators[1].0, Operator::Index);
    }

    #[test]
    fn test_enum_constants_and_members() {
        let program = parse("enum Color { RED, GREEN(2); fun code() { return 1; } }");
        let Stmt::Class { decl } = &program.statements[0] else {
            panic!("expected enum");
        };
        assert_eq!(decl.kind, ClassKind::Enum);
        assert_eq!(decl.constants.len(), 2);
        assert_eq!(decl.constants[1].args.len(), 1);
        assert_eq!(decl.methods.len(), 1);
    }

    #[test]
    fn test_variadic_parameter_and_type_hints() {
        let program = parse("fun g(args...) {} fun h(a: Number | String, b) {}");
        let Stmt::Function { decl } = &program.statements[0] else {
            panic!("expected function");
        };
        assert_eq!(decl.arity(), -1);
        let Stmt::Function { decl } = &program.statements[1] else {
            panic!("expected function");
        };
        assert_eq!(decl.arity(), 2);
        assert_eq!(decl.params[0].hint.as_ref().map(|h| h.options.len()), Some(2));
    }

    #[test]
    fn test_variadic_must_be_alone() {
        let error = parse_source("fun g(a, rest...) {}", "test.sbl").unwrap_err();
        assert_eq!(error.message, "A variadic parameter must be the only parameter");
    }

    #[test]
    fn test_try_catch_finally_and_imports() {
        let program = parse(
            "import A, B from lib.shapes;
             import * from lib.util;
             try { throw Error(\"x\"); } catch (e: TypeError | Error) { } finally { f(); }",
        );
        assert!(matches!(
            &program.statements[0],
            Stmt::Import { names: ImportNames::Names(names), path, .. } if names.len() == 2 && path.len() == 2
        ));
        assert!(matches!(&program.statements[1], Stmt::Import { names: ImportNames::All, .. }));
        let Stmt::Try { catch: Some(catch), finally, .. } = &program.statements[2] else {
            panic!("expected try");
        };
        assert_eq!(catch.types.len(), 2);
        assert!(finally.is_some());
    }

    #[test]
    fn test_map_literal_keys() {
        let program = parse("local m = {name: 1, \"k\": 2, 3: 4};");
        let Stmt::Local { initializer: Some(Expr::Map { entries, .. }), .. } = &program.statements[0] else {
            panic!("expected map literal");
        };
        assert!(matches!(&entries[0].0, Expr::Literal { value: Literal::String(s), .. } if s == "name"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_reference_nodes_get_distinct_ids() {
        let program = parse("a; a;");
        let ids: Vec<NodeId> = program
            .statements
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Expression { expr: Expr::Access { id, .. }, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_invalid_assignment_target() {
        let error = parse_source("1 = 2;", "test.sbl").unwrap_err();
        assert_eq!(error.message, "Invalid assignment target");
    }
}
