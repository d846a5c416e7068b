// Statement execution and structured control flow

use std::sync::Arc;

use super::{Interpreter, StackTable};
use crate::ast::{CatchClause, Expr, Program, Stmt};
use crate::error::{runtime_error, ErrorKind, EvalResult, RuntimeError, Unwind};
use crate::runtime::Value;

/// How a statement finished. Stops and errors travel as `Unwind` instead.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

impl Interpreter {
    pub(crate) fn execute_program(&mut self, program: &Program) -> EvalResult {
        let mut last = Value::Null;
        for statement in &program.statements {
            if let Stmt::Expression { expr, .. } = statement {
                last = self.evaluate(expr)?;
                continue;
            }
            if let Flow::Return(value) = self.execute(statement)? {
                return Ok(value);
            }
        }
        Ok(last)
    }

    /// Run `f` with `table` as the current scope, restoring the previous
    /// scope on every exit path
    pub(crate) fn with_table<T>(&mut self, table: Arc<StackTable>, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.table, table);
        let result = f(self);
        self.table = previous;
        result
    }

    pub(crate) fn execute_statements(&mut self, statements: &[Stmt]) -> EvalResult<Flow> {
        for statement in statements {
            match self.execute(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> EvalResult<Flow> {
        let table = StackTable::child(&self.table);
        self.with_table(table, |interp| interp.execute_statements(statements))
    }

    pub(crate) fn execute(&mut self, statement: &Stmt) -> EvalResult<Flow> {
        match statement {
            Stmt::Local {
                name,
                hint,
                initializer,
                ..
            } => {
                let value = match initializer {
                    Some(initializer) => self.evaluate(initializer)?,
                    None => Value::Null,
                };
                if let Some(hint) = hint {
                    self.check_hint(hint, &value, &format!("variable '{}'", name))?;
                }
                self.table.define_variable(name, value);
                Ok(Flow::Normal)
            }

            Stmt::Expression { expr, .. } => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Block { statements, .. } => self.execute_block(statements),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.condition(condition)? {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body, .. } => {
                loop {
                    self.check_alive()?;
                    if !self.condition(condition)? {
                        break;
                    }
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::DoWhile { body, condition, .. } => {
                loop {
                    self.check_alive()?;
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Continue | Flow::Normal => {}
                    }
                    if !self.condition(condition)? {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                let table = StackTable::child(&self.table);
                self.with_table(table, |interp| interp.execute_for(init.as_deref(), condition.as_ref(), step.as_ref(), body))
            }

            Stmt::Foreach {
                variable,
                iterable,
                body,
                ..
            } => {
                let iterable = self.evaluate(iterable)?;
                let items = self.iterate(&iterable)?;
                for item in items {
                    self.check_alive()?;
                    let table = StackTable::child(&self.table);
                    table.define_variable(variable, item);
                    match self.with_table(table, |interp| interp.execute(body))? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Continue | Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function { decl } => {
                let function = self.make_function(decl);
                self.table.define_function(function);
                Ok(Flow::Normal)
            }

            Stmt::Class { decl } => {
                self.declare_class(decl)?;
                Ok(Flow::Normal)
            }

            Stmt::Interface { decl } => {
                self.declare_interface(decl)?;
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),

            Stmt::Throw { value, span } => {
                let value = self.evaluate(value)?;
                let error = self.throw_value(value)?;
                Err(Unwind::Error(error.at(*span, &self.file)))
            }

            Stmt::Try {
                body,
                catch,
                finally,
                ..
            } => self.execute_try(body, catch.as_ref(), finally.as_deref()),

            Stmt::Import { names, path, .. } => {
                self.execute_import(names, path)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn execute_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> EvalResult<Flow> {
        if let Some(init) = init {
            self.execute(init)?;
        }
        loop {
            self.check_alive()?;
            if let Some(condition) = condition {
                if !self.condition(condition)? {
                    break;
                }
            }
            match self.execute(body)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Continue | Flow::Normal => {}
            }
            if let Some(step) = step {
                self.evaluate(step)?;
            }
        }
        Ok(Flow::Normal)
    }

    /// Conditions must be Booleans; there is no truthiness
    fn condition(&mut self, expr: &Expr) -> EvalResult<bool> {
        match self.evaluate(expr)? {
            Value::Boolean(b) => Ok(b),
            other => Err(runtime_error(
                ErrorKind::TypeError,
                format!("Condition must be a Boolean, got {}", self.type_name(&other)),
            )
            .at(expr.span(), &self.file)),
        }
    }

    fn execute_try(
        &mut self,
        body: &Stmt,
        catch: Option<&CatchClause>,
        finally: Option<&Stmt>,
    ) -> EvalResult<Flow> {
        let mut outcome = self.execute(body);

        if let Some(clause) = catch {
            if let Err(Unwind::Error(error)) = outcome {
                outcome = self.execute_catch(clause, error);
            }
        }

        if let Some(finally) = finally {
            let stopping = matches!(outcome, Err(Unwind::Stop));
            if stopping {
                self.suppress_stop += 1;
            }
            let result = self.execute(finally);
            if stopping {
                self.suppress_stop -= 1;
            }
            match result {
                Ok(_) => {}
                Err(error) if !stopping => return Err(error),
                Err(error) => {
                    tracing::debug!(%error, "error in finally block while stopping");
                }
            }
        }

        outcome
    }

    fn execute_catch(&mut self, clause: &CatchClause, error: RuntimeError) -> EvalResult<Flow> {
        let value = self.error_value(&error);
        if !clause.types.is_empty() {
            let mut matched = false;
            for filter in &clause.types {
                let class = self.lookup_type(filter)?;
                if self.is_instance(&value, &class) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                return Err(Unwind::Error(error));
            }
        }

        let table = StackTable::child(&self.table);
        table.define_variable(&clause.name, value);
        self.with_table(table, |interp| interp.execute_statements(&clause.body))
    }

    /// The script value a runtime error stands for
    pub(crate) fn error_value(&self, error: &RuntimeError) -> Value {
        if let Some(value) = &error.value {
            return value.clone();
        }
        let trace = error.trace.iter().map(|frame| frame.to_string()).collect();
        crate::builtins::error::new_error_object(self.primitives(), error.kind, &error.message, trace)
    }

    /// Wrap a thrown value in a runtime error, keeping the value itself
    fn throw_value(&mut self, value: Value) -> EvalResult<RuntimeError> {
        let mut kind = ErrorKind::RuntimeError;
        let message = match &value {
            Value::Object(object) if self.is_instance(&value, &self.primitives().error) => {
                if let Some(found) = object
                    .class
                    .core()
                    .lineage()
                    .find_map(|core| ErrorKind::from_name(&core.name))
                {
                    kind = found;
                }
                match object.get("message") {
                    Some(Value::String(text)) => text.to_string(),
                    Some(other) => self.stringify(&other)?,
                    None => String::new(),
                }
            }
            _ => self.stringify(&value)?,
        };
        let mut error = RuntimeError::thrown(value, message);
        error.kind = kind;
        Ok(error)
    }
}
