// Expression evaluation

use std::sync::Arc;

use super::Interpreter;
use crate::ast::{Expr, Literal};
use crate::builtins::map::map_insert;
use crate::error::EvalResult;
use crate::runtime::{Function, FunctionRole, UserFunction, Value, ValueMap};

/// Stack kept free before descending into a nested expression
pub(super) const RED_ZONE: usize = 128 * 1024;
/// Size of each new stack segment when the red zone is hit
pub(super) const STACK_SEGMENT: usize = 1024 * 1024;

impl Interpreter {
    /// Evaluate `expr`; runtime errors without a location get this
    /// expression's span
    pub(crate) fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        let result = stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || self.evaluate_inner(expr));
        result.map_err(|unwind| unwind.at(expr.span(), &self.file))
    }

    /// Evaluate `expr` with `table` as the current scope
    pub fn eval_in(&mut self, table: &Arc<super::StackTable>, expr: &Expr) -> EvalResult {
        self.with_table(table.clone(), |interp| interp.evaluate(expr))
    }

    pub(super) fn evaluate_all(&mut self, exprs: &[Expr]) -> EvalResult<Vec<Value>> {
        exprs.iter().map(|expr| self.evaluate(expr)).collect()
    }

    fn evaluate_inner(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::string(s),
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Null => Value::Null,
            }),

            Expr::List { elements, .. } => Ok(Value::list(self.evaluate_all(elements)?)),

            Expr::Map { entries, .. } => {
                let map = Arc::new(parking_lot::RwLock::new(ValueMap::new()));
                for (key, value) in entries {
                    let key = self.evaluate(key)?;
                    let value = self.evaluate(value)?;
                    map_insert(self, &map, key, value)?;
                }
                Ok(Value::Map(map))
            }

            Expr::Access { id, name, .. } => self.lookup_access(*id, name),

            Expr::Assign {
                id,
                name,
                op,
                value,
                ..
            } => {
                let value = match op {
                    Some(op) => {
                        let current = self.lookup_access(*id, name)?;
                        let definition = self.definition_of(&current);
                        definition.binary(self, &current, *op, &mut |interp: &mut Interpreter| -> EvalResult {
                            interp.evaluate(value)
                        })?
                    }
                    None => self.evaluate(value)?,
                };
                self.assign(*id, name, value.clone())?;
                Ok(value)
            }

            Expr::FunctionCall { id, name, args, span } => {
                let args = self.evaluate_all(args)?;
                self.call_site = *span;
                self.call_by_name(*id, name, args)
            }

            Expr::Call { callee, args, span } => {
                let callee = self.evaluate(callee)?;
                let args = self.evaluate_all(args)?;
                self.call_site = *span;
                self.call_value(&callee, args)
            }

            Expr::Member { object, name, .. } => {
                let target = self.evaluate(object)?;
                self.definition_of(&target).member_access(self, &target, name)
            }

            Expr::MemberAssign {
                object,
                name,
                op,
                value,
                ..
            } => {
                let target = self.evaluate(object)?;
                let definition = self.definition_of(&target);
                let value = match op {
                    Some(op) => {
                        let current = definition.member_access(self, &target, name)?;
                        let right = self.evaluate(value)?;
                        self.binary_values(&current, *op, right)?
                    }
                    None => self.evaluate(value)?,
                };
                definition.member_assign(self, &target, name, value.clone())?;
                Ok(value)
            }

            Expr::MemberCall {
                object,
                name,
                args,
                span,
            } => {
                let target = self.evaluate(object)?;
                let args = self.evaluate_all(args)?;
                self.call_site = *span;
                self.call_method(&target, name, args)
            }

            Expr::Bracket { object, index, .. } => {
                let target = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                self.definition_of(&target).bracket_access(self, &target, index)
            }

            Expr::BracketAssign {
                object,
                index,
                op,
                value,
                ..
            } => {
                let target = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                let definition = self.definition_of(&target);
                let value = match op {
                    Some(op) => {
                        let current = definition.bracket_access(self, &target, index.clone())?;
                        let right = self.evaluate(value)?;
                        self.binary_values(&current, *op, right)?
                    }
                    None => self.evaluate(value)?,
                };
                definition.bracket_assign(self, &target, index, value.clone())?;
                Ok(value)
            }

            Expr::Unary { op, operand, .. } => {
                let value = self.evaluate(operand)?;
                self.definition_of(&value).unary(self, &value, *op)
            }

            Expr::Binary { left, op, right, .. } => {
                let left = self.evaluate(left)?;
                let definition = self.definition_of(&left);
                definition.binary(self, &left, *op, &mut |interp: &mut Interpreter| -> EvalResult {
                    interp.evaluate(right)
                })
            }

            Expr::This { id, .. } => self.lookup_access(*id, "this"),

            Expr::SuperCall {
                id,
                method,
                args,
                span,
            } => {
                let args = self.evaluate_all(args)?;
                self.call_site = *span;
                self.super_call(*id, method, args)
            }

            Expr::New { id, class, args, span } => {
                let class = self.lookup_class_ref(Some(*id), class)?;
                let args = self.evaluate_all(args)?;
                self.call_site = *span;
                class.construct(self, args)
            }

            Expr::Function { decl, .. } => Ok(Value::Function(self.make_function(decl))),
        }
    }

    /// Function value closed over the current scope
    pub(crate) fn make_function(&self, decl: &Arc<crate::ast::FunctionDecl>) -> Arc<Function> {
        Arc::new(Function::user(UserFunction {
            decl: decl.clone(),
            closure: self.table.clone(),
            role: FunctionRole::Plain,
            file: self.file.clone(),
            owner: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, Value};
    use std::sync::Arc;

    fn run(source: &str) -> Value {
        let sink = Arc::new(BufferSink::new());
        let mut interp = Interpreter::builder().sink(sink).build();
        interp.run_source(source, "test.sbl").unwrap()
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(run("1 + 2 * 3;").as_number(), Some(7.0));
        assert_eq!(run("2 ^ 3 ^ 2;").as_number(), Some(512.0));
        assert_eq!(run("-2 ^ 2;").as_number(), Some(-4.0));
    }

    #[test]
    fn test_compound_assignment() {
        assert_eq!(run("local x = 5; x += 3; x *= 2; x;").as_number(), Some(16.0));
    }

    #[test]
    fn test_map_literal_and_bracket_access() {
        assert_eq!(run("local m = {a: 1, \"b\": 2}; m[\"a\"] + m.get(\"b\");").as_number(), Some(3.0));
    }

    #[test]
    fn test_list_compound_bracket_assignment() {
        assert_eq!(run("local l = [1, 2]; l[1] += 10; l[1];").as_number(), Some(12.0));
    }

    #[test]
    fn test_top_level_return_is_the_result() {
        assert_eq!(run("return 4; 5;").as_number(), Some(4.0));
    }
}
