// Global native functions
// Registered by name and arity before any user code is compiled, so the
// resolver sees them as known names.

use super::{get_function_arg, get_number_arg, get_string_arg};
use crate::error::{runtime_error, ErrorKind, EvalResult};
use crate::interpreter::Interpreter;
use crate::runtime::{Function, FunctionMap, NativeFn, Value};
use std::sync::Arc;
use std::time::Duration;

pub fn register_natives(natives: &mut FunctionMap) {
    let functions: [(&str, i32, NativeFn); 15] = [
        ("print", 1, native_print),
        ("print", -1, native_print),
        ("len", 1, native_len),
        ("typeOf", 1, native_type_of),
        ("sleep", 1, native_sleep),
        ("eval", 1, native_eval),
        ("run", 1, native_run),
        ("stop", 0, native_stop),
        ("runThreaded", 1, native_run_threaded),
        ("runThreaded", 2, native_run_threaded),
        ("isMain", 0, native_is_main),
        ("debug", 1, native_debug),
        ("range", 1, native_range),
        ("range", 2, native_range),
        ("str", 1, native_str),
    ];
    for (name, arity, function) in functions {
        natives.insert(Arc::new(Function::native(name, arity, function)));
    }
}

/// print(values...) - one line, values separated by spaces
fn native_print(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(interp.stringify(arg)?);
    }
    interp.sink().print(&parts.join(" "));
    Ok(Value::Null)
}

fn native_len(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let length = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.read().len(),
        Value::Map(map) => map.read().len(),
        other => {
            return match interp.try_call_method(other, "length", Vec::new())? {
                Some(length) => Ok(length),
                None => Err(runtime_error(
                    ErrorKind::TypeError,
                    format!("Value of type {} has no length", interp.type_name(other)),
                )),
            };
        }
    };
    Ok(Value::Number(length as f64))
}

fn native_type_of(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    Ok(Value::string(interp.type_name(&args[0])))
}

fn native_str(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    Ok(Value::string(interp.stringify(&args[0])?))
}

/// sleep(ms) - interrupted by a stop request
fn native_sleep(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let ms = get_number_arg(interp, &args[0], "milliseconds")?.max(0.0);
    interp
        .thread()
        .sleep(Duration::from_millis(ms as u64), interp.stop_suppressed())?;
    Ok(Value::Null)
}

/// eval(code) - run code in a fresh global scope; a compile error is
/// catchable
fn native_eval(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let code = get_string_arg(interp, &args[0], "code")?;
    let mut child = interp.child("<eval>");
    if let Err(error) = child.compile(&code, "<eval>") {
        return Err(runtime_error(ErrorKind::CompileError, error.summary()));
    }
    child.run_program()
}

/// run(path) - execute another script file like `eval`
fn native_run(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let path = get_string_arg(interp, &args[0], "path")?;
    let source = std::fs::read_to_string(&path).map_err(|error| {
        runtime_error(
            ErrorKind::RuntimeError,
            format!("Cannot read script '{}': {}", path, error),
        )
    })?;
    tracing::debug!(path = %path, "running script file");
    let mut child = interp.child(&path);
    if let Err(error) = child.compile(&source, &path) {
        return Err(runtime_error(ErrorKind::CompileError, error.summary()));
    }
    child.run_program()
}

/// stop() - stop every thread of the script, this one included
fn native_stop(_args: &[Value], interp: &mut Interpreter) -> EvalResult {
    tracing::debug!(thread = %interp.thread().name(), "script stop requested");
    interp.threads().stop_all();
    interp.check_alive()?;
    Ok(Value::Null)
}

/// runThreaded(fun) / runThreaded(name, fun)
fn native_run_threaded(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let (name, function) = match args {
        [function] => (None, function),
        [name, function] => (Some(get_string_arg(interp, name, "thread name")?), function),
        _ => return Ok(Value::Null),
    };
    let function = get_function_arg(interp, function, "thread body")?;
    let thread = interp.spawn_thread(name, function, Vec::new())?;
    Ok(Value::Thread(thread))
}

fn native_is_main(_args: &[Value], interp: &mut Interpreter) -> EvalResult {
    Ok(Value::Boolean(interp.is_main_thread()))
}

/// debug(value) - only printed when debugging is enabled
fn native_debug(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    if interp.config().debug {
        let text = interp.stringify(&args[0])?;
        interp.sink().debug(&text);
    }
    Ok(Value::Null)
}

/// range(end) / range(start, end) - whole numbers, end excluded
fn native_range(args: &[Value], interp: &mut Interpreter) -> EvalResult {
    let (start, end) = match args {
        [end] => (0.0, get_number_arg(interp, end, "end")?),
        [start, end] => (
            get_number_arg(interp, start, "start")?,
            get_number_arg(interp, end, "end")?,
        ),
        _ => return Ok(Value::list(Vec::new())),
    };
    let mut items = Vec::new();
    let mut n = start;
    while n < end {
        items.push(Value::Number(n));
        n += 1.0;
    }
    Ok(Value::list(items))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::interpreter::Interpreter;
    use crate::runtime::{BufferSink, Value};
    use std::sync::Arc;

    fn with_sink(config: Config) -> (Interpreter, Arc<BufferSink>) {
        let sink = Arc::new(BufferSink::new());
        let interp = Interpreter::builder().config(config).sink(sink.clone()).build();
        (interp, sink)
    }

    #[test]
    fn test_print_joins_arguments() {
        let (mut interp, sink) = with_sink(Config::default());
        interp.run_source("print(\"a\", 1, true); print([1, 2]);", "test.sbl").unwrap();
        assert_eq!(sink.lines(), vec!["a 1 true".to_string(), "[1, 2]".to_string()]);
    }

    #[test]
    fn test_len_and_type_of() {
        let (mut interp, _) = with_sink(Config::default());
        let value = interp
            .run_source("typeOf(len(\"héllo\")) + len([1, 2, 3]) + len({\"a\": 1});", "test.sbl")
            .unwrap();
        assert_eq!(value.as_str(), Some("Number31"));
    }

    #[test]
    fn test_eval_does_not_leak_locals() {
        let (mut interp, _) = with_sink(Config::default());
        let value = interp.run_source("eval(\"local hidden = 2; hidden * 21;\");", "test.sbl").unwrap();
        assert_eq!(value.as_number(), Some(42.0));
        let error = interp.run_source("hidden;", "test.sbl").unwrap_err();
        assert_eq!(error.kind, ErrorKind::NameError);
    }

    #[test]
    fn test_eval_compile_error_is_catchable() {
        let (mut interp, _) = with_sink(Config::default());
        let value = interp
            .run_source("local ok = false; try { eval(\"local = ;\"); } catch (e: CompileError) { ok = true; } ok;", "test.sbl")
            .unwrap();
        assert!(matches!(value, Value::Boolean(true)));
    }

    #[test]
    fn test_debug_only_prints_when_enabled() {
        let (mut quiet, quiet_sink) = with_sink(Config::default());
        quiet.run_source("debug(\"x\");", "test.sbl").unwrap();
        assert!(quiet_sink.lines().is_empty());

        let config = Config {
            debug: true,
            ..Config::default()
        };
        let (mut loud, loud_sink) = with_sink(config);
        loud.run_source("debug(\"x\");", "test.sbl").unwrap();
        assert_eq!(loud_sink.lines(), vec!["[debug] x".to_string()]);
    }

    #[test]
    fn test_range() {
        let (mut interp, _) = with_sink(Config::default());
        let value = interp.run_source("local total = 0; foreach (i : range(2, 5)) { total += i; } total + len(range(3));", "test.sbl").unwrap();
        assert_eq!(value.as_number(), Some(12.0));
    }

    #[test]
    fn test_stop_ends_script_quietly() {
        let (mut interp, sink) = with_sink(Config::default());
        let value = interp.run_source("print(1); stop(); print(2);", "test.sbl").unwrap();
        assert!(value.is_null());
        assert_eq!(sink.lines(), vec!["1".to_string()]);
    }
}
