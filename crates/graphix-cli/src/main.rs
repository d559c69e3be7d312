use std::{env, fs, path::Path, process::ExitCode};

use graphix::Interpreter;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: graphix <ast-json-file> [result-output-file]");
        return ExitCode::FAILURE;
    }
    let ast_path = &args[1];
    let text = match fs::read_to_string(ast_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("error: cannot read {ast_path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut interpreter = Interpreter::standard();
    let outcome = match interpreter.interpret_str(&text) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let summary = format!(
        "GraphixLang interpreter executed successfully with {} operations",
        outcome.operations
    );
    println!("{summary}");

    if let Some(result_path) = args.get(2)
        && let Err(err) = write_result(Path::new(result_path), &summary)
    {
        eprintln!("error: cannot write {result_path}: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn write_result(path: &Path, summary: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let body = serde_json::json!({ "result": summary });
    fs::write(path, body.to_string())
}
