use std::env;
use std::fs;
use std::time::Instant;

use clonk::errors::{self, Diagnostics};
use clonk::ir;
use clonk::parser;

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Ast,
    Check,
    Ir,
    Isel,
}

struct Cli {
    mode: Mode,
    benchmark: bool,
    output_path: Option<String>,
    source_path: String,
}

fn run() -> Result<(), String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let cli = parse_cli(&args)?;

    let source = fs::read_to_string(&cli.source_path)
        .map_err(|err| format!("failed to read '{}': {}", cli.source_path, err))?;

    let parse_start = Instant::now();
    let (program, diagnostics) = parser::parse(&source);
    let parse_time = parse_start.elapsed();
    if cli.benchmark {
        eprintln!("parse time: {:.6}s", parse_time.as_secs_f64());
    }

    let mut output = String::new();
    match cli.mode {
        Mode::Ast => output = program.to_string(),
        Mode::Check => {}
        Mode::Ir => {
            // IR is only built and printed for diagnostic-free programs.
            if !diagnostics.is_error() {
                let lower_start = Instant::now();
                let module = ir::builder::lower_program(&program);
                let lower_time = lower_start.elapsed();
                if cli.benchmark {
                    eprintln!("ssa construction time: {:.6}s", lower_time.as_secs_f64());
                }
                if let Err(err) = ir::verify(&module) {
                    return Err(format!("internal error: {}", err));
                }
                output = module.to_string();
            }
        }
        Mode::Isel => {
            return Err("instruction selection (-s) is not implemented yet".to_string());
        }
    }

    if !output.is_empty() {
        match &cli.output_path {
            Some(path) => fs::write(path, &output)
                .map_err(|err| format!("failed to write '{}': {}", path, err))?,
            None => print!("{}", output),
        }
    }

    report_diagnostics(&source, &diagnostics)
}

fn report_diagnostics(source: &str, diagnostics: &Diagnostics) -> Result<(), String> {
    if !diagnostics.is_error() {
        return Ok(());
    }
    for diagnostic in diagnostics.iter() {
        eprintln!("{}", errors::render(source, diagnostic));
    }
    let count = diagnostics.len();
    Err(format!(
        "{} error{} emitted",
        count,
        if count == 1 { "" } else { "s" }
    ))
}

fn parse_cli(args: &[String]) -> Result<Cli, String> {
    let mut mode: Option<Mode> = None;
    let mut benchmark = false;
    let mut output_path: Option<String> = None;
    let mut source_path: Option<String> = None;

    let mut index = 0;
    while index < args.len() {
        let arg = &args[index];
        match arg.as_str() {
            "-a" => set_mode(&mut mode, Mode::Ast)?,
            "-c" => set_mode(&mut mode, Mode::Check)?,
            "-l" => set_mode(&mut mode, Mode::Ir)?,
            "-s" => set_mode(&mut mode, Mode::Isel)?,
            "-b" => benchmark = true,
            "-o" => {
                index += 1;
                let Some(path) = args.get(index) else {
                    return Err("option '-o' requires an output path".to_string());
                };
                output_path = Some(path.clone());
            }
            _ if arg.starts_with('-') => return Err(usage()),
            _ => {
                if source_path.is_none() {
                    source_path = Some(arg.clone());
                } else {
                    return Err("multiple source files provided".to_string());
                }
            }
        }
        index += 1;
    }

    let Some(mode) = mode else {
        return Err(usage());
    };
    let Some(source_path) = source_path else {
        return Err(usage());
    };

    Ok(Cli {
        mode,
        benchmark,
        output_path,
        source_path,
    })
}

fn set_mode(mode: &mut Option<Mode>, value: Mode) -> Result<(), String> {
    if mode.is_some() {
        return Err(usage());
    }
    *mode = Some(value);
    Ok(())
}

fn usage() -> String {
    [
        "usage: clonk (-a|-c|-l|-s) [-b] [-o OUT] SOURCE",
        "    -a: print the AST as S-expressions",
        "    -c: syntax/semantic check only; the exit status reports errors",
        "    -l: print the SSA IR",
        "    -s: run instruction selection (not implemented)",
        "    -b: print parse and SSA construction times",
        "    -o OUT: write output to OUT instead of stdout",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn cli_requires_exactly_one_mode() {
        assert!(parse_cli(&args(&["main.ck"])).is_err());
        assert!(parse_cli(&args(&["-a", "-c", "main.ck"])).is_err());

        let cli = parse_cli(&args(&["-l", "main.ck"])).expect("cli should parse");
        assert_eq!(cli.mode, Mode::Ir);
        assert_eq!(cli.source_path, "main.ck");
    }

    #[test]
    fn cli_parses_output_and_benchmark_flags() {
        let cli = parse_cli(&args(&["-a", "-b", "-o", "out.txt", "main.ck"]))
            .expect("cli should parse");
        assert_eq!(cli.mode, Mode::Ast);
        assert!(cli.benchmark);
        assert_eq!(cli.output_path.as_deref(), Some("out.txt"));
    }

    #[test]
    fn cli_rejects_dangling_output_flag() {
        assert!(parse_cli(&args(&["-a", "main.ck", "-o"])).is_err());
    }
}
