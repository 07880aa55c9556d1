//! The whole pipeline, from source text to a [`Module`].
use crate::analysis::{analyze_program, Analysis, AnalysisOptions, Diagnostics};
use crate::ast::Program;
use crate::codegen::{self, CodegenError, Module};
use crate::error::SourceFile;
use crate::grammar::{ParseError, Parser};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Semantic(Diagnostics),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

pub fn parse_source(source: &SourceFile) -> Result<Program, ParseError> {
    Parser::new(source).parse_program()
}

/// Parses and analyzes `source`. Semantic errors don't stop the analysis:
/// they are all collected in the returned [`Analysis`].
pub fn analyze(source: &SourceFile, options: AnalysisOptions) -> Result<Analysis, ParseError> {
    Ok(analyze_program(parse_source(source)?, options))
}

/// Generates code for an analysis that found no errors.
pub fn generate(analysis: &Analysis) -> Result<Module, CompileError> {
    if !analysis.diagnostics.is_empty() {
        return Err(CompileError::Semantic(analysis.diagnostics.clone()));
    }
    Ok(codegen::generate(&analysis.program, analysis.max_locals)?)
}

pub fn compile_source(source: &SourceFile, options: AnalysisOptions) -> Result<Module, CompileError> {
    let analysis = analyze(source, options)?;
    generate(&analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BranchTyping, SemanticErrorKind};
    use crate::types::Type;
    use crate::vm::Machine;

    fn run_with(input: &str, options: AnalysisOptions) -> Vec<String> {
        let source = SourceFile::new(input);
        let module = compile_source(&source, options).unwrap_or_else(|e| panic!("{}", e));
        // what runs must survive the trip through the binary format
        let module = Module::decode(&module.encode()).unwrap();
        Machine::new().run(&module).unwrap()
    }

    fn run(input: &str) -> Vec<String> {
        run_with(input, AnalysisOptions::default())
    }

    fn errors(input: &str) -> Vec<(usize, SemanticErrorKind)> {
        let source = SourceFile::new(input);
        match compile_source(&source, AnalysisOptions::default()) {
            Err(CompileError::Semantic(diagnostics)) => diagnostics
                .iter()
                .map(|d| (d.line, d.kind.clone()))
                .collect(),
            other => panic!("expected semantic errors, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn arithmetic_promotion_follows_the_left_operand() {
        assert_eq!(
            run("print(7 / 2.0); print(7.0 / 2); print(1 + 2.9); print(2.5 * 2);"),
            ["3", "3.5", "3", "5.0"]
        );
        assert_eq!(run("int a = 5; double b = 2.0; print(b % a);"), ["2.0"]);
    }

    #[test]
    fn bitwise_operators_only_take_ints() {
        assert_eq!(run("print(6 & 3); print(6 | 3); print(6 ^ 3);"), ["2", "7", "5"]);
        assert_eq!(
            errors("int a = 1;\nprint(a & 2.0);\nprint(true | false);"),
            [
                (
                    2,
                    SemanticErrorKind::TypeMismatch {
                        expected: Type::Int,
                        found: Type::Double
                    }
                ),
                (
                    3,
                    SemanticErrorKind::TypeMismatch {
                        expected: Type::Int,
                        found: Type::Boolean
                    }
                ),
                (
                    3,
                    SemanticErrorKind::TypeMismatch {
                        expected: Type::Int,
                        found: Type::Boolean
                    }
                ),
            ]
        );
    }

    #[test]
    fn strings_concatenate_with_anything() {
        assert_eq!(
            run("String s = \"n=\"; int n = 4; print(s + n); print(1.5 + \"!\");"),
            ["n=4", "1.5!"]
        );
        assert_eq!(run("print(1 + 2 + \"x\" + 1 + 2);"), ["3x12"]);
    }

    #[test]
    fn ternary_evaluates_exactly_one_branch() {
        let program = "\
            int t = 0; int f = 0;
            int r = true ? (t = t + 1) : (f = f + 1);
            print(r); print(t); print(f);
            r = false ? (t = t + 1) : (f = f + 10);
            print(r); print(t); print(f);";
        assert_eq!(run(program), ["1", "1", "0", "10", "1", "10"]);
    }

    #[test]
    fn ternary_on_runtime_conditions_evaluates_one_branch() {
        for (c, expected) in [("true", ["1", "1", "0"]), ("false", ["-1", "0", "1"])] {
            let program = format!(
                "boolean c = {}; int t = 0; int f = 0;
                 int r = c ? (t = t + 1) : -(f = f + 1);
                 print(r); print(t); print(f);",
                c
            );
            assert_eq!(run(&program), expected, "c = {}", c);
        }
        let program = "\
            int t = 0; int f = 0;
            for (int i = 0; i < 4; i = i + 1) i < 1 ? (t = t + 1) : (f = f + 1);
            print(t); print(f);";
        assert_eq!(run(program), ["1", "3"]);
    }

    #[test]
    fn concatenation_needs_values_on_both_sides() {
        assert_eq!(
            errors("boolean b = true;\nString s = \"a\" + (b ? 1);\nprint(s);"),
            [(2, SemanticErrorKind::NoValue)]
        );
    }

    #[test]
    fn ternary_with_promoted_branches() {
        let options = AnalysisOptions {
            ternary_branches: BranchTyping::Promote,
        };
        assert_eq!(
            run_with("boolean c = false; print(c ? 1.5 : 2); print(!c ? 1.5 : 2);", options),
            ["2.0", "1.5"]
        );
        assert_eq!(
            errors("print(true ? 1.5 : 2);"),
            [(
                1,
                SemanticErrorKind::BranchTypeMismatch {
                    value_true: Type::Double,
                    value_false: Type::Int
                }
            )]
        );
    }

    #[test]
    fn ternary_without_false_branch_is_a_statement() {
        assert_eq!(run("int a = 0; a > 0 ? (a = 5); print(a); a == 0 ? (a = 7); print(a);"), ["0", "7"]);
    }

    #[test]
    fn do_while_runs_its_body_at_least_once() {
        for n in 1..4 {
            let program = format!("int i = 0; do i = i + 1; while (i < {});\nprint(i);", n);
            assert_eq!(run(&program), [n.to_string()]);
        }
        assert_eq!(run("int i = 10; do { i = i + 1; } while (false); print(i);"), ["11"]);
    }

    #[test]
    fn for_loop_counts() {
        assert_eq!(run("for (int i = 0; i < 3; i = i + 1) print(i);"), ["0", "1", "2"]);
        assert_eq!(
            run("int i; int j; for (i = 0, j = 10; i < j; i = i + 1, j = j - 3) print(i + \",\" + j);"),
            ["0,10", "1,7", "2,4"]
        );
    }

    #[test]
    fn short_circuit_skips_the_right_side() {
        assert_eq!(
            run("int n = 0; boolean b = false && (n = 1) == 1; print(b); print(n); b = true || (n = 2) == 2; print(b); print(n);"),
            ["0", "0", "1", "0"]
        );
    }

    #[test]
    fn double_comparisons_with_nan() {
        assert_eq!(
            run("double nan = 0.0 / 0.0; print(nan < 1.0); print(nan > 1.0); print(nan == nan); print(nan != nan); print(1.0 <= 2.0);"),
            ["0", "0", "0", "1", "1"]
        );
    }

    #[test]
    fn endless_loop_without_condition() {
        let source = SourceFile::new("int i = 0; for (;;) i = i + 1;");
        let module = compile_source(&source, AnalysisOptions::default()).unwrap();
        assert!(Machine::new().with_step_limit(1_000).run(&module).is_err());
    }

    #[test]
    fn errors_stop_code_generation() {
        let source = SourceFile::new("int a = 1;\nint a = 2;\nprint(b);");
        let err = compile_source(&source, AnalysisOptions::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "2: error: variable `a` is already defined in this scope\n\
             3: error: cannot find variable `b` in this scope\n\
             2 error(s)"
        );
    }

    #[test]
    fn parse_errors_come_first() {
        let source = SourceFile::new("print(1)");
        assert!(matches!(
            compile_source(&source, AnalysisOptions::default()),
            Err(CompileError::Parse(_))
        ));
    }
}
