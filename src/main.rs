use bracc::analysis::{AnalysisOptions, BranchTyping};
use bracc::compile::CompileError;
use bracc::dump::TreeDump;
use bracc::error::SourceFile;
use bracc::vm::Machine;
use structopt::StructOpt;

use tracing_subscriber::fmt;

fn main() {
    if let Err(ref e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), anyhow::Error> {
    use std::fs;

    let opt = Opt::from_args();

    if let Some((_, filter)) = std::env::vars().find(|x| x.0 == "BRACC_TRACE") {
        fmt::Subscriber::builder()
            .with_ansi(true)
            .pretty()
            .with_env_filter(filter)
            .init();
    }

    let filename = opt.file;
    let file = fs::read_to_string(&filename)?;
    let out_file = opt.output.unwrap_or_else(|| filename.with_extension("bin"));
    let meta = SourceFile::new(&file).with_file(filename);
    let options = AnalysisOptions {
        ternary_branches: opt.ternary_branches,
    };

    let analysis = bracc::compile::analyze(&meta, options)?;
    log::debug!(
        "analyzed {} statements, {} locals",
        analysis.program.body.len(),
        analysis.max_locals
    );

    if opt.dump {
        print!("{}", TreeDump::program(&analysis.program));
    }

    let module = match bracc::compile::generate(&analysis) {
        Ok(module) => module,
        // all of them, not only the first one
        Err(CompileError::Semantic(diagnostics)) => {
            anyhow::bail!("{}", diagnostics)
        }
        Err(e) => return Err(e.into()),
    };

    let bytes = module.encode();
    log::debug!("writing {} bytes to {}", bytes.len(), out_file.display());
    fs::write(&out_file, bytes)?;

    if opt.disassemble {
        print!("{}", module.disassemble()?);
    }

    if opt.run {
        for line in Machine::new().run(&module)? {
            println!("{}", line);
        }
    }

    Ok(())
}

#[derive(Debug, StructOpt)]
struct Opt {
    /// The file to compile
    #[structopt(parse(from_os_str))]
    file: std::path::PathBuf,
    /// The (optional) output file, `<file>.bin` by default
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output: Option<std::path::PathBuf>,
    /// Print the analyzed syntax tree
    #[structopt(long)]
    dump: bool,
    /// Print the generated code
    #[structopt(long)]
    disassemble: bool,
    /// Execute the program after compiling it
    #[structopt(long)]
    run: bool,
    /// How the branches of `c ? a : b` are typed: `identical` or `promote`
    #[structopt(long, default_value = "identical")]
    ternary_branches: BranchTyping,
}
