use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::language::Language;

#[derive(Debug, Parser)]
#[command(
    name = "codevec",
    about = "Flatten, normalize and embed source repositories into a searchable vector index"
)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy source files from every repository under ROOT into one directory
    Flatten(FlattenArgs),
    /// Normalize an already flattened directory in place
    Normalize(NormalizeArgs),
    /// Run the whole pipeline and write the index
    Build(BuildArgs),
    /// Embed a snippet and search the index for similar files
    Query(QueryArgs),
    /// Find the files closest to an indexed file
    Neighbors(NeighborsArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Flatten --

#[derive(Debug, Parser)]
pub struct FlattenArgs {
    /// Directory whose subdirectories are repositories
    pub root: PathBuf,

    /// Working directory (default: ROOT/codefiles)
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Accepted extensions, replacing the configured list
    #[arg(long = "ext", num_args = 1..)]
    pub extensions: Vec<String>,
}

// -- Normalize --

#[derive(Debug, Parser)]
pub struct NormalizeArgs {
    /// Flat working directory
    pub dir: PathBuf,
}

// -- Build --

#[derive(Debug, Parser)]
pub struct BuildArgs {
    /// Directory whose subdirectories are repositories
    pub root: PathBuf,

    /// Working directory (default: ROOT/codefiles)
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Artifact directory (default: $CODEVEC_EMBEDDINGS_DIR or ./embeddings)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Accepted extensions, replacing the configured list
    #[arg(long = "ext", num_args = 1..)]
    pub extensions: Vec<String>,

    /// ColBERT model ID or local model path
    #[arg(long)]
    pub model: Option<String>,

    /// Documents per embedding call
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Token budget per document
    #[arg(long)]
    pub max_length: Option<usize>,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Code snippet to search for
    pub text: String,

    /// Normalize the snippet as this language (name or extension, e.g.
    /// `python` or `.py`) before embedding
    #[arg(long)]
    pub lang: Option<Language>,

    /// Artifact directory (default: $CODEVEC_EMBEDDINGS_DIR or ./embeddings)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// ColBERT model ID or local model path
    #[arg(long)]
    pub model: Option<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Neighbors --

#[derive(Debug, Parser)]
pub struct NeighborsArgs {
    /// Flat name of an indexed file
    pub file_name: String,

    /// Artifact directory (default: $CODEVEC_EMBEDDINGS_DIR or ./embeddings)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "codevec",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_build() {
        let cli = Cli::parse_from([
            "codevec",
            "build",
            "repos",
            "--batch-size",
            "8",
            "--ext",
            ".py",
            ".c",
        ]);
        match cli.command {
            Command::Build(args) => {
                assert_eq!(args.root, PathBuf::from("repos"));
                assert_eq!(args.batch_size, Some(8));
                assert_eq!(args.max_length, None);
                assert_eq!(args.extensions, vec![".py", ".c"]);
                assert!(args.dest.is_none());
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn parse_query_defaults() {
        let cli = Cli::parse_from(["codevec", "query", "int main()"]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.text, "int main()");
                assert_eq!(args.count, 10);
                assert!(!args.json);
                assert!(args.out.is_none());
                assert!(args.lang.is_none());
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn parse_query_language() {
        let cli =
            Cli::parse_from(["codevec", "query", "x = 1  # c", "--lang", ".py"]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.lang, Some(Language::Python));
            }
            _ => panic!("expected query command"),
        }
        assert!(
            Cli::try_parse_from(["codevec", "query", "x", "--lang", "cobol"])
                .is_err()
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "codevec",
            "neighbors",
            "util_1.py",
            "-vv",
            "--config",
            "codevec.json",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("codevec.json")));
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        assert!(
            Cli::try_parse_from(["codevec", "-q", "-v", "normalize", "d"])
                .is_err()
        );
    }
}
