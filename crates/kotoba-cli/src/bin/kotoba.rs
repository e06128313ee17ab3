use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use kotoba_cli::commands::lexicon_ops::DiversifyArgs;
use kotoba_cli::commands::{config_ops, learn_ops, lexicon_ops, LexiconSource};
use kotoba_cli::trace_init;

#[derive(Parser)]
#[command(name = "kotoba", about = "Japanese lexicon, relation learning and diversification tool")]
struct Cli {
    /// Write JSON trace lines to this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    /// Custom settings TOML (see `settings-export`)
    #[arg(long, global = true)]
    settings: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct SourceOpts {
    /// Lexicon cache directory written by `ingest`
    #[arg(long)]
    cache: Option<String>,
    /// Raw JMdict-style dictionary file
    #[arg(long)]
    source: Option<String>,
}

impl From<SourceOpts> for LexiconSource {
    fn from(o: SourceOpts) -> Self {
        LexiconSource {
            cache_dir: o.cache,
            source: o.source,
        }
    }
}

#[derive(Args)]
struct UserOpts {
    /// Directory holding per-user relation files
    #[arg(long, default_value = "kotoba-data")]
    data_dir: String,
    /// User id
    #[arg(long, short)]
    user: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a raw dictionary under memory bounds and write the sharded cache
    Ingest {
        /// Raw dictionary file
        source_file: String,
        /// Output cache directory
        cache_dir: String,
        /// Memory budget in MB
        #[arg(long)]
        memory_budget_mb: Option<usize>,
        /// Maximum number of entries
        #[arg(long)]
        max_entries: Option<usize>,
        /// Strengthen the synonym graph before writing
        #[arg(long)]
        enhance: bool,
    },
    /// Show cache metadata and check that it loads
    Info {
        /// Cache directory
        cache_dir: String,
    },
    /// Show a dictionary entry
    Lookup {
        #[command(flatten)]
        src: SourceOpts,
        word: String,
    },
    /// List ranked synonyms of a word
    Synonyms {
        #[command(flatten)]
        src: SourceOpts,
        word: String,
        /// Number of synonyms
        #[arg(short, long, default_value = "10")]
        n: usize,
        /// Strengthen the graph first
        #[arg(long)]
        enhance: bool,
    },
    /// Rewrite text with synonym substitution and phrase variation
    Diversify {
        #[command(flatten)]
        src: SourceOpts,
        text: String,
        /// Target register: formal, neutral or casual
        #[arg(long)]
        register: Option<String>,
        /// Fixed random seed
        #[arg(long)]
        seed: Option<u64>,
        /// Strengthen the graph first
        #[arg(long)]
        enhance: bool,
        /// Rank with this user's learned relations
        #[arg(long, short)]
        user: Option<String>,
        /// Directory holding per-user relation files
        #[arg(long, default_value = "kotoba-data")]
        data_dir: String,
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Learn term relations from one conversation turn
    Learn {
        #[command(flatten)]
        src: SourceOpts,
        #[command(flatten)]
        user: UserOpts,
        /// User message
        input: String,
        /// Response text
        response: String,
        /// Earlier messages of the conversation
        #[arg(long)]
        history: Vec<String>,
    },
    /// Rate a term in context (0.0 = bad, 1.0 = good)
    Feedback {
        #[command(flatten)]
        src: SourceOpts,
        #[command(flatten)]
        user: UserOpts,
        term: String,
        rating: f32,
        /// Text the term appeared in
        context: String,
    },
    /// Show a user's learned relations (statistics if no term is given)
    Relations {
        #[command(flatten)]
        src: SourceOpts,
        #[command(flatten)]
        user: UserOpts,
        term: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Apply time decay to a user's relations and save
    Decay {
        #[command(flatten)]
        src: SourceOpts,
        #[command(flatten)]
        user: UserOpts,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let _trace_guard = trace_init::init_tracing(cli.log_dir.as_deref());
    if let Some(file) = &cli.settings {
        config_ops::load_settings(file);
    }

    match cli.command {
        Command::Ingest {
            source_file,
            cache_dir,
            memory_budget_mb,
            max_entries,
            enhance,
        } => lexicon_ops::ingest(
            &source_file,
            &cache_dir,
            memory_budget_mb,
            max_entries,
            enhance,
        ),
        Command::Info { cache_dir } => lexicon_ops::info(&cache_dir),
        Command::Lookup { src, word } => lexicon_ops::lookup(&src.into(), &word),
        Command::Synonyms {
            src,
            word,
            n,
            enhance,
        } => lexicon_ops::synonyms(&src.into(), &word, n, enhance),
        Command::Diversify {
            src,
            text,
            register,
            seed,
            enhance,
            user,
            data_dir,
            json,
        } => lexicon_ops::diversify(
            &src.into(),
            DiversifyArgs {
                text: &text,
                register: register.as_deref(),
                seed,
                enhance,
                user: user.as_deref().map(|u| (data_dir.as_str(), u)),
                json,
            },
        ),
        Command::Learn {
            src,
            user,
            input,
            response,
            history,
        } => learn_ops::learn(
            &src.into(),
            &user.data_dir,
            &user.user,
            &input,
            &history,
            &response,
        ),
        Command::Feedback {
            src,
            user,
            term,
            rating,
            context,
        } => learn_ops::feedback(
            &src.into(),
            &user.data_dir,
            &user.user,
            &term,
            rating,
            &context,
        ),
        Command::Relations {
            src,
            user,
            term,
            json,
        } => learn_ops::relations(&src.into(), &user.data_dir, &user.user, term.as_deref(), json),
        Command::Decay { src, user } => learn_ops::decay(&src.into(), &user.data_dir, &user.user),
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
