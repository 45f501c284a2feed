use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use multi_rename_core::{
    app_paths, collect_files, load_config, save_config, validate_plan, validate_template,
    AppConfig, BatchError, FileEntry, FsProbe, FsRenamer, NamingMode, NamingPolicy, RenamePlan,
    RenameSession, ScanOptions, SortOrder,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "multi-rename-cli")]
#[command(about = "複数ファイルを連番やテンプレートで一括リネームします")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Rename(RenameArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init {
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Debug, Args)]
struct RenameArgs {
    paths: Vec<PathBuf>,
    #[arg(long)]
    dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    recursive: bool,
    #[arg(long, default_value_t = false)]
    include_hidden: bool,
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    #[arg(long)]
    template: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    start: Option<i64>,
    #[arg(long, value_enum)]
    sort: Option<SortKey>,
    #[arg(long, default_value_t = false)]
    desc: bool,
    #[arg(long, default_value_t = false)]
    keep_order: bool,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    SerialOnly,
    SerialPrefix,
    SerialSuffix,
    Custom,
}

impl From<ModeArg> for NamingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::SerialOnly => NamingMode::SerialOnly,
            ModeArg::SerialPrefix => NamingMode::SerialPrefix,
            ModeArg::SerialSuffix => NamingMode::SerialSuffix,
            ModeArg::Custom => NamingMode::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortKey {
    Original,
    Target,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Rename(args) => cmd_rename(args),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Init { force } => cmd_config_init(force),
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_rename(args: RenameArgs) -> Result<()> {
    let config = load_config()?;
    let mode = args.mode.map(NamingMode::from).unwrap_or(config.mode);
    let template = args.template.clone().unwrap_or_else(|| config.template.clone());
    let policy = NamingPolicy::from_mode(mode, &template);
    if let NamingPolicy::Custom(template) = &policy {
        validate_template(template)?;
    }

    let mut session = RenameSession::new(policy, args.start.unwrap_or(config.start_number))
        .with_extensions(&config.extensions);

    let mut paths = args.paths.clone();
    if let Some(dir) = &args.dir {
        let options = ScanOptions {
            recursive: args.recursive || config.recursive_default,
            include_hidden: args.include_hidden || config.include_hidden_default,
            extensions: config.extensions.clone(),
        };
        let (files, stats) = collect_files(dir, &options)?;
        info!(
            scanned = stats.scanned_files,
            matched = stats.matched_files,
            skipped_unsupported = stats.skipped_unsupported,
            skipped_hidden = stats.skipped_hidden,
            "フォルダを走査しました"
        );
        paths.extend(files);
    }

    let requested = paths.len();
    let added = if args.keep_order {
        add_in_given_order(&mut session, paths)
    } else {
        session.add_paths(paths)
    };
    if added < requested {
        eprintln!("未対応の拡張子のため {}件を除外しました", requested - added);
    }
    if session.is_empty() {
        anyhow::bail!("リネーム対象のファイルがありません");
    }

    let now = Local::now();
    let order = if args.desc {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    };
    match args.sort {
        Some(SortKey::Original) => session.sort_by_original(order),
        Some(SortKey::Target) => session.sort_by_target(order, &now)?,
        None => {}
    }

    let plan = session.preview(&now)?.clone();
    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Table => print_table(&plan),
    }

    if !args.apply {
        validate_plan(&plan, &FsProbe)?;
        eprintln!("dry-runモード: 実ファイルは変更していません。適用するには --apply を指定してください。");
        return Ok(());
    }

    match session.apply(&now, &FsProbe, &mut FsRenamer) {
        Ok(outcome) => {
            eprintln!(
                "適用完了: {}件 (変更なし {}件)",
                outcome.result.applied, outcome.result.unchanged
            );
            Ok(())
        }
        Err(BatchError::Rename(err)) => {
            eprintln!(
                "{}件をリネームした後に失敗しました。残り {}件は未処理です。",
                err.completed(),
                session.len()
            );
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn add_in_given_order(session: &mut RenameSession, paths: Vec<PathBuf>) -> usize {
    let mut added = 0usize;
    for path in paths {
        let entry = FileEntry::new(path);
        if session.accepts(&entry) {
            session.insert(session.len(), entry);
            added += 1;
        }
    }
    added
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let paths = app_paths()?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_config_init(force: bool) -> Result<()> {
    let paths = app_paths()?;
    if paths.config_path.exists() && !force {
        anyhow::bail!(
            "設定ファイルはすでに存在します: {} (上書きするには --force)",
            paths.config_path.display()
        );
    }
    save_config(&AppConfig::default())?;
    println!("設定ファイルを作成しました: {}", paths.config_path.display());
    Ok(())
}

fn print_table(plan: &RenamePlan) {
    println!("元ファイル -> 新ファイル");
    for rename in plan.iter() {
        println!(
            "{} -> {}",
            rename.source.path().display(),
            rename.target_path().display()
        );
    }
    let changed = plan.iter().filter(|r| r.changed()).count();
    println!(
        "\n集計: planned={} changed={} unchanged={}",
        plan.len(),
        changed,
        plan.len() - changed
    );
}
