use anyhow::Context;
use chrono::Local;
use clap::Parser;
use sledopyt::{run_scan, ScanOptions};
use std::path::PathBuf;

/// Сканер краш-логов для модифицированных игр Bethesda
#[derive(Debug, Parser)]
#[command(name = "sledopyt", version, about)]
struct Cli {
    /// Папки с краш-логами (crash-*.log)
    #[arg(required = true)]
    log_dirs: Vec<PathBuf>,

    /// Путь к файлу рулсета
    #[arg(long, default_value = "data/ruleset.toml")]
    ruleset: PathBuf,

    /// Явный файл порядка загрузки (вместо сегмента PLUGINS: из лога)
    #[arg(long)]
    loadorder: Option<PathBuf>,

    /// Файлы базы FormID (можно несколько)
    #[arg(long = "formid-db")]
    formid_dbs: Vec<PathBuf>,

    /// Подставлять описания FormID из базы
    #[arg(long)]
    show_formid_values: bool,

    /// Папка модов для аудита конфигов
    #[arg(long)]
    mods_dir: Option<PathBuf>,

    /// Экзешник игры для проверки целостности
    #[arg(long)]
    game_exe: Option<PathBuf>,

    /// Куда писать объединённый отчёт
    #[arg(short, long, default_value = "sledopyt-report.md")]
    output: PathBuf,

    /// Писать ещё и отдельный <лог>-AUTOSCAN.md рядом с каждым логом
    #[arg(long)]
    per_log_reports: bool,

    /// Подробный лог работы
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let logger = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Err(e) = logger.apply() {
        eprintln!("Failed to initialize logger: {}", e);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let opts = ScanOptions {
        log_dirs: cli.log_dirs,
        ruleset_path: cli.ruleset,
        loadorder_path: cli.loadorder,
        formid_sources: cli.formid_dbs,
        show_formid_values: cli.show_formid_values,
        mods_dir: cli.mods_dir,
        game_exe: cli.game_exe,
    };

    let outcome = run_scan(&opts).context("scan session failed")?;

    std::fs::write(&cli.output, &outcome.combined_report)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    log::info!("📝 Combined report written to {}", cli.output.display());

    if cli.per_log_reports {
        for report in &outcome.reports {
            let log_path = PathBuf::from(&report.path);
            let mut out_path = log_path.clone();
            let stem = log_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "crash".to_string());
            out_path.set_file_name(format!("{}-AUTOSCAN.md", stem));
            if let Err(e) = std::fs::write(&out_path, &report.text) {
                log::warn!("⚠️ Failed to write {}: {}", out_path.display(), e);
            }
        }
    }

    println!(
        "Scanned {} crash logs: {} complete, {} incomplete, {} failed.",
        outcome.stats.total(),
        outcome.stats.scanned,
        outcome.stats.incomplete,
        outcome.stats.failed
    );

    if outcome.stats.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
