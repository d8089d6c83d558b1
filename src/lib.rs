//! sledopyt - сканер краш-логов для модифицированных игр Bethesda
//!
//! Берёт текстовые дампы краш-логгера (Buffout), режет их на сегменты,
//! сверяет с курируемым рулсетом известных сигнатур крашей и собирает
//! человекочитаемый отчёт по каждому логу.

pub mod config_audit;
pub mod paths;
pub mod ruleset;
pub mod scanner;

use log::info;
use sledopyt_core::{LogReport, Result, ScanStats};
use sledopyt_db::FormDatabase;
use std::path::PathBuf;

use ruleset::Ruleset;
use scanner::ScanSession;

/// Параметры одной сессии сканирования
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Папки с краш-логами
    pub log_dirs: Vec<PathBuf>,
    /// Путь к файлу рулсета
    pub ruleset_path: PathBuf,
    /// Явный файл порядка загрузки (опционально)
    pub loadorder_path: Option<PathBuf>,
    /// Источники базы FormID
    pub formid_sources: Vec<PathBuf>,
    /// Подставлять описания FormID из базы
    pub show_formid_values: bool,
    /// Папка модов для аудита конфигов (опционально)
    pub mods_dir: Option<PathBuf>,
    /// Экзешник игры для проверки целостности (опционально)
    pub game_exe: Option<PathBuf>,
}

/// Итог сессии сканирования
#[derive(Debug)]
pub struct ScanOutcome {
    /// Отчёты по каждому логу
    pub reports: Vec<LogReport>,
    /// Сводная статистика
    pub stats: ScanStats,
    /// Объединённый текстовый артефакт
    pub combined_report: String,
    /// Фрагменты аудита конфигов (пусто, если папка модов не задана)
    pub audit_fragments: Vec<String>,
}

/// Прогнать полную сессию: загрузка рулсета, поиск логов,
/// параллельный анализ, аудит конфигов, сборка общего артефакта.
pub fn run_scan(opts: &ScanOptions) -> Result<ScanOutcome> {
    let ruleset = Ruleset::load(&opts.ruleset_path)?;
    info!(
        "✨ Ruleset loaded: {} error suspects, {} stack suspects",
        ruleset.error_suspects.len(),
        ruleset.stack_suspects.len()
    );

    // Без явных источников пробуем стандартные базы рядом с рулсетом
    let formid_sources = if opts.formid_sources.is_empty() {
        let data_dir = opts
            .ruleset_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        sledopyt_db::default_sources(&data_dir, &ruleset.game.name)
    } else {
        opts.formid_sources.clone()
    };
    let formdb = FormDatabase::open(ruleset.game.formdb_table.clone(), &formid_sources);
    if opts.show_formid_values && !formdb.has_sources() {
        info!("❔ FormID value lookup requested, but no database sources were found");
    }

    let log_paths = paths::discover_crash_logs(&opts.log_dirs);
    info!("📍 Discovered {} crash logs", log_paths.len());

    let mut session = ScanSession::new(ruleset, formdb);
    session.loadorder_path = opts.loadorder_path.clone();
    session.show_formid_values = opts.show_formid_values;
    session.game_exe = opts.game_exe.clone();
    session.preload_logs(&log_paths);

    let (reports, stats) = scanner::run_session(&session, &log_paths);

    // Аудит конфигов идёт один раз на сессию, независимо от логов
    let audit_fragments = match &opts.mods_dir {
        Some(dir) => config_audit::audit_configs(dir),
        None => Vec::new(),
    };

    let combined_report = build_combined_report(&reports, &stats, &audit_fragments);

    Ok(ScanOutcome {
        reports,
        stats,
        combined_report,
        audit_fragments,
    })
}

fn build_combined_report(
    reports: &[LogReport],
    stats: &ScanStats,
    audit_fragments: &[String],
) -> String {
    let mut out = String::new();
    for report in reports {
        out.push_str(&report.text);
        out.push('\n');
    }
    if !audit_fragments.is_empty() {
        out.push_str("CONFIGURATION AUDIT\n");
        for fragment in audit_fragments {
            out.push_str(fragment);
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "Scanned {} crash logs: {} complete, {} incomplete, {} failed.\n",
        stats.total(),
        stats.scanned,
        stats.incomplete,
        stats.failed
    ));
    out
}
