//! Движок анализа краш-логов
//!
//! Каждый лог обрабатывается независимо от начала до конца; общие
//! между воркерами только кеш прочитанных логов (read-only после
//! построения), кеш запросов FormID и результат одноразовой проверки
//! файлов игры.

use rayon::prelude::*;

pub mod correlate;
pub mod metadata;
pub mod plugins;
pub mod report;
pub mod segments;
pub mod suspects;

use log::{error, info, warn};
use sha2::{Digest, Sha256};
use sledopyt_core::{LogReport, LogStatus, ScanStats, UNKNOWN};
use sledopyt_db::FormDatabase;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::ruleset::Ruleset;
use report::ReportBuffer;

const SEPARATOR: &str = "====================================================\n";

// Роли сегментов в порядке граничных пар рулсета
// (число пар проверяется при загрузке рулсета)
const SEG_SYSTEM_SPECS: usize = 1;
const SEG_CALL_STACK: usize = 2;
const SEG_PLUGINS: usize = 5;

/// Контекст одной сессии сканирования.
///
/// Создаётся один раз на запуск, раздаётся воркерам по ссылке.
/// Проверка файлов игры - дорогая, поэтому спрятана за OnceLock:
/// считается при первом обращении, дальше все логи получают готовую
/// строку без блокировок.
pub struct ScanSession {
    pub ruleset: Ruleset,
    pub formdb: FormDatabase,

    /// Явный файл порядка загрузки (если есть - сегмент PLUGINS: не парсится)
    pub loadorder_path: Option<PathBuf>,

    /// Подставлять ли описания FormID из базы
    pub show_formid_values: bool,

    /// Путь к экзешнику игры для проверки целостности
    pub game_exe: Option<PathBuf>,

    /// Кеш сырых строк логов, построен до старта воркеров
    log_cache: HashMap<PathBuf, Vec<String>>,

    /// Результат одноразовой проверки файлов игры
    integrity: OnceLock<String>,
}

impl ScanSession {
    pub fn new(ruleset: Ruleset, formdb: FormDatabase) -> Self {
        Self {
            ruleset,
            formdb,
            loadorder_path: None,
            show_formid_values: false,
            game_exe: None,
            log_cache: HashMap::new(),
            integrity: OnceLock::new(),
        }
    }

    /// Прочитать все логи заранее. Нечитаемый лог в кеш не попадает -
    /// его анализ пометит лог как failed, не трогая соседей.
    pub fn preload_logs(&mut self, paths: &[PathBuf]) {
        for path in paths {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
                    self.log_cache.insert(path.clone(), lines);
                }
                Err(e) => {
                    warn!("⚠️ Failed to read crash log {}: {}", path.display(), e);
                }
            }
        }
        info!("📥 Preloaded {} crash logs into cache", self.log_cache.len());
    }

    fn cached_lines(&self, path: &Path) -> Option<&Vec<String>> {
        self.log_cache.get(path)
    }

    /// Одноразовая проверка файлов игры: SHA-256 экзешника против
    /// известных хешей релизов. Выполняется максимум один раз на
    /// сессию, сколько бы логов ни анализировалось параллельно.
    fn integrity_summary(&self) -> &str {
        self.integrity.get_or_init(|| {
            let Some(exe) = &self.game_exe else {
                return "❔ Game folder was not provided, integrity check skipped.\n".to_string();
            };
            let bytes = match std::fs::read(exe) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return format!("⚠️ Failed to read {}: {}\n", exe.display(), e);
                }
            };
            let digest = format!("{:x}", Sha256::digest(&bytes));
            info!("🔍 Game executable hash computed: {}", digest);

            let game = &self.ruleset.game;
            if game.og_exe_hashes.iter().any(|h| h.eq_ignore_ascii_case(&digest)) {
                format!("✔️ {} matches a known original release build.\n", game.exe_name)
            } else if game.ng_exe_hashes.iter().any(|h| h.eq_ignore_ascii_case(&digest)) {
                format!("✔️ {} matches a known next-gen release build.\n", game.exe_name)
            } else {
                format!(
                    "❌ {} does not match any known release build (modified or unsupported version).\n",
                    game.exe_name
                )
            }
        })
    }
}

/// Проанализировать один краш-лог от сегментации до готового отчёта.
/// Порядок фрагментов фиксирован и не зависит от воркера.
pub fn analyze_log(session: &ScanSession, path: &Path) -> LogReport {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let Some(raw_lines) = session.cached_lines(path) else {
        return LogReport {
            path: path.display().to_string(),
            status: LogStatus::Failed,
            text: format!(
                "{}\n❌ Crash log could not be read, analysis skipped.\n",
                file_name
            ),
        };
    };

    let ruleset = &session.ruleset;
    let lines = segments::reformat_log(
        raw_lines,
        &ruleset.exclude_log_lines,
        &ruleset.plugins_marker,
    );

    let mut buf = ReportBuffer::new();
    buf.push(format!(
        "{} | Scanned with sledopyt ({} crash logs ruleset)\n{}",
        file_name, ruleset.game.name, SEPARATOR
    ));

    // Метаданные и сегменты
    let meta = metadata::extract_metadata(&lines, &ruleset.game.name, &ruleset.crashgen.name);
    let segs = segments::extract_segments(&lines, &ruleset.boundaries);
    let system_specs = segs.get(SEG_SYSTEM_SPECS).cloned().unwrap_or_default();
    let callstack = segs.get(SEG_CALL_STACK).cloned().unwrap_or_default();
    let plugin_segment = segs.get(SEG_PLUGINS).cloned().unwrap_or_default();
    let callstack_text = callstack.join("\n");

    buf.push(format!("# MAIN ERROR #\n{}\n{}", meta.main_error, SEPARATOR));
    buf.push(format!("Game version    : {}\n", meta.game_version));
    buf.push(format!("Crashgen version: {}\n", meta.crashgen_version));

    // Уведомление об устаревшем краш-логгере
    if let (Some(current), Some(latest)) = (
        metadata::parse_version(&meta.crashgen_version),
        metadata::parse_version(&ruleset.crashgen.latest_version),
    ) {
        if current < latest {
            buf.push(format!(
                "❗ {} is outdated, the latest version is {}\n",
                ruleset.crashgen.name, ruleset.crashgen.latest_version
            ));
        }
    }

    let (gpu, gpu_rival) = metadata::detect_gpu(&system_specs);
    buf.push(format!("Detected GPU    : {}\n{}", gpu, SEPARATOR));

    // Порядок загрузки плагинов
    let resolution = match &session.loadorder_path {
        Some(lo_path) => {
            let res = plugins::from_loadorder_file(lo_path);
            buf.push("* Using plugins from the provided loadorder file *\n".to_string());
            res
        }
        None => {
            let release = ruleset.release_for(&meta.game_version);
            plugins::from_log_segment(
                &plugin_segment,
                release,
                &meta.crashgen_version,
                &ruleset.limit_fix_version,
            )
        }
    };
    buf.extend(resolution.warnings.iter().cloned());
    if resolution.limit_triggered {
        buf.push("⚠️ The plugin count limit was reached, new plugins can no longer load!\n".to_string());
    }
    if resolution.limit_check_disabled {
        buf.push(format!(
            "❔ Plugin limit check is unreliable: next-gen game with {} older than {}\n",
            ruleset.crashgen.name, ruleset.crashgen.limit_fix_version
        ));
    }
    if resolution.plugins.is_empty() {
        buf.push("* 0 plugins were loaded from this crash log *\n".to_string());
    } else {
        buf.push(format!(
            "* {} plugins were loaded *\n",
            resolution.plugins.len()
        ));
    }
    buf.push(SEPARATOR.to_string());

    // Подозреваемые: сперва главная ошибка, затем стек
    buf.push("CHECKING FOR KNOWN CRASH SUSPECTS...\n".to_string());
    let width = ruleset.suspect_name_width;
    let error_hits = suspects::check_main_error(&ruleset.error_suspects, &meta.main_error, width);
    let stack_hits = suspects::check_call_stack(
        &ruleset.stack_suspects,
        &meta.main_error,
        &callstack_text,
        width,
    );
    let suspects_found = !error_hits.is_empty() || !stack_hits.is_empty();
    buf.extend(error_hits);
    buf.extend(stack_hits);
    if !suspects_found {
        buf.push("# No known crash suspects were found. #\n".to_string());
    }
    buf.push(SEPARATOR.to_string());

    // Одноразовая проверка файлов игры (результат общий на сессию)
    buf.push("CHECKING GAME FILES...\n".to_string());
    buf.push(session.integrity_summary().to_string());
    buf.push(SEPARATOR.to_string());

    // Моды с известными проблемами
    buf.push("CHECKING FOR MODS WITH KNOWN ISSUES...\n".to_string());
    let mod_hits = correlate::check_problem_mods(&resolution.plugins, &ruleset.problem_mods);
    let gpu_hits = correlate::check_gpu_mods(
        &resolution.plugins,
        &gpu,
        gpu_rival.as_deref(),
        &ruleset.gpu_mods,
    );
    if mod_hits.is_empty() && gpu_hits.is_empty() {
        buf.push("# No known problem mods were found. #\n".to_string());
    }
    buf.extend(mod_hits);
    buf.extend(gpu_hits);
    buf.push(SEPARATOR.to_string());

    // Именованные записи в стеке
    buf.push("LISTING NAMED RECORDS FROM THE CALL STACK...\n".to_string());
    let records = correlate::scan_named_records(
        &callstack,
        &ruleset.named_records,
        &ruleset.ignore_records,
    );
    if records.is_empty() {
        buf.push("* No named records were found in the call stack. *\n".to_string());
    } else {
        for (record, count) in &records {
            buf.push(format!("- {} | {}\n", record, count));
        }
    }
    buf.push(SEPARATOR.to_string());

    // Плагины, замеченные в стеке
    buf.push("LISTING PLUGINS SEEN IN THE CALL STACK...\n".to_string());
    let plugin_hits = correlate::scan_plugins_in_stack(
        &callstack,
        &resolution.plugins,
        &ruleset.ignore_plugins,
    );
    if plugin_hits.is_empty() {
        buf.push("* No installed plugins were found in the call stack. *\n".to_string());
    } else {
        for (name, count) in &plugin_hits {
            buf.push(format!("- {} | {}\n", name, count));
        }
    }
    buf.push(SEPARATOR.to_string());

    // FormID с подстановкой описаний
    buf.push("LISTING FORM IDS FROM THE CALL STACK...\n".to_string());
    let formid_lines = correlate::extract_formid_lines(&callstack);
    let formid_fragments = correlate::correlate_formids(
        &formid_lines,
        &resolution.plugins,
        &session.formdb,
        session.show_formid_values,
    );
    if formid_fragments.is_empty() {
        buf.push("* No Form IDs were matched to installed plugins. *\n".to_string());
    } else {
        buf.extend(formid_fragments);
    }
    buf.push(SEPARATOR.to_string());

    // Лог без стека и без плагинов анализировать было нечем
    let status = if callstack.is_empty() && resolution.plugins.is_empty() {
        buf.push("❗ This crash log is incomplete: no call stack and no plugin list were found.\n".to_string());
        LogStatus::Incomplete
    } else if meta.main_error == UNKNOWN {
        buf.push("❗ No unhandled exception line was found in this crash log.\n".to_string());
        LogStatus::Incomplete
    } else {
        LogStatus::Scanned
    };

    LogReport {
        path: path.display().to_string(),
        status,
        text: buf.concat(),
    }
}

/// Прогнать всю сессию: ограниченный пул воркеров rayon, по одному
/// логу на задачу. Падение анализа одного лога не прерывает соседей.
pub fn run_session(session: &ScanSession, paths: &[PathBuf]) -> (Vec<LogReport>, ScanStats) {
    let start = std::time::Instant::now();

    let reports: Vec<LogReport> = paths
        .par_iter()
        .map(|path| {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                analyze_log(session, path)
            }));
            match outcome {
                Ok(report) => report,
                Err(_) => {
                    error!("❌ Analysis panicked on {}", path.display());
                    LogReport {
                        path: path.display().to_string(),
                        status: LogStatus::Failed,
                        text: format!(
                            "{}\n❌ Analysis failed unexpectedly, this log was skipped.\n",
                            path.display()
                        ),
                    }
                }
            }
        })
        .collect();

    let mut stats = ScanStats::default();
    for report in &reports {
        stats.register(report.status);
    }

    info!(
        "⚡ Scan session completed in {}ms (scanned: {}, incomplete: {}, failed: {})",
        start.elapsed().as_millis(),
        stats.scanned,
        stats.incomplete,
        stats.failed
    );
    (reports, stats)
}
