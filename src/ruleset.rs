//! Загрузка курируемого рулсета
//!
//! Весь игрозависимый материал - маркеры сегментов, сигнатуры крашей,
//! списки игнора, версии - живёт во внешнем TOML-файле. Сигнальная
//! грамматика правил разбирается здесь один раз, при загрузке.
//!
//! Отсутствие файла рулсета - жёсткая ошибка конфигурации: без него
//! недостоверен анализ каждого последующего лога.

use serde::Deserialize;
use sledopyt_core::{GameRelease, Result, ScanError};
use std::path::Path;

use crate::scanner::correlate::{GpuMod, ProblemMod};
use crate::scanner::suspects::{ErrorSuspect, Signal, StackSuspect};

/// Число граничных пар, которое ожидает движок анализа: шапка логгера,
/// system specs, стек вызовов, модули, XSE-плагины, плагины.
/// Рулсет с другим числом пар - сломанная установка.
pub const SEGMENT_PAIRS: usize = 6;

#[derive(Debug, Deserialize)]
struct RawRuleset {
    game: GameSection,
    crashgen: CrashgenSection,
    segments: SegmentsSection,
    #[serde(default)]
    reformat: ReformatSection,
    #[serde(default)]
    records: RecordsSection,
    #[serde(default)]
    plugins: PluginsSection,
    #[serde(default)]
    error_suspects: Vec<RawErrorSuspect>,
    #[serde(default)]
    stack_suspects: Vec<RawStackSuspect>,
    #[serde(default)]
    problem_mods: Vec<ProblemMod>,
    #[serde(default)]
    gpu_mods: Vec<GpuMod>,
}

#[derive(Debug, Deserialize)]
pub struct GameSection {
    /// Корневое имя игры, с которого начинается строка версии
    pub name: String,
    /// Имя таблицы в базах FormID
    pub formdb_table: String,
    /// Имя исполняемого файла для проверки целостности
    pub exe_name: String,
    /// Версии оригинального релиза
    pub og_versions: Vec<String>,
    /// Версии next-gen релиза
    pub ng_versions: Vec<String>,
    /// Известные SHA-256 экзешника оригинального релиза
    #[serde(default)]
    pub og_exe_hashes: Vec<String>,
    /// Известные SHA-256 экзешника next-gen релиза
    #[serde(default)]
    pub ng_exe_hashes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CrashgenSection {
    /// Отображаемое имя краш-логгера ("Buffout 4")
    pub name: String,
    /// Последняя известная версия - для уведомления об устаревании
    pub latest_version: String,
    /// Версия, начиная с которой проверка лимита плагинов достоверна
    /// на next-gen релизе
    pub limit_fix_version: String,
}

#[derive(Debug, Deserialize)]
struct SegmentsSection {
    boundaries: Vec<(String, String)>,
    plugins_marker: String,
}

#[derive(Debug, Default, Deserialize)]
struct ReformatSection {
    #[serde(default)]
    exclude_log_lines: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordsSection {
    #[serde(default)]
    named: Vec<String>,
    #[serde(default)]
    ignore: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PluginsSection {
    #[serde(default)]
    ignore: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawErrorSuspect {
    severity: String,
    name: String,
    signal: String,
}

#[derive(Debug, Deserialize)]
struct RawStackSuspect {
    severity: String,
    name: String,
    signals: Vec<String>,
}

/// Загруженный и разобранный рулсет
#[derive(Debug)]
pub struct Ruleset {
    pub game: GameSection,
    pub crashgen: CrashgenSection,

    /// Граничные пары сегментов, в порядке следования в логе
    pub boundaries: Vec<(String, String)>,
    pub plugins_marker: String,

    pub exclude_log_lines: Vec<String>,
    pub named_records: Vec<String>,
    pub ignore_records: Vec<String>,
    pub ignore_plugins: Vec<String>,

    /// Правила по главной ошибке, в порядке файла
    pub error_suspects: Vec<ErrorSuspect>,
    /// Правила по стеку, в порядке файла, сигналы уже разобраны
    pub stack_suspects: Vec<StackSuspect>,

    pub problem_mods: Vec<ProblemMod>,
    pub gpu_mods: Vec<GpuMod>,

    /// Ширина выравнивания имён подозреваемых в отчёте
    pub suspect_name_width: usize,

    /// Порог версии краш-логгера для проверки лимита плагинов
    pub limit_fix_version: semver::Version,
}

impl Ruleset {
    /// Загрузить рулсет из файла. Отсутствующий или нечитаемый файл -
    /// жёсткая ошибка: это сломанная установка, а не свойство лога.
    pub fn load(path: &Path) -> Result<Ruleset> {
        if !path.is_file() {
            return Err(ScanError::RulesetMissing(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Разобрать рулсет из строки TOML
    pub fn from_toml_str(content: &str) -> Result<Ruleset> {
        let raw: RawRuleset = toml::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawRuleset) -> Result<Ruleset> {
        if raw.segments.boundaries.len() != SEGMENT_PAIRS {
            return Err(ScanError::InvalidConfig(format!(
                "expected {} segment boundary pairs, got {}",
                SEGMENT_PAIRS,
                raw.segments.boundaries.len()
            )));
        }
        if raw.error_suspects.is_empty() && raw.stack_suspects.is_empty() {
            return Err(ScanError::RulesetMissing(
                "no suspect rules defined".to_string(),
            ));
        }

        let limit_fix_version = semver::Version::parse(&raw.crashgen.limit_fix_version)
            .map_err(|e| {
                ScanError::InvalidConfig(format!(
                    "bad crashgen.limit_fix_version '{}': {}",
                    raw.crashgen.limit_fix_version, e
                ))
            })?;

        let error_suspects: Vec<ErrorSuspect> = raw
            .error_suspects
            .into_iter()
            .map(|r| ErrorSuspect {
                severity: r.severity,
                name: r.name,
                signal: r.signal,
            })
            .collect();

        let stack_suspects: Vec<StackSuspect> = raw
            .stack_suspects
            .into_iter()
            .map(|r| StackSuspect {
                severity: r.severity,
                name: r.name,
                signals: r.signals.iter().map(|s| Signal::parse(s)).collect(),
            })
            .collect();

        // Выравнивание по самому длинному имени правила, с запасом точек
        let suspect_name_width = error_suspects
            .iter()
            .map(|r| r.name.len())
            .chain(stack_suspects.iter().map(|r| r.name.len()))
            .max()
            .unwrap_or(0)
            + 8;

        Ok(Ruleset {
            game: raw.game,
            crashgen: raw.crashgen,
            boundaries: raw.segments.boundaries,
            plugins_marker: raw.segments.plugins_marker,
            exclude_log_lines: raw.reformat.exclude_log_lines,
            named_records: raw.records.named,
            ignore_records: raw.records.ignore,
            ignore_plugins: raw.plugins.ignore,
            error_suspects,
            stack_suspects,
            problem_mods: raw.problem_mods,
            gpu_mods: raw.gpu_mods,
            suspect_name_width,
            limit_fix_version,
        })
    }

    /// Определить релиз игры по строке версии из лога
    pub fn release_for(&self, game_version_line: &str) -> GameRelease {
        if self
            .game
            .og_versions
            .iter()
            .any(|v| game_version_line.contains(v.as_str()))
        {
            GameRelease::Original
        } else if self
            .game
            .ng_versions
            .iter()
            .any(|v| game_version_line.contains(v.as_str()))
        {
            GameRelease::NextGen
        } else {
            GameRelease::Unknown
        }
    }
}
