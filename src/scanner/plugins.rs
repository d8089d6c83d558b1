//! Разрешение порядка загрузки плагинов
//!
//! Две взаимоисключающие стратегии: явный файл loadorder.txt или
//! разбор сегмента PLUGINS: из самого краш-лога. Выбор делает
//! вызывающая сторона по наличию файла.

use lazy_static::lazy_static;
use regex::Regex;
use semver::Version;
use sledopyt_core::{GameRelease, PluginEntry};
use std::collections::HashSet;
use std::path::Path;

use super::metadata::parse_version;

/// Маркер переполнения лимита плагинов в сегменте PLUGINS:
const PLUGIN_LIMIT_MARKER: &str = "[FF]";

lazy_static! {
    // Два формата индекса: обычный слот [2A] и light-плагин [FE:012]
    static ref PLUGIN_PATTERN: Regex =
        Regex::new(r"^\s*\[(FE:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{2})\]\s*(.+)$")
            .expect("Failed to compile plugin pattern");
}

/// Результат разрешения порядка загрузки
#[derive(Debug, Default)]
pub struct PluginResolution {
    /// Плагины в порядке первого появления, по одной записи на имя
    pub plugins: Vec<PluginEntry>,

    /// Лимит плагинов достигнут (оригинальный релиз игры)
    pub limit_triggered: bool,

    /// Проверка лимита неприменима: next-gen релиз со старым краш-логгером
    pub limit_check_disabled: bool,

    /// Предупреждения для отчёта (например, нечитаемый loadorder.txt)
    pub warnings: Vec<String>,
}

impl PluginResolution {
    fn push_unique(&mut self, seen: &mut HashSet<String>, name: &str, origin: &str) {
        let folded = name.to_lowercase();
        if name.is_empty() || seen.contains(&folded) {
            return;
        }
        seen.insert(folded);
        self.plugins.push(PluginEntry::new(name, origin));
    }
}

/// Стратегия 1: явный файл порядка загрузки.
///
/// Первая строка - заголовок, пропускается. Ошибка чтения не
/// пробрасывается: она становится предупреждением в отчёте, а список
/// остаётся пустым - решение о фолбеке принимает вызывающий код.
pub fn from_loadorder_file(path: &Path) -> PluginResolution {
    let mut resolution = PluginResolution::default();
    let mut seen = HashSet::new();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            resolution.warnings.push(format!(
                "⚠️ Failed to read loadorder file {}: {}\n",
                path.display(),
                e
            ));
            return resolution;
        }
    };

    for line in content.lines().skip(1) {
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        resolution.push_unique(&mut seen, name, "LO");
    }
    resolution
}

/// Стратегия 2: сегмент PLUGINS: из краш-лога.
///
/// Попутно отслеживаются условия лимита плагинов: на оригинальном
/// релизе маркер [FF] означает достигнутый лимит, на next-gen релизе
/// с краш-логгером старше `limit_fix_version` проверка лимита
/// недостоверна. Флаги липкие: раз взведённые, не сбрасываются.
pub fn from_log_segment(
    segment: &[String],
    release: GameRelease,
    crashgen_version: &str,
    limit_fix_version: &Version,
) -> PluginResolution {
    let mut resolution = PluginResolution::default();
    let mut seen = HashSet::new();
    let crashgen = parse_version(crashgen_version);

    for line in segment {
        if line.contains(PLUGIN_LIMIT_MARKER) {
            match release {
                GameRelease::Original => resolution.limit_triggered = true,
                GameRelease::NextGen => {
                    let outdated = crashgen
                        .as_ref()
                        .map(|v| v < limit_fix_version)
                        .unwrap_or(false);
                    if outdated {
                        resolution.limit_check_disabled = true;
                    }
                }
                GameRelease::Unknown => {}
            }
        }

        if let Some(caps) = PLUGIN_PATTERN.captures(line) {
            let origin = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let name = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            resolution.push_unique(&mut seen, name, origin);
            continue;
        }

        // Строки без индекса загрузки: DLL от скрипт-экстендера
        // или нераспознанный формат
        let name = line.trim();
        if name.is_empty() {
            continue;
        }
        let origin = if name.to_lowercase().contains("dll") {
            "DLL"
        } else {
            "???"
        };
        resolution.push_unique(&mut seen, name, origin);
    }
    resolution
}
