//! Поиск виновников в стеке вызовов
//!
//! Три независимых сканирования: именованные игровые записи,
//! упоминания установленных плагинов и FormID с подстановкой
//! описаний из справочной базы. Отсутствие находок - штатный
//! результат, а не ошибка.

use lazy_static::lazy_static;
use regex::Regex;
use sledopyt_core::PluginEntry;
use sledopyt_db::FormDatabase;
use std::collections::HashMap;

/// Маркер дампа регистров в строке стека
const REGISTER_DUMP_MARKER: &str = "[RSP+";

/// Сколько символов дампа регистров отрезается перед записью
const REGISTER_DUMP_OFFSET: usize = 30;

/// Маркер строк, которые не участвуют в поиске плагинов
const MODIFIED_BY_MARKER: &str = "modified by:";

lazy_static! {
    // Префикс 0x у разных версий логгера то есть, то нет
    static ref FORMID_PATTERN: Regex =
        Regex::new(r"^\s*Form ID:\s*(?:0x)?([0-9A-Fa-f]{8})")
            .expect("Failed to compile FormID pattern");
}

/// Собрать строки с FormID из сегмента стека вызовов
pub fn extract_formid_lines(callstack: &[String]) -> Vec<String> {
    let mut found = Vec::new();
    for line in callstack {
        if let Some(caps) = FORMID_PATTERN.captures(line) {
            if let Some(id) = caps.get(1) {
                found.push(format!("Form ID: {}", id.as_str().to_uppercase()));
            }
        }
    }
    found
}

/// Сканирование именованных записей в стеке.
///
/// Строка интересна, если содержит одну из подстрок каталога записей
/// и ни одной игнорируемой: игнор всегда сильнее интереса. Результат
/// дедуплицирован со счётчиками, отсортирован по тексту записи.
pub fn scan_named_records(
    callstack: &[String],
    named: &[String],
    ignore: &[String],
) -> Vec<(String, usize)> {
    let named_folded: Vec<String> = named.iter().map(|s| s.to_lowercase()).collect();
    let ignore_folded: Vec<String> = ignore.iter().map(|s| s.to_lowercase()).collect();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for line in callstack {
        let folded = line.to_lowercase();
        if !named_folded.iter().any(|n| folded.contains(n.as_str())) {
            continue;
        }
        if ignore_folded.iter().any(|i| folded.contains(i.as_str())) {
            continue;
        }

        let record = if line.contains(REGISTER_DUMP_MARKER) {
            // Дамп регистров: префикс с адресами отрезается
            line.get(REGISTER_DUMP_OFFSET.min(line.len())..)
                .unwrap_or("")
                .trim()
        } else {
            line.trim()
        };
        if record.is_empty() {
            continue;
        }
        *counts.entry(record.to_string()).or_insert(0) += 1;
    }

    let mut records: Vec<(String, usize)> = counts.into_iter().collect();
    records.sort_by(|a, b| a.0.cmp(&b.0));
    records
}

/// Частота упоминаний установленных плагинов в стеке.
///
/// Сортировка отличается от сканирования записей: сначала по убыванию
/// счётчика, при равенстве по имени по возрастанию.
pub fn scan_plugins_in_stack(
    callstack: &[String],
    plugins: &[PluginEntry],
    ignore: &[String],
) -> Vec<(String, usize)> {
    let ignore_folded: Vec<String> = ignore.iter().map(|s| s.to_lowercase()).collect();
    let candidates: Vec<(&PluginEntry, String)> = plugins
        .iter()
        .filter(|p| !ignore_folded.contains(&p.name_folded()))
        .map(|p| (p, p.name_folded()))
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for line in callstack {
        let folded = line.to_lowercase();
        if folded.contains(MODIFIED_BY_MARKER) {
            continue;
        }
        for (plugin, name_folded) in &candidates {
            if folded.contains(name_folded.as_str()) {
                *counts.entry(plugin.name.clone()).or_insert(0) += 1;
            }
        }
    }

    let mut hits: Vec<(String, usize)> = counts.into_iter().collect();
    hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    hits
}

/// Сопоставить FormID с плагинами и описаниями из базы.
///
/// Дубликаты схлопываются со счётчиком; FormID с префиксом FF
/// (за пределами лимита) и с неизвестным префиксом молча
/// пропускаются. Описание подставляется только когда включён режим
/// show_values и подключён хоть один источник.
pub fn correlate_formids(
    formid_lines: &[String],
    plugins: &[PluginEntry],
    db: &FormDatabase,
    show_values: bool,
) -> Vec<String> {
    let mut counts: HashMap<&String, usize> = HashMap::new();
    for line in formid_lines {
        *counts.entry(line).or_insert(0) += 1;
    }

    let mut distinct: Vec<&String> = counts.keys().copied().collect();
    distinct.sort();

    let mut fragments = Vec::new();
    for line in distinct {
        let Some(raw_id) = line.rsplit(": ").next() else {
            continue;
        };
        let raw_id = raw_id.trim();
        if raw_id.len() != 8 {
            continue;
        }
        let prefix = &raw_id[..2];
        let suffix = &raw_id[2..];
        if prefix.eq_ignore_ascii_case("FF") {
            continue;
        }

        let Some(plugin) = plugins
            .iter()
            .find(|p| p.origin.eq_ignore_ascii_case(prefix))
        else {
            continue;
        };

        let count = counts[line];
        let mut fragment = format!("- {} | [{}]", line, plugin.name);
        if show_values && db.has_sources() {
            if let Some(entry) = db.get_entry(suffix, &plugin.name) {
                fragment.push_str(&format!(" | {}", entry));
            }
        }
        fragment.push_str(&format!(" | {}\n", count));
        fragments.push(fragment);
    }
    fragments
}

/// Мод с известными проблемами из рулсета
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProblemMod {
    /// Подстрока имени плагина (без учёта регистра)
    pub name: String,
    /// Текст предупреждения для отчёта
    pub warning: String,
}

/// Мод, заточенный под конкретного производителя GPU
#[derive(Debug, Clone, serde::Deserialize)]
pub struct GpuMod {
    /// Производитель, под которого сделан мод
    pub gpu: String,
    pub name: String,
    pub warning: String,
}

/// Проверка плагинов по списку модов с известными проблемами
pub fn check_problem_mods(plugins: &[PluginEntry], mods: &[ProblemMod]) -> Vec<String> {
    let mut fragments = Vec::new();
    for rule in mods {
        let needle = rule.name.to_lowercase();
        for plugin in plugins {
            if plugin.name_folded().contains(&needle) {
                fragments.push(format!("[!] {} : {}\n-----\n", plugin.name, rule.warning));
                break;
            }
        }
    }
    fragments
}

/// Предупреждения о модах под другую видеокарту.
///
/// `detected_gpu` - производитель из system specs, `rival` - его
/// соперник оттуда же. Предупреждаем только о модах, заточенных под
/// соперника; без определённого соперника проверка не имеет смысла.
pub fn check_gpu_mods(
    plugins: &[PluginEntry],
    detected_gpu: &str,
    rival: Option<&str>,
    mods: &[GpuMod],
) -> Vec<String> {
    let mut fragments = Vec::new();
    let Some(rival) = rival else {
        return fragments;
    };
    for rule in mods {
        if !rule.gpu.eq_ignore_ascii_case(rival) {
            continue;
        }
        let needle = rule.name.to_lowercase();
        for plugin in plugins {
            if plugin.name_folded().contains(&needle) {
                fragments.push(format!(
                    "[!] {} is made for {} GPUs, but {} was detected : {}\n-----\n",
                    plugin.name, rule.gpu, detected_gpu, rule.warning
                ));
                break;
            }
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn strs(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn empty_db() -> FormDatabase {
        FormDatabase::open("Fallout4", &[])
    }

    #[test]
    fn test_ignore_wins_over_interest() {
        let stack = lines(&["BSFlattenedBoneTree via TESObjectREFR"]);
        let named = strs(&["TESObjectREFR"]);
        let ignore = strs(&["BSFlattenedBoneTree"]);
        assert!(scan_named_records(&stack, &named, &ignore).is_empty());
    }

    #[test]
    fn test_records_sorted_by_text_with_counts() {
        let stack = lines(&["zebra TESForm", "apple TESForm", "zebra TESForm"]);
        let named = strs(&["TESForm"]);
        let records = scan_named_records(&stack, &named, &[]);
        assert_eq!(
            records,
            vec![
                ("apple TESForm".to_string(), 1),
                ("zebra TESForm".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_register_dump_prefix_trimmed() {
        let line = format!("{:<28}{}", "[RSP+48 ] 0x12345", "  TESNPC(Name: 'Vendor')");
        let stack = vec![line];
        let named = strs(&["TESNPC"]);
        let records = scan_named_records(&stack, &named, &[]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, "TESNPC(Name: 'Vendor')");
    }

    #[test]
    fn test_plugin_scan_sort_and_skip() {
        let stack = lines(&[
            "frame with somemod.esp",
            "frame with somemod.esp and other.esp",
            "Fallout4.esm modified by: SomeMod.esp",
            "frame with other.esp",
            "frame with another.esp",
        ]);
        let plugins = vec![
            PluginEntry::new("SomeMod.esp", "01"),
            PluginEntry::new("Other.esp", "02"),
            PluginEntry::new("Another.esp", "03"),
        ];
        let hits = scan_plugins_in_stack(&stack, &plugins, &[]);
        // По убыванию счётчика, при равенстве по имени по возрастанию
        assert_eq!(
            hits,
            vec![
                ("Other.esp".to_string(), 2),
                ("SomeMod.esp".to_string(), 2),
                ("Another.esp".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_plugin_scan_ignores_configured() {
        let stack = lines(&["frame with fallout4.esm"]);
        let plugins = vec![PluginEntry::new("Fallout4.esm", "00")];
        let ignore = strs(&["Fallout4.esm"]);
        assert!(scan_plugins_in_stack(&stack, &plugins, &ignore).is_empty());
    }

    #[test]
    fn test_formid_extraction() {
        let stack = lines(&["  Form ID: 0x2A001234", "  File: \"SomeMod.esp\"", "junk"]);
        assert_eq!(extract_formid_lines(&stack), vec!["Form ID: 2A001234"]);
    }

    #[test]
    fn test_formid_extraction_without_hex_prefix() {
        let stack = lines(&["  Form ID: 2A001234", "  Form ID: 0x2B005678"]);
        assert_eq!(
            extract_formid_lines(&stack),
            vec!["Form ID: 2A001234", "Form ID: 2B005678"]
        );
    }

    #[test]
    fn test_formid_known_prefix_reported_once_with_count() {
        let formids = strs(&["Form ID: 2A001234"]);
        let plugins = vec![PluginEntry::new("SomeMod.esp", "2A")];
        let fragments = correlate_formids(&formids, &plugins, &empty_db(), false);
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].contains("SomeMod.esp"));
        assert!(fragments[0].ends_with("| 1\n"));
    }

    #[test]
    fn test_formid_unknown_prefix_silently_omitted() {
        let formids = strs(&["Form ID: 7F001234"]);
        let plugins = vec![PluginEntry::new("SomeMod.esp", "2A")];
        assert!(correlate_formids(&formids, &plugins, &empty_db(), false).is_empty());
    }

    #[test]
    fn test_formid_duplicates_collapse() {
        let formids = strs(&["Form ID: 2A001234", "Form ID: 2A001234"]);
        let plugins = vec![PluginEntry::new("SomeMod.esp", "2A")];
        let fragments = correlate_formids(&formids, &plugins, &empty_db(), false);
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].ends_with("| 2\n"));
    }

    #[test]
    fn test_formid_ff_prefix_skipped() {
        let formids = strs(&["Form ID: FF001234"]);
        let plugins = vec![PluginEntry::new("Overflow.esp", "FF")];
        assert!(correlate_formids(&formids, &plugins, &empty_db(), false).is_empty());
    }

    #[test]
    fn test_problem_mods_substring_match() {
        let plugins = vec![PluginEntry::new("ClassicHolsteredWeapons.esp", "11")];
        let mods = vec![ProblemMod {
            name: "HolsteredWeapons".to_string(),
            warning: "Known to conflict with body skeleton mods.".to_string(),
        }];
        let fragments = check_problem_mods(&plugins, &mods);
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].contains("ClassicHolsteredWeapons.esp"));
    }

    #[test]
    fn test_gpu_mods_warn_on_rival_only() {
        let plugins = vec![PluginEntry::new("NvidiaWeaponDebris.esp", "12")];
        let mods = vec![GpuMod {
            gpu: "Nvidia".to_string(),
            name: "WeaponDebris".to_string(),
            warning: "Uses PhysX Flex, crashes on other GPUs.".to_string(),
        }];
        assert!(check_gpu_mods(&plugins, "Nvidia", Some("AMD"), &mods).is_empty());
        assert_eq!(check_gpu_mods(&plugins, "AMD", Some("Nvidia"), &mods).len(), 1);
        // Производитель не определён - соперника нет, проверка молчит
        assert!(check_gpu_mods(&plugins, "Unknown", None, &mods).is_empty());
    }
}
