//! Извлечение метаданных из шапки краш-лога
//!
//! Версия игры, версия краш-логгера и главная ошибка ищутся по всему
//! логу, а не по сегментам: шапка у разных версий логгера плавает.

use sledopyt_core::{LogMetadata, UNKNOWN};

/// Маркер строки с необработанным исключением
const MAIN_ERROR_MARKER: &str = "Unhandled exception";

/// Достать версию игры, версию краш-логгера и главную ошибку.
///
/// Для каждого поля берётся только первое совпадение, поиск этого поля
/// после находки прекращается независимо от остальных. Ненайденное
/// поле остаётся "UNKNOWN".
pub fn extract_metadata(lines: &[String], game_name: &str, crashgen_name: &str) -> LogMetadata {
    let mut meta = LogMetadata::unknown();
    let mut game_found = false;
    let mut crashgen_found = false;
    let mut error_found = false;

    for line in lines {
        if game_found && crashgen_found && error_found {
            break;
        }
        let trimmed = line.trim();
        if !game_found && trimmed.starts_with(game_name) {
            meta.game_version = trimmed.to_string();
            game_found = true;
        }
        if !crashgen_found && trimmed.starts_with(crashgen_name) {
            meta.crashgen_version = trimmed.to_string();
            crashgen_found = true;
        }
        if !error_found && trimmed.starts_with(MAIN_ERROR_MARKER) {
            // Логгер склеивает многострочную ошибку через '|' -
            // восстанавливаем только первый перенос
            meta.main_error = trimmed.replacen('|', "\n", 1);
            error_found = true;
        }
    }
    meta
}

/// Определить производителя GPU по сегменту system specs.
///
/// Возвращает (производитель, соперник): соперник нужен проверке модов,
/// заточенных под другую видеокарту. Пустой сегмент или неизвестная
/// карта дают ("Unknown", None).
pub fn detect_gpu(system_specs: &[String]) -> (String, Option<String>) {
    for line in system_specs {
        if !line.contains("GPU #1") {
            continue;
        }
        let folded = line.to_lowercase();
        if folded.contains("nvidia") {
            return ("Nvidia".to_string(), Some("AMD".to_string()));
        }
        if folded.contains("amd") || folded.contains("radeon") {
            return ("AMD".to_string(), Some("Nvidia".to_string()));
        }
    }
    ("Unknown".to_string(), None)
}

lazy_static::lazy_static! {
    static ref VERSION_PATTERN: regex::Regex =
        regex::Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Failed to compile version pattern");
}

/// Вытащить номер версии из строки вида "Buffout 4 v1.26.2"
pub fn parse_version(text: &str) -> Option<semver::Version> {
    let m = VERSION_PATTERN.find(text)?;
    semver::Version::parse(m.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_all_fields() {
        let input = lines(&[
            "Fallout 4 v1.10.163",
            "Buffout 4 v1.26.2",
            "Unhandled exception \"EXCEPTION_ACCESS_VIOLATION\" at 0x7FF6|Fallout4.exe+247D20",
        ]);
        let meta = extract_metadata(&input, "Fallout 4", "Buffout 4");
        assert_eq!(meta.game_version, "Fallout 4 v1.10.163");
        assert_eq!(meta.crashgen_version, "Buffout 4 v1.26.2");
        assert_eq!(
            meta.main_error,
            "Unhandled exception \"EXCEPTION_ACCESS_VIOLATION\" at 0x7FF6\nFallout4.exe+247D20"
        );
    }

    #[test]
    fn test_first_match_wins() {
        let input = lines(&[
            "Fallout 4 v1.10.163",
            "Fallout 4 v9.9.9",
            "Unhandled exception A",
            "Unhandled exception B",
        ]);
        let meta = extract_metadata(&input, "Fallout 4", "Buffout 4");
        assert_eq!(meta.game_version, "Fallout 4 v1.10.163");
        assert_eq!(meta.main_error, "Unhandled exception A");
        assert_eq!(meta.crashgen_version, UNKNOWN);
    }

    #[test]
    fn test_pipe_replaced_once() {
        let input = lines(&["Unhandled exception X|Y|Z"]);
        let meta = extract_metadata(&input, "Fallout 4", "Buffout 4");
        assert_eq!(meta.main_error, "Unhandled exception X\nY|Z");
    }

    #[test]
    fn test_empty_log_gives_unknown() {
        let meta = extract_metadata(&[], "Fallout 4", "Buffout 4");
        assert_eq!(meta.game_version, UNKNOWN);
        assert_eq!(meta.crashgen_version, UNKNOWN);
        assert_eq!(meta.main_error, UNKNOWN);
    }

    #[test]
    fn test_gpu_nvidia() {
        let specs = lines(&["OS: Windows 10", "GPU #1: Nvidia GeForce RTX 3080"]);
        assert_eq!(
            detect_gpu(&specs),
            ("Nvidia".to_string(), Some("AMD".to_string()))
        );
    }

    #[test]
    fn test_gpu_amd() {
        let specs = lines(&["GPU #1: AMD Radeon RX 6800 XT"]);
        assert_eq!(
            detect_gpu(&specs),
            ("AMD".to_string(), Some("Nvidia".to_string()))
        );
    }

    #[test]
    fn test_gpu_empty_segment_is_unknown() {
        assert_eq!(detect_gpu(&[]), ("Unknown".to_string(), None));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("Buffout 4 v1.26.2"),
            Some(semver::Version::new(1, 26, 2))
        );
        assert_eq!(
            parse_version("Fallout 4 v1.10.163"),
            Some(semver::Version::new(1, 10, 163))
        );
        assert_eq!(parse_version("no version here"), None);
    }
}
