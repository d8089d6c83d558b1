//! Поиск краш-логов на диске

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Похож ли файл на краш-лог Buffout: crash-*.log
pub fn is_crash_log(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let folded = name.to_lowercase();
    folded.starts_with("crash-") && folded.ends_with(".log")
}

/// Собрать краш-логи из перечисленных папок.
/// Результат отсортирован по пути, чтобы порядок обхода был стабильным.
pub fn discover_crash_logs(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for dir in dirs {
        for entry in WalkDir::new(dir)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && is_crash_log(entry.path()) {
                found.push(entry.path().to_path_buf());
            }
        }
    }
    found.sort();
    found.dedup();
    found
}
