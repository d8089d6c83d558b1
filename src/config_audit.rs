//! Аудит настроек сторонних модов
//!
//! Проверяет известные конфиги в папке модов на конфликтные значения
//! (включённый VSync, заниженный лимит FPS, битый формат хоткея)
//! и чинит их на месте, когда исправление однозначно и безопасно.
//! Дополнительно ищет дубликаты одного конфига в разных папках.
//!
//! Запускается один раз на сессию сканирования, от краш-логов
//! не зависит.

use log::{info, warn};
use sledopyt_core::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Безопасный нижний порог лимита кадров
const SAFE_FPS_FLOOR: i64 = 60;

/// Конфиги, у которых включённый VSync конфликтует с лимитером кадров.
/// Вторая колонка - ключ, третья - есть ли однозначное исправление.
const VSYNC_CHECKS: &[(&str, &str, bool)] = &[
    ("highfpsphysicsfix.ini", "LoopVSync", true),
    ("longloadingtimesfix.ini", "EnableVSync", true),
    ("dxvk.conf", "dxgi.syncInterval", false),
    ("enblocal.ini", "ForceVSync", false),
];

/// Одна находка аудита
#[derive(Debug, Clone)]
pub struct AuditFinding {
    pub file: PathBuf,
    pub message: String,
    pub fixed: bool,
}

impl AuditFinding {
    fn to_fragment(&self) -> String {
        let marker = if self.fixed { "✔️" } else { "⚠️" };
        format!("{} {} : {}\n", marker, self.file.display(), self.message)
    }
}

/// Прогнать аудит по папке модов и вернуть фрагменты отчёта
pub fn audit_configs(mods_dir: &Path) -> Vec<String> {
    let mut findings = Vec::new();
    let mut seen: HashMap<String, Vec<PathBuf>> = HashMap::new();

    for entry in WalkDir::new(mods_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let folded = file_name.to_lowercase();

        match folded.as_str() {
            "espexplorer.ini" => check_hotkey(path, &mut findings),
            "epo.ini" => check_particle_count(path, &mut findings),
            "highfpsphysicsfix.ini" => {
                check_vsync(path, "LoopVSync", true, &mut findings);
                check_fps_floor(path, &mut findings);
            }
            _ => {
                for (name, key, fixable) in VSYNC_CHECKS {
                    if folded == *name {
                        check_vsync(path, key, *fixable, &mut findings);
                    }
                }
            }
        }

        if VSYNC_CHECKS.iter().any(|(name, _, _)| folded == *name)
            || folded == "espexplorer.ini"
            || folded == "epo.ini"
        {
            seen.entry(folded).or_default().push(path.to_path_buf());
        }
    }

    // Дубликаты одного конфига в нескольких папках - ручная чистка
    for (name, paths) in &seen {
        if paths.len() > 1 {
            findings.push(AuditFinding {
                file: PathBuf::from(name),
                message: format!(
                    "found in {} locations, remove the extra copies manually",
                    paths.len()
                ),
                fixed: false,
            });
        }
    }

    if findings.is_empty() {
        return vec!["# No configuration issues were found. #\n".to_string()];
    }
    findings.iter().map(|f| f.to_fragment()).collect()
}

/// Хоткей, закомментированный или записанный не hex-числом
fn check_hotkey(path: &Path, findings: &mut Vec<AuditFinding>) {
    let Some(value) = read_key(path, "HotKey") else {
        return;
    };
    if value.starts_with("0x") && !value.contains(';') {
        return;
    }
    let fixed = write_key(path, "HotKey", "0x79").is_ok();
    if fixed {
        info!("🔧 Fixed HotKey format in {}", path.display());
    }
    findings.push(AuditFinding {
        file: path.to_path_buf(),
        message: format!("HotKey was '{}', expected a plain hex value; reset to 0x79", value),
        fixed,
    });
}

/// Завышенный лимит частиц роняет игру на слабых системах
fn check_particle_count(path: &Path, findings: &mut Vec<AuditFinding>) {
    let Some(value) = read_key(path, "iMaxDesired") else {
        return;
    };
    let Ok(count) = value.trim().parse::<i64>() else {
        return;
    };
    if count <= 5000 {
        return;
    }
    let fixed = write_key(path, "iMaxDesired", "5000").is_ok();
    if fixed {
        info!("🔧 Lowered particle count in {}", path.display());
    }
    findings.push(AuditFinding {
        file: path.to_path_buf(),
        message: format!("particle count {} is above the safe 5000 cap", count),
        fixed,
    });
}

/// Включённый VSync в конфиге мода конфликтует с лимитером кадров
fn check_vsync(path: &Path, key: &str, fixable: bool, findings: &mut Vec<AuditFinding>) {
    let Some(value) = read_key(path, key) else {
        return;
    };
    let enabled = matches!(value.to_lowercase().trim(), "true" | "1");
    if !enabled {
        return;
    }
    let fixed = if fixable {
        write_key(path, key, "false").is_ok()
    } else {
        false
    };
    if fixed {
        info!("🔧 Disabled {} in {}", key, path.display());
    }
    findings.push(AuditFinding {
        file: path.to_path_buf(),
        message: if fixed {
            format!("{} was enabled, disabled it", key)
        } else {
            format!("{} is enabled, disable it manually", key)
        },
        fixed,
    });
}

/// Лимит кадров ниже безопасного порога
fn check_fps_floor(path: &Path, findings: &mut Vec<AuditFinding>) {
    let Some(value) = read_key(path, "MaximumFPS") else {
        return;
    };
    let Ok(fps) = value.trim().parse::<i64>() else {
        return;
    };
    if fps <= 0 || fps >= SAFE_FPS_FLOOR {
        return;
    }
    let fixed = write_key(path, "MaximumFPS", &SAFE_FPS_FLOOR.to_string()).is_ok();
    if fixed {
        info!("🔧 Raised MaximumFPS in {}", path.display());
    }
    findings.push(AuditFinding {
        file: path.to_path_buf(),
        message: format!("frame limiter was set to {}, below the safe {}", fps, SAFE_FPS_FLOOR),
        fixed,
    });
}

/// Прочитать значение ключа из ini-подобного файла.
/// Секции и комментарии пропускаются, сравнение ключей без регистра.
fn read_key(path: &Path, key: &str) -> Option<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("⚠️ Failed to read config {}: {}", path.display(), e);
            return None;
        }
    };
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('[') || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        let Some((k, v)) = trimmed.split_once('=') else {
            continue;
        };
        if k.trim().eq_ignore_ascii_case(key) {
            return Some(v.trim().to_string());
        }
    }
    None
}

/// Переписать значение ключа, сохранив остальные строки как есть
fn write_key(path: &Path, key: &str, new_value: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let mut lines: Vec<String> = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        let replace = trimmed
            .split_once('=')
            .map(|(k, _)| k.trim().eq_ignore_ascii_case(key))
            .unwrap_or(false)
            && !trimmed.starts_with(';')
            && !trimmed.starts_with('#');
        if replace {
            lines.push(format!("{} = {}", key, new_value));
        } else {
            lines.push(line.to_string());
        }
    }
    std::fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}
