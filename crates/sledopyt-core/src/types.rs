use serde::{Deserialize, Serialize};

/// Строка-заглушка для метаданных, которые не удалось извлечь из лога
pub const UNKNOWN: &str = "UNKNOWN";

/// Релиз игры, определённый по версии из краш-лога
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameRelease {
    /// Оригинальный релиз (до next-gen обновления)
    Original,
    /// Next-gen обновление
    NextGen,
    #[default]
    Unknown,
}

impl GameRelease {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Original => "original",
            Self::NextGen => "next-gen",
            Self::Unknown => "unknown",
        }
    }
}

/// Метаданные, извлечённые из заголовка краш-лога
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Строка с версией игры (первая строка, начинающаяся с имени игры)
    pub game_version: String,

    /// Строка с версией краш-логгера
    pub crashgen_version: String,

    /// Текст необработанного исключения (главная ошибка)
    pub main_error: String,
}

impl LogMetadata {
    pub fn unknown() -> Self {
        Self {
            game_version: UNKNOWN.to_string(),
            crashgen_version: UNKNOWN.to_string(),
            main_error: UNKNOWN.to_string(),
        }
    }
}

/// Запись о плагине из списка загрузки
///
/// Инвариант: на одно имя плагина - не больше одной записи,
/// первое вхождение выигрывает.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Имя файла плагина (регистр сохраняется для отчёта)
    pub name: String,

    /// Происхождение: индекс загрузки ("028"), "FE:XXX" для light-плагинов,
    /// "DLL" для XSE-плагинов, "???" для нераспознанных, "LO" из файла loadorder
    pub origin: String,
}

impl PluginEntry {
    pub fn new(name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: origin.into(),
        }
    }

    /// Имя в нижнем регистре для сопоставлений
    pub fn name_folded(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Итоговый статус анализа одного краш-лога
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// Анализ прошёл полностью
    Scanned,
    /// Анализ прошёл, но в логе не было ни стека вызовов, ни плагинов
    Incomplete,
    /// Лог не удалось прочитать или анализ завершился ошибкой
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scanned => "scanned",
            Self::Incomplete => "incomplete",
            Self::Failed => "failed",
        }
    }
}

/// Готовый отчёт по одному краш-логу
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogReport {
    /// Путь к исходному краш-логу
    pub path: String,

    /// Статус анализа
    pub status: LogStatus,

    /// Собранный текст отчёта (порядок фрагментов - часть контракта)
    pub text: String,
}

/// Сводная статистика по сессии сканирования
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub scanned: u32,
    pub incomplete: u32,
    pub failed: u32,
}

impl ScanStats {
    pub fn register(&mut self, status: LogStatus) {
        match status {
            LogStatus::Scanned => self.scanned += 1,
            LogStatus::Incomplete => self.incomplete += 1,
            LogStatus::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.scanned + self.incomplete + self.failed
    }
}
