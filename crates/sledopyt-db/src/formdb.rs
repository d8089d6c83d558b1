//! Справочная база FormID - поиск описаний игровых объектов
//!
//! Каждый источник - это sqlite-файл с таблицей вида:
//!   CREATE TABLE <game> (formid TEXT, plugin TEXT, entry TEXT)
//!
//! Ошибки базы никогда не пробрасываются наружу: любой сбой
//! запроса трактуется как "описание не найдено".

use log::{debug, warn};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Справочник описаний FormID с кешем запросов
///
/// Кеш общий на всю сессию сканирования: одни и те же FormID
/// повторяются в разных краш-логах очень часто.
pub struct FormDatabase {
    /// Имя таблицы с описаниями (совпадает с именем игры без пробелов)
    table: String,

    /// Открытые соединения с источниками, в порядке приоритета
    sources: Vec<Mutex<Connection>>,

    /// Кеш (formid, plugin) -> описание (None = искали и не нашли)
    cache: Mutex<HashMap<(String, String), Option<String>>>,
}

impl FormDatabase {
    /// Открыть все доступные источники. Недоступные файлы пропускаются
    /// с предупреждением - отсутствие базы не является ошибкой.
    pub fn open(table: impl Into<String>, paths: &[PathBuf]) -> Self {
        let table = table.into();
        let mut sources = Vec::new();

        for path in paths {
            if !path.is_file() {
                continue;
            }
            match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
                Ok(conn) => {
                    debug!("FormID source attached: {}", path.display());
                    sources.push(Mutex::new(conn));
                }
                Err(e) => {
                    warn!("Failed to open FormID source {}: {}", path.display(), e);
                }
            }
        }

        Self {
            table,
            sources,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Есть ли хоть один подключённый источник
    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Найти описание по (суффикс formid, имя плагина), без учёта регистра.
    ///
    /// Сбои запроса деградируют до None и кешируются так же, как промахи,
    /// чтобы не долбить повреждённый файл повторными запросами.
    pub fn get_entry(&self, formid: &str, plugin: &str) -> Option<String> {
        let key = (formid.to_lowercase(), plugin.to_lowercase());

        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return cached.clone();
            }
        }

        let found = self.query_sources(formid, plugin);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, found.clone());
        }
        found
    }

    fn query_sources(&self, formid: &str, plugin: &str) -> Option<String> {
        let sql = format!(
            "SELECT entry FROM {} WHERE formid=?1 COLLATE nocase AND plugin=?2 COLLATE nocase",
            self.table
        );

        for source in &self.sources {
            let conn = match source.lock() {
                Ok(conn) => conn,
                Err(_) => continue,
            };
            match conn.query_row(&sql, [formid, plugin], |row| row.get::<_, String>(0)) {
                Ok(entry) => return Some(entry),
                Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                Err(e) => {
                    debug!("FormID lookup failed ({} | {}): {}", formid, plugin, e);
                    continue;
                }
            }
        }
        None
    }
}

/// Собрать стандартные пути к базам FormID рядом с данными приложения
pub fn default_sources(data_dir: &Path, game: &str) -> Vec<PathBuf> {
    vec![
        data_dir.join(format!("{} FormIDs Main.db", game)),
        data_dir.join(format!("{} FormIDs Local.db", game)),
    ]
}
