//! Буфер отчёта по одному краш-логу
//!
//! Только добавление в конец: порядок фрагментов - это и есть внешняя
//! структура отчёта, он должен воспроизводиться детерминированно.

#[derive(Debug, Default)]
pub struct ReportBuffer {
    fragments: Vec<String>,
}

impl ReportBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    pub fn extend(&mut self, fragments: impl IntoIterator<Item = String>) {
        self.fragments.extend(fragments);
    }

    /// Склеить все фрагменты в итоговый текст отчёта
    pub fn concat(&self) -> String {
        self.fragments.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved() {
        let mut buf = ReportBuffer::new();
        buf.push("first\n");
        buf.extend(vec!["second\n".to_string(), "third\n".to_string()]);
        buf.push("fourth\n");
        assert_eq!(buf.concat(), "first\nsecond\nthird\nfourth\n");
    }
}
