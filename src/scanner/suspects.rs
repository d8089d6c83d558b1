//! Сопоставление известных сигнатур крашей
//!
//! Два независимых прохода: простые подстроки против главной ошибки
//! и модификаторная грамматика сигналов против стека вызовов.
//! Грамматика разбирается один раз при загрузке рулсета, на каждом
//! сравнении работают уже готовые варианты enum.

/// Один сигнал из правила для стека вызовов
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// `ME-REQ|текст` - текст обязан быть в главной ошибке
    MainErrorRequired(String),
    /// `ME-OPT|текст` - текст в главной ошибке засчитывается как совпадение
    MainErrorOptional(String),
    /// `NOT|текст` - текст в стеке немедленно дисквалифицирует правило
    NotInStack(String),
    /// `N|текст` - текст должен встретиться в стеке минимум N раз
    MinOccurrences { needle: String, min: usize },
    /// Просто подстрока, которую ищем в стеке
    InStack(String),
}

impl Signal {
    /// Разобрать сырую строку сигнала. Неизвестный префикс до `|`
    /// трактуется как часть обычной подстроки.
    pub fn parse(raw: &str) -> Signal {
        if let Some((prefix, text)) = raw.split_once('|') {
            match prefix {
                "ME-REQ" => return Signal::MainErrorRequired(text.to_string()),
                "ME-OPT" => return Signal::MainErrorOptional(text.to_string()),
                "NOT" => return Signal::NotInStack(text.to_string()),
                _ => {
                    if let Ok(min) = prefix.parse::<usize>() {
                        return Signal::MinOccurrences {
                            needle: text.to_string(),
                            min,
                        };
                    }
                }
            }
        }
        Signal::InStack(raw.to_string())
    }
}

/// Правило по главной ошибке: буквальная подстрока
#[derive(Debug, Clone)]
pub struct ErrorSuspect {
    pub severity: String,
    pub name: String,
    pub signal: String,
}

/// Правило по стеку вызовов: упорядоченный список сигналов
#[derive(Debug, Clone)]
pub struct StackSuspect {
    pub severity: String,
    pub name: String,
    pub signals: Vec<Signal>,
}

/// Промежуточный статус проверки одного правила.
/// Живёт только на время решения по этому правилу.
#[derive(Debug, Default)]
struct MatchStatus {
    required_present: bool,
    required_found: bool,
    optional_found: bool,
    stack_found: bool,
}

impl MatchStatus {
    fn verdict(&self) -> bool {
        if self.required_present {
            // Обязательный сигнал главной ошибки решает всё сам
            self.required_found
        } else {
            self.optional_found || self.stack_found
        }
    }
}

fn format_match(name: &str, severity: &str, width: usize) -> String {
    format!(
        "# Checking for {:.<width$} SUSPECT FOUND! > Severity : {} #\n-----\n",
        name,
        severity,
        width = width
    )
}

/// Проход по главной ошибке: каждое совпавшее правило даёт фрагмент,
/// порядок фрагментов равен порядку правил в рулсете.
pub fn check_main_error(rules: &[ErrorSuspect], main_error: &str, width: usize) -> Vec<String> {
    let mut fragments = Vec::new();
    for rule in rules {
        if main_error.contains(rule.signal.as_str()) {
            fragments.push(format_match(&rule.name, &rule.severity, width));
        }
    }
    fragments
}

/// Проход по стеку вызовов с модификаторной грамматикой.
///
/// `NOT`-сигнал при совпадении дисквалифицирует правило сразу, прочие
/// сигналы собираются в статус, решение принимается после всех.
pub fn check_call_stack(
    rules: &[StackSuspect],
    main_error: &str,
    callstack: &str,
    width: usize,
) -> Vec<String> {
    let mut fragments = Vec::new();

    'rules: for rule in rules {
        let mut status = MatchStatus::default();

        for signal in &rule.signals {
            match signal {
                Signal::MainErrorRequired(text) => {
                    status.required_present = true;
                    if main_error.contains(text.as_str()) {
                        status.required_found = true;
                    }
                }
                Signal::MainErrorOptional(text) => {
                    if main_error.contains(text.as_str()) {
                        status.optional_found = true;
                    }
                }
                Signal::NotInStack(text) => {
                    if callstack.contains(text.as_str()) {
                        continue 'rules;
                    }
                }
                Signal::MinOccurrences { needle, min } => {
                    if callstack.matches(needle.as_str()).count() >= *min {
                        status.stack_found = true;
                    }
                }
                Signal::InStack(text) => {
                    if callstack.contains(text.as_str()) {
                        status.stack_found = true;
                    }
                }
            }
        }

        if status.verdict() {
            fragments.push(format_match(&rule.name, &rule.severity, width));
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack_rule(name: &str, signals: &[&str]) -> StackSuspect {
        StackSuspect {
            severity: "5".to_string(),
            name: name.to_string(),
            signals: signals.iter().map(|s| Signal::parse(s)).collect(),
        }
    }

    #[test]
    fn test_signal_parse() {
        assert_eq!(
            Signal::parse("ME-REQ|EXCEPTION_STACK_OVERFLOW"),
            Signal::MainErrorRequired("EXCEPTION_STACK_OVERFLOW".to_string())
        );
        assert_eq!(
            Signal::parse("ME-OPT|Scaleform::Gfx::Value"),
            Signal::MainErrorOptional("Scaleform::Gfx::Value".to_string())
        );
        assert_eq!(
            Signal::parse("NOT|tbbmalloc"),
            Signal::NotInStack("tbbmalloc".to_string())
        );
        assert_eq!(
            Signal::parse("3|LooseFileAsyncStream"),
            Signal::MinOccurrences {
                needle: "LooseFileAsyncStream".to_string(),
                min: 3
            }
        );
        assert_eq!(
            Signal::parse("BSTextureStreamer::Manager"),
            Signal::InStack("BSTextureStreamer::Manager".to_string())
        );
        // '|' внутри текста без известного префикса остаётся частью подстроки
        assert_eq!(
            Signal::parse("Foo|Bar"),
            Signal::InStack("Foo|Bar".to_string())
        );
    }

    #[test]
    fn test_main_error_pass_matches_in_rule_order() {
        let rules = vec![
            ErrorSuspect {
                severity: "5".into(),
                name: "Stack Overflow Crash".into(),
                signal: "EXCEPTION_STACK_OVERFLOW".into(),
            },
            ErrorSuspect {
                severity: "4".into(),
                name: "Access Violation".into(),
                signal: "EXCEPTION_ACCESS_VIOLATION".into(),
            },
        ];
        let fragments = check_main_error(
            &rules,
            "Unhandled exception EXCEPTION_STACK_OVERFLOW at 0x0",
            25,
        );
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].contains("Stack Overflow Crash"));
        assert!(fragments[0].contains("Severity : 5"));
    }

    #[test]
    fn test_me_req_gates_everything_else() {
        let rules = vec![stack_rule(
            "Save Crash",
            &["ME-REQ|SaveGame", "BGSSaveLoadManager"],
        )];
        // Стек совпал, но обязательного текста в ошибке нет - правило не матчится
        let fragments = check_call_stack(&rules, "something else", "BGSSaveLoadManager::Save", 20);
        assert!(fragments.is_empty());

        // Обязательный текст есть - совпадение, стек уже не важен
        let fragments = check_call_stack(&rules, "error in SaveGame path", "no frames", 20);
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_not_disqualifies_regardless_of_rest() {
        let rules = vec![stack_rule(
            "Generic Crash",
            &["NOT|tbbmalloc", "BSResource::LooseFileStream"],
        )];
        let fragments = check_call_stack(
            &rules,
            "err",
            "tbbmalloc.dll+0x10\nBSResource::LooseFileStream",
            20,
        );
        assert!(fragments.is_empty());

        let fragments = check_call_stack(&rules, "err", "BSResource::LooseFileStream", 20);
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_min_occurrences_threshold() {
        let rules = vec![stack_rule("BA2 Limit Crash", &["3|LooseFileAsyncStream"])];
        let two = "LooseFileAsyncStream\nLooseFileAsyncStream";
        assert!(check_call_stack(&rules, "err", two, 20).is_empty());

        let three = "LooseFileAsyncStream\nLooseFileAsyncStream\nLooseFileAsyncStream";
        assert_eq!(check_call_stack(&rules, "err", three, 20).len(), 1);
    }

    #[test]
    fn test_me_opt_counts_as_match() {
        let rules = vec![stack_rule(
            "Scaleform Gfx Crash",
            &["ME-OPT|Scaleform::Gfx::Value", "AsVal"],
        )];
        let fragments = check_call_stack(&rules, "error at Scaleform::Gfx::Value", "no frames", 20);
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_report_line_padding() {
        let line = format_match("LOD Crash", "5", 20);
        assert!(line.starts_with("# Checking for LOD Crash..........."));
        assert!(line.contains("SUSPECT FOUND! > Severity : 5 #"));
    }
}
