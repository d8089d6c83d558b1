//! Разбиение краш-лога на именованные сегменты
//!
//! Лог режется по упорядоченному списку граничных маркеров
//! (начало, конец). Конечный автомат с явными состояниями:
//! Seeking - ищем стартовый маркер текущей пары,
//! Collecting - копим строки до конечного маркера,
//! Done - все пары обработаны.

/// Сентинел "до конца файла" вместо конечного маркера последней пары
pub const EOF_MARKER: &str = "EOF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Seeking,
    Collecting,
    Done,
}

/// Разбить строки лога на сегменты по граничным парам.
///
/// Результат всегда содержит ровно по одному списку на пару, в порядке
/// пар; ненайденный сегмент - пустой список, а не ошибка. Пары
/// проверяются строго в заданном порядке: строка, совпадающая с
/// маркером другой пары, роли не играет, пока очередь не дошла.
pub fn extract_segments(lines: &[String], boundaries: &[(String, String)]) -> Vec<Vec<String>> {
    let mut segments: Vec<Vec<String>> = Vec::with_capacity(boundaries.len());
    let mut state = ScanState::Seeking;
    let mut pair_idx = 0usize;
    let mut seg_start = 0usize;
    let mut i = 0usize;

    while state != ScanState::Done && i <= lines.len() {
        if pair_idx >= boundaries.len() {
            state = ScanState::Done;
            break;
        }
        let (start_marker, end_marker) = &boundaries[pair_idx];

        match state {
            ScanState::Seeking => {
                // Сентинел вместо стартового маркера: весь остаток файла
                // становится последним сегментом, дальше не ищем
                if start_marker == EOF_MARKER {
                    segments.push(strip_lines(&lines[i.min(lines.len())..]));
                    state = ScanState::Done;
                    break;
                }
                if i >= lines.len() {
                    break;
                }
                if lines[i].starts_with(start_marker.as_str()) {
                    state = ScanState::Collecting;
                    seg_start = i + 1;
                }
                i += 1;
            }
            ScanState::Collecting => {
                // Конечный маркер-сентинел не ищется в тексте:
                // сегмент закроется остатком файла
                if end_marker == EOF_MARKER {
                    segments.push(strip_lines(&lines[seg_start..]));
                    state = ScanState::Done;
                    break;
                }
                if i >= lines.len() {
                    // Файл кончился посреди сегмента - закрываем остатком
                    segments.push(strip_lines(&lines[seg_start..]));
                    state = ScanState::Seeking;
                    pair_idx += 1;
                    break;
                }
                if lines[i].starts_with(end_marker.as_str()) {
                    segments.push(strip_lines(&lines[seg_start..i]));
                    pair_idx += 1;
                    state = ScanState::Seeking;
                    // Курсор не двигаем: закрывающая строка может быть
                    // стартовым маркером следующей пары
                } else {
                    i += 1;
                }
            }
            ScanState::Done => break,
        }
    }

    // Маркеры не нашлись - добиваем пустыми списками до полного размера
    while segments.len() < boundaries.len() {
        segments.push(Vec::new());
    }
    segments
}

fn strip_lines(lines: &[String]) -> Vec<String> {
    lines.iter().map(|l| l.trim().to_string()).collect()
}

/// Нормализовать пробелы внутри скобок индекса загрузки: `[ 1]` -> `[01]`.
///
/// Строка без закрывающей скобки возвращается как есть. Повторное
/// применение ничего не меняет.
pub fn normalize_loadorder_brackets(line: &str) -> String {
    let Some(open) = line.find('[') else {
        return line.to_string();
    };
    let Some(close_rel) = line[open..].find(']') else {
        return line.to_string();
    };
    let close = open + close_rel;
    let inner: String = line[open + 1..close]
        .chars()
        .map(|c| if c == ' ' { '0' } else { c })
        .collect();
    format!("{}[{}]{}", &line[..open], inner, &line[close + 1..])
}

/// Переформатировать лог: ниже маркера секции плагинов выкинуть
/// исключённые строки и нормализовать скобки индексов загрузки.
///
/// Операция идемпотентна: повторный прогон даёт байт-в-байт тот же
/// результат.
pub fn reformat_log(lines: &[String], exclude: &[String], plugins_marker: &str) -> Vec<String> {
    let exclude_folded: Vec<String> = exclude.iter().map(|e| e.to_lowercase()).collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len());
    let mut in_plugins = true;

    // Секция плагинов - хвост файла, поэтому идём с конца
    for line in lines.iter().rev() {
        if in_plugins && line.starts_with(plugins_marker) {
            in_plugins = false;
            result.push(line.clone());
            continue;
        }
        if in_plugins {
            let folded = line.to_lowercase();
            if exclude_folded.iter().any(|e| folded.contains(e)) {
                continue;
            }
            if line.contains('[') {
                result.push(normalize_loadorder_brackets(line));
                continue;
            }
        }
        result.push(line.clone());
    }

    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_always_one_list_per_pair() {
        let input = lines(&["nothing", "interesting", "here"]);
        let bounds = pairs(&[("A:", "B:"), ("B:", "C:"), ("C:", "EOF")]);
        let segments = extract_segments(&input, &bounds);
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_basic_split() {
        let input = lines(&[
            "header",
            "SYSTEM SPECS:",
            "\tOS: Windows 10",
            "\tGPU #1: Nvidia",
            "PROBABLE CALL STACK:",
            "\t[0] 0x7FF6 Fallout4.exe+247D20",
            "PLUGINS:",
            "\t[00] Fallout4.esm",
        ]);
        let bounds = pairs(&[
            ("SYSTEM SPECS:", "PROBABLE CALL STACK:"),
            ("PROBABLE CALL STACK:", "PLUGINS:"),
            ("PLUGINS:", "EOF"),
        ]);
        let segments = extract_segments(&input, &bounds);
        assert_eq!(segments[0], vec!["OS: Windows 10", "GPU #1: Nvidia"]);
        assert_eq!(segments[1], vec!["[0] 0x7FF6 Fallout4.exe+247D20"]);
        assert_eq!(segments[2], vec!["[00] Fallout4.esm"]);
    }

    #[test]
    fn test_shared_marker_closes_and_opens() {
        // Конечный маркер первой пары одновременно стартовый второй
        let input = lines(&["A:", "one", "B:", "two", "C:", "tail"]);
        let bounds = pairs(&[("A:", "B:"), ("B:", "C:")]);
        let segments = extract_segments(&input, &bounds);
        assert_eq!(segments[0], vec!["one"]);
        assert_eq!(segments[1], vec!["two"]);
    }

    #[test]
    fn test_eof_collects_rest() {
        let input = lines(&["A:", "one", "two"]);
        let bounds = pairs(&[("A:", "EOF")]);
        let segments = extract_segments(&input, &bounds);
        assert_eq!(segments[0], vec!["one", "two"]);
    }

    #[test]
    fn test_open_segment_closed_at_end_of_input() {
        let input = lines(&["A:", "one", "two"]);
        let bounds = pairs(&[("A:", "NEVER:"), ("X:", "EOF")]);
        let segments = extract_segments(&input, &bounds);
        assert_eq!(segments[0], vec!["one", "two"]);
        assert_eq!(segments[1], Vec::<String>::new());
    }

    #[test]
    fn test_missing_middle_segment_is_empty() {
        let input = lines(&[
            "junk",
            "PROBABLE CALL STACK:",
            "\t[0] frame",
            "PLUGINS:",
            "\t[00] Fallout4.esm",
        ]);
        let bounds = pairs(&[
            ("SYSTEM SPECS:", "PROBABLE CALL STACK:"),
            ("PROBABLE CALL STACK:", "PLUGINS:"),
            ("PLUGINS:", "EOF"),
        ]);
        let segments = extract_segments(&input, &bounds);
        // Пары проверяются строго по очереди: без первой пары
        // дальнейший поиск не ведётся, все сегменты пустые
        assert_eq!(segments.len(), 3);
        assert!(segments.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn test_normalize_brackets() {
        assert_eq!(normalize_loadorder_brackets("[ 1] Foo.esm"), "[01] Foo.esm");
        assert_eq!(normalize_loadorder_brackets("[12] Foo.esm"), "[12] Foo.esm");
        assert_eq!(
            normalize_loadorder_brackets("[FE: 12] Bar.esl"),
            "[FE:012] Bar.esl"
        );
        // Нет закрывающей скобки - строка не трогается
        assert_eq!(normalize_loadorder_brackets("[ 1 Foo.esm"), "[ 1 Foo.esm");
        assert_eq!(normalize_loadorder_brackets("no brackets"), "no brackets");
    }

    #[test]
    fn test_reformat_idempotent() {
        let input = lines(&[
            "header",
            "PLUGINS:",
            "\t[ 1] Foo.esm",
            "\tsome excluded junk line",
            "\t[FE: 12] Bar.esl",
        ]);
        let exclude = vec!["excluded junk".to_string()];
        let once = reformat_log(&input, &exclude, "PLUGINS:");
        let twice = reformat_log(&once, &exclude, "PLUGINS:");
        assert_eq!(once, twice);
        assert!(once.iter().any(|l| l.contains("[01] Foo.esm")));
        assert!(once.iter().any(|l| l.contains("[FE:012] Bar.esl")));
        assert!(!once.iter().any(|l| l.contains("excluded junk")));
    }
}
