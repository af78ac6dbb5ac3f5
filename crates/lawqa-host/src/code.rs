//! Preparation of synthesized code before it reaches the sandbox.

use std::sync::LazyLock;

use regex::Regex;

/// Import line that brings every registry tool into scope.
pub const TOOL_PRELUDE: &str = "from app.law.tools import *";

/// Variable names and labels whose whole-list dumps blow up the output.
const LIST_MARKERS: &[&str] = &["legal_doc_list", "legal_docs", "案件列表"];
const GENERIC_LIST: &str = "列表";
const COMPANY: &str = "公司";

static LIST_PRINT: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    LIST_MARKERS
        .iter()
        .chain(std::iter::once(&GENERIC_LIST))
        .map(|m| {
            let re = Regex::new(&format!(r"print\(.*{}.*\)", regex::escape(m)))
                .expect("list print pattern");
            (*m, re)
        })
        .collect()
});

/// Dedent, suppress list dumps, and prepend the tool prelude when missing.
pub fn prepare(code: &str) -> String {
    let code = dedent(&suppress_list_prints(code));
    if code.trim_start().starts_with(TOOL_PRELUDE) {
        code
    } else {
        format!("{TOOL_PRELUDE}\n\n{code}")
    }
}

/// Remove the longest common leading whitespace from all non-blank lines.
/// Whitespace-only lines come out empty.
pub fn dedent(code: &str) -> String {
    let prefix = code
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| &l[..l.len() - l.trim_start().len()])
        .reduce(common_prefix)
        .unwrap_or("");
    code.lines()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l.strip_prefix(prefix).unwrap_or(l)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let end = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((i, c), _)| i + c.len_utf8());
    &a[..end]
}

/// Replace prints that would dump whole document lists with `pass`.
/// Generic "列表" prints that mention a company are kept.
pub fn suppress_list_prints(code: &str) -> String {
    code.lines()
        .map(|line| {
            if !line.contains("print") {
                return line.to_string();
            }
            let mut out = line.to_string();
            for (marker, re) in LIST_PRINT.iter() {
                if !out.contains(marker) {
                    continue;
                }
                if *marker == GENERIC_LIST && out.contains(COMPANY) {
                    continue;
                }
                out = re.replace_all(&out, "pass").into_owned();
            }
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_prelude_once() {
        let code = prepare("x = 1\nprint(x)");
        assert!(code.starts_with("from app.law.tools import *\n\nx = 1"));
        assert_eq!(prepare(&code), code);
    }

    #[test]
    fn dedents_common_indentation() {
        assert_eq!(dedent("    a = 1\n      b = 2\n\n    c = 3"), "a = 1\n  b = 2\n\nc = 3");
        assert_eq!(dedent("a\n  b"), "a\n  b");
    }

    #[test]
    fn dedent_handles_full_width_indentation() {
        assert_eq!(dedent("  a = 1\n\u{3000}b = 2"), "  a = 1\n\u{3000}b = 2");
        assert_eq!(dedent("\u{3000}\u{3000}a\n\u{3000}b"), "\u{3000}a\nb");
        assert_eq!(dedent("\t x\n\t  y"), "x\n y");
    }

    #[test]
    fn suppresses_document_list_dumps() {
        let code = "    print(legal_doc_list)\nprint(\"案件列表:\", cases)\nprint(len(cases))";
        assert_eq!(
            suppress_list_prints(code),
            "    pass\npass\nprint(len(cases))"
        );
    }

    #[test]
    fn keeps_company_lists() {
        let line = "print(\"子公司列表:\", [c['公司名称'] for c in subs])";
        assert_eq!(suppress_list_prints(line), line);
        assert_eq!(suppress_list_prints("print(\"列表\", xs)"), "pass");
    }
}
