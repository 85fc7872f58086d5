use crate::domain::ports::RuntimeAttrDetector;
use regex::Regex;
use std::sync::OnceLock;

/// JavaScript/TypeScript constructor scanner
///
/// Finds `this.name = value` assignments, skipping `==` and `===` comparisons.
pub struct JavaScriptAttrDetector;

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bthis\.([A-Za-z_$][\w$]*)\s*=(=?)").expect("valid regex"))
}

impl RuntimeAttrDetector for JavaScriptAttrDetector {
    fn detect(&self, source: &str) -> Vec<String> {
        let mut names = Vec::new();
        for line in source.lines() {
            let code = line.split("//").next().unwrap_or("");
            for caps in assignment_re().captures_iter(code) {
                if &caps[2] == "=" {
                    continue;
                }
                let name = caps[1].to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn language(&self) -> &str {
        "javascript"
    }
}
