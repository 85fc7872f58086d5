use crate::domain::ports::RuntimeAttrDetector;
use regex::Regex;
use std::sync::OnceLock;

/// Python constructor scanner
///
/// Finds assignments on the receiver:
/// - `self.name = value`
/// - `self.name: Type = value`
/// - `self.a = self.b = value` (both names)
///
/// Comparisons (`self.name == value`) are not assignments.
pub struct PythonAttrDetector;

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bself\.([A-Za-z_]\w*)\s*(?::[^=\n]*)?=(=?)").expect("valid regex")
    })
}

impl RuntimeAttrDetector for PythonAttrDetector {
    fn detect(&self, source: &str) -> Vec<String> {
        let mut names = Vec::new();
        for line in source.lines() {
            let code = line.split('#').next().unwrap_or("");
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
        "python"
    }
}
