//! Syntactic (AST-free) Go source scanner shared by C3 (Diff Analyzer) and
//! C4 (SSA Analyzer's fallback call-site extraction, see [`crate::ssa`]).
//!
//! This is deliberately not a real Go parser: it recognizes top-level
//! `package`, `import`, `func`, and `type` declarations with regexes over
//! source text, the same "AST only, no type checking" posture §4.3
//! prescribes for C3. Failure to make sense of a file is non-fatal — the
//! caller skips it and records a warning, per §4.3's "Constraints".

use std::collections::HashMap;

use regex::Regex;

/// One function or method declaration found in a single source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoFunction {
    pub package: String,
    /// Receiver type name with pointer markers stripped, e.g. `T` for both
    /// `func (t T) M()` and `func (t *T) M()`. `None` for plain functions.
    pub receiver: Option<String>,
    pub func_name: String,
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
    pub is_exported: bool,
    /// Raw source of the function body, used for call-site scanning.
    pub body: String,
}

impl GoFunction {
    /// `pkg.Receiver.Func` or `pkg.Func`, matching [`crate::model::func_node::FuncNode::canonical_name`].
    pub fn canonical_name(&self) -> String {
        match &self.receiver {
            Some(r) => format!("{}.{}.{}", self.package, r, self.func_name),
            None => format!("{}.{}", self.package, self.func_name),
        }
    }
}

/// One `type X interface { ... }` declaration: the interface name and the
/// method names it requires (signatures beyond the name are not tracked;
/// see [`crate::ssa`] for how this bounds CHA's precision).
#[derive(Debug, Clone)]
pub struct GoInterface {
    pub name: String,
    pub methods: Vec<String>,
}

/// Everything extracted from one Go source file.
#[derive(Debug, Clone, Default)]
pub struct GoSource {
    pub package: String,
    pub functions: Vec<GoFunction>,
    pub interfaces: Vec<GoInterface>,
    /// Concrete (non-interface) type names declared in the file, e.g. from
    /// `type T struct {...}`.
    pub concrete_types: Vec<String>,
    /// Composite-literal instantiations found anywhere in the file:
    /// `T{...}` or `&T{...}`. Used by RTA to restrict CHA's expansion to
    /// types demonstrably instantiated.
    pub instantiated_types: Vec<String>,
}

fn package_re() -> Regex {
    Regex::new(r"(?m)^package\s+(\w+)").unwrap()
}
fn func_re() -> Regex {
    // func (recv RecvType) Name(...) ... {   OR   func Name(...) ... {
    Regex::new(r"(?m)^func\s*(?:\(\s*\w+\s+\*?(\w+)\s*\))?\s*(\w+)\s*\(").unwrap()
}
fn interface_re() -> Regex {
    Regex::new(r"(?ms)^type\s+(\w+)\s+interface\s*\{([^}]*)\}").unwrap()
}
fn interface_method_re() -> Regex {
    Regex::new(r"(?m)^\s*(\w+)\s*\(").unwrap()
}
fn struct_re() -> Regex {
    Regex::new(r"(?m)^type\s+(\w+)\s+struct\b").unwrap()
}
fn composite_literal_re() -> Regex {
    Regex::new(r"&?\b([A-Z]\w*)\s*\{").unwrap()
}

/// Parse one file's source into a [`GoSource`]. Returns `None` if no
/// `package` declaration is found (treated as a non-fatal parse skip by
/// callers).
pub fn parse_source(source: &str, file: &str) -> Option<GoSource> {
    let package = package_re().captures(source)?.get(1)?.as_str().to_string();

    let lines: Vec<&str> = source.lines().collect();
    let func_re = func_re();
    let mut functions = Vec::new();

    // Find each `func` declaration's start line, then its matching closing
    // brace by naive brace counting from that line to end of file.
    let mut matches: Vec<(usize, Option<String>, String)> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = func_re.captures(line) {
            let receiver = caps.get(1).map(|m| m.as_str().to_string());
            let name = caps.get(2).unwrap().as_str().to_string();
            matches.push((idx, receiver, name));
        }
    }

    for (start_idx, receiver, name) in matches {
        let end_idx = find_closing_brace(&lines, start_idx).unwrap_or(start_idx);
        let body_lines = &lines[start_idx..=end_idx.min(lines.len().saturating_sub(1))];
        let body = body_lines.join("\n");
        let is_exported = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
        functions.push(GoFunction {
            package: package.clone(),
            receiver,
            func_name: name,
            file: file.to_string(),
            line_start: (start_idx + 1) as u32,
            line_end: (end_idx + 1) as u32,
            is_exported,
            body,
        });
    }

    let mut interfaces = Vec::new();
    for caps in interface_re().captures_iter(source) {
        let name = caps[1].to_string();
        let body = &caps[2];
        let methods = interface_method_re()
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect();
        interfaces.push(GoInterface { name, methods });
    }

    let concrete_types: Vec<String> = struct_re()
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect();

    let instantiated_types: Vec<String> = composite_literal_re()
        .captures_iter(source)
        .map(|c| c[1].to_string())
        .collect();

    Some(GoSource {
        package,
        functions,
        interfaces,
        concrete_types,
        instantiated_types,
    })
}

fn find_closing_brace(lines: &[&str], start_idx: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut seen_open = false;
    for (offset, line) in lines[start_idx..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if seen_open && depth <= 0 {
            return Some(start_idx + offset);
        }
    }
    None
}

/// Index `GoFunction`s by canonical name for quick signature-based lookup
/// (used by C3's classification step).
pub fn index_by_canonical_name(functions: &[GoFunction]) -> HashMap<String, &GoFunction> {
    functions
        .iter()
        .map(|f| (f.canonical_name(), f))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: &str = r#"package pkg

type I interface {
	M()
}

type A struct{}

func (a A) M() {
	println("a")
}

type B struct{}

func (b *B) M() {
	println("b")
}

func f(x I) {
	x.M()
}

func main() {
	f(A{})
	f(&B{})
}
"#;

    #[test]
    fn parses_functions_methods_and_interfaces() {
        let src = parse_source(SRC, "main.go").unwrap();
        assert_eq!(src.package, "pkg");
        assert_eq!(src.functions.len(), 4);
        assert_eq!(src.interfaces.len(), 1);
        assert_eq!(src.interfaces[0].methods, vec!["M"]);
        assert!(src.concrete_types.contains(&"A".to_string()));
        assert!(src.concrete_types.contains(&"B".to_string()));
        assert!(src.instantiated_types.contains(&"A".to_string()));
        assert!(src.instantiated_types.contains(&"B".to_string()));
    }

    #[test]
    fn canonical_names_distinguish_receivers() {
        let src = parse_source(SRC, "main.go").unwrap();
        let by_name = index_by_canonical_name(&src.functions);
        assert!(by_name.contains_key("pkg.A.M"));
        assert!(by_name.contains_key("pkg.B.M"));
        assert!(by_name.contains_key("pkg.main"));
        assert!(by_name.contains_key("pkg.f"));
    }
}
