//! Call-edge resolution for the four algorithms (§4.4 step 5).
//!
//! All four algorithms share one call-site scan over each function's body
//! (`scan_call_sites`); they differ only in how an *interface-dispatch*
//! call site (`x.M()` where `x`'s static type is an interface parameter) is
//! expanded into concrete edges:
//!
//! - **Static**: not expanded at all — dropped.
//! - **CHA**: expands to every type in the program with a method named `M`.
//! - **RTA**: restricts CHA's set to types instantiated (via a composite
//!   literal) within a function reachable from an entry point over the
//!   direct (non-interface) call graph.
//! - **VTA**: further restricts RTA's set to the concrete types actually
//!   observed as arguments at call sites of the enclosing function, when
//!   that can be traced; falls back to RTA's set otherwise.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::model::call_graph::Algorithm;
use crate::model::func_edge::FuncEdge;
use crate::ssa::types::ProgramModel;

const KEYWORDS: &[&str] = &[
    "if", "for", "switch", "return", "func", "go", "defer", "select", "range", "var", "const",
    "type", "package", "import", "struct", "interface", "map", "chan", "else", "case", "default",
    "break", "continue", "len", "make", "append", "cap", "copy", "delete", "new", "panic",
    "recover", "print", "println",
];

#[derive(Debug, Clone)]
struct CallSite {
    caller_id: i64,
    call_site_line: u32,
    kind: CallKind,
}

#[derive(Debug, Clone)]
enum CallKind {
    /// A direct call to a function/method resolvable purely from static
    /// structure: same-package function, or a method called on the
    /// caller's own receiver.
    Direct { callee_id: i64 },
    /// `recv.Method()` where `recv` is a parameter whose declared type is
    /// an interface. Needs algorithm-dependent expansion.
    Interface {
        interface_param_type: String,
        method: String,
    },
}

fn qualified_call_re() -> Regex {
    Regex::new(r"\b(\w+)\.(\w+)\s*\(").unwrap()
}
fn plain_call_re() -> Regex {
    Regex::new(r"(?:^|[^.\w])(\w+)\s*\(").unwrap()
}
fn func_signature_re() -> Regex {
    Regex::new(r"^func\s*(?:\(\s*(\w+)\s+\*?(\w+)\s*\))?\s*\w+\s*\(([^)]*)\)").unwrap()
}
fn param_decl_re() -> Regex {
    Regex::new(r"(\w+)\s+\*?(\w+)").unwrap()
}

/// Parse a function's signature line for `(paramName ParamType, ...)`,
/// returning a map `paramName -> ParamType`.
fn parse_params(signature_line: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(caps) = func_signature_re().captures(signature_line) else {
        return out;
    };
    let params_src = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    for part in params_src.split(',') {
        if let Some(pc) = param_decl_re().captures(part.trim()) {
            out.insert(pc[1].to_string(), pc[2].to_string());
        }
    }
    out
}

/// Scan every function's body for call sites, classifying each as `Direct`
/// or `Interface`. Unresolvable calls (external/dynamic) are dropped,
/// matching Static's under-approximation by design.
fn scan_call_sites(program: &ProgramModel) -> Vec<CallSite> {
    let qualified = qualified_call_re();
    let plain = plain_call_re();

    // Index of same-package function name -> id, and canonical name -> id
    // for quick direct-call resolution.
    let mut by_name_in_package: HashMap<(&str, &str), i64> = HashMap::new();
    for pf in &program.functions {
        by_name_in_package.insert((pf.func.package.as_str(), pf.func.func_name.as_str()), pf.id);
    }
    let interface_names: HashSet<&str> = program.interfaces.iter().map(|i| i.name.as_str()).collect();

    let mut sites = Vec::new();

    for pf in &program.functions {
        let lines: Vec<&str> = pf.func.body.lines().collect();
        let signature_line = lines.first().copied().unwrap_or("");
        let params = parse_params(signature_line);
        let receiver_name = receiver_var_name(signature_line);

        for (offset, line) in lines.iter().enumerate() {
            let absolute_line = pf.func.line_start + offset as u32;

            for caps in qualified.captures_iter(line) {
                let recv = &caps[1];
                let method = &caps[2];

                if Some(recv) == receiver_name.as_deref() {
                    // `self.Method()` on the receiver's own type: resolve
                    // against that type's own method set via
                    // `find_method_func_id` rather than the package-wide
                    // `by_name_in_package` index, which is last-write-wins
                    // across types and would otherwise bind to whichever
                    // type happened to be indexed last when two types share
                    // a method name.
                    if let Some(recv_type) = receiver_type(signature_line) {
                        if program
                            .method_sets
                            .get(&recv_type)
                            .is_some_and(|ms| ms.iter().any(|m| m == method))
                        {
                            if let Some(callee_id) = find_method_func_id(program, &recv_type, method) {
                                sites.push(CallSite {
                                    caller_id: pf.id,
                                    call_site_line: absolute_line,
                                    kind: CallKind::Direct { callee_id },
                                });
                                continue;
                            }
                        }
                    }
                } else if let Some(&callee_id) =
                    by_name_in_package.get(&(pf.func.package.as_str(), method))
                {
                    // `pkg.Func(` style qualified call into a same-package
                    // function, where `recv` is not the receiver's own
                    // variable (so this can't be a method call on self).
                    sites.push(CallSite {
                        caller_id: pf.id,
                        call_site_line: absolute_line,
                        kind: CallKind::Direct { callee_id },
                    });
                    continue;
                }

                if let Some(param_type) = params.get(recv) {
                    if interface_names.contains(param_type.as_str()) {
                        sites.push(CallSite {
                            caller_id: pf.id,
                            call_site_line: absolute_line,
                            kind: CallKind::Interface {
                                interface_param_type: param_type.clone(),
                                method: method.to_string(),
                            },
                        });
                    }
                }
            }

            for caps in plain.captures_iter(line) {
                let name = &caps[1];
                if KEYWORDS.contains(&name) {
                    continue;
                }
                if let Some(&callee_id) = by_name_in_package.get(&(pf.func.package.as_str(), name))
                {
                    sites.push(CallSite {
                        caller_id: pf.id,
                        call_site_line: absolute_line,
                        kind: CallKind::Direct { callee_id },
                    });
                }
            }
        }
    }

    sites
}

fn receiver_var_name(signature_line: &str) -> Option<String> {
    func_signature_re()
        .captures(signature_line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn receiver_type(signature_line: &str) -> Option<String> {
    func_signature_re()
        .captures(signature_line)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string())
}

/// Direct-only reachability from `entry_ids`, used to scope RTA's
/// "instantiated reachable from entry points" restriction.
fn reachable_via_direct_edges(direct_sites: &[&CallSite], entry_ids: &[i64]) -> HashSet<i64> {
    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();
    for site in direct_sites {
        if let CallKind::Direct { callee_id } = site.kind {
            adjacency.entry(site.caller_id).or_default().push(callee_id);
        }
    }
    let mut visited: HashSet<i64> = entry_ids.iter().copied().collect();
    let mut frontier: Vec<i64> = entry_ids.to_vec();
    while let Some(id) = frontier.pop() {
        if let Some(callees) = adjacency.get(&id) {
            for &callee in callees {
                if visited.insert(callee) {
                    frontier.push(callee);
                }
            }
        }
    }
    visited
}

/// Types instantiated via composite literal within any function in `ids`.
fn instantiated_within(program: &ProgramModel, ids: &HashSet<i64>) -> HashSet<String> {
    let re = Regex::new(r"&?\b([A-Z]\w*)\s*\{").unwrap();
    let mut out = HashSet::new();
    for pf in program.functions.iter().filter(|pf| ids.contains(&pf.id)) {
        for caps in re.captures_iter(&pf.func.body) {
            out.insert(caps[1].to_string());
        }
    }
    out
}

/// Types passed as an argument to calls of `func_name`, anywhere in the
/// program, when the argument is itself a composite literal. Used by VTA
/// to narrow an interface parameter's candidate set to what's actually
/// passed in, where traceable.
fn instantiated_arguments_to(program: &ProgramModel, func_name: &str) -> HashSet<String> {
    let call_re = Regex::new(&format!(r"\b{}\s*\(([^)]*)\)", regex::escape(func_name))).unwrap();
    let lit_re = Regex::new(r"&?\b([A-Z]\w*)\s*\{").unwrap();
    let mut out = HashSet::new();
    for pf in &program.functions {
        for caps in call_re.captures_iter(&pf.func.body) {
            let args = &caps[1];
            if let Some(lit) = lit_re.captures(args) {
                out.insert(lit[1].to_string());
            }
        }
    }
    out
}

/// Build the full node-to-node edge set for `algorithm`, given the
/// already-resolved entry-point node IDs.
pub fn build_edges(
    program: &ProgramModel,
    entry_ids: &[i64],
    algorithm: Algorithm,
) -> Vec<FuncEdge> {
    let sites = scan_call_sites(program);
    let direct_refs: Vec<&CallSite> = sites
        .iter()
        .filter(|s| matches!(s.kind, CallKind::Direct { .. }))
        .collect();

    let reachable = reachable_via_direct_edges(&direct_refs, entry_ids);
    let rta_instantiated = instantiated_within(program, &reachable);

    let mut dedup: HashSet<(i64, i64, u32)> = HashSet::new();
    let mut edges = Vec::new();
    let mut next_edge_id: i64 = 1;

    for site in &sites {
        let callee_ids: Vec<i64> = match &site.kind {
            CallKind::Direct { callee_id } => vec![*callee_id],
            CallKind::Interface {
                interface_param_type: _,
                method,
            } => match algorithm {
                Algorithm::Static => vec![],
                Algorithm::Cha => program
                    .types_implementing_method(method)
                    .into_iter()
                    .filter_map(|ty| program.method_sets.get(&ty).map(|_| ty))
                    .filter_map(|ty| find_method_func_id(program, &ty, method))
                    .collect(),
                Algorithm::Rta => program
                    .types_implementing_method(method)
                    .into_iter()
                    .filter(|ty| rta_instantiated.contains(ty) || program.instantiated_types.contains(ty))
                    .filter_map(|ty| find_method_func_id(program, &ty, method))
                    .collect(),
                Algorithm::Vta => {
                    let caller_func_name =
                        program.by_id(site.caller_id).map(|pf| pf.func.func_name.clone());
                    let traced = caller_func_name
                        .map(|name| instantiated_arguments_to(program, &name))
                        .unwrap_or_default();
                    let candidates: HashSet<String> = if traced.is_empty() {
                        rta_instantiated.clone()
                    } else {
                        traced
                    };
                    program
                        .types_implementing_method(method)
                        .into_iter()
                        .filter(|ty| candidates.contains(ty))
                        .filter_map(|ty| find_method_func_id(program, &ty, method))
                        .collect()
                }
            },
        };

        for callee_id in callee_ids {
            let call_site_file = program
                .by_id(site.caller_id)
                .map(|pf| pf.func.file.clone())
                .unwrap_or_default();
            let key = (site.caller_id, callee_id, site.call_site_line);
            if dedup.insert(key) {
                edges.push(FuncEdge {
                    id: next_edge_id,
                    caller_id: site.caller_id,
                    callee_id,
                    call_site_file,
                    call_site_line: site.call_site_line,
                });
                next_edge_id += 1;
            }
        }
    }

    edges
}

fn find_method_func_id(program: &ProgramModel, type_name: &str, method: &str) -> Option<i64> {
    program
        .functions
        .iter()
        .find(|pf| pf.func.receiver.as_deref() == Some(type_name) && pf.func.func_name == method)
        .map(|pf| pf.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::loader::load_module;
    use crate::model::project::ExcludePatterns;
    use tempfile::tempdir;

    const INTERFACE_SRC: &str = r#"package pkg

type I interface {
	M()
}

type A struct{}

func (a A) M() {}

type B struct{}

func (b *B) M() {}

func f(x I) {
	x.M()
}

func main() {
	f(A{})
	f(&B{})
}
"#;

    fn load(src: &str) -> (ProgramModel, Vec<i64>) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), src).unwrap();
        let model = load_module(dir.path(), "example.com/pkg", &ExcludePatterns::default(), &|_, _| {}).unwrap();
        let entry = model.find_by_canonical("pkg.main").unwrap().id;
        (model, vec![entry])
    }

    #[test]
    fn static_yields_no_interface_edges() {
        let (model, entries) = load(INTERFACE_SRC);
        let edges = build_edges(&model, &entries, Algorithm::Static);
        let f_id = model.find_by_canonical("pkg.f").unwrap().id;
        assert!(edges.iter().all(|e| e.caller_id != f_id));
    }

    #[test]
    fn rta_resolves_both_implementations() {
        let (model, entries) = load(INTERFACE_SRC);
        let edges = build_edges(&model, &entries, Algorithm::Rta);
        let f_id = model.find_by_canonical("pkg.f").unwrap().id;
        let a_m = model.find_by_canonical("pkg.A.M").unwrap().id;
        let b_m = model.find_by_canonical("pkg.B.M").unwrap().id;
        let callees: HashSet<i64> = edges
            .iter()
            .filter(|e| e.caller_id == f_id)
            .map(|e| e.callee_id)
            .collect();
        assert!(callees.contains(&a_m));
        assert!(callees.contains(&b_m));
    }

    #[test]
    fn self_receiver_call_binds_to_its_own_type_not_a_same_named_method() {
        let src = r#"package pkg

type A struct{}

func (a A) Helper() {}

func (a A) Run() {
	a.Helper()
}

type B struct{}

func (b B) Helper() {}
"#;
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.go"), src).unwrap();
        let model = load_module(dir.path(), "example.com/pkg", &ExcludePatterns::default(), &|_, _| {}).unwrap();

        let edges = build_edges(&model, &[], Algorithm::Static);
        let run_id = model.find_by_canonical("pkg.A.Run").unwrap().id;
        let a_helper = model.find_by_canonical("pkg.A.Helper").unwrap().id;
        let b_helper = model.find_by_canonical("pkg.B.Helper").unwrap().id;

        let callees: HashSet<i64> =
            edges.iter().filter(|e| e.caller_id == run_id).map(|e| e.callee_id).collect();
        assert!(callees.contains(&a_helper));
        assert!(!callees.contains(&b_helper));
    }

    #[test]
    fn trivial_two_function_program_has_one_direct_edge() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("main.go"),
            "package pkg\n\nfunc helper() {}\n\nfunc main() {\n\thelper()\n}\n",
        )
        .unwrap();
        let model = load_module(dir.path(), "example.com/pkg", &ExcludePatterns::default(), &|_, _| {}).unwrap();
        let entry = model.find_by_canonical("pkg.main").unwrap().id;
        let edges = build_edges(&model, &[entry], Algorithm::Rta);
        assert_eq!(edges.len(), 1);
        assert_eq!(model.functions.len(), 2);
    }
}
