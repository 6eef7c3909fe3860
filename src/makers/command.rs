//! MK-020: Command rule maker. One rule per source unit per declared toolchain.
//!
//! A toolchain declared in the tree config names an op, an output suffix,
//! and a command template. For every source unit that asks for the op, the
//! maker emits a rule whose target lives in the build-data directory and
//! whose recipe is the filled-in template. Toolchains listed in `after`
//! must have run earlier; their outputs for the same unit become
//! prerequisites.

use crate::core::registry::RuleMaker;
use crate::core::types::{BasicRule, Options, Rule, SourceUnit, ToolchainDecl, TreeConfig};
use std::collections::HashMap;

/// Rule maker backed by a declared toolchain.
#[derive(Debug, Clone)]
pub struct CommandMaker {
    name: String,
    decl: ToolchainDecl,
}

impl CommandMaker {
    pub fn new(name: &str, decl: ToolchainDecl) -> Self {
        Self {
            name: name.to_string(),
            decl,
        }
    }

    fn handles(&self, tree: &TreeConfig, unit: &SourceUnit) -> bool {
        handles(tree, &self.name, &self.decl, unit)
    }

    fn rule_for(
        &self,
        tree: &TreeConfig,
        unit: &SourceUnit,
        data_dir: &str,
        existing: &[Rule],
        opt: &Options,
    ) -> Result<Rule, String> {
        let target = output_path(data_dir, unit, &self.decl.suffix);

        let mut prereqs = unit.files.clone();
        for dep in &self.decl.after {
            let dep_decl = tree
                .toolchains
                .get(dep)
                .ok_or_else(|| format!("{} runs after unknown toolchain {}", self.name, dep))?;
            let dep_target = output_path(data_dir, unit, &dep_decl.suffix);
            if existing.iter().any(|r| r.target() == dep_target) {
                prereqs.push(dep_target);
            } else if handles(tree, dep, dep_decl, unit) {
                return Err(format!(
                    "{} needs {} for unit {}, but it has not been produced yet",
                    self.name, dep_target, unit.name
                ));
            }
        }

        let mut vars = HashMap::new();
        vars.insert("unit.name", unit.name.clone());
        vars.insert("unit.type", unit.unit_type.clone());
        vars.insert("unit.dir", unit.dir.clone().unwrap_or_else(|| ".".to_string()));
        vars.insert("target", target.clone());
        vars.insert("prereqs", prereqs.join(" "));
        vars.insert("files", unit.files.join(" "));
        vars.insert("exec_opt", opt.toolchain_exec_opt.clone());
        let recipe = resolve_template(&self.decl.command, &vars)
            .map_err(|e| format!("unit {}: {}", unit.name, e))?;

        Ok(BasicRule::new(target)
            .with_prereqs(prereqs)
            .with_recipes(vec![recipe])
            .with_unit(unit.clone())
            .into())
    }
}

impl RuleMaker for CommandMaker {
    fn make_rules(
        &self,
        tree: &TreeConfig,
        data_dir: &str,
        existing: &[Rule],
        opt: &Options,
    ) -> Result<Vec<Rule>, String> {
        let mut rules: Vec<Rule> = Vec::new();
        for unit in tree.source_units.iter().filter(|u| self.handles(tree, u)) {
            let rule = self.rule_for(tree, unit, data_dir, existing, opt)?;
            let target = rule.target();
            if existing.iter().chain(rules.iter()).any(|r| r.target() == target) {
                return Err(format!(
                    "{} would produce {} for unit {}, but that target is already produced",
                    self.name, target, unit.name
                ));
            }
            rules.push(rule);
        }
        Ok(rules)
    }
}

/// Whether toolchain `name` handles `unit`. A unit may pin an op to a
/// toolchain; an unpinned op goes to the first toolchain declaring it.
fn handles(tree: &TreeConfig, name: &str, decl: &ToolchainDecl, unit: &SourceUnit) -> bool {
    match unit.ops.get(&decl.op) {
        Some(Some(pinned)) => pinned == name,
        Some(None) => tree
            .toolchains
            .iter()
            .find(|(_, d)| d.op == decl.op)
            .is_some_and(|(first, _)| first == name),
        None => false,
    }
}

/// Output path for `unit` under the build-data directory:
/// `<data_dir>/<unit dir>/<unit type>.<suffix>`.
pub fn output_path(data_dir: &str, unit: &SourceUnit, suffix: &str) -> String {
    format!(
        "{}/{}/{}.{}",
        data_dir,
        unit.output_dir(),
        unit.output_stem(),
        suffix
    )
}

/// Resolve `{{key}}` templates against `vars`.
pub fn resolve_template(template: &str, vars: &HashMap<&str, String>) -> Result<String, String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| format!("unclosed template at position {}", open))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let value = vars
            .get(key)
            .cloned()
            .ok_or_else(|| format!("unknown template variable: {}", key))?;

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA_DIR: &str = ".mkplan-cache/1111111111111111111111111111111111111111";

    fn tree() -> TreeConfig {
        let yaml = r#"
version: "1.0"
source_units:
  - name: github.com/acme/lib
    type: GoPackage
    dir: lib
    files: [lib/a.go, lib/b.go]
    ops: { graph: null, depresolve: null }
  - name: web
    type: CommonJSPackage
    files: [web/index.js]
    ops: { graph: js }
toolchains:
  graph:
    op: graph
    command: "grapher --unit {{unit.name}} {{exec_opt}} > {{target}}"
    suffix: graph.json
  js:
    op: graph
    command: "jsg {{files}} > {{target}}"
    suffix: graph.json
  depresolve:
    op: depresolve
    command: "resolve {{prereqs}} > {{target}}"
    suffix: depresolve.json
    after: [graph]
"#;
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn maker(tree: &TreeConfig, name: &str) -> CommandMaker {
        CommandMaker::new(name, tree.toolchains[name].clone())
    }

    #[test]
    fn test_mk020_output_path() {
        let unit = SourceUnit {
            name: "github.com/acme/lib".to_string(),
            unit_type: "GoPackage".to_string(),
            ..SourceUnit::default()
        };
        assert_eq!(
            output_path(DATA_DIR, &unit, "graph.json"),
            format!("{}/github.com/acme/lib/GoPackage.graph.json", DATA_DIR)
        );
    }

    #[test]
    fn test_mk020_open_op_rules() {
        let tree = tree();
        let opt = Options {
            toolchain_exec_opt: "--docker".to_string(),
            no_cache: false,
        };
        let rules = maker(&tree, "graph")
            .make_rules(&tree, DATA_DIR, &[], &opt)
            .unwrap();
        // "web" pins the graph op to "js".
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(
            rule.target(),
            format!("{}/github.com/acme/lib/GoPackage.graph.json", DATA_DIR)
        );
        assert_eq!(rule.prereqs().to_vec(), vec!["lib/a.go", "lib/b.go"]);
        assert_eq!(
            rule.recipes(),
            vec![format!(
                "grapher --unit github.com/acme/lib --docker > {}",
                rule.target()
            )]
        );
        assert_eq!(rule.source_unit().unwrap().name, "github.com/acme/lib");
    }

    #[test]
    fn test_mk020_pinned_toolchain() {
        let tree = tree();
        let rules = maker(&tree, "js")
            .make_rules(&tree, DATA_DIR, &[], &Options::default())
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules[0].recipes(),
            vec![format!("jsg web/index.js > {}", rules[0].target())]
        );
    }

    #[test]
    fn test_mk020_after_uses_existing_outputs() {
        let tree = tree();
        let opt = Options::default();
        let graph = maker(&tree, "graph")
            .make_rules(&tree, DATA_DIR, &[], &opt)
            .unwrap();
        let rules = maker(&tree, "depresolve")
            .make_rules(&tree, DATA_DIR, &graph, &opt)
            .unwrap();
        assert_eq!(rules.len(), 1);
        let prereqs = rules[0].prereqs();
        assert_eq!(prereqs.len(), 3);
        assert_eq!(prereqs[2], graph[0].target());
        assert!(rules[0].recipes()[0].starts_with("resolve lib/a.go lib/b.go "));
    }

    #[test]
    fn test_mk020_after_missing_output_errors() {
        let tree = tree();
        let err = maker(&tree, "depresolve")
            .make_rules(&tree, DATA_DIR, &[], &Options::default())
            .unwrap_err();
        assert!(err.contains("has not been produced yet"));
    }

    #[test]
    fn test_mk020_unknown_template_variable() {
        let mut tree = tree();
        tree.toolchains["graph"].command = "x {{unit.color}}".to_string();
        let err = maker(&tree, "graph")
            .make_rules(&tree, DATA_DIR, &[], &Options::default())
            .unwrap_err();
        assert!(err.contains("unknown template variable: unit.color"));
    }

    #[test]
    fn test_mk020_resolve_template() {
        let mut vars = HashMap::new();
        vars.insert("a", "X".to_string());
        vars.insert("b", "Y".to_string());
        assert_eq!(resolve_template("{{a}}-{{ b }}", &vars).unwrap(), "X-Y");
        assert!(resolve_template("{{a", &vars)
            .unwrap_err()
            .contains("unclosed"));
    }

    #[test]
    fn test_mk020_cached_rev_carried_on_unit() {
        let mut tree = tree();
        tree.source_units[0].cached_rev =
            Some("2222222222222222222222222222222222222222".to_string());
        let rules = maker(&tree, "graph")
            .make_rules(&tree, DATA_DIR, &[], &Options::default())
            .unwrap();
        assert!(rules[0].source_unit().unwrap().cached_rev().is_some());
    }

    #[test]
    fn test_mk020_colliding_unit_names_rejected() {
        let mut tree = tree();
        tree.source_units[0].name = "a b".to_string();
        let mut twin = tree.source_units[0].clone();
        twin.name = "a_b".to_string();
        tree.source_units.push(twin);
        let err = maker(&tree, "graph")
            .make_rules(&tree, DATA_DIR, &[], &Options::default())
            .unwrap_err();
        assert!(err.contains("already produced"), "{}", err);
        assert!(err.contains("a_b/GoPackage.graph.json"));
    }

    #[test]
    fn test_mk020_target_from_earlier_maker_rejected() {
        let mut tree = tree();
        tree.toolchains["depresolve"].suffix = "graph.json".to_string();
        tree.toolchains["depresolve"].after.clear();
        let opt = Options::default();
        let graph = maker(&tree, "graph")
            .make_rules(&tree, DATA_DIR, &[], &opt)
            .unwrap();
        let err = maker(&tree, "depresolve")
            .make_rules(&tree, DATA_DIR, &graph, &opt)
            .unwrap_err();
        assert!(err.starts_with("depresolve would produce"), "{}", err);
    }
}
