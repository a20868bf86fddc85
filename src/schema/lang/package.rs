//! Compiling schema fragments into one package

use super::ast::{Decl, Expr, Label, StructLit};
use super::eval::{is_builtin, is_builtin_package, Env, Evaluator};
use super::parser::parse_file;
use super::value::{unify, Value};
use super::CompileError;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A compiled package: the merged declarations of every fragment
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    root: Arc<StructLit>,
    imports: BTreeSet<String>,
}

impl Package {
    /// Compile named fragments. All fragments must declare the same package.
    pub fn compile(fragments: &[(&str, &str)]) -> Result<Package, CompileError> {
        if fragments.is_empty() {
            return Err(CompileError::Build("no schema fragments".to_string()));
        }

        let mut names = BTreeSet::new();
        let mut root = StructLit::default();
        let mut imports = BTreeSet::new();
        for (fragment, src) in fragments {
            let file = parse_file(src).map_err(|message| CompileError::Syntax {
                fragment: fragment.to_string(),
                message,
            })?;
            names.insert(file.package.unwrap_or_else(|| "_".to_string()));
            for import in file.imports {
                if !is_builtin_package(&import) {
                    return Err(CompileError::Build(format!(
                        "{}: unsupported import {:?}",
                        fragment, import
                    )));
                }
                imports.insert(import);
            }
            root.decls.extend(file.body.decls);
        }
        if names.len() != 1 {
            return Err(CompileError::PackageMismatch(names.into_iter().collect()));
        }
        let name = names.into_iter().next().unwrap_or_default();

        let mut resolver = Resolver {
            scopes: Vec::new(),
            imports: &imports,
            errors: Vec::new(),
        };
        resolver.structure(&root);
        if !resolver.errors.is_empty() {
            resolver.errors.sort();
            resolver.errors.dedup();
            return Err(CompileError::Build(resolver.errors.join("; ")));
        }

        let package = Package {
            name,
            root: Arc::new(root),
            imports,
        };
        package.check_declarations()?;
        Ok(package)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the package declares a top-level `label`
    pub fn has(&self, label: &str) -> bool {
        self.root.declares(label)
    }

    /// Unify `data` with the definition `entry` and report every violation.
    ///
    /// Errors are formatted `path: message` with dotted paths (list
    /// elements by index), sorted.
    pub fn validate(&self, entry: &str, data: &serde_yaml::Value) -> Vec<String> {
        let ev = Evaluator::new(&self.imports);
        let env = Env::root(self.root.clone());
        let Some(schema) = ev.lookup(entry, &env) else {
            return vec![format!("no entry point {}", entry)];
        };
        ev.check(&unify(schema, Value::from_yaml(data)))
    }

    /// Top-level declarations must not evaluate to an error
    fn check_declarations(&self) -> Result<(), CompileError> {
        let ev = Evaluator::new(&self.imports);
        let env = Env::root(self.root.clone());
        let labels: BTreeSet<&str> = self
            .root
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Field(f) => match &f.label {
                    Label::Name(n) | Label::Def(n) => Some(n.as_str()),
                    Label::Pattern(_) => None,
                },
                _ => None,
            })
            .collect();
        for label in labels {
            if let Some(Value::Bottom(msg)) = ev.lookup(label, &env) {
                return Err(CompileError::Build(format!("{}: {}", label, msg)));
            }
        }
        Ok(())
    }
}

/// Static reference check over the merged declarations
struct Resolver<'a> {
    scopes: Vec<&'a StructLit>,
    imports: &'a BTreeSet<String>,
    errors: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn structure(&mut self, lit: &'a StructLit) {
        self.scopes.push(lit);
        for decl in &lit.decls {
            match decl {
                Decl::Field(f) => {
                    if let Label::Pattern(p) = &f.label {
                        self.expr(p);
                    }
                    self.expr(&f.value);
                }
                Decl::Embed(e) => self.expr(e),
                Decl::Ellipsis => {}
            }
        }
        self.scopes.pop();
    }

    fn expr(&mut self, expr: &'a Expr) {
        match expr {
            Expr::Ref(path) => self.reference(path),
            Expr::Call(path, args) => {
                let known = match path.as_slice() {
                    [pkg, func] => self.imports.contains(pkg) && is_builtin(pkg, func),
                    _ => false,
                };
                if !known {
                    self.errors
                        .push(format!("unknown function {}", path.join(".")));
                }
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Bound(_, operand) => self.expr(operand),
            Expr::And(parts) => parts.iter().for_each(|p| self.expr(p)),
            Expr::Or(alts) => alts.iter().for_each(|(e, _)| self.expr(e)),
            Expr::Struct(lit) => self.structure(lit),
            Expr::List(list) => {
                for elem in &list.elems {
                    self.expr(elem);
                }
                if let Some(tail) = &list.tail {
                    self.expr(tail);
                }
            }
            _ => {}
        }
    }

    fn reference(&mut self, path: &[String]) {
        let Some(first) = path.first() else {
            return;
        };
        if self.scopes.iter().any(|s| s.declares(first)) {
            return;
        }
        if self.imports.contains(first) {
            if !path.get(1).is_some_and(|m| is_builtin(first, m)) {
                self.errors
                    .push(format!("undefined builtin {}", path.join(".")));
            }
            return;
        }
        self.errors.push(format!("reference {:?} not found", first));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_merges_fragments() {
        let pkg = Package::compile(&[
            ("base", "package s\nimport \"strings\"\n#Id: strings.MinRunes(1)"),
            ("doc", "package s\n#Doc: { id!: #Id }"),
        ])
        .unwrap();
        assert_eq!(pkg.name(), "s");
        assert!(pkg.has("#Doc"));
        assert!(!pkg.has("#Missing"));
        assert!(pkg.validate("#Doc", &yaml("id: a")).is_empty());
        assert_eq!(pkg.validate("#Doc", &yaml("{}")).len(), 1);
    }

    #[test]
    fn test_package_mismatch() {
        let err = Package::compile(&[("a", "package a\n#A: int"), ("b", "package b\n#B: int")])
            .unwrap_err();
        assert!(matches!(err, CompileError::PackageMismatch(ref names) if names == &["a", "b"]));
        assert!(err.to_string().contains("package name mismatch"));
    }

    #[test]
    fn test_syntax_error_names_fragment() {
        let err = Package::compile(&[("layer-9", "package s\n#A: {")]).unwrap_err();
        match err {
            CompileError::Syntax { fragment, .. } => assert_eq!(fragment, "layer-9"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_reference() {
        let err = Package::compile(&[("a", "package s\n#A: { b: #Nope }")]).unwrap_err();
        assert!(err.to_string().contains("\"#Nope\" not found"), "{}", err);
    }

    #[test]
    fn test_unknown_builtin() {
        let err = Package::compile(&[("a", "package s\nimport \"strings\"\n#A: strings.Shout(1)")])
            .unwrap_err();
        assert!(err.to_string().contains("unknown function strings.Shout"), "{}", err);

        let err = Package::compile(&[("a", "package s\nimport \"net\"\n#A: string")]).unwrap_err();
        assert!(err.to_string().contains("unsupported import"), "{}", err);
    }

    #[test]
    fn test_conflicting_declaration() {
        let err = Package::compile(&[("a", "package s\n#A: int & string")]).unwrap_err();
        assert!(err.to_string().contains("#A: conflicting values"), "{}", err);
    }

    #[test]
    fn test_missing_entry_point() {
        let pkg = Package::compile(&[("a", "package s\n#A: int")]).unwrap();
        assert_eq!(pkg.validate("#B", &yaml("1")), vec!["no entry point #B"]);
    }
}
