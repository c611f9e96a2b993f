//! Dependency resolution: load order, cycles, conflicts, suppression.
//!
//! Pure and deterministic: the same registry and policy outcome always give
//! the same [`ResolvedActivationSet`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use semver::Version;

use crate::descriptor::Dependency;
use crate::policy::{PolicyOutcome, RejectReason};
use crate::registry::ModuleRegistry;

/// Non-fatal finding of a resolution run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionWarning {
    /// The activation list names an id that was never discovered.
    UnknownConfiguredId { id: String },
    /// An optional dependency has no active provider.
    OptionalDependencyUnavailable { module: String, dependency: String },
    /// An optional dependency is active but older than requested.
    OptionalDependencyOutdated {
        module: String,
        dependency: String,
        required: Version,
        found: Version,
    },
    /// An optional ordering edge was dropped because it would close a cycle.
    OptionalDependencyCycle { module: String, dependency: String },
    /// `by` asks to suppress `module`, which does not allow it.
    SuppressionNotAllowed { module: String, by: String },
}

impl ResolutionWarning {
    /// The module the warning is about.
    pub fn module_id(&self) -> &str {
        match self {
            ResolutionWarning::UnknownConfiguredId { id } => id,
            ResolutionWarning::OptionalDependencyUnavailable { module, .. }
            | ResolutionWarning::OptionalDependencyOutdated { module, .. }
            | ResolutionWarning::OptionalDependencyCycle { module, .. }
            | ResolutionWarning::SuppressionNotAllowed { module, .. } => module,
        }
    }
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::UnknownConfiguredId { id } => {
                write!(f, "activation list names unknown module '{id}'")
            }
            ResolutionWarning::OptionalDependencyUnavailable { module, dependency } => {
                write!(f, "optional dependency '{dependency}' of '{module}' is not active")
            }
            ResolutionWarning::OptionalDependencyOutdated {
                module,
                dependency,
                required,
                found,
            } => write!(
                f,
                "optional dependency '{dependency}' of '{module}' is outdated (requires >= {required}, found {found})"
            ),
            ResolutionWarning::OptionalDependencyCycle { module, dependency } => write!(
                f,
                "optional dependency '{dependency}' of '{module}' ignored for ordering: it would form a cycle"
            ),
            ResolutionWarning::SuppressionNotAllowed { module, by } => write!(
                f,
                "suppression of '{module}' by '{by}' ignored: '{by}' is not allowed to suppress it"
            ),
        }
    }
}

/// The ordered outcome of policy, dependency and conflict rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedActivationSet {
    /// Dependency-satisfying load order.
    pub ordered: Vec<String>,
    pub rejected: BTreeMap<String, RejectReason>,
    pub warnings: Vec<ResolutionWarning>,
    /// For each ordered id, the ordered ids it has to wait for.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl ResolvedActivationSet {
    pub fn reason(&self, id: &str) -> Option<&RejectReason> {
        self.rejected.get(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ordered.iter().position(|o| o == id)
    }

    /// `ordered` split into dependency waves.
    ///
    /// Every module lands in the wave right after its deepest dependency, so
    /// modules within one wave never depend on each other. Each wave keeps
    /// the relative order of `ordered`.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut waves: Vec<Vec<String>> = Vec::new();
        for id in &self.ordered {
            let d = self
                .dependencies
                .get(id)
                .into_iter()
                .flatten()
                .filter_map(|dep| depth.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(id.as_str(), d);
            if waves.len() <= d {
                waves.resize_with(d + 1, Vec::new);
            }
            waves[d].push(id.clone());
        }
        waves
    }
}

enum DependencyStatus<'a> {
    Satisfied(Vec<&'a str>),
    Missing,
    Outdated { required: Version, found: Version },
}

pub struct DependencyResolver;

impl DependencyResolver {
    pub fn order(outcome: &PolicyOutcome, registry: &ModuleRegistry) -> ResolvedActivationSet {
        let mut active: BTreeSet<String> = outcome
            .included
            .iter()
            .filter(|id| registry.contains(id))
            .cloned()
            .collect();
        let mut rejected = outcome.excluded.clone();
        let mut warnings: Vec<ResolutionWarning> = outcome
            .unknown_ids
            .iter()
            .map(|id| ResolutionWarning::UnknownConfiguredId { id: id.clone() })
            .collect();

        loop {
            let mut newly = Self::reject_unmet_dependencies(&active, registry);
            if newly.is_empty() {
                newly = Self::reject_cycles(&active, registry);
            }
            if newly.is_empty() {
                newly = Self::reject_conflicts(&active, registry);
            }
            if newly.is_empty() {
                newly = Self::reject_suppressed(&active, registry);
            }
            if newly.is_empty() {
                break;
            }
            for (id, reason) in newly {
                tracing::debug!(module = %id, %reason, "Module rejected during resolution");
                active.remove(&id);
                rejected.insert(id, reason);
            }
        }

        Self::ignored_suppressions(&active, registry, &mut warnings);
        let dependencies = Self::ordering_edges(&active, registry, &mut warnings);
        let ordered = Self::topo_sort(&active, &dependencies);

        tracing::info!(
            ordered = ?ordered,
            rejected = rejected.len(),
            warnings = warnings.len(),
            "Resolved module activation order"
        );

        ResolvedActivationSet {
            ordered,
            rejected,
            warnings,
            dependencies,
        }
    }

    fn check<'r>(
        module_id: &str,
        dep: &Dependency,
        active: &BTreeSet<String>,
        registry: &'r ModuleRegistry,
    ) -> DependencyStatus<'r> {
        let candidates: Vec<&str> = registry
            .matching(dep)
            .into_iter()
            .filter(|id| active.contains(*id))
            .filter(|id| dep.pattern().is_none() || *id != module_id)
            .collect();
        if candidates.is_empty() {
            return DependencyStatus::Missing;
        }
        let Some(required) = &dep.min_version else {
            return DependencyStatus::Satisfied(candidates);
        };
        let (fresh, stale): (Vec<&str>, Vec<&str>) = candidates.into_iter().partition(|id| {
            registry
                .get(id)
                .is_some_and(|d| d.version >= *required)
        });
        if !fresh.is_empty() {
            return DependencyStatus::Satisfied(fresh);
        }
        let found = stale
            .first()
            .and_then(|id| registry.get(id))
            .map(|d| d.version.clone())
            .unwrap_or_else(|| Version::new(0, 0, 0));
        DependencyStatus::Outdated {
            required: required.clone(),
            found,
        }
    }

    fn reject_unmet_dependencies(
        active: &BTreeSet<String>,
        registry: &ModuleRegistry,
    ) -> Vec<(String, RejectReason)> {
        let mut out = Vec::new();
        for id in active {
            let Some(d) = registry.get(id) else { continue };
            for dep in d.depends_on.iter().filter(|dep| !dep.optional) {
                let reason = match Self::check(id, dep, active, registry) {
                    DependencyStatus::Satisfied(_) => continue,
                    DependencyStatus::Missing => RejectReason::MissingDependency {
                        dependency: dep.name.clone(),
                    },
                    DependencyStatus::Outdated { required, found } => {
                        RejectReason::OutdatedDependency {
                            dependency: dep.name.clone(),
                            required,
                            found,
                        }
                    }
                };
                out.push((id.clone(), reason));
                break;
            }
        }
        out
    }

    /// Members of strongly connected components (size > 1, or a self-loop)
    /// over required edges between active modules.
    fn reject_cycles(
        active: &BTreeSet<String>,
        registry: &ModuleRegistry,
    ) -> Vec<(String, RejectReason)> {
        let names: Vec<&str> = active.iter().map(String::as_str).collect();
        let idx: HashMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

        // edge module -> dependency
        let mut adj = vec![Vec::<usize>::new(); names.len()];
        for (u, &name) in names.iter().enumerate() {
            let Some(d) = registry.get(name) else { continue };
            for dep in d.depends_on.iter().filter(|dep| !dep.optional) {
                if let DependencyStatus::Satisfied(targets) = Self::check(name, dep, active, registry) {
                    for t in targets {
                        if let Some(&v) = idx.get(t) {
                            adj[u].push(v);
                        }
                    }
                }
            }
        }

        let mut out = Vec::new();
        for component in strongly_connected(&adj) {
            let self_loop = component.len() == 1 && adj[component[0]].contains(&component[0]);
            if component.len() < 2 && !self_loop {
                continue;
            }
            let mut cycle: Vec<String> = component.iter().map(|&i| names[i].to_string()).collect();
            cycle.sort();
            for id in &cycle {
                out.push((
                    id.clone(),
                    RejectReason::CircularDependency {
                        cycle: cycle.clone(),
                    },
                ));
            }
        }
        out
    }

    /// One sweep over conflicting pairs in ascending order; the larger id of
    /// each pair that is still active loses.
    fn reject_conflicts(
        active: &BTreeSet<String>,
        registry: &ModuleRegistry,
    ) -> Vec<(String, RejectReason)> {
        let mut pairs = BTreeSet::new();
        for id in active {
            let Some(d) = registry.get(id) else { continue };
            for other in &d.conflicts_with {
                if other != id && active.contains(other) {
                    let (lo, hi) = if id < other { (id, other) } else { (other, id) };
                    pairs.insert((lo.clone(), hi.clone()));
                }
            }
        }

        let mut losers: BTreeMap<String, String> = BTreeMap::new();
        for (lo, hi) in pairs {
            if losers.contains_key(&lo) || losers.contains_key(&hi) {
                continue;
            }
            losers.insert(hi, lo);
        }
        losers
            .into_iter()
            .map(|(loser, winner)| (loser, RejectReason::Conflict { with: winner }))
            .collect()
    }

    /// Active modules switched off by an active suppressor they allow.
    ///
    /// Targets are visited in ascending order; the smallest allowed suppressor
    /// wins, and a module suppressed in this sweep suppresses nothing else.
    fn reject_suppressed(
        active: &BTreeSet<String>,
        registry: &ModuleRegistry,
    ) -> Vec<(String, RejectReason)> {
        let mut suppressed: BTreeMap<String, String> = BTreeMap::new();
        for target in active {
            let Some(d) = registry.get(target) else { continue };
            let by = d
                .allow_suppression_by
                .iter()
                .filter(|s| *s != target && active.contains(*s) && !suppressed.contains_key(*s))
                .find(|s| registry.get(s).is_some_and(|sd| sd.suppresses.contains(target)));
            if let Some(by) = by {
                tracing::warn!(module = %target, by = %by, "Module is suppressed");
                suppressed.insert(target.clone(), by.clone());
            }
        }
        suppressed
            .into_iter()
            .map(|(id, by)| (id, RejectReason::Suppressed { by }))
            .collect()
    }

    fn ignored_suppressions(
        active: &BTreeSet<String>,
        registry: &ModuleRegistry,
        warnings: &mut Vec<ResolutionWarning>,
    ) {
        for by in active {
            let Some(d) = registry.get(by) else { continue };
            for target in d.suppresses.iter().filter(|t| *t != by && active.contains(*t)) {
                tracing::warn!(module = %target, by = %by, "Suppression not allowed; ignored");
                warnings.push(ResolutionWarning::SuppressionNotAllowed {
                    module: target.clone(),
                    by: by.clone(),
                });
            }
        }
    }

    /// Required edges plus optional ones that keep the graph acyclic.
    fn ordering_edges(
        active: &BTreeSet<String>,
        registry: &ModuleRegistry,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut edges: BTreeMap<String, BTreeSet<String>> =
            active.iter().map(|id| (id.clone(), BTreeSet::new())).collect();

        for id in active {
            let Some(d) = registry.get(id) else { continue };
            for dep in d.depends_on.iter().filter(|dep| !dep.optional) {
                if let DependencyStatus::Satisfied(targets) = Self::check(id, dep, active, registry) {
                    if let Some(e) = edges.get_mut(id) {
                        e.extend(targets.into_iter().map(str::to_string));
                    }
                }
            }
        }

        for id in active {
            let Some(d) = registry.get(id) else { continue };
            for dep in d.depends_on.iter().filter(|dep| dep.optional) {
                match Self::check(id, dep, active, registry) {
                    DependencyStatus::Missing => {
                        warnings.push(ResolutionWarning::OptionalDependencyUnavailable {
                            module: id.clone(),
                            dependency: dep.name.clone(),
                        });
                    }
                    DependencyStatus::Outdated { required, found } => {
                        warnings.push(ResolutionWarning::OptionalDependencyOutdated {
                            module: id.clone(),
                            dependency: dep.name.clone(),
                            required,
                            found,
                        });
                    }
                    DependencyStatus::Satisfied(targets) => {
                        for t in targets {
                            if t == id.as_str() || reaches(&edges, t, id) {
                                warnings.push(ResolutionWarning::OptionalDependencyCycle {
                                    module: id.clone(),
                                    dependency: t.to_string(),
                                });
                                continue;
                            }
                            if let Some(e) = edges.get_mut(id) {
                                e.insert(t.to_string());
                            }
                        }
                    }
                }
            }
        }
        edges
    }

    /// Kahn's algorithm; ready modules are taken in ascending id order.
    fn topo_sort(active: &BTreeSet<String>, edges: &BTreeMap<String, BTreeSet<String>>) -> Vec<String> {
        let mut indeg: BTreeMap<&str, usize> = active.iter().map(|id| (id.as_str(), 0)).collect();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (id, deps) in edges {
            for dep in deps {
                if let Some(n) = indeg.get_mut(id.as_str()) {
                    *n += 1;
                }
                dependents.entry(dep.as_str()).or_default().push(id.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = indeg
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(active.len());
        while let Some(u) = ready.pop_first() {
            order.push(u.to_string());
            for &w in dependents.get(u).into_iter().flatten() {
                if let Some(n) = indeg.get_mut(w) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(w);
                    }
                }
            }
        }
        order
    }
}

/// Does `from` reach `to` following dependency edges?
fn reaches(edges: &BTreeMap<String, BTreeSet<String>>, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = BTreeSet::new();
    while let Some(n) = stack.pop() {
        if n == to {
            return true;
        }
        if !seen.insert(n) {
            continue;
        }
        stack.extend(edges.get(n).into_iter().flatten().map(String::as_str));
    }
    false
}

/// Tarjan's strongly connected components.
fn strongly_connected(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State {
        index: usize,
        indices: Vec<Option<usize>>,
        lowlink: Vec<usize>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        components: Vec<Vec<usize>>,
    }

    fn visit(v: usize, adj: &[Vec<usize>], s: &mut State) {
        s.indices[v] = Some(s.index);
        s.lowlink[v] = s.index;
        s.index += 1;
        s.stack.push(v);
        s.on_stack[v] = true;

        for &w in &adj[v] {
            match s.indices[w] {
                None => {
                    visit(w, adj, s);
                    s.lowlink[v] = s.lowlink[v].min(s.lowlink[w]);
                }
                Some(wi) if s.on_stack[w] => {
                    s.lowlink[v] = s.lowlink[v].min(wi);
                }
                Some(_) => {}
            }
        }

        if Some(s.lowlink[v]) == s.indices[v] {
            let mut component = Vec::new();
            while let Some(w) = s.stack.pop() {
                s.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            s.components.push(component);
        }
    }

    let n = adj.len();
    let mut s = State {
        index: 0,
        indices: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        components: Vec::new(),
    };
    for v in 0..n {
        if s.indices[v].is_none() {
            visit(v, adj, &mut s);
        }
    }
    s.components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Dependency, ModuleDescriptor};
    use crate::policy::{ActivationConfig, ActivationPolicy};

    fn resolve(mods: Vec<ModuleDescriptor>, config: ActivationConfig) -> ResolvedActivationSet {
        let reg = ModuleRegistry::from_descriptors(mods);
        let outcome = ActivationPolicy::resolve(&reg, &config);
        DependencyResolver::order(&outcome, &reg)
    }

    fn all(mods: Vec<ModuleDescriptor>) -> ResolvedActivationSet {
        resolve(mods, ActivationConfig::include_all())
    }

    fn d(id: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(id)
    }

    fn code<'a>(set: &'a ResolvedActivationSet, id: &str) -> Option<&'a str> {
        set.reason(id).map(RejectReason::code)
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let set = all(vec![d("zeta"), d("alpha"), d("mid").depends_on("zeta"), d("beta")]);
        assert_eq!(set.ordered, ["alpha", "beta", "zeta", "mid"]);
        assert!(set.rejected.is_empty());
    }

    #[test]
    fn dependency_on_excluded_module_is_missing() {
        let set = resolve(
            vec![d("a"), d("b").depends_on("a"), d("c").depends_on("b")],
            ActivationConfig::exclude_listed(["a"]),
        );
        assert!(set.ordered.is_empty());
        assert_eq!(code(&set, "a"), Some("excluded by policy"));
        assert_eq!(code(&set, "b"), Some("missing dependency"));
        assert_eq!(code(&set, "c"), Some("missing dependency"));
    }

    #[test]
    fn cycle_members_and_dependents_are_rejected() {
        let set = all(vec![
            d("a").depends_on("b"),
            d("b").depends_on("a"),
            d("c").depends_on("a"),
            d("self").depends_on("self"),
            d("free"),
        ]);
        assert_eq!(set.ordered, ["free"]);
        assert_eq!(code(&set, "a"), Some("circular dependency"));
        assert_eq!(code(&set, "b"), Some("circular dependency"));
        assert_eq!(code(&set, "self"), Some("circular dependency"));
        assert_eq!(code(&set, "c"), Some("missing dependency"));
        assert_eq!(
            set.reason("a"),
            Some(&RejectReason::CircularDependency {
                cycle: vec!["a".into(), "b".into()]
            })
        );
    }

    #[test]
    fn conflict_rejects_larger_id_and_propagates() {
        let set = all(vec![
            d("alpha").conflicts_with("beta"),
            d("beta").conflicts_with("alpha"),
            d("gamma").depends_on("beta"),
        ]);
        assert_eq!(set.ordered, ["alpha"]);
        assert_eq!(
            set.reason("beta"),
            Some(&RejectReason::Conflict { with: "alpha".into() })
        );
        assert_eq!(code(&set, "gamma"), Some("missing dependency"));
    }

    #[test]
    fn unilateral_conflict_chain_is_resolved_pairwise() {
        // b loses to a; then c no longer conflicts with anything active
        let set = all(vec![d("a").conflicts_with("b"), d("b").conflicts_with("c"), d("c")]);
        assert_eq!(set.ordered, ["a", "c"]);
        assert_eq!(code(&set, "b"), Some("conflict"));
    }

    #[test]
    fn outdated_required_rejects_optional_only_warns() {
        let core = d("core").with_version(Version::new(1, 2, 0));
        let set = all(vec![
            core,
            d("needs_new").with_dependency(Dependency::required("core").at_least(Version::new(2, 0, 0))),
            d("likes_new").with_dependency(Dependency::optional("core").at_least(Version::new(2, 0, 0))),
            d("ok").with_dependency(Dependency::required("core").at_least(Version::new(1, 0, 0))),
        ]);
        assert_eq!(code(&set, "needs_new"), Some("outdated dependency"));
        assert_eq!(set.ordered, ["core", "likes_new", "ok"]);
        assert!(set.warnings.iter().any(|w| matches!(
            w,
            ResolutionWarning::OptionalDependencyOutdated { module, .. } if module == "likes_new"
        )));
    }

    #[test]
    fn optional_dependency_orders_but_never_rejects() {
        let set = all(vec![
            d("a").with_dependency(Dependency::optional("z")),
            d("b").with_dependency(Dependency::optional("ghost")),
            d("z"),
        ]);
        assert_eq!(set.ordered, ["b", "z", "a"]);
        assert!(set.rejected.is_empty());
        assert_eq!(set.warnings.len(), 1);
        assert_eq!(set.warnings[0].module_id(), "b");
    }

    #[test]
    fn optional_edge_closing_a_cycle_is_dropped() {
        let set = all(vec![
            d("a").depends_on("b"),
            d("b").with_dependency(Dependency::optional("a")),
        ]);
        assert_eq!(set.ordered, ["b", "a"]);
        assert!(matches!(
            set.warnings[0],
            ResolutionWarning::OptionalDependencyCycle { .. }
        ));
    }

    #[test]
    fn regex_dependency_waits_for_every_match() {
        let set = all(vec![
            d("report").depends_on("regex:^plot_"),
            d("plot_b"),
            d("plot_a"),
            d("aaa"),
        ]);
        assert_eq!(set.ordered, ["aaa", "plot_a", "plot_b", "report"]);
        assert_eq!(
            set.dependencies["report"].iter().collect::<Vec<_>>(),
            ["plot_a", "plot_b"]
        );

        let set = resolve(
            vec![d("report").depends_on("regex:^plot_"), d("plot_a")],
            ActivationConfig::exclude_listed(["plot_a"]),
        );
        assert_eq!(code(&set, "report"), Some("missing dependency"));
    }

    #[test]
    fn waves_group_independent_modules() {
        let set = all(vec![
            d("a"),
            d("b"),
            d("c").depends_on("a"),
            d("d").depends_on("c").depends_on("b"),
        ]);
        assert_eq!(
            set.waves(),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
                vec!["d".to_string()]
            ]
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let mods = || {
            vec![
                d("m3").depends_on("m1"),
                d("m1"),
                d("m2").conflicts_with("m4"),
                d("m4"),
                d("m5").depends_on("m4"),
            ]
        };
        let first = all(mods());
        let mut reversed = mods();
        reversed.reverse();
        let second = all(reversed);
        assert_eq!(first, second);
        assert_eq!(first.ordered, ["m1", "m2", "m3"]);
    }

    #[test]
    fn unknown_configured_ids_become_warnings() {
        let set = resolve(vec![d("a")], ActivationConfig::exclude_listed(["ghost"]));
        assert_eq!(set.ordered, ["a"]);
        assert_eq!(
            set.warnings,
            vec![ResolutionWarning::UnknownConfiguredId { id: "ghost".into() }]
        );
    }

    #[test]
    fn allowed_suppression_rejects_the_target() {
        let set = all(vec![
            d("tools").allow_suppression_by("tools_pro"),
            d("tools_pro").suppresses("tools"),
            d("report").depends_on("tools"),
        ]);
        assert_eq!(set.ordered, ["tools_pro"]);
        assert_eq!(
            set.reason("tools"),
            Some(&RejectReason::Suppressed { by: "tools_pro".into() })
        );
        assert_eq!(code(&set, "report"), Some("missing dependency"));
        assert!(set.warnings.is_empty());
    }

    #[test]
    fn suppression_needs_the_targets_consent() {
        let set = all(vec![d("tools"), d("tools_pro").suppresses("tools")]);
        assert_eq!(set.ordered, ["tools", "tools_pro"]);
        assert!(set.rejected.is_empty());
        assert_eq!(
            set.warnings,
            vec![ResolutionWarning::SuppressionNotAllowed {
                module: "tools".into(),
                by: "tools_pro".into(),
            }]
        );
    }

    #[test]
    fn rejected_suppressor_suppresses_nothing() {
        let set = all(vec![
            d("tools").allow_suppression_by("tools_pro"),
            d("tools_pro").suppresses("tools").depends_on("license_server"),
        ]);
        assert_eq!(set.ordered, ["tools"]);
        assert_eq!(code(&set, "tools_pro"), Some("missing dependency"));
        assert!(set.warnings.is_empty());

        let set = resolve(
            vec![
                d("tools").allow_suppression_by("tools_pro"),
                d("tools_pro").suppresses("tools"),
            ],
            ActivationConfig::exclude_listed(["tools_pro"]),
        );
        assert_eq!(set.ordered, ["tools"]);
    }
}
